//! End-to-end board flows against the in-process server.

use std::sync::Arc;
use std::time::Duration;

use leadboard::assignment::AssignPolicy;
use leadboard::board::ContactFilter;
use leadboard::config::{BoardConfig, BoardVariant};
use leadboard::errors::LeadboardError;
use leadboard::events::{CollectingEventSink, EventSink};
use leadboard::guard::{NavigationKind, NavigationOutcome};
use leadboard::model::ActivityKind;
use leadboard::queue::{DurableQueueBackend, FileBackend, InMemoryBackend};
use leadboard::server::ContactRepository;
use leadboard::session::BoardSession;
use leadboard::sync::FlushOutcome;
use leadboard::testing::{assert_contiguous, assert_lane, assert_queued, TestServer};
use pretty_assertions::assert_eq;
use uuid::Uuid;

async fn mount(server: &TestServer, backend: Arc<dyn DurableQueueBackend>, sink: Arc<dyn EventSink>) -> BoardSession {
    mount_with(server, BoardConfig::default(), backend, sink).await
}

async fn mount_with(
    server: &TestServer,
    config: BoardConfig,
    backend: Arc<dyn DurableQueueBackend>,
    sink: Arc<dyn EventSink>,
) -> BoardSession {
    BoardSession::mount("p1", config, server.collaborators(backend, sink))
        .await
        .unwrap()
}

async fn open_prompt(session: &BoardSession) -> Uuid {
    loop {
        if let Some(prompt) = session.guard().pending_prompts().first() {
            return prompt.id;
        }
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn test_mount_renders_server_order() {
    let server = TestServer::new();
    let session = mount(&server, Arc::new(InMemoryBackend::new()), Arc::new(CollectingEventSink::new())).await;

    let lanes = session.visible_contacts(&ContactFilter::new());
    assert_lane(&lanes, "a", &["a1", "a2", "a3", "a4"]);
    assert_lane(&lanes, "b", &["b1", "b2"]);
    assert_lane(&lanes, "c", &[]);
    assert_contiguous(&lanes);
    assert!(!session.guard().has_unsaved_changes());

    session.unmount().await;
}

#[tokio::test]
async fn test_save_reaches_server_and_refetches() {
    let server = TestServer::new();
    let sink = Arc::new(CollectingEventSink::new());
    let session = mount(&server, Arc::new(InMemoryBackend::new()), sink.clone()).await;

    session.move_contact("a3", "a", "b", 1).unwrap();
    assert_queued(session.queue(), &[("a3", "b", 2)]);

    let outcome = session.save().await.unwrap();
    assert!(matches!(outcome, FlushOutcome::Flushed { count: 1, .. }));
    assert!(session.queue().is_empty());

    assert_eq!(server.stage_ids("a"), vec!["a1", "a2", "a4"]);
    assert_eq!(server.stage_ids("b"), vec!["b1", "a3", "b2"]);

    let lanes = session.visible_contacts(&ContactFilter::new());
    assert_lane(&lanes, "b", &["b1", "a3", "b2"]);
    assert_contiguous(&lanes);

    let history = server.activity.for_contact("a3");
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].kind, ActivityKind::StageChanged);
    assert_eq!(sink.event_types(), vec!["sync.succeeded"]);

    session.unmount().await;
}

#[tokio::test]
async fn test_two_moves_flush_as_one_update() {
    let server = TestServer::new();
    let session = mount(&server, Arc::new(InMemoryBackend::new()), Arc::new(CollectingEventSink::new())).await;

    session.move_contact("a1", "a", "b", 0).unwrap();
    session.move_contact("a1", "b", "c", 0).unwrap();
    assert_queued(session.queue(), &[("a1", "c", 1)]);

    session.save().await.unwrap();

    let delivered = server.transport.delivered();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].len(), 1);
    assert_eq!(delivered[0].updates[0].stage_id, "c");
    assert_eq!(server.stage_ids("c"), vec!["a1"]);
    assert_eq!(server.stage_ids("b"), vec!["b1", "b2"]);

    session.unmount().await;
}

#[tokio::test]
async fn test_failed_save_keeps_updates_queued() {
    let server = TestServer::new();
    let sink = Arc::new(CollectingEventSink::new());
    let session = mount(&server, Arc::new(InMemoryBackend::new()), sink.clone()).await;

    session.select_stage("b2", "c").unwrap();
    server.transport.set_offline(true);

    let err = session.save().await.unwrap_err();
    assert!(matches!(err, LeadboardError::Network(_)));
    assert!(err.is_retryable());
    assert_eq!(session.queue().len(), 1);
    assert_eq!(sink.event_types(), vec!["sync.failed"]);
    assert_eq!(server.stage_ids("c"), Vec::<String>::new());

    server.transport.set_offline(false);
    session.save().await.unwrap();
    assert!(session.queue().is_empty());
    assert_eq!(server.stage_ids("c"), vec!["b2"]);
    assert_eq!(server.transport.call_count(), 2);

    session.unmount().await;
}

#[tokio::test]
async fn test_discard_restores_server_placement() {
    let server = TestServer::new();
    let backend = InMemoryBackend::new();
    let session = Arc::new(mount(&server, Arc::new(backend.clone()), Arc::new(CollectingEventSink::new())).await);

    session.move_contact("a1", "a", "b", 0).unwrap();
    session.move_contact("b2", "b", "c", 0).unwrap();
    assert_eq!(session.queue().len(), 2);

    let navigating = {
        let session = Arc::clone(&session);
        tokio::spawn(async move { session.request_navigation(NavigationKind::Back).await })
    };
    let prompt = open_prompt(&session).await;
    assert!(session.guard().discard(prompt));

    let outcome = navigating.await.unwrap();
    assert_eq!(outcome, NavigationOutcome::ProceedAfterDiscard { discarded: 2 });
    assert!(session.queue().is_empty());
    assert_eq!(server.transport.call_count(), 0);
    session.unmount().await;

    let reloaded = mount(&server, Arc::new(backend), Arc::new(CollectingEventSink::new())).await;
    assert!(reloaded.queue().is_empty());
    let lanes = reloaded.visible_contacts(&ContactFilter::new());
    assert_lane(&lanes, "a", &["a1", "a2", "a3", "a4"]);
    assert_lane(&lanes, "b", &["b1", "b2"]);
    assert_lane(&lanes, "c", &[]);

    reloaded.unmount().await;
}

#[tokio::test]
async fn test_guard_save_flushes_before_navigation() {
    let server = TestServer::new();
    let sink = Arc::new(CollectingEventSink::new());
    let session = Arc::new(mount(&server, Arc::new(InMemoryBackend::new()), sink.clone()).await);

    session.move_contact("a4", "a", "c", 0).unwrap();

    let navigating = {
        let session = Arc::clone(&session);
        tokio::spawn(async move {
            session
                .request_navigation(NavigationKind::Route("/contacts".to_string()))
                .await
        })
    };
    let prompt = open_prompt(&session).await;
    assert!(session.guard().save(prompt));

    assert_eq!(navigating.await.unwrap(), NavigationOutcome::ProceedAfterSave);
    assert_eq!(server.stage_ids("c"), vec!["a4"]);
    assert_eq!(
        sink.event_types(),
        vec!["guard.intercepted", "sync.succeeded", "guard.saved"]
    );

    session.unmount().await;
}

#[tokio::test]
async fn test_navigation_without_changes_proceeds() {
    let server = TestServer::new();
    let sink = Arc::new(CollectingEventSink::new());
    let session = mount(&server, Arc::new(InMemoryBackend::new()), sink.clone()).await;

    let outcome = session.request_navigation(NavigationKind::Forward).await;

    assert_eq!(outcome, NavigationOutcome::Proceed);
    assert!(sink.is_empty());
    session.unmount().await;
}

#[tokio::test]
async fn test_reload_replays_pending_updates() {
    let server = TestServer::new();
    let backend = InMemoryBackend::new();

    let first = mount(&server, Arc::new(backend.clone()), Arc::new(CollectingEventSink::new())).await;
    first.move_contact("a2", "a", "b", 0).unwrap();
    first.unmount().await;

    // Never flushed, so the server still has the old placement.
    assert_eq!(server.stage_ids("a"), vec!["a1", "a2", "a3", "a4"]);

    let second = mount(&server, Arc::new(backend), Arc::new(CollectingEventSink::new())).await;
    assert_queued(second.queue(), &[("a2", "b", 1)]);
    let lanes = second.visible_contacts(&ContactFilter::new());
    assert_lane(&lanes, "a", &["a1", "a3", "a4"]);
    assert_lane(&lanes, "b", &["a2", "b1", "b2"]);
    assert_contiguous(&lanes);

    second.save().await.unwrap();
    assert_eq!(server.stage_ids("b"), vec!["a2", "b1", "b2"]);
    second.unmount().await;
}

#[tokio::test]
async fn test_queue_survives_restart_on_disk() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let server = TestServer::new();

    let first = mount(&server, Arc::new(FileBackend::new(dir.path())), Arc::new(CollectingEventSink::new())).await;
    first.move_and_assign("b1", "b", "a", 0, "u7")?;
    first.unmount().await;

    let second = mount(&server, Arc::new(FileBackend::new(dir.path())), Arc::new(CollectingEventSink::new())).await;
    assert_eq!(second.queue().len(), 1);
    assert_eq!(second.contact("b1").unwrap().assigned_to, vec!["u7".to_string()]);

    second.save().await?;
    let stored = server
        .repository
        .get("b1")
        .await
        .ok_or_else(|| anyhow::anyhow!("b1 missing from repository"))?;
    assert_eq!(stored.stage_id, "a");
    assert_eq!(stored.order, 1);
    assert_eq!(stored.assigned_to, vec!["u7".to_string()]);
    second.unmount().await;
    Ok(())
}

#[tokio::test]
async fn test_variants_keep_separate_queues() {
    let server = TestServer::new();
    let backend = InMemoryBackend::new();

    let desktop = mount(&server, Arc::new(backend.clone()), Arc::new(CollectingEventSink::new())).await;
    desktop.move_contact("a1", "a", "c", 0).unwrap();
    desktop.unmount().await;

    let mobile = mount_with(
        &server,
        BoardConfig::new().with_variant(BoardVariant::Mobile),
        Arc::new(backend),
        Arc::new(CollectingEventSink::new()),
    )
    .await;
    assert!(mobile.queue().is_empty());
    assert_lane(&mobile.visible_contacts(&ContactFilter::new()), "c", &[]);
    mobile.unmount().await;
}

#[tokio::test]
async fn test_unmount_stops_scheduler() {
    let server = TestServer::new();
    let session = mount(&server, Arc::new(InMemoryBackend::new()), Arc::new(CollectingEventSink::new())).await;
    assert!(session.scheduler().is_running());

    session.unmount().await;
    assert!(!session.is_mounted());
    assert!(!session.scheduler().is_running());

    // A second unmount is a no-op.
    session.unmount().await;
}

#[tokio::test]
async fn test_invalid_interval_fails_mount() {
    let server = TestServer::new();
    let result = BoardSession::mount(
        "p1",
        BoardConfig::new().with_sync_interval_ms(1_000),
        server.collaborators(Arc::new(InMemoryBackend::new()), Arc::new(CollectingEventSink::new())),
    )
    .await;

    let err = tokio_test::assert_err!(result);
    assert!(matches!(err, LeadboardError::Validation(_)));
}

#[tokio::test]
async fn test_reassign_round_robin() {
    let server = TestServer::new();
    let session = mount(&server, Arc::new(InMemoryBackend::new()), Arc::new(CollectingEventSink::new())).await;
    let contacts: Vec<String> = ["a1", "a2", "a3"].iter().map(ToString::to_string).collect();
    let agents = vec!["u1".to_string(), "u2".to_string()];

    let response = session
        .reassign(&contacts, &agents, AssignPolicy::RoundRobin)
        .await
        .unwrap();

    assert!(response.success);
    assert!(response.failures.is_empty());
    let assigned: Vec<(&str, &[String])> = response
        .data
        .iter()
        .map(|d| (d.contact_id.as_str(), d.assigned_to.as_slice()))
        .collect();
    assert_eq!(
        assigned,
        vec![
            ("a1", &agents[0..1]),
            ("a2", &agents[1..2]),
            ("a3", &agents[0..1]),
        ]
    );
    assert_eq!(session.contact("a2").unwrap().assigned_to, vec!["u2".to_string()]);
    assert_eq!(server.repository.get("a3").await.unwrap().assigned_to, vec!["u1".to_string()]);
    assert_eq!(server.activity.for_contact("a1")[0].kind, ActivityKind::AgentAssigned);

    session.unmount().await;
}

#[tokio::test]
async fn test_reassign_without_agents_changes_nothing() {
    let server = TestServer::new();
    let session = mount(&server, Arc::new(InMemoryBackend::new()), Arc::new(CollectingEventSink::new())).await;

    let err = session
        .reassign(&["a1".to_string()], &[], AssignPolicy::Equally)
        .await
        .unwrap_err();

    assert!(matches!(err, LeadboardError::Validation(_)));
    assert!(server.assignments.delivered().is_empty());
    assert!(session.contact("a1").unwrap().assigned_to.is_empty());

    tokio::time::timeout(Duration::from_secs(5), session.unmount())
        .await
        .unwrap();
}
