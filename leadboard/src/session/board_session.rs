//! Mount, interact, save, unmount.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::assignment::{distribute, AssignPolicy, AssignmentRequest};
use crate::board::{BoardLoader, BoardStore, ContactFilter, ContactListing, LaneView};
use crate::config::BoardConfig;
use crate::contracts::{AssignRequest, AssignResponse};
use crate::errors::Result;
use crate::events::EventSink;
use crate::guard::{NavigationGuard, NavigationKind, NavigationOutcome};
use crate::model::{Contact, PlacementUpdate};
use crate::queue::{DurableQueueBackend, MutationQueue};
use crate::sync::{AssignmentTransport, FlushOutcome, FlushTrigger, PlacementTransport, RefetchHook, SyncScheduler};

/// External collaborators a session talks to.
#[derive(Clone)]
pub struct BoardCollaborators {
    /// Stage and contact listing.
    pub listing: Arc<dyn ContactListing>,
    /// The flush call.
    pub transport: Arc<dyn PlacementTransport>,
    /// The assignment call.
    pub assignments: Arc<dyn AssignmentTransport>,
    /// Durable storage for the queue.
    pub backend: Arc<dyn DurableQueueBackend>,
    /// Notifications.
    pub sink: Arc<dyn EventSink>,
}

/// Loads authoritative state and replays pending updates on top.
struct StoreRefresher {
    pipeline_id: String,
    loader: BoardLoader,
    queue: MutationQueue,
    store: Arc<RwLock<BoardStore>>,
}

impl StoreRefresher {
    async fn reload(&self) -> Result<()> {
        let mut fresh = self.loader.load(&self.pipeline_id).await?;
        let replayed = replay_pending(&mut fresh, &self.queue.flush_all());
        *self.store.write() = fresh;
        debug!(pipeline_id = %self.pipeline_id, replayed, "Board reloaded");
        Ok(())
    }
}

#[async_trait]
impl RefetchHook for StoreRefresher {
    async fn refetch(&self) -> Result<()> {
        self.reload().await
    }
}

fn replay_pending(store: &mut BoardStore, pending: &[PlacementUpdate]) -> usize {
    let mut replayed = 0;
    for update in pending {
        match store.apply_update(update) {
            Ok(true) => replayed += 1,
            Ok(false) => {}
            Err(e) => warn!(contact_id = %update.contact_id, error = %e, "Pending update no longer applies"),
        }
    }
    replayed
}

/// One mounted board.
///
/// Dropping the session cancels its periodic flush; [`BoardSession::unmount`]
/// also waits for the task and writes the queue out.
pub struct BoardSession {
    pipeline_id: String,
    config: BoardConfig,
    store: Arc<RwLock<BoardStore>>,
    queue: MutationQueue,
    scheduler: Arc<SyncScheduler>,
    guard: NavigationGuard,
    refresher: Arc<StoreRefresher>,
    assignments: Arc<dyn AssignmentTransport>,
    mounted: AtomicBool,
}

impl std::fmt::Debug for BoardSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoardSession")
            .field("pipeline_id", &self.pipeline_id)
            .field("variant", &self.config.variant)
            .field("pending", &self.queue.len())
            .field("mounted", &self.is_mounted())
            .finish_non_exhaustive()
    }
}

impl BoardSession {
    /// Mounts a board.
    ///
    /// Hydrates the queue, loads the board, replays pending updates, and
    /// starts the periodic flush.
    ///
    /// # Errors
    ///
    /// Fails on invalid configuration or when the board cannot be loaded.
    pub async fn mount(pipeline_id: impl Into<String>, config: BoardConfig, collaborators: BoardCollaborators) -> Result<Self> {
        config.validate()?;
        let pipeline_id = pipeline_id.into();

        let queue = MutationQueue::mount(config.queue_key(), collaborators.backend).await;
        let loader = BoardLoader::new(collaborators.listing, config.contact_page_size);

        let mut store = loader.load(&pipeline_id).await?;
        let replayed = replay_pending(&mut store, &queue.flush_all());
        let store = Arc::new(RwLock::new(store));

        let refresher = Arc::new(StoreRefresher {
            pipeline_id: pipeline_id.clone(),
            loader,
            queue: queue.clone(),
            store: Arc::clone(&store),
        });

        let mut scheduler = SyncScheduler::new(
            queue.clone(),
            collaborators.transport,
            Arc::clone(&collaborators.sink),
            config.sync_interval(),
        );
        if config.refetch_after_flush {
            scheduler = scheduler.with_refetch(refresher.clone());
        }
        let scheduler = Arc::new(scheduler);
        scheduler.start();

        let guard = NavigationGuard::new(queue.clone(), Arc::clone(&scheduler), collaborators.sink);

        info!(
            %pipeline_id,
            variant = %config.variant,
            pending = queue.len(),
            replayed,
            "Board mounted"
        );

        Ok(Self {
            pipeline_id,
            config,
            store,
            queue,
            scheduler,
            guard,
            refresher,
            assignments: collaborators.assignments,
            mounted: AtomicBool::new(true),
        })
    }

    /// Returns the pipeline id.
    #[must_use]
    pub fn pipeline_id(&self) -> &str {
        &self.pipeline_id
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &BoardConfig {
        &self.config
    }

    /// Returns the mutation queue.
    #[must_use]
    pub fn queue(&self) -> &MutationQueue {
        &self.queue
    }

    /// Returns the scheduler.
    #[must_use]
    pub fn scheduler(&self) -> &SyncScheduler {
        &self.scheduler
    }

    /// Returns the navigation guard.
    #[must_use]
    pub fn guard(&self) -> &NavigationGuard {
        &self.guard
    }

    /// Returns true until [`BoardSession::unmount`].
    #[must_use]
    pub fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::SeqCst)
    }

    /// Returns a contact as currently shown.
    #[must_use]
    pub fn contact(&self, contact_id: &str) -> Option<Contact> {
        self.store.read().contact(contact_id).cloned()
    }

    /// Returns the render-ready board.
    #[must_use]
    pub fn visible_contacts(&self, filter: &ContactFilter) -> Vec<LaneView> {
        self.store.read().visible_contacts(filter)
    }

    /// Moves a contact on the board and queues the change.
    ///
    /// # Errors
    ///
    /// Fails, with nothing queued, if the move is invalid.
    pub fn move_contact(&self, contact_id: &str, from_stage: &str, to_stage: &str, target_index: usize) -> Result<PlacementUpdate> {
        let update = self
            .store
            .write()
            .move_contact(contact_id, from_stage, to_stage, target_index)?;
        self.queue.enqueue([update.clone()]);
        Ok(update)
    }

    /// Moves a contact and reassigns it to one agent in the same gesture.
    ///
    /// # Errors
    ///
    /// Fails, with nothing queued, if the move is invalid.
    pub fn move_and_assign(
        &self,
        contact_id: &str,
        from_stage: &str,
        to_stage: &str,
        target_index: usize,
        agent_id: &str,
    ) -> Result<PlacementUpdate> {
        let update = {
            let mut store = self.store.write();
            let update = store.move_contact(contact_id, from_stage, to_stage, target_index)?;
            store.assign_agent(contact_id, agent_id)?;
            update.with_agent(agent_id)
        };
        self.queue.enqueue([update.clone()]);
        Ok(update)
    }

    /// Moves a contact to the end of another stage and queues the change.
    ///
    /// # Errors
    ///
    /// Fails, with nothing queued, if the contact or stage is unknown.
    pub fn select_stage(&self, contact_id: &str, to_stage: &str) -> Result<PlacementUpdate> {
        let update = self.store.write().select_stage(contact_id, to_stage)?;
        self.queue.enqueue([update.clone()]);
        Ok(update)
    }

    /// Flushes now. A Save while a flush is in flight returns `Skipped`.
    ///
    /// # Errors
    ///
    /// See [`SyncScheduler::flush_now`].
    pub async fn save(&self) -> Result<FlushOutcome> {
        self.scheduler.flush_now(FlushTrigger::Manual).await
    }

    /// Distributes contacts to agents, shows the result, and sends it.
    ///
    /// The local board is updated before the call and is not rolled back if
    /// the call fails.
    ///
    /// # Errors
    ///
    /// Fails before any change when there are no agents, or with a network
    /// error from the assignment call.
    pub async fn reassign(&self, contact_ids: &[String], agent_ids: &[String], policy: AssignPolicy) -> Result<AssignResponse> {
        let result = distribute(&AssignmentRequest::new(contact_ids.iter().cloned(), agent_ids.iter().cloned(), policy))?;
        let applied = self.store.write().apply_assignment(&result);
        debug!(%policy, contacts = result.len(), applied, "Applied assignment locally");

        let request = AssignRequest::new(contact_ids.iter().cloned(), agent_ids.iter().cloned(), policy);
        let response = self.assignments.assign(request).await?;
        if !response.failures.is_empty() {
            warn!(failed = response.failures.len(), "Some contacts were not assigned");
        }
        Ok(response)
    }

    /// Reloads the board from the server and replays pending updates.
    ///
    /// # Errors
    ///
    /// Fails if the board cannot be loaded; the current view is kept.
    pub async fn refresh(&self) -> Result<()> {
        self.refresher.reload().await
    }

    /// Asks the guard whether navigation may proceed.
    pub async fn request_navigation(&self, kind: NavigationKind) -> NavigationOutcome {
        self.guard.request_navigation(kind, self.config.guard_timeout()).await
    }

    /// Stops the periodic flush and writes the queue out. Idempotent.
    pub async fn unmount(&self) {
        if !self.mounted.swap(false, Ordering::SeqCst) {
            return;
        }
        self.scheduler.stop().await;
        if let Err(e) = self.queue.persist().await {
            warn!(key = %self.queue.key(), error = %e, "Failed to persist queue on unmount");
        }
        info!(pipeline_id = %self.pipeline_id, pending = self.queue.len(), "Board unmounted");
    }
}
