//! A seeded in-process server.

use std::sync::Arc;

use super::{LoopbackAssignments, LoopbackTransport};
use crate::board::ContactListing;
use crate::config::ReconcileConfig;
use crate::events::EventSink;
use crate::model::{Contact, Pipeline, Stage};
use crate::queue::DurableQueueBackend;
use crate::server::{AssignmentService, BatchReconciler, InMemoryActivityLog, InMemoryContactRepository};
use crate::session::BoardCollaborators;

/// Pipeline `p1` with stages `a`, `b`, `c`, in that order.
#[must_use]
pub fn sample_pipeline() -> Pipeline {
    // Orders are unique and the ids distinct, so this cannot fail.
    Pipeline::new(
        "p1",
        "Sales",
        vec![
            Stage::new("a", "New", 1).with_probability(10),
            Stage::new("b", "Qualified", 2).with_probability(50),
            Stage::new("c", "Won", 3).with_probability(100),
        ],
    )
    .unwrap_or_else(|e| panic!("sample pipeline is invalid: {e}"))
}

/// Repository, activity log, endpoints, and loopback transports.
///
/// Seeded with `a = [a1, a2, a3, a4]` and `b = [b1, b2]`.
#[derive(Debug)]
pub struct TestServer {
    /// Contact storage.
    pub repository: Arc<InMemoryContactRepository>,
    /// Activity timeline.
    pub activity: Arc<InMemoryActivityLog>,
    /// Flush transport.
    pub transport: Arc<LoopbackTransport>,
    /// Assignment transport.
    pub assignments: Arc<LoopbackAssignments>,
}

impl Default for TestServer {
    fn default() -> Self {
        Self::new()
    }
}

impl TestServer {
    /// Creates a seeded server.
    #[must_use]
    pub fn new() -> Self {
        let repository = Arc::new(InMemoryContactRepository::new());
        repository.set_pipeline(sample_pipeline());
        for (order, id) in (1..).zip(["a1", "a2", "a3", "a4"]) {
            repository.insert_contact(Contact::new(id, "p1", "a", order).with_name(format!("Lead {id}")));
        }
        for (order, id) in (1..).zip(["b1", "b2"]) {
            repository.insert_contact(Contact::new(id, "p1", "b", order).with_name(format!("Lead {id}")));
        }

        let activity = Arc::new(InMemoryActivityLog::new());
        let reconciler = Arc::new(BatchReconciler::new(
            repository.clone(),
            activity.clone(),
            ReconcileConfig::default(),
        ));
        let service = Arc::new(AssignmentService::new(repository.clone(), activity.clone()));

        Self {
            transport: Arc::new(LoopbackTransport::new(reconciler)),
            assignments: Arc::new(LoopbackAssignments::new(service)),
            repository,
            activity,
        }
    }

    /// Returns session collaborators wired to this server.
    #[must_use]
    pub fn collaborators(&self, backend: Arc<dyn DurableQueueBackend>, sink: Arc<dyn EventSink>) -> BoardCollaborators {
        BoardCollaborators {
            listing: self.repository.clone() as Arc<dyn ContactListing>,
            transport: self.transport.clone(),
            assignments: self.assignments.clone(),
            backend,
            sink,
        }
    }

    /// Returns the ids of a stage, in stored order.
    #[must_use]
    pub fn stage_ids(&self, stage_id: &str) -> Vec<String> {
        self.repository
            .lane("p1", stage_id)
            .into_iter()
            .map(|c| c.id)
            .collect()
    }
}
