//! The batch reconciliation endpoint.

use futures::future::join_all;
use std::sync::Arc;
use tracing::{info, warn};

use super::{ActivityLog, ContactRepository};
use crate::config::ReconcileConfig;
use crate::contracts::{FlushRequest, FlushResponse};
use crate::errors::{ItemFailure, ValidationError};
use crate::events::{BoardEvent, EventSink, NoOpEventSink};
use crate::model::{ActivityRecord, Contact, PlacementUpdate};
use crate::observability::SpanTimer;

/// Applies queued placement updates as independent single-document writes.
///
/// Items succeed or fail on their own and nothing is rolled back as a unit.
/// Re-applying an applied update changes nothing and logs no activity, so
/// clients may retry a batch after an ambiguous failure.
pub struct BatchReconciler {
    repository: Arc<dyn ContactRepository>,
    activity: Arc<dyn ActivityLog>,
    sink: Arc<dyn EventSink>,
    config: ReconcileConfig,
}

impl std::fmt::Debug for BatchReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchReconciler")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl BatchReconciler {
    /// Creates a reconciler.
    #[must_use]
    pub fn new(repository: Arc<dyn ContactRepository>, activity: Arc<dyn ActivityLog>, config: ReconcileConfig) -> Self {
        Self {
            repository,
            activity,
            sink: Arc::new(NoOpEventSink),
            config,
        }
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Applies a batch.
    ///
    /// `data` holds the applied contacts as stored once the whole batch is
    /// done. Items that did not apply are listed in `failures`.
    ///
    /// # Errors
    ///
    /// Rejects the whole batch, before any write, when it exceeds the
    /// configured size.
    pub async fn reconcile(&self, request: FlushRequest) -> Result<FlushResponse, ValidationError> {
        if request.len() > self.config.max_batch_size {
            return Err(ValidationError::BatchTooLarge {
                size: request.len(),
                max: self.config.max_batch_size,
            });
        }

        let timer = SpanTimer::start("reconcile.batch");
        let results = join_all(request.updates.iter().map(|update| self.apply_one(update))).await;

        let mut applied_ids = Vec::new();
        let mut failures = Vec::new();
        for result in results {
            match result {
                Ok(contact_id) => {
                    if !applied_ids.contains(&contact_id) {
                        applied_ids.push(contact_id);
                    }
                }
                Err(failure) => failures.push(failure),
            }
        }

        let data: Vec<Contact> = join_all(applied_ids.iter().map(|id| self.repository.get(id)))
            .await
            .into_iter()
            .flatten()
            .collect();

        info!(
            received = request.len(),
            applied = request.len() - failures.len(),
            failed = failures.len(),
            duration_ms = timer.finish(),
            "Reconciled placement batch"
        );
        self.sink
            .emit(BoardEvent::PlacementsApplied {
                applied: request.len() - failures.len(),
                failed: failures.len(),
            })
            .await;

        Ok(FlushResponse::ok(data).with_failures(failures))
    }

    async fn apply_one(&self, update: &PlacementUpdate) -> Result<String, ItemFailure> {
        let change = self.repository.apply_placement(update).await.map_err(|e| {
            warn!(contact_id = %update.contact_id, error = %e, "Placement not applied");
            ItemFailure::new(&update.contact_id, e.to_string()).with_pipeline(&update.pipeline_id)
        })?;

        if change.changed {
            let mut record = ActivityRecord::stage_changed(
                &change.contact.id,
                &change.previous.stage_id,
                &change.contact.stage_id,
                change.contact.order,
            );
            if let Some(ref agent) = update.agent_id {
                record = record.with_actor(agent);
            }
            if let Err(e) = self.activity.append(record).await {
                warn!(contact_id = %change.contact.id, error = %e, "Failed to record activity");
            }
        }

        Ok(change.contact.id)
    }
}
