//! Typed events emitted by the board and the reconciliation endpoint.

use serde_json::json;
use uuid::Uuid;

use crate::errors::ItemFailure;

/// Something a user should be told about, or an operator should see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardEvent {
    /// A flush was fully applied.
    SyncSucceeded {
        /// Updates in the batch.
        count: usize,
        /// Batch digest.
        digest: String,
    },
    /// A flush failed; the queue is unchanged.
    SyncFailed {
        /// Updates in the batch.
        count: usize,
        /// Batch digest.
        digest: String,
        /// Failure description.
        message: String,
    },
    /// A flush was processed but some items did not apply.
    SyncPartial {
        /// Items that applied.
        applied: usize,
        /// Items that did not.
        failures: Vec<ItemFailure>,
    },
    /// Navigation was suspended because of unsaved changes.
    GuardIntercepted {
        /// The prompt id.
        prompt_id: Uuid,
        /// Pending updates at the time of the attempt.
        pending: usize,
        /// The attempted navigation.
        navigation: String,
    },
    /// The user chose Save and the flush succeeded.
    GuardSaved {
        /// The prompt id.
        prompt_id: Uuid,
    },
    /// The user chose Discard.
    GuardDiscarded {
        /// The prompt id.
        prompt_id: Uuid,
        /// Updates dropped.
        discarded: usize,
    },
    /// Navigation stayed blocked.
    GuardBlocked {
        /// The prompt id.
        prompt_id: Uuid,
        /// Why.
        reason: String,
    },
    /// A reconciliation batch was processed server side.
    PlacementsApplied {
        /// Items that applied.
        applied: usize,
        /// Items that failed.
        failed: usize,
    },
}

impl BoardEvent {
    /// Returns the dotted event type.
    #[must_use]
    pub const fn event_type(&self) -> &'static str {
        match self {
            Self::SyncSucceeded { .. } => "sync.succeeded",
            Self::SyncFailed { .. } => "sync.failed",
            Self::SyncPartial { .. } => "sync.partial",
            Self::GuardIntercepted { .. } => "guard.intercepted",
            Self::GuardSaved { .. } => "guard.saved",
            Self::GuardDiscarded { .. } => "guard.discarded",
            Self::GuardBlocked { .. } => "guard.blocked",
            Self::PlacementsApplied { .. } => "reconcile.applied",
        }
    }

    /// Returns true for events the user should see as an error notification.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(
            self,
            Self::SyncFailed { .. } | Self::SyncPartial { .. } | Self::GuardBlocked { .. }
        )
    }

    /// Returns the notification text shown to the user.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::SyncSucceeded { count, .. } => format!("Saved {count} change(s)"),
            Self::SyncFailed { .. } => {
                "Could not save changes. They will be retried automatically".to_string()
            }
            Self::SyncPartial { failures, .. } => {
                format!("{} change(s) could not be saved", failures.len())
            }
            Self::GuardIntercepted { pending, .. } => {
                format!("You have {pending} unsaved change(s)")
            }
            Self::GuardSaved { .. } => "Changes saved".to_string(),
            Self::GuardDiscarded { discarded, .. } => format!("Discarded {discarded} change(s)"),
            Self::GuardBlocked { reason, .. } => format!("Navigation cancelled: {reason}"),
            Self::PlacementsApplied { applied, failed } => {
                format!("Applied {applied} placement(s), {failed} failed")
            }
        }
    }

    /// Returns the structured event data.
    #[must_use]
    pub fn payload(&self) -> serde_json::Value {
        match self {
            Self::SyncSucceeded { count, digest } => json!({"count": count, "digest": digest}),
            Self::SyncFailed { count, digest, message } => {
                json!({"count": count, "digest": digest, "error": message})
            }
            Self::SyncPartial { applied, failures } => {
                json!({"applied": applied, "failures": failures})
            }
            Self::GuardIntercepted {
                prompt_id,
                pending,
                navigation,
            } => json!({"promptId": prompt_id, "pending": pending, "navigation": navigation}),
            Self::GuardSaved { prompt_id } => json!({"promptId": prompt_id}),
            Self::GuardDiscarded { prompt_id, discarded } => {
                json!({"promptId": prompt_id, "discarded": discarded})
            }
            Self::GuardBlocked { prompt_id, reason } => {
                json!({"promptId": prompt_id, "reason": reason})
            }
            Self::PlacementsApplied { applied, failed } => {
                json!({"applied": applied, "failed": failed})
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_types() {
        let event = BoardEvent::SyncSucceeded {
            count: 2,
            digest: "batch:ab".to_string(),
        };
        assert_eq!(event.event_type(), "sync.succeeded");
        assert!(!event.is_error());
        assert_eq!(event.payload()["count"], 2);
        assert_eq!(event.message(), "Saved 2 change(s)");

        let blocked = BoardEvent::GuardBlocked {
            prompt_id: Uuid::nil(),
            reason: "dismissed".to_string(),
        };
        assert_eq!(blocked.event_type(), "guard.blocked");
        assert!(blocked.is_error());
    }

    #[test]
    fn test_partial_payload_lists_failures() {
        let event = BoardEvent::SyncPartial {
            applied: 1,
            failures: vec![ItemFailure::new("c1", "contact not found")],
        };
        assert_eq!(event.payload()["failures"][0]["contactId"], "c1");
        assert_eq!(event.message(), "1 change(s) could not be saved");
    }
}
