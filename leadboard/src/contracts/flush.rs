//! The batch flush call.

use serde::{Deserialize, Serialize};

use crate::errors::ItemFailure;
use crate::model::{Contact, PlacementUpdate};

/// `{ updates: PlacementUpdate[] }`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlushRequest {
    /// The queued updates, in queue order.
    pub updates: Vec<PlacementUpdate>,
}

impl FlushRequest {
    /// Creates a request.
    #[must_use]
    pub fn new(updates: Vec<PlacementUpdate>) -> Self {
        Self { updates }
    }

    /// Returns the number of updates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.updates.len()
    }

    /// Returns true if there are no updates.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }
}

/// `{ success, data: Contact[], failures? }`
///
/// `success` means the batch was processed. Items that did not apply are
/// listed in `failures`, which is omitted when empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlushResponse {
    /// Whether the batch was processed.
    pub success: bool,
    /// The contacts as stored after the batch.
    #[serde(default)]
    pub data: Vec<Contact>,
    /// Items that did not apply.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<ItemFailure>,
}

impl FlushResponse {
    /// A processed batch.
    #[must_use]
    pub fn ok(data: Vec<Contact>) -> Self {
        Self {
            success: true,
            data,
            failures: Vec::new(),
        }
    }

    /// Attaches per-item failures.
    #[must_use]
    pub fn with_failures(mut self, failures: Vec<ItemFailure>) -> Self {
        self.failures = failures;
        self
    }

    /// Returns true if the batch was processed and every item applied.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.success && self.failures.is_empty()
    }

    /// Returns the updates of `sent` that did not fail.
    #[must_use]
    pub fn applied<'a>(&self, sent: &'a [PlacementUpdate]) -> Vec<&'a PlacementUpdate> {
        sent.iter()
            .filter(|update| {
                !self.failures.iter().any(|f| {
                    f.contact_id == update.contact_id
                        && f.pipeline_id.as_deref().map_or(true, |p| p == update.pipeline_id)
                })
            })
            .collect()
    }
}
