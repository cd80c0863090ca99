//! Activity (audit) log collaborator.

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::errors::ApplyError;
use crate::model::ActivityRecord;

/// Appends audit records to contact timelines.
#[async_trait]
pub trait ActivityLog: Send + Sync {
    /// Appends one record.
    async fn append(&self, record: ActivityRecord) -> Result<(), ApplyError>;
}

/// Keeps records in memory, in append order.
#[derive(Debug, Default)]
pub struct InMemoryActivityLog {
    records: RwLock<Vec<ActivityRecord>>,
}

impl InMemoryActivityLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a contact's records, oldest first.
    #[must_use]
    pub fn for_contact(&self, contact_id: &str) -> Vec<ActivityRecord> {
        self.records
            .read()
            .iter()
            .filter(|r| r.contact_id == contact_id)
            .cloned()
            .collect()
    }

    /// Returns every record.
    #[must_use]
    pub fn all(&self) -> Vec<ActivityRecord> {
        self.records.read().clone()
    }

    /// Returns the number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Returns true if nothing was logged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

#[async_trait]
impl ActivityLog for InMemoryActivityLog {
    async fn append(&self, record: ActivityRecord) -> Result<(), ApplyError> {
        self.records.write().push(record);
        Ok(())
    }
}
