//! Durable key-value backends for the mutation queue.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

use crate::errors::StorageError;

/// A durable, reload-surviving key-value store.
///
/// The queue keeps its serialized entries under a single key.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DurableQueueBackend: Send + Sync {
    /// Reads the value under `key`, if any.
    async fn load(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Writes `value` under `key`, replacing any previous value.
    async fn store(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Removes `key`. Removing a missing key is not an error.
    async fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Backend that lives only as long as the process.
///
/// Clones share the same map, which lets tests simulate a reload by
/// building a second queue on a clone.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBackend {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl InMemoryBackend {
    /// Creates an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes a raw value, bypassing the queue.
    pub fn insert_raw(&self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.lock().insert(key.into(), value.into());
    }

    /// Returns the raw value under `key`.
    #[must_use]
    pub fn get_raw(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    /// Returns the number of keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns true if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[async_trait]
impl DurableQueueBackend for InMemoryBackend {
    async fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    async fn store(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries.lock().remove(key);
        Ok(())
    }
}
