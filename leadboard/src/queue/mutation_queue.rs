//! Merge, snapshot, and persistence of pending placement updates.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, warn};

use super::DurableQueueBackend;
use crate::errors::StorageError;
use crate::model::PlacementUpdate;

struct QueueInner {
    key: String,
    backend: Arc<dyn DurableQueueBackend>,
    entries: Mutex<Vec<PlacementUpdate>>,
    pending: watch::Sender<usize>,
    /// Bumped on every mutation, under the `entries` lock.
    generation: AtomicU64,
    /// Last generation written to the backend. Held across the write.
    written: tokio::sync::Mutex<u64>,
}

/// Pending placement updates, at most one per (contact, pipeline).
///
/// Cloning is cheap and clones share the same queue.
#[derive(Clone)]
pub struct MutationQueue {
    inner: Arc<QueueInner>,
}

impl std::fmt::Debug for MutationQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MutationQueue")
            .field("key", &self.inner.key)
            .field("pending", &self.len())
            .finish_non_exhaustive()
    }
}

/// Replaces any entry with the same key and appends `update`.
fn merge_into(entries: &mut Vec<PlacementUpdate>, update: PlacementUpdate) {
    entries.retain(|existing| !existing.same_key(&update));
    entries.push(update);
}

impl MutationQueue {
    /// Creates an empty queue. Nothing is read from the backend.
    #[must_use]
    pub fn new(key: impl Into<String>, backend: Arc<dyn DurableQueueBackend>) -> Self {
        let (pending, _) = watch::channel(0);
        Self {
            inner: Arc::new(QueueInner {
                key: key.into(),
                backend,
                entries: Mutex::new(Vec::new()),
                pending,
                generation: AtomicU64::new(0),
                written: tokio::sync::Mutex::new(0),
            }),
        }
    }

    /// Creates a queue and hydrates it from the backend.
    pub async fn mount(key: impl Into<String>, backend: Arc<dyn DurableQueueBackend>) -> Self {
        let queue = Self::new(key, backend);
        queue.load_on_mount().await;
        queue
    }

    /// Returns the durable key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.inner.key
    }

    /// Returns the number of pending updates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.entries.lock().len()
    }

    /// Returns true if nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.entries.lock().is_empty()
    }

    /// Observes the pending count.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<usize> {
        self.inner.pending.subscribe()
    }

    /// Merges updates into the queue and returns the new pending count.
    ///
    /// A newer update for the same (contact, pipeline) replaces the older one
    /// and moves to the end. Malformed updates are dropped. Never fails;
    /// persistence happens in the background.
    pub fn enqueue<I>(&self, updates: I) -> usize
    where
        I: IntoIterator<Item = PlacementUpdate>,
    {
        let count = self.mutate(|entries| {
            for update in updates {
                if !update.is_well_formed() {
                    warn!(contact_id = %update.contact_id, order = update.order, "Dropped malformed placement update");
                    continue;
                }
                debug!(
                    contact_id = %update.contact_id,
                    pipeline_id = %update.pipeline_id,
                    stage_id = %update.stage_id,
                    order = update.order,
                    "Merged placement update"
                );
                merge_into(entries, update);
            }
        });
        self.schedule_persist();
        count
    }

    /// Returns a copy of every pending update without removing anything.
    #[must_use]
    pub fn flush_all(&self) -> Vec<PlacementUpdate> {
        self.inner.entries.lock().clone()
    }

    /// Removes the entries equal to ones in `flushed`.
    ///
    /// Entries replaced by a newer move since the snapshot was taken are not
    /// equal and stay queued. Returns how many entries were removed.
    pub fn acknowledge(&self, flushed: &[PlacementUpdate]) -> usize {
        if flushed.is_empty() {
            return 0;
        }
        let mut removed = 0;
        self.mutate(|entries| {
            let before = entries.len();
            entries.retain(|entry| !flushed.contains(entry));
            removed = before - entries.len();
        });
        self.schedule_persist();
        removed
    }

    /// Drops every pending update and returns what was dropped.
    pub fn clear(&self) -> Vec<PlacementUpdate> {
        let mut dropped = Vec::new();
        self.mutate(|entries| dropped = std::mem::take(entries));
        self.schedule_persist();
        dropped
    }

    /// Replaces the in-memory entries with the persisted ones.
    ///
    /// Missing or unreadable data yields an empty queue. Returns the number
    /// of entries loaded.
    pub async fn load_on_mount(&self) -> usize {
        let loaded = match self.inner.backend.load(&self.inner.key).await {
            Ok(Some(raw)) => match serde_json::from_str::<Vec<PlacementUpdate>>(&raw) {
                Ok(updates) => updates,
                Err(e) => {
                    warn!(key = %self.inner.key, error = %e, "Discarding unreadable persisted queue");
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!(key = %self.inner.key, error = %e, "Failed to read persisted queue");
                Vec::new()
            }
        };

        let count = self.mutate(|entries| {
            entries.clear();
            for update in loaded.into_iter().filter(PlacementUpdate::is_well_formed) {
                merge_into(entries, update);
            }
        });
        debug!(key = %self.inner.key, count, "Hydrated mutation queue");
        count
    }

    /// Writes the current entries to the backend now.
    ///
    /// An empty queue removes the key. A write that has been overtaken by a
    /// newer one is skipped.
    pub async fn persist(&self) -> Result<(), StorageError> {
        let mut written = self.inner.written.lock().await;
        let (generation, snapshot) = {
            let entries = self.inner.entries.lock();
            (self.inner.generation.load(Ordering::SeqCst), entries.clone())
        };
        if generation == *written {
            return Ok(());
        }

        if snapshot.is_empty() {
            self.inner.backend.remove(&self.inner.key).await?;
        } else {
            let value = serde_json::to_string(&snapshot)
                .map_err(|e| StorageError::Backend(format!("queue serialization failed: {e}")))?;
            self.inner.backend.store(&self.inner.key, &value).await?;
        }
        *written = generation;
        Ok(())
    }

    fn mutate<F>(&self, f: F) -> usize
    where
        F: FnOnce(&mut Vec<PlacementUpdate>),
    {
        let count = {
            let mut entries = self.inner.entries.lock();
            f(&mut entries);
            self.inner.generation.fetch_add(1, Ordering::SeqCst);
            entries.len()
        };
        self.inner.pending.send_replace(count);
        count
    }

    fn schedule_persist(&self) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            debug!(key = %self.inner.key, "No runtime, queue persisted on next explicit write");
            return;
        };
        let queue = self.clone();
        handle.spawn(async move {
            if let Err(e) = queue.persist().await {
                warn!(key = %queue.inner.key, error = %e, "Failed to persist mutation queue");
            }
        });
    }
}
