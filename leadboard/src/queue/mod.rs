//! The durable mutation queue.
//!
//! Pending placement changes live in memory and are mirrored to a
//! [`DurableQueueBackend`] so they survive a reload. The in-memory list is
//! the source of truth; the backend is only a durability backstop.

mod backend;
mod file;
mod mutation_queue;
#[cfg(feature = "sqlite")]
mod sqlite;

pub use backend::{DurableQueueBackend, InMemoryBackend};
pub use file::FileBackend;
pub use mutation_queue::MutationQueue;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteBackend;

#[cfg(test)]
pub(crate) use backend::MockDurableQueueBackend;
