//! Draining the mutation queue to the server.
//!
//! A periodic timer and the manual Save action share one flush routine.
//! At most one flush is in flight at a time.

mod digest;
mod scheduler;
mod transport;

pub use digest::batch_digest;
pub use scheduler::{FlushHold, FlushOutcome, FlushTrigger, RefetchHook, SyncScheduler};
pub use transport::{AssignmentTransport, PlacementTransport};

#[cfg(test)]
pub(crate) use transport::{MockAssignmentTransport, MockPlacementTransport};
