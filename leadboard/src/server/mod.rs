//! Server-side endpoints and their storage collaborators.
//!
//! Each batch item is an independent single-document write. Nothing spans a
//! batch, and concurrent writers to the same contact resolve by last write.

mod activity;
mod assign;
mod reconcile;
mod repository;

pub use activity::{ActivityLog, InMemoryActivityLog};
pub use assign::AssignmentService;
pub use reconcile::BatchReconciler;
pub use repository::{ContactRepository, InMemoryContactRepository, PlacementChange};
