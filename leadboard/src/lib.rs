//! # Leadboard
//!
//! A kanban board of sales contacts across pipeline stages, with
//! optimistic local edits that reach the server in the background.
//!
//! Leadboard provides:
//!
//! - **Board state**: ordered stage lanes with contiguous 1-based ordering
//! - **Durable queue**: pending placement changes that survive reloads
//! - **Sync scheduling**: periodic and manual flushes, one at a time
//! - **Navigation guarding**: save or discard prompts for unsaved changes
//! - **Assignment**: EVERY, EQUALLY, and `ROUND_ROBIN` distribution
//! - **Server endpoints**: batch reconciliation and assignment with activity records
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use leadboard::prelude::*;
//!
//! let session = BoardSession::mount("p1", BoardConfig::default(), collaborators).await?;
//!
//! // Drag a contact to the top of another stage
//! session.move_contact("c1", "new", "qualified", 0)?;
//!
//! // Flush without waiting for the timer
//! session.save().await?;
//!
//! session.unmount().await;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod assignment;
pub mod board;
pub mod cancellation;
pub mod config;
pub mod contracts;
pub mod errors;
pub mod events;
pub mod guard;
pub mod model;
pub mod observability;
pub mod queue;
pub mod server;
pub mod session;
pub mod sync;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::assignment::{distribute, AssignPolicy, AssignmentRequest, AssignmentResult};
    pub use crate::board::{BoardLoader, BoardStore, ContactFilter, ContactListing, LaneView};
    pub use crate::cancellation::CancellationToken;
    pub use crate::config::{BoardConfig, BoardVariant, ReconcileConfig};
    pub use crate::contracts::{AssignRequest, AssignResponse, FlushRequest, FlushResponse};
    pub use crate::errors::{
        BoardError, ItemFailure, LeadboardError, NetworkError, PartialApplicationError,
        StorageError, ValidationError,
    };
    pub use crate::events::{BoardEvent, EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::guard::{NavigationGuard, NavigationKind, NavigationOutcome};
    pub use crate::model::{Contact, Pipeline, PlacementUpdate, Stage};
    pub use crate::queue::{DurableQueueBackend, FileBackend, InMemoryBackend, MutationQueue};
    pub use crate::server::{AssignmentService, BatchReconciler, InMemoryContactRepository};
    pub use crate::session::{BoardCollaborators, BoardSession};
    pub use crate::sync::{AssignmentTransport, FlushOutcome, PlacementTransport, SyncScheduler};
}
