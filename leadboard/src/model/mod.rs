//! Core domain model types for the lead board.
//!
//! This module contains the entities shared by the client board and the
//! server endpoints:
//! - Pipelines and their ordered stages
//! - Contacts and their placements
//! - Queued placement updates
//! - Activity (audit) records

mod activity;
mod contact;
mod placement;
mod stage;

pub use activity::{ActivityKind, ActivityRecord};
pub use contact::{Contact, Placement};
pub use placement::{PlacementKey, PlacementUpdate};
pub use stage::{Pipeline, Stage};
