//! Deterministic distribution of subjects (contacts) to resources (agents).
//!
//! Shared by drag-reassignment on the board and bulk lead intake on the
//! server. Identical ordered inputs always produce identical output.

mod distributor;
mod policy;

pub use distributor::{distribute, Assignment, AssignmentRequest, AssignmentResult};
pub use policy::AssignPolicy;
