//! Testing utilities for boards and endpoints.
//!
//! This module provides:
//! - In-process transports wired to the server endpoints
//! - A seeded server fixture
//! - Board assertions

mod assertions;
mod fixtures;
mod mocks;

pub use assertions::{assert_contiguous, assert_lane, assert_queued};
pub use fixtures::{sample_pipeline, TestServer};
pub use mocks::{LoopbackAssignments, LoopbackTransport};
