//! Client-side collaborators for the flush and assignment calls.

use async_trait::async_trait;

use crate::contracts::{AssignRequest, AssignResponse, FlushRequest, FlushResponse};
use crate::errors::NetworkError;

/// Sends a batch of placement updates to the reconciliation endpoint.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PlacementTransport: Send + Sync {
    /// Sends one batch. Any transport-level failure is a [`NetworkError`].
    async fn send_batch(&self, request: FlushRequest) -> Result<FlushResponse, NetworkError>;
}

/// Sends an assignment request to the assignment endpoint.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AssignmentTransport: Send + Sync {
    /// Sends one request.
    async fn assign(&self, request: AssignRequest) -> Result<AssignResponse, NetworkError>;
}
