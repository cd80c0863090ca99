//! In-process transports for exercising the client against the server.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::contracts::{AssignRequest, AssignResponse, FlushRequest, FlushResponse};
use crate::errors::NetworkError;
use crate::server::{AssignmentService, BatchReconciler};
use crate::sync::{AssignmentTransport, PlacementTransport};

/// A flush transport that calls a [`BatchReconciler`] directly.
///
/// Records every request and can be switched offline.
#[derive(Debug)]
pub struct LoopbackTransport {
    reconciler: Arc<BatchReconciler>,
    offline: AtomicBool,
    requests: Mutex<Vec<FlushRequest>>,
    calls: AtomicUsize,
}

impl LoopbackTransport {
    /// Creates a transport in front of a reconciler.
    #[must_use]
    pub fn new(reconciler: Arc<BatchReconciler>) -> Self {
        Self {
            reconciler,
            offline: AtomicBool::new(false),
            requests: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Makes every following call fail (or succeed again).
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Returns how many calls were made, including failed ones.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Returns the requests that reached the server.
    #[must_use]
    pub fn delivered(&self) -> Vec<FlushRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl PlacementTransport for LoopbackTransport {
    async fn send_batch(&self, request: FlushRequest) -> Result<FlushResponse, NetworkError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            return Err(NetworkError::new("connection refused").with_status(503));
        }

        self.requests.lock().push(request.clone());
        self.reconciler
            .reconcile(request)
            .await
            .map_err(|e| NetworkError::new(e.to_string()).with_status(400))
    }
}

/// An assignment transport that calls an [`AssignmentService`] directly.
#[derive(Debug)]
pub struct LoopbackAssignments {
    service: Arc<AssignmentService>,
    requests: Mutex<Vec<AssignRequest>>,
}

impl LoopbackAssignments {
    /// Creates a transport in front of a service.
    #[must_use]
    pub fn new(service: Arc<AssignmentService>) -> Self {
        Self {
            service,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Returns the requests sent so far.
    #[must_use]
    pub fn delivered(&self) -> Vec<AssignRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl AssignmentTransport for LoopbackAssignments {
    async fn assign(&self, request: AssignRequest) -> Result<AssignResponse, NetworkError> {
        self.requests.lock().push(request.clone());
        self.service
            .assign(request)
            .await
            .map_err(|e| NetworkError::new(e.to_string()).with_status(422))
    }
}
