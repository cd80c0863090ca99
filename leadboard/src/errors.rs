//! Error types for the lead board.
//!
//! The taxonomy separates request-local validation failures, recoverable
//! network failures, and batches that were only partially applied. Stale
//! overwrites from racing sessions are not detected (last write wins) and
//! therefore have no variant here.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, LeadboardError>;

/// The main error type for lead board operations.
#[derive(Debug, Error)]
pub enum LeadboardError {
    /// A request failed validation and will not be retried.
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// The flush or assignment call failed at the transport level.
    #[error("{0}")]
    Network(#[from] NetworkError),

    /// The server processed a batch but some items did not apply.
    #[error("{0}")]
    PartialApplication(#[from] PartialApplicationError),

    /// A local board mutation referenced something that is not on the board.
    #[error("{0}")]
    Board(#[from] BoardError),

    /// The durable queue backend failed.
    #[error("{0}")]
    Storage(#[from] StorageError),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl LeadboardError {
    /// Returns the stable error type name used in API payloads.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "ValidationError",
            Self::Network(_) => "NetworkError",
            Self::PartialApplication(_) => "PartialApplicationError",
            Self::Board(_) => "BoardError",
            Self::Storage(_) => "StorageError",
            Self::Serialization(_) => "SerializationError",
            Self::Internal(_) => "InternalError",
        }
    }

    /// Returns true when retrying the same request later may succeed.
    ///
    /// Partially applied batches are retryable because reconciliation is
    /// idempotent: items that already applied are no-ops the second time.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::PartialApplication(_))
    }

    /// Converts to a dictionary representation for form-level display.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("type".to_string(), serde_json::json!(self.kind()));
        map.insert("message".to_string(), serde_json::json!(self.to_string()));
        map.insert("retryable".to_string(), serde_json::json!(self.is_retryable()));

        match self {
            Self::Validation(err) => {
                map.insert("field".to_string(), serde_json::json!(err.field()));
            }
            Self::PartialApplication(err) => {
                map.insert("applied".to_string(), serde_json::json!(err.applied));
                map.insert("failures".to_string(), serde_json::json!(err.failures));
            }
            _ => {}
        }

        map
    }
}

impl From<serde_json::Error> for LeadboardError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Errors raised before any work is attempted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A distribution was requested with no resources to distribute to.
    #[error("Invalid assignment: cannot distribute {subjects} subject(s) to zero resources")]
    InvalidAssignment {
        /// Number of subjects in the request.
        subjects: usize,
    },

    /// The same resource was listed more than once.
    #[error("Invalid assignment: resource '{resource_id}' is listed more than once")]
    DuplicateResource {
        /// The repeated resource id.
        resource_id: String,
    },

    /// A configuration value is out of range.
    #[error("Invalid configuration for '{field}': {message}")]
    InvalidConfig {
        /// The offending field.
        field: String,
        /// What is wrong with it.
        message: String,
    },

    /// A reconciliation batch exceeded the configured size.
    #[error("Batch of {size} updates exceeds the maximum of {max}")]
    BatchTooLarge {
        /// Number of updates submitted.
        size: usize,
        /// Configured maximum.
        max: usize,
    },

    /// A pipeline definition is inconsistent.
    #[error("Invalid pipeline '{pipeline_id}': {message}")]
    InvalidPipeline {
        /// The pipeline id.
        pipeline_id: String,
        /// What is wrong with it.
        message: String,
    },
}

impl ValidationError {
    /// Creates an invalid config error.
    #[must_use]
    pub fn invalid_config(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Returns the form field this error should be attached to.
    #[must_use]
    pub fn field(&self) -> &str {
        match self {
            Self::InvalidAssignment { .. } | Self::DuplicateResource { .. } => "userIds",
            Self::InvalidConfig { field, .. } => field,
            Self::BatchTooLarge { .. } => "updates",
            Self::InvalidPipeline { .. } => "stages",
        }
    }
}

/// A failed network call. Always recoverable by retrying the same request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Network error: {message}")]
pub struct NetworkError {
    /// Description of the failure.
    pub message: String,
    /// HTTP-like status code, when the transport has one.
    pub status: Option<u16>,
}

impl NetworkError {
    /// Creates a new network error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: None,
        }
    }

    /// Sets the status code.
    #[must_use]
    pub const fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Error for a response that arrived but reported `success: false`.
    #[must_use]
    pub fn rejected() -> Self {
        Self::new("server reported the batch as unsuccessful")
    }
}

/// One item of a batch that the server could not apply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemFailure {
    /// The contact the item referred to.
    pub contact_id: String,
    /// The pipeline of the placement, absent for assignment items.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipeline_id: Option<String>,
    /// Why the item did not apply.
    pub reason: String,
}

impl ItemFailure {
    /// Creates a new item failure.
    #[must_use]
    pub fn new(contact_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            contact_id: contact_id.into(),
            pipeline_id: None,
            reason: reason.into(),
        }
    }

    /// Sets the pipeline id.
    #[must_use]
    pub fn with_pipeline(mut self, pipeline_id: impl Into<String>) -> Self {
        self.pipeline_id = Some(pipeline_id.into());
        self
    }
}

/// A batch accepted by the transport in which some items failed to apply.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Batch partially applied: {applied} applied, {} failed", failures.len())]
pub struct PartialApplicationError {
    /// Number of items that applied.
    pub applied: usize,
    /// The items that did not.
    pub failures: Vec<ItemFailure>,
}

impl PartialApplicationError {
    /// Creates a new partial application error.
    #[must_use]
    pub const fn new(applied: usize, failures: Vec<ItemFailure>) -> Self {
        Self { applied, failures }
    }
}

/// Invalid local board mutations. The store is left unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BoardError {
    /// The contact is not on this board.
    #[error("Contact not found on board: {0}")]
    UnknownContact(String),

    /// The stage is not part of this board's pipeline.
    #[error("Stage not found on board: {0}")]
    UnknownStage(String),

    /// The contact is on the board but not in the stage the move started from.
    #[error("Contact '{contact_id}' is not in stage '{stage_id}'")]
    NotInStage {
        /// The contact.
        contact_id: String,
        /// The stage the caller expected it in.
        stage_id: String,
    },
}

/// Failures of a durable queue backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filesystem failure.
    #[error("Storage IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Embedded database failure.
    #[cfg(feature = "sqlite")]
    #[error("Storage database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Any other backend failure.
    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// Reasons a single reconciliation or assignment item fails server side.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApplyError {
    /// The contact document does not exist.
    #[error("contact not found: {0}")]
    ContactNotFound(String),

    /// The target stage does not belong to the target pipeline.
    #[error("stage '{stage_id}' is not part of pipeline '{pipeline_id}'")]
    UnknownStage {
        /// The pipeline.
        pipeline_id: String,
        /// The stage.
        stage_id: String,
    },

    /// The item is malformed.
    #[error("invalid update: {0}")]
    Invalid(String),

    /// The storage layer rejected the write.
    #[error("storage failure: {0}")]
    Storage(String),
}
