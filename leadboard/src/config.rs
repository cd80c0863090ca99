//! Configuration types for the board client and the reconciliation endpoint.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::errors::ValidationError;

/// Shortest allowed sync interval.
pub const MIN_SYNC_INTERVAL_MS: u64 = 5_000;

/// Longest allowed sync interval.
pub const MAX_SYNC_INTERVAL_MS: u64 = 8_000;

/// Which board a session drives. Each variant keeps its own durable queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoardVariant {
    /// The desktop board.
    #[default]
    Desktop,
    /// The mobile board.
    Mobile,
}

impl BoardVariant {
    /// Returns the durable queue key for this variant.
    #[must_use]
    pub const fn queue_key(&self) -> &'static str {
        match self {
            Self::Desktop => "leadboard:pending-placements:desktop",
            Self::Mobile => "leadboard:pending-placements:mobile",
        }
    }
}

impl fmt::Display for BoardVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Desktop => write!(f, "desktop"),
            Self::Mobile => write!(f, "mobile"),
        }
    }
}

/// Configuration for a board session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardConfig {
    /// Board variant.
    #[serde(default)]
    pub variant: BoardVariant,
    /// Periodic flush interval in milliseconds.
    #[serde(default = "default_sync_interval_ms")]
    pub sync_interval_ms: u64,
    /// Reload authoritative state after a successful flush.
    #[serde(default = "default_refetch_after_flush")]
    pub refetch_after_flush: bool,
    /// Contacts requested per listing page.
    #[serde(default = "default_page_size")]
    pub contact_page_size: usize,
    /// How long a navigation prompt waits for a choice.
    #[serde(default = "default_guard_timeout_ms")]
    pub guard_timeout_ms: u64,
}

fn default_sync_interval_ms() -> u64 {
    MIN_SYNC_INTERVAL_MS
}

fn default_refetch_after_flush() -> bool {
    true
}

fn default_page_size() -> usize {
    50
}

fn default_guard_timeout_ms() -> u64 {
    120_000
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            variant: BoardVariant::default(),
            sync_interval_ms: default_sync_interval_ms(),
            refetch_after_flush: default_refetch_after_flush(),
            contact_page_size: default_page_size(),
            guard_timeout_ms: default_guard_timeout_ms(),
        }
    }
}

impl BoardConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the board variant.
    #[must_use]
    pub fn with_variant(mut self, variant: BoardVariant) -> Self {
        self.variant = variant;
        self
    }

    /// Sets the sync interval.
    #[must_use]
    pub fn with_sync_interval_ms(mut self, ms: u64) -> Self {
        self.sync_interval_ms = ms;
        self
    }

    /// Sets whether to refetch after a successful flush.
    #[must_use]
    pub fn with_refetch_after_flush(mut self, refetch: bool) -> Self {
        self.refetch_after_flush = refetch;
        self
    }

    /// Sets the listing page size.
    #[must_use]
    pub fn with_contact_page_size(mut self, size: usize) -> Self {
        self.contact_page_size = size;
        self
    }

    /// Sets the navigation prompt timeout.
    #[must_use]
    pub fn with_guard_timeout_ms(mut self, ms: u64) -> Self {
        self.guard_timeout_ms = ms;
        self
    }

    /// Returns the durable queue key.
    #[must_use]
    pub fn queue_key(&self) -> &'static str {
        self.variant.queue_key()
    }

    /// Returns the sync interval.
    #[must_use]
    pub fn sync_interval(&self) -> Duration {
        Duration::from_millis(self.sync_interval_ms)
    }

    /// Returns the navigation prompt timeout.
    #[must_use]
    pub fn guard_timeout(&self) -> Duration {
        Duration::from_millis(self.guard_timeout_ms)
    }

    /// Checks value ranges.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !(MIN_SYNC_INTERVAL_MS..=MAX_SYNC_INTERVAL_MS).contains(&self.sync_interval_ms) {
            return Err(ValidationError::invalid_config(
                "sync_interval_ms",
                format!(
                    "{} is outside {MIN_SYNC_INTERVAL_MS}..={MAX_SYNC_INTERVAL_MS}",
                    self.sync_interval_ms
                ),
            ));
        }
        if self.contact_page_size == 0 {
            return Err(ValidationError::invalid_config(
                "contact_page_size",
                "must be at least 1",
            ));
        }
        if self.guard_timeout_ms == 0 {
            return Err(ValidationError::invalid_config(
                "guard_timeout_ms",
                "must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Configuration for the batch reconciliation endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileConfig {
    /// Largest batch accepted in one call.
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
}

fn default_max_batch_size() -> usize {
    500
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            max_batch_size: default_max_batch_size(),
        }
    }
}

impl ReconcileConfig {
    /// Sets the maximum batch size.
    #[must_use]
    pub fn with_max_batch_size(mut self, size: usize) -> Self {
        self.max_batch_size = size;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BoardConfig::default();
        assert_eq!(config.sync_interval(), Duration::from_secs(5));
        assert_eq!(config.queue_key(), "leadboard:pending-placements:desktop");
        assert!(config.refetch_after_flush);
        assert!(config.validate().is_ok());
        assert_eq!(ReconcileConfig::default().max_batch_size, 500);
    }

    #[test]
    fn test_variants_use_distinct_keys() {
        assert_ne!(BoardVariant::Desktop.queue_key(), BoardVariant::Mobile.queue_key());
        let config = BoardConfig::new().with_variant(BoardVariant::Mobile);
        assert_eq!(config.queue_key(), "leadboard:pending-placements:mobile");
    }

    #[test]
    fn test_sync_interval_bounds() {
        assert!(BoardConfig::new().with_sync_interval_ms(8_000).validate().is_ok());

        let err = BoardConfig::new().with_sync_interval_ms(4_999).validate().unwrap_err();
        assert_eq!(err.field(), "sync_interval_ms");
        assert!(BoardConfig::new().with_sync_interval_ms(9_000).validate().is_err());
    }

    #[test]
    fn test_zero_page_size_rejected() {
        let err = BoardConfig::new().with_contact_page_size(0).validate().unwrap_err();
        assert_eq!(err.field(), "contact_page_size");
    }

    #[test]
    fn test_deserialize_partial() {
        let config: BoardConfig =
            serde_json::from_str(r#"{"variant": "mobile", "sync_interval_ms": 6000}"#).unwrap();
        assert_eq!(config.variant, BoardVariant::Mobile);
        assert_eq!(config.sync_interval_ms, 6_000);
        assert_eq!(config.contact_page_size, 50);
    }
}
