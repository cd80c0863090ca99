//! Event sink trait and implementations.

use async_trait::async_trait;
use tracing::{debug, info, warn, Level};

use super::BoardEvent;

/// Receives board events.
///
/// Sinks are handed to each component explicitly. They back user
/// notifications as well as logging.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Emits an event asynchronously.
    async fn emit(&self, event: BoardEvent);

    /// Emits an event without blocking.
    ///
    /// Never fails. Delivery problems are logged and suppressed.
    fn try_emit(&self, event: BoardEvent);
}

/// A sink that discards all events.
///
/// Used as the default when no sink is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEventSink;

#[async_trait]
impl EventSink for NoOpEventSink {
    async fn emit(&self, _event: BoardEvent) {}

    fn try_emit(&self, _event: BoardEvent) {}
}

/// A sink that logs events through `tracing`.
///
/// Error notifications are always logged at `WARN`.
#[derive(Debug, Clone)]
pub struct LoggingEventSink {
    level: Level,
}

impl Default for LoggingEventSink {
    fn default() -> Self {
        Self { level: Level::INFO }
    }
}

impl LoggingEventSink {
    /// Creates a logging sink with the given level for non-error events.
    #[must_use]
    pub fn new(level: Level) -> Self {
        Self { level }
    }

    /// Creates a debug-level logging sink.
    #[must_use]
    pub fn debug() -> Self {
        Self::new(Level::DEBUG)
    }

    fn log_event(&self, event: &BoardEvent) {
        let event_type = event.event_type();
        let payload = event.payload();

        if event.is_error() {
            warn!(event_type, event_data = %payload, "{}", event.message());
        } else if self.level == Level::DEBUG {
            debug!(event_type, event_data = %payload, "{}", event.message());
        } else {
            info!(event_type, event_data = %payload, "{}", event.message());
        }
    }
}

#[async_trait]
impl EventSink for LoggingEventSink {
    async fn emit(&self, event: BoardEvent) {
        self.log_event(&event);
    }

    fn try_emit(&self, event: BoardEvent) {
        self.log_event(&event);
    }
}

/// A sink that keeps every event, for tests and notification trays.
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    events: parking_lot::RwLock<Vec<BoardEvent>>,
}

impl CollectingEventSink {
    /// Creates a new collecting sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all collected events.
    #[must_use]
    pub fn events(&self) -> Vec<BoardEvent> {
        self.events.read().clone()
    }

    /// Returns the event types in emission order.
    #[must_use]
    pub fn event_types(&self) -> Vec<&'static str> {
        self.events.read().iter().map(BoardEvent::event_type).collect()
    }

    /// Returns the number of collected events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Returns true if no events have been collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    /// Clears all collected events.
    pub fn clear(&self) {
        self.events.write().clear();
    }

    /// Returns events whose type starts with `type_prefix`.
    #[must_use]
    pub fn events_of_type(&self, type_prefix: &str) -> Vec<BoardEvent> {
        self.events
            .read()
            .iter()
            .filter(|e| e.event_type().starts_with(type_prefix))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl EventSink for CollectingEventSink {
    async fn emit(&self, event: BoardEvent) {
        self.events.write().push(event);
    }

    fn try_emit(&self, event: BoardEvent) {
        self.events.write().push(event);
    }
}
