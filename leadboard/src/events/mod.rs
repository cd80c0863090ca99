//! Board events: user notifications and observability signals.
//!
//! Components never hold a process-wide sink. Each board session and each
//! endpoint is handed an [`EventSink`] explicitly.

mod board_event;
mod sink;

pub use board_event::BoardEvent;
pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
