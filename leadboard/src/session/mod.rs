//! The board session: scoped owner of every client-side component.
//!
//! A session is created when a board mounts and torn down when it unmounts.
//! Nothing it owns is process-wide, so two boards (desktop and mobile) can
//! run side by side with independent queues.

mod board_session;

pub use board_session::{BoardCollaborators, BoardSession};
