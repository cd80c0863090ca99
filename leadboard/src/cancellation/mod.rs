//! Cooperative cancellation for background board tasks.

mod token;

pub use token::CancellationToken;
