//! Client-side board state.
//!
//! This module provides:
//! - `BoardStore`, the in-memory ordered stage/contact lists
//! - `ContactFilter` for render-ready views
//! - `BoardLoader`, which hydrates a store from the contact listing collaborator

mod filter;
mod loader;
mod store;

pub use filter::ContactFilter;
pub use loader::{BoardLoader, ContactListing, ContactPage, ContactPageQuery};
pub use store::{BoardStore, LaneView};
