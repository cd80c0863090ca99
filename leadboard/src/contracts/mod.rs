//! Wire contracts shared by the board client and the server endpoints.
//!
//! All payloads use camelCase field names.

mod assign;
mod flush;

pub use assign::{AssignRequest, AssignResponse, AssignedContact, IdRef};
pub use flush::{FlushRequest, FlushResponse};
