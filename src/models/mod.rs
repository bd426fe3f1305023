//! Data models for the Drive and Admin Directory APIs.
//!
//! Field names follow the REST resources (camelCase) so cached documents keep the shape
//! the API returned.

mod drive;
mod permission;
mod snapshot;
mod user;

pub use drive::*;
pub use permission::*;
pub use snapshot::*;
pub use user::*;
