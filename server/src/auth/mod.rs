//! Session-backed authentication.

mod middleware;
pub mod sessions;

pub use middleware::{AuthUser, OptionalAuthUser};
