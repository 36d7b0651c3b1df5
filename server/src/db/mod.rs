//! Database module for PostgreSQL persistence.

pub mod mutations;
mod pool;
pub mod queries;
mod rows;
pub mod storage;
pub mod users;

pub use pool::*;
