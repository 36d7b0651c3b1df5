//! Request handlers for queries, mutations, auth, storage, and realtime.

pub mod auth;
pub mod mutate;
pub mod query;
pub mod storage;
mod websocket;

pub use websocket::handle_websocket_connection;
