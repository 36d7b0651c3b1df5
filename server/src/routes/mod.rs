//! Route composition.

mod api;
mod health;

use axum::Router;

use crate::AppState;

/// Assemble every route group the server exposes.
pub fn router() -> Router<AppState> {
    health::routes().merge(api::routes())
}
