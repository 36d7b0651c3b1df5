//! Authentication middleware.
//!
//! Bearer tokens are opaque session ids issued at sign-in and resolved
//! against the sessions table on every request.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
};

use crate::db::users;
use crate::AppState;

/// Authenticated user extracted from the request.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
    pub email: String,
    pub token: String,
}

fn bearer_token(parts: &Parts) -> Result<Option<&str>, (StatusCode, &'static str)> {
    let Some(header) = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
    else {
        return Ok(None);
    };

    match header.strip_prefix("Bearer ") {
        Some(token) if !token.is_empty() => Ok(Some(token)),
        Some(_) => Err((StatusCode::UNAUTHORIZED, "empty bearer token")),
        None => Err((
            StatusCode::UNAUTHORIZED,
            "authorization header is not a bearer token",
        )),
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?
            .ok_or((StatusCode::UNAUTHORIZED, "missing authorization header"))?
            .to_string();

        let user = users::find_user_by_session(&state.pool, &token)
            .await
            .map_err(|cause| {
                tracing::error!(%cause, "session lookup failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "session lookup failed")
            })?
            .ok_or((StatusCode::UNAUTHORIZED, "unknown or revoked session"))?;

        Ok(AuthUser {
            user_id: user.id,
            email: user.email,
            token,
        })
    }
}

/// Optional authenticated user. Absent credentials are fine; a
/// malformed or unknown token is still rejected.
#[derive(Debug, Clone)]
pub struct OptionalAuthUser(pub Option<AuthUser>);

impl FromRequestParts<AppState> for OptionalAuthUser {
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if bearer_token(parts)?.is_none() {
            return Ok(OptionalAuthUser(None));
        }

        AuthUser::from_request_parts(parts, state)
            .await
            .map(|user| OptionalAuthUser(Some(user)))
    }
}
