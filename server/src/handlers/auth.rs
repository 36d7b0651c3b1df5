//! Account lifecycle: sign-up, sign-in, sign-out.

use crate::auth::{sessions, AuthUser};
use crate::db::users;
use crate::error::{AppError, Result};
use crate::AppState;
use serde::{Deserialize, Serialize};
use tidepool_engine::{ChangeNotification, Profile, Table};

const MIN_PASSWORD_LEN: usize = 8;

/// Request body for `/v1/auth/sign-up`.
#[derive(Debug, Deserialize)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    pub username: String,
    #[serde(default)]
    pub full_name: Option<String>,
}

/// Request body for `/v1/auth/sign-in`.
#[derive(Debug, Deserialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

/// Response body for sign-up and sign-in.
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub token: String,
    pub user_id: String,
    pub email: String,
}

/// Creates an account with its profile and signs it in.
pub async fn handle_sign_up(state: &AppState, request: SignUpRequest) -> Result<SessionResponse> {
    let email = request.email.trim().to_lowercase();
    let username = request.username.trim().to_string();

    if !email.contains('@') {
        return Err(AppError::BadRequest("invalid email address".to_string()));
    }
    if request.password.len() < MIN_PASSWORD_LEN {
        return Err(AppError::BadRequest(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    if username.is_empty() {
        return Err(AppError::BadRequest("username is required".to_string()));
    }

    let user_id = uuid::Uuid::new_v4().to_string();
    let password_hash = sessions::hash_password(&request.password);

    users::insert_account(
        &state.pool,
        &user_id,
        &email,
        &password_hash,
        &username,
        request.full_name.as_deref(),
    )
    .await
    .map_err(|e| {
        if crate::db::mutations::is_unique_violation(&e) {
            AppError::Conflict("email or username already taken".to_string())
        } else {
            AppError::Database(e)
        }
    })?;

    let token = sessions::create_session(&state.pool, &user_id).await?;

    tracing::info!(user_id = %user_id, "account created");

    // Announce the new profile so user searches pick it up live.
    let profile = Profile {
        id: user_id.clone(),
        username,
        full_name: request.full_name,
        avatar_url: None,
        website: None,
    };
    state
        .realtime
        .broadcast_change(&ChangeNotification::insert(
            Table::Profiles,
            serde_json::to_value(&profile)?,
        ));

    Ok(SessionResponse {
        token,
        user_id,
        email,
    })
}

/// Verifies credentials and issues a session.
pub async fn handle_sign_in(state: &AppState, request: SignInRequest) -> Result<SessionResponse> {
    let email = request.email.trim().to_lowercase();

    let user = users::find_user_by_email(&state.pool, &email)
        .await?
        .ok_or(AppError::Unauthorized)?;

    if !sessions::verify_password(&request.password, &user.password_hash) {
        return Err(AppError::Unauthorized);
    }

    let token = sessions::create_session(&state.pool, &user.id).await?;

    Ok(SessionResponse {
        token,
        user_id: user.id,
        email: user.email,
    })
}

/// Revokes the session the request authenticated with.
pub async fn handle_sign_out(state: &AppState, user: &AuthUser) -> Result<()> {
    users::delete_session(&state.pool, &user.token).await?;
    Ok(())
}
