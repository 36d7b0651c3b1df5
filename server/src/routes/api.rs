//! Versioned API routes.

use axum::{
    body::Bytes,
    extract::{ws::WebSocketUpgrade, Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::Serialize;

use crate::auth::{AuthUser, OptionalAuthUser};
use crate::error::Result;
use crate::handlers::auth::{
    handle_sign_in, handle_sign_out, handle_sign_up, SessionResponse, SignInRequest, SignUpRequest,
};
use crate::handlers::handle_websocket_connection;
use crate::handlers::mutate::{handle_mutation, MutationRequest, MutationResponse};
use crate::handlers::query::{handle_query, QueryRequest, QueryResponse};
use crate::handlers::storage::{
    handle_fetch, handle_remove, handle_upload, RemoveRequest, RemoveResponse, UploadResponse,
};
use crate::AppState;

/// Create API routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/query", post(query_handler))
        .route("/v1/mutate", post(mutate_handler))
        .route("/v1/auth/sign-up", post(sign_up_handler))
        .route("/v1/auth/sign-in", post(sign_in_handler))
        .route("/v1/auth/sign-out", post(sign_out_handler))
        .route("/v1/auth/me", get(me_handler))
        .route("/v1/storage/{bucket}", delete(remove_handler))
        .route(
            "/v1/storage/{bucket}/{*path}",
            post(upload_handler).get(fetch_handler),
        )
        .route("/v1/realtime", get(realtime_handler))
}

/// POST /v1/query - Run a typed read.
async fn query_handler(
    State(state): State<AppState>,
    _auth: AuthUser,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>> {
    let response = handle_query(&state.pool, request).await?;
    Ok(Json(response))
}

/// POST /v1/mutate - Run a mutation as the authenticated user.
async fn mutate_handler(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(request): Json<MutationRequest>,
) -> Result<Json<MutationResponse>> {
    let response = handle_mutation(&state, &auth, request).await?;
    Ok(Json(response))
}

/// POST /v1/auth/sign-up - Create an account and sign it in.
async fn sign_up_handler(
    State(state): State<AppState>,
    Json(request): Json<SignUpRequest>,
) -> Result<Json<SessionResponse>> {
    let response = handle_sign_up(&state, request).await?;
    Ok(Json(response))
}

/// POST /v1/auth/sign-in - Verify credentials and issue a session.
async fn sign_in_handler(
    State(state): State<AppState>,
    Json(request): Json<SignInRequest>,
) -> Result<Json<SessionResponse>> {
    let response = handle_sign_in(&state, request).await?;
    Ok(Json(response))
}

/// POST /v1/auth/sign-out - Revoke the current session.
async fn sign_out_handler(State(state): State<AppState>, auth: AuthUser) -> Result<StatusCode> {
    handle_sign_out(&state, &auth).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Identity of the authenticated user.
#[derive(Serialize)]
struct IdentityResponse {
    user_id: String,
    email: String,
}

/// GET /v1/auth/me - Who the current session belongs to.
async fn me_handler(auth: AuthUser) -> Json<IdentityResponse> {
    Json(IdentityResponse {
        user_id: auth.user_id,
        email: auth.email,
    })
}

/// POST /v1/storage/{bucket}/{*path} - Upload a blob.
async fn upload_handler(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path((bucket, path)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<UploadResponse>> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string();

    let response =
        handle_upload(&state.pool, &state.config, bucket, path, content_type, &body).await?;
    Ok(Json(response))
}

/// GET /v1/storage/{bucket}/{*path} - Serve a blob. Public: stored
/// media is addressed by unguessable paths, not by sessions.
async fn fetch_handler(
    State(state): State<AppState>,
    Path((bucket, path)): Path<(String, String)>,
) -> Result<Response> {
    let object = handle_fetch(&state.pool, &bucket, &path).await?;
    Ok(([(header::CONTENT_TYPE, object.content_type)], object.data).into_response())
}

/// DELETE /v1/storage/{bucket} - Remove blobs from one bucket.
async fn remove_handler(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(bucket): Path<String>,
    Json(request): Json<RemoveRequest>,
) -> Result<Json<RemoveResponse>> {
    let response = handle_remove(&state.pool, &bucket, request).await?;
    Ok(Json(response))
}

/// GET /v1/realtime - Upgrade to the realtime WebSocket.
async fn realtime_handler(
    State(state): State<AppState>,
    OptionalAuthUser(user): OptionalAuthUser,
    ws: WebSocketUpgrade,
) -> Response {
    let manager = state.realtime.clone();
    let user_id = user.map(|u| u.user_id);
    ws.on_upgrade(move |socket| handle_websocket_connection(socket, manager, user_id))
}
