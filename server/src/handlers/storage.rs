//! Blob storage handlers: upload, fetch, remove.
//!
//! Buckets are fixed. Paths are write-once, so a client that reverts a
//! failed mutation can safely remove the blob it uploaded without
//! racing a replacement.

use crate::config::Config;
use crate::db::mutations::is_unique_violation;
use crate::db::{storage, Pool};
use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};

const BUCKETS: [&str; 3] = [
    tidepool_engine::CONVERSATIONS_BUCKET,
    tidepool_engine::POSTS_BUCKET,
    tidepool_engine::AVATARS_BUCKET,
];

fn ensure_bucket(bucket: &str) -> Result<()> {
    if BUCKETS.contains(&bucket) {
        Ok(())
    } else {
        Err(AppError::BadRequest(format!("unknown bucket: {bucket}")))
    }
}

fn ensure_path(path: &str) -> Result<()> {
    if path.is_empty() || path.contains("..") {
        return Err(AppError::BadRequest("invalid storage path".to_string()));
    }
    Ok(())
}

/// Response body for uploads.
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub bucket: String,
    pub path: String,
    pub public_url: String,
}

/// Stores a blob at `bucket/path`.
pub async fn handle_upload(
    pool: &Pool,
    config: &Config,
    bucket: String,
    path: String,
    content_type: String,
    data: &[u8],
) -> Result<UploadResponse> {
    ensure_bucket(&bucket)?;
    ensure_path(&path)?;
    if data.is_empty() {
        return Err(AppError::BadRequest("empty upload body".to_string()));
    }

    storage::put_object(pool, &bucket, &path, &content_type, data)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict(format!("path already exists: {path}"))
            } else {
                AppError::Database(e)
            }
        })?;

    tracing::info!(bucket = %bucket, path = %path, bytes = data.len(), "blob stored");

    let public_url = format!("{}/v1/storage/{bucket}/{path}", config.public_base_url);
    Ok(UploadResponse {
        bucket,
        path,
        public_url,
    })
}

/// Fetches a blob for serving.
pub async fn handle_fetch(
    pool: &Pool,
    bucket: &str,
    path: &str,
) -> Result<storage::StoredObject> {
    storage::get_object(pool, bucket, path)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("{bucket}/{path}")))
}

/// Request body for blob removal.
#[derive(Debug, Deserialize)]
pub struct RemoveRequest {
    pub paths: Vec<String>,
}

/// Response body for blob removal.
#[derive(Debug, Serialize)]
pub struct RemoveResponse {
    pub removed: u64,
}

/// Removes blobs from one bucket. Missing paths are not an error;
/// cleanup after a reverted mutation must be repeatable.
pub async fn handle_remove(
    pool: &Pool,
    bucket: &str,
    request: RemoveRequest,
) -> Result<RemoveResponse> {
    ensure_bucket(bucket)?;
    if request.paths.is_empty() {
        return Ok(RemoveResponse { removed: 0 });
    }

    let removed = storage::remove_objects(pool, bucket, &request.paths).await?;
    Ok(RemoveResponse { removed })
}
