//! Blob storage backed by Postgres.
//!
//! Objects live under a bucket/path pair. Paths are write-once: a
//! second upload to the same path fails with a unique violation rather
//! than silently replacing someone's media.

use crate::db::pool::Pool;
use sqlx::postgres::PgRow;
use sqlx::Row;

/// A stored blob.
#[derive(Debug)]
pub struct StoredObject {
    pub content_type: String,
    pub data: Vec<u8>,
}

impl<'r> sqlx::FromRow<'r, PgRow> for StoredObject {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(StoredObject {
            content_type: row.try_get("content_type")?,
            data: row.try_get("data")?,
        })
    }
}

pub async fn put_object(
    pool: &Pool,
    bucket: &str,
    path: &str,
    content_type: &str,
    data: &[u8],
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO storage_objects (bucket, path, content_type, data)
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(bucket)
    .bind(path)
    .bind(content_type)
    .bind(data)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn get_object(
    pool: &Pool,
    bucket: &str,
    path: &str,
) -> Result<Option<StoredObject>, sqlx::Error> {
    sqlx::query_as::<_, StoredObject>(
        r#"
        SELECT content_type, data
        FROM storage_objects
        WHERE bucket = $1 AND path = $2
        "#,
    )
    .bind(bucket)
    .bind(path)
    .fetch_optional(pool)
    .await
}

/// Removes blobs from one bucket. Returns how many rows existed.
pub async fn remove_objects(
    pool: &Pool,
    bucket: &str,
    paths: &[String],
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(r#"DELETE FROM storage_objects WHERE bucket = $1 AND path = ANY($2)"#)
        .bind(bucket)
        .bind(paths)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}
