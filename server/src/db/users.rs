//! Account and session rows.

use crate::db::pool::Pool;
use sqlx::postgres::PgRow;
use sqlx::Row;

/// A stored account row.
#[derive(Debug)]
pub struct StoredUser {
    pub id: String,
    pub email: String,
    pub password_hash: String,
}

impl<'r> sqlx::FromRow<'r, PgRow> for StoredUser {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(StoredUser {
            id: row.try_get("id")?,
            email: row.try_get("email")?,
            password_hash: row.try_get("password_hash")?,
        })
    }
}

/// Creates an account and its profile row in one transaction.
pub async fn insert_account(
    pool: &Pool,
    id: &str,
    email: &str,
    password_hash: &str,
    username: &str,
    full_name: Option<&str>,
) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    sqlx::query(r#"INSERT INTO users (id, email, password_hash) VALUES ($1, $2, $3)"#)
        .bind(id)
        .bind(email)
        .bind(password_hash)
        .execute(&mut *tx)
        .await?;

    sqlx::query(r#"INSERT INTO profiles (id, username, full_name) VALUES ($1, $2, $3)"#)
        .bind(id)
        .bind(username)
        .bind(full_name)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(())
}

pub async fn find_user_by_email(
    pool: &Pool,
    email: &str,
) -> Result<Option<StoredUser>, sqlx::Error> {
    sqlx::query_as::<_, StoredUser>(
        r#"SELECT id, email, password_hash FROM users WHERE email = $1"#,
    )
    .bind(email)
    .fetch_optional(pool)
    .await
}

/// Resolves a session token to its account.
pub async fn find_user_by_session(
    pool: &Pool,
    token: &str,
) -> Result<Option<StoredUser>, sqlx::Error> {
    sqlx::query_as::<_, StoredUser>(
        r#"
        SELECT u.id, u.email, u.password_hash
        FROM sessions s
        JOIN users u ON u.id = s.user_id
        WHERE s.token = $1
        "#,
    )
    .bind(token)
    .fetch_optional(pool)
    .await
}

pub async fn insert_session(pool: &Pool, token: &str, user_id: &str) -> Result<(), sqlx::Error> {
    sqlx::query(r#"INSERT INTO sessions (token, user_id) VALUES ($1, $2)"#)
        .bind(token)
        .bind(user_id)
        .execute(pool)
        .await?;

    Ok(())
}

/// Revokes a session. Returns false if the token was already gone.
pub async fn delete_session(pool: &Pool, token: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(r#"DELETE FROM sessions WHERE token = $1"#)
        .bind(token)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}
