//! Password hashing and session issuance.
//!
//! Hashes are salted SHA-256 stored as `salt$hex`. Session tokens are
//! opaque UUIDs resolved against the sessions table on every request.

use crate::db::users;
use crate::db::Pool;
use sha2::{Digest, Sha256};

/// Hashes a password with a fresh random salt.
pub fn hash_password(password: &str) -> String {
    let salt = uuid::Uuid::new_v4().simple().to_string();
    let digest = salted_digest(&salt, password);
    format!("{salt}${digest}")
}

/// Verifies a password against a stored `salt$hex` hash.
pub fn verify_password(password: &str, stored: &str) -> bool {
    match stored.split_once('$') {
        Some((salt, expected)) => salted_digest(salt, password) == expected,
        None => false,
    }
}

fn salted_digest(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b":");
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Issues a new session token for a user.
pub async fn create_session(pool: &Pool, user_id: &str) -> Result<String, sqlx::Error> {
    let token = uuid::Uuid::new_v4().to_string();
    users::insert_session(pool, &token, user_id).await?;
    Ok(token)
}
