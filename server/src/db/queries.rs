//! Read paths over the domain tables.
//!
//! Every function returns engine wire rows, so handler output and
//! realtime payloads stay byte-compatible with what clients reconcile.

use crate::db::pool::Pool;
use crate::db::rows::{
    StoredComment, StoredConversation, StoredMessage, StoredPost, StoredProfile,
};
use tidepool_engine::{Comment, Conversation, Message, Post, Profile};

/// Page size applied when a query does not ask for one.
pub const DEFAULT_LIMIT: i64 = 50;

/// Hard cap on requested page sizes.
pub const MAX_LIMIT: i64 = 200;

pub(crate) fn clamp_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
}

/// Newest posts across all authors.
pub async fn feed_posts(pool: &Pool, limit: Option<i64>) -> Result<Vec<Post>, sqlx::Error> {
    let rows = sqlx::query_as::<_, StoredPost>(
        r#"
        SELECT id, user_id, caption, media, media_type, likes, created_at
        FROM posts
        ORDER BY created_at DESC
        LIMIT $1
        "#,
    )
    .bind(clamp_limit(limit))
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(StoredPost::into_post).collect())
}

pub async fn post_by_id(pool: &Pool, id: &str) -> Result<Option<Post>, sqlx::Error> {
    let row = sqlx::query_as::<_, StoredPost>(
        r#"
        SELECT id, user_id, caption, media, media_type, likes, created_at
        FROM posts
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(StoredPost::into_post))
}

/// A single author's posts, newest first.
pub async fn posts_by_author(pool: &Pool, user_id: &str) -> Result<Vec<Post>, sqlx::Error> {
    let rows = sqlx::query_as::<_, StoredPost>(
        r#"
        SELECT id, user_id, caption, media, media_type, likes, created_at
        FROM posts
        WHERE user_id = $1
        ORDER BY created_at DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(StoredPost::into_post).collect())
}

/// Case-insensitive caption search.
pub async fn search_posts(
    pool: &Pool,
    caption: &str,
    limit: Option<i64>,
) -> Result<Vec<Post>, sqlx::Error> {
    let rows = sqlx::query_as::<_, StoredPost>(
        r#"
        SELECT id, user_id, caption, media, media_type, likes, created_at
        FROM posts
        WHERE caption ILIKE $1
        ORDER BY created_at DESC
        LIMIT $2
        "#,
    )
    .bind(format!("%{caption}%"))
    .bind(clamp_limit(limit))
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(StoredPost::into_post).collect())
}

/// Posts a user has liked, most recently liked first.
pub async fn liked_posts(pool: &Pool, user_id: &str) -> Result<Vec<Post>, sqlx::Error> {
    let rows = sqlx::query_as::<_, StoredPost>(
        r#"
        SELECT p.id, p.user_id, p.caption, p.media, p.media_type, p.likes, p.created_at
        FROM posts p
        JOIN user_likes ul ON ul.post_id = p.id
        WHERE ul.user_id = $1
        ORDER BY ul.created_at DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(StoredPost::into_post).collect())
}

/// Posts a user has saved, most recently saved first.
pub async fn saved_posts(pool: &Pool, user_id: &str) -> Result<Vec<Post>, sqlx::Error> {
    let rows = sqlx::query_as::<_, StoredPost>(
        r#"
        SELECT p.id, p.user_id, p.caption, p.media, p.media_type, p.likes, p.created_at
        FROM posts p
        JOIN user_saves us ON us.post_id = p.id
        WHERE us.user_id = $1
        ORDER BY us.created_at DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(StoredPost::into_post).collect())
}

pub async fn profile_by_id(pool: &Pool, id: &str) -> Result<Option<Profile>, sqlx::Error> {
    let row = sqlx::query_as::<_, StoredProfile>(
        r#"
        SELECT id, username, full_name, avatar_url, website
        FROM profiles
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(StoredProfile::into_profile))
}

/// Case-insensitive username search, optionally excluding one user
/// (typically the searcher).
pub async fn search_profiles(
    pool: &Pool,
    username: &str,
    exclude: Option<&str>,
    limit: Option<i64>,
) -> Result<Vec<Profile>, sqlx::Error> {
    let rows = sqlx::query_as::<_, StoredProfile>(
        r#"
        SELECT id, username, full_name, avatar_url, website
        FROM profiles
        WHERE username ILIKE $1 AND ($2::text IS NULL OR id <> $2)
        ORDER BY username
        LIMIT $3
        "#,
    )
    .bind(format!("%{username}%"))
    .bind(exclude)
    .bind(clamp_limit(limit))
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(StoredProfile::into_profile).collect())
}

/// Comments under a post, oldest first.
pub async fn comments_for_post(pool: &Pool, post_id: &str) -> Result<Vec<Comment>, sqlx::Error> {
    let rows = sqlx::query_as::<_, StoredComment>(
        r#"
        SELECT id, post_id, user_id, content, created_at
        FROM comments
        WHERE post_id = $1
        ORDER BY created_at ASC
        "#,
    )
    .bind(post_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(StoredComment::into_comment).collect())
}

/// Conversations a user participates in, newest first.
pub async fn conversations_for_user(
    pool: &Pool,
    user_id: &str,
) -> Result<Vec<Conversation>, sqlx::Error> {
    let rows = sqlx::query_as::<_, StoredConversation>(
        r#"
        SELECT id, user1, user2, created_at
        FROM conversations
        WHERE user1 = $1 OR user2 = $1
        ORDER BY created_at DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(StoredConversation::into_conversation)
        .collect())
}

pub async fn conversation_by_id(
    pool: &Pool,
    id: &str,
) -> Result<Option<Conversation>, sqlx::Error> {
    let row = sqlx::query_as::<_, StoredConversation>(
        r#"
        SELECT id, user1, user2, created_at
        FROM conversations
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(StoredConversation::into_conversation))
}

/// The conversation between two users, regardless of who started it.
pub async fn conversation_between(
    pool: &Pool,
    user_a: &str,
    user_b: &str,
) -> Result<Option<Conversation>, sqlx::Error> {
    let row = sqlx::query_as::<_, StoredConversation>(
        r#"
        SELECT id, user1, user2, created_at
        FROM conversations
        WHERE (user1 = $1 AND user2 = $2) OR (user1 = $2 AND user2 = $1)
        "#,
    )
    .bind(user_a)
    .bind(user_b)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(StoredConversation::into_conversation))
}

/// Messages in a conversation, oldest first.
pub async fn messages_for_conversation(
    pool: &Pool,
    conversation_id: &str,
) -> Result<Vec<Message>, sqlx::Error> {
    let rows = sqlx::query_as::<_, StoredMessage>(
        r#"
        SELECT id, conversation_id, sender_id, message_type, content,
               media_url, file_path, post, created_at
        FROM messages
        WHERE conversation_id = $1
        ORDER BY created_at ASC
        "#,
    )
    .bind(conversation_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(StoredMessage::into_message).collect())
}

/// Whether a user has liked and saved a post.
pub async fn engagement_status(
    pool: &Pool,
    user_id: &str,
    post_id: &str,
) -> Result<(bool, bool), sqlx::Error> {
    let result: (bool, bool) = sqlx::query_as(
        r#"
        SELECT
            EXISTS(SELECT 1 FROM user_likes WHERE user_id = $1 AND post_id = $2),
            EXISTS(SELECT 1 FROM user_saves WHERE user_id = $1 AND post_id = $2)
        "#,
    )
    .bind(user_id)
    .bind(post_id)
    .fetch_one(pool)
    .await?;

    Ok(result)
}

pub async fn is_following(
    pool: &Pool,
    follower_id: &str,
    following_id: &str,
) -> Result<bool, sqlx::Error> {
    let result: (bool,) = sqlx::query_as(
        r#"SELECT EXISTS(SELECT 1 FROM follows WHERE follower_id = $1 AND following_id = $2)"#,
    )
    .bind(follower_id)
    .bind(following_id)
    .fetch_one(pool)
    .await?;

    Ok(result.0)
}

/// Post, follower, and following counts for a profile header.
pub async fn profile_counts(pool: &Pool, user_id: &str) -> Result<(i64, i64, i64), sqlx::Error> {
    let result: (i64, i64, i64) = sqlx::query_as(
        r#"
        SELECT
            (SELECT COUNT(*) FROM posts WHERE user_id = $1),
            (SELECT COUNT(*) FROM follows WHERE following_id = $1),
            (SELECT COUNT(*) FROM follows WHERE follower_id = $1)
        "#,
    )
    .bind(user_id)
    .fetch_one(pool)
    .await?;

    Ok(result)
}
