//! Write paths over the domain tables.
//!
//! Inserts take client-generated row ids and return the committed row
//! (server-assigned columns included), so the caller can broadcast it
//! verbatim. Engagement toggles are idempotent: repeating one is a
//! no-op, reported through `changed`.

use crate::db::pool::Pool;
use crate::db::rows::{
    media_type_str, message_kind_str, StoredComment, StoredConversation, StoredEngagement,
    StoredFollow, StoredMessage, StoredPost, StoredProfile,
};
use tidepool_engine::{Comment, Conversation, Follow, Like, Message, Post, Profile, Save};

/// Whether an error is a unique-constraint violation.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"))
}

pub async fn insert_post(pool: &Pool, post: &Post) -> Result<Post, sqlx::Error> {
    let row = sqlx::query_as::<_, StoredPost>(
        r#"
        INSERT INTO posts (id, user_id, caption, media, media_type)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id, user_id, caption, media, media_type, likes, created_at
        "#,
    )
    .bind(&post.id)
    .bind(&post.user_id)
    .bind(&post.caption)
    .bind(&post.media)
    .bind(post.media_type.map(media_type_str))
    .fetch_one(pool)
    .await?;

    Ok(row.into_post())
}

pub async fn insert_comment(pool: &Pool, comment: &Comment) -> Result<Comment, sqlx::Error> {
    let row = sqlx::query_as::<_, StoredComment>(
        r#"
        INSERT INTO comments (id, post_id, user_id, content)
        VALUES ($1, $2, $3, $4)
        RETURNING id, post_id, user_id, content, created_at
        "#,
    )
    .bind(&comment.id)
    .bind(&comment.post_id)
    .bind(&comment.user_id)
    .bind(&comment.content)
    .fetch_one(pool)
    .await?;

    Ok(row.into_comment())
}

/// Deletes a comment if it belongs to the given author. Returns the
/// deleted id, or None when no matching row exists.
pub async fn delete_comment(
    pool: &Pool,
    id: &str,
    user_id: &str,
) -> Result<Option<String>, sqlx::Error> {
    let row: Option<(String,)> =
        sqlx::query_as(r#"DELETE FROM comments WHERE id = $1 AND user_id = $2 RETURNING id"#)
            .bind(id)
            .bind(user_id)
            .fetch_optional(pool)
            .await?;

    Ok(row.map(|r| r.0))
}

pub async fn insert_conversation(
    pool: &Pool,
    conversation: &Conversation,
) -> Result<Conversation, sqlx::Error> {
    let row = sqlx::query_as::<_, StoredConversation>(
        r#"
        INSERT INTO conversations (id, user1, user2)
        VALUES ($1, $2, $3)
        RETURNING id, user1, user2, created_at
        "#,
    )
    .bind(&conversation.id)
    .bind(&conversation.user1)
    .bind(&conversation.user2)
    .fetch_one(pool)
    .await?;

    Ok(row.into_conversation())
}

pub async fn insert_message(pool: &Pool, message: &Message) -> Result<Message, sqlx::Error> {
    let row = sqlx::query_as::<_, StoredMessage>(
        r#"
        INSERT INTO messages (id, conversation_id, sender_id, message_type,
                              content, media_url, file_path, post)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING id, conversation_id, sender_id, message_type, content,
                  media_url, file_path, post, created_at
        "#,
    )
    .bind(&message.id)
    .bind(&message.conversation_id)
    .bind(&message.sender_id)
    .bind(message_kind_str(message.message_type))
    .bind(&message.content)
    .bind(&message.media_url)
    .bind(&message.file_path)
    .bind(message.post.as_deref().map(sqlx::types::Json))
    .fetch_one(pool)
    .await?;

    Ok(row.into_message())
}

/// Deletes a message if it belongs to the given sender. Returns the
/// deleted row so the caller can release its attached upload.
pub async fn delete_message(
    pool: &Pool,
    id: &str,
    sender_id: &str,
) -> Result<Option<Message>, sqlx::Error> {
    let row = sqlx::query_as::<_, StoredMessage>(
        r#"
        DELETE FROM messages
        WHERE id = $1 AND sender_id = $2
        RETURNING id, conversation_id, sender_id, message_type, content,
                  media_url, file_path, post, created_at
        "#,
    )
    .bind(id)
    .bind(sender_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(StoredMessage::into_message))
}

pub async fn update_profile(pool: &Pool, profile: &Profile) -> Result<Option<Profile>, sqlx::Error> {
    let row = sqlx::query_as::<_, StoredProfile>(
        r#"
        UPDATE profiles
        SET username = $2, full_name = $3, avatar_url = $4, website = $5
        WHERE id = $1
        RETURNING id, username, full_name, avatar_url, website
        "#,
    )
    .bind(&profile.id)
    .bind(&profile.username)
    .bind(&profile.full_name)
    .bind(&profile.avatar_url)
    .bind(&profile.website)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(StoredProfile::into_profile))
}

/// Outcome of a like toggle. `likes` is the post counter after commit;
/// `row` carries the membership row on engage, `removed_id` its id on
/// disengage, and `post` the updated post when the counter moved.
#[derive(Debug)]
pub struct LikeChange {
    pub changed: bool,
    pub likes: i64,
    pub row: Option<Like>,
    pub removed_id: Option<String>,
    pub post: Option<Post>,
}

/// Toggles a like. The membership row and the posts.likes counter move
/// in one transaction, so no observer can see them disagree.
pub async fn set_like(
    pool: &Pool,
    user_id: &str,
    post_id: &str,
    liked: bool,
) -> Result<LikeChange, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let membership: Option<StoredEngagement> = if liked {
        sqlx::query_as(
            r#"
            INSERT INTO user_likes (id, user_id, post_id)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, post_id) DO NOTHING
            RETURNING id, user_id, post_id, created_at
            "#,
        )
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(user_id)
        .bind(post_id)
        .fetch_optional(&mut *tx)
        .await?
    } else {
        sqlx::query_as(
            r#"
            DELETE FROM user_likes
            WHERE user_id = $1 AND post_id = $2
            RETURNING id, user_id, post_id, created_at
            "#,
        )
        .bind(user_id)
        .bind(post_id)
        .fetch_optional(&mut *tx)
        .await?
    };

    let (likes, post) = match &membership {
        Some(_) => {
            let delta: i64 = if liked { 1 } else { -1 };
            let row = sqlx::query_as::<_, StoredPost>(
                r#"
                UPDATE posts SET likes = GREATEST(likes + $2, 0)
                WHERE id = $1
                RETURNING id, user_id, caption, media, media_type, likes, created_at
                "#,
            )
            .bind(post_id)
            .bind(delta)
            .fetch_one(&mut *tx)
            .await?;
            (row.likes, Some(row.into_post()))
        }
        None => {
            let current: (i64,) = sqlx::query_as(r#"SELECT likes FROM posts WHERE id = $1"#)
                .bind(post_id)
                .fetch_one(&mut *tx)
                .await?;
            (current.0, None)
        }
    };

    tx.commit().await?;

    let changed = membership.is_some();
    let (row, removed_id) = match membership {
        Some(stored) if liked => (Some(stored.into_like()), None),
        Some(stored) => (None, Some(stored.id)),
        None => (None, None),
    };

    Ok(LikeChange {
        changed,
        likes,
        row,
        removed_id,
        post,
    })
}

/// Outcome of a save toggle.
#[derive(Debug)]
pub struct SaveChange {
    pub changed: bool,
    pub row: Option<Save>,
    pub removed_id: Option<String>,
}

/// Toggles a save. Saves carry no counter, so this is a single
/// statement either way.
pub async fn set_save(
    pool: &Pool,
    user_id: &str,
    post_id: &str,
    saved: bool,
) -> Result<SaveChange, sqlx::Error> {
    let membership: Option<StoredEngagement> = if saved {
        sqlx::query_as(
            r#"
            INSERT INTO user_saves (id, user_id, post_id)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, post_id) DO NOTHING
            RETURNING id, user_id, post_id, created_at
            "#,
        )
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(user_id)
        .bind(post_id)
        .fetch_optional(pool)
        .await?
    } else {
        sqlx::query_as(
            r#"
            DELETE FROM user_saves
            WHERE user_id = $1 AND post_id = $2
            RETURNING id, user_id, post_id, created_at
            "#,
        )
        .bind(user_id)
        .bind(post_id)
        .fetch_optional(pool)
        .await?
    };

    let changed = membership.is_some();
    let (row, removed_id) = match membership {
        Some(stored) if saved => (Some(stored.into_save()), None),
        Some(stored) => (None, Some(stored.id)),
        None => (None, None),
    };

    Ok(SaveChange {
        changed,
        row,
        removed_id,
    })
}

/// Outcome of a follow toggle.
#[derive(Debug)]
pub struct FollowChange {
    pub changed: bool,
    pub row: Option<Follow>,
    pub removed_id: Option<String>,
}

pub async fn set_follow(
    pool: &Pool,
    follower_id: &str,
    following_id: &str,
    following: bool,
) -> Result<FollowChange, sqlx::Error> {
    let membership: Option<StoredFollow> = if following {
        sqlx::query_as(
            r#"
            INSERT INTO follows (id, follower_id, following_id)
            VALUES ($1, $2, $3)
            ON CONFLICT (follower_id, following_id) DO NOTHING
            RETURNING id, follower_id, following_id, created_at
            "#,
        )
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(follower_id)
        .bind(following_id)
        .fetch_optional(pool)
        .await?
    } else {
        sqlx::query_as(
            r#"
            DELETE FROM follows
            WHERE follower_id = $1 AND following_id = $2
            RETURNING id, follower_id, following_id, created_at
            "#,
        )
        .bind(follower_id)
        .bind(following_id)
        .fetch_optional(pool)
        .await?
    };

    let changed = membership.is_some();
    let (row, removed_id) = match membership {
        Some(stored) if following => (Some(stored.into_follow()), None),
        Some(stored) => (None, Some(stored.id)),
        None => (None, None),
    };

    Ok(FollowChange {
        changed,
        row,
        removed_id,
    })
}
