//! Stored row types bridging Postgres and the engine's wire rows.
//!
//! Each stored type decodes one table's columns and converts into the
//! engine row that goes out over query responses and change events.
//! Timestamps become RFC 3339 strings at the boundary; clients treat
//! them as opaque.

use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::Row;
use tidepool_engine::{
    Comment, Conversation, Follow, Like, MediaType, Message, MessageKind, Post, Profile, Save,
};

fn decode_err(column: &str, message: impl Into<String>) -> sqlx::Error {
    sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: message.into().into(),
    }
}

fn parse_media_type(raw: &str) -> Result<MediaType, sqlx::Error> {
    match raw {
        "image" => Ok(MediaType::Image),
        "video" => Ok(MediaType::Video),
        other => Err(decode_err(
            "media_type",
            format!("unknown media type: {other}"),
        )),
    }
}

fn parse_message_kind(raw: &str) -> Result<MessageKind, sqlx::Error> {
    match raw {
        "text" => Ok(MessageKind::Text),
        "image" => Ok(MessageKind::Image),
        "post" => Ok(MessageKind::Post),
        other => Err(decode_err(
            "message_type",
            format!("unknown message type: {other}"),
        )),
    }
}

/// Column value for a media type.
pub(crate) fn media_type_str(media_type: MediaType) -> &'static str {
    match media_type {
        MediaType::Image => "image",
        MediaType::Video => "video",
    }
}

/// Column value for a message kind.
pub(crate) fn message_kind_str(kind: MessageKind) -> &'static str {
    match kind {
        MessageKind::Text => "text",
        MessageKind::Image => "image",
        MessageKind::Post => "post",
    }
}

/// A stored profile row.
#[derive(Debug)]
pub struct StoredProfile {
    pub id: String,
    pub username: String,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    pub website: Option<String>,
}

impl<'r> sqlx::FromRow<'r, PgRow> for StoredProfile {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(StoredProfile {
            id: row.try_get("id")?,
            username: row.try_get("username")?,
            full_name: row.try_get("full_name")?,
            avatar_url: row.try_get("avatar_url")?,
            website: row.try_get("website")?,
        })
    }
}

impl StoredProfile {
    pub fn into_profile(self) -> Profile {
        Profile {
            id: self.id,
            username: self.username,
            full_name: self.full_name,
            avatar_url: self.avatar_url,
            website: self.website,
        }
    }
}

/// A stored post row.
#[derive(Debug)]
pub struct StoredPost {
    pub id: String,
    pub user_id: String,
    pub caption: Option<String>,
    pub media: Option<String>,
    pub media_type: Option<MediaType>,
    pub likes: i64,
    pub created_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, PgRow> for StoredPost {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let media_type = match row.try_get::<Option<String>, _>("media_type")? {
            Some(raw) => Some(parse_media_type(&raw)?),
            None => None,
        };

        Ok(StoredPost {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            caption: row.try_get("caption")?,
            media: row.try_get("media")?,
            media_type,
            likes: row.try_get("likes")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl StoredPost {
    pub fn into_post(self) -> Post {
        Post {
            id: self.id,
            user_id: self.user_id,
            caption: self.caption,
            media: self.media,
            media_type: self.media_type,
            likes: self.likes,
            created_at: self.created_at.to_rfc3339(),
        }
    }
}

/// A stored comment row.
#[derive(Debug)]
pub struct StoredComment {
    pub id: String,
    pub post_id: String,
    pub user_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, PgRow> for StoredComment {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(StoredComment {
            id: row.try_get("id")?,
            post_id: row.try_get("post_id")?,
            user_id: row.try_get("user_id")?,
            content: row.try_get("content")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl StoredComment {
    pub fn into_comment(self) -> Comment {
        Comment {
            id: self.id,
            post_id: self.post_id,
            user_id: self.user_id,
            content: self.content,
            created_at: self.created_at.to_rfc3339(),
        }
    }
}

/// A stored conversation row.
#[derive(Debug)]
pub struct StoredConversation {
    pub id: String,
    pub user1: String,
    pub user2: String,
    pub created_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, PgRow> for StoredConversation {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(StoredConversation {
            id: row.try_get("id")?,
            user1: row.try_get("user1")?,
            user2: row.try_get("user2")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl StoredConversation {
    pub fn into_conversation(self) -> Conversation {
        Conversation {
            id: self.id,
            user1: self.user1,
            user2: self.user2,
            created_at: self.created_at.to_rfc3339(),
        }
    }
}

/// A stored message row. The embedded post of a shared-post message is
/// kept as JSONB and decoded here.
#[derive(Debug)]
pub struct StoredMessage {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub message_type: MessageKind,
    pub content: Option<String>,
    pub media_url: Option<String>,
    pub file_path: Option<String>,
    pub post: Option<Post>,
    pub created_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, PgRow> for StoredMessage {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let kind_raw: String = row.try_get("message_type")?;

        let post = match row.try_get::<Option<serde_json::Value>, _>("post")? {
            Some(value) => Some(
                serde_json::from_value::<Post>(value)
                    .map_err(|e| decode_err("post", format!("embedded post: {e}")))?,
            ),
            None => None,
        };

        Ok(StoredMessage {
            id: row.try_get("id")?,
            conversation_id: row.try_get("conversation_id")?,
            sender_id: row.try_get("sender_id")?,
            message_type: parse_message_kind(&kind_raw)?,
            content: row.try_get("content")?,
            media_url: row.try_get("media_url")?,
            file_path: row.try_get("file_path")?,
            post,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl StoredMessage {
    pub fn into_message(self) -> Message {
        Message {
            id: self.id,
            conversation_id: self.conversation_id,
            sender_id: self.sender_id,
            message_type: self.message_type,
            content: self.content,
            media_url: self.media_url,
            file_path: self.file_path,
            post: self.post.map(Box::new),
            created_at: self.created_at.to_rfc3339(),
        }
    }
}

/// A stored follow row.
#[derive(Debug)]
pub struct StoredFollow {
    pub id: String,
    pub follower_id: String,
    pub following_id: String,
    pub created_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, PgRow> for StoredFollow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(StoredFollow {
            id: row.try_get("id")?,
            follower_id: row.try_get("follower_id")?,
            following_id: row.try_get("following_id")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl StoredFollow {
    pub fn into_follow(self) -> Follow {
        Follow {
            id: self.id,
            follower_id: self.follower_id,
            following_id: self.following_id,
            created_at: self.created_at.to_rfc3339(),
        }
    }
}

/// A stored like or save membership row; the two tables share a shape.
#[derive(Debug)]
pub struct StoredEngagement {
    pub id: String,
    pub user_id: String,
    pub post_id: String,
    pub created_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, PgRow> for StoredEngagement {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(StoredEngagement {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            post_id: row.try_get("post_id")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl StoredEngagement {
    pub fn into_like(self) -> Like {
        Like {
            id: self.id,
            user_id: self.user_id,
            post_id: self.post_id,
            created_at: self.created_at.to_rfc3339(),
        }
    }

    pub fn into_save(self) -> Save {
        Save {
            id: self.id,
            user_id: self.user_id,
            post_id: self.post_id,
            created_at: self.created_at.to_rfc3339(),
        }
    }
}
