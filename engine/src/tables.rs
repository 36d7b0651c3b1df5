//! Typed rows for each table the remote collaborator exposes.
//!
//! Field names mirror the column names on the wire, so these structs
//! deserialize straight from query responses and change-event rows.
//! Timestamps are carried as opaque strings; the engine never orders by
//! them (visual order is insertion order as observed locally).

use crate::record::{Table, TableRecord, UploadRef};
use crate::EntityId;
use serde::{Deserialize, Serialize};

/// A user profile row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: EntityId,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
}

impl TableRecord for Profile {
    const TABLE: Table = Table::Profiles;

    fn entity_id(&self) -> &str {
        &self.id
    }
}

/// Kind of media attached to a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Image,
    Video,
}

/// A feed post row. `likes` is the denormalized counter maintained
/// server-side in the same transaction as the membership row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: EntityId,
    pub user_id: EntityId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<MediaType>,
    #[serde(default)]
    pub likes: i64,
    #[serde(default)]
    pub created_at: String,
}

impl TableRecord for Post {
    const TABLE: Table = Table::Posts;

    fn entity_id(&self) -> &str {
        &self.id
    }
}

/// A comment on a post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: EntityId,
    pub post_id: EntityId,
    pub user_id: EntityId,
    pub content: String,
    #[serde(default)]
    pub created_at: String,
}

impl Comment {
    pub fn new(
        id: impl Into<EntityId>,
        post_id: impl Into<EntityId>,
        user_id: impl Into<EntityId>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            post_id: post_id.into(),
            user_id: user_id.into(),
            content: content.into(),
            created_at: String::new(),
        }
    }
}

impl TableRecord for Comment {
    const TABLE: Table = Table::Comments;

    fn entity_id(&self) -> &str {
        &self.id
    }

    fn scope_key(&self) -> Option<&str> {
        Some(&self.post_id)
    }
}

/// A two-party conversation row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: EntityId,
    pub user1: EntityId,
    pub user2: EntityId,
    #[serde(default)]
    pub created_at: String,
}

impl TableRecord for Conversation {
    const TABLE: Table = Table::Conversations;

    fn entity_id(&self) -> &str {
        &self.id
    }
}

/// Kind of message in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Image,
    Post,
}

/// A message row. Text messages carry `content`; image messages carry a
/// public `media_url` plus the storage `file_path` that backs it; shared
/// posts embed the post row itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: EntityId,
    pub conversation_id: EntityId,
    pub sender_id: EntityId,
    pub message_type: MessageKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post: Option<Box<Post>>,
    #[serde(default)]
    pub created_at: String,
}

/// Bucket image messages are uploaded to.
pub const CONVERSATIONS_BUCKET: &str = "conversations";

/// Bucket post media is uploaded to.
pub const POSTS_BUCKET: &str = "posts";

/// Bucket profile avatars are uploaded to.
pub const AVATARS_BUCKET: &str = "avatars";

impl Message {
    pub fn text(
        id: impl Into<EntityId>,
        conversation_id: impl Into<EntityId>,
        sender_id: impl Into<EntityId>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            conversation_id: conversation_id.into(),
            sender_id: sender_id.into(),
            message_type: MessageKind::Text,
            content: Some(content.into()),
            media_url: None,
            file_path: None,
            post: None,
            created_at: String::new(),
        }
    }

    pub fn image(
        id: impl Into<EntityId>,
        conversation_id: impl Into<EntityId>,
        sender_id: impl Into<EntityId>,
        media_url: impl Into<String>,
        file_path: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            conversation_id: conversation_id.into(),
            sender_id: sender_id.into(),
            message_type: MessageKind::Image,
            content: None,
            media_url: Some(media_url.into()),
            file_path: Some(file_path.into()),
            post: None,
            created_at: String::new(),
        }
    }

    pub fn shared_post(
        id: impl Into<EntityId>,
        conversation_id: impl Into<EntityId>,
        sender_id: impl Into<EntityId>,
        post: Post,
    ) -> Self {
        Self {
            id: id.into(),
            conversation_id: conversation_id.into(),
            sender_id: sender_id.into(),
            message_type: MessageKind::Post,
            content: None,
            media_url: None,
            file_path: None,
            post: Some(Box::new(post)),
            created_at: String::new(),
        }
    }
}

impl TableRecord for Message {
    const TABLE: Table = Table::Messages;

    fn entity_id(&self) -> &str {
        &self.id
    }

    fn scope_key(&self) -> Option<&str> {
        Some(&self.conversation_id)
    }

    fn attached_upload(&self) -> Option<UploadRef> {
        match (self.message_type, self.file_path.as_deref()) {
            (MessageKind::Image, Some(path)) => Some(UploadRef::new(CONVERSATIONS_BUCKET, path)),
            _ => None,
        }
    }
}

/// A follower relationship row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Follow {
    pub id: EntityId,
    pub follower_id: EntityId,
    pub following_id: EntityId,
    #[serde(default)]
    pub created_at: String,
}

impl TableRecord for Follow {
    const TABLE: Table = Table::Follows;

    fn entity_id(&self) -> &str {
        &self.id
    }

    fn scope_key(&self) -> Option<&str> {
        Some(&self.following_id)
    }
}

/// A like membership row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Like {
    pub id: EntityId,
    pub user_id: EntityId,
    pub post_id: EntityId,
    #[serde(default)]
    pub created_at: String,
}

impl TableRecord for Like {
    const TABLE: Table = Table::UserLikes;

    fn entity_id(&self) -> &str {
        &self.id
    }

    fn scope_key(&self) -> Option<&str> {
        Some(&self.post_id)
    }
}

/// A save membership row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Save {
    pub id: EntityId,
    pub user_id: EntityId,
    pub post_id: EntityId,
    #[serde(default)]
    pub created_at: String,
}

impl TableRecord for Save {
    const TABLE: Table = Table::UserSaves;

    fn entity_id(&self) -> &str {
        &self.id
    }

    fn scope_key(&self) -> Option<&str> {
        Some(&self.post_id)
    }
}
