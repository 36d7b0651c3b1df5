//! Query handler - typed reads over the domain tables.
//!
//! Requests and responses are tagged enums, so each table's rows come
//! back under a known tag and clients deserialize without inspecting
//! shapes.

use crate::db::{queries, Pool};
use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use tidepool_engine::{Comment, Conversation, Message, Post, Profile};

/// Request body for `/v1/query`.
#[derive(Debug, Deserialize)]
#[serde(tag = "query", rename_all = "snake_case")]
pub enum QueryRequest {
    /// Newest posts across all authors.
    Feed {
        #[serde(default)]
        limit: Option<i64>,
    },
    /// One post by id.
    Post { id: String },
    /// One author's posts, newest first.
    PostsByAuthor { user_id: String },
    /// Case-insensitive caption search.
    SearchPosts {
        caption: String,
        #[serde(default)]
        limit: Option<i64>,
    },
    /// Posts a user has liked.
    LikedPosts { user_id: String },
    /// Posts a user has saved.
    SavedPosts { user_id: String },
    /// One profile by id.
    Profile { id: String },
    /// Case-insensitive username search, optionally excluding one user.
    SearchProfiles {
        username: String,
        #[serde(default)]
        exclude: Option<String>,
        #[serde(default)]
        limit: Option<i64>,
    },
    /// Comments under a post, oldest first.
    Comments { post_id: String },
    /// Conversations a user participates in.
    Conversations { user_id: String },
    /// The conversation between two users, regardless of direction.
    ConversationBetween { user_a: String, user_b: String },
    /// Messages in a conversation, oldest first.
    Thread { conversation_id: String },
    /// Whether a user has liked and saved a post.
    Engagement { user_id: String, post_id: String },
    /// Whether one user follows another.
    FollowState {
        follower_id: String,
        following_id: String,
    },
    /// Post, follower, and following counts for a profile header.
    ProfileStats { user_id: String },
}

/// Response body for `/v1/query`.
#[derive(Debug, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum QueryResponse {
    Posts { rows: Vec<Post> },
    Post { row: Post },
    Profiles { rows: Vec<Profile> },
    Profile { row: Profile },
    Comments { rows: Vec<Comment> },
    Conversations { rows: Vec<Conversation> },
    Conversation { row: Conversation },
    Messages { rows: Vec<Message> },
    Engagement { liked: bool, saved: bool },
    FollowState { following: bool },
    ProfileStats {
        posts: i64,
        followers: i64,
        following: i64,
    },
}

/// Runs one typed query.
pub async fn handle_query(pool: &Pool, request: QueryRequest) -> Result<QueryResponse> {
    match request {
        QueryRequest::Feed { limit } => Ok(QueryResponse::Posts {
            rows: queries::feed_posts(pool, limit).await?,
        }),
        QueryRequest::Post { id } => {
            let row = queries::post_by_id(pool, &id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("post {id}")))?;
            Ok(QueryResponse::Post { row })
        }
        QueryRequest::PostsByAuthor { user_id } => Ok(QueryResponse::Posts {
            rows: queries::posts_by_author(pool, &user_id).await?,
        }),
        QueryRequest::SearchPosts { caption, limit } => Ok(QueryResponse::Posts {
            rows: queries::search_posts(pool, &caption, limit).await?,
        }),
        QueryRequest::LikedPosts { user_id } => Ok(QueryResponse::Posts {
            rows: queries::liked_posts(pool, &user_id).await?,
        }),
        QueryRequest::SavedPosts { user_id } => Ok(QueryResponse::Posts {
            rows: queries::saved_posts(pool, &user_id).await?,
        }),
        QueryRequest::Profile { id } => {
            let row = queries::profile_by_id(pool, &id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("profile {id}")))?;
            Ok(QueryResponse::Profile { row })
        }
        QueryRequest::SearchProfiles {
            username,
            exclude,
            limit,
        } => Ok(QueryResponse::Profiles {
            rows: queries::search_profiles(pool, &username, exclude.as_deref(), limit).await?,
        }),
        QueryRequest::Comments { post_id } => Ok(QueryResponse::Comments {
            rows: queries::comments_for_post(pool, &post_id).await?,
        }),
        QueryRequest::Conversations { user_id } => Ok(QueryResponse::Conversations {
            rows: queries::conversations_for_user(pool, &user_id).await?,
        }),
        QueryRequest::ConversationBetween { user_a, user_b } => {
            let row = queries::conversation_between(pool, &user_a, &user_b)
                .await?
                .ok_or_else(|| {
                    AppError::NotFound(format!("conversation between {user_a} and {user_b}"))
                })?;
            Ok(QueryResponse::Conversation { row })
        }
        QueryRequest::Thread { conversation_id } => Ok(QueryResponse::Messages {
            rows: queries::messages_for_conversation(pool, &conversation_id).await?,
        }),
        QueryRequest::Engagement { user_id, post_id } => {
            let (liked, saved) = queries::engagement_status(pool, &user_id, &post_id).await?;
            Ok(QueryResponse::Engagement { liked, saved })
        }
        QueryRequest::FollowState {
            follower_id,
            following_id,
        } => Ok(QueryResponse::FollowState {
            following: queries::is_following(pool, &follower_id, &following_id).await?,
        }),
        QueryRequest::ProfileStats { user_id } => {
            let (posts, followers, following) = queries::profile_counts(pool, &user_id).await?;
            Ok(QueryResponse::ProfileStats {
                posts,
                followers,
                following,
            })
        }
    }
}
