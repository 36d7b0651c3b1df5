//! Mutation handler - committed writes plus realtime fan-out.
//!
//! Every successful write broadcasts the committed row as a change
//! event after the transaction lands. For engagement toggles the
//! membership event goes out before the counter update, so subscribers
//! settle the toggle before the new count arrives.

use crate::auth::AuthUser;
use crate::db::{mutations, queries};
use crate::error::{AppError, Result};
use crate::AppState;
use serde::{Deserialize, Serialize};
use tidepool_engine::{
    ChangeNotification, Comment, Conversation, Message, MessageKind, Post, Profile, Table,
    TableRecord, UploadRef,
};

/// Request body for `/v1/mutate`. Rows carry client-generated ids, so
/// the committed row keeps the id the client already rendered.
#[derive(Debug, Deserialize)]
#[serde(tag = "mutation", rename_all = "snake_case")]
pub enum MutationRequest {
    CreatePost { post: Post },
    CreateComment { comment: Comment },
    DeleteComment { id: String },
    CreateConversation { conversation: Conversation },
    SendMessage { message: Message },
    DeleteMessage { id: String },
    SetLike { post_id: String, liked: bool },
    SetSave { post_id: String, saved: bool },
    SetFollow { following_id: String, following: bool },
    UpdateProfile { profile: Profile },
}

/// Response body for `/v1/mutate`.
#[derive(Debug, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum MutationResponse {
    Post { row: Post },
    Comment { row: Comment },
    Conversation { row: Conversation },
    Message { row: Message },
    Profile { row: Profile },
    Deleted {
        table: Table,
        id: String,
        /// Blob released by the delete (image messages); the client
        /// follows up with a storage remove.
        #[serde(skip_serializing_if = "Option::is_none")]
        freed_upload: Option<UploadRef>,
    },
    Like {
        post_id: String,
        liked: bool,
        likes: i64,
        changed: bool,
    },
    Save {
        post_id: String,
        saved: bool,
        changed: bool,
    },
    Follow {
        following_id: String,
        following: bool,
        changed: bool,
    },
}

fn ensure_actor(user: &AuthUser, owner: &str) -> Result<()> {
    if user.user_id != owner {
        return Err(AppError::Forbidden(
            "row does not belong to the authenticated user".to_string(),
        ));
    }
    Ok(())
}

fn ensure_entity_id(id: &str) -> Result<()> {
    if id.trim().is_empty() {
        return Err(AppError::BadRequest("row id is required".to_string()));
    }
    Ok(())
}

fn conflict_on_unique(err: sqlx::Error) -> AppError {
    if mutations::is_unique_violation(&err) {
        AppError::Conflict("row already exists".to_string())
    } else {
        AppError::Database(err)
    }
}

fn insert_event<T: Serialize>(table: Table, row: &T) -> Result<ChangeNotification> {
    Ok(ChangeNotification::insert(table, serde_json::to_value(row)?))
}

fn update_event<T: Serialize>(table: Table, row: &T) -> Result<ChangeNotification> {
    Ok(ChangeNotification::update(table, serde_json::to_value(row)?))
}

fn delete_event(table: Table, id: &str) -> ChangeNotification {
    ChangeNotification::delete(table, serde_json::json!({ "id": id }))
}

/// Runs one mutation as the authenticated user.
pub async fn handle_mutation(
    state: &AppState,
    user: &AuthUser,
    request: MutationRequest,
) -> Result<MutationResponse> {
    match request {
        MutationRequest::CreatePost { post } => {
            ensure_actor(user, &post.user_id)?;
            ensure_entity_id(&post.id)?;

            let row = mutations::insert_post(&state.pool, &post)
                .await
                .map_err(conflict_on_unique)?;
            state
                .realtime
                .broadcast_change(&insert_event(Table::Posts, &row)?);

            Ok(MutationResponse::Post { row })
        }

        MutationRequest::CreateComment { comment } => {
            ensure_actor(user, &comment.user_id)?;
            ensure_entity_id(&comment.id)?;

            if queries::post_by_id(&state.pool, &comment.post_id)
                .await?
                .is_none()
            {
                return Err(AppError::NotFound(format!("post {}", comment.post_id)));
            }

            let row = mutations::insert_comment(&state.pool, &comment)
                .await
                .map_err(conflict_on_unique)?;
            state
                .realtime
                .broadcast_change(&insert_event(Table::Comments, &row)?);

            Ok(MutationResponse::Comment { row })
        }

        MutationRequest::DeleteComment { id } => {
            let deleted = mutations::delete_comment(&state.pool, &id, &user.user_id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("comment {id}")))?;
            state
                .realtime
                .broadcast_change(&delete_event(Table::Comments, &deleted));

            Ok(MutationResponse::Deleted {
                table: Table::Comments,
                id: deleted,
                freed_upload: None,
            })
        }

        MutationRequest::CreateConversation { conversation } => {
            ensure_entity_id(&conversation.id)?;
            if conversation.user1 != user.user_id && conversation.user2 != user.user_id {
                return Err(AppError::Forbidden(
                    "conversation must include the authenticated user".to_string(),
                ));
            }
            if conversation.user1 == conversation.user2 {
                return Err(AppError::BadRequest(
                    "conversation needs two distinct users".to_string(),
                ));
            }

            // Creation is not get-or-create: clients query the pair
            // first, and a losing race surfaces as a conflict.
            if queries::conversation_between(&state.pool, &conversation.user1, &conversation.user2)
                .await?
                .is_some()
            {
                return Err(AppError::Conflict(
                    "conversation between these users already exists".to_string(),
                ));
            }

            let row = mutations::insert_conversation(&state.pool, &conversation)
                .await
                .map_err(conflict_on_unique)?;
            state
                .realtime
                .broadcast_change(&insert_event(Table::Conversations, &row)?);

            Ok(MutationResponse::Conversation { row })
        }

        MutationRequest::SendMessage { message } => {
            ensure_actor(user, &message.sender_id)?;
            ensure_entity_id(&message.id)?;
            validate_message_shape(&message)?;

            let conversation =
                queries::conversation_by_id(&state.pool, &message.conversation_id)
                    .await?
                    .ok_or_else(|| {
                        AppError::NotFound(format!(
                            "conversation {}",
                            message.conversation_id
                        ))
                    })?;
            if conversation.user1 != user.user_id && conversation.user2 != user.user_id {
                return Err(AppError::Forbidden(
                    "not a participant in this conversation".to_string(),
                ));
            }

            let row = mutations::insert_message(&state.pool, &message)
                .await
                .map_err(conflict_on_unique)?;
            state
                .realtime
                .broadcast_change(&insert_event(Table::Messages, &row)?);

            Ok(MutationResponse::Message { row })
        }

        MutationRequest::DeleteMessage { id } => {
            let deleted = mutations::delete_message(&state.pool, &id, &user.user_id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("message {id}")))?;
            // Rows never cascade into storage; the freed path rides the
            // response so the client can remove the blob itself.
            let freed_upload = deleted.attached_upload();
            state
                .realtime
                .broadcast_change(&delete_event(Table::Messages, &deleted.id));

            Ok(MutationResponse::Deleted {
                table: Table::Messages,
                id: deleted.id,
                freed_upload,
            })
        }

        MutationRequest::SetLike { post_id, liked } => {
            if queries::post_by_id(&state.pool, &post_id).await?.is_none() {
                return Err(AppError::NotFound(format!("post {post_id}")));
            }

            let change = mutations::set_like(&state.pool, &user.user_id, &post_id, liked).await?;

            if let Some(row) = &change.row {
                state
                    .realtime
                    .broadcast_change(&insert_event(Table::UserLikes, row)?);
            }
            if let Some(id) = &change.removed_id {
                state
                    .realtime
                    .broadcast_change(&delete_event(Table::UserLikes, id));
            }
            if let Some(post) = &change.post {
                state
                    .realtime
                    .broadcast_change(&update_event(Table::Posts, post)?);
            }

            Ok(MutationResponse::Like {
                post_id,
                liked,
                likes: change.likes,
                changed: change.changed,
            })
        }

        MutationRequest::SetSave { post_id, saved } => {
            if queries::post_by_id(&state.pool, &post_id).await?.is_none() {
                return Err(AppError::NotFound(format!("post {post_id}")));
            }

            let change = mutations::set_save(&state.pool, &user.user_id, &post_id, saved).await?;

            if let Some(row) = &change.row {
                state
                    .realtime
                    .broadcast_change(&insert_event(Table::UserSaves, row)?);
            }
            if let Some(id) = &change.removed_id {
                state
                    .realtime
                    .broadcast_change(&delete_event(Table::UserSaves, id));
            }

            Ok(MutationResponse::Save {
                post_id,
                saved,
                changed: change.changed,
            })
        }

        MutationRequest::SetFollow {
            following_id,
            following,
        } => {
            if following_id == user.user_id {
                return Err(AppError::BadRequest("cannot follow yourself".to_string()));
            }
            if queries::profile_by_id(&state.pool, &following_id)
                .await?
                .is_none()
            {
                return Err(AppError::NotFound(format!("profile {following_id}")));
            }

            let change =
                mutations::set_follow(&state.pool, &user.user_id, &following_id, following).await?;

            if let Some(row) = &change.row {
                state
                    .realtime
                    .broadcast_change(&insert_event(Table::Follows, row)?);
            }
            if let Some(id) = &change.removed_id {
                state
                    .realtime
                    .broadcast_change(&delete_event(Table::Follows, id));
            }

            Ok(MutationResponse::Follow {
                following_id,
                following,
                changed: change.changed,
            })
        }

        MutationRequest::UpdateProfile { profile } => {
            ensure_actor(user, &profile.id)?;
            if profile.username.trim().is_empty() {
                return Err(AppError::BadRequest("username is required".to_string()));
            }

            let row = mutations::update_profile(&state.pool, &profile)
                .await
                .map_err(|e| {
                    if mutations::is_unique_violation(&e) {
                        AppError::Conflict("username already taken".to_string())
                    } else {
                        AppError::Database(e)
                    }
                })?
                .ok_or_else(|| AppError::NotFound(format!("profile {}", profile.id)))?;
            state
                .realtime
                .broadcast_change(&update_event(Table::Profiles, &row)?);

            Ok(MutationResponse::Profile { row })
        }
    }
}

fn validate_message_shape(message: &Message) -> Result<()> {
    let problem = match message.message_type {
        MessageKind::Text if message.content.is_none() => Some("text message requires content"),
        MessageKind::Image if message.media_url.is_none() || message.file_path.is_none() => {
            Some("image message requires media_url and file_path")
        }
        MessageKind::Post if message.post.is_none() => {
            Some("shared post message requires the post row")
        }
        _ => None,
    };

    match problem {
        Some(msg) => Err(AppError::BadRequest(msg.to_string())),
        None => Ok(()),
    }
}
