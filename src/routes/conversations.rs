//! End-user conversation routes.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::{Deserialize, Serialize};

use super::{ApiError, storage_error_to_status};
use crate::model::{Conversation, Message, MessageBody, UserProfile};
use crate::services::bridge;
use crate::services::conversation::{self, ConversationError, ThreadSummary};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct SendMessageBody {
    pub content: MessageBody,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageResponse {
    pub message: Message,
    pub conversation: Conversation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mirrored: Option<bool>,
    /// Delay before the auto-reply lands, when one was scheduled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_reply_in_ms: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct MarkReadResponse {
    pub updated: usize,
}

#[derive(Debug, Serialize)]
pub struct CancelReplyResponse {
    pub cancelled: usize,
}

/// `GET /api/users/:user_id/conversations` — list threads with unread counts.
pub async fn list_threads(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<ThreadSummary>>, ApiError> {
    let threads = conversation::list_threads(&state, &user_id).await?;
    Ok(Json(threads))
}

/// `POST /api/users/:user_id/conversations/:thread_id/messages` — send as the user.
pub async fn send_message(
    State(state): State<AppState>,
    Path((user_id, thread_id)): Path<(String, String)>,
    Json(body): Json<SendMessageBody>,
) -> Result<(StatusCode, Json<SendMessageResponse>), ApiError> {
    let profile = UserProfile {
        id: user_id,
        name: body.name,
        email: body.email,
        avatar: body.avatar,
        role: body.role,
    };
    let outcome = bridge::send_user_message(&state, &profile, &thread_id, body.content).await?;

    let mut auto_reply_in_ms = None;
    if let Some(pending) = outcome.auto_reply {
        auto_reply_in_ms = Some(u64::try_from(pending.delay().as_millis()).unwrap_or(u64::MAX));
        state.pending_replies.track(&profile.id, &thread_id, pending).await;
    }
    Ok((
        StatusCode::CREATED,
        Json(SendMessageResponse {
            message: outcome.message,
            conversation: outcome.conversation,
            mirrored: outcome.mirrored,
            auto_reply_in_ms,
        }),
    ))
}

/// `DELETE /api/users/:user_id/conversations/:thread_id/auto-reply` — cancel
/// the replies still pending in the thread.
pub async fn cancel_auto_reply(
    State(state): State<AppState>,
    Path((user_id, thread_id)): Path<(String, String)>,
) -> Json<CancelReplyResponse> {
    let cancelled = state.pending_replies.cancel_thread(&user_id, &thread_id).await;
    Json(CancelReplyResponse { cancelled })
}

/// `POST /api/users/:user_id/conversations/:thread_id/read` — mark the thread read.
pub async fn mark_read(
    State(state): State<AppState>,
    Path((user_id, thread_id)): Path<(String, String)>,
) -> Result<Json<MarkReadResponse>, ApiError> {
    let updated = conversation::mark_thread_read(&state, &user_id, &thread_id).await?;
    Ok(Json(MarkReadResponse { updated }))
}

impl From<ConversationError> for ApiError {
    fn from(err: ConversationError) -> Self {
        Self::new(conversation_error_to_status(&err), &err)
    }
}

pub(crate) fn conversation_error_to_status(err: &ConversationError) -> StatusCode {
    match err {
        ConversationError::ThreadNotFound(_) => StatusCode::NOT_FOUND,
        ConversationError::Storage(e) => storage_error_to_status(e),
    }
}

#[cfg(test)]
#[path = "conversations_test.rs"]
mod tests;
