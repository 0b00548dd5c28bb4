//! Admin dashboard routes.
//!
//! Every conversation or dashboard read and mutation records an entry in the
//! admin access log. The `/logs` endpoints are not recorded. A failed log
//! write is warned about and never fails the request.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;

use super::{ApiError, ok_body, storage_error_to_status};
use crate::model::{Conversation, Message, MessageBody, UserProfile};
use crate::services::activity::{self, ActivityLog};
use crate::services::admin::{self, AdminError};
use crate::services::bridge;
use crate::services::dashboard::{self, DashboardSnapshot};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct AdminSendBody {
    pub content: MessageBody,
}

#[derive(Debug, Serialize)]
pub struct AdminSendResponse {
    pub message: Message,
    pub conversation: Conversation,
    pub delivered: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectBody {
    pub user_id: String,
}

#[derive(Deserialize)]
pub struct RecordLogBody {
    pub event: String,
    #[serde(default)]
    pub details: serde_json::Value,
}

/// `GET /api/admin/conversations` — every mirrored thread.
pub async fn list_threads(State(state): State<AppState>) -> Result<Json<Vec<Conversation>>, ApiError> {
    let threads = admin::list_threads(&state).await?;
    record_access(&state, "list_conversations", json!({ "count": threads.len() })).await;
    Ok(Json(threads))
}

/// `POST /api/admin/conversations` — open (or find) the thread for a user
/// profile before anyone has written in it.
pub async fn open_thread(
    State(state): State<AppState>,
    Json(profile): Json<UserProfile>,
) -> Result<Json<Conversation>, ApiError> {
    if profile.id.trim().is_empty() {
        return Err(ApiError::bad_request("E_MISSING_FIELD", "missing required field: id"));
    }
    let conversation = admin::find_or_create_thread(&state, &profile).await?;
    record_access(&state, "open_thread", json!({ "userId": profile.id })).await;
    Ok(Json(conversation))
}

/// `GET /api/admin/unread` — unread count across every thread, read straight
/// from the store rather than the cached dashboard view.
pub async fn unread_total(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    let total = admin::unread_total(&state).await?;
    record_access(&state, "unread_total", json!({ "unreadTotal": total })).await;
    Ok(Json(json!({ "unreadTotal": total })))
}

/// `POST /api/admin/conversations/:user_id/messages` — reply to a user.
pub async fn send_message(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(body): Json<AdminSendBody>,
) -> Result<(StatusCode, Json<AdminSendResponse>), ApiError> {
    let outcome = bridge::send_admin_message(&state, &user_id, body.content).await?;
    record_access(&state, "send_message", json!({ "userId": user_id, "messageId": outcome.message.id })).await;
    Ok((
        StatusCode::CREATED,
        Json(AdminSendResponse {
            message: outcome.message,
            conversation: outcome.conversation,
            delivered: outcome.delivered,
        }),
    ))
}

/// `POST /api/admin/conversations/:user_id/read` — mark a thread read.
pub async fn mark_read(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let updated = admin::mark_thread_read(&state, &user_id).await?;
    record_access(&state, "mark_read", json!({ "userId": user_id })).await;
    Ok(Json(json!({ "updated": updated })))
}

/// `GET /api/admin/dashboard` — cached list, selection and unread total.
pub async fn dashboard(State(state): State<AppState>) -> Json<DashboardSnapshot> {
    let snapshot = dashboard::snapshot(&state).await;
    record_access(&state, "view_dashboard", json!({ "unreadTotal": snapshot.unread_total })).await;
    Json(snapshot)
}

/// `PUT /api/admin/dashboard/selection` — open a thread and mark it read.
pub async fn select_thread(
    State(state): State<AppState>,
    Json(body): Json<SelectBody>,
) -> Result<Json<Conversation>, ApiError> {
    let conversation = dashboard::select_thread(&state, &body.user_id).await?;
    record_access(&state, "select_thread", json!({ "userId": body.user_id })).await;
    Ok(Json(conversation))
}

/// `DELETE /api/admin/dashboard/selection`
pub async fn clear_selection(State(state): State<AppState>) -> Json<serde_json::Value> {
    dashboard::clear_selection(&state).await;
    record_access(&state, "clear_selection", json!({})).await;
    ok_body()
}

/// `GET /api/admin/logs/:log` — `security`, `admin_access` or `suspicious`.
pub async fn list_log(
    State(state): State<AppState>,
    Path(log): Path<ActivityLog>,
) -> Result<Json<Vec<serde_json::Value>>, ApiError> {
    Ok(Json(activity::list(&state, log).await?))
}

/// `POST /api/admin/logs/:log` — append an entry.
pub async fn record_log(
    State(state): State<AppState>,
    Path(log): Path<ActivityLog>,
    Json(body): Json<RecordLogBody>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    if body.event.trim().is_empty() {
        return Err(ApiError::bad_request("E_MISSING_FIELD", "missing required field: event"));
    }
    let entry = activity::record(&state, log, &body.event, body.details).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

/// `DELETE /api/admin/logs/:log`
pub async fn clear_log(
    State(state): State<AppState>,
    Path(log): Path<ActivityLog>,
) -> Result<Json<serde_json::Value>, ApiError> {
    activity::clear(&state, log).await?;
    Ok(ok_body())
}

async fn record_access(state: &AppState, event: &str, details: serde_json::Value) {
    if let Err(e) = activity::record(state, ActivityLog::AdminAccess, event, details).await {
        warn!(event, error = %e, "admin access log write failed");
    }
}

impl From<AdminError> for ApiError {
    fn from(err: AdminError) -> Self {
        Self::new(admin_error_to_status(&err), &err)
    }
}

pub(crate) fn admin_error_to_status(err: &AdminError) -> StatusCode {
    match err {
        AdminError::ThreadNotFound(_) => StatusCode::NOT_FOUND,
        AdminError::Storage(e) => storage_error_to_status(e),
    }
}

#[cfg(test)]
#[path = "admin_test.rs"]
mod tests;
