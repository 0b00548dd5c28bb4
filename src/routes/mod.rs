//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! This module binds the HTTP API and the notification websocket under a
//! single Axum router. User-facing routes live under `/api/users/{id}`,
//! dashboard routes under `/api/admin`, and listing helpers (compare,
//! favorites, job images) directly under `/api`.
//!
//! ERROR HANDLING
//! ==============
//! Handlers return `ApiError`, built from any service error through its
//! `*_error_to_status` mapping. The body carries the same `code`, `message`
//! and `retryable` fields an error frame carries.

pub mod admin;
pub mod conversations;
pub mod listings;
pub mod site;
pub mod ws;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{delete, get, post, put};
use serde_json::json;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::frame::ErrorCode;
use crate::state::AppState;
use crate::storage::StorageError;

/// Upper bound on an uploaded image body, before compression.
const IMAGE_UPLOAD_LIMIT: usize = 16 * 1024 * 1024;

/// Build the full application router.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/healthz", get(healthz))
        // User conversations.
        .route("/api/users/{user_id}/conversations", get(conversations::list_threads))
        .route(
            "/api/users/{user_id}/conversations/{thread_id}/messages",
            post(conversations::send_message),
        )
        .route(
            "/api/users/{user_id}/conversations/{thread_id}/read",
            post(conversations::mark_read),
        )
        .route(
            "/api/users/{user_id}/conversations/{thread_id}/auto-reply",
            delete(conversations::cancel_auto_reply),
        )
        // Admin dashboard.
        .route("/api/admin/conversations", get(admin::list_threads).post(admin::open_thread))
        .route("/api/admin/unread", get(admin::unread_total))
        .route("/api/admin/conversations/{user_id}/messages", post(admin::send_message))
        .route("/api/admin/conversations/{user_id}/read", post(admin::mark_read))
        .route("/api/admin/dashboard", get(admin::dashboard))
        .route(
            "/api/admin/dashboard/selection",
            put(admin::select_thread).delete(admin::clear_selection),
        )
        .route(
            "/api/admin/logs/{log}",
            get(admin::list_log).post(admin::record_log).delete(admin::clear_log),
        )
        .route("/api/admin/images/purge", post(listings::purge_images))
        .route("/api/admin/contact", get(site::list_contacts))
        .route("/api/admin/contact/{id}/read", post(site::mark_contact_read))
        .route("/api/admin/status", get(site::list_status).post(site::create_status))
        .route(
            "/api/admin/status/{id}",
            put(site::set_status_active).delete(site::delete_status),
        )
        // Listings.
        .route("/api/compare", get(listings::get_compare).delete(listings::clear_compare))
        .route("/api/compare/listings", post(listings::add_compare))
        .route("/api/compare/listings/{listing_id}", delete(listings::remove_compare))
        .route("/api/compare/visibility", put(listings::set_compare_visible))
        .route("/api/favorites", get(listings::list_favorites))
        .route(
            "/api/favorites/{listing_id}",
            get(listings::is_favorite).post(listings::toggle_favorite),
        )
        .route(
            "/api/jobs/{job_id}/images",
            get(listings::list_images)
                .post(listings::upload_image)
                .delete(listings::clear_images)
                .layer(DefaultBodyLimit::max(IMAGE_UPLOAD_LIMIT)),
        )
        .route("/api/jobs/{job_id}/images/{image_id}", delete(listings::remove_image))
        .route(
            "/api/jobs/{job_id}/featured",
            get(listings::featured_image).put(listings::set_featured_image),
        )
        // Public site.
        .route("/api/contact", post(site::submit_contact))
        .route("/api/status", get(site::active_status))
        .route("/api/ws", get(ws::handle_ws))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

// =============================================================================
// ERRORS
// =============================================================================

/// JSON error response: `{code, message, retryable}` with an HTTP status.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
    pub retryable: bool,
}

impl ApiError {
    pub fn new(status: StatusCode, err: &(impl ErrorCode + ?Sized)) -> Self {
        Self { status, code: err.error_code(), message: err.to_string(), retryable: err.retryable() }
    }

    pub fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        Self { status: StatusCode::BAD_REQUEST, code, message: message.into(), retryable: false }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(status = %self.status, code = self.code, message = %self.message, "request failed");
        }
        let body = json!({
            "code": self.code,
            "message": self.message,
            "retryable": self.retryable,
        });
        (self.status, Json(body)).into_response()
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        Self::new(storage_error_to_status(&err), &err)
    }
}

pub(crate) fn storage_error_to_status(err: &StorageError) -> StatusCode {
    match err {
        StorageError::QuotaExceeded { .. } => StatusCode::INSUFFICIENT_STORAGE,
        StorageError::Corrupt { .. } | StorageError::Encode { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        StorageError::Database(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

/// `{"ok": true}` body for mutations with nothing else to report.
pub(crate) fn ok_body() -> Json<serde_json::Value> {
    Json(json!({ "ok": true }))
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
