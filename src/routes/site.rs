//! Public site routes — contact form and status banners.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::Deserialize;

use super::{ApiError, ok_body, storage_error_to_status};
use crate::services::site::{self, ContactSubmission, NewContactSubmission, SiteError, StatusKind, StatusMessage};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreateStatusBody {
    pub message: String,
    #[serde(default, rename = "type")]
    pub kind: StatusKind,
}

#[derive(Deserialize)]
pub struct StatusActiveBody {
    pub active: bool,
}

/// `POST /api/contact`
pub async fn submit_contact(
    State(state): State<AppState>,
    Json(body): Json<NewContactSubmission>,
) -> Result<(StatusCode, Json<ContactSubmission>), ApiError> {
    let submission = site::submit_contact(&state, body).await?;
    Ok((StatusCode::CREATED, Json(submission)))
}

/// `GET /api/admin/contact`
pub async fn list_contacts(State(state): State<AppState>) -> Result<Json<Vec<ContactSubmission>>, ApiError> {
    Ok(Json(site::list_contacts(&state).await?))
}

/// `POST /api/admin/contact/:id/read`
pub async fn mark_contact_read(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ContactSubmission>, ApiError> {
    Ok(Json(site::mark_contact_read(&state, &id).await?))
}

/// `GET /api/status` — banners currently shown on the site.
pub async fn active_status(State(state): State<AppState>) -> Result<Json<Vec<StatusMessage>>, ApiError> {
    Ok(Json(site::active_status(&state).await?))
}

/// `GET /api/admin/status` — every banner, active or not.
pub async fn list_status(State(state): State<AppState>) -> Result<Json<Vec<StatusMessage>>, ApiError> {
    Ok(Json(site::list_status(&state).await?))
}

/// `POST /api/admin/status`
pub async fn create_status(
    State(state): State<AppState>,
    Json(body): Json<CreateStatusBody>,
) -> Result<(StatusCode, Json<StatusMessage>), ApiError> {
    let status = site::create_status(&state, &body.message, body.kind).await?;
    Ok((StatusCode::CREATED, Json(status)))
}

/// `PUT /api/admin/status/:id` — activate or deactivate.
pub async fn set_status_active(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<StatusActiveBody>,
) -> Result<Json<StatusMessage>, ApiError> {
    Ok(Json(site::set_status_active(&state, &id, body.active).await?))
}

/// `DELETE /api/admin/status/:id`
pub async fn delete_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    site::delete_status(&state, &id).await?;
    Ok(ok_body())
}

impl From<SiteError> for ApiError {
    fn from(err: SiteError) -> Self {
        Self::new(site_error_to_status(&err), &err)
    }
}

pub(crate) fn site_error_to_status(err: &SiteError) -> StatusCode {
    match err {
        SiteError::MissingField(_) | SiteError::InvalidEmail(_) => StatusCode::BAD_REQUEST,
        SiteError::NotFound(_) => StatusCode::NOT_FOUND,
        SiteError::Storage(e) => storage_error_to_status(e),
    }
}

#[cfg(test)]
#[path = "site_test.rs"]
mod tests;
