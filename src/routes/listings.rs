//! Listing helper routes — compare set, favorites and job images.

use std::borrow::Cow;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{ApiError, ok_body, storage_error_to_status};
use crate::services::compare::{self, CompareError, CompareSet, ComparedListing};
use crate::services::favorites;
use crate::services::images::{self, ImageError, JobImage};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct VisibilityBody {
    pub visible: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeaturedBody {
    pub image_id: String,
}

#[derive(Debug, Serialize)]
pub struct FavoriteResponse {
    pub favorite: bool,
}

// =============================================================================
// COMPARE
// =============================================================================

/// `GET /api/compare`
pub async fn get_compare(State(state): State<AppState>) -> Result<Json<CompareSet>, ApiError> {
    Ok(Json(compare::get(&state).await?))
}

/// `POST /api/compare/listings` — add a listing; 409 once the set is full.
pub async fn add_compare(
    State(state): State<AppState>,
    Json(listing): Json<ComparedListing>,
) -> Result<Json<CompareSet>, ApiError> {
    Ok(Json(compare::add(&state, listing).await?))
}

/// `DELETE /api/compare/listings/:listing_id`
pub async fn remove_compare(
    State(state): State<AppState>,
    Path(listing_id): Path<String>,
) -> Result<Json<CompareSet>, ApiError> {
    Ok(Json(compare::remove(&state, &listing_id).await?))
}

/// `DELETE /api/compare`
pub async fn clear_compare(State(state): State<AppState>) -> Result<Json<CompareSet>, ApiError> {
    Ok(Json(compare::clear(&state).await?))
}

/// `PUT /api/compare/visibility`
pub async fn set_compare_visible(
    State(state): State<AppState>,
    Json(body): Json<VisibilityBody>,
) -> Result<Json<CompareSet>, ApiError> {
    Ok(Json(compare::set_visible(&state, body.visible).await?))
}

// =============================================================================
// FAVORITES
// =============================================================================

/// `GET /api/favorites`
pub async fn list_favorites(State(state): State<AppState>) -> Result<Json<Vec<String>>, ApiError> {
    Ok(Json(favorites::list(&state).await?))
}

/// `GET /api/favorites/:listing_id`
pub async fn is_favorite(
    State(state): State<AppState>,
    Path(listing_id): Path<String>,
) -> Result<Json<FavoriteResponse>, ApiError> {
    let favorite = favorites::is_favorite(&state, &listing_id).await?;
    Ok(Json(FavoriteResponse { favorite }))
}

/// `POST /api/favorites/:listing_id` — star or unstar.
pub async fn toggle_favorite(
    State(state): State<AppState>,
    Path(listing_id): Path<String>,
) -> Result<Json<FavoriteResponse>, ApiError> {
    let favorite = favorites::toggle(&state, &listing_id).await?;
    Ok(Json(FavoriteResponse { favorite }))
}

// =============================================================================
// JOB IMAGES
// =============================================================================

/// `GET /api/jobs/:job_id/images`
pub async fn list_images(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<Vec<JobImage>>, ApiError> {
    Ok(Json(images::list_images(&state, &job_id).await?))
}

/// `POST /api/jobs/:job_id/images` — body is the raw image file or a base64
/// data URL.
pub async fn upload_image(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
    body: Bytes,
) -> Result<(StatusCode, Json<JobImage>), ApiError> {
    let bytes = decode_upload(&body)?;
    let image = images::add_image(&state, &job_id, &bytes).await?;
    Ok((StatusCode::CREATED, Json(image)))
}

/// `DELETE /api/jobs/:job_id/images`
pub async fn clear_images(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    images::clear_images(&state, &job_id).await?;
    Ok(ok_body())
}

/// `DELETE /api/jobs/:job_id/images/:image_id` — returns the remaining images.
pub async fn remove_image(
    State(state): State<AppState>,
    Path((job_id, image_id)): Path<(String, String)>,
) -> Result<Json<Vec<JobImage>>, ApiError> {
    Ok(Json(images::remove_image(&state, &job_id, &image_id).await?))
}

/// `GET /api/jobs/:job_id/featured` — `null` when none is set.
pub async fn featured_image(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<Option<JobImage>>, ApiError> {
    Ok(Json(images::featured(&state, &job_id).await?))
}

/// `PUT /api/jobs/:job_id/featured`
pub async fn set_featured_image(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
    Json(body): Json<FeaturedBody>,
) -> Result<Json<JobImage>, ApiError> {
    Ok(Json(images::set_featured(&state, &job_id, &body.image_id).await?))
}

/// `POST /api/admin/images/purge` — drop outdated image keys.
pub async fn purge_images(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    let removed = images::purge_outdated(&state).await?;
    Ok(Json(json!({ "removed": removed })))
}

/// Raw file bytes pass through; a `data:<mime>;base64,<payload>` body is
/// decoded first.
fn decode_upload(body: &[u8]) -> Result<Cow<'_, [u8]>, ApiError> {
    if body.is_empty() {
        return Err(ApiError::bad_request("E_EMPTY_UPLOAD", "empty upload"));
    }
    if !body.starts_with(b"data:") {
        return Ok(Cow::Borrowed(body));
    }
    let text = std::str::from_utf8(body).map_err(|_| ApiError::bad_request("E_INVALID_DATA_URL", "data URL is not UTF-8"))?;
    let Some((_, payload)) = text.split_once(";base64,") else {
        return Err(ApiError::bad_request("E_INVALID_DATA_URL", "data URL must be base64-encoded"));
    };
    BASE64
        .decode(payload.trim())
        .map(Cow::Owned)
        .map_err(|e| ApiError::bad_request("E_INVALID_DATA_URL", format!("invalid base64: {e}")))
}

// =============================================================================
// ERROR MAPPING
// =============================================================================

impl From<CompareError> for ApiError {
    fn from(err: CompareError) -> Self {
        Self::new(compare_error_to_status(&err), &err)
    }
}

impl From<ImageError> for ApiError {
    fn from(err: ImageError) -> Self {
        Self::new(image_error_to_status(&err), &err)
    }
}

pub(crate) fn compare_error_to_status(err: &CompareError) -> StatusCode {
    match err {
        CompareError::Full { .. } => StatusCode::CONFLICT,
        CompareError::Storage(e) => storage_error_to_status(e),
    }
}

pub(crate) fn image_error_to_status(err: &ImageError) -> StatusCode {
    match err {
        ImageError::LimitReached { .. } => StatusCode::CONFLICT,
        ImageError::NotFound(_) => StatusCode::NOT_FOUND,
        ImageError::Decode(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ImageError::Encode(_) => StatusCode::INTERNAL_SERVER_ERROR,
        ImageError::Storage(e) => storage_error_to_status(e),
    }
}

#[cfg(test)]
#[path = "listings_test.rs"]
mod tests;
