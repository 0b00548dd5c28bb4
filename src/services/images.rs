//! Images service — compressed job-posting images held in the storage area.
//!
//! DESIGN
//! ======
//! Each job keeps at most `JOB_IMAGE_LIMIT` images under `job_images_<jobId>`
//! and one featured image under `job_featured_image_<jobId>`. Uploads are
//! decoded, downsized to `IMAGE_MAX_DIMENSION` on the longest edge and
//! re-encoded as JPEG, then stored inline as base64 data URLs.
//!
//! ERROR HANDLING
//! ==============
//! An upload that hits the storage quota is compressed again at half the
//! dimension and quality and retried once. A second quota failure is
//! returned to the caller with the stored list unchanged.
//!
//! Image keys from older schema versions, or that no longer parse, are
//! removed by `purge_outdated`.

use std::io::Cursor;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use image::DynamicImage;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::ImageConfig;
use crate::frame::{ErrorCode, now_ms};
use crate::state::AppState;
use crate::storage::{self, SCHEMA_VERSION, StorageError, keys};

const MIN_RETRY_QUALITY: u8 = 10;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("job {job_id} already has the maximum of {limit} images")]
    LimitReached { job_id: String, limit: usize },
    #[error("image not found: {0}")]
    NotFound(String),
    #[error("unreadable image: {0}")]
    Decode(#[source] image::ImageError),
    #[error("image encoding failed: {0}")]
    Encode(#[source] image::ImageError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ErrorCode for ImageError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::LimitReached { .. } => "E_IMAGE_LIMIT",
            Self::NotFound(_) => "E_IMAGE_NOT_FOUND",
            Self::Decode(_) => "E_IMAGE_DECODE",
            Self::Encode(_) => "E_IMAGE_ENCODE",
            Self::Storage(e) => e.error_code(),
        }
    }

    fn retryable(&self) -> bool {
        match self {
            Self::Storage(e) => e.retryable(),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobImage {
    pub id: String,
    pub data_url: String,
    pub created_at: i64,
}

// =============================================================================
// COMPRESSION
// =============================================================================

/// Decode `bytes`, fit within `config.max_dimension`, and encode as a JPEG
/// data URL.
///
/// # Errors
///
/// Returns `Decode` for unrecognized input or `Encode` if JPEG encoding fails.
pub fn compress_image(bytes: &[u8], config: &ImageConfig) -> Result<String, ImageError> {
    let img = image::load_from_memory(bytes).map_err(ImageError::Decode)?;
    let max = config.max_dimension.max(1);
    let img = if img.width() > max || img.height() > max { img.resize(max, max, FilterType::Triangle) } else { img };

    // JPEG has no alpha channel.
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
    let mut buf = Vec::new();
    let encoder = JpegEncoder::new_with_quality(Cursor::new(&mut buf), config.quality);
    rgb.write_with_encoder(encoder).map_err(ImageError::Encode)?;
    Ok(format!("data:image/jpeg;base64,{}", BASE64.encode(&buf)))
}

/// Settings for the retry after a quota failure.
#[must_use]
pub fn stronger(config: &ImageConfig) -> ImageConfig {
    ImageConfig {
        max_dimension: (config.max_dimension / 2).max(1),
        quality: (config.quality / 2).max(MIN_RETRY_QUALITY),
        ..*config
    }
}

// =============================================================================
// OPERATIONS
// =============================================================================

/// Images stored for `job_id`. Unreadable data reads as empty.
///
/// # Errors
///
/// Returns a storage backend error.
pub async fn list_images(state: &AppState, job_id: &str) -> Result<Vec<JobImage>, ImageError> {
    match state.load_json::<Vec<JobImage>>(&keys::job_images(job_id)).await {
        Ok(images) => Ok(images.unwrap_or_default()),
        Err(StorageError::Corrupt { source, .. }) => {
            warn!(%job_id, error = %source, "unreadable job images; treating as empty");
            Ok(Vec::new())
        }
        Err(e) => Err(e.into()),
    }
}

/// Compress and store an uploaded image for `job_id`.
///
/// # Errors
///
/// Returns `LimitReached` at the per-job cap, a decode or encode error, or
/// the storage error of the final attempt.
pub async fn add_image(state: &AppState, job_id: &str, bytes: &[u8]) -> Result<JobImage, ImageError> {
    let config = state.config.images;
    let mut images = list_images(state, job_id).await?;
    if images.len() >= config.per_job_limit {
        warn!(%job_id, limit = config.per_job_limit, "image upload rejected: limit reached");
        return Err(ImageError::LimitReached { job_id: job_id.to_owned(), limit: config.per_job_limit });
    }

    let data_url = compress_image(bytes, &config)?;
    let mut image = JobImage { id: Uuid::new_v4().to_string(), data_url, created_at: now_ms() };
    images.push(image.clone());
    let key = keys::job_images(job_id);
    match state.store_json(&key, &images).await {
        Ok(()) => {}
        Err(StorageError::QuotaExceeded { needed, quota, .. }) => {
            warn!(%job_id, needed, quota, "storage quota hit; retrying with stronger compression");
            image.data_url = compress_image(bytes, &stronger(&config))?;
            if let Some(last) = images.last_mut() {
                last.data_url.clone_from(&image.data_url);
            }
            state.store_json(&key, &images).await?;
        }
        Err(e) => return Err(e.into()),
    }

    info!(%job_id, image_id = %image.id, count = images.len(), "job image stored");
    Ok(image)
}

/// Remove one image. The featured image is dropped too if it was that image.
///
/// # Errors
///
/// Returns `NotFound` for an unknown image id, or a storage error.
pub async fn remove_image(state: &AppState, job_id: &str, image_id: &str) -> Result<Vec<JobImage>, ImageError> {
    let mut images = list_images(state, job_id).await?;
    let Some(index) = images.iter().position(|i| i.id == image_id) else {
        return Err(ImageError::NotFound(image_id.to_owned()));
    };
    images.remove(index);
    state.store_json(&keys::job_images(job_id), &images).await?;
    if featured(state, job_id).await?.is_some_and(|f| f.id == image_id) {
        state.remove_key(&keys::job_featured_image(job_id)).await?;
    }
    Ok(images)
}

/// Leave `job_id` with an empty image list and no featured image. Succeeds
/// whether or not anything was stored.
///
/// # Errors
///
/// Returns a storage backend error.
pub async fn clear_images(state: &AppState, job_id: &str) -> Result<(), ImageError> {
    state.store_json(&keys::job_images(job_id), &Vec::<JobImage>::new()).await?;
    state.remove_key(&keys::job_featured_image(job_id)).await?;
    info!(%job_id, "job images cleared");
    Ok(())
}

/// Mark one stored image as the job's featured image.
///
/// # Errors
///
/// Returns `NotFound` for an unknown image id, or a storage error.
pub async fn set_featured(state: &AppState, job_id: &str, image_id: &str) -> Result<JobImage, ImageError> {
    let images = list_images(state, job_id).await?;
    let image = images
        .into_iter()
        .find(|i| i.id == image_id)
        .ok_or_else(|| ImageError::NotFound(image_id.to_owned()))?;
    state.store_json(&keys::job_featured_image(job_id), &image).await?;
    Ok(image)
}

/// # Errors
///
/// Returns a storage backend error. Unreadable data reads as `None`.
pub async fn featured(state: &AppState, job_id: &str) -> Result<Option<JobImage>, ImageError> {
    match state.load_json::<JobImage>(&keys::job_featured_image(job_id)).await {
        Ok(image) => Ok(image),
        Err(StorageError::Corrupt { .. }) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Remove image keys written under an older schema version or that no longer
/// parse. Returns how many keys were removed.
///
/// # Errors
///
/// Returns a storage backend error.
pub async fn purge_outdated(state: &AppState) -> Result<usize, ImageError> {
    let mut candidates = state.storage.keys_with_prefix(keys::JOB_IMAGES_PREFIX).await?;
    candidates.extend(state.storage.keys_with_prefix(keys::JOB_FEATURED_IMAGE_PREFIX).await?);

    let mut removed = 0;
    for key in candidates {
        let Some(raw) = state.storage.get(&key).await? else {
            continue;
        };
        let outdated = if key.starts_with(keys::JOB_IMAGES_PREFIX) {
            is_outdated::<Vec<JobImage>>(&key, &raw)
        } else {
            is_outdated::<JobImage>(&key, &raw)
        };
        if outdated {
            state.remove_key(&key).await?;
            removed += 1;
        }
    }
    info!(removed, "outdated image keys purged");
    Ok(removed)
}

fn is_outdated<T: serde::de::DeserializeOwned>(key: &str, raw: &str) -> bool {
    match storage::decode::<T>(key, raw) {
        Ok(decoded) => decoded.version < SCHEMA_VERSION,
        Err(_) => true,
    }
}

#[cfg(test)]
#[path = "images_test.rs"]
mod tests;
