//! Site service — contact form submissions and admin status banners.
//!
//! DESIGN
//! ======
//! Contact submissions accumulate under `contactFormSubmissions` until an
//! admin reads them. Status banners live under `admin-status-messages`; any
//! number may exist, and the public site shows the active ones.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::frame::{ErrorCode, now_ms};
use crate::state::AppState;
use crate::storage::{StorageError, keys};

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum SiteError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("invalid email address: {0}")]
    InvalidEmail(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ErrorCode for SiteError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::MissingField(_) => "E_MISSING_FIELD",
            Self::InvalidEmail(_) => "E_INVALID_EMAIL",
            Self::NotFound(_) => "E_NOT_FOUND",
            Self::Storage(e) => e.error_code(),
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Storage(e) if e.retryable())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewContactSubmission {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactSubmission {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    pub message: String,
    pub created_at: i64,
    #[serde(default)]
    pub read: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusKind {
    #[default]
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusMessage {
    pub id: String,
    pub message: String,
    #[serde(default, rename = "type")]
    pub kind: StatusKind,
    pub active: bool,
    pub created_at: i64,
}

// =============================================================================
// CONTACT
// =============================================================================

/// # Errors
///
/// Returns a storage backend error. Unreadable data reads as empty.
pub async fn list_contacts(state: &AppState) -> Result<Vec<ContactSubmission>, SiteError> {
    load_list(state, keys::CONTACT_SUBMISSIONS).await
}

/// Validate and store a contact form submission.
///
/// # Errors
///
/// Returns `MissingField` / `InvalidEmail` for bad input, or a storage error.
pub async fn submit_contact(state: &AppState, new: NewContactSubmission) -> Result<ContactSubmission, SiteError> {
    let name = required("name", &new.name)?;
    let email = required("email", &new.email)?;
    let message = required("message", &new.message)?;
    if !is_plausible_email(&email) {
        return Err(SiteError::InvalidEmail(email));
    }

    let submission = ContactSubmission {
        id: Uuid::new_v4().to_string(),
        name,
        email,
        phone: new.phone.filter(|p| !p.trim().is_empty()),
        subject: new.subject.filter(|s| !s.trim().is_empty()),
        message,
        created_at: now_ms(),
        read: false,
    };
    let mut submissions = list_contacts(state).await?;
    submissions.push(submission.clone());
    state.store_json(keys::CONTACT_SUBMISSIONS, &submissions).await?;
    info!(submission_id = %submission.id, "contact submission stored");
    Ok(submission)
}

/// # Errors
///
/// Returns `NotFound` for an unknown id, or a storage error.
pub async fn mark_contact_read(state: &AppState, id: &str) -> Result<ContactSubmission, SiteError> {
    let mut submissions = list_contacts(state).await?;
    let submission = submissions
        .iter_mut()
        .find(|s| s.id == id)
        .ok_or_else(|| SiteError::NotFound(id.to_owned()))?;
    submission.read = true;
    let updated = submission.clone();
    state.store_json(keys::CONTACT_SUBMISSIONS, &submissions).await?;
    Ok(updated)
}

// =============================================================================
// STATUS BANNERS
// =============================================================================

/// # Errors
///
/// Returns a storage backend error. Unreadable data reads as empty.
pub async fn list_status(state: &AppState) -> Result<Vec<StatusMessage>, SiteError> {
    load_list(state, keys::STATUS_MESSAGES).await
}

/// Banners the public site should show.
///
/// # Errors
///
/// Returns a storage backend error.
pub async fn active_status(state: &AppState) -> Result<Vec<StatusMessage>, SiteError> {
    Ok(list_status(state).await?.into_iter().filter(|m| m.active).collect())
}

/// Create an active banner.
///
/// # Errors
///
/// Returns `MissingField` for a blank message, or a storage error.
pub async fn create_status(state: &AppState, message: &str, kind: StatusKind) -> Result<StatusMessage, SiteError> {
    let status = StatusMessage {
        id: Uuid::new_v4().to_string(),
        message: required("message", message)?,
        kind,
        active: true,
        created_at: now_ms(),
    };
    let mut messages = list_status(state).await?;
    messages.push(status.clone());
    state.store_json(keys::STATUS_MESSAGES, &messages).await?;
    info!(status_id = %status.id, "status message created");
    Ok(status)
}

/// # Errors
///
/// Returns `NotFound` for an unknown id, or a storage error.
pub async fn set_status_active(state: &AppState, id: &str, active: bool) -> Result<StatusMessage, SiteError> {
    let mut messages = list_status(state).await?;
    let status = messages
        .iter_mut()
        .find(|m| m.id == id)
        .ok_or_else(|| SiteError::NotFound(id.to_owned()))?;
    status.active = active;
    let updated = status.clone();
    state.store_json(keys::STATUS_MESSAGES, &messages).await?;
    info!(status_id = %id, active, "status message toggled");
    Ok(updated)
}

/// # Errors
///
/// Returns `NotFound` for an unknown id, or a storage error.
pub async fn delete_status(state: &AppState, id: &str) -> Result<(), SiteError> {
    let mut messages = list_status(state).await?;
    let before = messages.len();
    messages.retain(|m| m.id != id);
    if messages.len() == before {
        return Err(SiteError::NotFound(id.to_owned()));
    }
    state.store_json(keys::STATUS_MESSAGES, &messages).await?;
    Ok(())
}

// =============================================================================
// HELPERS
// =============================================================================

async fn load_list<T: serde::de::DeserializeOwned>(state: &AppState, key: &str) -> Result<Vec<T>, SiteError> {
    match state.load_json::<Vec<T>>(key).await {
        Ok(items) => Ok(items.unwrap_or_default()),
        Err(StorageError::Corrupt { source, .. }) => {
            warn!(%key, error = %source, "corrupt site data; starting empty");
            Ok(Vec::new())
        }
        Err(e) => Err(e.into()),
    }
}

fn required(field: &'static str, value: &str) -> Result<String, SiteError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(SiteError::MissingField(field));
    }
    Ok(trimmed.to_owned())
}

fn is_plausible_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
}

#[cfg(test)]
#[path = "site_test.rs"]
mod tests;
