//! Activity service — bounded free-form logs (security, admin access,
//! suspicious activity).
//!
//! Entries are arbitrary JSON objects; older entries written by other
//! clients are kept as they are. Each log keeps only the newest
//! `ACTIVITY_LOG_LIMIT` entries.

use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::frame::now_ms;
use crate::state::AppState;
use crate::storage::{StorageError, keys};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityLog {
    Security,
    AdminAccess,
    Suspicious,
}

impl ActivityLog {
    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            Self::Security => keys::SECURITY_LOGS,
            Self::AdminAccess => keys::ADMIN_ACCESS_LOGS,
            Self::Suspicious => keys::SUSPICIOUS_ACTIVITIES,
        }
    }
}

/// Entries oldest first. Unreadable data reads as empty.
///
/// # Errors
///
/// Returns a storage backend error.
pub async fn list(state: &AppState, log: ActivityLog) -> Result<Vec<serde_json::Value>, StorageError> {
    match state.load_json::<Vec<serde_json::Value>>(log.key()).await {
        Ok(entries) => Ok(entries.unwrap_or_default()),
        Err(StorageError::Corrupt { source, .. }) => {
            warn!(key = log.key(), error = %source, "corrupt activity log; starting empty");
            Ok(Vec::new())
        }
        Err(e) => Err(e),
    }
}

/// Append an entry, dropping the oldest beyond the configured limit.
///
/// # Errors
///
/// Returns a storage backend error.
pub async fn record(
    state: &AppState,
    log: ActivityLog,
    event: &str,
    details: serde_json::Value,
) -> Result<serde_json::Value, StorageError> {
    let entry = json!({
        "id": Uuid::new_v4().to_string(),
        "event": event,
        "timestamp": now_ms(),
        "details": details,
    });
    let mut entries = list(state, log).await?;
    entries.push(entry.clone());
    let limit = state.config.activity_log_limit;
    if entries.len() > limit {
        entries.drain(..entries.len() - limit);
    }
    state.store_json(log.key(), &entries).await?;
    debug!(key = log.key(), event, "activity recorded");
    Ok(entry)
}

/// # Errors
///
/// Returns a storage backend error.
pub async fn clear(state: &AppState, log: ActivityLog) -> Result<(), StorageError> {
    state.remove_key(log.key()).await
}

#[cfg(test)]
#[path = "activity_test.rs"]
mod tests;
