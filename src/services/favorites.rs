//! Favorites service — listing ids the visitor starred, under `favorites`.

use tracing::{info, warn};

use crate::state::AppState;
use crate::storage::{StorageError, keys};

/// Starred listing ids in insertion order. Unreadable data reads as empty.
///
/// # Errors
///
/// Returns a storage backend error.
pub async fn list(state: &AppState) -> Result<Vec<String>, StorageError> {
    match state.load_json::<Vec<String>>(keys::FAVORITES).await {
        Ok(ids) => Ok(ids.unwrap_or_default()),
        Err(StorageError::Corrupt { source, .. }) => {
            warn!(error = %source, "corrupt favorites; starting empty");
            Ok(Vec::new())
        }
        Err(e) => Err(e),
    }
}

/// # Errors
///
/// Returns a storage backend error.
pub async fn is_favorite(state: &AppState, listing_id: &str) -> Result<bool, StorageError> {
    Ok(list(state).await?.iter().any(|id| id == listing_id))
}

/// Star or unstar `listing_id`. Returns whether it is starred afterwards.
///
/// # Errors
///
/// Returns a storage backend error.
pub async fn toggle(state: &AppState, listing_id: &str) -> Result<bool, StorageError> {
    let mut ids = list(state).await?;
    let starred = match ids.iter().position(|id| id == listing_id) {
        Some(index) => {
            ids.remove(index);
            false
        }
        None => {
            ids.push(listing_id.to_owned());
            true
        }
    };
    state.store_json(keys::FAVORITES, &ids).await?;
    info!(%listing_id, starred, "favorite toggled");
    Ok(starred)
}

#[cfg(test)]
#[path = "favorites_test.rs"]
mod tests;
