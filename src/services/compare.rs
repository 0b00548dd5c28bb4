//! Compare service — the listing comparison set and its panel visibility.
//!
//! DESIGN
//! ======
//! The set lives under `compareListings` together with the panel's
//! visibility flag. `CompareSet` keeps its fields private so the panel is
//! never visible while the set is empty, and a removed id can never still be
//! shown.
//!
//! Older records hold a bare array of listings with no visibility flag; they
//! load with the panel visible when the array is non-empty.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::frame::ErrorCode;
use crate::state::AppState;
use crate::storage::{StorageError, keys};

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum CompareError {
    #[error("compare set is full ({limit} listings)")]
    Full { limit: usize },
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ErrorCode for CompareError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Full { .. } => "E_COMPARE_FULL",
            Self::Storage(e) => e.error_code(),
        }
    }

    fn retryable(&self) -> bool {
        match self {
            Self::Full { .. } => false,
            Self::Storage(e) => e.retryable(),
        }
    }
}

/// Listing summary kept in the set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparedListing {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "StoredCompareSet", rename_all = "camelCase")]
pub struct CompareSet {
    listings: Vec<ComparedListing>,
    is_visible: bool,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StoredCompareSet {
    Current {
        listings: Vec<ComparedListing>,
        #[serde(rename = "isVisible", default)]
        is_visible: bool,
    },
    Legacy(Vec<ComparedListing>),
}

impl From<StoredCompareSet> for CompareSet {
    fn from(stored: StoredCompareSet) -> Self {
        let (listings, is_visible) = match stored {
            StoredCompareSet::Current { listings, is_visible } => (listings, is_visible),
            StoredCompareSet::Legacy(listings) => {
                let visible = !listings.is_empty();
                (listings, visible)
            }
        };
        let mut set = Self { listings, is_visible: false };
        set.set_visible(is_visible);
        set
    }
}

impl CompareSet {
    #[must_use]
    pub fn listings(&self) -> &[ComparedListing] {
        &self.listings
    }

    #[cfg(test)]
    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.is_visible
    }

    #[must_use]
    pub fn contains(&self, listing_id: &str) -> bool {
        self.listings.iter().any(|l| l.id == listing_id)
    }

    /// Add `listing` and show the panel. Adding a listing already present
    /// only shows the panel.
    ///
    /// # Errors
    ///
    /// Returns `Full` when the set already holds `limit` listings.
    pub fn add(&mut self, listing: ComparedListing, limit: usize) -> Result<(), CompareError> {
        if !self.contains(&listing.id) {
            if self.listings.len() >= limit {
                return Err(CompareError::Full { limit });
            }
            self.listings.push(listing);
        }
        self.is_visible = true;
        Ok(())
    }

    /// Remove `listing_id`. The panel hides once the set is empty.
    pub fn remove(&mut self, listing_id: &str) {
        self.listings.retain(|l| l.id != listing_id);
        if self.listings.is_empty() {
            self.is_visible = false;
        }
    }

    pub fn clear(&mut self) {
        self.listings.clear();
        self.is_visible = false;
    }

    /// Request visibility. An empty set stays hidden.
    pub fn set_visible(&mut self, visible: bool) {
        self.is_visible = visible && !self.listings.is_empty();
    }
}

// =============================================================================
// OPERATIONS
// =============================================================================

/// Current compare set. Missing or unreadable data is an empty set.
///
/// # Errors
///
/// Returns a storage backend error.
pub async fn get(state: &AppState) -> Result<CompareSet, CompareError> {
    match state.load_json::<CompareSet>(keys::COMPARE_LISTINGS).await {
        Ok(set) => Ok(set.unwrap_or_default()),
        Err(StorageError::Corrupt { source, .. }) => {
            warn!(error = %source, "corrupt compare set; starting empty");
            Ok(CompareSet::default())
        }
        Err(e) => Err(e.into()),
    }
}

/// # Errors
///
/// Returns `Full` at the configured limit, or a storage error.
pub async fn add(state: &AppState, listing: ComparedListing) -> Result<CompareSet, CompareError> {
    let limit = state.config.compare_limit;
    let listing_id = listing.id.clone();
    let set = mutate(state, |set| set.add(listing, limit)).await?;
    info!(%listing_id, count = set.listings().len(), "listing added to compare set");
    Ok(set)
}

/// # Errors
///
/// Returns a storage error.
pub async fn remove(state: &AppState, listing_id: &str) -> Result<CompareSet, CompareError> {
    mutate(state, |set| {
        set.remove(listing_id);
        Ok(())
    })
    .await
}

/// # Errors
///
/// Returns a storage error.
pub async fn clear(state: &AppState) -> Result<CompareSet, CompareError> {
    mutate(state, |set| {
        set.clear();
        Ok(())
    })
    .await
}

/// # Errors
///
/// Returns a storage error.
pub async fn set_visible(state: &AppState, visible: bool) -> Result<CompareSet, CompareError> {
    mutate(state, |set| {
        set.set_visible(visible);
        Ok(())
    })
    .await
}

async fn mutate(
    state: &AppState,
    f: impl FnOnce(&mut CompareSet) -> Result<(), CompareError>,
) -> Result<CompareSet, CompareError> {
    let mut set = get(state).await?;
    f(&mut set)?;
    state.store_json(keys::COMPARE_LISTINGS, &set).await?;
    Ok(set)
}

#[cfg(test)]
#[path = "compare_test.rs"]
mod tests;
