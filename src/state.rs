//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor and
//! handed to background tasks by clone. It holds the storage area, the
//! notification bus, parsed configuration, the admin dashboard's cached
//! view of the admin conversation store, and the auto-replies still pending.
//!
//! Every persisted write goes through `store_json` / `remove_key`, which emit
//! `storage:changed` after the write lands. Services never touch the storage
//! area and the notifier separately for a write.

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::RwLock;

use crate::config::AppConfig;
use crate::services::dashboard::DashboardView;
use crate::services::notify::Notifier;
use crate::services::responder::PendingReplies;
use crate::storage::{self, StorageArea, StorageError};

// =============================================================================
// APP STATE
// =============================================================================

/// Clone is required by Axum; all inner fields are Arc-wrapped or Clone.
#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn StorageArea>,
    pub notifier: Notifier,
    pub config: Arc<AppConfig>,
    pub dashboard: Arc<RwLock<DashboardView>>,
    pub pending_replies: PendingReplies,
}

impl AppState {
    #[must_use]
    pub fn new(storage: Arc<dyn StorageArea>, config: AppConfig) -> Self {
        Self {
            storage,
            notifier: Notifier::new(config.notify_channel_capacity),
            config: Arc::new(config),
            dashboard: Arc::new(RwLock::new(DashboardView::default())),
            pending_replies: PendingReplies::default(),
        }
    }

    /// Decode the value under `key`.
    ///
    /// # Errors
    ///
    /// Returns the storage error, including `Corrupt` for unparsable data.
    pub async fn load_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
        storage::read_json(self.storage.as_ref(), key).await
    }

    /// Persist `value` under `key` and notify every view.
    ///
    /// # Errors
    ///
    /// Returns the storage error; no notification is sent in that case.
    pub async fn store_json<T: Serialize + Sync>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        storage::write_json(self.storage.as_ref(), key, value).await?;
        self.notifier.storage_changed(key, None);
        Ok(())
    }

    /// Delete `key` and notify every view.
    ///
    /// # Errors
    ///
    /// Returns the storage error; no notification is sent in that case.
    pub async fn remove_key(&self, key: &str) -> Result<(), StorageError> {
        self.storage.remove(key).await?;
        self.notifier.storage_changed(key, None);
        Ok(())
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================

#[cfg(test)]
pub mod test_helpers {
    use std::time::Duration;

    use super::*;
    use crate::storage::MemoryStorage;

    /// Auto-reply window short enough for tests to await.
    pub const TEST_REPLY_DELAY: Duration = Duration::from_millis(10);

    /// Default config with a fast auto-reply window and a short poll.
    #[must_use]
    pub fn test_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.auto_reply.min_delay = TEST_REPLY_DELAY;
        config.auto_reply.max_delay = TEST_REPLY_DELAY;
        config.admin_poll_interval = Duration::from_millis(20);
        config
    }

    /// `AppState` on an unlimited in-memory storage area.
    #[must_use]
    pub fn test_app_state() -> AppState {
        AppState::new(Arc::new(MemoryStorage::new()), test_config())
    }

    /// `AppState` with auto-replies switched off.
    #[must_use]
    pub fn test_app_state_quiet() -> AppState {
        let mut config = test_config();
        config.auto_reply.enabled = false;
        AppState::new(Arc::new(MemoryStorage::new()), config)
    }

    /// `AppState` whose auto-replies wait `delay` before landing.
    #[must_use]
    pub fn test_app_state_with_reply_delay(delay: Duration) -> AppState {
        let mut config = test_config();
        config.auto_reply.min_delay = delay;
        config.auto_reply.max_delay = delay;
        AppState::new(Arc::new(MemoryStorage::new()), config)
    }

    /// `AppState` on an in-memory storage area with a byte quota.
    #[must_use]
    pub fn test_app_state_with_quota(quota_bytes: usize) -> AppState {
        AppState::new(Arc::new(MemoryStorage::with_quota(quota_bytes)), test_config())
    }

    /// Storage area whose writes to one key always fail with a quota error.
    pub struct FailingStorage {
        inner: MemoryStorage,
        fail_key: String,
    }

    #[async_trait::async_trait]
    impl StorageArea for FailingStorage {
        async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: String) -> Result<(), StorageError> {
            if key == self.fail_key {
                return Err(StorageError::QuotaExceeded { key: key.to_owned(), needed: value.len(), quota: 0 });
            }
            self.inner.set(key, value).await
        }

        async fn remove(&self, key: &str) -> Result<(), StorageError> {
            self.inner.remove(key).await
        }

        async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
            self.inner.keys_with_prefix(prefix).await
        }
    }

    /// `AppState` (auto-replies off) whose writes to `fail_key` fail.
    #[must_use]
    pub fn test_app_state_failing_writes(fail_key: &str) -> AppState {
        let mut config = test_config();
        config.auto_reply.enabled = false;
        let storage = FailingStorage { inner: MemoryStorage::new(), fail_key: fail_key.to_owned() };
        AppState::new(Arc::new(storage), config)
    }

    /// Write a raw string under `key`, bypassing the envelope.
    pub async fn seed_raw(state: &AppState, key: &str, raw: &str) {
        state.storage.set(key, raw.to_owned()).await.expect("seed write should succeed");
    }
}

#[cfg(test)]
#[path = "state_test.rs"]
mod tests;
