//! Dashboard service — the admin dashboard's cached conversation list.
//!
//! DESIGN
//! ======
//! `DashboardView` is the in-memory copy the admin dashboard renders. A
//! background task reloads it from the admin store on a fixed interval,
//! unconditionally, and reconciles the selected thread: a selection whose
//! thread disappeared is cleared. When the reloaded list differs from the
//! cached one the task broadcasts `conversations:refresh` so open dashboards
//! fetch a new snapshot.
//!
//! Views therefore converge within one poll interval of any write, whichever
//! path the write took.
//!
//! ERROR HANDLING
//! ==============
//! A failed reload (corrupt store, backend down) is logged and leaves the
//! cached list as it was; the next tick tries again.

use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::model::{Conversation, Sender};
use crate::services::admin::{self, AdminError};
use crate::services::notify::ADMIN_CHANNEL;
use crate::state::AppState;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DashboardView {
    pub conversations: Vec<Conversation>,
    /// Id of the selected thread (the end user's id).
    pub selected: Option<String>,
}

impl DashboardView {
    /// Replace the cached list. Returns whether anything changed, selection
    /// included.
    pub fn apply(&mut self, conversations: Vec<Conversation>) -> bool {
        let list_changed = self.conversations != conversations;
        self.conversations = conversations;
        let selection_cleared = self.reconcile_selection();
        list_changed || selection_cleared
    }

    #[must_use]
    pub fn selected_conversation(&self) -> Option<&Conversation> {
        let selected = self.selected.as_deref()?;
        self.conversations.iter().find(|c| c.id == selected)
    }

    fn reconcile_selection(&mut self) -> bool {
        if self.selected.is_some() && self.selected_conversation().is_none() {
            self.selected = None;
            return true;
        }
        false
    }
}

/// What a dashboard view renders.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSnapshot {
    pub conversations: Vec<Conversation>,
    pub selected: Option<Conversation>,
    pub unread_total: usize,
}

// =============================================================================
// OPERATIONS
// =============================================================================

/// Reload the admin store into the cached view. Returns whether it changed.
///
/// # Errors
///
/// Returns the admin-store error; the cached view is left untouched.
pub async fn refresh(state: &AppState) -> Result<bool, AdminError> {
    let conversations = admin::list_threads(state).await?;
    let changed = state.dashboard.write().await.apply(conversations);
    Ok(changed)
}

/// Mark the user's thread read in the admin store and select it.
///
/// # Errors
///
/// Returns `ThreadNotFound` for an unknown user, or a storage error.
pub async fn select_thread(state: &AppState, user_id: &str) -> Result<Conversation, AdminError> {
    admin::mark_thread_read(state, user_id).await?;
    let conversations = admin::list_threads(state).await?;
    let mut view = state.dashboard.write().await;
    view.selected = Some(user_id.to_owned());
    view.apply(conversations);
    view.selected_conversation()
        .cloned()
        .ok_or_else(|| AdminError::ThreadNotFound(user_id.to_owned()))
}

pub async fn clear_selection(state: &AppState) {
    state.dashboard.write().await.selected = None;
}

pub async fn snapshot(state: &AppState) -> DashboardSnapshot {
    let view = state.dashboard.read().await;
    DashboardSnapshot {
        conversations: view.conversations.clone(),
        selected: view.selected_conversation().cloned(),
        unread_total: view.conversations.iter().map(|c| c.unread_count(Sender::Admin)).sum(),
    }
}

// =============================================================================
// POLL TASK
// =============================================================================

/// Spawn the dashboard poll task. Returns a handle for shutdown.
pub fn spawn_dashboard_poll_task(state: AppState) -> JoinHandle<()> {
    let interval = state.config.admin_poll_interval;
    info!(?interval, "admin dashboard poll configured");
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            poll_once(&state).await;
        }
    })
}

/// One poll tick: reload, reconcile, announce changes.
pub async fn poll_once(state: &AppState) {
    match refresh(state).await {
        Ok(true) => {
            debug!("dashboard conversations changed");
            state.notifier.broadcast_refresh(ADMIN_CHANNEL, None);
        }
        Ok(false) => {}
        Err(e) => warn!(error = %e, "dashboard reload failed; keeping cached conversations"),
    }
}

#[cfg(test)]
#[path = "dashboard_test.rs"]
mod tests;
