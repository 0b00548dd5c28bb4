//! Admin service — the admin-side mirror of every user's admin thread.
//!
//! DESIGN
//! ======
//! All admin threads live in one persisted list under `admin_conversations`,
//! one thread per end user, with the user id as the thread id. Threads are
//! created on first contact from whatever profile data the caller has, with
//! fallbacks for anything missing.
//!
//! The same logical message exists here and in the user's own store, linked
//! only by message id. A read flag changed on one side is never propagated
//! to the other.

use tracing::{info, warn};

use crate::frame::ErrorCode;
use crate::model::{Conversation, Message, Participant, Sender, UserProfile};
use crate::services::conversation::PLACEHOLDER_AVATAR;
use crate::state::AppState;
use crate::storage::{StorageError, keys};

pub const UNKNOWN_USER_NAME: &str = "Utilisateur inconnu";
pub const DEFAULT_USER_ROLE: &str = "user";

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    #[error("admin conversation not found for user: {0}")]
    ThreadNotFound(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ErrorCode for AdminError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::ThreadNotFound(_) => "E_ADMIN_THREAD_NOT_FOUND",
            Self::Storage(e) => e.error_code(),
        }
    }

    fn retryable(&self) -> bool {
        match self {
            Self::ThreadNotFound(_) => false,
            Self::Storage(e) => e.retryable(),
        }
    }
}

/// Counterparty for a user's admin thread, with fallbacks for missing fields.
#[must_use]
pub fn participant_from_profile(profile: &UserProfile) -> Participant {
    let non_blank = |v: &Option<String>| v.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(str::to_owned);
    Participant {
        id: profile.id.clone(),
        name: non_blank(&profile.name).unwrap_or_else(|| UNKNOWN_USER_NAME.to_owned()),
        avatar: non_blank(&profile.avatar).unwrap_or_else(|| PLACEHOLDER_AVATAR.to_owned()),
        role: non_blank(&profile.role).unwrap_or_else(|| DEFAULT_USER_ROLE.to_owned()),
        email: non_blank(&profile.email),
    }
}

// =============================================================================
// OPERATIONS
// =============================================================================

/// Every admin thread. A missing store is empty.
///
/// # Errors
///
/// Returns a storage error, including `Corrupt` for unparsable data.
pub async fn list_threads(state: &AppState) -> Result<Vec<Conversation>, AdminError> {
    Ok(state.load_json(keys::ADMIN_CONVERSATIONS).await?.unwrap_or_default())
}

/// Unread messages across every admin thread, from the admin's side.
///
/// # Errors
///
/// Returns a storage error.
pub async fn unread_total(state: &AppState) -> Result<usize, AdminError> {
    let threads = list_threads(state).await?;
    Ok(threads.iter().map(|c| c.unread_count(Sender::Admin)).sum())
}

/// The thread for `profile.id`, created from the profile when absent.
///
/// # Errors
///
/// Returns a storage error.
pub async fn find_or_create_thread(state: &AppState, profile: &UserProfile) -> Result<Conversation, AdminError> {
    mutate(state, |threads| Ok(find_or_create(threads, profile).clone())).await
}

/// Append a user message (unread) and, when given, the admin response (read)
/// to the user's thread, in that order.
///
/// # Errors
///
/// Returns a storage error.
pub async fn append_exchange(
    state: &AppState,
    profile: &UserProfile,
    user_message: &Message,
    admin_response: Option<&Message>,
) -> Result<Conversation, AdminError> {
    let conversation = mutate(state, |threads| {
        let thread = find_or_create(threads, profile);
        thread.push(user_message.mirrored(Sender::User, false));
        if let Some(response) = admin_response {
            thread.push(response.mirrored(Sender::Admin, true));
        }
        Ok(thread.clone())
    })
    .await?;
    info!(user_id = %profile.id, paired = admin_response.is_some(), "admin exchange mirrored");
    Ok(conversation)
}

/// Append an admin-authored message (read) to the user's thread.
///
/// # Errors
///
/// Returns `ThreadNotFound` when the user has no admin thread, or a storage
/// error.
pub async fn append_admin_message(state: &AppState, user_id: &str, message: &Message) -> Result<Conversation, AdminError> {
    mutate(state, |threads| {
        let thread = find_mut(threads, user_id)?;
        thread.push(message.mirrored(Sender::Admin, true));
        Ok(thread.clone())
    })
    .await
}

/// Mark every message not authored by the admin as read.
///
/// # Errors
///
/// Returns `ThreadNotFound` for an unknown user, or a storage error.
pub async fn mark_thread_read(state: &AppState, user_id: &str) -> Result<usize, AdminError> {
    let changed = mutate(state, |threads| {
        let thread = find_mut(threads, user_id)?;
        Ok(thread.mark_read_where(|m| m.sender != Sender::Admin))
    })
    .await?;
    info!(%user_id, changed, "admin thread marked read");
    Ok(changed)
}

// =============================================================================
// HELPERS
// =============================================================================

async fn mutate<R>(
    state: &AppState,
    f: impl FnOnce(&mut Vec<Conversation>) -> Result<R, AdminError>,
) -> Result<R, AdminError> {
    let mut threads = match state.load_json::<Vec<Conversation>>(keys::ADMIN_CONVERSATIONS).await {
        Ok(threads) => threads.unwrap_or_default(),
        Err(StorageError::Corrupt { source, .. }) => {
            // A write replaces a corrupt store instead of failing.
            warn!(error = %source, "corrupt admin conversation store; starting empty");
            Vec::new()
        }
        Err(e) => return Err(e.into()),
    };
    let result = f(&mut threads)?;
    state.store_json(keys::ADMIN_CONVERSATIONS, &threads).await?;
    Ok(result)
}

fn find_or_create<'a>(threads: &'a mut Vec<Conversation>, profile: &UserProfile) -> &'a mut Conversation {
    let index = match threads.iter().position(|c| c.id == profile.id) {
        Some(index) => index,
        None => {
            threads.push(Conversation::new(profile.id.clone(), participant_from_profile(profile)));
            info!(user_id = %profile.id, "admin conversation created");
            threads.len() - 1
        }
    };
    &mut threads[index]
}

fn find_mut<'a>(threads: &'a mut [Conversation], user_id: &str) -> Result<&'a mut Conversation, AdminError> {
    threads
        .iter_mut()
        .find(|c| c.id == user_id)
        .ok_or_else(|| AdminError::ThreadNotFound(user_id.to_owned()))
}

#[cfg(test)]
#[path = "admin_test.rs"]
mod tests;
