//! Conversation service — the per-user conversation store.
//!
//! DESIGN
//! ======
//! Each end user owns one persisted list of threads under
//! `conversations_<userId>`. Every mutation reloads the whole list, applies
//! the change, and writes the whole list back; the last writer wins.
//!
//! A user without a store, or whose store no longer parses, gets the default
//! threads: a system welcome thread and a thread with the admin.
//!
//! ERROR HANDLING
//! ==============
//! Corrupt data is logged at warn level with the parse error before it is
//! replaced by the defaults. Backend errors are propagated untouched.

use serde::Serialize;
use tracing::{info, warn};

use crate::frame::ErrorCode;
use crate::model::{Conversation, Message, MessageBody, Participant, Sender};
use crate::state::AppState;
use crate::storage::{StorageError, keys};

pub const WELCOME_THREAD_ID: &str = "welcome";
pub const ADMIN_THREAD_ID: &str = "admin";
pub const PLACEHOLDER_AVATAR: &str = "/placeholder.svg";

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ConversationError {
    #[error("conversation not found: {0}")]
    ThreadNotFound(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ErrorCode for ConversationError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::ThreadNotFound(_) => "E_THREAD_NOT_FOUND",
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

/// Thread list entry with the unread count from the user's side.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadSummary {
    #[serde(flatten)]
    pub conversation: Conversation,
    pub unread_count: usize,
}

// =============================================================================
// SEED DATA
// =============================================================================

/// Counterparty shown on every user's admin thread.
#[must_use]
pub fn admin_participant() -> Participant {
    Participant {
        id: ADMIN_THREAD_ID.into(),
        name: "Service client Shalom".into(),
        avatar: PLACEHOLDER_AVATAR.into(),
        role: "admin".into(),
        email: None,
    }
}

fn system_participant() -> Participant {
    Participant {
        id: "system".into(),
        name: "Shalom Job Center".into(),
        avatar: PLACEHOLDER_AVATAR.into(),
        role: "system".into(),
        email: None,
    }
}

/// Threads every new user starts with.
#[must_use]
pub fn default_conversations() -> Vec<Conversation> {
    let welcome = Message::new(
        Sender::System,
        MessageBody::text("Bienvenue sur Shalom Job Center ! Retrouvez ici toutes vos conversations."),
    );
    let greeting = Message::new(
        Sender::Admin,
        MessageBody::text("Bonjour ! Comment pouvons-nous vous aider aujourd'hui ?"),
    );
    vec![
        Conversation::with_messages(WELCOME_THREAD_ID, system_participant(), vec![welcome]),
        Conversation::with_messages(ADMIN_THREAD_ID, admin_participant(), vec![greeting]),
    ]
}

// =============================================================================
// OPERATIONS
// =============================================================================

/// Load the user's threads, seeding and persisting defaults when the store is
/// absent or unreadable.
///
/// # Errors
///
/// Returns a storage backend error.
pub async fn load(state: &AppState, user_id: &str) -> Result<Vec<Conversation>, ConversationError> {
    let key = keys::conversations(user_id);
    match state.load_json::<Vec<Conversation>>(&key).await {
        Ok(Some(conversations)) => Ok(conversations),
        Ok(None) => seed(state, user_id, &key).await,
        Err(StorageError::Corrupt { source, .. }) => {
            warn!(%user_id, error = %source, "corrupt conversation store; reseeding defaults");
            seed(state, user_id, &key).await
        }
        Err(e) => Err(e.into()),
    }
}

async fn seed(state: &AppState, user_id: &str, key: &str) -> Result<Vec<Conversation>, ConversationError> {
    let conversations = default_conversations();
    state.store_json(key, &conversations).await?;
    info!(%user_id, "seeded default conversations");
    Ok(conversations)
}

/// Threads with unread counts, as the user's inbox shows them.
///
/// # Errors
///
/// Returns a storage backend error.
pub async fn list_threads(state: &AppState, user_id: &str) -> Result<Vec<ThreadSummary>, ConversationError> {
    let conversations = load(state, user_id).await?;
    Ok(conversations
        .into_iter()
        .map(|conversation| {
            let unread_count = conversation.unread_count(Sender::User);
            ThreadSummary { conversation, unread_count }
        })
        .collect())
}

/// Append `message` to `thread_id` and persist the whole store.
///
/// # Errors
///
/// Returns `ThreadNotFound` for an unknown thread, or a storage error.
pub async fn append_message(
    state: &AppState,
    user_id: &str,
    thread_id: &str,
    message: Message,
) -> Result<Conversation, ConversationError> {
    mutate(state, user_id, |conversations| {
        let conversation = find_mut(conversations, thread_id)?;
        conversation.push(message);
        Ok(conversation.clone())
    })
    .await
}

/// Mark every message not authored by the user as read. Returns how many
/// flags changed.
///
/// # Errors
///
/// Returns `ThreadNotFound` for an unknown thread, or a storage error.
pub async fn mark_thread_read(state: &AppState, user_id: &str, thread_id: &str) -> Result<usize, ConversationError> {
    let changed = mutate(state, user_id, |conversations| {
        let conversation = find_mut(conversations, thread_id)?;
        Ok(conversation.mark_read_where(|m| m.sender != Sender::User))
    })
    .await?;
    info!(%user_id, thread_id, changed, "thread marked read");
    Ok(changed)
}

/// Return the thread with `counterparty`, creating an empty one if needed.
/// The store is only rewritten when a thread is created.
///
/// # Errors
///
/// Returns a storage backend error.
pub async fn ensure_thread(
    state: &AppState,
    user_id: &str,
    counterparty: Participant,
) -> Result<Conversation, ConversationError> {
    let mut conversations = load(state, user_id).await?;
    if let Some(existing) = conversations.iter().find(|c| c.id == counterparty.id) {
        return Ok(existing.clone());
    }
    let conversation = Conversation::new(counterparty.id.clone(), counterparty);
    conversations.push(conversation.clone());
    state.store_json(&keys::conversations(user_id), &conversations).await?;
    info!(%user_id, thread_id = %conversation.id, "conversation created");
    Ok(conversation)
}

// =============================================================================
// HELPERS
// =============================================================================

/// Load, apply `f`, persist. Nothing is written when `f` fails.
async fn mutate<R>(
    state: &AppState,
    user_id: &str,
    f: impl FnOnce(&mut Vec<Conversation>) -> Result<R, ConversationError>,
) -> Result<R, ConversationError> {
    let mut conversations = load(state, user_id).await?;
    let result = f(&mut conversations)?;
    state.store_json(&keys::conversations(user_id), &conversations).await?;
    Ok(result)
}

fn find_mut<'a>(conversations: &'a mut [Conversation], thread_id: &str) -> Result<&'a mut Conversation, ConversationError> {
    conversations
        .iter_mut()
        .find(|c| c.id == thread_id)
        .ok_or_else(|| ConversationError::ThreadNotFound(thread_id.to_owned()))
}

#[cfg(test)]
#[path = "conversation_test.rs"]
mod tests;
