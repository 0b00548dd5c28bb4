//! Sync bridge — keeps the user store and the admin mirror in step.
//!
//! DESIGN
//! ======
//! A send writes the sender's own store first, then copies the message into
//! the other side's store:
//! - user → admin thread: persist in `conversations_<userId>` (creating the
//!   admin thread if the store lacks one), then append to the user's thread
//!   in `admin_conversations` with the same message id and toast the admin;
//! - admin → user: persist in `admin_conversations`, then append to the admin
//!   thread in `conversations_<userId>`, seeding that store if absent.
//!
//! The admin-authored half of a user's exchange arrives later, from the
//! auto-responder or a real admin send, so a mirrored thread ends with the
//! user's content until a reply exists.
//!
//! ERROR HANDLING
//! ==============
//! A failure of the first write fails the send. A failure of the second
//! write is logged with `error!` and reported in the outcome; the first write
//! is not rolled back, so the two stores can diverge.

use tracing::{error, info};

use crate::model::{Conversation, Message, MessageBody, Sender, UserProfile};
use crate::services::admin::{self, AdminError};
use crate::services::conversation::{self, ADMIN_THREAD_ID, ConversationError, WELCOME_THREAD_ID};
use crate::services::notify::{ADMIN_CHANNEL, Audience};
use crate::services::responder::{self, PendingReply, ReplyTarget};
use crate::state::AppState;

// =============================================================================
// TYPES
// =============================================================================

/// Result of a user-side send.
pub struct SendOutcome {
    pub message: Message,
    /// The user's thread after the append.
    pub conversation: Conversation,
    /// Whether the admin mirror received the message. `None` for threads
    /// without an admin-side copy.
    pub mirrored: Option<bool>,
    pub auto_reply: Option<PendingReply>,
}

/// Result of an admin-side send.
pub struct AdminSendOutcome {
    pub message: Message,
    /// The admin-side thread after the append.
    pub conversation: Conversation,
    /// Whether the user's store received the message.
    pub delivered: bool,
}

// =============================================================================
// SENDS
// =============================================================================

/// Send `body` from the user into `thread_id`, mirror it to the admin store
/// when the thread is the admin thread, and schedule an auto-reply.
///
/// # Errors
///
/// Returns the user-store error when the first write fails.
pub async fn send_user_message(
    state: &AppState,
    profile: &UserProfile,
    thread_id: &str,
    body: MessageBody,
) -> Result<SendOutcome, ConversationError> {
    let user_id = profile.id.as_str();
    let message = Message::new(Sender::User, body).with_read(true);
    if thread_id == ADMIN_THREAD_ID {
        conversation::ensure_thread(state, user_id, conversation::admin_participant()).await?;
    }
    let conversation = conversation::append_message(state, user_id, thread_id, message.clone()).await?;

    let mirrored = if thread_id == ADMIN_THREAD_ID {
        let mirrored = match admin::append_exchange(state, profile, &message, None).await {
            Ok(thread) => {
                let title = format!("Message de {}", thread.counterparty.name);
                state.notifier.toast(&Audience::Admin, &title, &message.content.preview());
                true
            }
            Err(e) => {
                error!(%user_id, message_id = %message.id, error = %e, "admin mirror write failed; stores diverge");
                false
            }
        };
        Some(mirrored)
    } else {
        None
    };

    let view = format!("user:{user_id}");
    state.notifier.broadcast_refresh(ADMIN_CHANNEL, Some(&view));

    let auto_reply = (state.config.auto_reply.enabled && thread_id != WELCOME_THREAD_ID)
        .then(|| responder::schedule_reply(state, ReplyTarget::for_thread(user_id, thread_id)));

    info!(%user_id, thread_id, message_id = %message.id, ?mirrored, "user message sent");
    Ok(SendOutcome { message, conversation, mirrored, auto_reply })
}

/// Send `body` from the admin to `user_id`.
///
/// # Errors
///
/// Returns the admin-store error when the first write fails, including
/// `ThreadNotFound` for a user who never wrote in.
pub async fn send_admin_message(state: &AppState, user_id: &str, body: MessageBody) -> Result<AdminSendOutcome, AdminError> {
    let message = Message::new(Sender::Admin, body).with_read(true);
    let conversation = admin::append_admin_message(state, user_id, &message).await?;

    let delivered = match deliver_to_user(state, user_id, &message).await {
        Ok(()) => true,
        Err(e) => {
            error!(%user_id, message_id = %message.id, error = %e, "user store write failed; stores diverge");
            false
        }
    };

    state.notifier.broadcast_refresh(ADMIN_CHANNEL, Some("admin"));
    info!(%user_id, message_id = %message.id, delivered, "admin message sent");
    Ok(AdminSendOutcome { message, conversation, delivered })
}

/// Append an admin message (unread) to the user's admin thread. The store is
/// seeded when absent and the thread created when missing.
async fn deliver_to_user(state: &AppState, user_id: &str, message: &Message) -> Result<(), ConversationError> {
    conversation::ensure_thread(state, user_id, conversation::admin_participant()).await?;
    conversation::append_message(state, user_id, ADMIN_THREAD_ID, message.mirrored(Sender::Admin, false)).await?;
    Ok(())
}

#[cfg(test)]
#[path = "bridge_test.rs"]
mod tests;
