//! Auto-responder — synthetic counterpart replies after a random delay.
//!
//! DESIGN
//! ======
//! Each user send may schedule one reply. The delay and the canned text are
//! drawn up front, then a tokio task sleeps and delivers:
//! - in the admin thread the reply is authored by the admin and goes through
//!   the bridge, so both stores receive it;
//! - in any other thread the reply is authored by `other` and only the
//!   user's store receives it.
//!
//! Delivery emits a toast for the user. The returned `PendingReply` can abort
//! the task before it fires; an uncancelled reply always lands in the
//! persisted store, whether or not any view is still looking at the thread.
//! Routes hand their handles to `PendingReplies` so a later request can
//! cancel every reply still pending in a thread.
//!
//! ERROR HANDLING
//! ==============
//! The task has no caller to report to. Delivery failures are logged with
//! `error!` and the task resolves to `None`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::config::AutoReplyConfig;
use crate::frame::ErrorCode;
use crate::model::{Message, MessageBody, Sender};
use crate::services::admin::AdminError;
use crate::services::bridge;
use crate::services::conversation::{self, ADMIN_THREAD_ID, ConversationError};
use crate::services::notify::Audience;
use crate::state::AppState;

pub const CANNED_REPLIES: &[&str] = &[
    "Merci pour votre message ! Nous vous répondons dans les plus brefs délais.",
    "Bien reçu, un conseiller va examiner votre demande.",
    "Merci ! Pouvez-vous nous donner plus de détails ?",
    "Nous avons bien noté votre demande, à très bientôt.",
];

pub const TOAST_TITLE: &str = "Nouveau message";

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ResponderError {
    #[error(transparent)]
    Conversation(#[from] ConversationError),
    #[error(transparent)]
    Admin(#[from] AdminError),
}

impl ErrorCode for ResponderError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Conversation(e) => e.error_code(),
            Self::Admin(e) => e.error_code(),
        }
    }

    fn retryable(&self) -> bool {
        match self {
            Self::Conversation(e) => e.retryable(),
            Self::Admin(e) => e.retryable(),
        }
    }
}

/// Thread a reply is delivered into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyTarget {
    /// The user's thread with the admin, mirrored in the admin store.
    AdminThread { user_id: String },
    /// Any other thread of the user's store.
    UserThread { user_id: String, thread_id: String },
}

impl ReplyTarget {
    #[must_use]
    pub fn for_thread(user_id: &str, thread_id: &str) -> Self {
        if thread_id == ADMIN_THREAD_ID {
            Self::AdminThread { user_id: user_id.to_owned() }
        } else {
            Self::UserThread { user_id: user_id.to_owned(), thread_id: thread_id.to_owned() }
        }
    }

    #[must_use]
    pub fn user_id(&self) -> &str {
        match self {
            Self::AdminThread { user_id } | Self::UserThread { user_id, .. } => user_id,
        }
    }
}

/// Handle to a scheduled reply.
pub struct PendingReply {
    handle: JoinHandle<Option<Message>>,
    delay: Duration,
}

impl PendingReply {
    /// Abort the reply if it has not been delivered yet.
    pub fn cancel(&self) {
        self.handle.abort();
    }

    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Wait for delivery. `None` when cancelled or when delivery failed.
    #[cfg(test)]
    pub async fn wait(self) -> Option<Message> {
        self.handle.await.ok().flatten()
    }
}

/// Replies scheduled by routes, keyed by user and thread.
#[derive(Clone, Default)]
pub struct PendingReplies {
    inner: Arc<Mutex<HashMap<(String, String), Vec<PendingReply>>>>,
}

impl PendingReplies {
    /// Keep `reply` cancellable. Replies of the thread that already fired
    /// are dropped.
    pub async fn track(&self, user_id: &str, thread_id: &str, reply: PendingReply) {
        let mut inner = self.inner.lock().await;
        let replies = inner.entry((user_id.to_owned(), thread_id.to_owned())).or_default();
        replies.retain(|pending| !pending.handle.is_finished());
        replies.push(reply);
    }

    /// Cancel every reply of the thread that has not fired yet. Returns how
    /// many were aborted.
    pub async fn cancel_thread(&self, user_id: &str, thread_id: &str) -> usize {
        let removed = self.inner.lock().await.remove(&(user_id.to_owned(), thread_id.to_owned()));
        let Some(replies) = removed else {
            return 0;
        };
        let mut cancelled = 0;
        for pending in replies.iter().filter(|pending| !pending.handle.is_finished()) {
            pending.cancel();
            cancelled += 1;
        }
        if cancelled > 0 {
            info!(%user_id, thread_id, cancelled, "auto-replies cancelled");
        }
        cancelled
    }
}

// =============================================================================
// SCHEDULING
// =============================================================================

/// Random delay within the configured window.
#[must_use]
pub fn pick_delay(config: &AutoReplyConfig, rng: &mut impl Rng) -> Duration {
    let min = u64::try_from(config.min_delay.as_millis()).unwrap_or(u64::MAX);
    let max = u64::try_from(config.max_delay.as_millis()).unwrap_or(u64::MAX);
    if min >= max {
        return config.min_delay;
    }
    Duration::from_millis(rng.random_range(min..=max))
}

#[must_use]
pub fn pick_reply(rng: &mut impl Rng) -> &'static str {
    CANNED_REPLIES[rng.random_range(0..CANNED_REPLIES.len())]
}

/// Schedule a reply into `target` after a random delay.
pub fn schedule_reply(state: &AppState, target: ReplyTarget) -> PendingReply {
    let (delay, text) = {
        let mut rng = rand::rng();
        (pick_delay(&state.config.auto_reply, &mut rng), pick_reply(&mut rng))
    };
    info!(user_id = target.user_id(), ?delay, "auto-reply scheduled");

    let state = state.clone();
    let handle = tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        match deliver_reply(&state, &target, text).await {
            Ok(message) => Some(message),
            Err(e) => {
                error!(user_id = target.user_id(), error = %e, "auto-reply delivery failed");
                None
            }
        }
    });
    PendingReply { handle, delay }
}

/// Deliver `text` into `target` right away and toast the user.
///
/// # Errors
///
/// Returns the store error of the write that failed. An admin-thread reply
/// that reached the admin store but not the user's store is still `Ok`; the
/// bridge logs the divergence.
pub async fn deliver_reply(
    state: &AppState,
    target: &ReplyTarget,
    text: &str,
) -> Result<Message, ResponderError> {
    let message = match target {
        ReplyTarget::AdminThread { user_id } => {
            bridge::send_admin_message(state, user_id, MessageBody::text(text)).await?.message
        }
        ReplyTarget::UserThread { user_id, thread_id } => {
            let message = Message::new(Sender::Other, MessageBody::text(text));
            conversation::append_message(state, user_id, thread_id, message.clone()).await?;
            message
        }
    };
    state
        .notifier
        .toast(&Audience::User(target.user_id().to_owned()), TOAST_TITLE, text);
    info!(user_id = target.user_id(), message_id = %message.id, "auto-reply delivered");
    Ok(message)
}

#[cfg(test)]
#[path = "responder_test.rs"]
mod tests;
