//! Notification service — fan-out of change frames to every open view.
//!
//! DESIGN
//! ======
//! One `tokio::sync::broadcast` channel carries every notification. Each
//! websocket view subscribes on connect and forwards what it receives. The
//! writer's own view is subscribed too, so it sees its own writes the same
//! way every other view does.
//!
//! Three frame kinds travel on the bus:
//! - `storage:changed` after each persisted write, carrying the key.
//! - `conversations:refresh` on the named `admin-messaging-channel`, carrying
//!   `{type: "refresh-conversations"}`.
//! - `toast:show` for user-visible notices (auto-replies, upload warnings).
//!
//! A send with no subscribers is not an error: nobody is looking, and the
//! next view to connect reloads from storage anyway.

use tokio::sync::broadcast;
use tracing::debug;

use crate::frame::{Data, FRAME_KEY, Frame};

pub const SYSCALL_STORAGE_CHANGED: &str = "storage:changed";
pub const SYSCALL_REFRESH: &str = "conversations:refresh";
pub const SYSCALL_TOAST: &str = "toast:show";

/// Named channel admin views listen on.
pub const ADMIN_CHANNEL: &str = "admin-messaging-channel";
pub const REFRESH_PAYLOAD_TYPE: &str = "refresh-conversations";

/// Who a toast is meant for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Audience {
    Admin,
    User(String),
}

impl Audience {
    /// Wire form: `admin` or `user:<id>`. Matches websocket view names.
    #[must_use]
    pub fn as_view(&self) -> String {
        match self {
            Self::Admin => "admin".to_owned(),
            Self::User(user_id) => format!("user:{user_id}"),
        }
    }
}

#[derive(Clone)]
pub struct Notifier {
    tx: broadcast::Sender<Frame>,
}

impl Notifier {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Frame> {
        self.tx.subscribe()
    }

    /// Publish a frame. Returns how many views received it.
    pub fn publish(&self, frame: Frame) -> usize {
        let syscall = frame.syscall.clone();
        match self.tx.send(frame) {
            Ok(receivers) => receivers,
            Err(_) => {
                debug!(%syscall, "notification dropped: no subscribers");
                0
            }
        }
    }

    /// A key in the storage area was rewritten.
    pub fn storage_changed(&self, key: &str, origin: Option<&str>) -> usize {
        let frame = Frame::request(SYSCALL_STORAGE_CHANGED, Data::new()).with_data(FRAME_KEY, key);
        self.publish(with_origin(frame, origin))
    }

    /// Ask every view on `channel` to reload its conversations.
    pub fn broadcast_refresh(&self, channel: &str, origin: Option<&str>) -> usize {
        let frame = Frame::request(SYSCALL_REFRESH, Data::new())
            .with_channel(channel)
            .with_data("type", REFRESH_PAYLOAD_TYPE);
        self.publish(with_origin(frame, origin))
    }

    pub fn toast(&self, audience: &Audience, title: &str, description: &str) -> usize {
        let frame = Frame::request(SYSCALL_TOAST, Data::new())
            .with_data("audience", audience.as_view())
            .with_data("title", title)
            .with_data("description", description);
        self.publish(frame)
    }
}

fn with_origin(frame: Frame, origin: Option<&str>) -> Frame {
    match origin {
        Some(origin) => frame.with_from(origin),
        None => frame,
    }
}

#[cfg(test)]
#[path = "notify_test.rs"]
mod tests;
