//! Conversation data model shared by the user and admin stores.
//!
//! DESIGN
//! ======
//! A `Conversation` owns its message list privately. Messages are appended
//! through `push` and read flags change through `mark_read_where`; both
//! refresh the `last_message` summary, so the summary always describes the
//! tail of the list. Deserialization recomputes the summary as well, which
//! repairs records written by older clients that updated it by hand.
//!
//! Message content is a tagged variant. Older records stored image and audio
//! payloads as plain strings carrying an `image-message:` or
//! `audio-message:` prefix; those still decode into the matching variant.

use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::frame::now_ms;

pub const LEGACY_IMAGE_PREFIX: &str = "image-message:";
pub const LEGACY_AUDIO_PREFIX: &str = "audio-message:";

// =============================================================================
// PARTICIPANTS
// =============================================================================

/// Who authored a message, relative to the store holding it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    #[serde(alias = "counterpart")]
    Other,
    System,
    Admin,
}

/// Counterparty descriptor shown at the top of a thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: String,
    pub name: String,
    pub avatar: String,
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Caller-supplied description of an end user. Any field may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

#[cfg(test)]
impl UserProfile {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into(), ..Self::default() }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

// =============================================================================
// MESSAGES
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum MessageBody {
    Text {
        text: String,
    },
    Image {
        #[serde(rename = "dataUrl")]
        data_url: String,
    },
    Audio {
        #[serde(rename = "dataUrl")]
        data_url: String,
    },
}

impl MessageBody {
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Decode a pre-envelope content string.
    #[must_use]
    pub fn from_legacy(raw: &str) -> Self {
        if let Some(data_url) = raw.strip_prefix(LEGACY_IMAGE_PREFIX) {
            Self::Image { data_url: data_url.to_owned() }
        } else if let Some(data_url) = raw.strip_prefix(LEGACY_AUDIO_PREFIX) {
            Self::Audio { data_url: data_url.to_owned() }
        } else {
            Self::Text { text: raw.to_owned() }
        }
    }

    /// Short text used in thread summaries.
    #[must_use]
    pub fn preview(&self) -> String {
        match self {
            Self::Text { text } => text.clone(),
            Self::Image { .. } => "📷 Image".to_owned(),
            Self::Audio { .. } => "🎤 Message vocal".to_owned(),
        }
    }
}

impl<'de> Deserialize<'de> for MessageBody {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(tag = "kind", rename_all = "lowercase")]
        enum Tagged {
            Text {
                text: String,
            },
            Image {
                #[serde(rename = "dataUrl")]
                data_url: String,
            },
            Audio {
                #[serde(rename = "dataUrl")]
                data_url: String,
            },
        }

        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Legacy(String),
            Tagged(Tagged),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Legacy(raw) => Self::from_legacy(&raw),
            Raw::Tagged(Tagged::Text { text }) => Self::Text { text },
            Raw::Tagged(Tagged::Image { data_url }) => Self::Image { data_url },
            Raw::Tagged(Tagged::Audio { data_url }) => Self::Audio { data_url },
        })
    }
}

/// A single message. Only `read` changes after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    #[serde(deserialize_with = "id_from_string_or_number")]
    pub id: String,
    pub content: MessageBody,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub read: bool,
    pub sender: Sender,
}

impl Message {
    /// New unread message with a fresh id and the current time.
    #[must_use]
    pub fn new(sender: Sender, content: MessageBody) -> Self {
        Self { id: Uuid::new_v4().to_string(), content, timestamp: now_ms(), read: false, sender }
    }

    #[must_use]
    pub fn with_read(mut self, read: bool) -> Self {
        self.read = read;
        self
    }

    /// Copy of this message as another store sees it: same id, content and
    /// timestamp, with its own sender tag and read flag.
    #[must_use]
    pub fn mirrored(&self, sender: Sender, read: bool) -> Self {
        Self { id: self.id.clone(), content: self.content.clone(), timestamp: self.timestamp, read, sender }
    }
}

fn id_from_string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Text(id) => id,
        Id::Number(id) => id.to_string(),
    })
}

// =============================================================================
// CONVERSATIONS
// =============================================================================

/// Denormalized copy of a thread's newest message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastMessage {
    pub content: String,
    pub timestamp: i64,
    pub read: bool,
    pub sender: Sender,
}

impl From<&Message> for LastMessage {
    fn from(message: &Message) -> Self {
        Self {
            content: message.content.preview(),
            timestamp: message.timestamp,
            read: message.read,
            sender: message.sender,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "StoredConversation", rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    pub counterparty: Participant,
    messages: Vec<Message>,
    last_message: Option<LastMessage>,
}

/// On-disk shape. The stored summary is ignored and rebuilt.
#[derive(Deserialize)]
struct StoredConversation {
    id: String,
    #[serde(alias = "participant")]
    counterparty: Participant,
    #[serde(default)]
    messages: Vec<Message>,
}

impl From<StoredConversation> for Conversation {
    fn from(stored: StoredConversation) -> Self {
        Self::with_messages(stored.id, stored.counterparty, stored.messages)
    }
}

impl Conversation {
    #[must_use]
    pub fn new(id: impl Into<String>, counterparty: Participant) -> Self {
        Self::with_messages(id, counterparty, Vec::new())
    }

    #[must_use]
    pub fn with_messages(id: impl Into<String>, counterparty: Participant, messages: Vec<Message>) -> Self {
        let mut conversation = Self { id: id.into(), counterparty, messages, last_message: None };
        conversation.refresh_summary();
        conversation
    }

    #[cfg(test)]
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    #[cfg(test)]
    #[must_use]
    pub fn last_message(&self) -> Option<&LastMessage> {
        self.last_message.as_ref()
    }

    /// Append `message` and update the summary.
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
        self.refresh_summary();
    }

    /// Set `read` on every message matching `pred`. Returns how many flags
    /// flipped from unread to read.
    pub fn mark_read_where(&mut self, pred: impl Fn(&Message) -> bool) -> usize {
        let mut changed = 0;
        for message in self.messages.iter_mut().filter(|m| !m.read && pred(m)) {
            message.read = true;
            changed += 1;
        }
        self.refresh_summary();
        changed
    }

    /// Unread messages not authored by `local`.
    #[must_use]
    pub fn unread_count(&self, local: Sender) -> usize {
        self.messages.iter().filter(|m| m.sender != local && !m.read).count()
    }

    #[cfg(test)]
    #[must_use]
    pub fn contains_message(&self, message_id: &str) -> bool {
        self.messages.iter().any(|m| m.id == message_id)
    }

    fn refresh_summary(&mut self) {
        self.last_message = self.messages.last().map(LastMessage::from);
    }
}

#[cfg(test)]
#[path = "model_test.rs"]
mod tests;
