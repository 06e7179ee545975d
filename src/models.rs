//! Conversation data model — conversations, chat messages, generated images.
//!
//! DESIGN
//! ======
//! A `Conversation` owns two ordered child sequences: the chat turns and the
//! images the provider produced. Messages point at images by id; an image is
//! stored once on the conversation and referenced by at most one assistant
//! message. Children are append-only, and every append bumps `updated_at` so
//! it never falls behind the newest child.

use std::collections::HashSet;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

const DEFAULT_TITLE: &str = "New conversation";
const MAX_TITLE_CHARS: usize = 50;

/// Milliseconds since the Unix epoch.
#[must_use]
pub fn now_ms() -> i64 {
    let Ok(dur) = SystemTime::now().duration_since(UNIX_EPOCH) else {
        return 0;
    };
    i64::try_from(dur.as_millis()).unwrap_or(0)
}

// =============================================================================
// ROLE
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            other => Err(format!("unknown role {other:?}")),
        }
    }
}

// =============================================================================
// CHILD RECORDS
// =============================================================================

/// A single chat turn. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub role: Role,
    pub content: String,
    /// Source image the user asked to edit (URL or data URI).
    pub source_image: Option<String>,
    /// Id of a [`GeneratedImage`] on the same conversation.
    pub generated_image_id: Option<Uuid>,
    /// Set on assistant messages that report a failed generation.
    pub is_error: bool,
    pub ts: i64,
}

impl ChatMessage {
    #[must_use]
    pub fn user(content: impl Into<String>, source_image: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role: Role::User,
            content: content.into(),
            source_image,
            generated_image_id: None,
            is_error: false,
            ts: now_ms(),
        }
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>, generated_image_id: Option<Uuid>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role: Role::Assistant,
            content: content.into(),
            source_image: None,
            generated_image_id,
            is_error: false,
            ts: now_ms(),
        }
    }

    #[must_use]
    pub fn assistant_error(content: impl Into<String>) -> Self {
        Self { is_error: true, ..Self::assistant(content, None) }
    }
}

/// An image returned by the provider. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedImage {
    pub id: Uuid,
    pub url: String,
    pub prompt: String,
    pub model: Option<String>,
    pub ts: i64,
}

impl GeneratedImage {
    #[must_use]
    pub fn new(url: impl Into<String>, prompt: impl Into<String>, model: Option<String>) -> Self {
        Self { id: Uuid::new_v4(), url: url.into(), prompt: prompt.into(), model, ts: now_ms() }
    }
}

// =============================================================================
// CONVERSATION
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Uuid,
    pub title: String,
    pub messages: Vec<ChatMessage>,
    pub images: Vec<GeneratedImage>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Conversation {
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        let now = now_ms();
        Self { id: Uuid::new_v4(), title: title.into(), messages: Vec::new(), images: Vec::new(), created_at: now, updated_at: now }
    }

    /// Create an untitled conversation; the first user prompt names it.
    #[must_use]
    pub fn untitled() -> Self {
        Self::new(DEFAULT_TITLE)
    }

    pub fn push_message(&mut self, message: ChatMessage) {
        if self.messages.is_empty() && self.title == DEFAULT_TITLE && message.role == Role::User {
            self.title = derive_title(&message.content);
        }
        self.touch(message.ts);
        self.messages.push(message);
    }

    pub fn push_image(&mut self, image: GeneratedImage) {
        self.touch(image.ts);
        self.images.push(image);
    }

    #[must_use]
    pub fn image(&self, id: Uuid) -> Option<&GeneratedImage> {
        self.images.iter().find(|img| img.id == id)
    }

    /// Image attached to the most recent assistant reply, if any.
    #[must_use]
    pub fn latest_image(&self) -> Option<&GeneratedImage> {
        self.messages
            .iter()
            .rev()
            .find_map(|m| m.generated_image_id)
            .and_then(|id| self.image(id))
    }

    fn touch(&mut self, ts: i64) {
        self.updated_at = self.updated_at.max(ts).max(now_ms());
    }

    /// Check the cross-record invariants.
    ///
    /// # Errors
    ///
    /// Returns a description of the first violated invariant.
    pub fn validate(&self) -> Result<(), String> {
        let mut image_ids = HashSet::new();
        for image in &self.images {
            if !image_ids.insert(image.id) {
                return Err(format!("duplicate generated image {}", image.id));
            }
        }

        let mut message_ids = HashSet::new();
        let mut referenced = HashSet::new();
        for message in &self.messages {
            if !message_ids.insert(message.id) {
                return Err(format!("duplicate message {}", message.id));
            }
            let Some(image_id) = message.generated_image_id else {
                continue;
            };
            if message.role != Role::Assistant {
                return Err(format!("message {} is not an assistant message but references an image", message.id));
            }
            if !image_ids.contains(&image_id) {
                return Err(format!("message {} references unknown image {image_id}", message.id));
            }
            if !referenced.insert(image_id) {
                return Err(format!("image {image_id} is referenced by more than one message"));
            }
        }

        let newest_child = self
            .messages
            .iter()
            .map(|m| m.ts)
            .chain(self.images.iter().map(|i| i.ts))
            .max();
        if let Some(newest) = newest_child {
            if self.updated_at < newest {
                return Err(format!("updated_at {} precedes newest child {newest}", self.updated_at));
            }
        }

        Ok(())
    }
}

/// Title from the first user prompt: trimmed, capped, never empty.
#[must_use]
pub fn derive_title(prompt: &str) -> String {
    let trimmed = prompt.trim();
    if trimmed.is_empty() {
        return DEFAULT_TITLE.to_owned();
    }
    if trimmed.chars().count() <= MAX_TITLE_CHARS {
        return trimmed.to_owned();
    }
    let mut title: String = trimmed.chars().take(MAX_TITLE_CHARS).collect();
    title.truncate(title.trim_end().len());
    title.push('…');
    title
}

#[cfg(test)]
#[path = "models_test.rs"]
mod tests;
