//! Conversation controller — user turn → store → proxy → store.
//!
//! DESIGN
//! ======
//! The controller owns the in-memory copy of the active conversation and is
//! the only writer to the store for it. A turn runs in a fixed order:
//!
//! 1. append the user message, persist;
//! 2. call the generation proxy once;
//! 3. append either an assistant reply with its image or an error-annotated
//!    reply, persist.
//!
//! ERROR HANDLING
//! ==============
//! Nothing is retried. A failed generation becomes part of the conversation.
//! A failed persist is logged and reported on the [`Turn`], but the in-memory
//! conversation keeps every appended message so the next successful `put`
//! writes it all.

use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::api::{GenerateImageRequest, GenerateImageResponse};
use crate::models::{ChatMessage, Conversation, GeneratedImage};
use crate::store::{Store, StoreError};

const SUCCESS_REPLY: &str = "Here is your edited image.";

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    /// The proxy refused the request (4xx).
    #[error("{message}")]
    Rejected { status: u16, message: String },
    /// The proxy or provider failed (5xx).
    #[error("{message}")]
    Failed { status: u16, message: String },
    /// The proxy could not be reached.
    #[error("proxy request failed: {0}")]
    Transport(String),
    /// The proxy answered 200 with a body we cannot use.
    #[error("proxy response malformed: {0}")]
    Malformed(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
    #[error("conversation not found: {0}")]
    NotFound(Uuid),
}

/// Async seam to the generation proxy. Enables mocking in tests.
#[async_trait::async_trait]
pub trait GenerationClient: Send + Sync {
    /// Ask the proxy for one edited image.
    ///
    /// # Errors
    ///
    /// Returns a [`GenerationError`] describing why no image came back.
    async fn generate(&self, request: &GenerateImageRequest) -> Result<GenerateImageResponse, GenerationError>;
}

/// What the user asked for in one turn.
#[derive(Clone)]
pub struct EditTurn {
    pub prompt: String,
    pub image_url: String,
    pub model: String,
    pub credential: String,
}

/// Everything one turn appended, plus anything that went wrong.
#[derive(Debug)]
pub struct Turn {
    pub conversation_id: Uuid,
    pub user_message: ChatMessage,
    pub reply: ChatMessage,
    pub image: Option<GeneratedImage>,
    pub generation_error: Option<GenerationError>,
    pub storage_errors: Vec<StoreError>,
}

impl Turn {
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.image.is_some()
    }
}

// =============================================================================
// CONTROLLER
// =============================================================================

pub struct ConversationController {
    store: Store,
    generator: Arc<dyn GenerationClient>,
    current: Option<Conversation>,
}

impl ConversationController {
    #[must_use]
    pub fn new(store: Store, generator: Arc<dyn GenerationClient>) -> Self {
        Self { store, generator, current: None }
    }

    #[must_use]
    pub fn current(&self) -> Option<&Conversation> {
        self.current.as_ref()
    }

    /// Begin a fresh conversation. It reaches the store with its first turn.
    pub fn start_new(&mut self) -> &Conversation {
        self.current.insert(Conversation::untitled())
    }

    /// Make a stored conversation the active one.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::NotFound`] if no conversation has this id.
    pub async fn open(&mut self, id: Uuid) -> Result<&Conversation, ControllerError> {
        let conversation = self.store.get(id).await?.ok_or(ControllerError::NotFound(id))?;
        let active: &Conversation = self.current.insert(conversation);
        Ok(active)
    }

    /// # Errors
    ///
    /// Returns a storage error if the store cannot be read.
    pub async fn list(&self) -> Result<Vec<Conversation>, ControllerError> {
        Ok(self.store.list().await?)
    }

    /// Delete a stored conversation, dropping it as the active one if needed.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the delete fails.
    pub async fn delete(&mut self, id: Uuid) -> Result<bool, ControllerError> {
        let removed = self.store.delete(id).await?;
        if self.current.as_ref().is_some_and(|c| c.id == id) {
            self.current = None;
        }
        Ok(removed)
    }

    /// Source for a follow-up edit: the image from the newest reply.
    #[must_use]
    pub fn latest_image_url(&self) -> Option<&str> {
        self.current
            .as_ref()
            .and_then(Conversation::latest_image)
            .map(|img| img.url.as_str())
    }

    /// Run one edit turn against the active conversation, starting one if
    /// none is active.
    pub async fn submit(&mut self, turn: EditTurn) -> Turn {
        let mut storage_errors = Vec::new();
        let conversation = self.current.get_or_insert_with(Conversation::untitled);

        let user_message = ChatMessage::user(turn.prompt.clone(), Some(turn.image_url.clone()));
        conversation.push_message(user_message.clone());
        persist(&self.store, conversation, &mut storage_errors).await;

        let request = GenerateImageRequest {
            fal_key: turn.credential,
            prompt: turn.prompt.clone(),
            image_url: turn.image_url,
            model: turn.model,
        };

        let (reply, image, generation_error) = match self.generator.generate(&request).await {
            Ok(response) => {
                let image = GeneratedImage::new(response.image_url, turn.prompt, Some(response.model));
                conversation.push_image(image.clone());
                info!(conversation_id = %conversation.id, image_id = %image.id, "edit completed");
                (ChatMessage::assistant(SUCCESS_REPLY, Some(image.id)), Some(image), None)
            }
            Err(e) => {
                warn!(conversation_id = %conversation.id, error = %e, "edit failed");
                (ChatMessage::assistant_error(format!("Image generation failed: {e}")), None, Some(e))
            }
        };
        conversation.push_message(reply.clone());
        persist(&self.store, conversation, &mut storage_errors).await;

        Turn { conversation_id: conversation.id, user_message, reply, image, generation_error, storage_errors }
    }

    /// Hand the store back for shutdown.
    #[must_use]
    pub fn into_store(self) -> Store {
        self.store
    }
}

async fn persist(store: &Store, conversation: &Conversation, errors: &mut Vec<StoreError>) {
    if let Err(e) = store.put(conversation).await {
        warn!(conversation_id = %conversation.id, error = %e, "conversation persist failed; keeping in memory");
        errors.push(e);
    }
}

#[cfg(test)]
#[path = "conversation_test.rs"]
mod tests;
