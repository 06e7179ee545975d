//! Local store — client-side conversation database.
//!
//! DESIGN
//! ======
//! One SQLite file (`ImageEditorDB` by default) holds conversations, their
//! chat messages, and generated images. The handle is opened explicitly at
//! client start, cloned into whoever needs it, and closed on teardown.
//! Migrations run on open.
//!
//! `put` writes a whole conversation: header upsert plus full replacement of
//! its child rows, inside one transaction, so a reader never sees half of a
//! turn. Child order is carried by a `position` column. Nothing spans
//! conversations, and nothing retries.
//!
//! ERROR HANDLING
//! ==============
//! Every failure (disk full, corrupt file, undecodable row, invariant
//! violation) comes back as a [`StoreError`]. Callers decide whether to keep
//! going; the store never drops a caller's in-memory value.

use std::path::Path;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use tracing::debug;
use uuid::Uuid;

use crate::models::{ChatMessage, Conversation, GeneratedImage, Role};

pub const DEFAULT_DB_FILE: &str = "ImageEditorDB.sqlite3";
const DEFAULT_MAX_CONNECTIONS: u32 = 4;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("invalid conversation: {0}")]
    Invalid(String),
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

type MessageRow = (Uuid, String, String, Option<String>, Option<Uuid>, bool, i64);
type ImageRow = (Uuid, String, String, Option<String>, i64);

/// Explicitly constructed handle to the local database.
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Open (creating if needed) the database file at `path` and migrate it.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or migrations fail.
    pub async fn open(path: &Path) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal);
        let pool = SqlitePoolOptions::new()
            .max_connections(DEFAULT_MAX_CONNECTIONS)
            .connect_with(options)
            .await?;
        debug!(path = %path.display(), "local store opened");
        Self::migrate(pool).await
    }

    /// Private in-memory database. A single long-lived connection keeps the
    /// data alive for the handle's lifetime.
    #[cfg(test)]
    pub async fn in_memory() -> Result<Self, StoreError> {
        use std::str::FromStr;

        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        Self::migrate(pool).await
    }

    async fn migrate(pool: SqlitePool) -> Result<Self, StoreError> {
        sqlx::migrate!("src/store/migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    /// Flush and close every pooled connection.
    pub async fn close(self) {
        self.pool.close().await;
    }

    // =========================================================================
    // WRITE
    // =========================================================================

    /// Store `conversation`, replacing any previous value with the same id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Invalid`] if the value breaks a data-model
    /// invariant, or a database error if the write fails.
    pub async fn put(&self, conversation: &Conversation) -> Result<(), StoreError> {
        conversation.validate().map_err(StoreError::Invalid)?;

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO conversations (id, title, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (id) DO UPDATE SET
                 title = excluded.title,
                 created_at = excluded.created_at,
                 updated_at = excluded.updated_at",
        )
        .bind(conversation.id)
        .bind(&conversation.title)
        .bind(conversation.created_at)
        .bind(conversation.updated_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM chat_messages WHERE conversation_id = ?1")
            .bind(conversation.id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM generated_images WHERE conversation_id = ?1")
            .bind(conversation.id)
            .execute(&mut *tx)
            .await?;

        for (position, image) in (0_i64..).zip(&conversation.images) {
            sqlx::query(
                "INSERT INTO generated_images (id, conversation_id, position, url, prompt, model, ts)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )
            .bind(image.id)
            .bind(conversation.id)
            .bind(position)
            .bind(&image.url)
            .bind(&image.prompt)
            .bind(image.model.as_deref())
            .bind(image.ts)
            .execute(&mut *tx)
            .await?;
        }

        for (position, message) in (0_i64..).zip(&conversation.messages) {
            sqlx::query(
                "INSERT INTO chat_messages
                     (id, conversation_id, position, role, content, source_image, generated_image_id, is_error, ts)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )
            .bind(message.id)
            .bind(conversation.id)
            .bind(position)
            .bind(message.role.as_str())
            .bind(&message.content)
            .bind(message.source_image.as_deref())
            .bind(message.generated_image_id)
            .bind(message.is_error)
            .bind(message.ts)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!(
            conversation_id = %conversation.id,
            messages = conversation.messages.len(),
            images = conversation.images.len(),
            "conversation stored"
        );
        Ok(())
    }

    /// Remove a conversation and all of its children. Returns whether it existed.
    ///
    /// # Errors
    ///
    /// Returns a database error if the delete fails.
    pub async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM chat_messages WHERE conversation_id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM generated_images WHERE conversation_id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM conversations WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    // =========================================================================
    // READ
    // =========================================================================

    /// Fetch one conversation with its children in order.
    ///
    /// # Errors
    ///
    /// Returns a database error if a query fails, or [`StoreError::Corrupt`]
    /// if a stored row cannot be decoded.
    pub async fn get(&self, id: Uuid) -> Result<Option<Conversation>, StoreError> {
        let Some((id, title, created_at, updated_at)) = sqlx::query_as::<_, (Uuid, String, i64, i64)>(
            "SELECT id, title, created_at, updated_at FROM conversations WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        else {
            return Ok(None);
        };

        let images = sqlx::query_as::<_, ImageRow>(
            "SELECT id, url, prompt, model, ts
             FROM generated_images
             WHERE conversation_id = ?1
             ORDER BY position ASC",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(|(id, url, prompt, model, ts)| GeneratedImage { id, url, prompt, model, ts })
        .collect();

        let messages = sqlx::query_as::<_, MessageRow>(
            "SELECT id, role, content, source_image, generated_image_id, is_error, ts
             FROM chat_messages
             WHERE conversation_id = ?1
             ORDER BY position ASC",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(message_from_row)
        .collect::<Result<Vec<_>, _>>()?;

        Ok(Some(Conversation { id, title, messages, images, created_at, updated_at }))
    }

    /// All conversations, most recently updated first.
    ///
    /// # Errors
    ///
    /// Returns a database error if a query fails, or [`StoreError::Corrupt`]
    /// if a stored row cannot be decoded.
    pub async fn list(&self) -> Result<Vec<Conversation>, StoreError> {
        let ids = sqlx::query_scalar::<_, Uuid>("SELECT id FROM conversations ORDER BY updated_at DESC, created_at DESC")
            .fetch_all(&self.pool)
            .await?;

        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(conversation) = self.get(id).await? {
                out.push(conversation);
            }
        }
        Ok(out)
    }
}

fn message_from_row(row: MessageRow) -> Result<ChatMessage, StoreError> {
    let (id, role, content, source_image, generated_image_id, is_error, ts) = row;
    let role: Role = role.parse().map_err(|e| StoreError::Corrupt(format!("message {id}: {e}")))?;
    Ok(ChatMessage { id, role, content, source_image, generated_image_id, is_error, ts })
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
