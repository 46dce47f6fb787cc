//! Thread/assistant storage contract and adapters.

mod memory;
mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

pub use memory::MemoryStore;
pub use postgres::{PgStore, PostgresSettings};

/// A conversation session tying a user to an assistant.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Thread {
    pub thread_id: Uuid,
    pub user_id: String,
    pub assistant_id: Uuid,
    pub name: String,
    pub updated_at: DateTime<Utc>,
}

/// A named, stored configuration a thread is bound to.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Assistant {
    pub assistant_id: Uuid,
    pub user_id: String,
    pub name: String,
    /// Stored configuration blob, merged into every run.
    pub config: Value,
    pub public: bool,
    pub updated_at: DateTime<Utc>,
}

/// A document available to the retrieval tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub namespace: String,
    pub content: String,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Read/write access to threads and assistants.
#[async_trait]
pub trait ThreadStore: Send + Sync {
    /// Load a thread owned by `user_id`,  or `None` when absent.
    async fn get_thread(&self, user_id: &str, thread_id: Uuid)
        -> Result<Option<Thread>, StoreError>;

    /// Insert or replace a thread.
    async fn put_thread(&self, thread: &Thread) -> Result<(), StoreError>;

    /// Load an assistant visible to `user_id` (owned or public).
    async fn get_assistant(
        &self,
        user_id: &str,
        assistant_id: Uuid,
    ) -> Result<Option<Assistant>, StoreError>;

    /// Insert or replace an assistant.
    async fn put_assistant(&self, assistant: &Assistant) -> Result<(), StoreError>;
}

/// Keyword lookup over uploaded documents, namespaced by assistant/thread.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn search(
        &self,
        namespaces: &[String],
        query: &str,
        limit: usize,
    ) -> Result<Vec<Document>, StoreError>;
}
