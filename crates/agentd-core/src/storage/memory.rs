//! In-memory adapter, used by tests and local development.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{Assistant, Document, DocumentStore, StoreError, Thread, ThreadStore};

/// Hash-map implementation of both storage contracts.
#[derive(Default)]
pub struct MemoryStore {
    threads: RwLock<HashMap<Uuid, Thread>>,
    assistants: RwLock<HashMap<Uuid, Assistant>>,
    documents: RwLock<Vec<Document>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a document into a namespace.
    pub async fn put_document(&self, namespace: impl Into<String>, content: impl Into<String>) {
        self.documents.write().await.push(Document {
            namespace: namespace.into(),
            content: content.into(),
        });
    }
}

#[async_trait]
impl ThreadStore for MemoryStore {
    async fn get_thread(
        &self,
        user_id: &str,
        thread_id: Uuid,
    ) -> Result<Option<Thread>, StoreError> {
        Ok(self
            .threads
            .read()
            .await
            .get(&thread_id)
            .filter(|t| t.user_id == user_id)
            .cloned())
    }

    async fn put_thread(&self, thread: &Thread) -> Result<(), StoreError> {
        self.threads
            .write()
            .await
            .insert(thread.thread_id, thread.clone());
        Ok(())
    }

    async fn get_assistant(
        &self,
        user_id: &str,
        assistant_id: Uuid,
    ) -> Result<Option<Assistant>, StoreError> {
        Ok(self
            .assistants
            .read()
            .await
            .get(&assistant_id)
            .filter(|a| a.user_id == user_id || a.public)
            .cloned())
    }

    async fn put_assistant(&self, assistant: &Assistant) -> Result<(), StoreError> {
        self.assistants
            .write()
            .await
            .insert(assistant.assistant_id, assistant.clone());
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn search(
        &self,
        namespaces: &[String],
        query: &str,
        limit: usize,
    ) -> Result<Vec<Document>, StoreError> {
        let needle = query.to_lowercase();
        Ok(self
            .documents
            .read()
            .await
            .iter()
            .filter(|d| {
                namespaces.contains(&d.namespace) && d.content.to_lowercase().contains(&needle)
            })
            .take(limit)
            .cloned()
            .collect())
    }
}
