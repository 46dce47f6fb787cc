//! PostgreSQL adapter for the storage contracts.

use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use uuid::Uuid;

use super::{Assistant, Document, DocumentStore, StoreError, Thread, ThreadStore};

/// Connection settings, one field per `POSTGRES_*` environment variable.
#[derive(Debug, Clone)]
pub struct PostgresSettings {
    pub database: String,
    pub user: String,
    pub password: String,
    pub host: String,
    pub port: u16,
}

impl PostgresSettings {
    fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .database(&self.database)
            .username(&self.user)
            .password(&self.password)
    }
}

/// Thread, assistant, and document storage backed by a bounded `PgPool`.
///
/// JSONB columns decode straight into `serde_json::Value` through sqlx's
/// json support, so assistant configs round-trip without manual codecs.
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Open a bounded connection pool.
    pub async fn connect(
        settings: &PostgresSettings,
        max_connections: u32,
    ) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect_with(settings.connect_options())
            .await
            .map_err(sql_err)?;
        Ok(Self { pool })
    }

    /// Wrap an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Ensure the storage tables exist (idempotent).
    pub async fn ensure_tables(&self) -> Result<(), StoreError> {
        let sql = r#"
            CREATE TABLE IF NOT EXISTS assistant (
                assistant_id UUID PRIMARY KEY,
                user_id      TEXT NOT NULL,
                name         TEXT NOT NULL,
                config       JSONB NOT NULL,
                public       BOOLEAN NOT NULL DEFAULT false,
                updated_at   TIMESTAMPTZ NOT NULL DEFAULT now()
            );
            CREATE TABLE IF NOT EXISTS thread (
                thread_id    UUID PRIMARY KEY,
                user_id      TEXT NOT NULL,
                assistant_id UUID NOT NULL,
                name         TEXT NOT NULL,
                updated_at   TIMESTAMPTZ NOT NULL DEFAULT now()
            );
            CREATE TABLE IF NOT EXISTS document (
                id        BIGSERIAL PRIMARY KEY,
                namespace TEXT NOT NULL,
                content   TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_document_namespace ON document (namespace);
        "#;
        sqlx::raw_sql(sql).execute(&self.pool).await.map_err(sql_err)?;
        Ok(())
    }

    /// Close the pool. After this the store must not be used.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn sql_err(e: sqlx::Error) -> StoreError {
    StoreError::Database(e.to_string())
}

#[async_trait]
impl ThreadStore for PgStore {
    async fn get_thread(
        &self,
        user_id: &str,
        thread_id: Uuid,
    ) -> Result<Option<Thread>, StoreError> {
        sqlx::query_as::<_, Thread>(
            "SELECT thread_id, user_id, assistant_id, name, updated_at
             FROM thread WHERE user_id = $1 AND thread_id = $2",
        )
        .bind(user_id)
        .bind(thread_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(sql_err)
    }

    async fn put_thread(&self, thread: &Thread) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO thread (thread_id, user_id, assistant_id, name, updated_at)
             VALUES ($1, $2, $3, $4, now())
             ON CONFLICT (thread_id) DO UPDATE
             SET assistant_id = $3, name = $4, updated_at = now()",
        )
        .bind(thread.thread_id)
        .bind(&thread.user_id)
        .bind(thread.assistant_id)
        .bind(&thread.name)
        .execute(&self.pool)
        .await
        .map_err(sql_err)?;
        Ok(())
    }

    async fn get_assistant(
        &self,
        user_id: &str,
        assistant_id: Uuid,
    ) -> Result<Option<Assistant>, StoreError> {
        sqlx::query_as::<_, Assistant>(
            "SELECT assistant_id, user_id, name, config, public, updated_at
             FROM assistant WHERE assistant_id = $1 AND (user_id = $2 OR public)",
        )
        .bind(assistant_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(sql_err)
    }

    async fn put_assistant(&self, assistant: &Assistant) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO assistant (assistant_id, user_id, name, config, public, updated_at)
             VALUES ($1, $2, $3, $4, $5, now())
             ON CONFLICT (assistant_id) DO UPDATE
             SET name = $3, config = $4, public = $5, updated_at = now()",
        )
        .bind(assistant.assistant_id)
        .bind(&assistant.user_id)
        .bind(&assistant.name)
        .bind(&assistant.config)
        .bind(assistant.public)
        .execute(&self.pool)
        .await
        .map_err(sql_err)?;
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for PgStore {
    async fn search(
        &self,
        namespaces: &[String],
        query: &str,
        limit: usize,
    ) -> Result<Vec<Document>, StoreError> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            "SELECT namespace, content FROM document
             WHERE namespace = ANY($1) AND content ILIKE '%' || $2 || '%'
             ORDER BY id LIMIT $3",
        )
        .bind(namespaces)
        .bind(query)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(sql_err)?;
        Ok(rows
            .into_iter()
            .map(|(namespace, content)| Document { namespace, content })
            .collect())
    }
}
