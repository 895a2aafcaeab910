use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::RwLock;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};
use tracing::warn;
use yatra_core::{ConversationContext, StorageError};

/// Durable per-user conversation state. Implementations fail only with [`StorageError`].
pub trait ContextRepository: Send + Sync {
    async fn load_context(&self, user_id: &str) -> Result<Option<ConversationContext>, StorageError>;
    async fn save_context(&self, context: &ConversationContext) -> Result<(), StorageError>;
    async fn delete_context(&self, user_id: &str) -> Result<bool, StorageError>;
    /// Deletes every context whose last activity is older than `cutoff`.
    async fn purge_inactive(&self, cutoff: DateTime<Utc>) -> Result<u64, StorageError>;
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    contexts: Arc<RwLock<HashMap<String, ConversationContext>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.contexts.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.read().is_empty()
    }
}

impl ContextRepository for MemoryStore {
    async fn load_context(&self, user_id: &str) -> Result<Option<ConversationContext>, StorageError> {
        Ok(self.contexts.read().get(user_id).cloned())
    }

    async fn save_context(&self, context: &ConversationContext) -> Result<(), StorageError> {
        self.contexts
            .write()
            .insert(context.user_id.clone(), context.clone());
        Ok(())
    }

    async fn delete_context(&self, user_id: &str) -> Result<bool, StorageError> {
        Ok(self.contexts.write().remove(user_id).is_some())
    }

    async fn purge_inactive(&self, cutoff: DateTime<Utc>) -> Result<u64, StorageError> {
        let mut removed = 0_u64;
        self.contexts.write().retain(|_, value| {
            let keep = value.last_active_at >= cutoff;
            if !keep {
                removed += 1;
            }
            keep
        });

        Ok(removed)
    }
}

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        // Every connection to an in-memory database sees its own empty database.
        let in_memory = database_url.contains(":memory:") || database_url.contains("mode=memory");
        let options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(8)
        };

        let pool = options
            .connect(database_url)
            .await
            .with_context(|| format!("failed connecting to sqlite at {}", database_url))?;

        let store = Self { pool };
        store
            .ensure_schema()
            .await
            .context("failed creating conversation_contexts table")?;
        Ok(store)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn ensure_schema(&self) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS conversation_contexts (
              user_id TEXT PRIMARY KEY,
              last_active_at TEXT NOT NULL,
              context_json TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_conversation_contexts_last_active
            ON conversation_contexts (last_active_at);
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

// Fixed-width UTC timestamps keep text comparison in SQL chronological.
fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

impl ContextRepository for SqliteStore {
    async fn load_context(&self, user_id: &str) -> Result<Option<ConversationContext>, StorageError> {
        let row = sqlx::query(
            r#"
            SELECT context_json
            FROM conversation_contexts
            WHERE user_id = ?1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StorageError::backend)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let context_json: String = row.get("context_json");
        match serde_json::from_str::<ConversationContext>(&context_json) {
            Ok(context) => Ok(Some(context)),
            Err(err) => {
                warn!(user_id, error = %err, "discarding unreadable conversation context");
                Ok(None)
            }
        }
    }

    async fn save_context(&self, context: &ConversationContext) -> Result<(), StorageError> {
        let context_json = serde_json::to_string(context)?;

        sqlx::query(
            r#"
            INSERT INTO conversation_contexts (user_id, last_active_at, context_json)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(user_id) DO UPDATE SET
              last_active_at=excluded.last_active_at,
              context_json=excluded.context_json
            "#,
        )
        .bind(&context.user_id)
        .bind(timestamp(context.last_active_at))
        .bind(context_json)
        .execute(&self.pool)
        .await
        .map_err(StorageError::backend)?;

        Ok(())
    }

    async fn delete_context(&self, user_id: &str) -> Result<bool, StorageError> {
        let result = sqlx::query("DELETE FROM conversation_contexts WHERE user_id = ?1")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(StorageError::backend)?;

        Ok(result.rows_affected() > 0)
    }

    async fn purge_inactive(&self, cutoff: DateTime<Utc>) -> Result<u64, StorageError> {
        let result = sqlx::query("DELETE FROM conversation_contexts WHERE last_active_at < ?1")
            .bind(timestamp(cutoff))
            .execute(&self.pool)
            .await
            .map_err(StorageError::backend)?;

        Ok(result.rows_affected())
    }
}

#[derive(Clone)]
pub enum Store {
    Memory(MemoryStore),
    Sqlite(SqliteStore),
}

impl Store {
    pub fn memory() -> Self {
        Self::Memory(MemoryStore::new())
    }

    pub async fn sqlite(database_url: &str) -> Result<Self> {
        let sqlite = SqliteStore::connect(database_url).await?;
        Ok(Self::Sqlite(sqlite))
    }

    /// SQLite when a database url is configured, otherwise in-memory.
    pub async fn from_database_url(database_url: Option<&str>) -> Result<Self> {
        match database_url.map(str::trim).filter(|url| !url.is_empty()) {
            Some(url) => Self::sqlite(url).await,
            None => Ok(Self::memory()),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        match self {
            Store::Memory(_) => "memory",
            Store::Sqlite(_) => "sqlite",
        }
    }
}

impl ContextRepository for Store {
    async fn load_context(&self, user_id: &str) -> Result<Option<ConversationContext>, StorageError> {
        match self {
            Store::Memory(store) => store.load_context(user_id).await,
            Store::Sqlite(store) => store.load_context(user_id).await,
        }
    }

    async fn save_context(&self, context: &ConversationContext) -> Result<(), StorageError> {
        match self {
            Store::Memory(store) => store.save_context(context).await,
            Store::Sqlite(store) => store.save_context(context).await,
        }
    }

    async fn delete_context(&self, user_id: &str) -> Result<bool, StorageError> {
        match self {
            Store::Memory(store) => store.delete_context(user_id).await,
            Store::Sqlite(store) => store.delete_context(user_id).await,
        }
    }

    async fn purge_inactive(&self, cutoff: DateTime<Utc>) -> Result<u64, StorageError> {
        match self {
            Store::Memory(store) => store.purge_inactive(cutoff).await,
            Store::Sqlite(store) => store.purge_inactive(cutoff).await,
        }
    }
}
