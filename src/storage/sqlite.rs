use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::{
    config::StorageSettings,
    models::Result,
    storage::store::{KeyValueStore, StoreChange, WriterId, CHANGE_CHANNEL_CAPACITY},
};

/// Durable store backed by a single SQLite table.
///
/// Change notifications only reach subscribers of this instance; other
/// processes opening the same file see the data but not the events.
pub struct SqliteStore {
    pool: SqlitePool,
    url: String,
    changes: broadcast::Sender<StoreChange>,
}

impl SqliteStore {
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);

        // Every connection to `:memory:` is its own database
        let max_connections = if url.contains(":memory:") {
            1
        } else {
            max_connections.max(1)
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS kv_store (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            )",
        )
        .execute(&pool)
        .await?;

        info!("Opened SQLite store at {}", url);

        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Ok(Self {
            pool,
            url: url.to_string(),
            changes,
        })
    }

    pub async fn from_settings(settings: &StorageSettings) -> Result<Self> {
        Self::connect(&settings.sqlite_url, settings.max_connections).await
    }

    /// Milliseconds since the epoch of the last write to `key`.
    pub async fn updated_at(&self, key: &str) -> Result<Option<i64>> {
        let updated = sqlx::query_scalar::<_, i64>("SELECT updated_at FROM kv_store WHERE key = ?1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(updated)
    }

    fn publish(&self, key: &str, new_value: Option<String>, origin: WriterId) {
        let _ = self.changes.send(StoreChange {
            key: key.to_string(),
            new_value,
            origin,
        });
    }
}

#[async_trait]
impl KeyValueStore for SqliteStore {
    fn name(&self) -> String {
        format!("sqlite:{}", self.url)
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let value = sqlx::query_scalar::<_, String>("SELECT value FROM kv_store WHERE key = ?1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: String, origin: WriterId) -> Result<()> {
        sqlx::query(
            "INSERT INTO kv_store (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(&value)
        .bind(chrono::Utc::now().timestamp_millis())
        .execute(&self.pool)
        .await?;

        debug!("Stored {} ({} bytes)", key, value.len());
        self.publish(key, Some(value), origin);
        Ok(())
    }

    async fn remove(&self, key: &str, origin: WriterId) -> Result<()> {
        let result = sqlx::query("DELETE FROM kv_store WHERE key = ?1")
            .bind(key)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() > 0 {
            self.publish(key, None, origin);
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }
}
