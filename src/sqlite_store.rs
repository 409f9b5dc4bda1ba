//! SQLite-backed [`KeyValueStore`] implementation.
//!
//! Each key is one row of the `kv` table; `set` is an upsert, so the
//! document store and the session list are always rewritten whole.
//!
//! The CLI and a running `teapot serve` may share one database file, so
//! the pool uses WAL journaling and waits on a busy lock instead of
//! failing immediately.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use std::time::Duration;

use teapot_core::store::KeyValueStore;

use crate::config::Config;

/// Pool size. Writes are whole-value rewrites, one at a time.
const MAX_CONNECTIONS: u32 = 2;

/// How long a writer waits for another process to release the file.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite implementation of the [`KeyValueStore`] trait.
pub struct SqliteKeyValueStore {
    pool: SqlitePool,
}

impl SqliteKeyValueStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open `[storage].path`, creating the file, its directory, and the
    /// `kv` table as needed. Safe to call on an existing database.
    pub async fn open(config: &Config) -> Result<Self> {
        let pool = connect(&config.storage.path).await?;
        ensure_schema(&pool).await?;
        tracing::debug!(path = %config.storage.path.display(), "storage opened");
        Ok(Self::new(pool))
    }

    /// Wait for in-flight writes and release the database file.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

async fn connect(path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create storage directory {}", parent.display()))?;
    }

    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT);

    SqlitePoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .connect_with(options)
        .await
        .with_context(|| format!("Failed to open storage at {}", path.display()))
}

/// One row per storage key; values are whole JSON documents.
async fn ensure_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS kv (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

#[async_trait]
impl KeyValueStore for SqliteKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT value FROM kv WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get("value")))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO kv (key, value, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
