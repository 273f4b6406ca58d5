use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};
use std::str::FromStr;
use std::time::Duration;

use super::{ListKey, ListStore, StorageError};

// ============================================================================
// SqliteListStore
// ============================================================================

/// Embedded-database [`ListStore`].
///
/// Each list is a set of `(key, position, value)` rows; `save` replaces a
/// key's rows inside one transaction, so readers see either the old or the
/// new list.
#[derive(Clone)]
pub struct SqliteListStore {
    pub(crate) pool: SqlitePool,
}

impl SqliteListStore {
    /// Open (or create) the database at `path` and run migrations.
    ///
    /// `":memory:"` opens a private in-memory database.
    pub async fn open(path: &str) -> Result<Self, StorageError> {
        let url = format!("sqlite:{}?mode=rwc", path);

        // busy_timeout=5000: the keyboard extension may hold the write lock briefly.
        let options = SqliteConnectOptions::from_str(&url)?.pragma("busy_timeout", "5000");

        // Every pooled connection to ":memory:" would get its own database.
        let max_connections = if path == ":memory:" { 1 } else { 4 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store
            .migrate()
            .await
            .map_err(|e| StorageError::Migration(e.to_string()))?;
        Ok(store)
    }

    /// Create the schema. Idempotent.
    async fn migrate(&self) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS list_entries (
                key TEXT NOT NULL,
                position INTEGER NOT NULL,
                value TEXT NOT NULL,
                PRIMARY KEY (key, position)
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        tx.commit().await
    }
}

impl ListStore for SqliteListStore {
    async fn load(&self, key: &ListKey) -> Result<Vec<String>, StorageError> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT value FROM list_entries WHERE key = ? ORDER BY position")
                .bind(key.storage_key())
                .fetch_all(&self.pool)
                .await?;

        Ok(rows.into_iter().map(|(value,)| value).collect())
    }

    async fn save(&self, key: &ListKey, items: &[String]) -> Result<(), StorageError> {
        let storage_key = key.storage_key();
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM list_entries WHERE key = ?")
            .bind(&storage_key)
            .execute(&mut *tx)
            .await?;

        for (position, value) in items.iter().enumerate() {
            sqlx::query("INSERT INTO list_entries (key, position, value) VALUES (?, ?, ?)")
                .bind(&storage_key)
                .bind(position as i64)
                .bind(value)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn remove(&self, key: &ListKey) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM list_entries WHERE key = ?")
            .bind(key.storage_key())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
