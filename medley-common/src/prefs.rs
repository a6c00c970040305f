//! Durable per-view preference storage
//!
//! Key-value string store used for list page-size memory and other UI
//! preferences. Keys are namespaced by a caller-supplied view token so
//! unrelated views never collide, e.g. `"entries.list.pageSize"`.

use crate::Result;
use async_trait::async_trait;
use sqlx::{Pool, Sqlite};
use std::collections::HashMap;
use std::sync::Mutex;

/// Build a namespaced per-view preference key
pub fn view_key(token: &str, leaf: &str) -> String {
    format!("{}.list.{}", token, leaf)
}

/// Durable key-value string store
#[async_trait]
pub trait PreferenceStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> Result<()>;

    async fn remove(&self, key: &str) -> Result<()>;
}

/// SQLite-backed preference store over a `settings(key, value)` table
pub struct SqlitePreferenceStore {
    db: Pool<Sqlite>,
}

impl SqlitePreferenceStore {
    /// Wrap an existing pool, creating the settings table if needed
    pub async fn new(db: Pool<Sqlite>) -> Result<Self> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
        )
        .execute(&db)
        .await?;

        Ok(Self { db })
    }
}

#[async_trait]
impl PreferenceStore for SqlitePreferenceStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let value: Option<String> =
            sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
                .bind(key)
                .fetch_optional(&self.db)
                .await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO settings (key, value) VALUES (?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )
        .bind(key)
        .bind(value)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM settings WHERE key = ?")
            .bind(key)
            .execute(&self.db)
            .await?;
        Ok(())
    }
}

/// In-memory preference store for tests and ephemeral sessions
#[derive(Default)]
pub struct MemoryPreferenceStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PreferenceStore for MemoryPreferenceStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.lock().unwrap().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.values
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.values.lock().unwrap().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    #[test]
    fn test_view_key_namespacing() {
        assert_eq!(view_key("entries", "pageSize"), "entries.list.pageSize");
        assert_eq!(view_key("categories", "pageSize"), "categories.list.pageSize");
    }

    #[tokio::test]
    async fn test_memory_store_roundtrip() {
        let store = MemoryPreferenceStore::new();
        assert_eq!(store.get("entries.list.pageSize").await.unwrap(), None);

        store.set("entries.list.pageSize", "100").await.unwrap();
        assert_eq!(
            store.get("entries.list.pageSize").await.unwrap(),
            Some("100".to_string())
        );

        store.remove("entries.list.pageSize").await.unwrap();
        assert_eq!(store.get("entries.list.pageSize").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_sqlite_store_upsert() {
        let db = SqlitePoolOptions::new()
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let store = SqlitePreferenceStore::new(db).await.unwrap();

        store.set("entries.list.pageSize", "50").await.unwrap();
        store.set("entries.list.pageSize", "100").await.unwrap();

        assert_eq!(
            store.get("entries.list.pageSize").await.unwrap(),
            Some("100".to_string())
        );
    }
}
