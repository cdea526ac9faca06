//! Key-value store adapter
//!
//! Async get/set/remove over string keys, each holding one JSON document.
//! Every operation is bounded by a timeout so a stalled store surfaces a
//! transient error instead of blocking the calling UI action.

use crate::config::STORAGE_TIMEOUT_SECS;
use crate::error::{AppError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::SqlitePool;
use std::future::Future;
use std::time::Duration;

/// String-keyed JSON document store
#[derive(Clone)]
pub struct KvStore {
    pool: SqlitePool,
}

impl KvStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn bounded<T, F>(fut: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, sqlx::Error>>,
    {
        match tokio::time::timeout(Duration::from_secs(STORAGE_TIMEOUT_SECS), fut).await {
            Ok(res) => Ok(res?),
            Err(_) => Err(AppError::Timeout(STORAGE_TIMEOUT_SECS)),
        }
    }

    /// Get the raw document stored under `key`, if any
    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        Self::bounded(
            sqlx::query_scalar::<_, String>("SELECT value FROM kv WHERE key = ?")
                .bind(key)
                .fetch_optional(&self.pool),
        )
        .await
    }

    /// Store `value` under `key`, replacing any previous document
    pub async fn set(&self, key: &str, value: &str) -> Result<()> {
        Self::bounded(
            sqlx::query(
                r#"
                INSERT INTO kv (key, value, updated_at) VALUES (?, ?, CURRENT_TIMESTAMP)
                ON CONFLICT(key) DO UPDATE SET value = excluded.value,
                                               updated_at = excluded.updated_at
                "#,
            )
            .bind(key)
            .bind(value)
            .execute(&self.pool),
        )
        .await?;

        tracing::debug!("Stored document under key: {}", key);
        Ok(())
    }

    /// Remove the document stored under `key`; missing keys are a no-op
    pub async fn remove(&self, key: &str) -> Result<()> {
        Self::bounded(
            sqlx::query("DELETE FROM kv WHERE key = ?")
                .bind(key)
                .execute(&self.pool),
        )
        .await?;

        tracing::debug!("Removed key: {}", key);
        Ok(())
    }

    /// List all stored keys
    pub async fn keys(&self) -> Result<Vec<String>> {
        Self::bounded(
            sqlx::query_scalar::<_, String>("SELECT key FROM kv ORDER BY key")
                .fetch_all(&self.pool),
        )
        .await
    }

    /// Remove every stored key
    pub async fn clear(&self) -> Result<()> {
        Self::bounded(sqlx::query("DELETE FROM kv").execute(&self.pool)).await?;

        tracing::info!("Cleared all stored keys");
        Ok(())
    }

    /// Deserialize the document under `key`.
    ///
    /// An absent key yields `None`; corrupt JSON is surfaced as an error
    /// rather than treated as absent, since a later rewrite would otherwise
    /// destroy the stored document.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get(key).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Serialize `value` and store it under `key`
    pub async fn set_json<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        self.set(key, &raw).await
    }
}
