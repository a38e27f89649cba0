//! libSQL store: keeps the onboarding snapshot in a local settings table.

use std::path::Path;

use async_trait::async_trait;
use chrono::Utc;
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{info, warn};

use super::migrations;
use super::traits::{ProgressStore, STORAGE_KEY};
use crate::error::StoreError;
use crate::onboarding::state::OnboardingState;

/// libSQL-backed snapshot store, one row per (user, key).
///
/// A single connection serves every call; `libsql::Connection` is
/// `Send + Sync`.
pub struct LibSqlStore {
    /// Owns the database the connection points into.
    _db: LibSqlDatabase,
    conn: Connection,
    user_id: String,
}

impl LibSqlStore {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path, user_id: &str) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| StoreError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let store = Self::connect(db, user_id).await?;
        info!(path = %path.display(), "Onboarding store opened");
        Ok(store)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory(user_id: &str) -> Result<Self, StoreError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| StoreError::Pool(format!("Failed to create in-memory database: {e}")))?;
        Self::connect(db, user_id).await
    }

    async fn connect(db: LibSqlDatabase, user_id: &str) -> Result<Self, StoreError> {
        let conn = db
            .connect()
            .map_err(|e| StoreError::Pool(format!("Failed to create connection: {e}")))?;
        migrations::run_migrations(&conn).await?;
        Ok(Self {
            _db: db,
            conn,
            user_id: user_id.to_string(),
        })
    }

    /// Raw JSON stored under `key` for this store's user.
    pub async fn read_raw(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut rows = self
            .conn
            .query(
                "SELECT value FROM settings WHERE user_id = ?1 AND key = ?2",
                params![self.user_id.as_str(), key],
            )
            .await
            .map_err(|e| StoreError::Query(format!("read {key}: {e}")))?;

        let Some(row) = rows
            .next()
            .await
            .map_err(|e| StoreError::Query(format!("read {key}: {e}")))?
        else {
            return Ok(None);
        };
        row.get::<String>(0)
            .map(Some)
            .map_err(|e| StoreError::Query(format!("read {key}: {e}")))
    }

    /// Upsert raw JSON under `key`.
    pub async fn write_raw(&self, key: &str, json: &str) -> Result<(), StoreError> {
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO settings (user_id, key, value, updated_at) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (user_id, key) DO UPDATE SET value = excluded.value,
                 updated_at = excluded.updated_at",
                params![self.user_id.as_str(), key, json, now],
            )
            .await
            .map_err(|e| StoreError::Query(format!("write {key}: {e}")))?;
        Ok(())
    }

    /// Delete `key`. Returns whether a row existed.
    pub async fn remove(&self, key: &str) -> Result<bool, StoreError> {
        let deleted = self
            .conn
            .execute(
                "DELETE FROM settings WHERE user_id = ?1 AND key = ?2",
                params![self.user_id.as_str(), key],
            )
            .await
            .map_err(|e| StoreError::Query(format!("remove {key}: {e}")))?;
        Ok(deleted > 0)
    }
}

#[async_trait]
impl ProgressStore for LibSqlStore {
    async fn load(&self) -> Result<Option<OnboardingState>, StoreError> {
        let Some(json) = self.read_raw(STORAGE_KEY).await? else {
            return Ok(None);
        };
        // An unreadable snapshot is treated as absent; the backend record
        // rebuilds it on the next fetch.
        match serde_json::from_str::<OnboardingState>(&json) {
            Ok(state) => Ok(Some(state)),
            Err(e) => {
                warn!(user = %self.user_id, "Discarding unreadable onboarding snapshot: {e}");
                Ok(None)
            }
        }
    }

    async fn save(&self, state: &OnboardingState) -> Result<(), StoreError> {
        let json =
            serde_json::to_string(state).map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.write_raw(STORAGE_KEY, &json).await
    }

    async fn clear(&self) -> Result<bool, StoreError> {
        self.remove(STORAGE_KEY).await
    }
}
