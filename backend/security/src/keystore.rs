//! SQLite-backed API key store.
//!
//! Keys live in the `apiKeys` table with the key itself as primary key, so
//! uniqueness is enforced by SQLite. The database runs with
//! `synchronous=FULL`: a mutation has been committed to disk by the time the
//! call returns.
use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, ErrorCode, OptionalExtension, params};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum KeyStoreError {
    #[error("API key already exists")]
    DuplicateKey,

    #[error("API key must not be empty")]
    InvalidKey,

    #[error("key store is closed")]
    Closed,

    #[error("key store error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiKeyRecord {
    pub key: String,
    /// `None` for keys created before timestamps were recorded.
    pub created_at: Option<DateTime<Utc>>,
}

pub struct KeyStore {
    conn: Mutex<Option<Connection>>,
}

impl KeyStore {
    /// Open or create the key database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, KeyStoreError> {
        let conn = Connection::open(path.as_ref())?;
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA synchronous=FULL;",
        )?;
        init_schema(&conn)?;
        info!(path = %path.as_ref().display(), "Connected to the API key database");
        Ok(Self {
            conn: Mutex::new(Some(conn)),
        })
    }

    /// Open an in-memory database (for tests).
    pub fn in_memory() -> Result<Self, KeyStoreError> {
        let conn = Connection::open_in_memory()?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(Some(conn)),
        })
    }

    /// Exact, case-sensitive membership check.
    pub async fn exists(&self, key: &str) -> Result<bool, KeyStoreError> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or(KeyStoreError::Closed)?;
        let found = conn
            .query_row("SELECT 1 FROM apiKeys WHERE key = ?1", params![key], |_| Ok(()))
            .optional()?;
        Ok(found.is_some())
    }

    /// Insert a new key. Fails with `DuplicateKey` if it is already stored.
    pub async fn insert(&self, key: &str) -> Result<ApiKeyRecord, KeyStoreError> {
        if key.trim().is_empty() {
            return Err(KeyStoreError::InvalidKey);
        }

        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or(KeyStoreError::Closed)?;
        let created_at = Utc::now();
        match conn.execute(
            "INSERT INTO apiKeys (key, created_at) VALUES (?1, ?2)",
            params![key, created_at.to_rfc3339()],
        ) {
            Ok(_) => Ok(ApiKeyRecord {
                key: key.to_string(),
                created_at: Some(created_at),
            }),
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                Err(KeyStoreError::DuplicateKey)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Delete a key. Returns whether a row was actually removed; removing an
    /// absent key is not an error.
    pub async fn remove(&self, key: &str) -> Result<bool, KeyStoreError> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or(KeyStoreError::Closed)?;
        let deleted = conn.execute("DELETE FROM apiKeys WHERE key = ?1", params![key])?;
        Ok(deleted > 0)
    }

    /// Snapshot of all keys in insertion order.
    pub async fn list(&self) -> Result<Vec<ApiKeyRecord>, KeyStoreError> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or(KeyStoreError::Closed)?;
        let mut stmt = conn.prepare("SELECT key, created_at FROM apiKeys ORDER BY rowid ASC")?;

        let records = stmt
            .query_map([], |row| {
                let key: String = row.get(0)?;
                let created_at: Option<String> = row.get(1)?;
                Ok((key, created_at))
            })?
            .map(|r| {
                r.map(|(key, created_at)| ApiKeyRecord {
                    key,
                    created_at: created_at
                        .and_then(|ts| DateTime::parse_from_rfc3339(&ts).ok())
                        .map(|ts| ts.with_timezone(&Utc)),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(records)
    }

    pub async fn count(&self) -> Result<usize, KeyStoreError> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or(KeyStoreError::Closed)?;
        let count: usize = conn.query_row("SELECT COUNT(*) FROM apiKeys", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Close the underlying connection. Every later call fails with `Closed`.
    pub async fn close(&self) -> Result<(), KeyStoreError> {
        let mut guard = self.conn.lock().await;
        match guard.take() {
            Some(conn) => {
                conn.close().map_err(|(_, e)| e)?;
                info!("Closed the API key database connection");
                Ok(())
            }
            None => Ok(()),
        }
    }
}

fn init_schema(conn: &Connection) -> Result<(), KeyStoreError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS apiKeys (
             key        TEXT PRIMARY KEY,
             created_at TEXT
         );",
    )?;

    // Databases created by older releases only have the `key` column.
    let mut stmt = conn.prepare("PRAGMA table_info(apiKeys)")?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<Result<Vec<_>, _>>()?;
    if !columns.iter().any(|c| c == "created_at") {
        conn.execute_batch("ALTER TABLE apiKeys ADD COLUMN created_at TEXT;")?;
        warn!("Added 'created_at' column to 'apiKeys' table");
    }
    Ok(())
}
