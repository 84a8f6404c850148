//! Key-Value Documents
//!
//! JSON documents stored whole under a key. Used for values that must be
//! written atomically (library snapshot, reward ledger).

use rusqlite::{params, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::db::{with_conn, SharedConnection};
use crate::domain::DomainResult;

#[derive(Clone)]
pub struct KvStore {
    conn: SharedConnection,
}

impl KvStore {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }

    /// Raw stored text for a key
    pub async fn get_raw(&self, key: &str) -> DomainResult<Option<String>> {
        let guard = self.conn.lock().await;
        with_conn(&guard, |conn| {
            let value = conn
                .query_row("SELECT value FROM kv WHERE key = ?", params![key], |row| row.get(0))
                .optional()?;
            Ok(value)
        })
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> DomainResult<Option<T>> {
        match self.get_raw(key).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    pub async fn put<T: Serialize + Sync>(&self, key: &str, value: &T) -> DomainResult<()> {
        let body = serde_json::to_string(value)?;
        let guard = self.conn.lock().await;
        with_conn(&guard, |conn| {
            write(conn, key, &body)?;
            Ok(())
        })
    }

    /// Read-modify-write under a single lock
    ///
    /// `f` sees the stored value (or `T::default()`); the value is written
    /// back only when `f` succeeds.
    pub async fn update<T, R, F>(&self, key: &str, f: F) -> DomainResult<R>
    where
        T: Serialize + DeserializeOwned + Default,
        F: FnOnce(&mut T) -> DomainResult<R> + Send,
    {
        let guard = self.conn.lock().await;
        with_conn(&guard, |conn| {
            let raw: Option<String> = conn
                .query_row("SELECT value FROM kv WHERE key = ?", params![key], |row| row.get(0))
                .optional()?;
            let mut value: T = match raw {
                Some(raw) => serde_json::from_str(&raw)?,
                None => T::default(),
            };
            let result = f(&mut value)?;
            write(conn, key, &serde_json::to_string(&value)?)?;
            Ok(result)
        })
    }
}

fn write(conn: &rusqlite::Connection, key: &str, body: &str) -> rusqlite::Result<usize> {
    conn.execute(
        "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        params![key, body, chrono::Utc::now().timestamp_millis()],
    )
}
