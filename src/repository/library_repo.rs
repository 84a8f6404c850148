//! Library Repository
//!
//! Folders and notes persisted together as a single document.

use async_trait::async_trait;

use super::db::SharedConnection;
use super::kv::KvStore;
use super::traits::LibraryRepository;
use crate::domain::{default_snapshot, DomainResult, LibrarySnapshot};

const LIBRARY_KEY: &str = "library.v1";

pub struct SqliteLibraryRepository {
    kv: KvStore,
}

impl SqliteLibraryRepository {
    pub fn new(conn: SharedConnection) -> Self {
        Self { kv: KvStore::new(conn) }
    }
}

#[async_trait]
impl LibraryRepository for SqliteLibraryRepository {
    /// Missing or unreadable documents yield the first-run library
    async fn load_snapshot(&self) -> DomainResult<LibrarySnapshot> {
        let Some(raw) = self.kv.get_raw(LIBRARY_KEY).await? else {
            return Ok(default_snapshot());
        };
        match serde_json::from_str(&raw) {
            Ok(snapshot) => Ok(snapshot),
            Err(e) => {
                log::warn!("library document unreadable, starting fresh: {}", e);
                Ok(default_snapshot())
            }
        }
    }

    async fn save_snapshot(&self, snapshot: &LibrarySnapshot) -> DomainResult<()> {
        self.kv.put(LIBRARY_KEY, snapshot).await
    }
}
