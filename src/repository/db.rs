//! Database Connection and Setup
//!
//! Manages the SQLite connection and migrations.

use rusqlite::Connection;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::domain::{DomainError, DomainResult};

/// Connection slot shared by every repository
pub type SharedConnection = Arc<Mutex<Option<Connection>>>;

impl From<rusqlite::Error> for DomainError {
    fn from(e: rusqlite::Error) -> Self {
        DomainError::Persistence(e.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(e: serde_json::Error) -> Self {
        DomainError::Persistence(format!("serialization: {}", e))
    }
}

/// Database state wrapper
#[derive(Clone)]
pub struct DbState {
    conn: SharedConnection,
}

impl DbState {
    /// Handle to the connection slot, for building repositories
    pub fn connection(&self) -> SharedConnection {
        self.conn.clone()
    }

    pub async fn is_open(&self) -> bool {
        self.conn.lock().await.is_some()
    }

    /// Drop the connection; repositories fail with a persistence error
    /// until a new one is installed
    pub async fn close(&self) {
        self.conn.lock().await.take();
    }
}

/// Run `f` against the open connection
pub(crate) fn with_conn<T>(
    guard: &Option<Connection>,
    f: impl FnOnce(&Connection) -> DomainResult<T>,
) -> DomainResult<T> {
    let conn = guard
        .as_ref()
        .ok_or_else(|| DomainError::Persistence("Database not initialized".to_string()))?;
    f(conn)
}

/// Initialize database with path (":memory:" for an in-memory database)
pub async fn init_db(db_path: &Path) -> DomainResult<DbState> {
    let conn = Connection::open(db_path)
        .map_err(|e| DomainError::Persistence(format!("Failed to open {}: {}", db_path.display(), e)))?;

    run_migrations(&conn)?;

    let state = DbState {
        conn: Arc::new(Mutex::new(Some(conn))),
    };

    log::info!("database ready at {}", db_path.display());
    Ok(state)
}

/// Check if a column exists in a table
fn column_exists(conn: &Connection, table: &str, column: &str) -> bool {
    let query = format!("PRAGMA table_info({})", table);
    let Ok(mut stmt) = conn.prepare(&query) else {
        return false;
    };
    let Ok(mut rows) = stmt.query([]) else {
        return false;
    };
    while let Ok(Some(row)) = rows.next() {
        if let Ok(name) = row.get::<_, String>(1) {
            if name == column {
                return true;
            }
        }
    }
    false
}

/// Run database migrations
fn run_migrations(conn: &Connection) -> DomainResult<()> {
    // Tasks: one JSON body per row, independently updatable
    conn.execute(
        "CREATE TABLE IF NOT EXISTS tasks (
            id TEXT PRIMARY KEY,
            body TEXT NOT NULL,
            updated_at INTEGER NOT NULL DEFAULT 0
        )",
        [],
    )?;

    // Column and rank are mirrored out of the body for ordered listing
    if !column_exists(conn, "tasks", "status") {
        conn.execute("ALTER TABLE tasks ADD COLUMN status TEXT NOT NULL DEFAULT 'todo'", [])
            .map_err(|e| DomainError::Persistence(format!("Failed to add status: {}", e)))?;
    }

    if !column_exists(conn, "tasks", "position") {
        conn.execute("ALTER TABLE tasks ADD COLUMN position INTEGER NOT NULL DEFAULT 0", [])
            .map_err(|e| DomainError::Persistence(format!("Failed to add position: {}", e)))?;
    }

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_tasks_status ON tasks(status, position)",
        [],
    )?;

    // Whole-document values (library snapshot, reward ledger)
    conn.execute(
        "CREATE TABLE IF NOT EXISTS kv (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at INTEGER NOT NULL DEFAULT 0
        )",
        [],
    )?;

    Ok(())
}
