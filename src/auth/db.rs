//! Auth Database
//! Mission: Own the SQLite connection shared by the user and refresh token stores
//!
//! # Schema
//!
//! ```sql
//! CREATE TABLE users (
//!     id INTEGER PRIMARY KEY AUTOINCREMENT,
//!     name TEXT NOT NULL,
//!     email TEXT UNIQUE NOT NULL,
//!     username TEXT UNIQUE NOT NULL,
//!     password_hash TEXT NOT NULL,
//!     role TEXT NOT NULL,
//!     created_at TEXT NOT NULL
//! );
//!
//! CREATE TABLE refresh_tokens (
//!     token TEXT PRIMARY KEY,
//!     user_id INTEGER UNIQUE NOT NULL REFERENCES users(id) ON DELETE CASCADE,
//!     expires_at INTEGER NOT NULL   -- unix millis
//! );
//! ```

use parking_lot::Mutex;
use rusqlite::{Connection, ErrorCode};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

const SCHEMA_SQL: &str = r#"
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    email TEXT UNIQUE NOT NULL,
    username TEXT UNIQUE NOT NULL,
    password_hash TEXT NOT NULL,
    role TEXT NOT NULL,
    created_at TEXT NOT NULL
);

-- UNIQUE(user_id): one refresh token per user, first writer wins
CREATE TABLE IF NOT EXISTS refresh_tokens (
    token TEXT PRIMARY KEY,
    user_id INTEGER UNIQUE NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    expires_at INTEGER NOT NULL
) WITHOUT ROWID;

CREATE INDEX IF NOT EXISTS idx_refresh_tokens_expires_at
    ON refresh_tokens(expires_at);
"#;

/// Shared SQLite handle for the auth tables
#[derive(Clone)]
pub struct AuthDb {
    conn: Arc<Mutex<Connection>>,
}

impl AuthDb {
    /// Open (or create) the database at `path` and apply the schema
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(path.as_ref())?;
        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL;")?;
        let db = Self::from_connection(conn)?;
        info!("🔐 Auth database opened at {}", path.as_ref().display());
        Ok(db)
    }

    pub fn in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub(crate) fn conn(&self) -> parking_lot::MutexGuard<'_, Connection> {
        self.conn.lock()
    }
}

/// Storage errors for the auth tables
#[derive(Debug)]
pub enum StoreError {
    Sqlite(rusqlite::Error),
    /// A UNIQUE constraint rejected the write
    Conflict(String),
    /// A stored row could not be mapped back into a model
    Corrupt(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(e) => write!(f, "SQLite error: {}", e),
            Self::Conflict(what) => write!(f, "Constraint violation: {}", what),
            Self::Corrupt(what) => write!(f, "Corrupt row: {}", what),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Sqlite(e) => Some(e),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(err, msg) = &e {
            if err.code == ErrorCode::ConstraintViolation {
                return Self::Conflict(msg.clone().unwrap_or_else(|| err.to_string()));
            }
        }
        Self::Sqlite(e)
    }
}
