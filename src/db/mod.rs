//! SQLite store for clients, meetings, and classifications.
//!
//! The database lives at `~/.salesos/salesos.db` by default. Every logical
//! pipeline step (client upsert, meeting upsert, classification persist)
//! commits independently — there is no enclosing transaction around a CSV
//! row or a file, so rows already committed survive a later fatal error.

use std::path::PathBuf;

use rusqlite::Connection;

pub mod types;
pub use types::*;

mod classifications;
mod clients;
mod meetings;

pub struct SalesDb {
    conn: Connection,
}

impl SalesDb {
    /// Borrow the underlying connection for ad-hoc queries.
    pub fn conn_ref(&self) -> &Connection {
        &self.conn
    }

    /// Execute a closure within a SQLite transaction.
    /// Commits on Ok, rolls back on Err.
    pub fn with_transaction<F, T>(&self, f: F) -> Result<T, DbError>
    where
        F: FnOnce(&Self) -> Result<T, DbError>,
    {
        self.conn.execute_batch("BEGIN IMMEDIATE")?;
        match f(self) {
            Ok(val) => {
                self.conn.execute_batch("COMMIT")?;
                Ok(val)
            }
            Err(e) => {
                let _ = self.conn.execute_batch("ROLLBACK");
                Err(e)
            }
        }
    }

    /// Open (or create) the database at the default path and apply the schema.
    pub fn open() -> Result<Self, DbError> {
        Self::open_at(Self::db_path()?)
    }

    /// Open a database at an explicit path. Useful for testing and for the
    /// `SALESOS_DB` override.
    pub fn open_at(path: PathBuf) -> Result<Self, DbError> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).map_err(DbError::CreateDir)?;
            }
        }

        let conn = Connection::open(&path)?;
        Self::initialize(conn)
    }

    /// Open an in-memory database. Test-only convenience.
    pub fn open_in_memory() -> Result<Self, DbError> {
        Self::initialize(Connection::open_in_memory()?)
    }

    fn initialize(conn: Connection) -> Result<Self, DbError> {
        // WAL for better concurrent read performance
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;

        crate::migrations::run_migrations(&conn).map_err(DbError::Migration)?;

        // Cascade deletes (client → meeting → classification) depend on this
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        Ok(Self { conn })
    }

    /// Resolve the default database path: `~/.salesos/salesos.db`.
    fn db_path() -> Result<PathBuf, DbError> {
        let home = dirs::home_dir().ok_or(DbError::HomeDirNotFound)?;
        Ok(home.join(".salesos").join("salesos.db"))
    }
}
