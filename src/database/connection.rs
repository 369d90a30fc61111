//! SQLite connection management for the Nimbus session store.
//!
//! Provides the [`Database`] struct that wraps a `rusqlite::Connection`
//! and automatically runs schema migrations on open. Open failures are
//! classified into the [`StoreOpenError`] taxonomy so the bootstrap layer
//! can decide between recovery and a hard stop.

use rusqlite::{Connection, Transaction};
use std::path::Path;

use crate::types::errors::StoreOpenError;

use super::migrations;

/// Core store wrapper providing SQLite connection management.
///
/// Only the persistence actor may hold a `Database` once the application
/// is running; it is the single write-capable handle to the store.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Opens (or creates) the session store at the given file path and runs
    /// migrations.
    ///
    /// # Errors
    /// Returns a classified [`StoreOpenError`]. A `schema_version` ahead of
    /// this build is reported as [`StoreOpenError::SchemaMismatch`]; engine
    /// failures are classified by message.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreOpenError> {
        let conn = Connection::open(path).map_err(|e| StoreOpenError::classify(&e))?;
        Self::finish_open(conn)
    }

    /// Opens an in-memory session store and runs migrations.
    ///
    /// Useful for testing — the store is discarded when the `Database` drops.
    pub fn open_in_memory() -> Result<Self, StoreOpenError> {
        let conn = Connection::open_in_memory().map_err(|e| StoreOpenError::classify(&e))?;
        Self::finish_open(conn)
    }

    fn finish_open(conn: Connection) -> Result<Self, StoreOpenError> {
        let db = Self { conn };
        db.check_schema_version()?;
        db.run_migrations()
            .map_err(|e| StoreOpenError::classify(&e))?;
        Ok(db)
    }

    /// Rejects stores written by a newer build. Migrating forward is fine;
    /// interpreting a schema we do not know is not.
    fn check_schema_version(&self) -> Result<(), StoreOpenError> {
        let stored = migrations::get_schema_version(&self.conn);
        if stored > migrations::CURRENT_SCHEMA_VERSION {
            return Err(StoreOpenError::SchemaMismatch(format!(
                "store schema version {} is newer than supported version {}",
                stored,
                migrations::CURRENT_SCHEMA_VERSION
            )));
        }
        Ok(())
    }

    /// Runs all schema migrations, creating tables and indexes if they do
    /// not exist. Idempotent and safe to call on every startup.
    fn run_migrations(&self) -> Result<(), rusqlite::Error> {
        migrations::run_all(&self.conn)
    }

    /// Returns a reference to the underlying `rusqlite::Connection`.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Opens a transactional write context against the store.
    pub fn transaction(&mut self) -> Result<Transaction<'_>, rusqlite::Error> {
        self.conn.transaction()
    }
}
