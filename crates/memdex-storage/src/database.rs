// SPDX-FileCopyrightText: 2026 Memdex Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database handle: opening, PRAGMA setup, migrations, and error mapping.

use std::path::Path;

use memdex_core::MemdexError;
use tokio_rusqlite::Connection;
use tracing::{debug, info};

use crate::migrations;

/// Busy timeout applied to every connection, in milliseconds.
const BUSY_TIMEOUT_MS: u32 = 5000;

/// A migrated SQLite database driven by a single `tokio-rusqlite` background thread.
///
/// Cloning is cheap: clones share the same background connection, so all
/// writes stay serialized.
#[derive(Clone)]
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (or create) the database file at `path` and apply pending migrations.
    ///
    /// Parent directories are created as needed.
    pub async fn open(path: impl AsRef<Path>, wal_mode: bool) -> Result<Self, MemdexError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| MemdexError::io(parent, e))?;
        }

        let conn = Connection::open(path)
            .await
            .map_err(|e| MemdexError::Storage { source: Box::new(e) })?;
        let db = Self::initialize(conn, wal_mode).await?;
        info!(path = %path.display(), wal_mode, "index database opened");
        Ok(db)
    }

    /// Open a private in-memory database. Used by tests and ephemeral indexes.
    pub async fn open_in_memory() -> Result<Self, MemdexError> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| MemdexError::Storage { source: Box::new(e) })?;
        Self::initialize(conn, false).await
    }

    async fn initialize(conn: Connection, wal_mode: bool) -> Result<Self, MemdexError> {
        conn.call(move |conn| apply_pragmas(conn, wal_mode))
            .await
            .map_err(map_tr_err)?;

        // The inner result carries refinery's error so the closure stays on rusqlite's error type.
        conn.call(|conn| Ok(migrations::run_migrations(conn)))
            .await
            .map_err(map_tr_err)??;

        debug!("index schema up to date");
        Ok(Self { conn })
    }

    /// The underlying async connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Checkpoint the WAL and close the connection.
    pub async fn close(self) -> Result<(), MemdexError> {
        self.conn
            .call(|conn| {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        self.conn
            .close()
            .await
            .map_err(|e| MemdexError::Storage { source: Box::new(e) })
    }
}

fn apply_pragmas(conn: &mut rusqlite::Connection, wal_mode: bool) -> Result<(), rusqlite::Error> {
    if wal_mode {
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
    }
    conn.execute_batch(&format!(
        "PRAGMA foreign_keys = ON;
         PRAGMA synchronous = NORMAL;
         PRAGMA busy_timeout = {BUSY_TIMEOUT_MS};"
    ))?;
    Ok(())
}

/// Convert a tokio-rusqlite error into a [`MemdexError`].
///
/// SQLite constraint failures (unique keys, foreign keys, CHECKs) surface as
/// [`MemdexError::ConstraintViolation`]; everything else is a storage error.
pub fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> MemdexError {
    match e {
        tokio_rusqlite::Error::Error(rusqlite::Error::SqliteFailure(failure, message))
            if failure.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            MemdexError::ConstraintViolation {
                message: message.unwrap_or_else(|| failure.to_string()),
            }
        }
        other => MemdexError::Storage {
            source: Box::new(other),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn open_in_memory_runs_migrations() {
        let db = Database::open_in_memory().await.unwrap();
        let tables: Vec<String> = db
            .connection()
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT name FROM sqlite_master WHERE type IN ('table') ORDER BY name",
                )?;
                let rows = stmt.query_map([], |row| row.get(0))?;
                rows.collect::<Result<Vec<String>, _>>()
            })
            .await
            .unwrap();
        for table in ["chunks", "embedding_cache", "files", "meta"] {
            assert!(tables.iter().any(|t| t == table), "missing table {table}");
        }
        assert!(tables.iter().any(|t| t == "chunks_fts"));
    }

    #[tokio::test]
    async fn foreign_keys_are_enforced() {
        let db = Database::open_in_memory().await.unwrap();
        let fk: i64 = db
            .connection()
            .call(|conn| conn.query_row("PRAGMA foreign_keys", [], |row| row.get(0)))
            .await
            .unwrap();
        assert_eq!(fk, 1);
    }

    #[tokio::test]
    async fn open_file_creates_parent_and_uses_wal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("index.db");
        let db = Database::open(&path, true).await.unwrap();
        let mode: String = db
            .connection()
            .call(|conn| conn.query_row("PRAGMA journal_mode", [], |row| row.get(0)))
            .await
            .unwrap();
        assert_eq!(mode.to_lowercase(), "wal");
        db.close().await.unwrap();
        assert!(path.exists());
    }

    #[tokio::test]
    async fn reopening_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.db");
        Database::open(&path, true).await.unwrap().close().await.unwrap();
        let db = Database::open(&path, true).await.unwrap();
        let version: String = db
            .connection()
            .call(|conn| {
                conn.query_row(
                    "SELECT value FROM meta WHERE key = 'schema_version'",
                    [],
                    |row| row.get(0),
                )
            })
            .await
            .unwrap();
        assert_eq!(version, "1");
    }

    #[tokio::test]
    async fn constraint_failures_map_to_constraint_violation() {
        let db = Database::open_in_memory().await.unwrap();
        let err = db
            .connection()
            .call(|conn| {
                conn.execute("INSERT INTO meta (key, value) VALUES ('k', 'a')", [])?;
                conn.execute("INSERT INTO meta (key, value) VALUES ('k', 'b')", [])?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
            .unwrap_err();
        assert!(matches!(err, MemdexError::ConstraintViolation { .. }), "got {err:?}");
    }
}
