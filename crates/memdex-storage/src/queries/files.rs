// SPDX-FileCopyrightText: 2026 Memdex Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! File-level operations: change detection, atomic chunk replacement, deletion.

use memdex_core::{MemdexError, SourceKind};
use rusqlite::{OptionalExtension, params};

use crate::database::Database;
use crate::models::{ChangeStatus, FileMeta, FileRecord, FileReplacement, NewChunk};

fn row_to_file(row: &rusqlite::Row<'_>) -> rusqlite::Result<FileRecord> {
    let source: String = row.get(1)?;
    Ok(FileRecord {
        path: row.get(0)?,
        source: SourceKind::from_str_value(&source),
        hash: row.get(2)?,
        size: row.get(3)?,
        mtime: row.get(4)?,
        indexed_at: row.get(5)?,
    })
}

/// Get a file record by path.
pub async fn get_file(db: &Database, path: &str) -> Result<Option<FileRecord>, MemdexError> {
    let path = path.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT path, source, hash, size, mtime, indexed_at FROM files WHERE path = ?1",
                params![path],
                row_to_file,
            )
            .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// List indexed files, optionally restricted to one source, ordered by path.
pub async fn list_files(
    db: &Database,
    source: Option<SourceKind>,
) -> Result<Vec<FileRecord>, MemdexError> {
    let source = source.map(|s| s.as_str().to_string());
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT path, source, hash, size, mtime, indexed_at FROM files
                 WHERE ?1 IS NULL OR source = ?1
                 ORDER BY path",
            )?;
            let rows = stmt.query_map(params![source], row_to_file)?;
            rows.collect()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// List indexed paths of one source, ordered.
pub async fn list_paths(db: &Database, source: SourceKind) -> Result<Vec<String>, MemdexError> {
    let source = source.as_str();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare("SELECT path FROM files WHERE source = ?1 ORDER BY path")?;
            let rows = stmt.query_map(params![source], |row| row.get(0))?;
            rows.collect()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Compare a file on disk against its indexed record.
///
/// The content hash decides. When the hash matches but size or mtime moved
/// (a touch, a copy), the stored metadata is refreshed in place.
pub async fn check_change(
    db: &Database,
    path: &str,
    hash: &str,
    size: i64,
    mtime: i64,
) -> Result<ChangeStatus, MemdexError> {
    let path = path.to_string();
    let hash = hash.to_string();
    db.connection()
        .call(move |conn| {
            let existing: Option<(String, i64, i64)> = conn
                .query_row(
                    "SELECT hash, size, mtime FROM files WHERE path = ?1",
                    params![path],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                )
                .optional()?;

            match existing {
                None => Ok(ChangeStatus::New),
                Some((stored, _, _)) if stored != hash => Ok(ChangeStatus::Changed),
                Some((_, stored_size, stored_mtime)) => {
                    if stored_size != size || stored_mtime != mtime {
                        conn.execute(
                            "UPDATE files SET size = ?2, mtime = ?3 WHERE path = ?1",
                            params![path, size, mtime],
                        )?;
                    }
                    Ok(ChangeStatus::Unchanged)
                }
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Atomically upsert a file row and replace all of its chunks.
///
/// Runs in one transaction: either the new file row and every new chunk are
/// visible, or nothing changed.
pub async fn replace_file(
    db: &Database,
    file: FileMeta,
    chunks: Vec<NewChunk>,
) -> Result<FileReplacement, MemdexError> {
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;

            let removed: Vec<i64> = {
                let mut stmt = tx.prepare("SELECT id FROM chunks WHERE path = ?1 ORDER BY id")?;
                let rows = stmt.query_map(params![file.path], |row| row.get(0))?;
                rows.collect::<Result<_, _>>()?
            };

            tx.execute(
                "INSERT INTO files (path, source, hash, size, mtime, indexed_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
                 ON CONFLICT(path) DO UPDATE SET
                    source = excluded.source,
                    hash = excluded.hash,
                    size = excluded.size,
                    mtime = excluded.mtime,
                    indexed_at = excluded.indexed_at",
                params![
                    file.path,
                    file.source.as_str(),
                    file.hash,
                    file.size,
                    file.mtime
                ],
            )?;
            tx.execute("DELETE FROM chunks WHERE path = ?1", params![file.path])?;

            let mut inserted = Vec::with_capacity(chunks.len());
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO chunks (path, source, start_line, end_line, hash, text)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                )?;
                for chunk in &chunks {
                    let id = stmt.insert(params![
                        file.path,
                        file.source.as_str(),
                        chunk.start_line as i64,
                        chunk.end_line as i64,
                        chunk.hash,
                        chunk.text,
                    ])?;
                    inserted.push(id);
                }
            }

            tx.commit()?;
            Ok(FileReplacement { inserted, removed })
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Delete a file and its chunks. Returns the ids of the removed chunks.
///
/// Deleting an unknown path is a no-op returning no ids.
pub async fn delete_file(db: &Database, path: &str) -> Result<Vec<i64>, MemdexError> {
    let path = path.to_string();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let removed: Vec<i64> = {
                let mut stmt = tx.prepare("SELECT id FROM chunks WHERE path = ?1 ORDER BY id")?;
                let rows = stmt.query_map(params![path], |row| row.get(0))?;
                rows.collect::<Result<_, _>>()?
            };
            // Chunks go first so the FTS delete trigger fires for each row.
            tx.execute("DELETE FROM chunks WHERE path = ?1", params![path])?;
            tx.execute("DELETE FROM files WHERE path = ?1", params![path])?;
            tx.commit()?;
            Ok(removed)
        })
        .await
        .map_err(crate::database::map_tr_err)
}
