// SPDX-FileCopyrightText: 2026 Memdex Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Aggregate store statistics.

use memdex_core::{MemdexError, SourceKind};

use crate::database::Database;
use crate::models::{IndexStats, SourceCounts};

fn count(conn: &rusqlite::Connection, sql: &str) -> rusqlite::Result<u64> {
    let n: i64 = conn.query_row(sql, [], |row| row.get(0))?;
    Ok(n as u64)
}

fn count_by_source(conn: &rusqlite::Connection, table: &str) -> rusqlite::Result<Vec<(String, u64)>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT source, COUNT(*) FROM {table} GROUP BY source"
    ))?;
    let rows = stmt.query_map([], |row| {
        let n: i64 = row.get(1)?;
        Ok((row.get(0)?, n as u64))
    })?;
    rows.collect()
}

/// Collect counts by table and source plus the on-disk size of the store.
pub async fn stats(db: &Database) -> Result<IndexStats, MemdexError> {
    db.connection()
        .call(|conn| {
            let page_count = count(conn, "PRAGMA page_count")?;
            let page_size = count(conn, "PRAGMA page_size")?;
            let files = count_by_source(conn, "files")?;
            let chunks = count_by_source(conn, "chunks")?;

            let lookup = |rows: &[(String, u64)], source: SourceKind| {
                rows.iter()
                    .find(|(s, _)| s == source.as_str())
                    .map(|(_, n)| *n)
                    .unwrap_or(0)
            };
            let by_source = SourceKind::ALL
                .iter()
                .map(|&source| SourceCounts {
                    source,
                    files: lookup(&files, source),
                    chunks: lookup(&chunks, source),
                })
                .collect();

            Ok(IndexStats {
                total_files: count(conn, "SELECT COUNT(*) FROM files")?,
                total_chunks: count(conn, "SELECT COUNT(*) FROM chunks")?,
                embedded_chunks: count(
                    conn,
                    "SELECT COUNT(*) FROM chunks WHERE embedding IS NOT NULL",
                )?,
                cached_embeddings: count(conn, "SELECT COUNT(*) FROM embedding_cache")?,
                store_size_bytes: page_count * page_size,
                by_source,
            })
        })
        .await
        .map_err(crate::database::map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FileMeta, NewChunk};
    use crate::queries::{cache, chunks, files};

    #[tokio::test]
    async fn empty_store_has_zero_counts() {
        let db = Database::open_in_memory().await.unwrap();
        let stats = stats(&db).await.unwrap();
        assert_eq!(stats.total_files, 0);
        assert_eq!(stats.total_chunks, 0);
        assert_eq!(stats.by_source.len(), 2);
        assert!(stats.store_size_bytes > 0);
    }

    #[tokio::test]
    async fn counts_by_source() {
        let db = Database::open_in_memory().await.unwrap();
        let chunk = |line: usize| NewChunk {
            start_line: line,
            end_line: line,
            hash: format!("h{line}"),
            text: format!("line {line}"),
        };
        let inserted = files::replace_file(
            &db,
            FileMeta {
                path: "a.md".into(),
                source: SourceKind::Memory,
                hash: "h".into(),
                size: 1,
                mtime: 1,
            },
            vec![chunk(1), chunk(2)],
        )
        .await
        .unwrap()
        .inserted;
        files::replace_file(
            &db,
            FileMeta {
                path: "s.jsonl".into(),
                source: SourceKind::Sessions,
                hash: "h".into(),
                size: 1,
                mtime: 1,
            },
            vec![chunk(1)],
        )
        .await
        .unwrap();
        chunks::set_chunk_embedding(&db, inserted[0], "m", &[1.0])
            .await
            .unwrap();
        cache::put_cached_embedding(&db, "p", "m", "x", &[1.0])
            .await
            .unwrap();

        let stats = stats(&db).await.unwrap();
        assert_eq!(stats.total_files, 2);
        assert_eq!(stats.total_chunks, 3);
        assert_eq!(stats.embedded_chunks, 1);
        assert_eq!(stats.cached_embeddings, 1);
        let memory = stats
            .by_source
            .iter()
            .find(|c| c.source == SourceKind::Memory)
            .unwrap();
        assert_eq!((memory.files, memory.chunks), (1, 2));
        let sessions = stats
            .by_source
            .iter()
            .find(|c| c.source == SourceKind::Sessions)
            .unwrap();
        assert_eq!((sessions.files, sessions.chunks), (1, 1));
    }
}
