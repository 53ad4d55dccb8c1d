// SPDX-FileCopyrightText: 2026 Memdex Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chunk reads and embedding attachment.

use std::collections::HashMap;

use memdex_core::{MemdexError, SourceKind};
use rusqlite::{OptionalExtension, params, params_from_iter};

use crate::codec;
use crate::database::Database;
use crate::models::{ChunkRecord, PendingChunk};
use crate::queries::placeholders;

const CHUNK_COLUMNS: &str =
    "id, path, source, start_line, end_line, hash, model, text, embedding, updated_at";

fn row_to_chunk(row: &rusqlite::Row<'_>) -> rusqlite::Result<ChunkRecord> {
    let source: String = row.get(2)?;
    let start_line: i64 = row.get(3)?;
    let end_line: i64 = row.get(4)?;
    let blob: Option<Vec<u8>> = row.get(8)?;
    let embedding = match blob {
        Some(bytes) => Some(codec::decode_column(8, &bytes)?),
        None => None,
    };
    Ok(ChunkRecord {
        id: row.get(0)?,
        path: row.get(1)?,
        source: SourceKind::from_str_value(&source),
        start_line: start_line as usize,
        end_line: end_line as usize,
        hash: row.get(5)?,
        model: row.get(6)?,
        text: row.get(7)?,
        embedding,
        updated_at: row.get(9)?,
    })
}

/// Get a chunk by id.
pub async fn get_chunk(db: &Database, id: i64) -> Result<Option<ChunkRecord>, MemdexError> {
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {CHUNK_COLUMNS} FROM chunks WHERE id = ?1"),
                params![id],
                row_to_chunk,
            )
            .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Get chunks by id, in the order the ids were given. Unknown ids are skipped.
pub async fn get_chunks_by_ids(
    db: &Database,
    ids: &[i64],
) -> Result<Vec<ChunkRecord>, MemdexError> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let ids = ids.to_vec();
    db.connection()
        .call(move |conn| {
            let sql = format!(
                "SELECT {CHUNK_COLUMNS} FROM chunks WHERE id IN ({})",
                placeholders(1, ids.len())
            );
            let mut stmt = conn.prepare(&sql)?;
            let mut by_id: HashMap<i64, ChunkRecord> = stmt
                .query_map(params_from_iter(ids.iter()), row_to_chunk)?
                .map(|r| r.map(|c| (c.id, c)))
                .collect::<Result<_, _>>()?;
            Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// All chunks of one file, in line order.
pub async fn chunks_for_path(db: &Database, path: &str) -> Result<Vec<ChunkRecord>, MemdexError> {
    let path = path.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {CHUNK_COLUMNS} FROM chunks WHERE path = ?1 ORDER BY start_line, id"
            ))?;
            let rows = stmt.query_map(params![path], row_to_chunk)?;
            rows.collect()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Chunks with no embedding for `model`, restricted to `paths` when non-empty.
pub async fn chunks_missing_embedding(
    db: &Database,
    model: &str,
    paths: &[String],
) -> Result<Vec<PendingChunk>, MemdexError> {
    let model = model.to_string();
    let paths = paths.to_vec();
    db.connection()
        .call(move |conn| {
            let mut sql = String::from(
                "SELECT id, path, hash, text FROM chunks
                 WHERE (embedding IS NULL OR model != ?1)",
            );
            if !paths.is_empty() {
                sql.push_str(&format!(" AND path IN ({})", placeholders(2, paths.len())));
            }
            sql.push_str(" ORDER BY path, start_line, id");

            let mut args: Vec<rusqlite::types::Value> = Vec::with_capacity(paths.len() + 1);
            args.push(model.into());
            args.extend(paths.into_iter().map(Into::into));

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(args), |row| {
                Ok(PendingChunk {
                    id: row.get(0)?,
                    path: row.get(1)?,
                    hash: row.get(2)?,
                    text: row.get(3)?,
                })
            })?;
            rows.collect()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Attach an embedding (and the model that produced it) to a chunk.
///
/// Returns `false` when the chunk no longer exists.
pub async fn set_chunk_embedding(
    db: &Database,
    id: i64,
    model: &str,
    embedding: &[f32],
) -> Result<bool, MemdexError> {
    let model = model.to_string();
    let blob = codec::encode(embedding);
    db.connection()
        .call(move |conn| {
            let updated = conn.execute(
                "UPDATE chunks SET embedding = ?2, model = ?3,
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1",
                params![id, blob, model],
            )?;
            Ok(updated > 0)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Every stored embedding produced by `model`, ordered by chunk id.
pub async fn load_embeddings(
    db: &Database,
    model: &str,
) -> Result<Vec<(i64, Vec<f32>)>, MemdexError> {
    let model = model.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, embedding FROM chunks
                 WHERE model = ?1 AND embedding IS NOT NULL
                 ORDER BY id",
            )?;
            let rows = stmt.query_map(params![model], |row| {
                let bytes: Vec<u8> = row.get(1)?;
                Ok((row.get(0)?, codec::decode_column(1, &bytes)?))
            })?;
            rows.collect()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Replace a chunk's text in place. The old embedding is dropped.
///
/// Returns `false` when the chunk does not exist.
pub async fn update_chunk_text(
    db: &Database,
    id: i64,
    text: &str,
    hash: &str,
) -> Result<bool, MemdexError> {
    let text = text.to_string();
    let hash = hash.to_string();
    db.connection()
        .call(move |conn| {
            let updated = conn.execute(
                "UPDATE chunks SET text = ?2, hash = ?3, embedding = NULL, model = '',
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1",
                params![id, text, hash],
            )?;
            Ok(updated > 0)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FileMeta, NewChunk};
    use crate::queries::files::replace_file;

    async fn seeded() -> (Database, Vec<i64>) {
        let db = Database::open_in_memory().await.unwrap();
        let file = FileMeta {
            path: "notes.md".into(),
            source: SourceKind::Memory,
            hash: "h".into(),
            size: 1,
            mtime: 1,
        };
        let chunks = ["alpha beta", "gamma delta", "epsilon"]
            .iter()
            .enumerate()
            .map(|(i, text)| NewChunk {
                start_line: i + 1,
                end_line: i + 1,
                hash: format!("c{i}"),
                text: text.to_string(),
            })
            .collect();
        let ids = replace_file(&db, file, chunks).await.unwrap().inserted;
        (db, ids)
    }

    #[tokio::test]
    async fn get_chunks_by_ids_preserves_order_and_skips_unknown() {
        let (db, ids) = seeded().await;
        let wanted = vec![ids[2], 9999, ids[0]];
        let got = get_chunks_by_ids(&db, &wanted).await.unwrap();
        let got_ids: Vec<i64> = got.iter().map(|c| c.id).collect();
        assert_eq!(got_ids, vec![ids[2], ids[0]]);
        assert!(get_chunks_by_ids(&db, &[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn embedding_round_trip_through_store() {
        let (db, ids) = seeded().await;
        assert!(
            set_chunk_embedding(&db, ids[1], "m1", &[0.1, 0.2, 0.3])
                .await
                .unwrap()
        );
        let chunk = get_chunk(&db, ids[1]).await.unwrap().unwrap();
        assert_eq!(chunk.model, "m1");
        assert_eq!(chunk.embedding, Some(vec![0.1, 0.2, 0.3]));

        let loaded = load_embeddings(&db, "m1").await.unwrap();
        assert_eq!(loaded, vec![(ids[1], vec![0.1, 0.2, 0.3])]);
        assert!(load_embeddings(&db, "other").await.unwrap().is_empty());
        assert!(!set_chunk_embedding(&db, 9999, "m1", &[1.0]).await.unwrap());
    }

    #[tokio::test]
    async fn missing_embedding_tracks_model() {
        let (db, ids) = seeded().await;
        set_chunk_embedding(&db, ids[0], "m1", &[1.0]).await.unwrap();

        let pending = chunks_missing_embedding(&db, "m1", &[]).await.unwrap();
        let pending_ids: Vec<i64> = pending.iter().map(|p| p.id).collect();
        assert_eq!(pending_ids, vec![ids[1], ids[2]]);

        // A different model needs everything re-embedded.
        assert_eq!(
            chunks_missing_embedding(&db, "m2", &[]).await.unwrap().len(),
            3
        );
        assert!(
            chunks_missing_embedding(&db, "m1", &["elsewhere.md".to_string()])
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn update_chunk_text_drops_embedding() {
        let (db, ids) = seeded().await;
        set_chunk_embedding(&db, ids[0], "m1", &[1.0]).await.unwrap();
        assert!(update_chunk_text(&db, ids[0], "rewritten", "h2").await.unwrap());

        let chunk = get_chunk(&db, ids[0]).await.unwrap().unwrap();
        assert_eq!(chunk.text, "rewritten");
        assert_eq!(chunk.hash, "h2");
        assert!(chunk.embedding.is_none());
        assert!(chunk.model.is_empty());
    }

    #[tokio::test]
    async fn corrupt_blob_is_a_storage_error() {
        let (db, ids) = seeded().await;
        let id = ids[0];
        db.connection()
            .call(move |conn| {
                conn.execute(
                    "UPDATE chunks SET embedding = x'000102', model = 'm1' WHERE id = ?1",
                    params![id],
                )?;
                Ok(())
            })
            .await
            .map_err(crate::database::map_tr_err)
            .unwrap();

        let err = load_embeddings(&db, "m1").await.unwrap_err();
        assert!(matches!(err, MemdexError::Storage { .. }), "got {err:?}");
    }
}
