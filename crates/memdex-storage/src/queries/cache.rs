// SPDX-FileCopyrightText: 2026 Memdex Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedding cache keyed by `(provider, model, text_hash)`.
//!
//! Entries are immutable: writing a key twice is a constraint violation.

use memdex_core::MemdexError;
use rusqlite::{OptionalExtension, params};

use crate::codec;
use crate::database::Database;
use crate::models::CachedEmbedding;

/// Look up a cached embedding.
pub async fn get_cached_embedding(
    db: &Database,
    provider: &str,
    model: &str,
    text_hash: &str,
) -> Result<Option<CachedEmbedding>, MemdexError> {
    let provider = provider.to_string();
    let model = model.to_string();
    let text_hash = text_hash.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT provider, model, text_hash, embedding, created_at FROM embedding_cache
                 WHERE provider = ?1 AND model = ?2 AND text_hash = ?3",
                params![provider, model, text_hash],
                |row| {
                    let bytes: Vec<u8> = row.get(3)?;
                    Ok(CachedEmbedding {
                        provider: row.get(0)?,
                        model: row.get(1)?,
                        text_hash: row.get(2)?,
                        embedding: codec::decode_column(3, &bytes)?,
                        created_at: row.get(4)?,
                    })
                },
            )
            .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Insert a new cache entry. A duplicate key fails with `ConstraintViolation`.
pub async fn put_cached_embedding(
    db: &Database,
    provider: &str,
    model: &str,
    text_hash: &str,
    embedding: &[f32],
) -> Result<(), MemdexError> {
    let provider = provider.to_string();
    let model = model.to_string();
    let text_hash = text_hash.to_string();
    let dims = embedding.len() as i64;
    let blob = codec::encode(embedding);
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO embedding_cache (provider, model, text_hash, embedding, dims)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![provider, model, text_hash, blob, dims],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Number of cached embeddings.
pub async fn cached_embedding_count(db: &Database) -> Result<u64, MemdexError> {
    db.connection()
        .call(|conn| {
            let count: i64 =
                conn.query_row("SELECT COUNT(*) FROM embedding_cache", [], |row| row.get(0))?;
            Ok(count as u64)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Drop every entry not produced by `(keep_provider, keep_model)`.
///
/// Returns the number of deleted entries.
pub async fn prune_cache(
    db: &Database,
    keep_provider: &str,
    keep_model: &str,
) -> Result<usize, MemdexError> {
    let provider = keep_provider.to_string();
    let model = keep_model.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "DELETE FROM embedding_cache WHERE provider != ?1 OR model != ?2",
                params![provider, model],
            )
        })
        .await
        .map_err(crate::database::map_tr_err)
}
