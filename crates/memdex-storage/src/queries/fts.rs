// SPDX-FileCopyrightText: 2026 Memdex Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! FTS5 lexical search over chunk text.

use memdex_core::{MemdexError, SourceKind};
use rusqlite::params_from_iter;
use rusqlite::types::Value;

use crate::database::Database;
use crate::queries::placeholders;

/// Run an FTS5 `MATCH` and return `(chunk_id, bm25)` pairs, best first.
///
/// SQLite's bm25 is cost-like: lower (more negative) means more relevant.
/// `sources` restricts the hits when non-empty. `match_expr` is passed to FTS5
/// verbatim, so callers must hand in an already-escaped expression.
pub async fn search_fts(
    db: &Database,
    match_expr: &str,
    limit: usize,
    sources: &[SourceKind],
) -> Result<Vec<(i64, f64)>, MemdexError> {
    if match_expr.trim().is_empty() || limit == 0 {
        return Ok(Vec::new());
    }

    let mut args: Vec<Value> = vec![Value::from(match_expr.to_string())];
    let mut sql = String::from(
        "SELECT c.id, bm25(chunks_fts) AS rank
         FROM chunks_fts
         JOIN chunks c ON c.id = chunks_fts.rowid
         WHERE chunks_fts MATCH ?1",
    );
    if !sources.is_empty() {
        sql.push_str(&format!(
            " AND c.source IN ({})",
            placeholders(2, sources.len())
        ));
        args.extend(sources.iter().map(|s| Value::from(s.as_str().to_string())));
    }
    sql.push_str(&format!(" ORDER BY rank, c.id LIMIT ?{}", args.len() + 1));
    args.push(Value::from(limit as i64));

    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(args), |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, f64>(1)?))
            })?;
            rows.collect()
        })
        .await
        .map_err(crate::database::map_tr_err)
}
