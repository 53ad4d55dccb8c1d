// SPDX-FileCopyrightText: 2026 Memdex Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Key/value index metadata.

use memdex_core::MemdexError;
use rusqlite::{OptionalExtension, params};

use crate::database::Database;

pub const LAST_SYNC_AT: &str = "last_sync_at";
pub const EMBEDDING_PROVIDER: &str = "embedding_provider";
pub const EMBEDDING_MODEL: &str = "embedding_model";
pub const EMBEDDING_DIMS: &str = "embedding_dims";
pub const SCHEMA_VERSION: &str = "schema_version";

/// Read a metadata value.
pub async fn get_meta(db: &Database, key: &str) -> Result<Option<String>, MemdexError> {
    let key = key.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT value FROM meta WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Insert or overwrite a metadata value.
pub async fn set_meta(db: &Database, key: &str, value: &str) -> Result<(), MemdexError> {
    let key = key.to_string();
    let value = value.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO meta (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![key, value],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_meta_upserts() {
        let db = Database::open_in_memory().await.unwrap();
        assert_eq!(get_meta(&db, LAST_SYNC_AT).await.unwrap(), None);
        set_meta(&db, LAST_SYNC_AT, "2026-01-01T00:00:00Z").await.unwrap();
        set_meta(&db, LAST_SYNC_AT, "2026-02-01T00:00:00Z").await.unwrap();
        assert_eq!(
            get_meta(&db, LAST_SYNC_AT).await.unwrap().as_deref(),
            Some("2026-02-01T00:00:00Z")
        );
    }

    #[tokio::test]
    async fn schema_version_is_seeded() {
        let db = Database::open_in_memory().await.unwrap();
        assert_eq!(
            get_meta(&db, SCHEMA_VERSION).await.unwrap().as_deref(),
            Some("1")
        );
    }
}
