// SPDX-FileCopyrightText: 2026 Memdex Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The index store: typed access to files, chunks, lexical search, the
//! embedding cache, and metadata over one [`Database`].

use std::path::Path;

use memdex_core::{MemdexError, SourceKind};

use crate::database::Database;
use crate::models::{
    CachedEmbedding, ChangeStatus, ChunkRecord, FileMeta, FileRecord, FileReplacement,
    IndexStats, NewChunk, PendingChunk,
};
use crate::queries::{cache, chunks, files, fts, meta, stats};

/// Persistent store behind the memory index.
///
/// Cloning shares the underlying connection.
#[derive(Clone)]
pub struct IndexStore {
    db: Database,
}

impl IndexStore {
    /// Wrap an already-open database.
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Open the store at `path`, creating and migrating it as needed.
    pub async fn open(path: impl AsRef<Path>, wal_mode: bool) -> Result<Self, MemdexError> {
        Ok(Self::new(Database::open(path, wal_mode).await?))
    }

    /// Open a throwaway in-memory store.
    pub async fn open_in_memory() -> Result<Self, MemdexError> {
        Ok(Self::new(Database::open_in_memory().await?))
    }

    /// The underlying database handle.
    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Checkpoint and close.
    pub async fn close(self) -> Result<(), MemdexError> {
        self.db.close().await
    }

    // --- files ---

    pub async fn get_file(&self, path: &str) -> Result<Option<FileRecord>, MemdexError> {
        files::get_file(&self.db, path).await
    }

    pub async fn list_files(
        &self,
        source: Option<SourceKind>,
    ) -> Result<Vec<FileRecord>, MemdexError> {
        files::list_files(&self.db, source).await
    }

    pub async fn list_paths(&self, source: SourceKind) -> Result<Vec<String>, MemdexError> {
        files::list_paths(&self.db, source).await
    }

    /// Whether the file at `path` with content hash `hash` needs re-indexing.
    pub async fn check_change(
        &self,
        path: &str,
        hash: &str,
        size: i64,
        mtime: i64,
    ) -> Result<ChangeStatus, MemdexError> {
        files::check_change(&self.db, path, hash, size, mtime).await
    }

    /// Atomically upsert `file` and replace its chunks with `new_chunks`.
    pub async fn replace_file(
        &self,
        file: FileMeta,
        new_chunks: Vec<NewChunk>,
    ) -> Result<FileReplacement, MemdexError> {
        files::replace_file(&self.db, file, new_chunks).await
    }

    /// Delete a file with all of its chunks, returning the removed chunk ids.
    pub async fn delete_file(&self, path: &str) -> Result<Vec<i64>, MemdexError> {
        files::delete_file(&self.db, path).await
    }

    // --- chunks ---

    pub async fn get_chunk(&self, id: i64) -> Result<Option<ChunkRecord>, MemdexError> {
        chunks::get_chunk(&self.db, id).await
    }

    pub async fn get_chunks_by_ids(&self, ids: &[i64]) -> Result<Vec<ChunkRecord>, MemdexError> {
        chunks::get_chunks_by_ids(&self.db, ids).await
    }

    pub async fn chunks_for_path(&self, path: &str) -> Result<Vec<ChunkRecord>, MemdexError> {
        chunks::chunks_for_path(&self.db, path).await
    }

    pub async fn chunks_missing_embedding(
        &self,
        model: &str,
        paths: &[String],
    ) -> Result<Vec<PendingChunk>, MemdexError> {
        chunks::chunks_missing_embedding(&self.db, model, paths).await
    }

    pub async fn set_chunk_embedding(
        &self,
        id: i64,
        model: &str,
        embedding: &[f32],
    ) -> Result<bool, MemdexError> {
        chunks::set_chunk_embedding(&self.db, id, model, embedding).await
    }

    pub async fn load_embeddings(&self, model: &str) -> Result<Vec<(i64, Vec<f32>)>, MemdexError> {
        chunks::load_embeddings(&self.db, model).await
    }

    pub async fn update_chunk_text(
        &self,
        id: i64,
        text: &str,
        hash: &str,
    ) -> Result<bool, MemdexError> {
        chunks::update_chunk_text(&self.db, id, text, hash).await
    }

    // --- lexical ---

    pub async fn search_fts(
        &self,
        match_expr: &str,
        limit: usize,
        sources: &[SourceKind],
    ) -> Result<Vec<(i64, f64)>, MemdexError> {
        fts::search_fts(&self.db, match_expr, limit, sources).await
    }

    // --- embedding cache ---

    pub async fn get_cached_embedding(
        &self,
        provider: &str,
        model: &str,
        text_hash: &str,
    ) -> Result<Option<CachedEmbedding>, MemdexError> {
        cache::get_cached_embedding(&self.db, provider, model, text_hash).await
    }

    pub async fn put_cached_embedding(
        &self,
        provider: &str,
        model: &str,
        text_hash: &str,
        embedding: &[f32],
    ) -> Result<(), MemdexError> {
        cache::put_cached_embedding(&self.db, provider, model, text_hash, embedding).await
    }

    pub async fn cached_embedding_count(&self) -> Result<u64, MemdexError> {
        cache::cached_embedding_count(&self.db).await
    }

    pub async fn prune_cache(
        &self,
        keep_provider: &str,
        keep_model: &str,
    ) -> Result<usize, MemdexError> {
        cache::prune_cache(&self.db, keep_provider, keep_model).await
    }

    // --- meta & stats ---

    pub async fn get_meta(&self, key: &str) -> Result<Option<String>, MemdexError> {
        meta::get_meta(&self.db, key).await
    }

    pub async fn set_meta(&self, key: &str, value: &str) -> Result<(), MemdexError> {
        meta::set_meta(&self.db, key, value).await
    }

    pub async fn stats(&self) -> Result<IndexStats, MemdexError> {
        stats::stats(&self.db).await
    }
}
