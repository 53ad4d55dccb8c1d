// SPDX-FileCopyrightText: 2026 Memdex Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Data models for indexed files, chunks, cache entries, and store statistics.

use memdex_core::SourceKind;
use serde::{Deserialize, Serialize};

/// An indexed source document (one row per distinct path).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    pub path: String,
    pub source: SourceKind,
    /// SHA-256 hex digest of the file content at index time.
    pub hash: String,
    pub size: i64,
    /// Modification time in unix milliseconds.
    pub mtime: i64,
    pub indexed_at: String,
}

/// File metadata supplied when a file is (re)indexed.
#[derive(Debug, Clone, PartialEq)]
pub struct FileMeta {
    pub path: String,
    pub source: SourceKind,
    pub hash: String,
    pub size: i64,
    pub mtime: i64,
}

/// A chunk produced by the chunker, not yet persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewChunk {
    pub start_line: usize,
    pub end_line: usize,
    pub hash: String,
    pub text: String,
}

/// A persisted chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub id: i64,
    pub path: String,
    pub source: SourceKind,
    pub start_line: usize,
    pub end_line: usize,
    pub hash: String,
    /// Embedding model of `embedding`; empty when not embedded yet.
    pub model: String,
    pub text: String,
    pub embedding: Option<Vec<f32>>,
    pub updated_at: String,
}

/// A chunk that still needs an embedding for the active model.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingChunk {
    pub id: i64,
    pub path: String,
    pub hash: String,
    pub text: String,
}

/// Outcome of comparing a file on disk with its indexed record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeStatus {
    /// Never indexed before.
    New,
    /// Content hash matches the indexed record.
    Unchanged,
    /// Indexed before, content differs.
    Changed,
}

/// Chunk ids touched by an atomic file replacement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileReplacement {
    pub inserted: Vec<i64>,
    pub removed: Vec<i64>,
}

/// A cached embedding keyed by `(provider, model, text_hash)`.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedEmbedding {
    pub provider: String,
    pub model: String,
    pub text_hash: String,
    pub embedding: Vec<f32>,
    pub created_at: String,
}

/// File and chunk counts for one source collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceCounts {
    pub source: SourceKind,
    pub files: u64,
    pub chunks: u64,
}

/// Aggregate statistics over the whole store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexStats {
    pub total_files: u64,
    pub total_chunks: u64,
    pub embedded_chunks: u64,
    pub cached_embeddings: u64,
    pub store_size_bytes: u64,
    pub by_source: Vec<SourceCounts>,
}
