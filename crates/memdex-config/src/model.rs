// SPDX-FileCopyrightText: 2026 Memdex Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the memdex memory index.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level memdex configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MemdexConfig {
    /// Index database settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Where memory documents and session transcripts live.
    #[serde(default)]
    pub sources: SourcesConfig,

    /// Chunker settings.
    #[serde(default)]
    pub chunking: ChunkingConfig,

    /// Hybrid search defaults.
    #[serde(default)]
    pub search: SearchConfig,

    /// Sync pipeline settings.
    #[serde(default)]
    pub sync: SyncConfig,

    /// Embedding provider settings.
    #[serde(default)]
    pub embedding: EmbeddingConfig,
}

/// Index database configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("memdex").join("index.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("index.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// Source collection configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SourcesConfig {
    /// Directories scanned (recursively) for memory documents.
    #[serde(default = "default_memory_dirs")]
    pub memory_dirs: Vec<String>,

    /// Directory holding one JSONL transcript per session.
    #[serde(default = "default_sessions_dir")]
    pub sessions_dir: String,

    /// Index session transcripts alongside memory documents.
    #[serde(default = "default_true")]
    pub include_sessions: bool,

    /// File extensions (without dot) treated as memory documents.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            memory_dirs: default_memory_dirs(),
            sessions_dir: default_sessions_dir(),
            include_sessions: true,
            extensions: default_extensions(),
        }
    }
}

fn default_memory_dirs() -> Vec<String> {
    vec!["memory".to_string()]
}

fn default_sessions_dir() -> String {
    "sessions".to_string()
}

fn default_extensions() -> Vec<String> {
    vec!["md".to_string(), "markdown".to_string(), "txt".to_string()]
}

fn default_true() -> bool {
    true
}

/// Chunker configuration. Token counts use the `cl100k_base` encoding.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ChunkingConfig {
    /// Upper bound on tokens per chunk.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,

    /// Tokens of trailing context repeated at the start of the next chunk.
    #[serde(default = "default_overlap_tokens")]
    pub overlap_tokens: usize,

    /// Chunks smaller than this are merged into their successor when possible.
    #[serde(default = "default_min_tokens")]
    pub min_tokens: usize,

    /// Split markdown documents on headings before token splitting.
    #[serde(default = "default_true")]
    pub markdown_aware: bool,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            overlap_tokens: default_overlap_tokens(),
            min_tokens: default_min_tokens(),
            markdown_aware: true,
        }
    }
}

fn default_max_tokens() -> usize {
    512
}

fn default_overlap_tokens() -> usize {
    50
}

fn default_min_tokens() -> usize {
    32
}

/// Hybrid search defaults. Callers may override per query.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SearchConfig {
    /// Maximum number of results returned.
    #[serde(default = "default_max_results")]
    pub max_results: usize,

    /// Minimum fused score (0.0-1.0) for a result to be returned.
    #[serde(default = "default_min_score")]
    pub min_score: f32,

    /// Weight of the cosine-similarity ranking.
    #[serde(default = "default_vector_weight")]
    pub vector_weight: f32,

    /// Weight of the BM25 ranking.
    #[serde(default = "default_text_weight")]
    pub text_weight: f32,

    /// Character budget for returned snippets.
    #[serde(default = "default_snippet_max_chars")]
    pub snippet_max_chars: usize,

    /// Score assumed for a ranking that did not return a chunk at all.
    #[serde(default)]
    pub missing_score: f32,

    /// Return chunks from memory documents.
    #[serde(default = "default_true")]
    pub include_memory: bool,

    /// Return chunks from session transcripts.
    #[serde(default = "default_true")]
    pub include_sessions: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_results: default_max_results(),
            min_score: default_min_score(),
            vector_weight: default_vector_weight(),
            text_weight: default_text_weight(),
            snippet_max_chars: default_snippet_max_chars(),
            missing_score: 0.0,
            include_memory: true,
            include_sessions: true,
        }
    }
}

fn default_max_results() -> usize {
    6
}

fn default_min_score() -> f32 {
    0.35
}

fn default_vector_weight() -> f32 {
    0.7
}

fn default_text_weight() -> f32 {
    0.3
}

fn default_snippet_max_chars() -> usize {
    700
}

/// Sync pipeline configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SyncConfig {
    /// Fraction of changed chunks above which the vector index is dropped
    /// and reloaded instead of patched.
    #[serde(default = "default_full_reload_fraction")]
    pub full_reload_fraction: f64,

    /// Texts per embedding provider call.
    #[serde(default = "default_embedding_batch_size")]
    pub embedding_batch_size: usize,

    /// Watch source directories and mark the index dirty on change.
    #[serde(default)]
    pub watch: bool,

    /// Debounce window for filesystem events.
    #[serde(default = "default_watch_debounce_ms")]
    pub watch_debounce_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            full_reload_fraction: default_full_reload_fraction(),
            embedding_batch_size: default_embedding_batch_size(),
            watch: false,
            watch_debounce_ms: default_watch_debounce_ms(),
        }
    }
}

fn default_full_reload_fraction() -> f64 {
    0.5
}

fn default_embedding_batch_size() -> usize {
    16
}

fn default_watch_debounce_ms() -> u64 {
    1500
}

/// Embedding provider configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EmbeddingConfig {
    /// Provider identifier (part of the embedding cache key).
    #[serde(default = "default_embedding_provider")]
    pub provider: String,

    /// Embedding model name.
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Dimensionality of the model's vectors.
    #[serde(default = "default_embedding_dimensions")]
    pub dimensions: usize,

    /// Base URL of an OpenAI-compatible API.
    #[serde(default = "default_embedding_base_url")]
    pub base_url: String,

    /// API key. `None` falls back to the `OPENAI_API_KEY` environment variable.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Request timeout in seconds.
    #[serde(default = "default_embedding_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: default_embedding_model(),
            dimensions: default_embedding_dimensions(),
            base_url: default_embedding_base_url(),
            api_key: None,
            timeout_secs: default_embedding_timeout_secs(),
        }
    }
}

fn default_embedding_provider() -> String {
    "openai".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_embedding_dimensions() -> usize {
    1536
}

fn default_embedding_base_url() -> String {
    "https://api.openai.com".to_string()
}

fn default_embedding_timeout_secs() -> u64 {
    60
}
