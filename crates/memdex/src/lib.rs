// SPDX-FileCopyrightText: 2026 Memdex Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! memdex: a long-term memory index over markdown notes and conversation
//! transcripts.
//!
//! [`MemoryIndex`] owns one memory root: it keeps a SQLite index in sync with
//! the files under the root and answers queries by fusing vector similarity
//! with BM25 keyword ranking.
//!
//! ```no_run
//! use std::sync::Arc;
//! use memdex::{MemoryIndex, OpenAiEmbedder};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> Result<(), memdex::MemdexError> {
//! let config = memdex_config::load_config_from_path("memdex.toml".as_ref())
//!     .map_err(|e| memdex::MemdexError::Config(e.to_string()))?;
//! let embedder = Arc::new(OpenAiEmbedder::from_config(&config.embedding)?);
//! let index = MemoryIndex::open("/srv/agent", config, embedder).await?;
//!
//! let cancel = CancellationToken::new();
//! index.sync(&Default::default(), &cancel).await?;
//! for hit in index.search("deploy checklist", &cancel).await {
//!     println!("{}:{}-{} {:.2}", hit.path, hit.start_line, hit.end_line, hit.score);
//! }
//! # Ok(())
//! # }
//! ```

pub mod manager;
pub mod status;
pub mod telemetry;

pub use manager::MemoryIndex;
pub use status::IndexStatus;

pub use memdex_config::MemdexConfig;
pub use memdex_core::{EmbeddingProvider, HealthStatus, MemdexError, SourceKind};
pub use memdex_memory::{
    OpenAiEmbedder, SearchOptions, SearchResult, SyncOptions, SyncPhase, SyncProgress, SyncReport,
    ToolCall, TranscriptEntry,
};
pub use memdex_storage::ChunkRecord;
