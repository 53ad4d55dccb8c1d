// SPDX-FileCopyrightText: 2026 Memdex Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chunking, retrieval, and synchronization for the memdex memory index.
//!
//! ## Architecture
//!
//! - **Chunker**: token-bounded, markdown-aware splitting with line overlap
//! - **VectorIndex**: lazily loaded in-memory cosine index over chunk embeddings
//! - **LexicalSearch**: FTS5/BM25 keyword search
//! - **HybridRetriever**: weighted fusion of both rankings with snippets
//! - **SyncPipeline**: incremental hash-based re-indexing with an embedding cache
//! - **TranscriptStore**: JSONL session transcripts indexed as a second source
//! - **OpenAiEmbedder**: client for OpenAI-compatible embedding endpoints
//! - **SourceWatcher**: marks the index dirty when source files change

pub mod chunker;
pub mod embedder;
pub mod lexical;
pub mod markdown;
pub mod metrics;
pub mod retriever;
pub mod sync;
pub mod tokenizer;
pub mod transcript;
pub mod vector;
pub mod watcher;

pub use chunker::{Chunker, TextChunk};
pub use embedder::OpenAiEmbedder;
pub use lexical::LexicalSearch;
pub use retriever::{HybridRetriever, SearchOptions, SearchResult};
pub use sync::{
    EmbeddingFailure, SyncOptions, SyncPhase, SyncPipeline, SyncProgress, SyncReport,
};
pub use tokenizer::Tokenizer;
pub use transcript::{ToolCall, TranscriptEntry, TranscriptStore};
pub use vector::VectorIndex;
pub use watcher::{SourceWatcher, spawn_watcher};
