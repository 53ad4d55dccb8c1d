// SPDX-FileCopyrightText: 2026 Memdex Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for the memdex memory index.
//!
//! Provides WAL-mode SQLite storage with embedded migrations, a single-writer
//! concurrency model via `tokio-rusqlite`, and typed operations for indexed
//! files, chunks, the FTS5 lexical index, the embedding cache, and index
//! metadata. [`IndexStore`] is the entry point the retrieval and sync layers use.

pub(crate) mod codec;
pub mod database;
pub mod migrations;
pub mod models;
pub mod queries;
pub mod store;

pub use database::Database;
pub use models::*;
pub use store::IndexStore;
