// SPDX-FileCopyrightText: 2026 Memdex Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the memdex memory index.
//!
//! This crate provides the error type, the source-kind enum shared by the
//! storage and retrieval layers, and the [`EmbeddingProvider`] trait through
//! which the index consumes an external embedding capability.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::MemdexError;
pub use traits::EmbeddingProvider;
pub use types::{HealthStatus, SourceKind};
