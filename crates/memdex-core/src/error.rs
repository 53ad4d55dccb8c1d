// SPDX-FileCopyrightText: 2026 Memdex Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the memdex memory index.

use thiserror::Error;

/// The primary error type used across all memdex crates.
#[derive(Debug, Error)]
pub enum MemdexError {
    /// Configuration errors (invalid TOML, missing provider credentials or endpoint).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, corrupt rows).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A uniqueness invariant was violated (duplicate path or cache key).
    ///
    /// The write that triggered it was rolled back.
    #[error("constraint violation: {message}")]
    ConstraintViolation { message: String },

    /// Embedding provider errors (quota, network, malformed response).
    #[error("provider error: {message}")]
    Provider {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Two vectors that must share a dimensionality did not.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// A file, session, or chunk does not exist.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// The operation was cancelled before it completed.
    #[error("operation cancelled")]
    Cancelled,

    /// Filesystem errors while reading sources or transcripts.
    #[error("io error at {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl MemdexError {
    /// Builds a provider error from a message and an underlying cause.
    pub fn provider(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        MemdexError::Provider {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Builds an IO error tagged with the path it happened on.
    pub fn io(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        MemdexError::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }

    /// Whether retrying the same operation later might succeed.
    ///
    /// Only provider failures are retryable; everything else points at local
    /// state that a retry will not change.
    pub fn is_retryable(&self) -> bool {
        matches!(self, MemdexError::Provider { .. })
    }
}
