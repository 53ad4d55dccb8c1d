// SPDX-FileCopyrightText: 2026 Memdex Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for memdex integration tests.
//!
//! Provides a deterministic embedding provider and throwaway workspaces so
//! tests run fast and offline.
//!
//! # Components
//!
//! - [`MockEmbedder`] - keyword-bag embeddings with call counting and failure injection
//! - [`TestWorkspace`] - temp directory laid out with memory and sessions folders

pub mod mock_embedder;
pub mod workspace;

pub use mock_embedder::MockEmbedder;
pub use workspace::TestWorkspace;
