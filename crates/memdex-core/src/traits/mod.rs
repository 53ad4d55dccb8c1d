// SPDX-FileCopyrightText: 2026 Memdex Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trait seams between the index and its external capabilities.

pub mod embedding;

pub use embedding::EmbeddingProvider;
