// SPDX-FileCopyrightText: 2026 Memdex Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query modules for operations on stored entities.

pub mod cache;
pub mod chunks;
pub mod files;
pub mod fts;
pub mod meta;
pub mod stats;

/// `?1, ?2, ...` placeholders for an `IN (...)` list starting at `first`.
pub(crate) fn placeholders(first: usize, count: usize) -> String {
    (first..first + count)
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ")
}
