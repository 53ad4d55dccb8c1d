// SPDX-FileCopyrightText: 2026 Memdex Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Index status snapshot.
//!
//! Building a status only reads from the store; it never triggers a sync or
//! loads the vector index.

use memdex_storage::SourceCounts;
use serde::Serialize;

/// Point-in-time description of a memory index.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexStatus {
    pub root: String,
    pub database_path: String,
    pub total_files: u64,
    pub total_chunks: u64,
    pub embedded_chunks: u64,
    /// Source files changed since the last sync (or no sync ran yet).
    pub dirty: bool,
    pub last_sync_at: Option<String>,
    pub provider: String,
    pub model: String,
    pub dimensions: usize,
    /// Model recorded by the last sync, when it differs from the active one.
    pub previous_model: Option<String>,
    pub cached_embeddings: u64,
    pub store_size_bytes: u64,
    pub by_source: Vec<SourceCounts>,
    pub vector_loaded: bool,
    pub vector_entries: usize,
    pub watching: bool,
}

impl IndexStatus {
    /// Multi-line human-readable summary.
    pub fn summary(&self) -> String {
        let mut lines = vec![
            format!("root:        {}", self.root),
            format!("database:    {} ({})", self.database_path, format_bytes(self.store_size_bytes)),
            format!(
                "files:       {} ({} chunks, {} embedded)",
                self.total_files, self.total_chunks, self.embedded_chunks
            ),
        ];
        for counts in &self.by_source {
            lines.push(format!(
                "  {:<10} {} files, {} chunks",
                counts.source, counts.files, counts.chunks
            ));
        }
        lines.push(format!(
            "embedding:   {}/{} ({} dims, {} cached)",
            self.provider, self.model, self.dimensions, self.cached_embeddings
        ));
        if let Some(previous) = &self.previous_model {
            lines.push(format!("  last synced with {previous}, re-embedding on next sync"));
        }
        lines.push(format!(
            "last sync:   {}{}",
            self.last_sync_at.as_deref().unwrap_or("never"),
            if self.dirty { " (dirty)" } else { "" }
        ));
        lines.push(format!(
            "vectors:     {}",
            if self.vector_loaded {
                format!("{} loaded", self.vector_entries)
            } else {
                "not loaded".to_string()
            }
        ));
        lines.join("\n")
    }
}

/// Format a byte count with a binary unit.
fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}
