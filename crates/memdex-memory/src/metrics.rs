// SPDX-FileCopyrightText: 2026 Memdex Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metric registration and recording helpers.
//!
//! Uses the metrics-rs facade so whatever recorder the host installs
//! (Prometheus, statsd, none) collects these.

use memdex_core::SourceKind;
use metrics::{counter, describe_counter, describe_histogram, histogram};

/// Register all memdex metric descriptions.
///
/// Call once after the host installs its recorder.
pub fn register_metrics() {
    describe_counter!(
        "memdex_embeddings_generated_total",
        "Embeddings produced by the embedding provider"
    );
    describe_counter!(
        "memdex_embedding_cache_hits_total",
        "Embeddings served from the embedding cache"
    );
    describe_counter!(
        "memdex_embedding_failures_total",
        "Texts the embedding provider failed to embed"
    );
    describe_counter!(
        "memdex_files_indexed_total",
        "Files chunked and written to the index"
    );
    describe_histogram!(
        "memdex_sync_duration_seconds",
        "Wall time of a sync run in seconds"
    );
    describe_histogram!(
        "memdex_search_duration_seconds",
        "Wall time of a hybrid search in seconds"
    );
}

pub fn record_embeddings_generated(count: u64) {
    counter!("memdex_embeddings_generated_total").increment(count);
}

pub fn record_cache_hits(count: u64) {
    counter!("memdex_embedding_cache_hits_total").increment(count);
}

pub fn record_embedding_failures(count: u64) {
    counter!("memdex_embedding_failures_total").increment(count);
}

pub fn record_file_indexed(source: SourceKind) {
    counter!("memdex_files_indexed_total", "source" => source.as_str()).increment(1);
}

pub fn record_sync_duration(seconds: f64) {
    histogram!("memdex_sync_duration_seconds").record(seconds);
}

pub fn record_search_duration(seconds: f64) {
    histogram!("memdex_search_duration_seconds").record(seconds);
}
