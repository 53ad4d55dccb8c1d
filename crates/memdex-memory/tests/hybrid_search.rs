// SPDX-FileCopyrightText: 2026 Memdex Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HybridRetriever against a real store populated by the sync pipeline.

use std::sync::Arc;

use memdex_config::{ChunkingConfig, SourcesConfig, SyncConfig};
use memdex_core::{EmbeddingProvider, MemdexError};
use memdex_memory::{Chunker, HybridRetriever, SearchOptions, SyncOptions, SyncPipeline, VectorIndex};
use memdex_storage::IndexStore;
use memdex_test_utils::{MockEmbedder, TestWorkspace};
use tokio_util::sync::CancellationToken;

struct Harness {
    _ws: TestWorkspace,
    store: IndexStore,
    embedder: Arc<MockEmbedder>,
    retriever: HybridRetriever,
    vectors: Arc<VectorIndex>,
}

async fn harness(files: &[(&str, &str)], embedder: MockEmbedder) -> Harness {
    let ws = TestWorkspace::new();
    for (name, text) in files {
        ws.write_memory(name, text);
    }
    let store = IndexStore::open_in_memory().await.unwrap();
    let embedder = Arc::new(embedder);
    let vectors = Arc::new(VectorIndex::new(store.clone(), embedder.model_name()));
    let pipeline = SyncPipeline::new(
        ws.root(),
        store.clone(),
        Arc::new(Chunker::new(ChunkingConfig::default()).unwrap()),
        embedder.clone(),
        vectors.clone(),
        SourcesConfig::default(),
        SyncConfig::default(),
    );
    pipeline
        .run(&SyncOptions::default(), &CancellationToken::new())
        .await
        .unwrap();

    let retriever = HybridRetriever::new(store.clone(), vectors.clone(), embedder.clone());
    Harness {
        _ws: ws,
        store,
        embedder,
        retriever,
        vectors,
    }
}

fn relaxed() -> SearchOptions {
    SearchOptions {
        min_score: 0.0,
        ..SearchOptions::default()
    }
}

#[tokio::test]
async fn search_loads_vectors_lazily_and_caches_query_embedding() {
    let h = harness(
        &[
            ("a.md", "postgres backups run nightly"),
            ("b.md", "the cat sleeps all day"),
        ],
        MockEmbedder::new(32),
    )
    .await;
    assert!(!h.vectors.is_loaded().await);

    let cancel = CancellationToken::new();
    let hits = h.retriever.search("postgres backups", &relaxed(), &cancel).await.unwrap();
    assert_eq!(hits[0].path, "memory/a.md");
    assert!(h.vectors.is_loaded().await);

    let calls = h.embedder.calls();
    h.retriever.search("postgres backups", &relaxed(), &cancel).await.unwrap();
    assert_eq!(h.embedder.calls(), calls, "query embedding should come from cache");
    assert!(h.store.cached_embedding_count().await.unwrap() >= 3);
}

#[tokio::test]
async fn blank_query_returns_nothing() {
    let h = harness(&[("a.md", "anything")], MockEmbedder::new(8)).await;
    let hits = h
        .retriever
        .search("   ", &relaxed(), &CancellationToken::new())
        .await
        .unwrap();
    assert!(hits.is_empty());
}

#[tokio::test]
async fn cancelled_search_returns_cancelled() {
    let h = harness(&[("a.md", "anything")], MockEmbedder::new(8)).await;
    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = h
        .retriever
        .search("anything else", &relaxed(), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, MemdexError::Cancelled));
}

#[tokio::test]
async fn dimension_mismatch_falls_back_to_keywords() {
    let h = harness(
        &[("a.md", "kestrel migration plan")],
        MockEmbedder::new(8).with_override("kestrel?", vec![1.0, 0.0]),
    )
    .await;
    let hits = h
        .retriever
        .search("kestrel?", &relaxed(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].vector_score, None);
    assert_eq!(hits[0].text_score, Some(1.0));
}

#[tokio::test]
async fn snippets_respect_budget() {
    let long = "word ".repeat(400);
    let h = harness(&[("long.md", &long)], MockEmbedder::new(8)).await;
    let options = SearchOptions {
        snippet_max_chars: 100,
        ..relaxed()
    };
    let hits = h
        .retriever
        .search("word", &options, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert!(hits[0].snippet.chars().count() <= 101);
    assert!(hits[0].snippet.ends_with('…'));
}

#[tokio::test]
async fn results_are_bounded_and_sorted() {
    let files: Vec<(String, String)> = (0..12)
        .map(|i| (format!("n{i}.md"), format!("shared topic note {i}")))
        .collect();
    let refs: Vec<(&str, &str)> = files.iter().map(|(a, b)| (a.as_str(), b.as_str())).collect();
    let h = harness(&refs, MockEmbedder::new(32)).await;

    let options = SearchOptions {
        max_results: 4,
        ..relaxed()
    };
    let hits = h
        .retriever
        .search("shared topic", &options, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(hits.len(), 4);
    assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
}
