// SPDX-FileCopyrightText: 2026 Memdex Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The memory index facade tying storage, sync, and retrieval together.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use memdex_config::MemdexConfig;
use memdex_config::validation::validate_config;
use memdex_core::{EmbeddingProvider, MemdexError};
use memdex_memory::metrics::register_metrics;
use memdex_memory::{
    Chunker, HybridRetriever, SearchOptions, SearchResult, SourceWatcher, SyncOptions,
    SyncPipeline, SyncReport, TranscriptEntry, TranscriptStore, VectorIndex, spawn_watcher,
};
use memdex_storage::queries::meta;
use memdex_storage::{ChunkRecord, IndexStore};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::status::IndexStatus;

/// A hybrid memory index over one memory root.
///
/// Syncs are serialized: a caller arriving while a sync runs waits for it to
/// finish and then runs its own. Searches never wait for syncs beyond the
/// vector index lock.
pub struct MemoryIndex {
    root: PathBuf,
    database_path: PathBuf,
    config: MemdexConfig,
    store: IndexStore,
    embedder: Arc<dyn EmbeddingProvider>,
    vectors: Arc<VectorIndex>,
    retriever: HybridRetriever,
    pipeline: SyncPipeline,
    transcripts: TranscriptStore,
    sync_lock: Mutex<()>,
    dirty: Arc<AtomicBool>,
    watcher: std::sync::Mutex<Option<SourceWatcher>>,
}

impl MemoryIndex {
    /// Open (or create) the index for `root`.
    ///
    /// Relative paths in `config` resolve against `root`. The index starts
    /// dirty when it has never been synced.
    pub async fn open(
        root: impl Into<PathBuf>,
        config: MemdexConfig,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self, MemdexError> {
        let root = root.into();
        validate_config(&config).map_err(|errors| {
            MemdexError::Config(
                errors
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("; "),
            )
        })?;
        register_metrics();

        let database_path = resolve(&root, &config.storage.database_path);
        let store = IndexStore::open(&database_path, config.storage.wal_mode).await?;
        let chunker = Arc::new(Chunker::new(config.chunking.clone())?);
        let vectors = Arc::new(VectorIndex::new(store.clone(), embedder.model_name()));
        let retriever = HybridRetriever::new(store.clone(), vectors.clone(), embedder.clone());
        let pipeline = SyncPipeline::new(
            root.clone(),
            store.clone(),
            chunker,
            embedder.clone(),
            vectors.clone(),
            config.sources.clone(),
            config.sync.clone(),
        );
        let transcripts = TranscriptStore::new(resolve(&root, &config.sources.sessions_dir));

        let last_sync = store.get_meta(meta::LAST_SYNC_AT).await?;
        if let Some(previous) = store.get_meta(meta::EMBEDDING_MODEL).await?
            && previous != embedder.model_name()
        {
            info!(
                previous = %previous,
                active = embedder.model_name(),
                "embedding model changed, chunks will be re-embedded on next sync"
            );
        }

        let index = Self {
            dirty: Arc::new(AtomicBool::new(last_sync.is_none())),
            root,
            database_path,
            store,
            embedder,
            vectors,
            retriever,
            pipeline,
            transcripts,
            sync_lock: Mutex::new(()),
            watcher: std::sync::Mutex::new(None),
            config,
        };
        if index.config.sync.watch {
            index.start_watching()?;
        }

        info!(
            root = %index.root.display(),
            database = %index.database_path.display(),
            model = index.embedder.model_name(),
            "memory index opened"
        );
        Ok(index)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &MemdexConfig {
        &self.config
    }

    pub fn store(&self) -> &IndexStore {
        &self.store
    }

    pub fn transcripts(&self) -> &TranscriptStore {
        &self.transcripts
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }

    /// Flag the index as out of date with its sources.
    pub fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::SeqCst);
    }

    /// Bring the index up to date with the files under the root.
    pub async fn sync(
        &self,
        options: &SyncOptions,
        cancel: &CancellationToken,
    ) -> Result<SyncReport, MemdexError> {
        let _guard = self.sync_lock.lock().await;
        // Changes arriving during the run must survive it.
        self.dirty.store(false, Ordering::SeqCst);
        match self.pipeline.run(options, cancel).await {
            Ok(report) => Ok(report),
            Err(e) => {
                self.mark_dirty();
                Err(e)
            }
        }
    }

    /// Sync only when something changed since the last sync.
    pub async fn sync_if_dirty(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Option<SyncReport>, MemdexError> {
        if !self.is_dirty() {
            debug!("index clean, skipping sync");
            return Ok(None);
        }
        self.sync(&SyncOptions::default(), cancel).await.map(Some)
    }

    /// Search with the configured options.
    pub async fn search(&self, query: &str, cancel: &CancellationToken) -> Vec<SearchResult> {
        let options = SearchOptions::from(&self.config.search);
        self.search_with(query, &options, cancel).await
    }

    /// Search with explicit options.
    ///
    /// Failures are logged and yield no results.
    pub async fn search_with(
        &self,
        query: &str,
        options: &SearchOptions,
        cancel: &CancellationToken,
    ) -> Vec<SearchResult> {
        match self.retriever.search(query, options, cancel).await {
            Ok(results) => results,
            Err(MemdexError::Cancelled) => {
                debug!("search cancelled");
                Vec::new()
            }
            Err(e) => {
                warn!(error = %e, "memory search failed");
                Vec::new()
            }
        }
    }

    pub async fn get_chunk(&self, id: i64) -> Result<Option<ChunkRecord>, MemdexError> {
        self.store.get_chunk(id).await
    }

    /// Append a message to a session transcript and mark the index dirty.
    pub async fn append_transcript(
        &self,
        session_key: &str,
        entry: &TranscriptEntry,
    ) -> Result<(), MemdexError> {
        self.transcripts.append(session_key, entry).await?;
        if self.config.sources.include_sessions {
            self.mark_dirty();
        }
        Ok(())
    }

    pub async fn status(&self) -> Result<IndexStatus, MemdexError> {
        let stats = self.store.stats().await?;
        let last_sync_at = self.store.get_meta(meta::LAST_SYNC_AT).await?;
        let previous_model = self
            .store
            .get_meta(meta::EMBEDDING_MODEL)
            .await?
            .filter(|m| m != self.embedder.model_name());

        Ok(IndexStatus {
            root: self.root.display().to_string(),
            database_path: self.database_path.display().to_string(),
            total_files: stats.total_files,
            total_chunks: stats.total_chunks,
            embedded_chunks: stats.embedded_chunks,
            dirty: self.is_dirty(),
            last_sync_at,
            provider: self.embedder.provider_name().to_string(),
            model: self.embedder.model_name().to_string(),
            dimensions: self.embedder.dimensions(),
            previous_model,
            cached_embeddings: stats.cached_embeddings,
            store_size_bytes: stats.store_size_bytes,
            by_source: stats.by_source,
            vector_loaded: self.vectors.is_loaded().await,
            vector_entries: self.vectors.len().await,
            watching: self.is_watching(),
        })
    }

    /// Start marking the index dirty on source file changes.
    ///
    /// Calling it while already watching is a no-op.
    pub fn start_watching(&self) -> Result<(), MemdexError> {
        let mut slot = self
            .watcher
            .lock()
            .map_err(|_| MemdexError::Internal("watcher lock poisoned".into()))?;
        if slot.is_some() {
            return Ok(());
        }
        let watcher = spawn_watcher(
            &self.pipeline.source_dirs(),
            Duration::from_millis(self.config.sync.watch_debounce_ms),
            self.dirty.clone(),
        )?;
        *slot = Some(watcher);
        Ok(())
    }

    pub fn stop_watching(&self) {
        if let Ok(mut slot) = self.watcher.lock() {
            slot.take();
        }
    }

    pub fn is_watching(&self) -> bool {
        self.watcher.lock().map(|w| w.is_some()).unwrap_or(false)
    }

    /// Stop watching and close the store after a WAL checkpoint.
    pub async fn close(self) -> Result<(), MemdexError> {
        self.stop_watching();
        self.store.close().await
    }
}

fn resolve(root: &Path, path: &str) -> PathBuf {
    let path = Path::new(path);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memdex_test_utils::{MockEmbedder, TestWorkspace};
    use tracing_test::traced_test;

    async fn open(ws: &TestWorkspace) -> MemoryIndex {
        MemoryIndex::open(ws.root(), ws.config(), Arc::new(MockEmbedder::new(16)))
            .await
            .unwrap()
    }

    #[test]
    fn relative_paths_resolve_against_root() {
        assert_eq!(
            resolve(Path::new("/srv/a"), "index.db"),
            PathBuf::from("/srv/a/index.db")
        );
        assert_eq!(
            resolve(Path::new("/srv/a"), "/var/lib/memdex.db"),
            PathBuf::from("/var/lib/memdex.db")
        );
    }

    #[tokio::test]
    async fn invalid_config_is_rejected() {
        let ws = TestWorkspace::new();
        let mut config = ws.config();
        config.chunking.overlap_tokens = config.chunking.max_tokens;
        let err = MemoryIndex::open(ws.root(), config, Arc::new(MockEmbedder::new(4)))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, MemdexError::Config(m) if m.contains("overlap_tokens")));
    }

    #[tokio::test]
    async fn new_index_starts_dirty_and_sync_clears_it() {
        let ws = TestWorkspace::new();
        ws.write_memory("a.md", "alpha\n");
        let index = open(&ws).await;
        assert!(index.is_dirty());

        let cancel = CancellationToken::new();
        assert!(index.sync_if_dirty(&cancel).await.unwrap().is_some());
        assert!(!index.is_dirty());
        assert!(index.sync_if_dirty(&cancel).await.unwrap().is_none());

        index.mark_dirty();
        assert!(index.is_dirty());
    }

    #[tokio::test]
    async fn reopened_index_is_clean() {
        let ws = TestWorkspace::new();
        ws.write_memory("a.md", "alpha\n");
        let index = open(&ws).await;
        index
            .sync(&SyncOptions::default(), &CancellationToken::new())
            .await
            .unwrap();
        index.close().await.unwrap();

        let index = open(&ws).await;
        assert!(!index.is_dirty());
        let status = index.status().await.unwrap();
        assert_eq!(status.total_files, 1);
        assert!(status.last_sync_at.is_some());
    }

    #[tokio::test]
    async fn cancelled_sync_leaves_index_dirty() {
        let ws = TestWorkspace::new();
        ws.write_memory("a.md", "alpha\n");
        let index = open(&ws).await;
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(index.sync(&SyncOptions::default(), &cancel).await.is_err());
        assert!(index.is_dirty());
    }

    #[tokio::test]
    async fn appending_transcripts_marks_dirty() {
        let ws = TestWorkspace::new();
        let index = open(&ws).await;
        index
            .sync(&SyncOptions::default(), &CancellationToken::new())
            .await
            .unwrap();
        assert!(!index.is_dirty());

        index
            .append_transcript("chat", &TranscriptEntry::new("user", "hello"))
            .await
            .unwrap();
        assert!(index.is_dirty());
        assert_eq!(index.transcripts().load("chat").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn status_does_not_load_vectors() {
        let ws = TestWorkspace::new();
        ws.write_memory("a.md", "alpha\n");
        let index = open(&ws).await;
        index
            .sync(&SyncOptions::default(), &CancellationToken::new())
            .await
            .unwrap();

        let status = index.status().await.unwrap();
        assert!(!status.vector_loaded);
        assert_eq!(status.embedded_chunks, 1);
        assert_eq!(status.model, "mock-embed");
        assert!(status.previous_model.is_none());
    }

    #[tokio::test]
    #[traced_test]
    async fn model_switch_is_reported() {
        let ws = TestWorkspace::new();
        ws.write_memory("a.md", "alpha\n");
        let index = open(&ws).await;
        index
            .sync(&SyncOptions::default(), &CancellationToken::new())
            .await
            .unwrap();
        index.close().await.unwrap();

        let embedder = Arc::new(MockEmbedder::new(16).with_model("mock-embed-v2"));
        let index = MemoryIndex::open(ws.root(), ws.config(), embedder)
            .await
            .unwrap();
        assert!(logs_contain("embedding model changed"));
        let status = index.status().await.unwrap();
        assert_eq!(status.previous_model.as_deref(), Some("mock-embed"));

        let report = index
            .sync(&SyncOptions::default(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(report.embeddings_generated, 1);
        assert!(index.status().await.unwrap().previous_model.is_none());
    }

    #[tokio::test]
    async fn watching_can_be_toggled() {
        let ws = TestWorkspace::new();
        let index = open(&ws).await;
        assert!(!index.is_watching());
        index.start_watching().unwrap();
        index.start_watching().unwrap();
        assert!(index.is_watching());
        index.stop_watching();
        assert!(!index.is_watching());
    }
}
