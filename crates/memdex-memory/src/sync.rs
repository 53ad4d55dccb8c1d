// SPDX-FileCopyrightText: 2026 Memdex Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Incremental synchronization of source files into the index.
//!
//! A run walks the memory directories and the sessions directory, re-chunks
//! files whose content hash changed, removes files that disappeared, embeds
//! every chunk still lacking a vector for the active model and finally
//! patches (or drops) the in-memory vector index.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant, UNIX_EPOCH};

use chrono::Utc;
use memdex_config::{SourcesConfig, SyncConfig};
use memdex_core::{EmbeddingProvider, MemdexError, SourceKind};
use memdex_storage::queries::meta;
use memdex_storage::{ChangeStatus, FileMeta, IndexStore, NewChunk, PendingChunk};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::chunker::Chunker;
use crate::metrics;
use crate::transcript::{TRANSCRIPT_EXTENSION, flatten_transcript, parse_transcript};
use crate::vector::VectorIndex;

/// Stage a sync run is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncPhase {
    Scanning,
    Chunking,
    Embedding,
    Indexing,
    Done,
}

/// Snapshot passed to the progress callback.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncProgress {
    pub phase: SyncPhase,
    pub current_file: Option<String>,
    pub files_processed: usize,
    pub files_total: usize,
    pub chunks_created: usize,
    pub embeddings_generated: usize,
    pub failures: usize,
}

pub type ProgressCallback = Arc<dyn Fn(&SyncProgress) + Send + Sync>;

/// Per-run switches.
#[derive(Clone, Default)]
pub struct SyncOptions {
    /// Re-chunk every file even when its hash is unchanged.
    pub force: bool,
    pub progress: Option<ProgressCallback>,
}

impl std::fmt::Debug for SyncOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncOptions")
            .field("force", &self.force)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

/// A chunk whose embedding could not be produced this run.
///
/// The chunk stays in the index without a vector and is retried next sync.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbeddingFailure {
    pub chunk_id: i64,
    pub path: String,
    pub message: String,
}

/// Summary of one sync run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SyncReport {
    pub files_scanned: usize,
    pub files_indexed: usize,
    pub files_unchanged: usize,
    pub files_removed: usize,
    pub chunks_created: usize,
    pub chunks_removed: usize,
    pub embeddings_generated: usize,
    pub cache_hits: usize,
    /// Cached embeddings of a previous provider or model that were dropped.
    pub cache_pruned: usize,
    pub failures: Vec<EmbeddingFailure>,
    /// The vector index was dropped and will reload on the next search.
    pub vector_reloaded: bool,
    pub duration: Duration,
}

/// A source document found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
struct SourceFile {
    /// Index key: path relative to the workspace root, `/`-separated.
    key: String,
    abs: PathBuf,
    source: SourceKind,
}

/// Chunk id changes accumulated during the indexing phase.
#[derive(Default)]
struct IndexDelta {
    inserted: Vec<i64>,
    removed: Vec<i64>,
}

/// Drives a sync run against one workspace root.
pub struct SyncPipeline {
    root: PathBuf,
    store: IndexStore,
    chunker: Arc<Chunker>,
    embedder: Arc<dyn EmbeddingProvider>,
    vectors: Arc<VectorIndex>,
    sources: SourcesConfig,
    config: SyncConfig,
}

impl SyncPipeline {
    pub fn new(
        root: impl Into<PathBuf>,
        store: IndexStore,
        chunker: Arc<Chunker>,
        embedder: Arc<dyn EmbeddingProvider>,
        vectors: Arc<VectorIndex>,
        sources: SourcesConfig,
        config: SyncConfig,
    ) -> Self {
        Self {
            root: root.into(),
            store,
            chunker,
            embedder,
            vectors,
            sources,
            config,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directories a run reads from, memory directories first.
    pub fn source_dirs(&self) -> Vec<PathBuf> {
        let mut dirs: Vec<PathBuf> = self
            .sources
            .memory_dirs
            .iter()
            .map(|d| self.root.join(d))
            .collect();
        if self.sources.include_sessions {
            dirs.push(self.root.join(&self.sources.sessions_dir));
        }
        dirs
    }

    /// Run one sync.
    ///
    /// Per-file index updates are committed as they happen, so a cancelled or
    /// failed run keeps the files it already finished.
    ///
    /// The vector index is dropped when a run fails or is cancelled: the
    /// committed part of the run is in the store but not in the index, and the
    /// next search reloads from the store.
    pub async fn run(
        &self,
        options: &SyncOptions,
        cancel: &CancellationToken,
    ) -> Result<SyncReport, MemdexError> {
        let result = self.run_inner(options, cancel).await;
        if let Err(e) = &result {
            debug!(error = %e, "sync aborted, dropping vector index");
            self.vectors.clear().await;
        }
        result
    }

    async fn run_inner(
        &self,
        options: &SyncOptions,
        cancel: &CancellationToken,
    ) -> Result<SyncReport, MemdexError> {
        let started = Instant::now();
        let mut report = SyncReport::default();
        let mut tracker = ProgressTracker::new(options.progress.clone());

        tracker.emit(SyncPhase::Scanning, None, &report);
        let files = self.enumerate()?;
        report.files_scanned = files.len();
        tracker.files_total = files.len();
        debug!(files = files.len(), root = %self.root.display(), "source scan complete");

        let mut delta = IndexDelta::default();
        for file in &files {
            if cancel.is_cancelled() {
                return Err(MemdexError::Cancelled);
            }
            tracker.emit(SyncPhase::Chunking, Some(&file.key), &report);
            self.index_file(file, options.force, &mut report, &mut delta)
                .await?;
            tracker.files_processed += 1;
        }

        self.remove_deleted(&files, &mut report, &mut delta).await?;

        tracker.emit(SyncPhase::Embedding, None, &report);
        let embedded = self.embed_pending(&mut report, &mut tracker, cancel).await?;

        tracker.emit(SyncPhase::Indexing, None, &report);
        report.vector_reloaded = self.refresh_vectors(&delta, embedded).await?;
        report.cache_pruned = self.prune_stale_cache().await?;
        self.write_meta().await?;

        report.duration = started.elapsed();
        metrics::record_sync_duration(report.duration.as_secs_f64());
        tracker.emit(SyncPhase::Done, None, &report);

        info!(
            scanned = report.files_scanned,
            indexed = report.files_indexed,
            unchanged = report.files_unchanged,
            removed = report.files_removed,
            chunks = report.chunks_created,
            embeddings = report.embeddings_generated,
            cache_hits = report.cache_hits,
            failures = report.failures.len(),
            elapsed_ms = report.duration.as_millis() as u64,
            "sync complete"
        );
        Ok(report)
    }

    fn enumerate(&self) -> Result<Vec<SourceFile>, MemdexError> {
        let mut files = Vec::new();
        let mut seen = HashSet::new();

        for dir in &self.sources.memory_dirs {
            let dir = self.root.join(dir);
            for abs in walk(&dir, None, |path| has_extension(path, &self.sources.extensions)) {
                let key = self.index_key(&abs);
                if seen.insert(key.clone()) {
                    files.push(SourceFile {
                        key,
                        abs,
                        source: SourceKind::Memory,
                    });
                }
            }
        }

        if self.sources.include_sessions {
            let dir = self.root.join(&self.sources.sessions_dir);
            let extension = [TRANSCRIPT_EXTENSION.to_string()];
            for abs in walk(&dir, Some(1), |path| has_extension(path, &extension)) {
                let key = self.index_key(&abs);
                if seen.insert(key.clone()) {
                    files.push(SourceFile {
                        key,
                        abs,
                        source: SourceKind::Sessions,
                    });
                }
            }
        }

        files.sort_by(|a, b| (a.source.as_str(), &a.key).cmp(&(b.source.as_str(), &b.key)));
        Ok(files)
    }

    fn index_key(&self, abs: &Path) -> String {
        let relative = abs.strip_prefix(&self.root).unwrap_or(abs);
        relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }

    async fn index_file(
        &self,
        file: &SourceFile,
        force: bool,
        report: &mut SyncReport,
        delta: &mut IndexDelta,
    ) -> Result<(), MemdexError> {
        let bytes = match tokio::fs::read(&file.abs).await {
            Ok(bytes) => bytes,
            Err(e) => {
                // Vanished between scan and read; the next run removes it.
                warn!(path = %file.key, error = %e, "skipping unreadable source file");
                return Ok(());
            }
        };
        let (size, mtime) = file_stamp(&file.abs).await;
        let hash = hex::encode(Sha256::digest(&bytes));

        let status = self
            .store
            .check_change(&file.key, &hash, size, mtime)
            .await?;
        if status == ChangeStatus::Unchanged && !force {
            report.files_unchanged += 1;
            return Ok(());
        }

        let text = String::from_utf8_lossy(&bytes);
        let chunks: Vec<NewChunk> = match file.source {
            SourceKind::Memory => self.chunker.chunk(&text, &file.key),
            SourceKind::Sessions => {
                let flattened = flatten_transcript(&parse_transcript(&text));
                self.chunker.chunk(&flattened, "")
            }
        }
        .into_iter()
        .map(NewChunk::from)
        .collect();

        let meta = FileMeta {
            path: file.key.clone(),
            source: file.source,
            hash,
            size,
            mtime,
        };
        let chunk_count = chunks.len();
        let replacement = self.store.replace_file(meta, chunks).await?;

        debug!(
            path = %file.key,
            status = ?status,
            chunks = chunk_count,
            replaced = replacement.removed.len(),
            "file indexed"
        );
        metrics::record_file_indexed(file.source);
        report.files_indexed += 1;
        report.chunks_created += replacement.inserted.len();
        report.chunks_removed += replacement.removed.len();
        delta.inserted.extend(replacement.inserted);
        delta.removed.extend(replacement.removed);
        Ok(())
    }

    async fn remove_deleted(
        &self,
        files: &[SourceFile],
        report: &mut SyncReport,
        delta: &mut IndexDelta,
    ) -> Result<(), MemdexError> {
        let present: HashSet<&str> = files.iter().map(|f| f.key.as_str()).collect();
        let mut collections = vec![SourceKind::Memory];
        if self.sources.include_sessions {
            collections.push(SourceKind::Sessions);
        }

        for source in collections {
            for path in self.store.list_paths(source).await? {
                if present.contains(path.as_str()) {
                    continue;
                }
                let removed = self.store.delete_file(&path).await?;
                debug!(path = %path, chunks = removed.len(), "removed deleted file from index");
                report.files_removed += 1;
                report.chunks_removed += removed.len();
                delta.removed.extend(removed);
            }
        }
        Ok(())
    }

    /// Embed every chunk lacking a vector for the active model.
    ///
    /// Returns the vectors attached during this run.
    async fn embed_pending(
        &self,
        report: &mut SyncReport,
        tracker: &mut ProgressTracker,
        cancel: &CancellationToken,
    ) -> Result<Vec<(i64, Vec<f32>)>, MemdexError> {
        let provider = self.embedder.provider_name();
        let model = self.embedder.model_name();
        let pending = self.store.chunks_missing_embedding(model, &[]).await?;
        if pending.is_empty() {
            return Ok(Vec::new());
        }
        debug!(pending = pending.len(), model, "embedding pending chunks");

        let mut embedded = Vec::with_capacity(pending.len());
        let batch_size = self.config.embedding_batch_size.max(1);
        let mut generated = 0u64;
        let mut hits = 0u64;
        let mut failed = 0u64;

        for batch in pending.chunks(batch_size) {
            if cancel.is_cancelled() {
                return Err(MemdexError::Cancelled);
            }

            let mut resolved: Vec<(&PendingChunk, Vec<f32>)> = Vec::with_capacity(batch.len());
            let mut misses: Vec<&PendingChunk> = Vec::new();
            for chunk in batch {
                match self
                    .store
                    .get_cached_embedding(provider, model, &chunk.hash)
                    .await?
                {
                    Some(hit) => {
                        hits += 1;
                        resolved.push((chunk, hit.embedding));
                    }
                    None => misses.push(chunk),
                }
            }

            // Identical texts share one provider input.
            let mut unique: Vec<&PendingChunk> = Vec::new();
            let mut slot_of: HashMap<&str, usize> = HashMap::new();
            for &chunk in &misses {
                slot_of.entry(chunk.hash.as_str()).or_insert_with(|| {
                    unique.push(chunk);
                    unique.len() - 1
                });
            }

            let outcomes = if unique.is_empty() {
                Vec::new()
            } else {
                let texts: Vec<String> = unique.iter().map(|c| c.text.clone()).collect();
                self.embed_texts(&texts, cancel).await?
            };

            for (chunk, outcome) in unique.iter().zip(&outcomes) {
                if let Ok(vector) = outcome {
                    generated += 1;
                    match self
                        .store
                        .put_cached_embedding(provider, model, &chunk.hash, vector)
                        .await
                    {
                        Ok(()) | Err(MemdexError::ConstraintViolation { .. }) => {}
                        Err(e) => return Err(e),
                    }
                }
            }

            for chunk in misses {
                let outcome = slot_of
                    .get(chunk.hash.as_str())
                    .and_then(|slot| outcomes.get(*slot));
                match outcome {
                    Some(Ok(vector)) => resolved.push((chunk, vector.clone())),
                    Some(Err(message)) => {
                        failed += 1;
                        report.failures.push(EmbeddingFailure {
                            chunk_id: chunk.id,
                            path: chunk.path.clone(),
                            message: message.clone(),
                        });
                    }
                    None => {}
                }
            }

            for (chunk, vector) in resolved {
                if self
                    .store
                    .set_chunk_embedding(chunk.id, model, &vector)
                    .await?
                {
                    embedded.push((chunk.id, vector));
                }
            }

            report.embeddings_generated = generated as usize;
            report.cache_hits = hits as usize;
            tracker.emit(SyncPhase::Embedding, None, report);
        }

        metrics::record_embeddings_generated(generated);
        metrics::record_cache_hits(hits);
        if failed > 0 {
            metrics::record_embedding_failures(failed);
            warn!(failed, "some chunks could not be embedded and will be retried next sync");
        }
        Ok(embedded)
    }

    /// One batch call, falling back to per-text calls when the batch fails.
    ///
    /// Each outcome is either a vector of the provider's dimensionality or
    /// the reason it could not be produced.
    async fn embed_texts(
        &self,
        texts: &[String],
        cancel: &CancellationToken,
    ) -> Result<Vec<Result<Vec<f32>, String>>, MemdexError> {
        let dims = self.embedder.dimensions();
        let check = |vector: Vec<f32>| {
            if vector.len() == dims {
                Ok(vector)
            } else {
                Err(MemdexError::DimensionMismatch {
                    expected: dims,
                    actual: vector.len(),
                }
                .to_string())
            }
        };

        let batch = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(MemdexError::Cancelled),
            result = self.embedder.embed_batch(texts) => result,
        };
        match batch {
            Ok(vectors) if vectors.len() == texts.len() => {
                return Ok(vectors.into_iter().map(check).collect());
            }
            Ok(vectors) => warn!(
                expected = texts.len(),
                actual = vectors.len(),
                "batch embedding returned the wrong number of vectors, retrying one by one"
            ),
            Err(e) => warn!(error = %e, "batch embedding failed, retrying one by one"),
        }

        let mut outcomes = Vec::with_capacity(texts.len());
        for text in texts {
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(MemdexError::Cancelled),
                result = self.embedder.embed(text) => result,
            };
            outcomes.push(match result {
                Ok(vector) => check(vector),
                Err(e) => Err(e.to_string()),
            });
        }
        Ok(outcomes)
    }

    /// Patch the vector index, or drop it when too much changed.
    ///
    /// Returns whether the index was dropped.
    async fn refresh_vectors(
        &self,
        delta: &IndexDelta,
        embedded: Vec<(i64, Vec<f32>)>,
    ) -> Result<bool, MemdexError> {
        if !self.vectors.is_loaded().await {
            return Ok(false);
        }

        let total = self.store.stats().await?.total_chunks;
        let changed = (delta.inserted.len() + delta.removed.len()) as f64;
        let fraction = changed / total.max(1) as f64;
        if total == 0 || fraction > self.config.full_reload_fraction {
            debug!(fraction, total, "large change set, dropping vector index");
            self.vectors.clear().await;
            return Ok(true);
        }

        for id in &delta.removed {
            self.vectors.remove(*id).await;
        }
        for (id, vector) in embedded {
            match self.vectors.add_or_replace(id, vector).await {
                Ok(()) => {}
                Err(MemdexError::DimensionMismatch { expected, actual }) => {
                    warn!(expected, actual, "embedding dimensions changed, dropping vector index");
                    self.vectors.clear().await;
                    return Ok(true);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(false)
    }

    /// Drop cache rows of the provider/model recorded by the previous sync, if it differs.
    async fn prune_stale_cache(&self) -> Result<usize, MemdexError> {
        let provider = self.embedder.provider_name();
        let model = self.embedder.model_name();
        let previous_provider = self.store.get_meta(meta::EMBEDDING_PROVIDER).await?;
        let previous_model = self.store.get_meta(meta::EMBEDDING_MODEL).await?;
        let switched = previous_provider.as_deref().is_some_and(|p| p != provider)
            || previous_model.as_deref().is_some_and(|m| m != model);
        if !switched {
            return Ok(0);
        }

        let pruned = self.store.prune_cache(provider, model).await?;
        info!(
            pruned,
            previous_model = previous_model.as_deref().unwrap_or(""),
            model,
            "embedding model changed, pruned stale cache entries"
        );
        Ok(pruned)
    }

    async fn write_meta(&self) -> Result<(), MemdexError> {
        self.store
            .set_meta(meta::LAST_SYNC_AT, &Utc::now().to_rfc3339())
            .await?;
        self.store
            .set_meta(meta::EMBEDDING_PROVIDER, self.embedder.provider_name())
            .await?;
        self.store
            .set_meta(meta::EMBEDDING_MODEL, self.embedder.model_name())
            .await?;
        self.store
            .set_meta(
                meta::EMBEDDING_DIMS,
                &self.embedder.dimensions().to_string(),
            )
            .await
    }
}

struct ProgressTracker {
    callback: Option<ProgressCallback>,
    files_processed: usize,
    files_total: usize,
}

impl ProgressTracker {
    fn new(callback: Option<ProgressCallback>) -> Self {
        Self {
            callback,
            files_processed: 0,
            files_total: 0,
        }
    }

    fn emit(&self, phase: SyncPhase, current_file: Option<&str>, report: &SyncReport) {
        if let Some(callback) = &self.callback {
            callback(&SyncProgress {
                phase,
                current_file: current_file.map(str::to_string),
                files_processed: self.files_processed,
                files_total: self.files_total,
                chunks_created: report.chunks_created,
                embeddings_generated: report.embeddings_generated,
                failures: report.failures.len(),
            });
        }
    }
}

/// Regular, non-hidden files under `dir` accepted by `accept`, sorted.
///
/// A missing directory yields nothing.
fn walk(dir: &Path, max_depth: Option<usize>, accept: impl Fn(&Path) -> bool) -> Vec<PathBuf> {
    if !dir.is_dir() {
        debug!(dir = %dir.display(), "source directory missing, skipping");
        return Vec::new();
    }
    let mut walker = WalkDir::new(dir).follow_links(false).sort_by_file_name();
    if let Some(depth) = max_depth {
        walker = walker.max_depth(depth);
    }

    walker
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry.file_name()))
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(error = %e, "skipping unreadable directory entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file() && accept(entry.path()))
        .map(walkdir::DirEntry::into_path)
        .collect()
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_string_lossy().starts_with('.')
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| extensions.iter().any(|want| want.eq_ignore_ascii_case(ext)))
}

/// Size in bytes and modification time in unix milliseconds.
async fn file_stamp(path: &Path) -> (i64, i64) {
    match tokio::fs::metadata(path).await {
        Ok(meta) => {
            let mtime = meta
                .modified()
                .ok()
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map_or(0, |d| d.as_millis() as i64);
            (meta.len() as i64, mtime)
        }
        Err(_) => (0, 0),
    }
}
