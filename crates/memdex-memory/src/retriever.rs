// SPDX-FileCopyrightText: 2026 Memdex Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Hybrid retriever: weighted fusion of vector similarity and BM25.
//!
//! Both rankings are over-fetched (twice the requested results), the lexical
//! scores are normalized against the best lexical hit of the batch, and each
//! chunk gets `vector_weight * v + text_weight * t`. A chunk missing from one
//! ranking scores `missing_score` on that axis.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use memdex_config::SearchConfig;
use memdex_core::{EmbeddingProvider, MemdexError, SourceKind};
use memdex_storage::IndexStore;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::chunker::content_hash;
use crate::lexical::LexicalSearch;
use crate::metrics;
use crate::vector::VectorIndex;

/// Share of the snippet budget, from the end, in which a word boundary cut is preferred.
const SNIPPET_BOUNDARY_WINDOW: f32 = 0.2;
const ELLIPSIS: char = '…';

/// Per-query search knobs.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOptions {
    pub max_results: usize,
    pub min_score: f32,
    pub vector_weight: f32,
    pub text_weight: f32,
    pub include_memory: bool,
    pub include_sessions: bool,
    pub snippet_max_chars: usize,
    /// Score on an axis for a chunk absent from that axis' ranking.
    pub missing_score: f32,
}

impl From<&SearchConfig> for SearchOptions {
    fn from(config: &SearchConfig) -> Self {
        Self {
            max_results: config.max_results,
            min_score: config.min_score,
            vector_weight: config.vector_weight,
            text_weight: config.text_weight,
            include_memory: config.include_memory,
            include_sessions: config.include_sessions,
            snippet_max_chars: config.snippet_max_chars,
            missing_score: config.missing_score,
        }
    }
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self::from(&SearchConfig::default())
    }
}

impl SearchOptions {
    fn admits(&self, source: SourceKind) -> bool {
        match source {
            SourceKind::Memory => self.include_memory,
            SourceKind::Sessions => self.include_sessions,
        }
    }
}

/// One ranked hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub chunk_id: i64,
    pub path: String,
    pub source: SourceKind,
    pub start_line: usize,
    pub end_line: usize,
    pub score: f32,
    /// Cosine similarity, when the chunk was in the vector ranking.
    pub vector_score: Option<f32>,
    /// Normalized BM25, when the chunk was in the lexical ranking.
    pub text_score: Option<f32>,
    pub snippet: String,
}

/// A fused candidate before hydration.
#[derive(Debug, Clone, PartialEq)]
pub struct FusedCandidate {
    pub chunk_id: i64,
    pub score: f32,
    pub vector_score: Option<f32>,
    pub text_score: Option<f32>,
}

/// Combine the two rankings into one list, best first.
///
/// Candidates are collected in first-seen order (vector ranking, then
/// lexical) and sorted stably, so equal scores keep that order.
pub fn fuse(
    vector_hits: &[(i64, f32)],
    text_hits: &[(i64, f32)],
    options: &SearchOptions,
) -> Vec<FusedCandidate> {
    let text_max = text_hits.iter().map(|(_, s)| *s).fold(0.0f32, f32::max);
    let normalize = |raw: f32| if text_max > 0.0 { raw / text_max } else { 1.0 };

    let mut order: Vec<i64> = Vec::with_capacity(vector_hits.len() + text_hits.len());
    let mut axes: HashMap<i64, (Option<f32>, Option<f32>)> = HashMap::new();
    for &(id, score) in vector_hits {
        let entry = axes.entry(id).or_insert_with(|| {
            order.push(id);
            (None, None)
        });
        entry.0.get_or_insert(score);
    }
    for &(id, score) in text_hits {
        let entry = axes.entry(id).or_insert_with(|| {
            order.push(id);
            (None, None)
        });
        entry.1.get_or_insert(normalize(score));
    }

    let mut fused: Vec<FusedCandidate> = order
        .into_iter()
        .filter_map(|id| {
            let (vector_score, text_score) = axes.get(&id).copied()?;
            let score = vector_score.unwrap_or(options.missing_score) * options.vector_weight
                + text_score.unwrap_or(options.missing_score) * options.text_weight;
            Some(FusedCandidate {
                chunk_id: id,
                score,
                vector_score,
                text_score,
            })
        })
        .filter(|c| c.score >= options.min_score)
        .collect();

    fused.sort_by(|a, b| b.score.total_cmp(&a.score));
    fused.truncate(options.max_results);
    fused
}

/// Cut `text` to at most `max_chars` characters, preferring a whitespace
/// boundary in the last fifth of the budget, and mark the cut with `…`.
pub fn truncate_snippet(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    let prefix: String = text.chars().take(max_chars).collect();
    let floor = (max_chars as f32 * (1.0 - SNIPPET_BOUNDARY_WINDOW)).floor() as usize;
    let boundary = prefix
        .char_indices()
        .enumerate()
        .filter(|(_, (_, c))| c.is_whitespace())
        .map(|(char_pos, (byte_pos, _))| (char_pos, byte_pos))
        .last();

    let cut = match boundary {
        Some((char_pos, byte_pos)) if char_pos >= floor => &prefix[..byte_pos],
        _ => prefix.as_str(),
    };
    let mut snippet = cut.trim_end().to_string();
    snippet.push(ELLIPSIS);
    snippet
}

/// Embed `text`, going through the embedding cache keyed by its content hash.
pub(crate) async fn embed_with_cache(
    store: &IndexStore,
    embedder: &dyn EmbeddingProvider,
    text: &str,
    cancel: &CancellationToken,
) -> Result<Vec<f32>, MemdexError> {
    let key = content_hash(text);
    let provider = embedder.provider_name();
    let model = embedder.model_name();

    if let Some(hit) = store.get_cached_embedding(provider, model, &key).await? {
        metrics::record_cache_hits(1);
        return Ok(hit.embedding);
    }

    let embedding = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(MemdexError::Cancelled),
        result = embedder.embed(text) => result?,
    };
    metrics::record_embeddings_generated(1);

    match store
        .put_cached_embedding(provider, model, &key, &embedding)
        .await
    {
        // Another writer cached the same text first.
        Ok(()) | Err(MemdexError::ConstraintViolation { .. }) => {}
        Err(e) => warn!(error = %e, "failed to cache query embedding"),
    }
    Ok(embedding)
}

/// Hybrid vector + lexical search over the index.
pub struct HybridRetriever {
    store: IndexStore,
    vectors: Arc<VectorIndex>,
    lexical: LexicalSearch,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl HybridRetriever {
    pub fn new(
        store: IndexStore,
        vectors: Arc<VectorIndex>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        Self {
            lexical: LexicalSearch::new(store.clone()),
            store,
            vectors,
            embedder,
        }
    }

    /// Ranked chunks for `query`.
    ///
    /// A failure on one axis (provider down, dimension mismatch, FTS error) is
    /// logged and the other axis carries the search alone. Only cancellation
    /// and hydration failures are returned as errors.
    pub async fn search(
        &self,
        query: &str,
        options: &SearchOptions,
        cancel: &CancellationToken,
    ) -> Result<Vec<SearchResult>, MemdexError> {
        let query = query.trim();
        if query.is_empty() || options.max_results == 0 {
            return Ok(Vec::new());
        }
        let started = Instant::now();
        let candidates = options.max_results.saturating_mul(2);

        let vector_hits = if options.vector_weight > 0.0 {
            match self.vector_candidates(query, candidates, cancel).await {
                Ok(hits) => hits,
                Err(MemdexError::Cancelled) => return Err(MemdexError::Cancelled),
                Err(e) => {
                    warn!(error = %e, "vector search unavailable, continuing with keyword search only");
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        if cancel.is_cancelled() {
            return Err(MemdexError::Cancelled);
        }

        let text_hits = if options.text_weight > 0.0 {
            match self.lexical.search(query, candidates).await {
                Ok(hits) => hits,
                Err(e) => {
                    warn!(error = %e, "keyword search failed, continuing with vector search only");
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        // Source filters apply to the top results only and may leave fewer.
        let fused = fuse(&vector_hits, &text_hits, options);
        let results = self.hydrate(fused, options).await?;

        metrics::record_search_duration(started.elapsed().as_secs_f64());
        debug!(
            vector_hits = vector_hits.len(),
            text_hits = text_hits.len(),
            results = results.len(),
            "hybrid search complete"
        );
        Ok(results)
    }

    async fn vector_candidates(
        &self,
        query: &str,
        limit: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<(i64, f32)>, MemdexError> {
        let embedding = embed_with_cache(&self.store, self.embedder.as_ref(), query, cancel).await?;
        self.vectors.search(&embedding, limit, f32::NEG_INFINITY).await
    }

    async fn hydrate(
        &self,
        fused: Vec<FusedCandidate>,
        options: &SearchOptions,
    ) -> Result<Vec<SearchResult>, MemdexError> {
        if fused.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<i64> = fused.iter().map(|c| c.chunk_id).collect();
        let mut chunks: HashMap<i64, _> = self
            .store
            .get_chunks_by_ids(&ids)
            .await?
            .into_iter()
            .map(|chunk| (chunk.id, chunk))
            .collect();

        Ok(fused
            .into_iter()
            .filter_map(|candidate| {
                // Deleted since ranking.
                let chunk = chunks.remove(&candidate.chunk_id)?;
                options.admits(chunk.source).then(|| SearchResult {
                    chunk_id: chunk.id,
                    snippet: truncate_snippet(&chunk.text, options.snippet_max_chars),
                    path: chunk.path,
                    source: chunk.source,
                    start_line: chunk.start_line,
                    end_line: chunk.end_line,
                    score: candidate.score,
                    vector_score: candidate.vector_score,
                    text_score: candidate.text_score,
                })
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(vector_weight: f32, text_weight: f32) -> SearchOptions {
        SearchOptions {
            max_results: 10,
            min_score: 0.0,
            vector_weight,
            text_weight,
            missing_score: 0.0,
            ..SearchOptions::default()
        }
    }

    fn ids(fused: &[FusedCandidate]) -> Vec<i64> {
        fused.iter().map(|c| c.chunk_id).collect()
    }

    #[test]
    fn vector_only_weights_follow_vector_order() {
        let vector = vec![(3, 0.9), (1, 0.7), (2, 0.4)];
        let text = vec![(2, 8.0), (4, 6.0)];
        let fused = fuse(&vector, &text, &options(1.0, 0.0));
        assert_eq!(&ids(&fused)[..3], &[3, 1, 2]);
    }

    #[test]
    fn text_only_weights_follow_lexical_order() {
        let vector = vec![(3, 0.9), (1, 0.7)];
        let text = vec![(2, 8.0), (4, 6.0), (1, 1.0)];
        let fused = fuse(&vector, &text, &options(0.0, 1.0));
        assert_eq!(&ids(&fused)[..3], &[2, 4, 1]);
        assert!((fused[0].score - 1.0).abs() < 1e-6);
        assert!((fused[1].score - 0.75).abs() < 1e-6);
    }

    #[test]
    fn equal_weight_tie_keeps_first_seen_order() {
        // B is a perfect semantic match only, A a perfect keyword match only.
        let (a, b) = (1, 2);
        let fused = fuse(&[(b, 1.0)], &[(a, 4.2)], &options(0.5, 0.5));
        assert_eq!(ids(&fused), vec![b, a]);
        assert!((fused[0].score - 0.5).abs() < 1e-6);
        assert!((fused[1].score - 0.5).abs() < 1e-6);
    }

    #[test]
    fn missing_score_is_imputed_on_absent_axis() {
        let mut opts = options(0.5, 0.5);
        opts.missing_score = 0.2;
        let fused = fuse(&[(1, 0.8)], &[(2, 3.0)], &opts);
        let one = fused.iter().find(|c| c.chunk_id == 1).unwrap();
        assert!((one.score - (0.8 * 0.5 + 0.2 * 0.5)).abs() < 1e-6);
        assert_eq!(one.text_score, None);
    }

    #[test]
    fn all_zero_lexical_batch_counts_as_full_match() {
        let fused = fuse(&[], &[(1, 0.0), (2, 0.0)], &options(0.0, 1.0));
        assert!(fused.iter().all(|c| (c.score - 1.0).abs() < 1e-6));
        assert_eq!(ids(&fused), vec![1, 2]);
    }

    #[test]
    fn min_score_and_max_results_apply() {
        let mut opts = options(1.0, 0.0);
        opts.min_score = 0.5;
        opts.max_results = 1;
        let fused = fuse(&[(1, 0.9), (2, 0.8), (3, 0.1)], &[], &opts);
        assert_eq!(ids(&fused), vec![1]);
    }

    #[test]
    fn both_axes_combine_for_shared_chunks() {
        let fused = fuse(&[(1, 0.6), (2, 0.9)], &[(1, 2.0), (3, 1.0)], &options(0.7, 0.3));
        assert_eq!(fused[0].chunk_id, 1);
        assert!((fused[0].score - (0.6 * 0.7 + 1.0 * 0.3)).abs() < 1e-6);
        assert_eq!(fused[0].text_score, Some(1.0));
    }

    #[test]
    fn empty_rankings_fuse_to_nothing() {
        assert!(fuse(&[], &[], &options(0.5, 0.5)).is_empty());
    }

    #[test]
    fn short_snippets_are_untouched() {
        assert_eq!(truncate_snippet("short text", 100), "short text");
    }

    #[test]
    fn snippet_cuts_at_late_word_boundary() {
        let text = "alpha beta gamma delta epsilon";
        // 20 chars: "alpha beta gamma del"; last space at char 16 >= floor 16.
        assert_eq!(truncate_snippet(text, 20), "alpha beta gamma…");
    }

    #[test]
    fn snippet_hard_cuts_without_late_boundary() {
        let text = "a supercalifragilisticexpialidocious word";
        assert_eq!(truncate_snippet(text, 20), "a supercalifragilist…");
    }

    #[test]
    fn snippet_counts_characters_not_bytes() {
        let text = "ééééé ééééé ééééé";
        let snippet = truncate_snippet(text, 8);
        assert!(snippet.ends_with('…'));
        assert!(snippet.chars().count() <= 9);
    }
}
