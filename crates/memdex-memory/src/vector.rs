// SPDX-FileCopyrightText: 2026 Memdex Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory cosine-similarity index over chunk embeddings.
//!
//! The index is a cache of the store: it loads every embedding of the active
//! model on first use and can always be rebuilt by [`VectorIndex::clear`].

use memdex_core::MemdexError;
use memdex_storage::IndexStore;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Cosine similarity of two vectors of equal length. A zero-norm side scores 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32, MemdexError> {
    if a.len() != b.len() {
        return Err(MemdexError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }
    Ok(dot / (norm_a.sqrt() * norm_b.sqrt()))
}

#[derive(Default)]
struct VectorState {
    loaded: bool,
    dims: Option<usize>,
    entries: Vec<(i64, Vec<f32>)>,
}

/// Nearest-neighbor index keyed by chunk id.
pub struct VectorIndex {
    store: IndexStore,
    model: String,
    state: RwLock<VectorState>,
}

impl VectorIndex {
    /// An unloaded index over embeddings produced by `model`.
    pub fn new(store: IndexStore, model: impl Into<String>) -> Self {
        Self {
            store,
            model: model.into(),
            state: RwLock::new(VectorState::default()),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn ensure_loaded(&self) -> Result<(), MemdexError> {
        if self.state.read().await.loaded {
            return Ok(());
        }
        let mut state = self.state.write().await;
        if state.loaded {
            return Ok(());
        }

        let rows = self.store.load_embeddings(&self.model).await?;
        let mut dims = None;
        let mut entries = Vec::with_capacity(rows.len());
        for (id, embedding) in rows {
            let expected = *dims.get_or_insert(embedding.len());
            if embedding.len() != expected {
                warn!(
                    chunk_id = id,
                    expected,
                    actual = embedding.len(),
                    "skipping embedding with inconsistent dimensions"
                );
                continue;
            }
            entries.push((id, embedding));
        }

        debug!(model = %self.model, entries = entries.len(), "vector index loaded");
        *state = VectorState {
            loaded: true,
            dims,
            entries,
        };
        Ok(())
    }

    /// Top `max_results` chunks by cosine similarity with `query`, best first.
    ///
    /// Scores below `min_score` are dropped. Ties keep chunk-id order.
    pub async fn search(
        &self,
        query: &[f32],
        max_results: usize,
        min_score: f32,
    ) -> Result<Vec<(i64, f32)>, MemdexError> {
        self.ensure_loaded().await?;
        let state = self.state.read().await;

        if let Some(dims) = state.dims
            && dims != query.len()
        {
            return Err(MemdexError::DimensionMismatch {
                expected: dims,
                actual: query.len(),
            });
        }

        let mut scored = Vec::with_capacity(state.entries.len());
        for (id, embedding) in &state.entries {
            let score = cosine_similarity(query, embedding)?;
            if score >= min_score {
                scored.push((*id, score));
            }
        }
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(max_results);
        Ok(scored)
    }

    /// Insert or replace the vector of one chunk.
    ///
    /// A no-op while the index is unloaded: the next load reads it from the store.
    pub async fn add_or_replace(&self, id: i64, embedding: Vec<f32>) -> Result<(), MemdexError> {
        let mut state = self.state.write().await;
        if !state.loaded {
            return Ok(());
        }
        match state.dims {
            Some(dims) if dims != embedding.len() => {
                return Err(MemdexError::DimensionMismatch {
                    expected: dims,
                    actual: embedding.len(),
                });
            }
            Some(_) => {}
            None => state.dims = Some(embedding.len()),
        }

        if let Some(entry) = state.entries.iter_mut().find(|(existing, _)| *existing == id) {
            entry.1 = embedding;
        } else {
            state.entries.push((id, embedding));
        }
        Ok(())
    }

    /// Drop the vector of one chunk, if present.
    pub async fn remove(&self, id: i64) {
        let mut state = self.state.write().await;
        state.entries.retain(|(existing, _)| *existing != id);
    }

    /// Forget everything; the next search reloads from the store.
    pub async fn clear(&self) {
        *self.state.write().await = VectorState::default();
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn is_loaded(&self) -> bool {
        self.state.read().await.loaded
    }

    /// Dimensionality of the loaded vectors, if any are loaded.
    pub async fn dims(&self) -> Option<usize> {
        self.state.read().await.dims
    }
}
