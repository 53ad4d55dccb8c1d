// SPDX-FileCopyrightText: 2026 Memdex Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock embedding provider for deterministic testing.
//!
//! Each lowercase alphanumeric word of a text is hashed into one of `dims`
//! buckets and the bag of words is L2-normalized, so texts sharing words
//! are similar and identical texts always produce identical vectors.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use memdex_core::{EmbeddingProvider, MemdexError};

/// A deterministic in-process embedding provider.
pub struct MockEmbedder {
    dims: usize,
    provider: String,
    model: String,
    overrides: Vec<(String, Vec<f32>)>,
    failing: Vec<String>,
    batch_supported: bool,
    calls: AtomicUsize,
    texts_embedded: AtomicUsize,
}

impl MockEmbedder {
    pub fn new(dims: usize) -> Self {
        Self {
            dims,
            provider: "mock".to_string(),
            model: "mock-embed".to_string(),
            overrides: Vec::new(),
            failing: Vec::new(),
            batch_supported: true,
            calls: AtomicUsize::new(0),
            texts_embedded: AtomicUsize::new(0),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Texts containing `needle` embed to exactly `vector`.
    ///
    /// Overrides are checked in insertion order; the first match wins.
    pub fn with_override(mut self, needle: impl Into<String>, vector: Vec<f32>) -> Self {
        self.overrides.push((needle.into(), vector));
        self
    }

    /// Texts containing `needle` fail with a provider error.
    pub fn failing_on(mut self, needle: impl Into<String>) -> Self {
        self.failing.push(needle.into());
        self
    }

    /// Reject every `embed_batch` call, forcing per-text fallbacks.
    pub fn without_batch(mut self) -> Self {
        self.batch_supported = false;
        self
    }

    /// Provider calls made so far (`embed` and `embed_batch` each count once).
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Texts successfully embedded so far.
    pub fn texts_embedded(&self) -> usize {
        self.texts_embedded.load(Ordering::SeqCst)
    }

    pub fn reset_counts(&self) {
        self.calls.store(0, Ordering::SeqCst);
        self.texts_embedded.store(0, Ordering::SeqCst);
    }

    /// The vector `text` embeds to, without counting a call.
    pub fn vector_for(&self, text: &str) -> Vec<f32> {
        if let Some((_, vector)) = self.overrides.iter().find(|(n, _)| text.contains(n.as_str())) {
            return vector.clone();
        }

        let mut vector = vec![0.0f32; self.dims];
        if self.dims == 0 {
            return vector;
        }
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let bucket = fnv1a(&word.to_lowercase()) as usize % self.dims;
            vector[bucket] += 1.0;
        }
        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|x| *x /= norm);
        }
        vector
    }

    fn embed_one(&self, text: &str) -> Result<Vec<f32>, MemdexError> {
        if let Some(needle) = self.failing.iter().find(|n| text.contains(n.as_str())) {
            return Err(MemdexError::Provider {
                message: format!("mock failure for text containing `{needle}`"),
                source: None,
            });
        }
        self.texts_embedded.fetch_add(1, Ordering::SeqCst);
        Ok(self.vector_for(text))
    }
}

fn fnv1a(word: &str) -> u64 {
    word.bytes().fold(0xcbf2_9ce4_8422_2325, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(0x0100_0000_01b3)
    })
}

#[async_trait]
impl EmbeddingProvider for MockEmbedder {
    fn provider_name(&self) -> &str {
        &self.provider
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dims
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, MemdexError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.embed_one(text)
    }

    /// Fails as a whole when any text fails, like a real batch endpoint.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, MemdexError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.batch_supported {
            return Err(MemdexError::Provider {
                message: "mock embedder does not support batches".into(),
                source: None,
            });
        }
        if let Some(text) = texts
            .iter()
            .find(|t| self.failing.iter().any(|n| t.contains(n.as_str())))
        {
            return Err(MemdexError::Provider {
                message: format!("mock batch failure on `{text}`"),
                source: None,
            });
        }
        texts.iter().map(|t| self.embed_one(t)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_words_are_similar() {
        let embedder = MockEmbedder::new(32);
        let a = embedder.vector_for("deploy the service");
        let b = embedder.vector_for("Deploy the SERVICE!");
        assert_eq!(a, b);
        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
        assert!(embedder.vector_for("").iter().all(|x| *x == 0.0));
    }

    #[test]
    fn first_matching_override_wins() {
        let embedder = MockEmbedder::new(2)
            .with_override("alpha", vec![1.0, 0.0])
            .with_override("beta", vec![0.0, 1.0]);
        assert_eq!(embedder.vector_for("alpha beta"), vec![1.0, 0.0]);
        assert_eq!(embedder.vector_for("beta"), vec![0.0, 1.0]);
    }

    #[tokio::test]
    async fn counts_calls_and_injects_failures() {
        let embedder = MockEmbedder::new(4).failing_on("bad");
        embedder.embed("good").await.unwrap();
        assert!(embedder.embed("bad text").await.is_err());
        let batch = vec!["one".to_string(), "bad two".to_string()];
        assert!(embedder.embed_batch(&batch).await.is_err());
        assert_eq!(embedder.calls(), 3);
        assert_eq!(embedder.texts_embedded(), 1);

        embedder.reset_counts();
        assert_eq!(embedder.calls(), 0);
    }

    #[tokio::test]
    async fn batch_can_be_disabled() {
        let embedder = MockEmbedder::new(4).without_batch();
        assert!(embedder.embed_batch(&["x".to_string()]).await.is_err());
        assert!(embedder.embed("x").await.is_ok());
    }
}
