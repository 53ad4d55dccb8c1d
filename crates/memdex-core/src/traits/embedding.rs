// SPDX-FileCopyrightText: 2026 Memdex Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedding provider trait for vector embedding generation.

use async_trait::async_trait;

use crate::error::MemdexError;
use crate::types::HealthStatus;

/// An external capability that turns text into fixed-dimension vectors.
///
/// The index never generates embeddings itself. Providers that can only
/// embed one text per call implement [`embed`](Self::embed) and inherit the
/// sequential [`embed_batch`](Self::embed_batch) fallback.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync + 'static {
    /// Stable provider identifier, part of the embedding cache key.
    fn provider_name(&self) -> &str;

    /// Model identifier, part of the embedding cache key and stored per chunk.
    fn model_name(&self) -> &str;

    /// Vector dimensionality produced by this model.
    fn dimensions(&self) -> usize;

    /// Embeds a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, MemdexError>;

    /// Embeds several texts, preserving input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, MemdexError> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }

    /// Reports whether the provider is reachable.
    async fn health_check(&self) -> Result<HealthStatus, MemdexError> {
        Ok(HealthStatus::Healthy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct LengthEmbedder {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EmbeddingProvider for LengthEmbedder {
        fn provider_name(&self) -> &str {
            "test"
        }

        fn model_name(&self) -> &str {
            "length"
        }

        fn dimensions(&self) -> usize {
            1
        }

        async fn embed(&self, text: &str) -> Result<Vec<f32>, MemdexError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![text.len() as f32])
        }
    }

    #[tokio::test]
    async fn default_batch_falls_back_to_sequential_embed() {
        let embedder = LengthEmbedder {
            calls: AtomicUsize::new(0),
        };
        let texts = vec!["a".to_string(), "abc".to_string(), "ab".to_string()];
        let vectors = embedder.embed_batch(&texts).await.unwrap();
        assert_eq!(vectors, vec![vec![1.0], vec![3.0], vec![2.0]]);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 3);
        assert_eq!(embedder.health_check().await.unwrap(), HealthStatus::Healthy);
    }
}
