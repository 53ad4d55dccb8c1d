// SPDX-FileCopyrightText: 2026 Memdex Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedding provider for OpenAI-compatible `/embeddings` endpoints.

use std::time::Duration;

use async_trait::async_trait;
use memdex_config::EmbeddingConfig;
use memdex_core::{EmbeddingProvider, HealthStatus, MemdexError};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Environment variable consulted when the config carries no API key.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// HTTP client for an OpenAI-compatible embeddings API.
///
/// Transient failures (429, 500, 502, 503) are retried once after a short
/// delay. Response vectors are reordered by their `index` field so output
/// order always matches input order.
pub struct OpenAiEmbedder {
    client: reqwest::Client,
    api_key: SecretString,
    endpoint: String,
    provider: String,
    model: String,
    dims: usize,
    max_retries: u32,
    retry_delay: Duration,
}

impl std::fmt::Debug for OpenAiEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiEmbedder")
            .field("endpoint", &self.endpoint)
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("dims", &self.dims)
            .finish_non_exhaustive()
    }
}

fn has_version_suffix(base_url: &str) -> bool {
    let Some(last_segment) = base_url.rsplit('/').next() else {
        return false;
    };
    let Some(rest) = last_segment.strip_prefix('v') else {
        return false;
    };
    !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit())
}

/// Full embeddings URL for a base URL given with or without a version segment.
pub fn embeddings_endpoint(base_url: &str) -> String {
    let normalized = base_url.trim().trim_end_matches('/');
    if normalized.ends_with("/embeddings") {
        normalized.to_string()
    } else if has_version_suffix(normalized) {
        format!("{normalized}/embeddings")
    } else {
        format!("{normalized}/v1/embeddings")
    }
}

fn resolve_api_key(
    config: &EmbeddingConfig,
    env: impl Fn(&str) -> Option<String>,
) -> Option<String> {
    config
        .api_key
        .clone()
        .or_else(|| env(API_KEY_ENV))
        .filter(|key| !key.trim().is_empty())
}

impl OpenAiEmbedder {
    /// Creates a client for `base_url`.
    pub fn new(
        api_key: SecretString,
        base_url: &str,
        provider: impl Into<String>,
        model: impl Into<String>,
        dims: usize,
        timeout: Duration,
    ) -> Result<Self, MemdexError> {
        if base_url.trim().is_empty() {
            return Err(MemdexError::Config(
                "embedding.base_url must not be empty".into(),
            ));
        }
        let endpoint = embeddings_endpoint(base_url);
        reqwest::Url::parse(&endpoint).map_err(|e| {
            MemdexError::Config(format!("invalid embedding endpoint `{endpoint}`: {e}"))
        })?;

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MemdexError::provider(format!("failed to build HTTP client: {e}"), e))?;

        Ok(Self {
            client,
            api_key,
            endpoint,
            provider: provider.into(),
            model: model.into(),
            dims,
            max_retries: 1,
            retry_delay: Duration::from_secs(1),
        })
    }

    /// Builds the client from the `[embedding]` config section.
    ///
    /// The API key comes from the config or, failing that, `OPENAI_API_KEY`.
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self, MemdexError> {
        let api_key = resolve_api_key(config, |name| std::env::var(name).ok()).ok_or_else(|| {
            MemdexError::Config(format!(
                "no embedding API key: set embedding.api_key or {API_KEY_ENV}"
            ))
        })?;
        Self::new(
            SecretString::from(api_key),
            &config.base_url,
            config.provider.clone(),
            config.model.clone(),
            config.dimensions,
            Duration::from_secs(config.timeout_secs),
        )
    }

    /// Overrides the delay between retry attempts.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn request(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, MemdexError> {
        let body = EmbeddingRequest {
            model: &self.model,
            input: texts,
        };
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                warn!(attempt, "retrying embedding request after transient error");
                tokio::time::sleep(self.retry_delay).await;
            }

            let response = self
                .client
                .post(&self.endpoint)
                .bearer_auth(self.api_key.expose_secret())
                .json(&body)
                .send()
                .await
                .map_err(|e| MemdexError::provider(format!("HTTP request failed: {e}"), e))?;

            let status = response.status();
            debug!(status = %status, attempt, inputs = texts.len(), "embedding response received");

            if status.is_success() {
                let text = response.text().await.map_err(|e| {
                    MemdexError::provider(format!("failed to read response body: {e}"), e)
                })?;
                let parsed: EmbeddingResponse = serde_json::from_str(&text).map_err(|e| {
                    MemdexError::provider(format!("failed to parse embedding response: {e}"), e)
                })?;
                return order_embeddings(parsed, texts.len());
            }

            let body = response.text().await.unwrap_or_default();
            if is_transient_error(status) && attempt < self.max_retries {
                warn!(status = %status, body = %body, "transient embedding error, will retry");
                last_error = Some(MemdexError::Provider {
                    message: format!("embedding API returned {status}: {body}"),
                    source: None,
                });
                continue;
            }

            let message = match serde_json::from_str::<ApiErrorResponse>(&body) {
                Ok(api_err) => format!("embedding API error ({status}): {}", api_err.error.message),
                Err(_) => format!("embedding API returned {status}: {body}"),
            };
            return Err(MemdexError::Provider {
                message,
                source: None,
            });
        }

        Err(last_error.unwrap_or_else(|| MemdexError::Provider {
            message: "embedding request failed after retries".into(),
            source: None,
        }))
    }
}

/// Puts response vectors back into request order.
fn order_embeddings(
    response: EmbeddingResponse,
    expected: usize,
) -> Result<Vec<Vec<f32>>, MemdexError> {
    if response.data.len() != expected {
        return Err(MemdexError::Provider {
            message: format!(
                "embedding response has {} vectors for {expected} inputs",
                response.data.len()
            ),
            source: None,
        });
    }
    let mut slots: Vec<Option<Vec<f32>>> = vec![None; expected];
    for item in response.data {
        match slots.get_mut(item.index) {
            Some(slot @ None) => *slot = Some(item.embedding),
            _ => {
                return Err(MemdexError::Provider {
                    message: format!("embedding response has invalid index {}", item.index),
                    source: None,
                });
            }
        }
    }
    // Every slot is filled: counts match and no index repeated.
    Ok(slots.into_iter().flatten().collect())
}

fn is_transient_error(status: reqwest::StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 500 | 502 | 503)
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorBody,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    message: String,
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedder {
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
        self.request(&[text.to_string()])
            .await?
            .pop()
            .ok_or_else(|| MemdexError::Provider {
                message: "empty embedding response".into(),
                source: None,
            })
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, MemdexError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.request(texts).await
    }

    async fn health_check(&self) -> Result<HealthStatus, MemdexError> {
        match self.embed("ping").await {
            Ok(v) if v.len() == self.dims => Ok(HealthStatus::Healthy),
            Ok(v) => Ok(HealthStatus::Degraded(format!(
                "model returned {} dimensions, expected {}",
                v.len(),
                self.dims
            ))),
            Err(e) => Ok(HealthStatus::Unhealthy(e.to_string())),
        }
    }
}
