//! Embedding collaborators.
//!
//! The embedding service maps a batch of strings to fixed-length vectors,
//! order-preserving. One real implementation (OpenAI `/v1/embeddings`) and
//! one deterministic stub for tests.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone)]
pub struct EmbeddingResult {
    pub embeddings: Vec<Vec<f32>>,
    pub model: String,
    pub dimensions: usize,
}

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<EmbeddingResult>;
    fn model_id(&self) -> &str;
    fn dimensions(&self) -> usize;
}

#[derive(Clone)]
pub struct OpenAiEmbeddingProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
    dimensions: usize,
    base_url: String,
}

impl OpenAiEmbeddingProvider {
    pub fn new(api_key: String) -> Self {
        Self::with_model(api_key, "text-embedding-3-large".to_string(), 3072)
    }

    pub fn with_model(api_key: String, model: String, dimensions: usize) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap_or_default(),
            api_key,
            model,
            dimensions,
            base_url: "https://api.openai.com/v1".to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    async fn request_once(&self, request: &EmbeddingApiRequest) -> Result<EmbeddingApiResponse> {
        let endpoint = format!("{}/embeddings", self.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(endpoint)
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .header(CONTENT_TYPE, "application/json")
            .json(request)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, &body));
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddingProvider {
    async fn embed(&self, texts: &[String]) -> Result<EmbeddingResult> {
        if texts.is_empty() {
            return Ok(EmbeddingResult {
                embeddings: Vec::new(),
                model: self.model.clone(),
                dimensions: self.dimensions,
            });
        }

        let request = EmbeddingApiRequest {
            model: self.model.clone(),
            input: texts.to_vec(),
            encoding_format: "float".to_string(),
        };

        let mut attempt = 0;
        let parsed = loop {
            attempt += 1;
            match self.request_once(&request).await {
                Ok(parsed) => break parsed,
                Err(err) if attempt < MAX_ATTEMPTS && is_retryable(&err) => {
                    tracing::warn!(attempt, "embedding call failed, retrying: {err}");
                    tokio::time::sleep(backoff(attempt)).await;
                }
                Err(err) => return Err(err),
            }
        };

        let model = parsed.model.clone();
        let embeddings = extract_ordered_embeddings(parsed)?;

        if embeddings.len() != texts.len() {
            return Err(anyhow!(
                "embedding count mismatch: expected {}, got {}",
                texts.len(),
                embeddings.len()
            ));
        }
        if embeddings.iter().any(|item| item.len() != self.dimensions) {
            return Err(anyhow!(
                "embedding dimensions mismatch with configured dimensions {}",
                self.dimensions
            ));
        }

        Ok(EmbeddingResult {
            embeddings,
            model,
            dimensions: self.dimensions,
        })
    }

    fn model_id(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

fn transport_error(err: reqwest::Error) -> anyhow::Error {
    if err.is_timeout() {
        anyhow!("embedding api error (timeout) [retryable]: request timed out")
    } else if err.is_connect() {
        anyhow!("embedding api error (connect) [retryable]: {err}")
    } else {
        err.into()
    }
}

fn status_error(status: StatusCode, body: &str) -> anyhow::Error {
    let retryable = if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        " [retryable]"
    } else {
        ""
    };
    let detail = body.trim();
    if detail.is_empty() {
        anyhow!("embedding api error ({status}){retryable}")
    } else {
        anyhow!("embedding api error ({status}){retryable}: {detail}")
    }
}

fn is_retryable(err: &anyhow::Error) -> bool {
    err.to_string().contains("[retryable]")
}

fn backoff(attempt: u32) -> Duration {
    Duration::from_millis(200 * 2_u64.pow(attempt.saturating_sub(1)))
}

#[derive(Debug, Clone, Serialize)]
struct EmbeddingApiRequest {
    model: String,
    input: Vec<String>,
    encoding_format: String,
}

#[derive(Debug, Clone, Deserialize)]
struct EmbeddingApiResponse {
    data: Vec<EmbeddingApiItem>,
    model: String,
}

#[derive(Debug, Clone, Deserialize)]
struct EmbeddingApiItem {
    embedding: Vec<f32>,
    index: usize,
}

/// The service may return items out of order; restore input order and
/// reject gaps or duplicates.
fn extract_ordered_embeddings(response: EmbeddingApiResponse) -> Result<Vec<Vec<f32>>> {
    let mut data = response.data;
    data.sort_by_key(|item| item.index);

    for (expected, item) in data.iter().enumerate() {
        if item.index != expected {
            return Err(anyhow!(
                "missing or duplicated embedding index: expected {}, got {}",
                expected,
                item.index
            ));
        }
    }

    Ok(data.into_iter().map(|item| item.embedding).collect())
}

// ---------------------------------------------------------------------------
// Stub provider (deterministic, for tests)
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct StubEmbeddingProvider {
    dims: usize,
}

impl StubEmbeddingProvider {
    pub fn new(dims: usize) -> Self {
        Self { dims }
    }

    fn hash_to_unit_range(text: &str, index: usize) -> f32 {
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        hasher.update(index.to_le_bytes());
        let hash = hasher.finalize();
        let value = u32::from_le_bytes([hash[0], hash[1], hash[2], hash[3]]);
        (value as f32 / u32::MAX as f32) * 2.0 - 1.0
    }
}

#[async_trait]
impl EmbeddingProvider for StubEmbeddingProvider {
    async fn embed(&self, texts: &[String]) -> Result<EmbeddingResult> {
        let embeddings = texts
            .iter()
            .map(|text| {
                (0..self.dims)
                    .map(|index| Self::hash_to_unit_range(text, index))
                    .collect::<Vec<f32>>()
            })
            .collect();

        Ok(EmbeddingResult {
            embeddings,
            model: "stub".to_string(),
            dimensions: self.dims,
        })
    }

    fn model_id(&self) -> &str {
        "stub"
    }

    fn dimensions(&self) -> usize {
        self.dims
    }
}
