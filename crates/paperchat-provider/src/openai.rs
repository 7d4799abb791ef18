//! OpenAI chat-completions provider with SSE streaming.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use futures_core::Stream;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_stream::StreamExt;

use crate::{ChatRequest, ChatResponse, ChunkStream, CompletionProvider, StreamChunk};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const MAX_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone)]
pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: String,
    api_base: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProviderErrorKind {
    RateLimit,
    ServerError,
    Timeout,
    AuthError,
    InvalidRequest,
    Unknown,
}

impl ProviderErrorKind {
    pub fn from_status(status: StatusCode) -> Self {
        match status.as_u16() {
            429 => Self::RateLimit,
            401 | 403 => Self::AuthError,
            400 | 422 => Self::InvalidRequest,
            500..=599 => Self::ServerError,
            _ => Self::Unknown,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimit | Self::ServerError | Self::Timeout)
    }
}

impl OpenAiProvider {
    pub fn new(api_key: impl Into<String>, api_base: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap_or_default(),
            api_key: api_key.into(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
        }
    }

    pub(crate) fn to_api_request(request: ChatRequest) -> ApiRequest {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if let Some(system) = request.system {
            messages.push(ApiMessage {
                role: "system".to_string(),
                content: system,
            });
        }
        messages.extend(request.messages.into_iter().map(|m| ApiMessage {
            role: m.role.as_str().to_string(),
            content: m.content,
        }));

        ApiRequest {
            model: request.model,
            messages,
            max_tokens: request.max_tokens,
            stream: false,
        }
    }

    /// POST the payload, retrying transient failures; a non-OK final status
    /// becomes a classified error.
    async fn send_with_retry(&self, payload: &ApiRequest) -> Result<reqwest::Response> {
        let url = format!("{}/chat/completions", self.api_base);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let sent = self
                .client
                .post(&url)
                .bearer_auth(&self.api_key)
                .header("content-type", "application/json")
                .json(payload)
                .send()
                .await;

            let err = match sent {
                Ok(resp) if resp.status() == StatusCode::OK => return Ok(resp),
                Ok(resp) => {
                    let status = resp.status();
                    let body = resp.text().await.unwrap_or_default();
                    let parsed = serde_json::from_str::<ApiError>(&body).ok();
                    format_api_error(status, parsed)
                }
                Err(e) if e.is_timeout() => anyhow!(
                    "completion api error (timeout) [retryable]: request timed out after {}s",
                    REQUEST_TIMEOUT.as_secs()
                ),
                Err(e) if e.is_connect() => {
                    anyhow!("completion api error (connect) [retryable]: {e}")
                }
                Err(e) => return Err(e.into()),
            };

            if attempt < MAX_ATTEMPTS && err.to_string().contains("[retryable]") {
                tracing::warn!(attempt, "completion call failed, retrying: {err}");
                tokio::time::sleep(backoff(attempt)).await;
                continue;
            }
            return Err(err);
        }
    }
}

#[async_trait]
impl CompletionProvider for OpenAiProvider {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        let payload = Self::to_api_request(request);
        let resp = self.send_with_retry(&payload).await?;
        let body: ApiResponse = resp.json().await?;

        let choice = body
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("completion response contained no choices"))?;
        Ok(ChatResponse {
            text: choice.message.map(|m| m.content).unwrap_or_default(),
            finish_reason: choice.finish_reason,
        })
    }

    async fn stream(&self, request: ChatRequest) -> Result<ChunkStream> {
        let mut payload = Self::to_api_request(request);
        payload.stream = true;

        // Establishment failures (connect, status) are retried; once the
        // stream is open it is consumed exactly once and never restarted.
        let resp = self.send_with_retry(&payload).await?;
        Ok(Box::pin(parse_sse_stream(resp.bytes_stream())))
    }
}

fn backoff(attempt: u32) -> Duration {
    Duration::from_millis(200 * 2_u64.pow(attempt.saturating_sub(1)))
}

fn parse_sse_stream(
    byte_stream: impl Stream<Item = std::result::Result<bytes::Bytes, reqwest::Error>> + Send + 'static,
) -> impl Stream<Item = Result<StreamChunk>> + Send {
    async_stream::stream! {
        tokio::pin!(byte_stream);
        let mut buffer = String::new();

        while let Some(chunk_result) = byte_stream.next().await {
            match chunk_result {
                Ok(bytes) => {
                    buffer.push_str(&String::from_utf8_lossy(&bytes));

                    while let Some(pos) = buffer.find("\n\n") {
                        let event_text = buffer[..pos].to_string();
                        buffer = buffer[pos + 2..].to_string();

                        for line in event_text.lines() {
                            let Some(data) = line.strip_prefix("data: ") else {
                                continue;
                            };
                            if data == "[DONE]" {
                                continue;
                            }
                            match serde_json::from_str::<serde_json::Value>(data) {
                                Ok(event) => {
                                    if let Some(chunk) = parse_sse_event(&event) {
                                        yield Ok(chunk);
                                    }
                                }
                                Err(e) => {
                                    yield Err(anyhow!("invalid sse event payload: {e}"));
                                    return;
                                }
                            }
                        }
                    }
                }
                Err(e) => {
                    yield Err(anyhow!("stream error: {e}"));
                    return;
                }
            }
        }
    }
}

fn parse_sse_event(event: &serde_json::Value) -> Option<StreamChunk> {
    let choice = event.get("choices")?.as_array()?.first()?;
    let finish_reason = choice
        .get("finish_reason")
        .and_then(|value| value.as_str())
        .map(std::string::ToString::to_string);
    let delta = choice
        .get("delta")
        .and_then(|d| d.get("content"))
        .and_then(|c| c.as_str())
        .unwrap_or_default()
        .to_string();

    if delta.is_empty() && finish_reason.is_none() {
        // Role-announcement preamble; nothing to surface.
        return None;
    }

    Some(StreamChunk {
        delta,
        is_final: finish_reason.is_some(),
        finish_reason,
    })
}

fn format_api_error(status: StatusCode, parsed: Option<ApiError>) -> anyhow::Error {
    let kind = ProviderErrorKind::from_status(status);
    let retryable = if kind.is_retryable() {
        " [retryable]"
    } else {
        ""
    };
    if let Some(api_error) = parsed {
        let detail = api_error.error;
        anyhow!(
            "completion api error ({status}){retryable}: {} ({})",
            detail.message,
            detail.r#type
        )
    } else {
        anyhow!("completion api error ({status}){retryable}")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ApiRequest {
    pub model: String,
    pub messages: Vec<ApiMessage>,
    pub max_tokens: u32,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub stream: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ApiMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ApiResponse {
    pub choices: Vec<ApiChoice>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ApiChoice {
    #[serde(default)]
    pub message: Option<ApiMessage>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ApiError {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ApiErrorDetail {
    #[serde(rename = "type", default)]
    pub r#type: String,
    pub message: String,
}
