pub mod compat;
pub mod openai;

use std::pin::Pin;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use futures_core::Stream;
use paperchat_schema::ChatMessage;
use serde::{Deserialize, Serialize};
use tokio_stream::iter as stream_iter;

pub use compat::{custom, ollama, ollama_with_base};
pub use openai::OpenAiProvider;

/// One request to the completion collaborator: an optional system prompt
/// plus the full ordered message history.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub system: Option<String>,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, system: Option<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            system,
            messages,
            max_tokens: 1024,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub text: String,
    pub finish_reason: Option<String>,
}

/// One incremental fragment of a streamed completion.
#[derive(Debug, Clone)]
pub struct StreamChunk {
    pub delta: String,
    pub is_final: bool,
    pub finish_reason: Option<String>,
}

pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<StreamChunk>> + Send>>;

#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse>;
    async fn stream(&self, request: ChatRequest) -> Result<ChunkStream>;
}

// ============================================================
// Provider Configuration
// ============================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    OpenAi,
    Ollama,
    /// Any OpenAI-compatible endpoint.
    Custom,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(rename = "type")]
    pub provider_type: ProviderType,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
}

/// Build a completion provider from configuration.
pub fn create_provider(config: &ProviderConfig) -> Result<Arc<dyn CompletionProvider>> {
    let provider: Arc<dyn CompletionProvider> = match config.provider_type {
        ProviderType::OpenAi => {
            let key = config
                .api_key
                .as_ref()
                .ok_or_else(|| anyhow!("openai provider requires an api key"))?;
            let base_url = config.base_url.as_deref().unwrap_or("https://api.openai.com/v1");
            Arc::new(OpenAiProvider::new(key.clone(), base_url))
        }
        ProviderType::Ollama => {
            let base_url = config
                .base_url
                .as_deref()
                .unwrap_or("http://localhost:11434/v1");
            Arc::new(ollama_with_base(base_url))
        }
        ProviderType::Custom => {
            let key = config
                .api_key
                .as_ref()
                .ok_or_else(|| anyhow!("custom provider requires an api key"))?;
            let base_url = config
                .base_url
                .as_ref()
                .ok_or_else(|| anyhow!("custom provider requires a base_url"))?;
            Arc::new(custom(key.clone(), base_url.clone()))
        }
    };
    Ok(provider)
}

/// Offline provider for tests: streams the last user message back word by
/// word, prefixed so assertions can spot it.
pub struct StubCompletionProvider;

#[async_trait]
impl CompletionProvider for StubCompletionProvider {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        let user_text = request
            .messages
            .last()
            .map(|m| m.content.clone())
            .unwrap_or_default();
        Ok(ChatResponse {
            text: format!("[stub:{}] {}", request.model, user_text),
            finish_reason: Some("stop".into()),
        })
    }

    async fn stream(&self, request: ChatRequest) -> Result<ChunkStream> {
        let user_text = request
            .messages
            .last()
            .map(|m| m.content.clone())
            .unwrap_or_default();
        let full_text = format!("[stub:{}] {}", request.model, user_text);

        let mut chunks: Vec<Result<StreamChunk>> = full_text
            .split_whitespace()
            .map(|word| {
                Ok(StreamChunk {
                    delta: format!("{word} "),
                    is_final: false,
                    finish_reason: None,
                })
            })
            .collect();
        chunks.push(Ok(StreamChunk {
            delta: String::new(),
            is_final: true,
            finish_reason: Some("stop".into()),
        }));

        Ok(Box::pin(stream_iter(chunks)))
    }
}
