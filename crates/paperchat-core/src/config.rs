//! Application configuration.
//!
//! Loaded from a YAML file with sensible defaults for every field; the API
//! key itself never lives in the file, only the name of the environment
//! variable that holds it.

use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use paperchat_provider::{create_provider, CompletionProvider, ProviderConfig, ProviderType};
use paperchat_retrieval::{EmbeddingProvider, OpenAiEmbeddingProvider};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub provider: ProviderSettings,
    pub embedding: EmbeddingSettings,
    pub retrieval: RetrievalConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    #[serde(rename = "type")]
    pub provider_type: ProviderType,
    pub model: String,
    pub max_tokens: u32,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    pub base_url: Option<String>,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            provider_type: ProviderType::OpenAi,
            model: "gpt-4o".to_string(),
            max_tokens: 1024,
            api_key_env: "OPENAI_API_KEY".to_string(),
            base_url: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub model: String,
    pub dimensions: usize,
    pub base_url: Option<String>,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            model: "text-embedding-3-large".to_string(),
            dimensions: 3072,
            base_url: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 50,
            top_k: 5,
        }
    }
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: Self = serde_yaml::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Resolve the API key from the process environment. Absence is fatal
    /// at first use; Ollama is the one provider that runs without a key.
    pub fn resolve_api_key(&self) -> Result<Option<String>> {
        if self.provider.provider_type == ProviderType::Ollama {
            return Ok(None);
        }
        let var = &self.provider.api_key_env;
        match std::env::var(var) {
            Ok(key) if !key.is_empty() => Ok(Some(key)),
            _ => Err(anyhow!(
                "environment variable {var} is not set; an API key is required"
            )),
        }
    }

    pub fn completion_provider(&self) -> Result<Arc<dyn CompletionProvider>> {
        let config = ProviderConfig {
            provider_type: self.provider.provider_type.clone(),
            api_key: self.resolve_api_key()?,
            base_url: self.provider.base_url.clone(),
        };
        create_provider(&config)
    }

    pub fn embedding_provider(&self) -> Result<Arc<dyn EmbeddingProvider>> {
        let key = self
            .resolve_api_key()?
            .unwrap_or_else(|| "ollama".to_string());
        let mut provider = OpenAiEmbeddingProvider::with_model(
            key,
            self.embedding.model.clone(),
            self.embedding.dimensions,
        );
        if let Some(base_url) = &self.embedding.base_url {
            provider = provider.with_base_url(base_url.clone());
        }
        Ok(Arc::new(provider))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_fixed_pipeline_constants() {
        let config = AppConfig::default();
        assert_eq!(config.retrieval.chunk_size, 500);
        assert_eq!(config.retrieval.chunk_overlap, 50);
        assert_eq!(config.retrieval.top_k, 5);
        assert_eq!(config.provider.model, "gpt-4o");
        assert_eq!(config.embedding.model, "text-embedding-3-large");
        assert_eq!(config.embedding.dimensions, 3072);
    }

    #[test]
    fn partial_yaml_falls_back_to_defaults() {
        let yaml = "provider:\n  model: gpt-4o-mini\n";
        let config: AppConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.provider.model, "gpt-4o-mini");
        assert_eq!(config.retrieval.top_k, 5);
        assert_eq!(config.provider.api_key_env, "OPENAI_API_KEY");
    }

    #[test]
    fn missing_api_key_env_is_an_error() {
        let mut config = AppConfig::default();
        config.provider.api_key_env = "PAPERCHAT_TEST_KEY_THAT_IS_NOT_SET".to_string();
        let err = config.resolve_api_key().unwrap_err();
        assert!(err.to_string().contains("PAPERCHAT_TEST_KEY_THAT_IS_NOT_SET"));
    }

    #[test]
    fn ollama_needs_no_api_key() {
        let mut config = AppConfig::default();
        config.provider.provider_type = ProviderType::Ollama;
        assert!(config.resolve_api_key().unwrap().is_none());
        assert!(config.completion_provider().is_ok());
    }

    #[test]
    fn config_yaml_roundtrip() {
        let config = AppConfig::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: AppConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.provider.model, config.provider.model);
        assert_eq!(parsed.retrieval.chunk_size, config.retrieval.chunk_size);
    }
}
