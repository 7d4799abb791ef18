//! OpenAI-compatible completion endpoints.
//!
//! These reuse the OpenAI wire format with a different base URL.

use crate::OpenAiProvider;

/// Ollama local API - OpenAI compatible.
/// Default: http://localhost:11434/v1
pub fn ollama() -> OpenAiProvider {
    ollama_with_base("http://localhost:11434/v1")
}

/// Ollama with a custom base URL. Ollama ignores the API key, but the
/// request format still carries one.
pub fn ollama_with_base(base_url: impl Into<String>) -> OpenAiProvider {
    OpenAiProvider::new("ollama", base_url)
}

/// Any other OpenAI-compatible endpoint.
pub fn custom(api_key: impl Into<String>, base_url: impl Into<String>) -> OpenAiProvider {
    OpenAiProvider::new(api_key, base_url)
}
