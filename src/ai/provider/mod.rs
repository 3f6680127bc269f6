//! LLM Provider Abstraction
//!
//! Defines the [`LlmProvider`] trait for chat completion over a full turn
//! history. Providers return [`LlmResponse`] with token usage and timing.
//!
//! ## Modules
//!
//! - `openai`: any OpenAI-compatible `/chat/completions` endpoint
//! - `ollama`: native Ollama `/api/chat`

mod ollama;
mod openai;
#[cfg(test)]
pub(crate) mod stub;

pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;

// Re-export error types from centralized location
pub use crate::types::{ErrorCategory, ErrorClassifier, LlmError};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

use crate::ai::tools::ToolRegistry;
use crate::config::BackendConfig;
use crate::types::{ChatError, Result, Turn};

// =============================================================================
// Request / Response
// =============================================================================

/// One completion call: full history plus sampling limits
#[derive(Debug, Clone, Copy)]
pub struct CompletionRequest<'a> {
    /// Ordered turns, System first
    pub history: &'a [Turn],
    /// Creativity
    pub temperature: f32,
    /// Response-size ceiling
    pub max_tokens: u32,
    /// Tools the backend may call; `None` disables tool calling
    pub tools: Option<&'a ToolRegistry>,
}

/// Completion result with usage metrics
#[derive(Debug, Clone, Default)]
pub struct LlmResponse {
    /// Final assistant text; `None` when the backend returned no content
    pub content: Option<String>,
    /// Token usage summed over all tool rounds
    pub usage: TokenUsage,
    /// Response timing
    pub timing: ResponseTiming,
    /// Provider and model info
    pub metadata: ResponseMetadata,
    /// Number of tool calls executed
    pub tool_calls: usize,
}

impl LlmResponse {
    /// Create response with content only (usage unknown)
    pub fn content_only(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::default()
        }
    }
}

/// Token usage metrics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Input tokens (prompt)
    pub input_tokens: u32,
    /// Output tokens (response)
    pub output_tokens: u32,
}

impl TokenUsage {
    /// Total tokens used (input + output)
    pub fn total(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }

    /// Create from OpenAI-style usage response
    pub fn from_openai(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            input_tokens: prompt_tokens,
            output_tokens: completion_tokens,
        }
    }

    /// Create from Ollama-style usage response
    pub fn from_ollama(prompt_eval_count: u32, eval_count: u32) -> Self {
        Self {
            input_tokens: prompt_eval_count,
            output_tokens: eval_count,
        }
    }

    /// Accumulate another round
    pub fn add(&mut self, other: TokenUsage) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
    }
}

/// Response timing metrics
#[derive(Debug, Clone, Default)]
pub struct ResponseTiming {
    /// Total response time in milliseconds (wall clock)
    pub total_ms: u64,
    /// Processing time reported by the server
    pub api_ms: Option<u64>,
}

impl ResponseTiming {
    pub fn from_duration(duration: std::time::Duration) -> Self {
        Self {
            total_ms: duration.as_millis() as u64,
            api_ms: None,
        }
    }

    pub fn with_api_time(duration: std::time::Duration, api_ms: Option<u64>) -> Self {
        Self {
            total_ms: duration.as_millis() as u64,
            api_ms,
        }
    }
}

/// Response metadata
#[derive(Debug, Clone, Default)]
pub struct ResponseMetadata {
    /// Model used
    pub model: String,
    /// Provider name
    pub provider: String,
}

/// Shared provider handle, cloned into backend clients.
pub type SharedProvider = Arc<dyn LlmProvider + Send + Sync>;

// =============================================================================
// LLM Provider Trait
// =============================================================================

#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Complete the next assistant turn for `request.history`.
    ///
    /// When tools are supplied the provider runs the tool loop itself and
    /// returns only the final answer.
    async fn complete(&self, request: CompletionRequest<'_>) -> Result<LlmResponse>;

    /// Provider name for logging
    fn name(&self) -> &str;

    /// Model name currently in use
    fn model(&self) -> &str;

    /// Check if the provider is available
    async fn health_check(&self) -> Result<bool>;
}

// =============================================================================
// Construction
// =============================================================================

/// Builds providers from backend configuration.
///
/// The orchestrator calls this during initialization; tests substitute
/// factories that return mock providers.
pub trait ProviderFactory: Send + Sync {
    fn create(&self, config: &BackendConfig) -> Result<SharedProvider>;
}

/// Factory for the HTTP providers
#[derive(Debug, Default, Clone, Copy)]
pub struct HttpProviderFactory;

impl ProviderFactory for HttpProviderFactory {
    fn create(&self, config: &BackendConfig) -> Result<SharedProvider> {
        create_provider(config)
    }
}

/// Create a shared provider from configuration
pub fn create_provider(config: &BackendConfig) -> Result<SharedProvider> {
    match config.provider.as_str() {
        "openai" => Ok(Arc::new(OpenAiProvider::new(config)?)),
        "ollama" => Ok(Arc::new(OllamaProvider::new(config)?)),
        _ => Err(ChatError::Config(format!(
            "Unknown provider: {}. Supported: openai, ollama",
            config.provider
        ))),
    }
}

/// Validate endpoint URL for security (SSRF prevention)
///
/// Only allows http/https schemes and warns for non-localhost endpoints.
pub(crate) fn validate_endpoint(endpoint: &str, provider: &str) -> Result<String> {
    let url = url::Url::parse(endpoint).map_err(|e| {
        ChatError::Config(format!(
            "Invalid {} endpoint URL '{}': {}",
            provider, endpoint, e
        ))
    })?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ChatError::Config(format!(
            "{} endpoint must use http or https scheme, got: {}",
            provider,
            url.scheme()
        )));
    }

    if let Some(host) = url.host_str()
        && !matches!(host, "localhost" | "127.0.0.1" | "[::1]" | "::1")
    {
        warn!(
            "{} endpoint is not localhost: {}. Ensure this is intentional.",
            provider, host
        );
    }

    // Remove trailing slash for consistency
    let mut result = url.to_string();
    if result.ends_with('/') {
        result.pop();
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_usage_accumulates() {
        let mut usage = TokenUsage::from_openai(100, 50);
        usage.add(TokenUsage::from_ollama(10, 5));
        assert_eq!(usage.input_tokens, 110);
        assert_eq!(usage.output_tokens, 55);
        assert_eq!(usage.total(), 165);
    }

    #[test]
    fn test_validate_endpoint() {
        assert_eq!(
            validate_endpoint("http://localhost:11434/", "ollama").unwrap(),
            "http://localhost:11434"
        );
        assert_eq!(
            validate_endpoint("http://localhost:11434/v1", "openai").unwrap(),
            "http://localhost:11434/v1"
        );
        assert!(validate_endpoint("file:///etc/passwd", "ollama").is_err());
        assert!(validate_endpoint("not a url", "openai").is_err());
    }

    #[test]
    fn test_create_provider_by_name() {
        let mut config = BackendConfig::default();
        let provider = create_provider(&config).unwrap();
        assert_eq!(provider.name(), "openai");
        assert_eq!(provider.model(), "phi3:mini");

        config.provider = "ollama".to_string();
        assert_eq!(create_provider(&config).unwrap().name(), "ollama");

        config.provider = "mystery".to_string();
        assert!(create_provider(&config).is_err());
    }
}
