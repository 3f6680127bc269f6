//! Ollama Local LLM Provider
//!
//! Native Ollama `/api/chat` endpoint with tool calling.
//! Returns LlmResponse with token usage reported by the server.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::{
    CompletionRequest, ErrorCategory, ErrorClassifier, LlmError, LlmProvider, LlmResponse,
    ResponseMetadata, ResponseTiming, TokenUsage, validate_endpoint,
};
use crate::ai::tools::{ToolDefinition, ToolRegistry};
use crate::config::BackendConfig;
use crate::constants::{network, tools::MAX_TOOL_ROUNDS};
use crate::types::{ChatError, Result, Turn};

const PROVIDER: &str = "ollama";

/// Ollama Local LLM Provider
#[derive(Debug)]
pub struct OllamaProvider {
    api_base: String,
    model: String,
    client: reqwest::Client,
}

impl OllamaProvider {
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let api_base = config
            .api_base
            .clone()
            .unwrap_or_else(|| network::DEFAULT_OLLAMA_BASE.to_string());

        // Validate endpoint URL for security (SSRF prevention)
        let api_base = validate_endpoint(&api_base, PROVIDER)?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                ChatError::Llm(LlmError::with_provider(
                    ErrorCategory::Unknown,
                    format!("Failed to create HTTP client: {}", e),
                    PROVIDER,
                ))
            })?;

        Ok(Self {
            api_base,
            model: config.model.clone(),
            client,
        })
    }

    fn initial_messages(history: &[Turn]) -> Vec<OllamaMessage> {
        history
            .iter()
            .map(|turn| OllamaMessage::text(turn.role.as_str(), &turn.text))
            .collect()
    }

    fn build_request(
        &self,
        messages: &[OllamaMessage],
        request: &CompletionRequest<'_>,
        tools: Option<&ToolRegistry>,
    ) -> OllamaChatRequest {
        OllamaChatRequest {
            model: self.model.clone(),
            messages: messages.to_vec(),
            stream: false,
            options: OllamaOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            },
            tools: tools
                .filter(|registry| !registry.is_empty())
                .map(|registry| {
                    registry
                        .definitions()
                        .into_iter()
                        .map(OllamaTool::function)
                        .collect()
                }),
        }
    }

    async fn post(&self, body: &OllamaChatRequest) -> Result<OllamaChatResponse> {
        let url = format!("{}/api/chat", self.api_base);

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                let mut err = ErrorClassifier::classify_transport(&e, PROVIDER);
                if e.is_connect() {
                    err.message = format!(
                        "Failed to connect to Ollama at {}. Start with: ollama serve",
                        self.api_base
                    );
                }
                ChatError::Llm(err)
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ChatError::Llm(ErrorClassifier::classify_http_status(
                status.as_u16(),
                &format!("Ollama API error ({}): {}", status, body),
                PROVIDER,
            )));
        }

        response.json().await.map_err(|e| {
            ChatError::Llm(LlmError::with_provider(
                ErrorCategory::ParseError,
                format!("Failed to parse Ollama response: {}", e),
                PROVIDER,
            ))
        })
    }

    async fn run_tool_calls(
        registry: &ToolRegistry,
        calls: &[OllamaToolCall],
        messages: &mut Vec<OllamaMessage>,
    ) {
        for call in calls {
            let output = registry
                .invoke(&call.function.name, &call.function.arguments)
                .await;
            messages.push(OllamaMessage::tool_result(&call.function.name, output));
        }
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    async fn complete(&self, request: CompletionRequest<'_>) -> Result<LlmResponse> {
        info!(
            "Completing with Ollama (model: {}, temperature: {}, num_predict: {})",
            self.model, request.temperature, request.max_tokens
        );

        let start_time = Instant::now();
        let mut messages = Self::initial_messages(request.history);
        let mut usage = TokenUsage::default();
        let mut api_ns = 0u64;
        let mut tool_calls = 0;
        let mut content = None;

        // Tool results of the last allowed round still get an answer: the
        // extra request carries no tools
        for round in 0..=MAX_TOOL_ROUNDS {
            let tools = request.tools.filter(|_| round < MAX_TOOL_ROUNDS);
            let body = self.build_request(&messages, &request, tools);
            debug!("Sending round {} to Ollama", round + 1);

            let response = self.post(&body).await?;
            usage.add(TokenUsage::from_ollama(
                response.prompt_eval_count.unwrap_or(0),
                response.eval_count.unwrap_or(0),
            ));
            api_ns += response.total_duration.unwrap_or(0);

            let message = response.message;
            content = Some(message.content.clone()).filter(|c| !c.is_empty());

            let registry = match tools {
                Some(registry) if !message.tool_calls.is_empty() => registry,
                _ => break,
            };

            debug!("Ollama requested {} tool call(s)", message.tool_calls.len());
            tool_calls += message.tool_calls.len();
            let calls = message.tool_calls.clone();
            messages.push(message);
            Self::run_tool_calls(registry, &calls, &mut messages).await;

            if round + 1 == MAX_TOOL_ROUNDS {
                warn!(
                    "Tool loop reached {} rounds; requesting final answer without tools",
                    MAX_TOOL_ROUNDS
                );
            }
        }

        Ok(LlmResponse {
            content,
            usage,
            timing: ResponseTiming::with_api_time(
                start_time.elapsed(),
                (api_ns > 0).then_some(api_ns / 1_000_000),
            ),
            metadata: ResponseMetadata {
                model: self.model.clone(),
                provider: PROVIDER.to_string(),
            },
            tool_calls,
        })
    }

    fn name(&self) -> &str {
        PROVIDER
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/api/tags", self.api_base);

        let response = self.client.get(&url).send().await;

        match response {
            Ok(resp) if resp.status().is_success() => {
                if let Ok(tags) = resp.json::<OllamaTagsResponse>().await {
                    let model_available = tags.models.iter().any(|m| {
                        m.name == self.model
                            || m.name.starts_with(&self.model.replace(":latest", ""))
                    });

                    if model_available {
                        info!("Ollama is available with model: {}", self.model);
                        Ok(true)
                    } else {
                        warn!(
                            "Ollama is running but model '{}' not found. Pull with: ollama pull {}",
                            self.model, self.model
                        );
                        Ok(false)
                    }
                } else {
                    info!("Ollama is available");
                    Ok(true)
                }
            }
            Ok(resp) => {
                warn!("Ollama API check failed: {}", resp.status());
                Ok(false)
            }
            Err(e) => {
                warn!("Ollama not available: {}. Start with: ollama serve", e);
                Ok(false)
            }
        }
    }
}

// Request/Response types

#[derive(Debug, Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    stream: bool,
    options: OllamaOptions,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<OllamaTool>>,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OllamaMessage {
    role: String,
    #[serde(default)]
    content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<OllamaToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_name: Option<String>,
}

impl OllamaMessage {
    fn text(role: &str, content: &str) -> Self {
        Self {
            role: role.to_string(),
            content: content.to_string(),
            tool_calls: Vec::new(),
            tool_name: None,
        }
    }

    fn tool_result(tool_name: &str, output: String) -> Self {
        Self {
            role: "tool".to_string(),
            content: output,
            tool_calls: Vec::new(),
            tool_name: Some(tool_name.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OllamaToolCall {
    function: OllamaFunctionCall,
}

/// Ollama sends arguments as a JSON object, not an encoded string
#[derive(Debug, Clone, Serialize, Deserialize)]
struct OllamaFunctionCall {
    name: String,
    #[serde(default)]
    arguments: Value,
}

#[derive(Debug, Serialize)]
struct OllamaTool {
    #[serde(rename = "type")]
    tool_type: &'static str,
    function: ToolDefinition,
}

impl OllamaTool {
    fn function(definition: ToolDefinition) -> Self {
        Self {
            tool_type: "function",
            function: definition,
        }
    }
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: OllamaMessage,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
    /// Nanoseconds
    #[serde(default)]
    total_duration: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct OllamaTagsResponse {
    models: Vec<OllamaModel>,
}

#[derive(Debug, Deserialize)]
struct OllamaModel {
    name: String,
}
