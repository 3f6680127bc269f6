//! OpenAI-compatible Provider
//!
//! Chat Completions API as served by OpenAI and by local model servers
//! (Ollama, llama.cpp, vLLM) under `/v1`. Supports function-style tool
//! calling with a bounded number of rounds.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
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

const PROVIDER: &str = "openai";

/// OpenAI-compatible provider with secure API key handling
pub struct OpenAiProvider {
    /// Optional for local servers; never exposed in logs or debug output
    api_key: Option<SecretString>,
    api_base: String,
    model: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .finish()
    }
}

impl OpenAiProvider {
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .map(SecretString::from);

        let api_base = config
            .api_base
            .clone()
            .unwrap_or_else(|| network::DEFAULT_OPENAI_BASE.to_string());
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
            api_key,
            api_base,
            model: config.model.clone(),
            client,
        })
    }

    fn initial_messages(history: &[Turn]) -> Vec<ChatMessage> {
        history
            .iter()
            .map(|turn| ChatMessage::text(turn.role.as_str(), &turn.text))
            .collect()
    }

    fn build_request(
        &self,
        messages: &[ChatMessage],
        request: &CompletionRequest<'_>,
        tools: Option<&ToolRegistry>,
    ) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.model.clone(),
            messages: messages.to_vec(),
            temperature: request.temperature,
            max_tokens: Some(request.max_tokens),
            tools: tools
                .filter(|registry| !registry.is_empty())
                .map(|registry| {
                    registry
                        .definitions()
                        .into_iter()
                        .map(ToolSpec::function)
                        .collect()
                }),
        }
    }

    async fn post(&self, body: &ChatCompletionRequest) -> Result<ChatCompletionResponse> {
        let url = format!("{}/chat/completions", self.api_base);

        let mut builder = self.client.post(&url).json(body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key.expose_secret());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ChatError::Llm(ErrorClassifier::classify_transport(&e, PROVIDER)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ChatError::Llm(ErrorClassifier::classify_http_status(
                status.as_u16(),
                &format!("API error ({}): {}", status, body),
                PROVIDER,
            )));
        }

        response.json().await.map_err(|e| {
            ChatError::Llm(LlmError::with_provider(
                ErrorCategory::ParseError,
                format!("Failed to parse response: {}", e),
                PROVIDER,
            ))
        })
    }

    async fn run_tool_calls(
        registry: &ToolRegistry,
        calls: &[ToolCall],
        messages: &mut Vec<ChatMessage>,
    ) {
        for call in calls {
            let args = parse_arguments(&call.function.arguments);
            let output = registry.invoke(&call.function.name, &args).await;
            messages.push(ChatMessage::tool_result(&call.id, output));
        }
    }
}

/// Arguments arrive as a JSON-encoded string; malformed input becomes `{}`
fn parse_arguments(raw: &str) -> Value {
    if raw.trim().is_empty() {
        return Value::Object(Default::default());
    }
    serde_json::from_str(raw).unwrap_or_else(|e| {
        warn!("Malformed tool arguments ({}): {}", e, raw);
        Value::Object(Default::default())
    })
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    async fn complete(&self, request: CompletionRequest<'_>) -> Result<LlmResponse> {
        info!(
            "Completing with OpenAI-compatible API (model: {}, temperature: {}, max_tokens: {})",
            self.model, request.temperature, request.max_tokens
        );

        let start_time = Instant::now();
        let mut messages = Self::initial_messages(request.history);
        let mut usage = TokenUsage::default();
        let mut tool_calls = 0;
        let mut content = None;

        // Tool results of the last allowed round still get an answer: the
        // extra request carries no tools
        for round in 0..=MAX_TOOL_ROUNDS {
            let tools = request.tools.filter(|_| round < MAX_TOOL_ROUNDS);
            let body = self.build_request(&messages, &request, tools);
            debug!("Sending round {} to {}", round + 1, self.api_base);

            let response = self.post(&body).await?;
            if let Some(u) = response.usage {
                usage.add(TokenUsage::from_openai(u.prompt_tokens, u.completion_tokens));
            }

            let Some(message) = response.choices.into_iter().next().map(|c| c.message) else {
                content = None;
                break;
            };
            content = message.content.clone();

            let registry = match tools {
                Some(registry) if !message.tool_calls.is_empty() => registry,
                _ => break,
            };

            debug!("Backend requested {} tool call(s)", message.tool_calls.len());
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
            timing: ResponseTiming::from_duration(start_time.elapsed()),
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
        let url = format!("{}/models", self.api_base);

        let mut builder = self.client.get(&url);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key.expose_secret());
        }

        match builder.send().await {
            Ok(resp) if resp.status().is_success() => {
                info!("OpenAI-compatible API is available at {}", self.api_base);
                Ok(true)
            }
            Ok(resp) => {
                warn!("OpenAI-compatible API check failed: {}", resp.status());
                Ok(false)
            }
            Err(e) => {
                warn!("OpenAI-compatible API check failed: {}", e);
                Ok(false)
            }
        }
    }
}

// Request/Response types

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ToolSpec>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

impl ChatMessage {
    fn text(role: &str, content: &str) -> Self {
        Self {
            role: role.to_string(),
            content: Some(content.to_string()),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    fn tool_result(call_id: &str, output: String) -> Self {
        Self {
            role: "tool".to_string(),
            content: Some(output),
            tool_calls: Vec::new(),
            tool_call_id: Some(call_id.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ToolCall {
    id: String,
    #[serde(rename = "type", default = "function_type")]
    call_type: String,
    function: FunctionCall,
}

fn function_type() -> String {
    "function".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FunctionCall {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Serialize)]
struct ToolSpec {
    #[serde(rename = "type")]
    spec_type: &'static str,
    function: ToolDefinition,
}

impl ToolSpec {
    fn function(definition: ToolDefinition) -> Self {
        Self {
            spec_type: "function",
            function: definition,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
    usage: Option<UsageInfo>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct UsageInfo {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::provider::stub::StubServer;
    use serde_json::json;

    fn provider() -> OpenAiProvider {
        OpenAiProvider::new(&BackendConfig::default()).expect("Failed to create provider")
    }

    #[test]
    fn test_default_config() {
        let provider = provider();
        assert_eq!(provider.api_base, "http://localhost:11434/v1");
        assert_eq!(provider.model, "phi3:mini");
    }

    #[test]
    fn test_debug_redacts_key() {
        let config = BackendConfig {
            api_key: Some("sk-secret".to_string()),
            ..BackendConfig::default()
        };
        let provider = OpenAiProvider::new(&config).unwrap();
        assert!(!format!("{:?}", provider).contains("sk-secret"));
    }

    #[test]
    fn test_request_carries_history_and_limits() {
        let provider = provider();
        let history = vec![Turn::system("be brief"), Turn::user("hallo")];
        let registry = ToolRegistry::with_defaults();
        let request = CompletionRequest {
            history: &history,
            temperature: 0.3,
            max_tokens: 150,
            tools: Some(&registry),
        };

        let body = provider.build_request(
            &OpenAiProvider::initial_messages(&history),
            &request,
            request.tools,
        );
        let value = serde_json::to_value(&body).unwrap();

        assert_eq!(value["messages"][0]["role"], "system");
        assert_eq!(value["messages"][1]["content"], "hallo");
        assert_eq!(value["max_tokens"], 150);
        assert_eq!(value["tools"][0]["type"], "function");
        assert_eq!(value["tools"][0]["function"]["name"], "echo_message");
        assert!(value["messages"][0].get("tool_calls").is_none());
    }

    #[test]
    fn test_request_without_tools_omits_field() {
        let provider = provider();
        let history = vec![Turn::user("hallo")];
        let request = CompletionRequest {
            history: &history,
            temperature: 0.5,
            max_tokens: 20,
            tools: None,
        };
        let body = provider.build_request(
            &OpenAiProvider::initial_messages(&history),
            &request,
            request.tools,
        );
        let value = serde_json::to_value(&body).unwrap();
        assert!(value.get("tools").is_none());
    }

    #[test]
    fn test_parse_tool_call_response() {
        let raw = json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": { "name": "analyze_message", "arguments": "{\"message\":\"a b\"}" }
                    }]
                }
            }],
            "usage": { "prompt_tokens": 12, "completion_tokens": 3 }
        });

        let response: ChatCompletionResponse = serde_json::from_value(raw).unwrap();
        let message = &response.choices[0].message;
        assert!(message.content.is_none());
        assert_eq!(message.tool_calls[0].function.name, "analyze_message");
        assert_eq!(
            parse_arguments(&message.tool_calls[0].function.arguments)["message"],
            "a b"
        );
        assert_eq!(response.usage.unwrap().prompt_tokens, 12);
    }

    #[test]
    fn test_parse_arguments_tolerates_garbage() {
        assert_eq!(parse_arguments(""), json!({}));
        assert_eq!(parse_arguments("{not json"), json!({}));
    }

    #[tokio::test]
    async fn test_tool_results_are_appended() {
        let registry = ToolRegistry::with_defaults();
        let calls = vec![ToolCall {
            id: "call_7".to_string(),
            call_type: function_type(),
            function: FunctionCall {
                name: "echo_message".to_string(),
                arguments: "{\"message\":\"ping\"}".to_string(),
            },
        }];
        let mut messages = Vec::new();

        OpenAiProvider::run_tool_calls(&registry, &calls, &mut messages).await;

        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, "tool");
        assert_eq!(messages[0].tool_call_id.as_deref(), Some("call_7"));
        assert_eq!(messages[0].content.as_deref(), Some("[ECHO] ping"));
    }

    fn stub_provider(base: &str) -> OpenAiProvider {
        OpenAiProvider::new(&BackendConfig {
            api_base: Some(format!("{}/v1", base)),
            ..BackendConfig::default()
        })
        .unwrap()
    }

    fn echo_call(index: usize) -> Value {
        json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": format!("call_{}", index),
                        "type": "function",
                        "function": { "name": "echo_message", "arguments": "{\"message\":\"ping\"}" }
                    }]
                }
            }],
            "usage": { "prompt_tokens": 10, "completion_tokens": 2 }
        })
    }

    fn answer(text: &str) -> Value {
        json!({
            "choices": [{ "message": { "role": "assistant", "content": text } }],
            "usage": { "prompt_tokens": 20, "completion_tokens": 4 }
        })
    }

    fn tool_messages(body: &Value) -> usize {
        body["messages"]
            .as_array()
            .unwrap()
            .iter()
            .filter(|m| m["role"] == "tool")
            .count()
    }

    #[tokio::test]
    async fn test_tool_result_is_sent_back_for_answer() {
        let server = StubServer::start(|index| match index {
            0 => echo_call(index),
            _ => answer("Das Echo lautet ping."),
        })
        .await;
        let provider = stub_provider(&server.base);
        let history = vec![Turn::system("use tools"), Turn::user("Echo ping")];
        let registry = ToolRegistry::with_defaults();

        let response = provider
            .complete(CompletionRequest {
                history: &history,
                temperature: 0.3,
                max_tokens: 150,
                tools: Some(&registry),
            })
            .await
            .unwrap();

        assert_eq!(response.content.as_deref(), Some("Das Echo lautet ping."));
        assert_eq!(response.tool_calls, 1);
        assert_eq!(response.usage.total(), 36);
        assert_eq!(response.metadata.provider, "openai");

        let bodies = server.bodies();
        assert_eq!(bodies.len(), 2);
        let last = bodies[1]["messages"].as_array().unwrap().last().unwrap().clone();
        assert_eq!(last["role"], "tool");
        assert_eq!(last["tool_call_id"], "call_0");
        assert_eq!(last["content"], "[ECHO] ping");
        assert!(bodies[1].get("tools").is_some());
    }

    #[tokio::test]
    async fn test_exhausted_tool_rounds_end_with_toolless_request() {
        let server = StubServer::start(|index| {
            if index < MAX_TOOL_ROUNDS {
                echo_call(index)
            } else {
                answer("Zusammenfassung")
            }
        })
        .await;
        let provider = stub_provider(&server.base);
        let history = vec![Turn::user("Echo bis zum Ende")];
        let registry = ToolRegistry::with_defaults();

        let response = provider
            .complete(CompletionRequest {
                history: &history,
                temperature: 0.3,
                max_tokens: 150,
                tools: Some(&registry),
            })
            .await
            .unwrap();

        assert_eq!(response.content.as_deref(), Some("Zusammenfassung"));
        assert_eq!(response.tool_calls, MAX_TOOL_ROUNDS);

        let bodies = server.bodies();
        assert_eq!(bodies.len(), MAX_TOOL_ROUNDS + 1);
        let last = &bodies[MAX_TOOL_ROUNDS];
        assert!(last.get("tools").is_none());
        assert_eq!(tool_messages(last), MAX_TOOL_ROUNDS);
    }
}
