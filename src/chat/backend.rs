//! Role-parameterized backend client

use std::sync::Arc;
use tracing::{debug, warn};

use super::role::{Role, RoleProfile};
use crate::ai::budget::BudgetResult;
use crate::ai::provider::{CompletionRequest, SharedProvider};
use crate::ai::tools::ToolRegistry;
use crate::constants::text::NO_ANSWER_PLACEHOLDER;
use crate::types::{ChatError, LlmError, Result, Turn};

/// Completion client for one role. Holds configuration only; the session
/// history is passed in per call and never modified here.
pub struct BackendClient {
    profile: RoleProfile,
    provider: SharedProvider,
    tools: Option<Arc<ToolRegistry>>,
}

impl std::fmt::Debug for BackendClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendClient")
            .field("role", &self.profile.role)
            .field("provider", &self.provider.name())
            .field("model", &self.provider.model())
            .field("tools", &self.tools)
            .finish()
    }
}

impl BackendClient {
    pub fn new(
        profile: RoleProfile,
        provider: SharedProvider,
        tools: Option<Arc<ToolRegistry>>,
    ) -> Self {
        Self {
            profile,
            provider,
            tools,
        }
    }

    pub fn role(&self) -> Role {
        self.profile.role
    }

    pub fn profile(&self) -> &RoleProfile {
        &self.profile
    }

    pub fn provider(&self) -> &SharedProvider {
        &self.provider
    }

    /// Request the next assistant turn.
    ///
    /// Empty content yields the fixed placeholder. Any provider failure is
    /// reported as `BackendUnavailable`; there is no retry.
    pub async fn complete(
        &self,
        history: &[Turn],
        budget: BudgetResult,
        tools_enabled: bool,
    ) -> Result<String> {
        let tools = if tools_enabled {
            self.tools.as_deref()
        } else {
            None
        };

        let request = CompletionRequest {
            history,
            temperature: budget.creativity,
            max_tokens: budget.max_response_units,
            tools,
        };

        let response = self.provider.complete(request).await.map_err(|e| {
            warn!("{} backend failed: {}", self.profile.role, e);
            ChatError::BackendUnavailable(match e {
                ChatError::Llm(err) | ChatError::BackendUnavailable(err) => err,
                other => LlmError::from_message(other.to_string()).provider(self.provider.name()),
            })
        })?;

        debug!(
            "{} backend answered via {}/{} ({} tokens, {} tool calls, {} ms, server {})",
            self.profile.role,
            response.metadata.provider,
            response.metadata.model,
            response.usage.total(),
            response.tool_calls,
            response.timing.total_ms,
            response
                .timing
                .api_ms
                .map_or_else(|| "n/a".to_string(), |ms| format!("{} ms", ms))
        );

        Ok(response
            .content
            .filter(|text| !text.trim().is_empty())
            .unwrap_or_else(|| NO_ANSWER_PLACEHOLDER.to_string()))
    }

    /// Probe the provider; failures count as unavailable
    pub async fn health_check(&self) -> bool {
        self.provider.health_check().await.unwrap_or(false)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::ai::provider::{LlmProvider, LlmResponse};
    use crate::config::Config;
    use crate::types::{ErrorCategory, ErrorKind};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// What a mock provider saw in its last call
    #[derive(Debug, Clone, Default)]
    pub(crate) struct SeenRequest {
        pub history_len: usize,
        pub last_text: String,
        pub temperature: f32,
        pub max_tokens: u32,
        pub tools: Vec<&'static str>,
    }

    /// Scripted provider for backend and orchestrator tests
    pub(crate) struct MockProvider {
        name: &'static str,
        reply: std::result::Result<Option<String>, ErrorCategory>,
        delay: Option<std::time::Duration>,
        pub seen: Mutex<Vec<SeenRequest>>,
    }

    impl MockProvider {
        pub fn replying(text: &str) -> Self {
            Self::with_reply(Ok(Some(text.to_string())))
        }

        pub fn empty() -> Self {
            Self::with_reply(Ok(None))
        }

        pub fn failing(category: ErrorCategory) -> Self {
            Self::with_reply(Err(category))
        }

        fn with_reply(reply: std::result::Result<Option<String>, ErrorCategory>) -> Self {
            Self {
                name: "mock",
                reply,
                delay: None,
                seen: Mutex::new(Vec::new()),
            }
        }

        /// Answer only after `delay`
        pub fn slow(mut self, delay: std::time::Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        pub fn calls(&self) -> Vec<SeenRequest> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl LlmProvider for MockProvider {
        async fn complete(&self, request: CompletionRequest<'_>) -> Result<LlmResponse> {
            self.seen.lock().unwrap().push(SeenRequest {
                history_len: request.history.len(),
                last_text: request
                    .history
                    .last()
                    .map(|t| t.text.clone())
                    .unwrap_or_default(),
                temperature: request.temperature,
                max_tokens: request.max_tokens,
                tools: request.tools.map(|r| r.names()).unwrap_or_default(),
            });

            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }

            match &self.reply {
                Ok(Some(text)) => Ok(LlmResponse::content_only(text.clone())),
                Ok(None) => Ok(LlmResponse::default()),
                Err(category) => Err(ChatError::Llm(LlmError::with_provider(
                    *category,
                    "connection refused",
                    self.name,
                ))),
            }
        }

        fn name(&self) -> &str {
            self.name
        }

        fn model(&self) -> &str {
            "mock-model"
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(self.reply.is_ok())
        }
    }

    fn client(role: Role, provider: Arc<MockProvider>) -> BackendClient {
        BackendClient::new(
            RoleProfile::from_config(role, &Config::default()),
            provider,
            Some(Arc::new(ToolRegistry::with_defaults())),
        )
    }

    fn budget() -> BudgetResult {
        BudgetResult {
            max_response_units: 150,
            creativity: 0.3,
        }
    }

    #[tokio::test]
    async fn test_passes_history_and_budget() {
        let provider = Arc::new(MockProvider::replying("42 Wörter"));
        let client = client(Role::Analytical, provider.clone());
        let history = vec![Turn::system("sys"), Turn::user("Zähle")];

        let text = client.complete(&history, budget(), true).await.unwrap();

        assert_eq!(text, "42 Wörter");
        let calls = provider.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].history_len, 2);
        assert_eq!(calls[0].max_tokens, 150);
        assert_eq!(calls[0].temperature, 0.3);
        assert_eq!(calls[0].tools.len(), 3);
    }

    #[tokio::test]
    async fn test_tools_withheld_when_disabled() {
        let provider = Arc::new(MockProvider::replying("Hallo"));
        let client = client(Role::Conversational, provider.clone());

        client
            .complete(&[Turn::user("Hi")], budget(), false)
            .await
            .unwrap();
        assert!(provider.calls()[0].tools.is_empty());
    }

    #[tokio::test]
    async fn test_empty_content_uses_placeholder() {
        let provider = Arc::new(MockProvider::empty());
        let client = client(Role::Conversational, provider);

        let text = client
            .complete(&[Turn::user("Hi")], budget(), false)
            .await
            .unwrap();
        assert_eq!(text, "no answer received");
    }

    #[tokio::test]
    async fn test_failure_is_backend_unavailable() {
        let provider = Arc::new(MockProvider::failing(ErrorCategory::Network));
        let client = client(Role::Analytical, provider);

        let err = client
            .complete(&[Turn::user("Hi")], budget(), true)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BackendUnavailable);
        assert!(err.to_string().contains("connection refused"));
        assert!(!client.health_check().await);
    }
}
