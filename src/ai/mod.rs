//! AI Integration Layer
//!
//! Routing decisions, response budgets, local tools and the completion
//! providers behind both backend roles.

pub mod budget;
pub mod classifier;
pub mod provider;
pub mod timeout;
pub mod tools;

pub use budget::{BudgetResult, BudgetStep, BudgetTable, BudgetTableError, TextBudgetPolicy};
pub use classifier::{Classification, ClassificationDecision, ClassificationReason, Classifier};
pub use provider::{
    CompletionRequest, HttpProviderFactory, LlmProvider, LlmResponse, OllamaProvider,
    OpenAiProvider, ProviderFactory, ResponseMetadata, ResponseTiming, SharedProvider, TokenUsage,
    create_provider,
};
pub use timeout::{TimeoutConfig, with_timeout, with_timeout_map};
pub use tools::{Tool, ToolDefinition, ToolRegistry};
