//! Configuration Types
//!
//! All configuration structures with sensible defaults.
//! Supports global (~/.config/chatroute/) and project (.chatroute/) level configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::ai::budget::BudgetTable;
use crate::constants::{attachment, budget, models, network};
use crate::types::{ChatError, Result};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Configuration version
    pub version: String,

    /// Backend settings per role
    pub backends: BackendsConfig,

    /// Response-size step tables per role
    pub budget: BudgetConfig,

    /// Attachment limits
    pub attachment: AttachmentConfig,

    /// Role instructions location
    pub instructions: InstructionsConfig,

    /// Transcript storage
    pub storage: StorageConfig,

    /// Session behavior
    pub session: SessionConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            backends: BackendsConfig::default(),
            budget: BudgetConfig::default(),
            attachment: AttachmentConfig::default(),
            instructions: InstructionsConfig::default(),
            storage: StorageConfig::default(),
            session: SessionConfig::default(),
        }
    }
}

impl Config {
    /// Validate configuration values are within acceptable ranges.
    /// Returns `ChatError::Config` on validation failure.
    pub fn validate(&self) -> Result<()> {
        self.backends.conversational.validate("conversational")?;
        self.backends.analytical.validate("analytical")?;

        self.budget
            .conversational
            .validate()
            .map_err(|e| ChatError::Config(format!("budget.conversational: {}", e)))?;
        self.budget
            .analytical
            .validate()
            .map_err(|e| ChatError::Config(format!("budget.analytical: {}", e)))?;

        if self.attachment.max_file_bytes == 0 {
            return Err(ChatError::Config(
                "attachment.max_file_bytes must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

// =============================================================================
// Backend Configuration
// =============================================================================

/// Backend settings for both roles
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendsConfig {
    pub conversational: BackendConfig,
    pub analytical: BackendConfig,
}

impl Default for BackendsConfig {
    fn default() -> Self {
        Self {
            conversational: BackendConfig {
                model: models::CONVERSATIONAL.to_string(),
                temperature: budget::CONVERSATIONAL_TEMPERATURE,
                tools_enabled: false,
                ..BackendConfig::default()
            },
            analytical: BackendConfig {
                model: models::ANALYTICAL.to_string(),
                temperature: budget::ANALYTICAL_TEMPERATURE,
                tools_enabled: true,
                ..BackendConfig::default()
            },
        }
    }
}

/// Configuration for one completion backend
///
/// Note: API keys are never serialized to output and are redacted in debug
/// output. Providers convert the key to `SecretString` internally.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Provider type: "openai" (any OpenAI-compatible endpoint) or "ollama"
    pub provider: String,
    /// Model name (provider-specific)
    pub model: String,
    /// API base URL; provider default when unset
    pub api_base: Option<String>,
    /// API key (optional for local servers)
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Creativity parameter sent as temperature
    pub temperature: f32,
    /// Whether the backend may call registered tools
    pub tools_enabled: bool,
}

impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConfig")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("api_base", &self.api_base)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("timeout_secs", &self.timeout_secs)
            .field("temperature", &self.temperature)
            .field("tools_enabled", &self.tools_enabled)
            .finish()
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: models::CONVERSATIONAL.to_string(),
            api_base: None,
            api_key: None,
            timeout_secs: network::DEFAULT_TIMEOUT_SECS,
            temperature: budget::CONVERSATIONAL_TEMPERATURE,
            tools_enabled: false,
        }
    }
}

impl BackendConfig {
    fn validate(&self, role: &str) -> Result<()> {
        if !matches!(self.provider.as_str(), "openai" | "ollama") {
            return Err(ChatError::Config(format!(
                "backends.{}.provider must be 'openai' or 'ollama', got '{}'",
                role, self.provider
            )));
        }

        if self.model.trim().is_empty() {
            return Err(ChatError::Config(format!(
                "backends.{}.model must not be empty",
                role
            )));
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ChatError::Config(format!(
                "backends.{}.temperature must be between 0.0 and 2.0, got {}",
                role, self.temperature
            )));
        }

        if self.timeout_secs == 0 {
            return Err(ChatError::Config(format!(
                "backends.{}.timeout_secs must be greater than 0",
                role
            )));
        }

        Ok(())
    }
}

// =============================================================================
// Budget Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetConfig {
    pub conversational: BudgetTable,
    pub analytical: BudgetTable,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            conversational: BudgetTable::from_steps(
                budget::CONVERSATIONAL_STEPS,
                budget::CONVERSATIONAL_FALLBACK,
            ),
            analytical: BudgetTable::from_steps(
                budget::ANALYTICAL_STEPS,
                budget::ANALYTICAL_FALLBACK,
            ),
        }
    }
}

// =============================================================================
// Attachment Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AttachmentConfig {
    /// Maximum file size in bytes
    pub max_file_bytes: u64,

    /// Word count above which extracted PDFs get a warning banner
    pub long_document_words: usize,
}

impl Default for AttachmentConfig {
    fn default() -> Self {
        Self {
            max_file_bytes: attachment::MAX_FILE_BYTES,
            long_document_words: attachment::LONG_DOCUMENT_WORDS,
        }
    }
}

// =============================================================================
// Instructions Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InstructionsConfig {
    /// Directory holding `<role>-instructions.md` files
    pub dir: PathBuf,
}

impl Default for InstructionsConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(".chatroute/prompts"),
        }
    }
}

// =============================================================================
// Storage Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Record turns to the transcript database
    pub enabled: bool,

    /// SQLite database path
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: PathBuf::from(".chatroute/chat.db"),
        }
    }
}

// =============================================================================
// Session Configuration
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Drop the user turn from the session when its backend call fails
    pub rollback_failed_turns: bool,
}

// =============================================================================
// Tests
// =============================================================================
