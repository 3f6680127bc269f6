//! Unified Error Type System
//!
//! Centralized error types for the whole crate.
//!
//! ## Error Kinds
//!
//! The routing core reports six failure kinds to its callers:
//!
//! - **InitializationFailed**: a backend client could not be constructed
//! - **NotFound**: attachment path is not an existing regular file
//! - **TooLarge**: attachment exceeds the size ceiling
//! - **UnsupportedType**: attachment extension is not on the allow-list
//! - **ExtractionFailed**: document text could not be extracted
//! - **BackendUnavailable**: the completion backend failed
//!
//! Backend failures carry a structured [`LlmError`] whose [`ErrorCategory`]
//! is classified from the HTTP status or the provider message, so the
//! user-facing text can say *why* a backend was unreachable.

use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Error Categories
// =============================================================================

/// Categories of backend failure, used for user-facing hints and logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Rate limited by the backend
    RateLimit,
    /// Context/token limit exceeded
    TokenLimit,
    /// Authentication failed
    Auth,
    /// Network/connectivity issues (backend not running, DNS, timeouts)
    Network,
    /// Model or endpoint not available
    Unavailable,
    /// Invalid request
    BadRequest,
    /// Backend response could not be parsed
    ParseError,
    /// Temporary server issues
    Transient,
    /// Unknown error
    Unknown,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RateLimit => write!(f, "RATE_LIMIT"),
            Self::TokenLimit => write!(f, "TOKEN_LIMIT"),
            Self::Auth => write!(f, "AUTH"),
            Self::Network => write!(f, "NETWORK"),
            Self::Unavailable => write!(f, "UNAVAILABLE"),
            Self::BadRequest => write!(f, "BAD_REQUEST"),
            Self::ParseError => write!(f, "PARSE_ERROR"),
            Self::Transient => write!(f, "TRANSIENT"),
            Self::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

impl ErrorCategory {
    /// Short hint shown to the user next to a failed turn
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::Network => Some("Is the model server running?"),
            Self::Unavailable => Some("Check that the configured model is installed."),
            Self::Auth => Some("Check the API key for this backend."),
            Self::RateLimit => Some("The backend is rate limiting requests; try again later."),
            Self::TokenLimit => Some("The conversation or attachment is too long for the model."),
            _ => None,
        }
    }
}

// =============================================================================
// LLM Error
// =============================================================================

/// Backend error with category and provider context
#[derive(Debug, Clone)]
pub struct LlmError {
    /// Error category
    pub category: ErrorCategory,
    /// Detailed error message
    pub message: String,
    /// Provider that produced the error
    pub provider: Option<String>,
}

impl std::fmt::Display for LlmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(provider) = &self.provider {
            write!(f, "[{}:{}] {}", provider, self.category, self.message)
        } else {
            write!(f, "[{}] {}", self.category, self.message)
        }
    }
}

impl std::error::Error for LlmError {}

impl LlmError {
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
            provider: None,
        }
    }

    pub fn with_provider(
        category: ErrorCategory,
        message: impl Into<String>,
        provider: impl Into<String>,
    ) -> Self {
        Self {
            category,
            message: message.into(),
            provider: Some(provider.into()),
        }
    }

    /// Add provider context to existing error
    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Create from simple message (defaults to Unknown category)
    pub fn from_message(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Unknown, message)
    }
}

// =============================================================================
// Error Classifier
// =============================================================================

/// Maps raw provider failures onto an [`ErrorCategory`]
pub struct ErrorClassifier;

impl ErrorClassifier {
    /// Classify an error message from any provider
    pub fn classify(message: &str, provider: &str) -> LlmError {
        let lower = message.to_lowercase();

        if lower.contains("rate limit")
            || lower.contains("429")
            || lower.contains("too many requests")
        {
            return LlmError::with_provider(ErrorCategory::RateLimit, message, provider);
        }

        if lower.contains("context length")
            || lower.contains("context window")
            || (lower.contains("token") && lower.contains("limit"))
        {
            return LlmError::with_provider(ErrorCategory::TokenLimit, message, provider);
        }

        if lower.contains("401")
            || lower.contains("403")
            || lower.contains("api key")
            || lower.contains("unauthorized")
        {
            return LlmError::with_provider(ErrorCategory::Auth, message, provider);
        }

        if lower.contains("connect")
            || lower.contains("dns")
            || lower.contains("timed out")
            || lower.contains("timeout")
            || lower.contains("unreachable")
        {
            return LlmError::with_provider(ErrorCategory::Network, message, provider);
        }

        if lower.contains("model") && lower.contains("not found") {
            return LlmError::with_provider(ErrorCategory::Unavailable, message, provider);
        }

        if lower.contains("parse") || lower.contains("json") || lower.contains("decode") {
            return LlmError::with_provider(ErrorCategory::ParseError, message, provider);
        }

        LlmError::with_provider(ErrorCategory::Unknown, message, provider)
    }

    /// Classify HTTP status code directly (more accurate than string matching)
    pub fn classify_http_status(status: u16, message: &str, provider: &str) -> LlmError {
        match status {
            429 => LlmError::with_provider(ErrorCategory::RateLimit, message, provider),
            401 | 403 => LlmError::with_provider(ErrorCategory::Auth, message, provider),
            400 => LlmError::with_provider(ErrorCategory::BadRequest, message, provider),
            404 => LlmError::with_provider(ErrorCategory::Unavailable, message, provider),
            500 | 502 | 503 | 504 => {
                LlmError::with_provider(ErrorCategory::Transient, message, provider)
            }
            _ => LlmError::with_provider(ErrorCategory::Unknown, message, provider),
        }
    }

    /// Classify a transport error from the HTTP client
    pub fn classify_transport(err: &reqwest::Error, provider: &str) -> LlmError {
        if err.is_connect() || err.is_timeout() {
            LlmError::with_provider(ErrorCategory::Network, err.to_string(), provider)
        } else if err.is_decode() {
            LlmError::with_provider(ErrorCategory::ParseError, err.to_string(), provider)
        } else {
            Self::classify(&err.to_string(), provider)
        }
    }
}

// =============================================================================
// Error Kind
// =============================================================================

/// Failure kinds reported by the routing core
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InitializationFailed,
    NotFound,
    TooLarge,
    UnsupportedType,
    ExtractionFailed,
    BackendUnavailable,
    /// Anything outside the routing taxonomy (I/O, storage, config)
    Other,
}

// =============================================================================
// Application Error
// =============================================================================

#[derive(Debug, Error)]
pub enum ChatError {
    // -------------------------------------------------------------------------
    // System Errors (auto From impl)
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    // -------------------------------------------------------------------------
    // Routing Core Errors
    // -------------------------------------------------------------------------
    #[error("Initialization failed: {0}")]
    InitializationFailed(String),

    #[error("File not found: {path}")]
    NotFound { path: String },

    #[error("File is too large ({size_mb} MB). Maximum: {max_mb} MB")]
    TooLarge { size_mb: u64, max_mb: u64 },

    #[error("Unsupported file type '{extension}'. Supported: {supported}")]
    UnsupportedType {
        extension: String,
        supported: String,
    },

    #[error("Text extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("Backend unavailable: {0}")]
    BackendUnavailable(LlmError),

    // -------------------------------------------------------------------------
    // Provider Errors
    // -------------------------------------------------------------------------
    /// Raw provider failure, before a backend client wraps it
    #[error("LLM error: {0}")]
    Llm(LlmError),

    // -------------------------------------------------------------------------
    // Ambient Errors
    // -------------------------------------------------------------------------
    #[error("Config error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Timeout after {duration:?}: {operation}")]
    Timeout {
        operation: String,
        duration: Duration,
    },
}

impl From<LlmError> for ChatError {
    fn from(err: LlmError) -> Self {
        ChatError::Llm(err)
    }
}

pub type Result<T> = std::result::Result<T, ChatError>;

// =============================================================================
// Helper Functions
// =============================================================================

impl ChatError {
    /// Create a timeout error
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Map onto the routing failure taxonomy
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InitializationFailed(_) => ErrorKind::InitializationFailed,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::TooLarge { .. } => ErrorKind::TooLarge,
            Self::UnsupportedType { .. } => ErrorKind::UnsupportedType,
            Self::ExtractionFailed(_) => ErrorKind::ExtractionFailed,
            Self::BackendUnavailable(_) => ErrorKind::BackendUnavailable,
            _ => ErrorKind::Other,
        }
    }

    /// Render the error as the text returned to the chat user in place of an answer
    pub fn user_message(&self) -> String {
        match self {
            Self::BackendUnavailable(err) | Self::Llm(err) => match err.category.hint() {
                Some(hint) => format!("Error: {} {}", self, hint),
                None => format!("Error: {}", self),
            },
            _ => format!("Error: {}", self),
        }
    }
}

/// Context extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context to an error
    fn with_context<C: Into<String>>(self, context: C) -> Result<T>;

    /// Add context using a closure (lazy evaluation)
    fn with_context_fn<F, C>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: Into<String>;
}

impl<T, E: std::error::Error + Send + Sync + 'static> ResultExt<T> for std::result::Result<T, E> {
    fn with_context<C: Into<String>>(self, context: C) -> Result<T> {
        self.map_err(|e| ChatError::Storage(format!("{}: {}", context.into(), e)))
    }

    fn with_context_fn<F, C>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: Into<String>,
    {
        self.map_err(|e| ChatError::Storage(format!("{}: {}", f().into(), e)))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_category_display() {
        assert_eq!(ErrorCategory::RateLimit.to_string(), "RATE_LIMIT");
        assert_eq!(ErrorCategory::Network.to_string(), "NETWORK");
        assert_eq!(ErrorCategory::Unknown.to_string(), "UNKNOWN");
    }

    #[test]
    fn test_classify_messages() {
        let err = ErrorClassifier::classify("error sending request: connection refused", "ollama");
        assert_eq!(err.category, ErrorCategory::Network);
        assert_eq!(err.provider.as_deref(), Some("ollama"));

        let err = ErrorClassifier::classify("model 'qwen2.5:7b' not found", "ollama");
        assert_eq!(err.category, ErrorCategory::Unavailable);

        let err = ErrorClassifier::classify("Too Many Requests", "openai");
        assert_eq!(err.category, ErrorCategory::RateLimit);

        let err = ErrorClassifier::classify("something odd", "openai");
        assert_eq!(err.category, ErrorCategory::Unknown);
    }

    #[test]
    fn test_classify_http_status() {
        assert_eq!(
            ErrorClassifier::classify_http_status(429, "slow down", "openai").category,
            ErrorCategory::RateLimit
        );
        assert_eq!(
            ErrorClassifier::classify_http_status(401, "nope", "openai").category,
            ErrorCategory::Auth
        );
        assert_eq!(
            ErrorClassifier::classify_http_status(404, "missing", "ollama").category,
            ErrorCategory::Unavailable
        );
        assert_eq!(
            ErrorClassifier::classify_http_status(503, "busy", "ollama").category,
            ErrorCategory::Transient
        );
    }

    #[test]
    fn test_too_large_display() {
        let err = ChatError::TooLarge {
            size_mb: 5,
            max_mb: 4,
        };
        assert_eq!(err.to_string(), "File is too large (5 MB). Maximum: 4 MB");
        assert_eq!(err.kind(), ErrorKind::TooLarge);
    }

    #[test]
    fn test_kind_mapping() {
        assert_eq!(
            ChatError::InitializationFailed("boom".into()).kind(),
            ErrorKind::InitializationFailed
        );
        assert_eq!(
            ChatError::NotFound {
                path: "x".into()
            }
            .kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            ChatError::BackendUnavailable(LlmError::from_message("down")).kind(),
            ErrorKind::BackendUnavailable
        );
        assert_eq!(ChatError::Config("bad".into()).kind(), ErrorKind::Other);
    }

    #[test]
    fn test_user_message_includes_hint() {
        let err = ChatError::BackendUnavailable(LlmError::with_provider(
            ErrorCategory::Network,
            "connection refused",
            "ollama",
        ));
        let message = err.user_message();
        assert!(message.starts_with("Error: Backend unavailable"));
        assert!(message.contains("connection refused"));
        assert!(message.contains("Is the model server running?"));
    }

    #[test]
    fn test_with_context() {
        let result: std::result::Result<(), std::io::Error> =
            Err(std::io::Error::other("disk gone"));
        let err = result.with_context("Failed to save message").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Storage error: Failed to save message: disk gone"
        );
    }
}
