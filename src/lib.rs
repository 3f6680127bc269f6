//! chatroute - Local Chat Routing Client
//!
//! Routes every user message to one of two language-model backends: a
//! conversational one for small talk and an analytical one for counting,
//! measuring and reading documents. Each backend keeps its own history;
//! an attached file is folded into every following message.
//!
//! ## Quick Start
//!
//! ```ignore
//! use chatroute::{Config, Orchestrator};
//!
//! let mut orchestrator = Orchestrator::new(Config::default());
//! orchestrator.attach_file("notes.md").await;
//! let answer = orchestrator.send_message("Wie viele Wörter hat die Datei?").await;
//! ```
//!
//! ## Modules
//!
//! - [`ai`]: classifier, budget policy, providers and tools
//! - [`chat`]: sessions, attachments, backend clients and the orchestrator
//! - [`storage`]: SQLite transcripts with connection pooling
//! - [`config`]: layered configuration

pub mod ai;
pub mod chat;
pub mod cli;
pub mod config;
pub mod constants;
pub mod storage;
pub mod types;

// =============================================================================
// Core Re-exports
// =============================================================================

// Configuration
pub use config::{Config, ConfigLoader};

// Error Types
pub use types::error::{ChatError, ErrorCategory, ErrorKind, Result, ResultExt};

// Storage
pub use storage::database::PoolConfig;
pub use storage::{Database, SharedDatabase};

// =============================================================================
// Routing Re-exports
// =============================================================================

pub use chat::{
    AttachmentState, BackendClient, ConversationSession, FileAttachment, Orchestrator,
    PersistenceSink, Reply, Role,
};

pub use ai::{
    BudgetResult, Classifier, ClassificationDecision, LlmProvider, TextBudgetPolicy,
    TimeoutConfig, ToolRegistry, with_timeout,
};
