pub mod error;
pub mod turn;

pub use error::{
    ChatError, ErrorCategory, ErrorClassifier, ErrorKind, LlmError, Result, ResultExt,
};
pub use turn::{Turn, TurnRole, word_count};

// =============================================================================
// Domain Newtypes
// =============================================================================

use std::fmt;

/// Type-safe wrapper for persisted conversation IDs
///
/// Prevents accidental mixing of conversation IDs with other row IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConversationId(i64);

impl ConversationId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn get(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for ConversationId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}
