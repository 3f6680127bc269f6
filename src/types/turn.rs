//! Conversation turns

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Author of a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    System,
    User,
    Assistant,
}

impl TurnRole {
    /// Wire name used by chat-completion APIs
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnRole::System => "system",
            TurnRole::User => "user",
            TurnRole::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for TurnRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One message in a conversation history. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: TurnRole,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    pub fn new(role: TurnRole, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(TurnRole::System, text)
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(TurnRole::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(TurnRole::Assistant, text)
    }
}

/// Count words the way every budget and attachment check in this crate does:
/// split on space, tab and newline, dropping empty tokens.
pub fn word_count(text: &str) -> usize {
    text.split([' ', '\t', '\n'])
        .filter(|token| !token.is_empty())
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word_count_separators() {
        assert_eq!(word_count(""), 0);
        assert_eq!(word_count("   "), 0);
        assert_eq!(word_count("one"), 1);
        assert_eq!(word_count("one  two\tthree\nfour"), 4);
        assert_eq!(word_count("\n\nlead and trail \t"), 3);
    }

    #[test]
    fn test_word_count_keeps_carriage_return_attached() {
        // Only space, tab and newline separate words.
        assert_eq!(word_count("a\r\nb"), 2);
        assert_eq!(word_count("a\rb"), 1);
    }

    #[test]
    fn test_turn_constructors() {
        assert_eq!(Turn::system("s").role, TurnRole::System);
        assert_eq!(Turn::user("u").role, TurnRole::User);
        assert_eq!(Turn::assistant("a").role, TurnRole::Assistant);
        assert_eq!(TurnRole::Assistant.to_string(), "assistant");
    }
}
