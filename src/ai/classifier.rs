//! Message Classifier
//!
//! Decides which backend role handles a message. An active attachment
//! always routes to the analytical role; otherwise the lower-cased message
//! is checked for any of the analysis trigger stems by substring containment.

use crate::chat::Role;
use crate::constants::routing::TRIGGER_STEMS;

/// Routing decision for one message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassificationDecision {
    Analytical,
    Conversational,
}

impl ClassificationDecision {
    /// Backend role that serves this decision
    pub fn role(self) -> Role {
        match self {
            Self::Analytical => Role::Analytical,
            Self::Conversational => Role::Conversational,
        }
    }
}

/// What triggered a decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassificationReason {
    AttachmentActive,
    Trigger(&'static str),
    NoTrigger,
}

/// Decision plus its reason, for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub decision: ClassificationDecision,
    pub reason: ClassificationReason,
}

impl std::fmt::Display for Classification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.reason {
            ClassificationReason::AttachmentActive => write!(f, "analytical (attachment active)"),
            ClassificationReason::Trigger(stem) => write!(f, "analytical (trigger '{}')", stem),
            ClassificationReason::NoTrigger => write!(f, "conversational (no trigger)"),
        }
    }
}

/// Stateless keyword router
pub struct Classifier;

impl Classifier {
    pub fn decide(message: &str, attachment_active: bool) -> ClassificationDecision {
        Self::explain(message, attachment_active).decision
    }

    pub fn explain(message: &str, attachment_active: bool) -> Classification {
        if attachment_active {
            return Classification {
                decision: ClassificationDecision::Analytical,
                reason: ClassificationReason::AttachmentActive,
            };
        }

        let lower = message.to_lowercase();
        match TRIGGER_STEMS.iter().find(|stem| lower.contains(*stem)) {
            Some(stem) => Classification {
                decision: ClassificationDecision::Analytical,
                reason: ClassificationReason::Trigger(stem),
            },
            None => Classification {
                decision: ClassificationDecision::Conversational,
                reason: ClassificationReason::NoTrigger,
            },
        }
    }
}
