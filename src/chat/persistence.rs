//! Transcript recording seam

use super::attachment::AttachmentState;
use super::role::Role;
use crate::types::{ConversationId, Result, Turn};

/// Receives every appended turn and every successful attachment.
///
/// The orchestrator logs and swallows errors from a sink; recording never
/// changes the outcome of a turn.
pub trait PersistenceSink: Send + Sync {
    fn create_conversation(&self, title: &str) -> Result<ConversationId>;

    fn record_turn(&self, conversation: ConversationId, role: Role, turn: &Turn) -> Result<()>;

    fn record_attachment(
        &self,
        conversation: ConversationId,
        attachment: &AttachmentState,
    ) -> Result<()>;
}
