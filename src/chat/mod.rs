//! Chat Routing Core
//!
//! Sessions, attachments and backend clients for the two roles, tied
//! together by the [`Orchestrator`].

pub mod attachment;
pub mod backend;
pub mod orchestrator;
pub mod persistence;
pub mod role;
pub mod session;

pub use attachment::{AttachmentState, FileAttachment, PdfExtractor, TextExtractor};
pub use backend::BackendClient;
pub use orchestrator::{Orchestrator, Reply};
pub use persistence::PersistenceSink;
pub use role::{Role, RoleProfile};
pub use session::{ConversationSession, FileInstructionsStore, InstructionsStore, SessionState};
