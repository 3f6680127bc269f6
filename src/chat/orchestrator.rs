//! Turn Orchestrator
//!
//! Drives one conversation: classifies each message, builds the final text
//! (attachment context first), budgets it, appends it to the chosen role's
//! session and asks that role's backend for the answer.
//!
//! ## Failure boundary
//!
//! [`Orchestrator::send_message`] and [`Orchestrator::attach_file`] never
//! return errors; failures come back as user-facing text. The typed
//! variants ([`Orchestrator::try_send_message`], [`Orchestrator::try_attach_file`])
//! expose the underlying [`ChatError`].
//!
//! ## Concurrency
//!
//! Every mutating operation takes `&mut self`, so at most one send is in
//! flight per orchestrator. Independent conversations use independent
//! orchestrators; only providers are shared between them.

use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::attachment::{FileAttachment, TextExtractor};
use super::backend::BackendClient;
use super::persistence::PersistenceSink;
use super::role::{Role, RoleProfile};
use super::session::{ConversationSession, FileInstructionsStore, InstructionsStore};
use crate::ai::budget::{BudgetResult, TextBudgetPolicy};
use crate::ai::classifier::Classifier;
use crate::ai::provider::{HttpProviderFactory, ProviderFactory};
use crate::ai::tools::ToolRegistry;
use crate::config::Config;
use crate::constants::routing::LOG_PREVIEW_CHARS;
use crate::types::{ChatError, ConversationId, Result, Turn};

/// Answer to one turn
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub role: Role,
    pub text: String,
    pub budget: BudgetResult,
}

/// Backend clients, present once initialized
enum Backends {
    Uninitialized,
    Ready {
        conversational: BackendClient,
        analytical: BackendClient,
    },
}

pub struct Orchestrator {
    config: Config,
    factory: Arc<dyn ProviderFactory>,
    instructions: Arc<dyn InstructionsStore>,
    tools: Arc<ToolRegistry>,
    policy: TextBudgetPolicy,
    attachment: FileAttachment,
    conversational: ConversationSession,
    analytical: ConversationSession,
    backends: Backends,
    sink: Option<Arc<dyn PersistenceSink>>,
    conversation: Option<ConversationId>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("initialized", &self.is_initialized())
            .field("attachment", &self.attachment)
            .field("conversational_turns", &self.conversational.history().len())
            .field("analytical_turns", &self.analytical.history().len())
            .field("conversation", &self.conversation)
            .finish()
    }
}

impl Orchestrator {
    /// Orchestrator with HTTP providers and file-backed instructions
    pub fn new(config: Config) -> Self {
        Self::with_factory(config, Arc::new(HttpProviderFactory))
    }

    pub fn with_factory(config: Config, factory: Arc<dyn ProviderFactory>) -> Self {
        let instructions = Arc::new(FileInstructionsStore::new(&config.instructions.dir));
        Self {
            policy: TextBudgetPolicy::from_config(&config),
            attachment: FileAttachment::new(&config.attachment),
            tools: Arc::new(ToolRegistry::with_defaults()),
            instructions,
            factory,
            conversational: fresh_session(Role::Conversational, &config),
            analytical: fresh_session(Role::Analytical, &config),
            backends: Backends::Uninitialized,
            sink: None,
            conversation: None,
            config,
        }
    }

    pub fn with_instructions(mut self, store: Arc<dyn InstructionsStore>) -> Self {
        self.instructions = store;
        self
    }

    pub fn with_tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = Arc::new(tools);
        self
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn TextExtractor>) -> Self {
        self.attachment = FileAttachment::with_extractor(&self.config.attachment, extractor);
        self
    }

    pub fn with_persistence(mut self, sink: Arc<dyn PersistenceSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Construct both backend clients. Second and later calls are no-ops.
    pub fn initialize(&mut self) -> Result<()> {
        if self.is_initialized() {
            return Ok(());
        }

        let conversational = self.build_client(Role::Conversational)?;
        let analytical = self.build_client(Role::Analytical)?;

        info!(
            "Backends ready: conversational={} ({}), analytical={} ({})",
            conversational.provider().name(),
            conversational.provider().model(),
            analytical.provider().name(),
            analytical.provider().model()
        );

        self.backends = Backends::Ready {
            conversational,
            analytical,
        };
        Ok(())
    }

    fn build_client(&self, role: Role) -> Result<BackendClient> {
        let backend_config = match role {
            Role::Conversational => &self.config.backends.conversational,
            Role::Analytical => &self.config.backends.analytical,
        };

        let provider = self.factory.create(backend_config).map_err(|e| {
            ChatError::InitializationFailed(format!("{} backend: {}", role, e))
        })?;

        let profile = RoleProfile::from_config(role, &self.config);
        let tools = profile.tools_enabled.then(|| Arc::clone(&self.tools));

        Ok(BackendClient::new(profile, provider, tools))
    }

    pub fn is_initialized(&self) -> bool {
        matches!(self.backends, Backends::Ready { .. })
    }

    /// Release both backend clients. Safe to call repeatedly or before
    /// initialization; a later send initializes again.
    pub fn shutdown(&mut self) {
        if self.is_initialized() {
            info!("Releasing backend clients");
        }
        self.backends = Backends::Uninitialized;
    }

    /// Start a fresh conversation: empty sessions, no attachment and, when
    /// recording, a new transcript on the next turn
    pub fn reset(&mut self) {
        self.conversational = fresh_session(Role::Conversational, &self.config);
        self.analytical = fresh_session(Role::Analytical, &self.config);
        self.attachment.clear();
        self.conversation = None;
        debug!("Conversation reset");
    }

    // =========================================================================
    // Turns
    // =========================================================================

    /// Send a message and return the answer, or a description of the failure
    pub async fn send_message(&mut self, text: &str) -> String {
        match self.try_send_message(text).await {
            Ok(reply) => reply.text,
            Err(e) => {
                warn!("Turn failed: {}", e);
                e.user_message()
            }
        }
    }

    /// Typed variant of [`Orchestrator::send_message`].
    ///
    /// Cancel-safe: when the returned future is dropped mid-call (for
    /// example by a caller deadline) the unanswered User turn is rolled back
    /// exactly as on a backend failure, if rollback is enabled.
    pub async fn try_send_message(&mut self, text: &str) -> Result<Reply> {
        self.initialize()?;

        let classification = Classifier::explain(text, self.attachment.is_active());
        let role = classification.decision.role();
        debug!(
            "Routing '{}' -> {}",
            preview(text, LOG_PREVIEW_CHARS),
            classification
        );

        let final_message = self.attachment.context_prefix(text);
        let budget = self.policy.compute_budget(role, &final_message);
        debug!(
            "Budget for {}: {} units at {}",
            role, budget.max_response_units, budget.creativity
        );

        // Transcripts keep the typed text; the document is stored once per upload
        let transcript_text = match self.attachment.current_file_name() {
            "" => text.to_string(),
            name => format!("[File: {}] {}", name, text),
        };

        let instructions = Arc::clone(&self.instructions);
        let session = self.session_mut(role);
        session.ensure_instructions_loaded(instructions.as_ref());
        session.append_user_turn(final_message);

        let user_turn = self.session(role).last_turn().map(|turn| Turn {
            text: transcript_text,
            ..turn.clone()
        });
        if let Some(turn) = user_turn {
            self.record_turn(role, &turn);
        }

        let client = match &self.backends {
            Backends::Ready {
                conversational,
                analytical,
            } => match role {
                Role::Conversational => conversational,
                Role::Analytical => analytical,
            },
            Backends::Uninitialized => {
                return Err(ChatError::InitializationFailed(
                    "backends not initialized".to_string(),
                ));
            }
        };
        let session = match role {
            Role::Conversational => &mut self.conversational,
            Role::Analytical => &mut self.analytical,
        };

        let mut pending = PendingTurn {
            session,
            rollback: self.config.session.rollback_failed_turns,
        };
        let answer = client
            .complete(
                pending.session.history(),
                budget,
                client.profile().tools_enabled,
            )
            .await?;

        pending.session.append_assistant_turn(answer.clone());
        pending.rollback = false;
        drop(pending);

        if let Some(turn) = self.session(role).last_turn().cloned() {
            self.record_turn(role, &turn);
        }
        Ok(Reply {
            role,
            text: answer,
            budget,
        })
    }

    // =========================================================================
    // Attachment
    // =========================================================================

    /// Attach a file and return a confirmation, or a description of the failure
    pub async fn attach_file(&mut self, path: impl AsRef<Path>) -> String {
        match self.try_attach_file(path.as_ref()).await {
            Ok(confirmation) => confirmation,
            Err(e) => {
                warn!("Attachment failed: {}", e);
                e.user_message()
            }
        }
    }

    pub async fn try_attach_file(&mut self, path: &Path) -> Result<String> {
        let confirmation = self.attachment.attach(path).await?;
        self.record_attachment();
        Ok(confirmation)
    }

    pub fn clear_file(&mut self) {
        self.attachment.clear();
    }

    pub fn current_file_name(&self) -> &str {
        self.attachment.current_file_name()
    }

    // =========================================================================
    // Read access
    // =========================================================================

    pub fn session(&self, role: Role) -> &ConversationSession {
        match role {
            Role::Conversational => &self.conversational,
            Role::Analytical => &self.analytical,
        }
    }

    fn session_mut(&mut self, role: Role) -> &mut ConversationSession {
        match role {
            Role::Conversational => &mut self.conversational,
            Role::Analytical => &mut self.analytical,
        }
    }

    pub fn backend(&self, role: Role) -> Option<&BackendClient> {
        match &self.backends {
            Backends::Ready {
                conversational,
                analytical,
            } => Some(match role {
                Role::Conversational => conversational,
                Role::Analytical => analytical,
            }),
            Backends::Uninitialized => None,
        }
    }

    pub fn conversation_id(&self) -> Option<ConversationId> {
        self.conversation
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    // =========================================================================
    // Recording
    // =========================================================================

    fn ensure_conversation(&mut self, sink: &dyn PersistenceSink, title: &str) -> Option<ConversationId> {
        if let Some(id) = self.conversation {
            return Some(id);
        }
        match sink.create_conversation(&preview(title, LOG_PREVIEW_CHARS)) {
            Ok(id) => {
                debug!("Recording into conversation {}", id);
                self.conversation = Some(id);
                Some(id)
            }
            Err(e) => {
                warn!("Could not create conversation record: {}", e);
                None
            }
        }
    }

    fn record_turn(&mut self, role: Role, turn: &Turn) {
        let Some(sink) = self.sink.clone() else {
            return;
        };
        let Some(conversation) = self.ensure_conversation(sink.as_ref(), &turn.text) else {
            return;
        };
        if let Err(e) = sink.record_turn(conversation, role, turn) {
            warn!("Could not record {} turn: {}", turn.role, e);
        }
    }

    fn record_attachment(&mut self) {
        let Some(sink) = self.sink.clone() else {
            return;
        };
        let title = format!("File: {}", self.attachment.current_file_name());
        let Some(conversation) = self.ensure_conversation(sink.as_ref(), &title) else {
            return;
        };
        if let Err(e) = sink.record_attachment(conversation, self.attachment.state()) {
            warn!("Could not record attachment: {}", e);
        }
    }
}

fn fresh_session(role: Role, config: &Config) -> ConversationSession {
    ConversationSession::from_profile(&RoleProfile::from_config(role, config))
}

/// User turn awaiting its answer. Dropped while still armed (backend
/// error or cancelled future) it pops the unanswered turn.
struct PendingTurn<'a> {
    session: &'a mut ConversationSession,
    rollback: bool,
}

impl Drop for PendingTurn<'_> {
    fn drop(&mut self) {
        if self.rollback && self.session.pop_unanswered_user_turn().is_some() {
            debug!("Rolled back unanswered {} turn", self.session.role());
        }
    }
}

/// First line of `text`, at most `max` characters
fn preview(text: &str, max: usize) -> String {
    let line = text.lines().next().unwrap_or_default();
    let mut out: String = line.chars().take(max).collect();
    if line.chars().count() > max || text.lines().nth(1).is_some() {
        out.push('…');
    }
    out
}
