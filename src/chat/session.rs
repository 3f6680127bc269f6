//! Conversation Session
//!
//! One ordered turn history per backend role. The first turn, once present,
//! is always the single System turn carrying the role's instructions.
//!
//! ```text
//! Uninitialized ──seed──▶ Seeded ──append──▶ Active
//! ```

use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{debug, warn};

use super::role::{Role, RoleProfile};
use crate::types::{Turn, TurnRole};

// =============================================================================
// Instructions Store
// =============================================================================

/// Source of role instructions, keyed by [`RoleProfile::instructions_key`]
pub trait InstructionsStore: Send + Sync {
    /// Instructions text, or `None` when unavailable
    fn load(&self, key: &str) -> Option<String>;
}

/// Reads `<dir>/<key>-instructions.md`
#[derive(Debug, Clone)]
pub struct FileInstructionsStore {
    dir: PathBuf,
}

impl FileInstructionsStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}-instructions.md", key))
    }
}

impl InstructionsStore for FileInstructionsStore {
    fn load(&self, key: &str) -> Option<String> {
        let path = self.path_for(key);
        match std::fs::read_to_string(&path) {
            Ok(content) if !content.trim().is_empty() => {
                debug!("Loaded {} instructions from {}", key, path.display());
                Some(content)
            }
            Ok(_) => {
                warn!("Instructions file {} is empty", path.display());
                None
            }
            Err(e) => {
                warn!(
                    "Instructions file {} not readable ({}); using default",
                    path.display(),
                    e
                );
                None
            }
        }
    }
}

impl InstructionsStore for HashMap<String, String> {
    fn load(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

// =============================================================================
// Session
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No turns yet
    Uninitialized,
    /// Only the System turn
    Seeded,
    /// At least one User or Assistant turn
    Active,
}

#[derive(Debug, Clone)]
pub struct ConversationSession {
    role: Role,
    instructions_key: &'static str,
    turns: Vec<Turn>,
}

impl ConversationSession {
    pub fn new(role: Role) -> Self {
        Self {
            role,
            instructions_key: role.key(),
            turns: Vec::new(),
        }
    }

    /// Session seeded from the profile's instructions key
    pub fn from_profile(profile: &RoleProfile) -> Self {
        Self {
            role: profile.role,
            instructions_key: profile.instructions_key,
            turns: Vec::new(),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn state(&self) -> SessionState {
        match self.turns.len() {
            0 => SessionState::Uninitialized,
            1 => SessionState::Seeded,
            _ => SessionState::Active,
        }
    }

    /// Seed the System turn from `store`, falling back to the role default.
    /// No-op once seeded.
    pub fn ensure_instructions_loaded(&mut self, store: &dyn InstructionsStore) {
        if !self.turns.is_empty() {
            return;
        }

        let instructions = store.load(self.instructions_key).unwrap_or_else(|| {
            debug!("Using default {} instructions", self.role);
            self.role.default_instructions().to_string()
        });
        self.turns.push(Turn::system(instructions));
    }

    pub fn append_user_turn(&mut self, text: impl Into<String>) {
        self.seed_default();
        self.turns.push(Turn::user(text));
    }

    pub fn append_assistant_turn(&mut self, text: impl Into<String>) {
        self.seed_default();
        self.turns.push(Turn::assistant(text));
    }

    /// Remove the last turn if it is an unanswered User turn
    pub fn pop_unanswered_user_turn(&mut self) -> Option<Turn> {
        match self.turns.last() {
            Some(turn) if turn.role == TurnRole::User => self.turns.pop(),
            _ => None,
        }
    }

    pub fn history(&self) -> &[Turn] {
        &self.turns
    }

    pub fn last_turn(&self) -> Option<&Turn> {
        self.turns.last()
    }

    fn seed_default(&mut self) {
        if self.turns.is_empty() {
            self.turns
                .push(Turn::system(self.role.default_instructions()));
        }
    }
}
