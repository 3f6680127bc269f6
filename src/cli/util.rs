//! CLI Common Utilities
//!
//! Shared initialization for command handlers: configuration, the optional
//! transcript database and a ready-to-use orchestrator.

use std::sync::Arc;

use tracing::debug;

use crate::ai::timeout::TimeoutConfig;
use crate::chat::Orchestrator;
use crate::config::{Config, ConfigLoader};
use crate::storage::{Database, SharedDatabase};
use crate::types::Result;

/// Command execution context
#[derive(Clone)]
pub struct CommandContext {
    /// Loaded configuration
    pub config: Config,
    /// Transcript database, absent when recording is disabled
    pub db: Option<SharedDatabase>,
    /// Deadlines for turns and health probes
    pub timeouts: TimeoutConfig,
}

impl CommandContext {
    /// Load configuration and open the transcript database if enabled.
    pub fn load() -> Result<Self> {
        let config = ConfigLoader::load()?;
        Self::from_config(config)
    }

    pub fn from_config(config: Config) -> Result<Self> {
        let db = open_database(&config)?;
        let timeouts = TimeoutConfig::with_turn_secs(
            config
                .backends
                .conversational
                .timeout_secs
                .max(config.backends.analytical.timeout_secs),
        );
        Ok(Self {
            config,
            db,
            timeouts,
        })
    }

    /// Transcript database, or an error telling the user how to enable it
    pub fn require_db(&self) -> Result<&SharedDatabase> {
        self.db.as_ref().ok_or_else(|| {
            crate::types::ChatError::Config(
                "Transcript storage is disabled (storage.enabled = false)".to_string(),
            )
        })
    }

    /// Orchestrator wired to the transcript database when one is open
    pub fn orchestrator(&self) -> Orchestrator {
        let orchestrator = Orchestrator::new(self.config.clone());
        match &self.db {
            Some(db) => orchestrator.with_persistence(Arc::clone(db) as _),
            None => orchestrator,
        }
    }
}

/// Open and initialize the transcript database named by `config`.
pub fn open_database(config: &Config) -> Result<Option<SharedDatabase>> {
    if !config.storage.enabled {
        debug!("Transcript storage disabled");
        return Ok(None);
    }

    let db = Database::open(&config.storage.path)?;
    db.initialize()?;
    debug!("Transcript database: {}", config.storage.path.display());
    Ok(Some(Arc::new(db)))
}
