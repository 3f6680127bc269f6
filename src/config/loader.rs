//! Configuration Loader (Figment-based)
//!
//! Loads and merges configuration from multiple sources using Figment:
//! 1. Built-in defaults (Serialized)
//! 2. Global config (~/.config/chatroute/config.toml)
//! 3. Project config (.chatroute/config.toml)
//! 4. Environment variables (CHATROUTE_* prefix, nested keys split on `__`)

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::types::Config;
use crate::chat::Role;
use crate::types::{ChatError, Result};

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with full resolution chain using Figment:
    /// defaults → global → project → env vars
    pub fn load() -> Result<Config> {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        if let Some(global_path) = Self::global_config_path()
            && global_path.exists()
        {
            debug!("Loading global config from: {}", global_path.display());
            figment = figment.merge(Toml::file(&global_path));
        }

        let project_path = Self::project_config_path();
        if project_path.exists() {
            debug!("Loading project config from: {}", project_path.display());
            figment = figment.merge(Toml::file(&project_path));
        }

        // CHATROUTE_BACKENDS__ANALYTICAL__MODEL -> backends.analytical.model
        figment = figment.merge(Env::prefixed("CHATROUTE_").split("__").lowercase(true));

        Self::extract(figment)
    }

    /// Load configuration from a specific file only (defaults underneath)
    pub fn load_from_file(path: &Path) -> Result<Config> {
        if !path.exists() {
            return Err(ChatError::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path));

        Self::extract(figment)
    }

    fn extract(figment: Figment) -> Result<Config> {
        let config: Config = figment
            .extract()
            .map_err(|e| ChatError::Config(format!("Configuration error: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    // =========================================================================
    // Path Management
    // =========================================================================

    /// Get path to global config directory (~/.config/chatroute/)
    pub fn global_dir() -> Option<PathBuf> {
        env::var("XDG_CONFIG_HOME")
            .ok()
            .map(PathBuf::from)
            .or_else(|| {
                env::var("HOME")
                    .ok()
                    .map(|home| PathBuf::from(home).join(".config"))
            })
            .map(|p| p.join("chatroute"))
    }

    /// Get path to global config file
    pub fn global_config_path() -> Option<PathBuf> {
        Self::global_dir().map(|dir| dir.join("config.toml"))
    }

    /// Get path to project config file
    pub fn project_config_path() -> PathBuf {
        Self::project_dir().join("config.toml")
    }

    /// Get project data directory
    pub fn project_dir() -> PathBuf {
        PathBuf::from(".chatroute")
    }

    // =========================================================================
    // Config Commands
    // =========================================================================

    /// Show config file paths
    pub fn show_path(config: &Config) {
        println!("Configuration paths:");
        println!();

        if let Some(global) = Self::global_config_path() {
            let exists = if global.exists() { "✓" } else { "✗" };
            println!("  Global:       {} {}", exists, global.display());
        } else {
            println!("  Global:       (not available)");
        }

        let project = Self::project_config_path();
        let exists = if project.exists() { "✓" } else { "✗" };
        println!("  Project:      {} {}", exists, project.display());

        let prompts = &config.instructions.dir;
        let exists = if prompts.exists() { "✓" } else { "✗" };
        println!("  Instructions: {} {}", exists, prompts.display());

        let db = &config.storage.path;
        let exists = if db.exists() { "✓" } else { "✗" };
        println!("  Transcripts:  {} {}", exists, db.display());
    }

    /// Render a configuration as json, yaml or toml
    pub fn render(config: &Config, format: &str) -> Result<String> {
        match format {
            "json" => Ok(serde_json::to_string_pretty(config)?),
            "yaml" => Ok(serde_yaml::to_string(config)?),
            _ => toml::to_string_pretty(config).map_err(|e| ChatError::Config(e.to_string())),
        }
    }

    // =========================================================================
    // Initialization
    // =========================================================================

    /// Initialize global configuration
    pub fn init_global(force: bool) -> Result<PathBuf> {
        let global_dir = Self::global_dir().ok_or_else(|| {
            ChatError::Config("Cannot determine global config directory".to_string())
        })?;

        fs::create_dir_all(&global_dir)?;

        let config_path = global_dir.join("config.toml");
        if !config_path.exists() || force {
            fs::write(&config_path, Self::default_global_config())?;
            info!("Created global config: {}", config_path.display());
        } else {
            info!("Global config exists: {}", config_path.display());
        }

        Ok(global_dir)
    }

    /// Initialize project configuration and instruction files under `root`
    pub fn init_project(root: &Path) -> Result<PathBuf> {
        let project_dir = root.join(Self::project_dir());
        let prompts_dir = project_dir.join("prompts");

        fs::create_dir_all(&prompts_dir)?;

        let config_path = project_dir.join("config.toml");
        if !config_path.exists() {
            fs::write(&config_path, Self::default_project_config())?;
            info!("Created project config: {}", config_path.display());
        }

        for role in Role::ALL {
            let path = prompts_dir.join(role.instructions_file_name());
            if !path.exists() {
                fs::write(&path, role.default_instructions())?;
                info!("Created instructions: {}", path.display());
            }
        }

        Ok(project_dir)
    }

    // =========================================================================
    // Internal
    // =========================================================================

    /// Generate default global config content (TOML)
    fn default_global_config() -> String {
        r#"# chatroute Global Configuration
# User-wide defaults. Project settings in .chatroute/config.toml override these.

version = "1.0"

[backends.conversational]
provider = "openai"
model = "phi3:mini"
api_base = "http://localhost:11434/v1"

[backends.analytical]
provider = "openai"
model = "qwen2.5:7b"
api_base = "http://localhost:11434/v1"
tools_enabled = true
"#
        .to_string()
    }

    /// Generate default project config content (TOML)
    fn default_project_config() -> String {
        r#"# chatroute Project Configuration
# Project-specific settings that override global defaults.

version = "1.0"

[instructions]
dir = ".chatroute/prompts"

[storage]
enabled = true
path = ".chatroute/chat.db"

[session]
rollback_failed_turns = false
"#
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
[backends.analytical]
model = "llama3.1:8b"
provider = "ollama"

[budget.conversational]
steps = [{ max_words = 3, max_tokens = 10 }]
fallback = 50
"#,
        )
        .unwrap();

        let config = ConfigLoader::load_from_file(&path).unwrap();
        assert_eq!(config.backends.analytical.model, "llama3.1:8b");
        assert_eq!(config.backends.analytical.provider, "ollama");
        // Untouched sections keep their defaults
        assert_eq!(config.backends.conversational.model, "phi3:mini");
        assert_eq!(config.budget.conversational.fallback, 50);
        assert_eq!(config.budget.analytical.fallback, 3000);
    }

    #[test]
    fn test_load_from_file_rejects_invalid_values() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, "[backends.conversational]\ntemperature = 9.0\n").unwrap();

        assert!(ConfigLoader::load_from_file(&path).is_err());
    }

    #[test]
    fn test_load_from_missing_file() {
        let err = ConfigLoader::load_from_file(Path::new("/nonexistent/chatroute.toml"))
            .unwrap_err();
        assert!(err.to_string().contains("Config file not found"));
    }

    #[test]
    fn test_init_project_writes_instructions() {
        let temp_dir = TempDir::new().unwrap();
        let dir = ConfigLoader::init_project(temp_dir.path()).unwrap();

        assert!(dir.join("config.toml").exists());
        assert!(dir.join("prompts/conversational-instructions.md").exists());
        assert!(dir.join("prompts/analytical-instructions.md").exists());
    }

    #[test]
    fn test_render_formats() {
        let config = Config::default();
        let toml_text = ConfigLoader::render(&config, "toml").unwrap();
        assert!(toml_text.contains("[backends.analytical]"));
        let json_text = ConfigLoader::render(&config, "json").unwrap();
        assert!(json_text.contains("\"backends\""));
        let yaml_text = ConfigLoader::render(&config, "yaml").unwrap();
        assert!(yaml_text.contains("backends:"));
    }

    #[test]
    fn test_env_override() {
        // SAFETY: no other test reads this variable
        unsafe {
            std::env::set_var("CHATROUTE_BACKENDS__ANALYTICAL__MODEL", "test-model");
        }
        let config = ConfigLoader::load().unwrap();
        assert_eq!(config.backends.analytical.model, "test-model");
        unsafe {
            std::env::remove_var("CHATROUTE_BACKENDS__ANALYTICAL__MODEL");
        }
    }
}
