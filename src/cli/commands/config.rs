//! Config Command
//!
//! Manage chatroute configuration.
//!
//! Usage:
//!   chatroute config show [-g] [-f json|yaml|toml]
//!   chatroute config path
//!   chatroute config init [-g] [--force]

use crate::config::ConfigLoader;
use crate::types::Result;

/// Show configuration
pub fn show(global: bool, format: &str) -> Result<()> {
    if global {
        match ConfigLoader::global_config_path() {
            Some(global_path) if global_path.exists() => {
                let config = ConfigLoader::load_from_file(&global_path)?;
                println!("# Global Config: {}\n", global_path.display());
                println!("{}", ConfigLoader::render(&config, format)?);
            }
            Some(_) => {
                println!("No global config found.");
                println!("Run 'chatroute config init --global' to create one.");
            }
            None => println!("Cannot determine global config directory."),
        }
    } else {
        // Merged effective config
        let config = ConfigLoader::load()?;
        println!("{}", ConfigLoader::render(&config, format)?);
    }
    Ok(())
}

/// Show configuration paths
pub fn path() -> Result<()> {
    let config = ConfigLoader::load()?;
    ConfigLoader::show_path(&config);
    Ok(())
}

/// Initialize global configuration
pub fn init_global(force: bool) -> Result<()> {
    let dir = ConfigLoader::init_global(force)?;
    println!("✓ Initialized global configuration");
    println!("  Directory: {}", dir.display());
    if let Some(config_path) = ConfigLoader::global_config_path() {
        println!("  Config:    {}", config_path.display());
    }
    Ok(())
}

/// Initialize project configuration and instruction files
pub fn init_project() -> Result<()> {
    let root = std::env::current_dir()?;
    let dir = ConfigLoader::init_project(&root)?;
    println!("✓ Initialized project configuration");
    println!("  Directory:    {}", dir.display());
    println!("  Config:       {}", dir.join("config.toml").display());
    println!("  Instructions: {}", dir.join("prompts").display());
    Ok(())
}
