use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::runtime::Runtime;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use chatroute::cli::CommandContext;

#[derive(Parser)]
#[command(name = "chatroute")]
#[command(
    version,
    about = "Local chat client that routes each turn to a conversational or an analytical backend"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, short, global = true, help = "Enable debug logging")]
    verbose: bool,

    #[arg(long, short, global = true, help = "Only log errors")]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive conversation
    Chat,

    /// Send a single message and print the answer
    Send {
        /// Message text
        message: String,
        #[arg(long, short, help = "Attach a file before sending")]
        file: Option<PathBuf>,
    },

    /// List, show or delete recorded conversations
    History {
        /// Conversation to show
        conversation: Option<i64>,
        #[arg(long, help = "Delete the given conversation")]
        delete: bool,
        #[arg(
            short = 'f',
            long,
            default_value = "text",
            help = "Output format: text, json"
        )]
        format: String,
    },

    /// Check backend reachability and transcript statistics
    Status {
        #[arg(
            short = 'f',
            long,
            default_value = "text",
            help = "Output format: text, json"
        )]
        format: String,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration (merged from all sources)
    Show {
        #[arg(short = 'g', long, help = "Show global config file only")]
        global: bool,
        #[arg(
            short = 'f',
            long,
            default_value = "toml",
            help = "Output format: toml, json, yaml"
        )]
        format: String,
    },
    /// Show configuration file paths
    Path,
    /// Initialize configuration
    Init {
        #[arg(long, short, help = "Initialize global config")]
        global: bool,
        #[arg(long, help = "Overwrite existing config")]
        force: bool,
    },
}

/// Set up panic handler for graceful error reporting
fn setup_panic_handler() {
    let default_hook = std::panic::take_hook();

    std::panic::set_hook(Box::new(move |panic_info| {
        let message = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };

        eprintln!("\n\x1b[1;31m━━━ PANIC ━━━\x1b[0m");
        eprintln!("\x1b[31mchatroute encountered an unexpected error:\x1b[0m");
        eprintln!("  {}", message);

        if let Some(location) = panic_info.location() {
            eprintln!(
                "\x1b[90mLocation: {}:{}:{}\x1b[0m",
                location.file(),
                location.line(),
                location.column()
            );
        }
        eprintln!();

        // Call default hook for backtrace (if RUST_BACKTRACE=1)
        default_hook(panic_info);
    }));
}

fn main() -> ExitCode {
    setup_panic_handler();

    match run_cli() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("\x1b[31mError:\x1b[0m {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Chat => {
            let ctx = CommandContext::load()?;
            let rt = Runtime::new()?;
            rt.block_on(chatroute::cli::commands::chat::run(ctx))?;
        }
        Commands::Send { message, file } => {
            let ctx = CommandContext::load()?;
            let rt = Runtime::new()?;
            rt.block_on(chatroute::cli::commands::send::run(
                ctx,
                &message,
                file.as_deref(),
            ))?;
        }
        Commands::History {
            conversation,
            delete,
            format,
        } => {
            let ctx = CommandContext::load()?;
            chatroute::cli::commands::history::run(&ctx, conversation, delete, &format)?;
        }
        Commands::Status { format } => {
            let ctx = CommandContext::load()?;
            let rt = Runtime::new()?;
            rt.block_on(chatroute::cli::commands::status::run(ctx, &format))?;
        }
        Commands::Config { action } => match action {
            ConfigAction::Show { global, format } => {
                chatroute::cli::commands::config::show(global, &format)?;
            }
            ConfigAction::Path => {
                chatroute::cli::commands::config::path()?;
            }
            ConfigAction::Init { global, force } => {
                if global {
                    chatroute::cli::commands::config::init_global(force)?;
                } else {
                    chatroute::cli::commands::config::init_project()?;
                }
            }
        },
    }

    Ok(())
}
