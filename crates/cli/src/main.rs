//! ctxweave CLI entry point.
//!
//! Commands:
//! - `assemble`: build the model context for a conversation snapshot
//! - `check`: check tool-call/tool-response pairing
//! - `config`: show, validate or initialize configuration

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "ctxweave",
    about = "ctxweave: LLM context assembly under a token budget",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the context pipeline over a conversation snapshot
    Assemble {
        /// JSON file with the initial state (or a bare message array)
        #[arg(short, long)]
        input: PathBuf,

        /// Config file (defaults to ~/.ctxweave/config.toml)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Override the target model
        #[arg(short, long, env = "CTXWEAVE_MODEL")]
        model: Option<String>,

        /// Override the token budget
        #[arg(long)]
        max_tokens: Option<usize>,

        /// Pretty-print the JSON result
        #[arg(long)]
        pretty: bool,
    },

    /// Check that every tool response follows its tool call
    Check {
        /// JSON file with messages (or an initial state)
        #[arg(short, long)]
        input: PathBuf,

        /// Print the repaired message order
        #[arg(long)]
        reorder: bool,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Print the config file path
    Path,
    /// Validate the config file
    Validate,
    /// Write a default config file if none exists
    Init,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing; stdout is reserved for command output
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Assemble {
            input,
            config,
            model,
            max_tokens,
            pretty,
        } => {
            commands::assemble::run(commands::assemble::AssembleArgs {
                input,
                config,
                model,
                max_tokens,
                pretty,
            })
            .await?
        }
        Commands::Check { input, reorder } => commands::check::run(&input, reorder).await?,
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_cmd::show().await?,
            ConfigAction::Path => commands::config_cmd::path().await?,
            ConfigAction::Validate => commands::config_cmd::validate().await?,
            ConfigAction::Init => commands::config_cmd::init().await?,
        },
    }

    Ok(())
}
