//! Courier CLI: the main entry point.
//!
//! Commands:
//! - `chat`      Run a conversation through the pipeline (or `--raw`)
//! - `evidence`  Build an evidence packet for a query
//! - `agents`    List agent roles or show one role's prompt
//! - `model`     Show how a model id routes
//! - `config`    Show, locate, or initialize configuration

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "courier",
    about = "Courier: command-aware chat over an OpenAI-compatible gateway",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to ~/.courier/config.toml)
    #[arg(long, global = true, env = "COURIER_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a conversation through the pipeline
    Chat(commands::chat::ChatArgs),

    /// Query the retrieval datastores and print the evidence packet
    Evidence {
        /// Search query
        query: String,

        /// Comma-separated sources: drafts, provisional
        #[arg(short, long, default_value = "drafts,provisional")]
        sources: String,

        /// Total result budget (1-20)
        #[arg(short, default_value_t = 5)]
        k: usize,

        /// Use the expanded snippet and packet caps
        #[arg(long)]
        expanded: bool,
    },

    /// List agent roles, or show the resolved prompt for one
    Agents {
        /// Role name (case-insensitive)
        name: Option<String>,
    },

    /// Show the resolved id, token field, and allowlist verdict for a model
    Model {
        /// Model id or alias
        id: String,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration (secrets redacted)
    Show,
    /// Print the config file path
    Path,
    /// Write a default config file if none exists
    Init,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if cli.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    let config_path = cli
        .config
        .unwrap_or_else(|| courier_config::AppConfig::config_dir().join("config.toml"));

    match cli.command {
        Commands::Chat(args) => {
            commands::chat::run(commands::load(&config_path)?, args).await?
        }
        Commands::Evidence {
            query,
            sources,
            k,
            expanded,
        } => {
            commands::evidence::run(commands::load(&config_path)?, &query, &sources, k, expanded)
                .await?
        }
        Commands::Agents { name } => {
            commands::agents::run(commands::load(&config_path)?, name.as_deref()).await?
        }
        Commands::Model { id } => commands::model::run(commands::load(&config_path)?, &id)?,
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_cmd::show(commands::load(&config_path)?)?,
            ConfigAction::Path => commands::config_cmd::path(&config_path),
            ConfigAction::Init => commands::config_cmd::init(&config_path)?,
        },
    }

    Ok(())
}
