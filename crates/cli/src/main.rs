//! ChatRelay CLI — the main entry point.
//!
//! Commands:
//! - `init`    — Write the default config file
//! - `config`  — Validate and show the effective configuration
//! - `ask`     — Relay a single question for a user
//! - `chat`    — Interactive line-oriented session for a user
//! - `health`  — Check every configured backend

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "chatrelay",
    about = "ChatRelay — multi-backend chat relay with per-user sessions and failover",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to ~/.chatrelay/config.toml)
    #[arg(short, long, global = true, env = "CHATRELAY_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the default configuration file
    Init,

    /// Validate and print the effective configuration (keys redacted)
    Config,

    /// Relay one question and print the reply
    Ask {
        /// User identifier (must be on the allow-list)
        #[arg(short, long)]
        user: String,

        /// The question
        #[arg(short, long)]
        message: String,

        /// Language code or label to answer in
        #[arg(short, long)]
        lang: Option<String>,
    },

    /// Chat interactively as a user
    Chat {
        /// User identifier (must be on the allow-list)
        #[arg(short, long)]
        user: String,
    },

    /// Check that every configured backend is reachable
    Health,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli
        .config
        .unwrap_or_else(chatrelay_config::AppConfig::config_path);

    match cli.command {
        Commands::Init => commands::init::run(&config_path).await?,
        Commands::Config => commands::config_cmd::run(&config_path).await?,
        Commands::Ask { user, message, lang } => {
            commands::ask::run(&config_path, user, message, lang).await?
        }
        Commands::Chat { user } => commands::chat::run(&config_path, user).await?,
        Commands::Health => commands::health::run(&config_path).await?,
    }

    Ok(())
}
