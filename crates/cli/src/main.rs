//! Wayfarer CLI — the main entry point.
//!
//! Commands:
//! - `onboard`  — Write a default config file
//! - `ask`      — Ask one question, or chat interactively
//! - `gateway`  — Start the HTTP server
//! - `status`   — Show the effective configuration

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "wayfarer",
    about = "Wayfarer — a travel assistant that shows its work",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    /// Config file to use instead of ~/.wayfarer/config.toml
    #[arg(short, long, global = true, env = "WAYFARER_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Onboard,

    /// Ask a travel question
    Ask {
        /// The question; omit to start an interactive session
        message: Option<String>,

        /// Print raw wire events (one JSON object per line) instead of text
        #[arg(long)]
        json: bool,
    },

    /// Start the HTTP gateway server
    Gateway {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,

        /// Override the bind address
        #[arg(long)]
        host: Option<String>,
    },

    /// Show the effective configuration
    Status {
        /// Also ask the reasoning provider whether it is reachable
        #[arg(long)]
        check: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logs go to stderr so answers on stdout stay clean.
    let filter = if cli.verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    if cli.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Onboard => commands::onboard::run(config_path).await?,
        Commands::Ask { message, json } => commands::ask::run(config_path, message, json).await?,
        Commands::Gateway { port, host } => commands::gateway::run(config_path, port, host).await?,
        Commands::Status { check } => commands::status::run(config_path, check).await?,
    }

    Ok(())
}
