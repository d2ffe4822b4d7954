//! SupportDesk CLI: the main entry point.
//!
//! Commands:
//! - `init`    - Write a default config file
//! - `ingest`  - Load the knowledge base into the store
//! - `ask`     - Answer one question from the terminal
//! - `serve`   - Start the HTTP API server
//! - `doctor`  - Diagnose configuration and store health

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "supportdesk",
    about = "SupportDesk: retrieval-grounded customer support answers",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to ~/.supportdesk/config.toml)
    #[arg(short, long, global = true, env = "SUPPORTDESK_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config file
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },

    /// Chunk, embed, and store every *.txt file in the knowledge-base directory
    Ingest {
        /// Override the knowledge-base directory
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },

    /// Answer a single support question
    Ask {
        /// The customer's question
        query: String,

        /// Print the response as JSON
        #[arg(long)]
        json: bool,
    },

    /// Start the HTTP API server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,

        /// Override the bind address
        #[arg(long)]
        host: Option<String>,
    },

    /// Diagnose configuration and store health
    Doctor,
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
        .init();

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Init { force } => commands::init::run(config_path, force).await?,
        Commands::Ingest { dir } => commands::ingest::run(config_path, dir).await?,
        Commands::Ask { query, json } => commands::ask::run(config_path, &query, json).await?,
        Commands::Serve { port, host } => commands::serve::run(config_path, port, host).await?,
        Commands::Doctor => commands::doctor::run(config_path).await?,
    }

    Ok(())
}
