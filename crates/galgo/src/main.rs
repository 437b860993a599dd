//! Galgo CLI - ingest photos and videos into a content-addressed media library.
//!
//! Galgo stages each file, classifies it by content, derives a content
//! identity, extracts capture metadata, renders a thumbnail and stores the
//! original under a date-partitioned layout. One outcome per input file is
//! written as JSON or JSONL.
//!
//! # Usage
//!
//! ```bash
//! # Ingest a single file
//! galgo ingest holiday.jpg
//!
//! # Ingest directories, streaming outcomes to a file
//! galgo ingest ./camera-roll/ ./phone/ --format jsonl --output outcomes.jsonl
//!
//! # View configuration
//! galgo config show
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cli;
mod logging;

/// Galgo - media ingestion pipeline.
#[derive(Parser, Debug)]
#[command(name = "galgo")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    /// Use this config file instead of the default location
    #[arg(long, global = true, env = "GALGO_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Ingest image and video files
    Ingest(cli::ingest::IngestArgs),

    /// View and manage configuration
    Config(cli::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logging isn't initialized yet, so config warnings go through eprintln.
    let config = match &cli.config {
        Some(path) => galgo_core::Config::load_from(path)
            .map_err(|e| anyhow::anyhow!("Failed to load config {}: {e}", path.display()))?,
        None => match galgo_core::Config::load() {
            Ok(config) => config,
            Err(e) => {
                eprintln!(
                    "Warning: Failed to load config: {e}\n  \
                     Using default configuration. Check your config file with `galgo config path`."
                );
                galgo_core::Config::default()
            }
        },
    };
    logging::init_from_config(&config, cli.verbose, cli.json_logs);

    tracing::debug!("Galgo v{}", galgo_core::VERSION);

    match cli.command {
        Commands::Ingest(args) => cli::ingest::execute(args, config).await,
        Commands::Config(args) => cli::config::execute(args, config, cli.config).await,
    }
}
