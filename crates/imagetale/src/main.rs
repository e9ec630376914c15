//! Imagetale CLI - turn a photo into a short spoken story.
//!
//! Each run captions the image with a hosted image-to-text model, expands the
//! caption into a short story with a language model, and reads the story
//! aloud with a text-to-speech model.
//!
//! # Usage
//!
//! ```bash
//! # Run the pipeline on an image
//! imagetale run beach.jpg
//!
//! # Several images, JSON Lines reports
//! imagetale run a.jpg b.jpg --format jsonl --per-run-dirs
//!
//! # Start the web UI
//! imagetale serve --port 8501
//!
//! # View configuration
//! imagetale config show
//! ```

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use imagetale_core::Config;

mod cli;
mod logging;
mod server;

/// Imagetale - turn a photo into a short spoken story.
#[derive(Parser, Debug)]
#[command(name = "imagetale")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    /// Config file to use instead of the default location
    #[arg(long, global = true, env = "IMAGETALE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Caption, narrate and voice one or more images
    Run(cli::run::RunArgs),

    /// Serve the upload page and JSON API
    Serve(cli::serve::ServeArgs),

    /// View and manage configuration
    Config(cli::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Secrets may live in a .env file next to the working directory.
    let dotenv = dotenvy::dotenv();

    let cli = Cli::parse();

    let config = startup_config(cli.config.as_deref(), &cli.command)?;
    logging::init_from_config(&config, cli.verbose, cli.json_logs);

    tracing::debug!("Imagetale v{}", imagetale_core::VERSION);
    if let Ok(path) = dotenv {
        tracing::debug!("Loaded environment from {}", path.display());
    }

    match cli.command {
        Commands::Run(args) => cli::run::execute(args, config).await,
        Commands::Serve(args) => cli::serve::execute(args, config).await,
        Commands::Config(args) => cli::config::execute(args, cli.config).await,
    }
}

/// Config used for logging and by `run`/`serve`.
///
/// A missing file means defaults, so `--config new.toml config init` works.
/// A broken default-location file only warns; a broken explicit `--config`
/// file is an error unless the command is `config`, which exists to fix it.
fn startup_config(path: Option<&Path>, command: &Commands) -> anyhow::Result<Config> {
    let loaded = match path {
        Some(path) => Config::load_or_default(path),
        None => Config::load(),
    };
    match loaded {
        Ok(config) => Ok(config),
        Err(e) if path.is_some() && !matches!(command, Commands::Config(_)) => Err(e.into()),
        Err(e) => {
            // Logging isn't initialized yet.
            eprintln!(
                "Warning: Failed to load config: {e}\n  \
                 Using default configuration. Check your config file with `imagetale config path`."
            );
            Ok(Config::default())
        }
    }
}
