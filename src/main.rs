use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::info;

use paperwatch::config::Config;
use paperwatch::filter::{model, names};
use paperwatch::history::NotificationHistory;
use paperwatch::output::terminal;

/// Paperwatch: fetch new papers, keep the relevant ones, summarize them and
/// post them to Slack.
///
/// Relevance is decided by semantic similarity to configured topics and by
/// fuzzy matching against a list of watched authors.
#[derive(Parser)]
#[command(name = "paperwatch", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch, filter, summarize and notify
    Run {
        /// Path to the YAML config (default: $PAPERWATCH_CONFIG or config/config.yaml)
        #[arg(long, short)]
        config: Option<PathBuf>,

        /// Print what would be posted instead of posting; never updates the history
        #[arg(long, short = 'n')]
        dry_run: bool,
    },

    /// Download the sentence embedding model (~90 MB)
    DownloadModel,

    /// Show notification history stats
    History {
        /// Path to the YAML config
        #[arg(long, short)]
        config: Option<PathBuf>,

        /// Remove entries older than the configured retention and save
        #[arg(long)]
        prune: bool,
    },

    /// Show how author names are normalized for matching
    Normalize {
        /// Names to normalize, e.g. "Logsdon, G. A." or "Glennis A. Logsdon"
        #[arg(required = true)]
        names: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if missing)
    let _ = dotenvy::dotenv();

    // Set up structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("paperwatch=info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config, dry_run } => {
            let config = Config::load(config.as_deref())?;
            info!(dry_run, "Starting run");

            let report = paperwatch::pipeline::run(&config, dry_run).await?;
            terminal::display_report(&report);
            println!("\n{}", "Done.".bold());
        }

        Commands::DownloadModel => {
            let model_dir = std::env::var("PAPERWATCH_MODEL_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| model::default_model_dir());

            println!("Downloading embedding model...");
            println!("  Destination: {}", model_dir.display());

            model::download_model(&model_dir).await?;

            println!("\n{}", "Model downloaded successfully.".bold());
            println!("You can now run `paperwatch run --dry-run`.");
        }

        Commands::History { config, prune } => {
            let config = Config::load(config.as_deref())?;
            let mut history = NotificationHistory::load(&config.history.path);

            if prune {
                let removed = history.prune(config.history.retention_days);
                history.save()?;
                println!(
                    "Pruned {} entries older than {} days.\n",
                    removed, config.history.retention_days
                );
            }

            paperwatch::status::show(&history, config.history.retention_days);
        }

        Commands::Normalize { names: raw_names } => {
            for raw in &raw_names {
                terminal::display_name_pair(raw, names::normalize(raw).as_ref());
            }
        }
    }

    Ok(())
}
