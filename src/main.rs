//! # Catalog Summary CLI (`catsum`)
//!
//! The `catsum` binary drives the crawl and aggregation pipeline.
//!
//! ## Usage
//!
//! ```bash
//! catsum --config ./config/catsum.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `catsum init` | Create the SQLite database and run schema migrations |
//! | `catsum crawl` | Flatten catalog metadata into per-attribute streams |
//! | `catsum aggregate` | Summarize every stream into the database |
//! | `catsum run` | Crawl, then aggregate |
//! | `catsum stats` | Show crawl and summary counts |
//! | `catsum normalize <path>` | Print the normalized form of a file path |
//!
//! Logging goes to stderr and is controlled with `RUST_LOG`
//! (e.g. `RUST_LOG=catalog_summary=debug`).

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use catalog_summary::progress::ProgressMode;
use catalog_summary::{aggregator, config, crawler, migrate, stats};
use catalog_summary_core::normalize::transform_path;

/// Catalog Summary CLI: crawl a metadata catalog and summarize every
/// attribute into histograms and top-N category counts.
///
/// All commands except `normalize` read a TOML configuration file. See
/// `config/catsum.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "catsum",
    about = "Catalog Summary: crawl a metadata catalog and summarize its attributes",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/catsum.toml")]
    config: PathBuf,

    /// Progress output on stderr. Defaults to `human` on a TTY, `off`
    /// otherwise.
    #[arg(long, global = true, value_enum)]
    progress: Option<ProgressMode>,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Idempotent; running it multiple times is safe.
    Init,

    /// Crawl the configured catalog into attribute streams.
    ///
    /// Samples already listed in the resume ledger are skipped.
    Crawl {
        /// Maximum number of samples to list from the catalog.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Aggregate every stream in the summary directory.
    Aggregate,

    /// Crawl, then aggregate.
    Run {
        /// Maximum number of samples to list from the catalog.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Show crawl and summary statistics.
    Stats,

    /// Print the normalized form of a file path.
    Normalize {
        /// Path to normalize, e.g. `/data/LP1234567-DNA_A01/file.bam`.
        path: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Commands that don't require config
    if let Commands::Normalize { path } = &cli.command {
        println!("{}", transform_path(path));
        return Ok(());
    }

    let cfg = config::load_config(&cli.config)?;
    let progress = cli
        .progress
        .unwrap_or_else(ProgressMode::default_for_tty)
        .reporter();

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Crawl { limit } => {
            crawler::run_crawl(&cfg, limit, progress.as_ref()).await?;
        }
        Commands::Aggregate => {
            aggregator::run_aggregate(&cfg, progress.as_ref()).await?;
        }
        Commands::Run { limit } => {
            crawler::run_crawl(&cfg, limit, progress.as_ref()).await?;
            aggregator::run_aggregate(&cfg, progress.as_ref()).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
        Commands::Normalize { .. } => unreachable!(),
    }

    Ok(())
}
