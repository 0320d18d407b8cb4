mod commands;
mod config;
mod tbca;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

use crate::commands::{
    ScrapeOptions, cmd_backfill, cmd_replay, cmd_scrape, cmd_seed, cmd_show, cmd_stats,
};
use crate::config::Config;
use tbca_core::db::Database;

#[derive(Parser)]
#[command(
    name = "tbca",
    version,
    about = "Scrape the Brazilian food composition table (TBCA) into SQLite"
)]
struct Cli {
    /// Database file (default: platform data directory)
    #[arg(long, global = true, value_name = "PATH")]
    db: Option<PathBuf>,
    /// Log at debug level (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl the listing, fetch every food and store it
    Scrape {
        /// Capture file for raw records (default: platform data directory)
        #[arg(long, value_name = "PATH")]
        capture: Option<PathBuf>,
        /// Do not write a capture file
        #[arg(long, conflicts_with = "capture")]
        no_capture: bool,
        /// Do not write to the database (capture only)
        #[arg(long)]
        no_db: bool,
        /// Override the site URL
        #[arg(long, value_name = "URL", default_value = tbca::DEFAULT_BASE_URL)]
        base_url: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Load a capture file into the database without fetching
    Replay {
        /// Capture file (default: the one `scrape` writes)
        file: Option<PathBuf>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Insert the nutrient reference catalog
    Seed {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Build wide nutrient rows for variations that only have per-row values
    Backfill {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a stored food, its variations and mapped nutrients
    Show {
        /// Food code (e.g. BRC0001A)
        code: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show row counts for every table
    Stats {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let db_path = cli.db.unwrap_or_else(|| config.db_path.clone());
    let db = Database::open(&db_path)?;

    match cli.command {
        Commands::Scrape {
            capture,
            no_capture,
            no_db,
            base_url,
            json,
        } => {
            let options = ScrapeOptions {
                capture: (!no_capture).then(|| capture.unwrap_or_else(|| config.capture_path.clone())),
                store: !no_db,
                base_url,
                json,
            };
            cmd_scrape(db, options).await
        }
        Commands::Replay { file, json } => {
            let file = file.unwrap_or_else(|| config.capture_path.clone());
            cmd_replay(&db, &file, json)
        }
        Commands::Seed { json } => cmd_seed(&db, json),
        Commands::Backfill { json } => cmd_backfill(&db, json),
        Commands::Show { code, json } => cmd_show(&db, &code, json),
        Commands::Stats { json } => cmd_stats(&db, json),
    }
}
