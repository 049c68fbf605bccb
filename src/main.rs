//! chesstrack - chess.com game history tracker
//!
//! Syncs a player's monthly game archives into a local SQLite table,
//! normalizes each game into one flat row, and rebuilds the derived
//! daily-aggregate and per-game calculation tables after every run.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use chesstrack::chesscom::ChessComClient;
use chesstrack::export::export_all;
use chesstrack::models::Config;
use chesstrack::opponents;
use chesstrack::store::GameStore;
use chesstrack::sync::{run_rebuild, run_sync};

#[derive(Parser, Debug)]
#[command(name = "chesstrack")]
#[command(about = "Sync and analyze a chess.com game history")]
struct Args {
    /// Override DATABASE_PATH from the environment
    #[arg(long, env = "DATABASE_PATH")]
    db: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fetch archives, upsert games and rebuild the derived tables
    Sync {
        /// Only fetch the most recent N archive months
        #[arg(long)]
        months: Option<usize>,
    },

    /// Rebuild the derived tables from stored games, no network
    Rebuild,

    /// Write games.csv, daily_stats.csv and calculated.csv
    Export {
        #[arg(long, default_value = "./export")]
        out: String,
    },

    /// Show the public profile and stats for the configured user
    Profile,

    /// Look up one opponent's per-mode ratings (cached for an hour)
    Opponent {
        username: String,
    },

    /// Show the most recent run-log entries
    Runs {
        #[arg(long, default_value = "10")]
        limit: usize,
    },

    /// Show table counts and the last sync time
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let args = Args::parse();
    let config = Config::from_env().context("Failed to load configuration")?;
    let db_path = args.db.unwrap_or_else(|| config.database_path.clone());
    let store = GameStore::new(&db_path)?;

    match args.command {
        Commands::Sync { months } => {
            let mut client = ChessComClient::new(
                &config.api_base,
                Duration::from_millis(config.fetch_delay_ms),
            )?;
            match run_sync(&config, &store, &mut client, months).await {
                Ok(report) => {
                    println!("Sync {}", report.status());
                    println!("{}", report.summary());
                }
                Err(e) => {
                    error!("Sync failed: {:#}", e);
                    return Err(e);
                }
            }
        }
        Commands::Rebuild => {
            let report = run_rebuild(&config, &store).await?;
            println!("Rebuild ok");
            println!("{}", report.summary());
        }
        Commands::Export { out } => {
            let written = export_all(&store, Path::new(&out))?;
            for path in written {
                println!("wrote {}", path.display());
            }
        }
        Commands::Profile => {
            let mut client = ChessComClient::new(
                &config.api_base,
                Duration::from_millis(config.fetch_delay_ms),
            )?;
            let username = config.username.to_lowercase();
            let profile = client.fetch_profile(&username).await?;
            println!("{}", serde_json::to_string_pretty(&profile)?);
            let stats = client.fetch_stats(&username).await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        Commands::Opponent { username } => {
            let mut client = ChessComClient::new(
                &config.api_base,
                Duration::from_millis(config.fetch_delay_ms),
            )?;
            let ratings = opponents::opponent_ratings(&store, &mut client, &username).await;
            println!("{}", serde_json::to_string_pretty(&ratings)?);
        }
        Commands::Runs { limit } => {
            let runs = store.recent_runs(limit)?;
            if runs.is_empty() {
                println!("no runs recorded yet");
            }
            for run in runs {
                println!(
                    "{}  {:<8} {:<8} {:>7}ms  {}",
                    run.started_at, run.operation, run.status, run.elapsed_ms, run.notes
                );
            }
        }
        Commands::Status => {
            info!("Database: {}", db_path);
            println!("games: {}", store.len());
            println!("days:  {}", store.load_daily_stats()?.len());
            println!("calc:  {}", store.load_calculated()?.len());
            match store.get_meta("last_sync_at")? {
                Some(at) => println!("last sync: {}", at),
                None => println!("last sync: never"),
            }
        }
    }

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chesstrack=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
