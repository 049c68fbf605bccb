//! Table Inspection Tool
//!
//! Read-only probe over a chesstrack database: table counts, per-mode game
//! breakdowns, warning-token tallies, and sample rows. Useful for checking
//! what a sync actually wrote without opening a SQLite shell.
//!
//! Usage:
//!   cargo run --bin table_inspect -- --db-path ./chesstrack.db summary
//!   cargo run --bin table_inspect -- --db-path ./chesstrack.db warnings
//!   cargo run --bin table_inspect -- --db-path ./chesstrack.db sample --count 5

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rusqlite::{Connection, OpenFlags};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "table_inspect")]
#[command(about = "Inspect a chesstrack game database")]
struct Cli {
    /// Path to the SQLite database
    #[arg(short, long, default_value = "./chesstrack.db")]
    db_path: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Row counts for every table, plus a per-mode game breakdown
    Summary,

    /// Count games carrying each data-quality warning token
    Warnings,

    /// Show the most recent N games by local end time
    Sample {
        #[arg(short, long, default_value = "5")]
        count: usize,
    },

    /// Show the most recent run-log entries
    Runs {
        #[arg(short, long, default_value = "10")]
        count: usize,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let conn = Connection::open_with_flags(&cli.db_path, OpenFlags::SQLITE_OPEN_READ_ONLY)
        .with_context(|| format!("Failed to open {}", cli.db_path.display()))?;

    match cli.command {
        Commands::Summary => summary(&conn),
        Commands::Warnings => warnings(&conn),
        Commands::Sample { count } => sample(&conn, count),
        Commands::Runs { count } => runs(&conn, count),
    }
}

fn summary(conn: &Connection) -> Result<()> {
    for table in ["games", "daily_stats", "calculated", "api_cache", "runs"] {
        let count: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |r| {
            r.get(0)
        })?;
        println!("{:<12} {:>8} rows", table, count);
    }

    println!();
    let mut stmt =
        conn.prepare("SELECT mode, COUNT(*) FROM games GROUP BY mode ORDER BY COUNT(*) DESC")?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let mode: String = row.get(0)?;
        let count: i64 = row.get(1)?;
        let label = if mode.is_empty() { "(none)" } else { mode.as_str() };
        println!("mode {:<12} {:>8}", label, count);
    }
    Ok(())
}

fn warnings(conn: &Connection) -> Result<()> {
    let tokens = [
        "rating-mismatch",
        "utc-missing",
        "time-missing",
        "accuracy-missing",
        "duplicate-updated",
    ];
    // warnings is a comma-joined token list; surrounding it with commas makes
    // the LIKE match exact tokens instead of substrings.
    for token in tokens {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM games WHERE ',' || warnings || ',' LIKE ?1",
            [format!("%,{},%", token)],
            |r| r.get(0),
        )?;
        println!("{:<18} {:>8}", token, count);
    }
    let clean: i64 = conn.query_row("SELECT COUNT(*) FROM games WHERE warnings = ''", [], |r| {
        r.get(0)
    })?;
    println!("{:<18} {:>8}", "(clean)", clean);
    Ok(())
}

fn sample(conn: &Connection, count: usize) -> Result<()> {
    let mut stmt = conn.prepare(
        "SELECT url, end_date_local, end_time_local, mode, winner, termination, my_rating
         FROM games
         ORDER BY end_date_local DESC, end_time_local DESC
         LIMIT ?1",
    )?;
    let mut rows = stmt.query([count])?;
    while let Some(row) = rows.next()? {
        let url: String = row.get(0)?;
        let date: String = row.get(1)?;
        let time: String = row.get(2)?;
        let mode: String = row.get(3)?;
        let winner: String = row.get(4)?;
        let termination: String = row.get(5)?;
        let rating: String = row.get(6)?;
        println!(
            "{} {}  {:<9} {:<5} {:<20} {:<30} {}",
            date, time, mode, rating, winner, termination, url
        );
    }
    Ok(())
}

fn runs(conn: &Connection, count: usize) -> Result<()> {
    let mut stmt = conn.prepare(
        "SELECT started_at, operation, status, elapsed_ms, notes
         FROM runs ORDER BY started_at DESC LIMIT ?1",
    )?;
    let mut rows = stmt.query([count])?;
    while let Some(row) = rows.next()? {
        let started_at: String = row.get(0)?;
        let operation: String = row.get(1)?;
        let status: String = row.get(2)?;
        let elapsed_ms: i64 = row.get(3)?;
        let notes: String = row.get(4)?;
        println!(
            "{}  {:<8} {:<8} {:>7}ms  {}",
            started_at, operation, status, elapsed_ms, notes
        );
    }
    Ok(())
}
