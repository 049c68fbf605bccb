//! CSV exports of the stored and derived tables.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::info;

use crate::analytics::daily::{DailyAggregate, ModeDay};
use crate::models::COLUMNS;
use crate::store::GameStore;

const CALC_HEADERS: [&str; 21] = [
    "url",
    "end_date_local",
    "end_time_local",
    "mode",
    "my_color",
    "opp_color",
    "my_score",
    "opp_score",
    "my_bullet_rating",
    "my_blitz_rating",
    "my_rapid_rating",
    "my_daily_rating",
    "my_chess960_rating",
    "my_daily960_rating",
    "opp_bullet_rating",
    "opp_blitz_rating",
    "opp_rapid_rating",
    "opp_daily_rating",
    "opp_chess960_rating",
    "opp_daily960_rating",
    "rating_delta",
];

const DAILY_HEADERS: [&str; 30] = [
    "date",
    "bullet_games",
    "bullet_wins",
    "bullet_losses",
    "bullet_draws",
    "bullet_rating",
    "bullet_change",
    "bullet_seconds",
    "blitz_games",
    "blitz_wins",
    "blitz_losses",
    "blitz_draws",
    "blitz_rating",
    "blitz_change",
    "blitz_seconds",
    "rapid_games",
    "rapid_wins",
    "rapid_losses",
    "rapid_draws",
    "rapid_rating",
    "rapid_change",
    "rapid_seconds",
    "total_games",
    "total_wins",
    "total_losses",
    "total_draws",
    "rating_sum",
    "total_change",
    "total_seconds",
    "avg_seconds",
];

/// Write games.csv, daily_stats.csv and calculated.csv under `out_dir`,
/// creating the directory if needed. Returns the paths written.
pub fn export_all(store: &GameStore, out_dir: &Path) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create {}", out_dir.display()))?;

    let written = vec![
        export_games(store, out_dir)?,
        export_daily(store, out_dir)?,
        export_calculated(store, out_dir)?,
    ];
    info!("📤 Exported {} files to {}", written.len(), out_dir.display());
    Ok(written)
}

fn export_games(store: &GameStore, out_dir: &Path) -> Result<PathBuf> {
    let path = out_dir.join("games.csv");
    let mut wtr =
        csv::Writer::from_path(&path).with_context(|| format!("open {}", path.display()))?;
    wtr.write_record(COLUMNS)?;
    for row in store.load_all()? {
        wtr.write_record(row.to_values())?;
    }
    wtr.flush()?;
    Ok(path)
}

fn export_daily(store: &GameStore, out_dir: &Path) -> Result<PathBuf> {
    let path = out_dir.join("daily_stats.csv");
    let mut wtr =
        csv::Writer::from_path(&path).with_context(|| format!("open {}", path.display()))?;
    wtr.write_record(DAILY_HEADERS)?;
    for day in store.load_daily_stats()? {
        wtr.write_record(daily_values(&day))?;
    }
    wtr.flush()?;
    Ok(path)
}

fn export_calculated(store: &GameStore, out_dir: &Path) -> Result<PathBuf> {
    let path = out_dir.join("calculated.csv");
    let mut wtr =
        csv::Writer::from_path(&path).with_context(|| format!("open {}", path.display()))?;
    wtr.write_record(CALC_HEADERS)?;
    for row in store.load_calculated()? {
        wtr.write_record([
            &row.url,
            &row.end_date_local,
            &row.end_time_local,
            &row.mode,
            &row.my_color,
            &row.opp_color,
            &row.my_score,
            &row.opp_score,
            &row.my_bullet_rating,
            &row.my_blitz_rating,
            &row.my_rapid_rating,
            &row.my_daily_rating,
            &row.my_chess960_rating,
            &row.my_daily960_rating,
            &row.opp_bullet_rating,
            &row.opp_blitz_rating,
            &row.opp_rapid_rating,
            &row.opp_daily_rating,
            &row.opp_chess960_rating,
            &row.opp_daily960_rating,
            &row.rating_delta,
        ])?;
    }
    wtr.flush()?;
    Ok(path)
}

fn daily_values(day: &DailyAggregate) -> Vec<String> {
    let mode = |m: &ModeDay| {
        [
            m.games,
            m.wins,
            m.losses,
            m.draws,
            m.rating,
            m.rating_change,
            m.seconds,
        ]
    };

    let mut out = vec![day.date.clone()];
    for value in mode(&day.bullet)
        .into_iter()
        .chain(mode(&day.blitz))
        .chain(mode(&day.rapid))
    {
        out.push(value.to_string());
    }
    out.extend(
        [
            day.total_games,
            day.total_wins,
            day.total_losses,
            day.total_draws,
            day.rating_sum,
            day.total_change,
            day.total_seconds,
            day.avg_seconds,
        ]
        .iter()
        .map(|v| v.to_string()),
    );
    out
}
