//! Sync and rebuild workflows.
//!
//! A sync is one logical operation: fetch archive months, normalize, upsert,
//! then rebuild the derived tables. A rebuild does the derived half offline.
//! Both hold the process-wide run lock end to end so a manually triggered
//! run and a scheduled one can never interleave writes.

use std::time::{Duration, Instant};

use anyhow::Result;
use chrono::Utc;
use lazy_static::lazy_static;
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::analytics::calc_view::build_calc_view;
use crate::analytics::daily::build_daily;
use crate::analytics::end_sort_key;
use crate::analytics::running::RunningRatings;
use crate::chesscom::api::ChessComClient;
use crate::errors::ChessTrackError;
use crate::models::{Config, GameRow};
use crate::normalize::Normalizer;
use crate::opponents;
use crate::store::{GameStore, RunRecord, UpsertCounters};

const LOCK_WAIT_MS: u64 = 500;
pub const ARCHIVES_CACHE_TTL_SECS: i64 = 600;

lazy_static! {
    static ref RUN_LOCK: Mutex<()> = Mutex::new(());
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    pub months_total: usize,
    pub months_fetched: usize,
    pub months_failed: usize,
    pub games_seen: usize,
    pub counters: UpsertCounters,
    pub days_rebuilt: usize,
    pub calc_rows: usize,
    pub elapsed_ms: i64,
}

impl SyncReport {
    pub fn status(&self) -> &'static str {
        if self.months_failed > 0 {
            "partial"
        } else {
            "ok"
        }
    }

    pub fn summary(&self) -> String {
        [
            format!(
                "Months: {}/{} fetched ({} failed)",
                self.months_fetched, self.months_total, self.months_failed
            ),
            format!(
                "Games: {} seen, {} added, {} duplicates ({} updated, {} skipped)",
                self.games_seen,
                self.counters.added,
                self.counters.duplicates_seen,
                self.counters.duplicates_updated,
                self.counters.duplicates_skipped
            ),
            format!(
                "Quality: {} utc-missing, {} accuracy-missing",
                self.counters.utc_missing, self.counters.accuracy_missing
            ),
            format!(
                "Derived: {} days, {} calculated rows",
                self.days_rebuilt, self.calc_rows
            ),
            format!("Elapsed: {} ms", self.elapsed_ms),
        ]
        .join("\n")
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RebuildReport {
    pub games: usize,
    pub days_rebuilt: usize,
    pub calc_rows: usize,
    pub elapsed_ms: i64,
}

impl RebuildReport {
    pub fn summary(&self) -> String {
        [
            format!("Games: {} in table", self.games),
            format!(
                "Derived: {} days, {} calculated rows",
                self.days_rebuilt, self.calc_rows
            ),
            format!("Elapsed: {} ms", self.elapsed_ms),
        ]
        .join("\n")
    }
}

/// Full sync: archive discovery, month fetches, normalize, upsert, derived
/// rebuild, opponent enrichment. `months` limits the fetch to the most
/// recent N archive months.
pub async fn run_sync(
    config: &Config,
    store: &GameStore,
    client: &mut ChessComClient,
    months: Option<usize>,
) -> Result<SyncReport> {
    let started = Instant::now();
    let started_at = Utc::now().to_rfc3339();

    let Ok(_guard) = timeout(Duration::from_millis(LOCK_WAIT_MS), RUN_LOCK.lock()).await else {
        record_run(
            store,
            &started_at,
            "sync",
            &config.username,
            "locked",
            started.elapsed().as_millis() as i64,
            "another run is already in progress",
        );
        return Err(ChessTrackError::LockContention.into());
    };

    info!("🔄 Starting sync for {}", config.username);
    let mut report = SyncReport::default();
    let result = sync_inner(config, store, client, months, &mut report).await;
    report.elapsed_ms = started.elapsed().as_millis() as i64;

    let (status, notes) = match &result {
        Ok(()) => (
            report.status().to_string(),
            serde_json::to_string(&report).unwrap_or_default(),
        ),
        Err(e) => ("failed".to_string(), format!("{:#}", e)),
    };
    record_run(
        store,
        &started_at,
        "sync",
        &config.username,
        &status,
        report.elapsed_ms,
        &notes,
    );

    result.map(|_| report)
}

async fn sync_inner(
    config: &Config,
    store: &GameStore,
    client: &mut ChessComClient,
    months: Option<usize>,
    report: &mut SyncReport,
) -> Result<()> {
    let archives = fetch_archives_cached(store, client, &config.username).await?;
    let selected = select_recent(&archives, months);
    report.months_total = selected.len();
    info!("📅 {} archive months to fetch", selected.len());

    let mut raw_games = Vec::new();
    for archive_url in &selected {
        match client.fetch_month(archive_url).await {
            Ok(month) => {
                report.months_fetched += 1;
                debug!("{}: {} games", archive_url, month.games.len());
                raw_games.extend(month.games);
            }
            Err(e) => {
                // One bad month must not sink the rest of the run.
                report.months_failed += 1;
                warn!("Skipping month {}: {:#}", archive_url, e);
            }
        }
    }
    report.games_seen = raw_games.len();

    let normalizer = Normalizer::new(&config.username, config.display_timezone);
    let mut rows: Vec<GameRow> = raw_games.iter().map(|g| normalizer.normalize(g)).collect();
    rows.sort_by_key(end_sort_key);

    // Fold the stored history into the carry-forward state so a
    // months-limited sync stamps new rows against what was already known,
    // instead of restarting every mode at "unknown".
    let mut existing = store.load_all()?;
    existing.sort_by_key(end_sort_key);
    stamp_running_ratings(&existing, &mut rows);

    report.counters = store.upsert_batch(&rows)?;

    let all = store.load_all()?;
    let daily = build_daily(&all, &config.username);
    report.days_rebuilt = daily.len();
    store.replace_daily_stats(&daily)?;

    let opponent_map = opponents::enrich_opponents(store, client, &all).await;
    let calc = build_calc_view(&all, &config.username, &opponent_map);
    report.calc_rows = calc.len();
    store.replace_calculated(&calc)?;

    if let Err(e) = store.set_meta("last_sync_at", &Utc::now().to_rfc3339()) {
        warn!("Failed to record last_sync_at: {}", e);
    }

    info!(
        "✅ Sync complete: {} added, {} duplicates seen",
        report.counters.added, report.counters.duplicates_seen
    );
    Ok(())
}

/// Rebuild the derived tables from the stored games without any network
/// traffic. Opponent columns are filled from whatever the cache still holds.
pub async fn run_rebuild(config: &Config, store: &GameStore) -> Result<RebuildReport> {
    let started = Instant::now();
    let started_at = Utc::now().to_rfc3339();

    let Ok(_guard) = timeout(Duration::from_millis(LOCK_WAIT_MS), RUN_LOCK.lock()).await else {
        record_run(
            store,
            &started_at,
            "rebuild",
            &config.username,
            "locked",
            started.elapsed().as_millis() as i64,
            "another run is already in progress",
        );
        return Err(ChessTrackError::LockContention.into());
    };

    info!("🔄 Rebuilding derived tables for {}", config.username);
    let mut report = RebuildReport::default();
    let result = rebuild_inner(config, store, &mut report);
    report.elapsed_ms = started.elapsed().as_millis() as i64;

    let (status, notes) = match &result {
        Ok(()) => (
            "ok".to_string(),
            serde_json::to_string(&report).unwrap_or_default(),
        ),
        Err(e) => ("failed".to_string(), format!("{:#}", e)),
    };
    record_run(
        store,
        &started_at,
        "rebuild",
        &config.username,
        &status,
        report.elapsed_ms,
        &notes,
    );

    result.map(|_| report)
}

fn rebuild_inner(config: &Config, store: &GameStore, report: &mut RebuildReport) -> Result<()> {
    let all = store.load_all()?;
    report.games = all.len();

    let daily = build_daily(&all, &config.username);
    report.days_rebuilt = daily.len();
    store.replace_daily_stats(&daily)?;

    let opponent_map = opponents::cached_opponents(store, &all);
    let calc = build_calc_view(&all, &config.username, &opponent_map);
    report.calc_rows = calc.len();
    store.replace_calculated(&calc)?;
    Ok(())
}

async fn fetch_archives_cached(
    store: &GameStore,
    client: &mut ChessComClient,
    username: &str,
) -> Result<Vec<String>> {
    let key = format!("archives_v1:{}", username.to_lowercase());
    let now = Utc::now().timestamp();
    match store.get_cache(&key) {
        Ok(Some((json, fetched_at))) if now - fetched_at <= ARCHIVES_CACHE_TTL_SECS => {
            if let Ok(urls) = serde_json::from_str::<Vec<String>>(&json) {
                debug!("Archive list cache hit for {}", username);
                return Ok(urls);
            }
        }
        Ok(_) => {}
        Err(e) => warn!("Archive cache read failed: {}", e),
    }

    let urls = client.fetch_archives(&username.to_lowercase()).await?;
    if let Ok(json) = serde_json::to_string(&urls) {
        if let Err(e) = store.upsert_cache(&key, &json, now) {
            warn!("Archive cache write failed: {}", e);
        }
    }
    Ok(urls)
}

/// Stamp the six running-rating columns onto `incoming`, folding stored
/// history in as the scan reaches it. Both slices must be sorted by end
/// instant. A stored row is observed only once the scan passes its end
/// instant, so a backfilled month never inherits a rating from a stored
/// game that finished after it.
fn stamp_running_ratings(existing: &[GameRow], incoming: &mut [GameRow]) {
    let mut running = RunningRatings::new();
    let mut history = existing.iter().peekable();
    for row in incoming.iter_mut() {
        let key = end_sort_key(row);
        while let Some(prior) = history.peek() {
            if end_sort_key(prior) > key {
                break;
            }
            running.observe(&prior.mode, &prior.my_rating);
            history.next();
        }
        running.stamp(row);
    }
}

/// Most recent `limit` archive urls; the upstream list is oldest-first.
fn select_recent(archives: &[String], limit: Option<usize>) -> Vec<String> {
    match limit {
        Some(n) => archives.iter().rev().take(n).rev().cloned().collect(),
        None => archives.to_vec(),
    }
}

fn record_run(
    store: &GameStore,
    started_at: &str,
    operation: &str,
    username: &str,
    status: &str,
    elapsed_ms: i64,
    notes: &str,
) {
    let run = RunRecord {
        id: Uuid::new_v4().to_string(),
        started_at: started_at.to_string(),
        operation: operation.to_string(),
        username: username.to_string(),
        status: status.to_string(),
        elapsed_ms,
        notes: notes.to_string(),
    };
    if let Err(e) = store.insert_run(&run) {
        warn!("Failed to record run log entry: {}", e);
    }
}
