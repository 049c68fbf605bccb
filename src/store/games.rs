//! SQLite-backed game archive
//!
//! Storage notes:
//! - WAL mode for concurrent reads during writes
//! - Prepared statement caching
//! - Batch upserts inside a single transaction
//! - games DDL and statements are generated from the canonical column list,
//!   so table layout can never drift from `GameRow`
//! - Everything in `games` and `calculated` is TEXT; numeric interpretation
//!   happens in the analytics layer

use crate::analytics::calc_view::CalcRow;
use crate::analytics::daily::{DailyAggregate, ModeDay};
use crate::models::{GameRow, COLUMNS};
use anyhow::{Context, Result};
use lazy_static::lazy_static;
use parking_lot::Mutex; // Faster than std::sync::Mutex
use rusqlite::{params, params_from_iter, Connection, OpenFlags};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, info, warn};

const SCHEMA_SQL: &str = r#"
-- Enable WAL mode for better concurrent access
PRAGMA journal_mode = WAL;
PRAGMA synchronous = NORMAL;
PRAGMA cache_size = -64000;  -- 64MB cache
PRAGMA temp_store = MEMORY;

-- Per-day aggregates, rebuilt wholesale after each sync
CREATE TABLE IF NOT EXISTS daily_stats (
    date TEXT PRIMARY KEY,
    bullet_games INTEGER NOT NULL, bullet_wins INTEGER NOT NULL,
    bullet_losses INTEGER NOT NULL, bullet_draws INTEGER NOT NULL,
    bullet_rating INTEGER NOT NULL, bullet_change INTEGER NOT NULL,
    bullet_seconds INTEGER NOT NULL,
    blitz_games INTEGER NOT NULL, blitz_wins INTEGER NOT NULL,
    blitz_losses INTEGER NOT NULL, blitz_draws INTEGER NOT NULL,
    blitz_rating INTEGER NOT NULL, blitz_change INTEGER NOT NULL,
    blitz_seconds INTEGER NOT NULL,
    rapid_games INTEGER NOT NULL, rapid_wins INTEGER NOT NULL,
    rapid_losses INTEGER NOT NULL, rapid_draws INTEGER NOT NULL,
    rapid_rating INTEGER NOT NULL, rapid_change INTEGER NOT NULL,
    rapid_seconds INTEGER NOT NULL,
    total_games INTEGER NOT NULL, total_wins INTEGER NOT NULL,
    total_losses INTEGER NOT NULL, total_draws INTEGER NOT NULL,
    rating_sum INTEGER NOT NULL, total_change INTEGER NOT NULL,
    total_seconds INTEGER NOT NULL, avg_seconds INTEGER NOT NULL
) WITHOUT ROWID;

-- Per-game calculation view, rebuilt wholesale after each sync
CREATE TABLE IF NOT EXISTS calculated (
    url TEXT PRIMARY KEY,
    end_date_local TEXT NOT NULL DEFAULT '',
    end_time_local TEXT NOT NULL DEFAULT '',
    mode TEXT NOT NULL DEFAULT '',
    my_color TEXT NOT NULL DEFAULT '',
    opp_color TEXT NOT NULL DEFAULT '',
    my_score TEXT NOT NULL DEFAULT '',
    opp_score TEXT NOT NULL DEFAULT '',
    my_bullet_rating TEXT NOT NULL DEFAULT '',
    my_blitz_rating TEXT NOT NULL DEFAULT '',
    my_rapid_rating TEXT NOT NULL DEFAULT '',
    my_daily_rating TEXT NOT NULL DEFAULT '',
    my_chess960_rating TEXT NOT NULL DEFAULT '',
    my_daily960_rating TEXT NOT NULL DEFAULT '',
    opp_bullet_rating TEXT NOT NULL DEFAULT '',
    opp_blitz_rating TEXT NOT NULL DEFAULT '',
    opp_rapid_rating TEXT NOT NULL DEFAULT '',
    opp_daily_rating TEXT NOT NULL DEFAULT '',
    opp_chess960_rating TEXT NOT NULL DEFAULT '',
    opp_daily960_rating TEXT NOT NULL DEFAULT '',
    rating_delta TEXT NOT NULL DEFAULT ''
) WITHOUT ROWID;

CREATE INDEX IF NOT EXISTS idx_calculated_end_local
    ON calculated(end_date_local, end_time_local);

-- DB-backed cache to reduce repeated chess.com REST calls
CREATE TABLE IF NOT EXISTS api_cache (
    cache_key TEXT PRIMARY KEY,
    cache_json TEXT NOT NULL,
    fetched_at INTEGER NOT NULL
) WITHOUT ROWID;

CREATE INDEX IF NOT EXISTS idx_api_cache_fetched_at
    ON api_cache(fetched_at DESC);

-- Execution log, one row per sync/rebuild run
CREATE TABLE IF NOT EXISTS runs (
    id TEXT PRIMARY KEY,
    started_at TEXT NOT NULL,
    operation TEXT NOT NULL,
    username TEXT NOT NULL,
    status TEXT NOT NULL,
    elapsed_ms INTEGER NOT NULL,
    notes TEXT NOT NULL
) WITHOUT ROWID;

CREATE INDEX IF NOT EXISTS idx_runs_started_at
    ON runs(started_at DESC);

CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
) WITHOUT ROWID;
"#;

lazy_static! {
    static ref GAMES_DDL: String = {
        let cols = COLUMNS
            .iter()
            .map(|c| {
                if *c == "url" {
                    format!("{} TEXT PRIMARY KEY", c)
                } else {
                    format!("{} TEXT NOT NULL DEFAULT ''", c)
                }
            })
            .collect::<Vec<_>>()
            .join(",\n    ");
        format!(
            "CREATE TABLE IF NOT EXISTS games (\n    {}\n) WITHOUT ROWID;\n\
             CREATE INDEX IF NOT EXISTS idx_games_end_local ON games(end_date_local, end_time_local);\n\
             CREATE INDEX IF NOT EXISTS idx_games_mode ON games(mode);",
            cols
        )
    };
    static ref GAMES_INSERT: String = {
        let placeholders = (1..=COLUMNS.len())
            .map(|i| format!("?{}", i))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "INSERT INTO games ({}) VALUES ({})",
            COLUMNS.join(", "),
            placeholders
        )
    };
    static ref GAMES_UPDATE: String = {
        let sets = COLUMNS
            .iter()
            .enumerate()
            .skip(1)
            .map(|(i, c)| format!("{} = ?{}", c, i + 1))
            .collect::<Vec<_>>()
            .join(", ");
        format!("UPDATE games SET {} WHERE url = ?1", sets)
    };
    static ref GAMES_SELECT: String = format!("SELECT {} FROM games", COLUMNS.join(", "));
}

/// Counters reported by one upsert batch, tallied over the incoming rows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UpsertCounters {
    pub added: usize,
    pub duplicates_seen: usize,
    pub duplicates_updated: usize,
    pub duplicates_skipped: usize,
    pub utc_missing: usize,
    pub accuracy_missing: usize,
}

/// One row of the execution log.
#[derive(Debug, Clone, Serialize)]
pub struct RunRecord {
    pub id: String,
    pub started_at: String,
    pub operation: String,
    pub username: String,
    pub status: String,
    pub elapsed_ms: i64,
    pub notes: String,
}

pub struct GameStore {
    conn: Arc<Mutex<Connection>>,
}

impl GameStore {
    pub fn new(db_path: &str) -> Result<Self> {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX; // We handle our own locking

        let conn = Connection::open_with_flags(db_path, flags)
            .with_context(|| format!("Failed to open database at {}", db_path))?;

        conn.execute_batch(SCHEMA_SQL)
            .context("Failed to initialize database schema")?;
        conn.execute_batch(&GAMES_DDL)
            .context("Failed to initialize games table")?;

        let journal_mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap_or_default();
        if journal_mode.to_lowercase() != "wal" {
            warn!("WAL mode not active, journal_mode = {}", journal_mode);
        }

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM games", [], |row| row.get(0))
            .unwrap_or(0);
        info!("📊 Game database initialized at: {}", db_path);
        info!("📈 Existing games in database: {}", count);

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Number of games currently stored.
    pub fn len(&self) -> usize {
        let conn = self.conn.lock();
        conn.query_row("SELECT COUNT(*) FROM games", [], |row| {
            row.get::<_, i64>(0)
        })
        .unwrap_or(0) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All stored games, ordered by url for determinism. Chronological
    /// ordering is the analytics layer's job.
    pub fn load_all(&self) -> Result<Vec<GameRow>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(&format!("{} ORDER BY url", *GAMES_SELECT))?;
        let games = stmt
            .query_map([], Self::row_to_game)?
            .filter_map(|r| r.ok())
            .collect();
        Ok(games)
    }

    pub fn get_game(&self, url: &str) -> Result<Option<GameRow>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(&format!("{} WHERE url = ?1", *GAMES_SELECT))?;
        let mut rows = stmt.query([url])?;
        let Some(row) = rows.next()? else {
            return Ok(None);
        };
        Ok(Some(Self::row_to_game(row)?))
    }

    /// Insert new games and fill gaps in existing ones.
    ///
    /// Identity is the game url. An incoming duplicate never overwrites a
    /// non-empty stored field; it only fills fields the stored row left
    /// empty, and a row that gained data is tagged `duplicate-updated` once.
    /// Re-running the same batch is therefore a no-op.
    pub fn upsert_batch(&self, incoming: &[GameRow]) -> Result<UpsertCounters> {
        let mut counters = UpsertCounters::default();
        if incoming.is_empty() {
            return Ok(counters);
        }

        let mut rows = self.load_all()?;
        let original_len = rows.len();
        let mut by_url: HashMap<String, usize> = rows
            .iter()
            .enumerate()
            .map(|(idx, row)| (row.url.clone(), idx))
            .collect();
        let mut touched: BTreeSet<usize> = BTreeSet::new();

        for game in incoming {
            if has_warning(game, "utc-missing") {
                counters.utc_missing += 1;
            }
            if has_warning(game, "accuracy-missing") {
                counters.accuracy_missing += 1;
            }

            match by_url.get(&game.url) {
                Some(&idx) => {
                    counters.duplicates_seen += 1;
                    let filled = rows[idx].fill_from(game);
                    if filled > 0 {
                        rows[idx].add_warning("duplicate-updated");
                        counters.duplicates_updated += 1;
                        if idx < original_len {
                            touched.insert(idx);
                        }
                    } else {
                        counters.duplicates_skipped += 1;
                    }
                }
                None => {
                    counters.added += 1;
                    by_url.insert(game.url.clone(), rows.len());
                    rows.push(game.clone());
                }
            }
        }

        let conn = self.conn.lock();
        conn.execute("BEGIN IMMEDIATE", [])?;
        {
            let mut insert = conn.prepare_cached(&GAMES_INSERT)?;
            for row in &rows[original_len..] {
                insert.execute(params_from_iter(row.to_values()))?;
            }
            let mut update = conn.prepare_cached(&GAMES_UPDATE)?;
            for &idx in &touched {
                update.execute(params_from_iter(rows[idx].to_values()))?;
            }
        }
        conn.execute("COMMIT", [])?;

        debug!(
            "📦 Upserted batch: {} added, {} duplicates ({} updated)",
            counters.added, counters.duplicates_seen, counters.duplicates_updated
        );
        Ok(counters)
    }

    /// Replace the daily_stats table with a freshly computed set.
    pub fn replace_daily_stats(&self, days: &[DailyAggregate]) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute("BEGIN IMMEDIATE", [])?;
        conn.execute("DELETE FROM daily_stats", [])?;
        {
            let mut stmt = conn.prepare_cached(
                "INSERT INTO daily_stats (
                    date,
                    bullet_games, bullet_wins, bullet_losses, bullet_draws,
                    bullet_rating, bullet_change, bullet_seconds,
                    blitz_games, blitz_wins, blitz_losses, blitz_draws,
                    blitz_rating, blitz_change, blitz_seconds,
                    rapid_games, rapid_wins, rapid_losses, rapid_draws,
                    rapid_rating, rapid_change, rapid_seconds,
                    total_games, total_wins, total_losses, total_draws,
                    rating_sum, total_change, total_seconds, avg_seconds
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10,
                           ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20,
                           ?21, ?22, ?23, ?24, ?25, ?26, ?27, ?28, ?29, ?30)",
            )?;
            for day in days {
                stmt.execute(params![
                    day.date,
                    day.bullet.games,
                    day.bullet.wins,
                    day.bullet.losses,
                    day.bullet.draws,
                    day.bullet.rating,
                    day.bullet.rating_change,
                    day.bullet.seconds,
                    day.blitz.games,
                    day.blitz.wins,
                    day.blitz.losses,
                    day.blitz.draws,
                    day.blitz.rating,
                    day.blitz.rating_change,
                    day.blitz.seconds,
                    day.rapid.games,
                    day.rapid.wins,
                    day.rapid.losses,
                    day.rapid.draws,
                    day.rapid.rating,
                    day.rapid.rating_change,
                    day.rapid.seconds,
                    day.total_games,
                    day.total_wins,
                    day.total_losses,
                    day.total_draws,
                    day.rating_sum,
                    day.total_change,
                    day.total_seconds,
                    day.avg_seconds,
                ])?;
            }
        }
        conn.execute("COMMIT", [])?;
        debug!("Rebuilt daily_stats with {} days", days.len());
        Ok(())
    }

    pub fn load_daily_stats(&self) -> Result<Vec<DailyAggregate>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT date,
                    bullet_games, bullet_wins, bullet_losses, bullet_draws,
                    bullet_rating, bullet_change, bullet_seconds,
                    blitz_games, blitz_wins, blitz_losses, blitz_draws,
                    blitz_rating, blitz_change, blitz_seconds,
                    rapid_games, rapid_wins, rapid_losses, rapid_draws,
                    rapid_rating, rapid_change, rapid_seconds,
                    total_games, total_wins, total_losses, total_draws,
                    rating_sum, total_change, total_seconds, avg_seconds
             FROM daily_stats ORDER BY date ASC",
        )?;
        let days = stmt
            .query_map([], Self::row_to_daily)?
            .filter_map(|r| r.ok())
            .collect();
        Ok(days)
    }

    /// Replace the calculated table with a freshly computed set.
    pub fn replace_calculated(&self, rows: &[CalcRow]) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute("BEGIN IMMEDIATE", [])?;
        conn.execute("DELETE FROM calculated", [])?;
        {
            let mut stmt = conn.prepare_cached(
                "INSERT INTO calculated (
                    url, end_date_local, end_time_local, mode,
                    my_color, opp_color, my_score, opp_score,
                    my_bullet_rating, my_blitz_rating, my_rapid_rating,
                    my_daily_rating, my_chess960_rating, my_daily960_rating,
                    opp_bullet_rating, opp_blitz_rating, opp_rapid_rating,
                    opp_daily_rating, opp_chess960_rating, opp_daily960_rating,
                    rating_delta
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11,
                           ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21)",
            )?;
            for row in rows {
                stmt.execute(params![
                    row.url,
                    row.end_date_local,
                    row.end_time_local,
                    row.mode,
                    row.my_color,
                    row.opp_color,
                    row.my_score,
                    row.opp_score,
                    row.my_bullet_rating,
                    row.my_blitz_rating,
                    row.my_rapid_rating,
                    row.my_daily_rating,
                    row.my_chess960_rating,
                    row.my_daily960_rating,
                    row.opp_bullet_rating,
                    row.opp_blitz_rating,
                    row.opp_rapid_rating,
                    row.opp_daily_rating,
                    row.opp_chess960_rating,
                    row.opp_daily960_rating,
                    row.rating_delta,
                ])?;
            }
        }
        conn.execute("COMMIT", [])?;
        debug!("Rebuilt calculated view with {} rows", rows.len());
        Ok(())
    }

    pub fn load_calculated(&self) -> Result<Vec<CalcRow>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT url, end_date_local, end_time_local, mode,
                    my_color, opp_color, my_score, opp_score,
                    my_bullet_rating, my_blitz_rating, my_rapid_rating,
                    my_daily_rating, my_chess960_rating, my_daily960_rating,
                    opp_bullet_rating, opp_blitz_rating, opp_rapid_rating,
                    opp_daily_rating, opp_chess960_rating, opp_daily960_rating,
                    rating_delta
             FROM calculated
             ORDER BY end_date_local ASC, end_time_local ASC, url ASC",
        )?;
        let rows = stmt
            .query_map([], Self::row_to_calc)?
            .filter_map(|r| r.ok())
            .collect();
        Ok(rows)
    }

    /// Get cached JSON blob by key.
    pub fn get_cache(&self, cache_key: &str) -> Result<Option<(String, i64)>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare_cached("SELECT cache_json, fetched_at FROM api_cache WHERE cache_key = ?1")?;
        let mut rows = stmt.query([cache_key])?;
        let Some(row) = rows.next()? else {
            return Ok(None);
        };
        let json: String = row.get(0)?;
        let fetched_at: i64 = row.get(1)?;
        Ok(Some((json, fetched_at)))
    }

    /// Upsert cache JSON blob.
    pub fn upsert_cache(&self, cache_key: &str, cache_json: &str, fetched_at: i64) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO api_cache (cache_key, cache_json, fetched_at) VALUES (?1, ?2, ?3) \
             ON CONFLICT(cache_key) DO UPDATE SET cache_json=excluded.cache_json, fetched_at=excluded.fetched_at",
            params![cache_key, cache_json, fetched_at],
        )?;
        Ok(())
    }

    pub fn insert_run(&self, run: &RunRecord) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO runs (id, started_at, operation, username, status, elapsed_ms, notes) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                run.id,
                run.started_at,
                run.operation,
                run.username,
                run.status,
                run.elapsed_ms,
                run.notes,
            ],
        )?;
        Ok(())
    }

    pub fn recent_runs(&self, limit: usize) -> Result<Vec<RunRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT id, started_at, operation, username, status, elapsed_ms, notes \
             FROM runs ORDER BY started_at DESC, id LIMIT ?1",
        )?;
        let runs = stmt
            .query_map([limit], |row| {
                Ok(RunRecord {
                    id: row.get(0)?,
                    started_at: row.get(1)?,
                    operation: row.get(2)?,
                    username: row.get(3)?,
                    status: row.get(4)?,
                    elapsed_ms: row.get(5)?,
                    notes: row.get(6)?,
                })
            })?
            .filter_map(|r| r.ok())
            .collect();
        Ok(runs)
    }

    pub fn set_meta(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO metadata (key, value) VALUES (?1, ?2) \
             ON CONFLICT(key) DO UPDATE SET value=excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn get_meta(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached("SELECT value FROM metadata WHERE key = ?1")?;
        let mut rows = stmt.query([key])?;
        let Some(row) = rows.next()? else {
            return Ok(None);
        };
        Ok(Some(row.get(0)?))
    }

    fn row_to_game(row: &rusqlite::Row) -> rusqlite::Result<GameRow> {
        let mut game = GameRow::default();
        for (idx, field) in game.fields_mut().into_iter().enumerate() {
            *field = row.get(idx)?;
        }
        Ok(game)
    }

    fn row_to_daily(row: &rusqlite::Row) -> rusqlite::Result<DailyAggregate> {
        let mode_day = |base: usize| -> rusqlite::Result<ModeDay> {
            Ok(ModeDay {
                games: row.get(base)?,
                wins: row.get(base + 1)?,
                losses: row.get(base + 2)?,
                draws: row.get(base + 3)?,
                rating: row.get(base + 4)?,
                rating_change: row.get(base + 5)?,
                seconds: row.get(base + 6)?,
            })
        };
        Ok(DailyAggregate {
            date: row.get(0)?,
            bullet: mode_day(1)?,
            blitz: mode_day(8)?,
            rapid: mode_day(15)?,
            total_games: row.get(22)?,
            total_wins: row.get(23)?,
            total_losses: row.get(24)?,
            total_draws: row.get(25)?,
            rating_sum: row.get(26)?,
            total_change: row.get(27)?,
            total_seconds: row.get(28)?,
            avg_seconds: row.get(29)?,
        })
    }

    fn row_to_calc(row: &rusqlite::Row) -> rusqlite::Result<CalcRow> {
        Ok(CalcRow {
            url: row.get(0)?,
            end_date_local: row.get(1)?,
            end_time_local: row.get(2)?,
            mode: row.get(3)?,
            my_color: row.get(4)?,
            opp_color: row.get(5)?,
            my_score: row.get(6)?,
            opp_score: row.get(7)?,
            my_bullet_rating: row.get(8)?,
            my_blitz_rating: row.get(9)?,
            my_rapid_rating: row.get(10)?,
            my_daily_rating: row.get(11)?,
            my_chess960_rating: row.get(12)?,
            my_daily960_rating: row.get(13)?,
            opp_bullet_rating: row.get(14)?,
            opp_blitz_rating: row.get(15)?,
            opp_rapid_rating: row.get(16)?,
            opp_daily_rating: row.get(17)?,
            opp_chess960_rating: row.get(18)?,
            opp_daily960_rating: row.get(19)?,
            rating_delta: row.get(20)?,
        })
    }
}

fn has_warning(row: &GameRow, token: &str) -> bool {
    row.warnings.split(',').any(|t| t == token)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_store() -> GameStore {
        GameStore::new(":memory:").expect("Failed to create database")
    }

    fn game(url: &str) -> GameRow {
        GameRow {
            url: url.to_string(),
            mode: "blitz".to_string(),
            my_rating: "1500".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_store_create_empty() {
        let store = test_store();
        assert!(store.is_empty());
        assert!(store.load_all().expect("load").is_empty());
    }

    #[test]
    fn test_upsert_adds_then_skips() {
        let store = test_store();
        let batch = vec![game("https://a"), game("https://b")];

        let first = store.upsert_batch(&batch).expect("first upsert");
        assert_eq!(first.added, 2);
        assert_eq!(first.duplicates_seen, 0);
        assert_eq!(store.len(), 2);

        // Re-running the identical batch changes nothing.
        let second = store.upsert_batch(&batch).expect("second upsert");
        assert_eq!(second.added, 0);
        assert_eq!(second.duplicates_seen, 2);
        assert_eq!(second.duplicates_updated, 0);
        assert_eq!(second.duplicates_skipped, 2);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_upsert_fills_only_empty_fields() {
        let store = test_store();
        let mut sparse = game("https://a");
        sparse.termination = String::new();
        sparse.my_rating = String::new();
        store.upsert_batch(&[sparse]).expect("seed");

        let mut richer = game("https://a");
        richer.termination = "Resigned".to_string();
        richer.my_rating = "1480".to_string();
        richer.mode = "rapid".to_string(); // stored "blitz" must survive

        let counters = store.upsert_batch(&[richer.clone()]).expect("fill");
        assert_eq!(counters.duplicates_seen, 1);
        assert_eq!(counters.duplicates_updated, 1);

        let stored = store.get_game("https://a").expect("get").expect("row");
        assert_eq!(stored.termination, "Resigned");
        assert_eq!(stored.my_rating, "1480");
        assert_eq!(stored.mode, "blitz");
        assert_eq!(stored.warnings, "duplicate-updated");

        // A third pass that fills another gap does not repeat the token.
        let mut third = game("https://a");
        third.eco = "C50".to_string();
        store.upsert_batch(&[third]).expect("third");
        let stored = store.get_game("https://a").expect("get").expect("row");
        assert_eq!(stored.eco, "C50");
        assert_eq!(
            stored
                .warnings
                .split(',')
                .filter(|t| *t == "duplicate-updated")
                .count(),
            1
        );
    }

    #[test]
    fn test_upsert_duplicate_within_batch() {
        let store = test_store();
        let mut a = game("https://a");
        a.termination = String::new();
        let mut b = game("https://a");
        b.termination = "Timeout".to_string();

        let counters = store.upsert_batch(&[a, b]).expect("upsert");
        assert_eq!(counters.added, 1);
        assert_eq!(counters.duplicates_seen, 1);
        assert_eq!(counters.duplicates_updated, 1);

        let stored = store.get_game("https://a").expect("get").expect("row");
        assert_eq!(stored.termination, "Timeout");
    }

    #[test]
    fn test_upsert_counts_quality_warnings() {
        let store = test_store();
        let mut a = game("https://a");
        a.add_warning("utc-missing");
        let mut b = game("https://b");
        b.add_warning("accuracy-missing");
        b.add_warning("utc-missing");

        let counters = store.upsert_batch(&[a, b]).expect("upsert");
        assert_eq!(counters.utc_missing, 2);
        assert_eq!(counters.accuracy_missing, 1);
    }

    #[test]
    fn test_cache_roundtrip() {
        let store = test_store();
        assert!(store.get_cache("k").expect("get").is_none());

        store.upsert_cache("k", "{\"a\":1}", 100).expect("put");
        let (json, fetched_at) = store.get_cache("k").expect("get").expect("hit");
        assert_eq!(json, "{\"a\":1}");
        assert_eq!(fetched_at, 100);

        store.upsert_cache("k", "{\"a\":2}", 200).expect("put");
        let (json, fetched_at) = store.get_cache("k").expect("get").expect("hit");
        assert_eq!(json, "{\"a\":2}");
        assert_eq!(fetched_at, 200);
    }

    #[test]
    fn test_daily_stats_replace_and_load() {
        let store = test_store();
        let day = DailyAggregate {
            date: "2024-01-15".to_string(),
            bullet: ModeDay {
                games: 2,
                wins: 2,
                losses: 0,
                draws: 0,
                rating: 1520,
                rating_change: 20,
                seconds: 240,
            },
            total_games: 2,
            total_wins: 2,
            rating_sum: 3020,
            total_change: 20,
            total_seconds: 240,
            avg_seconds: 120,
            ..Default::default()
        };

        store.replace_daily_stats(&[day.clone()]).expect("replace");
        let days = store.load_daily_stats().expect("load");
        assert_eq!(days, vec![day]);

        // Replacing again wipes the old contents first.
        store.replace_daily_stats(&[]).expect("replace empty");
        assert!(store.load_daily_stats().expect("load").is_empty());
    }

    #[test]
    fn test_run_log() {
        let store = test_store();
        let run = RunRecord {
            id: "run-1".to_string(),
            started_at: "2024-01-15T18:00:00Z".to_string(),
            operation: "sync".to_string(),
            username: "alice".to_string(),
            status: "ok".to_string(),
            elapsed_ms: 1234,
            notes: "3 months".to_string(),
        };
        store.insert_run(&run).expect("insert");

        let runs = store.recent_runs(10).expect("recent");
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].operation, "sync");
        assert_eq!(runs[0].elapsed_ms, 1234);
    }

    #[test]
    fn test_meta_roundtrip() {
        let store = test_store();
        assert!(store.get_meta("last_sync_at").expect("get").is_none());
        store.set_meta("last_sync_at", "2024-01-15").expect("set");
        store.set_meta("last_sync_at", "2024-01-16").expect("set");
        assert_eq!(
            store.get_meta("last_sync_at").expect("get").as_deref(),
            Some("2024-01-16")
        );
    }
}
