//! Opponent enrichment: per-mode rating summaries from the public stats
//! endpoint, cached in the store so repeated syncs within the TTL window
//! never refetch the same opponent.

use std::collections::{BTreeSet, HashMap};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::chesscom::api::ChessComClient;
use crate::chesscom::models::{ModeStats, PlayerStats};
use crate::models::GameRow;
use crate::store::GameStore;

pub const STATS_CACHE_TTL_SECS: i64 = 3600;

/// Rating per tracked mode, empty where the player has no record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpponentRatings {
    pub bullet: String,
    pub blitz: String,
    pub rapid: String,
    pub daily: String,
    pub chess960: String,
    pub daily960: String,
}

impl OpponentRatings {
    pub fn from_stats(stats: &PlayerStats) -> Self {
        let pick = |mode: &Option<ModeStats>| {
            mode.as_ref()
                .and_then(|m| m.preferred_rating())
                .map(|r| r.to_string())
                .unwrap_or_default()
        };
        Self {
            bullet: pick(&stats.chess_bullet),
            blitz: pick(&stats.chess_blitz),
            rapid: pick(&stats.chess_rapid),
            daily: pick(&stats.chess_daily),
            chess960: pick(&stats.chess960),
            daily960: pick(&stats.chess960_daily),
        }
    }
}

fn cache_key(username: &str) -> String {
    format!("opponent_stats_v1:{}", username.to_lowercase())
}

/// One opponent's ratings, served from cache while fresh. A network failure
/// degrades to empty ratings; enrichment must never sink a sync run.
pub async fn opponent_ratings(
    store: &GameStore,
    client: &mut ChessComClient,
    username: &str,
) -> OpponentRatings {
    if username.is_empty() {
        return OpponentRatings::default();
    }

    let key = cache_key(username);
    let now = Utc::now().timestamp();
    match store.get_cache(&key) {
        Ok(Some((json, fetched_at))) if now - fetched_at <= STATS_CACHE_TTL_SECS => {
            if let Ok(ratings) = serde_json::from_str(&json) {
                debug!("Opponent stats cache hit for {}", username);
                return ratings;
            }
        }
        Ok(_) => {}
        Err(e) => warn!("Opponent stats cache read failed for {}: {}", username, e),
    }

    match client.fetch_stats(&username.to_lowercase()).await {
        Ok(stats) => {
            let ratings = OpponentRatings::from_stats(&stats);
            if let Ok(json) = serde_json::to_string(&ratings) {
                if let Err(e) = store.upsert_cache(&key, &json, now) {
                    warn!("Opponent stats cache write failed for {}: {}", username, e);
                }
            }
            ratings
        }
        Err(e) => {
            warn!("Failed to fetch stats for {}: {}", username, e);
            OpponentRatings::default()
        }
    }
}

/// Cache-only lookup for offline rebuilds; stale entries are acceptable
/// there because no network is allowed at all.
pub fn cached_opponent_ratings(store: &GameStore, username: &str) -> OpponentRatings {
    if username.is_empty() {
        return OpponentRatings::default();
    }
    match store.get_cache(&cache_key(username)) {
        Ok(Some((json, _))) => serde_json::from_str(&json).unwrap_or_default(),
        _ => OpponentRatings::default(),
    }
}

fn distinct_opponents(games: &[GameRow]) -> BTreeSet<String> {
    games
        .iter()
        .filter(|g| !g.opp_username.is_empty())
        .map(|g| g.opp_username.to_lowercase())
        .collect()
}

/// Ratings for every distinct opponent in the table, keyed by lowercased
/// username. Fetch order is deterministic and paced by the client's rate
/// limiter.
pub async fn enrich_opponents(
    store: &GameStore,
    client: &mut ChessComClient,
    games: &[GameRow],
) -> HashMap<String, OpponentRatings> {
    let names = distinct_opponents(games);
    debug!("Enriching {} distinct opponents", names.len());

    let mut map = HashMap::with_capacity(names.len());
    for name in names {
        let ratings = opponent_ratings(store, client, &name).await;
        map.insert(name, ratings);
    }
    map
}

/// Cache-only counterpart of `enrich_opponents`.
pub fn cached_opponents(store: &GameStore, games: &[GameRow]) -> HashMap<String, OpponentRatings> {
    distinct_opponents(games)
        .into_iter()
        .map(|name| {
            let ratings = cached_opponent_ratings(store, &name);
            (name, ratings)
        })
        .collect()
}
