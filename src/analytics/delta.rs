//! Per-game rating deltas relative to the previous game in the same mode.

use std::collections::HashMap;

use crate::analytics::end_sort_key;
use crate::models::GameRow;

/// Compute the rating change of each stored row against the last game
/// played in the same mode.
///
/// Rows are taken in storage order, which is not necessarily chronological:
/// eligible rows (mode, rating, and end instant all present) are sorted by
/// end instant with the original index as tie-breaker, scanned once, and the
/// delta is written back at the original index. The first game seen for a
/// mode gets 0; ineligible rows get None. Output length and order always
/// match the input.
pub fn rating_deltas(games: &[GameRow]) -> Vec<Option<i64>> {
    let mut deltas: Vec<Option<i64>> = vec![None; games.len()];

    let mut eligible: Vec<(String, String, i64, usize)> = Vec::new();
    for (idx, row) in games.iter().enumerate() {
        let Some(end_key) = end_sort_key(row) else {
            continue;
        };
        if row.mode.is_empty() {
            continue;
        }
        let Ok(rating) = row.my_rating.trim().parse::<i64>() else {
            continue;
        };
        eligible.push((end_key, row.mode.clone(), rating, idx));
    }

    eligible.sort_by(|a, b| a.0.cmp(&b.0).then(a.3.cmp(&b.3)));

    let mut last_seen: HashMap<String, i64> = HashMap::new();
    for (_, mode, rating, idx) in eligible {
        let delta = match last_seen.get(&mode) {
            Some(prev) => rating - prev,
            None => 0,
        };
        deltas[idx] = Some(delta);
        last_seen.insert(mode, rating);
    }

    deltas
}
