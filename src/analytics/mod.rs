//! Derived analytics over the stored game table: running per-mode ratings,
//! rating-change deltas, per-day aggregates, and the calculation view.

pub mod calc_view;
pub mod daily;
pub mod delta;
pub mod running;

use crate::models::GameRow;
use crate::normalize::classify::Outcome;

/// Win/loss/draw from the stored winner identity, compared case-insensitively
/// against the user's own username. An empty winner or a literal "draw"
/// counts as a draw; any other mismatch is a loss.
pub fn outcome_vs_user(winner: &str, username: &str) -> Outcome {
    let winner = winner.trim();
    if winner.is_empty() || winner.eq_ignore_ascii_case("draw") {
        Outcome::Draw
    } else if winner.eq_ignore_ascii_case(username) {
        Outcome::Win
    } else {
        Outcome::Loss
    }
}

/// Chronological sort key for a stored row: the UTC end instant as a
/// lexicographically ordered string, or None when the end is unresolved.
/// None sorts before Some, so undated rows stay at the front and never
/// disturb the dated sequence.
pub fn end_sort_key(row: &GameRow) -> Option<String> {
    if row.end_date_utc.is_empty() || row.end_time_utc.is_empty() {
        return None;
    }
    Some(format!("{} {}", row.end_date_utc, row.end_time_utc))
}

fn parse_or_zero(value: &str) -> i64 {
    value.trim().parse().unwrap_or(0)
}
