//! Running per-mode rating carry-forward.
//!
//! Six modes are tracked. Each starts at the literal "unknown" rather than
//! zero, so a mode the user never played stays visibly unrated instead of
//! looking like a rating collapse.

use crate::models::GameRow;

pub const TRACKED_MODES: [&str; 6] = [
    "bullet",
    "blitz",
    "rapid",
    "daily",
    "chess960",
    "daily960",
];

const UNKNOWN: &str = "unknown";

/// Explicit fold state for the carry-forward scan. Thread one instance
/// through a chronologically sorted pass; rows must be visited in end-time
/// order for the emitted columns to make sense.
#[derive(Debug, Clone)]
pub struct RunningRatings {
    latest: [String; 6],
}

impl Default for RunningRatings {
    fn default() -> Self {
        Self::new()
    }
}

impl RunningRatings {
    pub fn new() -> Self {
        Self {
            latest: std::array::from_fn(|_| UNKNOWN.to_string()),
        }
    }

    /// Record the rating observed for one game. Untracked modes and empty
    /// ratings leave the state untouched.
    pub fn observe(&mut self, mode: &str, rating: &str) {
        if rating.is_empty() {
            return;
        }
        if let Some(slot) = TRACKED_MODES.iter().position(|m| *m == mode) {
            self.latest[slot] = rating.to_string();
        }
    }

    /// Current carry-forward values, in `TRACKED_MODES` order.
    pub fn snapshot(&self) -> [String; 6] {
        self.latest.clone()
    }

    /// Observe the row's own mode/rating, then emit the post-update values
    /// into its six running columns. A game thus reports its own rating for
    /// the mode it was played in.
    pub fn stamp(&mut self, row: &mut GameRow) {
        self.observe(&row.mode, &row.my_rating);
        let [bullet, blitz, rapid, daily, chess960, daily960] = self.snapshot();
        row.my_bullet_rating = bullet;
        row.my_blitz_rating = blitz;
        row.my_rapid_rating = rapid;
        row.my_daily_rating = daily;
        row.my_chess960_rating = chess960;
        row.my_daily960_rating = daily960;
    }
}
