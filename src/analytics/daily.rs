//! Per-day aggregates over the three real-time modes (bullet, blitz, rapid).

use std::collections::BTreeMap;

use serde::Serialize;

use crate::analytics::{end_sort_key, outcome_vs_user, parse_or_zero};
use crate::models::GameRow;
use crate::normalize::classify::Outcome;

/// One mode's bucket within a day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ModeDay {
    pub games: i64,
    pub wins: i64,
    pub losses: i64,
    pub draws: i64,
    /// Latest rating observed that day, 0 when none was observed.
    pub rating: i64,
    /// Latest minus earliest observed rating, 0 with fewer than two
    /// observations. A single-game day reads as "no change", a product
    /// decision carried over from the presentation layer this replaces.
    pub rating_change: i64,
    pub seconds: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DailyAggregate {
    /// Local calendar date of the games' end instants.
    pub date: String,
    pub bullet: ModeDay,
    pub blitz: ModeDay,
    pub rapid: ModeDay,
    pub total_games: i64,
    pub total_wins: i64,
    pub total_losses: i64,
    pub total_draws: i64,
    /// Sum of the rating field over every row that day, tracked modes or not.
    pub rating_sum: i64,
    pub total_change: i64,
    pub total_seconds: i64,
    pub avg_seconds: i64,
}

fn mode_slot(mode: &str) -> Option<usize> {
    match mode {
        "bullet" => Some(0),
        "blitz" => Some(1),
        "rapid" => Some(2),
        _ => None,
    }
}

/// Group rows by the local calendar date of their end instant and tally the
/// three real-time modes. Rows without a resolved end instant are excluded
/// entirely. Output is sorted by ascending date.
pub fn build_daily(games: &[GameRow], username: &str) -> Vec<DailyAggregate> {
    let mut by_day: BTreeMap<String, Vec<&GameRow>> = BTreeMap::new();
    for row in games {
        if row.end_date_local.is_empty() {
            continue;
        }
        by_day.entry(row.end_date_local.clone()).or_default().push(row);
    }

    let mut out = Vec::with_capacity(by_day.len());
    for (date, mut rows) in by_day {
        // Within-day order decides which rating counts as earliest/latest.
        rows.sort_by_key(|r| end_sort_key(r));

        let mut buckets = [ModeDay::default(); 3];
        let mut earliest: [Option<i64>; 3] = [None; 3];
        let mut latest: [Option<i64>; 3] = [None; 3];
        let mut observations = [0usize; 3];
        let mut rating_sum = 0i64;

        for row in &rows {
            rating_sum += parse_or_zero(&row.my_rating);

            let Some(slot) = mode_slot(&row.mode) else {
                continue;
            };
            let bucket = &mut buckets[slot];
            bucket.games += 1;
            match outcome_vs_user(&row.winner, username) {
                Outcome::Win => bucket.wins += 1,
                Outcome::Loss => bucket.losses += 1,
                Outcome::Draw => bucket.draws += 1,
            }
            bucket.seconds += parse_or_zero(&row.duration_s);

            if let Ok(rating) = row.my_rating.trim().parse::<i64>() {
                if earliest[slot].is_none() {
                    earliest[slot] = Some(rating);
                }
                latest[slot] = Some(rating);
                observations[slot] += 1;
            }
        }

        for slot in 0..3 {
            buckets[slot].rating = latest[slot].unwrap_or(0);
            buckets[slot].rating_change = if observations[slot] >= 2 {
                latest[slot].unwrap_or(0) - earliest[slot].unwrap_or(0)
            } else {
                0
            };
        }

        let total_games: i64 = buckets.iter().map(|b| b.games).sum();
        let total_seconds: i64 = buckets.iter().map(|b| b.seconds).sum();
        out.push(DailyAggregate {
            date,
            bullet: buckets[0],
            blitz: buckets[1],
            rapid: buckets[2],
            total_games,
            total_wins: buckets.iter().map(|b| b.wins).sum(),
            total_losses: buckets.iter().map(|b| b.losses).sum(),
            total_draws: buckets.iter().map(|b| b.draws).sum(),
            rating_sum,
            total_change: buckets.iter().map(|b| b.rating_change).sum(),
            total_seconds,
            avg_seconds: if total_games > 0 {
                total_seconds / total_games
            } else {
                0
            },
        });
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn game(
        mode: &str,
        rating: &str,
        winner: &str,
        end_local: &str,
        end_utc_time: &str,
        duration: &str,
    ) -> GameRow {
        GameRow {
            mode: mode.to_string(),
            my_rating: rating.to_string(),
            winner: winner.to_string(),
            end_date_local: end_local.to_string(),
            end_date_utc: end_local.to_string(),
            end_time_utc: end_utc_time.to_string(),
            duration_s: duration.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_same_day_rating_and_change() {
        let games = vec![
            game("bullet", "1500", "alice", "2024-01-15", "09:00:00", "120"),
            game("bullet", "1520", "alice", "2024-01-15", "10:00:00", "100"),
        ];

        let days = build_daily(&games, "alice");
        assert_eq!(days.len(), 1);
        let day = &days[0];
        assert_eq!(day.bullet.games, 2);
        assert_eq!(day.bullet.wins, 2);
        assert_eq!(day.bullet.rating, 1520);
        assert_eq!(day.bullet.rating_change, 20);
        assert_eq!(day.total_games, 2);
        assert_eq!(day.total_seconds, 220);
        assert_eq!(day.avg_seconds, 110);
        assert_eq!(day.rating_sum, 3020);
        assert_eq!(day.total_change, 20);
    }

    #[test]
    fn test_within_day_order_uses_end_instant_not_input_order() {
        // The 1520 game ends earlier, so 1500 is the day's latest.
        let games = vec![
            game("bullet", "1520", "alice", "2024-01-15", "10:00:00", "60"),
            game("bullet", "1500", "alice", "2024-01-15", "11:00:00", "60"),
        ];

        let days = build_daily(&games, "alice");
        assert_eq!(days[0].bullet.rating, 1500);
        assert_eq!(days[0].bullet.rating_change, -20);
    }

    #[test]
    fn test_single_observation_reads_as_no_change() {
        let games = vec![game("rapid", "1600", "bob", "2024-01-15", "09:00:00", "600")];
        let days = build_daily(&games, "alice");
        assert_eq!(days[0].rapid.rating, 1600);
        assert_eq!(days[0].rapid.rating_change, 0);
        assert_eq!(days[0].rapid.losses, 1);
    }

    #[test]
    fn test_untracked_mode_counts_toward_rating_sum_only() {
        let games = vec![
            game("bullet", "1500", "alice", "2024-01-15", "09:00:00", "120"),
            game("daily", "900", "alice", "2024-01-15", "10:00:00", "86400"),
        ];

        let days = build_daily(&games, "alice");
        let day = &days[0];
        assert_eq!(day.total_games, 1);
        assert_eq!(day.rating_sum, 2400);
        assert_eq!(day.total_seconds, 120);
    }

    #[test]
    fn test_rows_without_end_are_excluded() {
        let mut undated = game("bullet", "1500", "alice", "", "", "60");
        undated.end_date_utc = String::new();
        let games = vec![undated];
        assert!(build_daily(&games, "alice").is_empty());
    }

    #[test]
    fn test_days_sorted_ascending() {
        let games = vec![
            game("blitz", "1400", "alice", "2024-01-16", "09:00:00", "300"),
            game("blitz", "1390", "bob", "2024-01-14", "09:00:00", "300"),
        ];

        let days = build_daily(&games, "alice");
        let dates: Vec<_> = days.iter().map(|d| d.date.as_str()).collect();
        assert_eq!(dates, vec!["2024-01-14", "2024-01-16"]);
        assert_eq!(days[0].blitz.losses, 1);
        assert_eq!(days[1].blitz.wins, 1);
    }

    #[test]
    fn test_draw_counting() {
        let games = vec![
            game("blitz", "1400", "Draw", "2024-01-15", "09:00:00", "300"),
            game("blitz", "1400", "", "2024-01-15", "10:00:00", "300"),
        ];

        let days = build_daily(&games, "alice");
        assert_eq!(days[0].blitz.draws, 2);
    }
}
