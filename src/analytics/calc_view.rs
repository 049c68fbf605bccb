//! Calculation view: one presentation row per stored game, regenerated
//! wholesale on every run.
//!
//! The view re-derives mode and running ratings from raw fields instead of
//! trusting the stored columns, through the same classifier the normalizer
//! uses, so the two can never disagree.

use std::collections::HashMap;

use serde::Serialize;

use crate::analytics::delta::rating_deltas;
use crate::analytics::running::RunningRatings;
use crate::analytics::{end_sort_key, outcome_vs_user};
use crate::models::GameRow;
use crate::normalize::classify::{classify_mode_and_variant, Outcome};
use crate::opponents::OpponentRatings;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CalcRow {
    pub url: String,
    pub end_date_local: String,
    pub end_time_local: String,
    pub mode: String,
    pub my_color: String,
    pub opp_color: String,
    pub my_score: String,
    pub opp_score: String,
    pub my_bullet_rating: String,
    pub my_blitz_rating: String,
    pub my_rapid_rating: String,
    pub my_daily_rating: String,
    pub my_chess960_rating: String,
    pub my_daily960_rating: String,
    pub opp_bullet_rating: String,
    pub opp_blitz_rating: String,
    pub opp_rapid_rating: String,
    pub opp_daily_rating: String,
    pub opp_chess960_rating: String,
    pub opp_daily960_rating: String,
    pub rating_delta: String,
}

/// Build the view over all stored rows. `opponents` maps lowercased opponent
/// usernames to their current per-mode ratings; absent opponents get empty
/// rating columns.
pub fn build_calc_view(
    games: &[GameRow],
    username: &str,
    opponents: &HashMap<String, OpponentRatings>,
) -> Vec<CalcRow> {
    let deltas = rating_deltas(games);

    let mut order: Vec<usize> = (0..games.len()).collect();
    order.sort_by_key(|&idx| end_sort_key(&games[idx]));

    let mut running = RunningRatings::new();
    let mut out = Vec::with_capacity(games.len());
    for &idx in &order {
        let row = &games[idx];
        let (mode, _) = classify_mode_and_variant(&row.rules, &row.time_class);
        running.observe(&mode, &row.my_rating);
        let [bullet, blitz, rapid, daily, chess960, daily960] = running.snapshot();

        let opp = opponents
            .get(&row.opp_username.to_lowercase())
            .cloned()
            .unwrap_or_default();
        let (my_score, opp_score) = scores(row, username);

        out.push(CalcRow {
            url: row.url.clone(),
            end_date_local: row.end_date_local.clone(),
            end_time_local: row.end_time_local.clone(),
            mode,
            my_color: row.my_color.clone(),
            opp_color: opposite_color(&row.my_color),
            my_score,
            opp_score,
            my_bullet_rating: bullet,
            my_blitz_rating: blitz,
            my_rapid_rating: rapid,
            my_daily_rating: daily,
            my_chess960_rating: chess960,
            my_daily960_rating: daily960,
            opp_bullet_rating: opp.bullet,
            opp_blitz_rating: opp.blitz,
            opp_rapid_rating: opp.rapid,
            opp_daily_rating: opp.daily,
            opp_chess960_rating: opp.chess960,
            opp_daily960_rating: opp.daily960,
            rating_delta: deltas[idx].map(|d| d.to_string()).unwrap_or_default(),
        });
    }

    out
}

/// 1 / 0.5 / 0 point split. Rows with no resolved perspective carry empty
/// scores rather than a fabricated draw.
fn scores(row: &GameRow, username: &str) -> (String, String) {
    if row.my_color.is_empty() {
        return (String::new(), String::new());
    }
    match outcome_vs_user(&row.winner, username) {
        Outcome::Win => ("1".to_string(), "0".to_string()),
        Outcome::Loss => ("0".to_string(), "1".to_string()),
        Outcome::Draw => ("0.5".to_string(), "0.5".to_string()),
    }
}

fn opposite_color(color: &str) -> String {
    match color {
        "white" => "black".to_string(),
        "black" => "white".to_string(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn game(
        url: &str,
        rules: &str,
        time_class: &str,
        rating: &str,
        winner: &str,
        end_time_utc: &str,
    ) -> GameRow {
        GameRow {
            url: url.to_string(),
            rules: rules.to_string(),
            time_class: time_class.to_string(),
            mode: classify_mode_and_variant(rules, time_class).0,
            my_rating: rating.to_string(),
            my_color: "white".to_string(),
            opp_username: "Bob".to_string(),
            winner: winner.to_string(),
            end_date_utc: "2024-01-15".to_string(),
            end_time_utc: end_time_utc.to_string(),
            end_date_local: "2024-01-15".to_string(),
            end_time_local: end_time_utc.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_view_recomputes_running_ratings_in_end_order() {
        // Storage order is reversed relative to end time.
        let games = vec![
            game("https://c", "chess", "bullet", "1550", "alice", "11:00:00"),
            game("https://b", "chess", "rapid", "1600", "alice", "10:00:00"),
            game("https://a", "chess", "bullet", "1500", "alice", "09:00:00"),
        ];

        let rows = build_calc_view(&games, "alice", &HashMap::new());
        let urls: Vec<_> = rows.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(urls, vec!["https://a", "https://b", "https://c"]);

        let bullet: Vec<_> = rows.iter().map(|r| r.my_bullet_rating.as_str()).collect();
        let rapid: Vec<_> = rows.iter().map(|r| r.my_rapid_rating.as_str()).collect();
        assert_eq!(bullet, vec!["1500", "1500", "1550"]);
        assert_eq!(rapid, vec!["unknown", "1600", "1600"]);
    }

    #[test]
    fn test_view_scores_and_colors() {
        let mut loss = game("https://a", "chess", "blitz", "1400", "Bob", "09:00:00");
        loss.my_color = "black".to_string();
        let draw = game("https://b", "chess", "blitz", "1400", "Draw", "10:00:00");

        let rows = build_calc_view(&[loss, draw], "alice", &HashMap::new());
        assert_eq!(rows[0].my_score, "0");
        assert_eq!(rows[0].opp_score, "1");
        assert_eq!(rows[0].opp_color, "white");
        assert_eq!(rows[1].my_score, "0.5");
        assert_eq!(rows[1].opp_score, "0.5");
    }

    #[test]
    fn test_view_delta_column() {
        let games = vec![
            game("https://a", "chess", "bullet", "1500", "alice", "09:00:00"),
            game("https://b", "chess", "bullet", "1520", "alice", "10:00:00"),
        ];

        let rows = build_calc_view(&games, "alice", &HashMap::new());
        assert_eq!(rows[0].rating_delta, "0");
        assert_eq!(rows[1].rating_delta, "20");
    }

    #[test]
    fn test_view_opponent_ratings_lookup() {
        let games = vec![game("https://a", "chess", "bullet", "1500", "alice", "09:00:00")];
        let mut opponents = HashMap::new();
        opponents.insert(
            "bob".to_string(),
            OpponentRatings {
                bullet: "1480".to_string(),
                blitz: "1300".to_string(),
                ..Default::default()
            },
        );

        let rows = build_calc_view(&games, "alice", &opponents);
        assert_eq!(rows[0].opp_bullet_rating, "1480");
        assert_eq!(rows[0].opp_blitz_rating, "1300");
        assert_eq!(rows[0].opp_rapid_rating, "");
    }

    #[test]
    fn test_view_unknown_perspective_has_empty_scores() {
        let mut row = game("https://a", "chess", "bullet", "", "someone", "09:00:00");
        row.my_color = String::new();

        let rows = build_calc_view(&[row], "alice", &HashMap::new());
        assert_eq!(rows[0].my_score, "");
        assert_eq!(rows[0].opp_score, "");
        assert_eq!(rows[0].opp_color, "");
    }
}
