//! Raw game -> canonical row normalization.
//!
//! The normalizer never fails: missing or malformed inputs produce empty
//! fields plus warning tokens, so one bad game cannot poison a batch.

pub mod classify;
pub mod timeres;

use chrono_tz::Tz;

use crate::chesscom::models::{PlayerSide, RawGame};
use crate::models::GameRow;
use crate::pgn;
use classify::{
    classify_mode_and_variant, parse_termination_tag, result_outcome, termination_display,
    Outcome, ParsedTermination,
};

pub struct Normalizer {
    username: String,
    display_tz: Tz,
}

impl Normalizer {
    pub fn new(username: &str, display_tz: Tz) -> Self {
        Self {
            username: username.to_string(),
            display_tz,
        }
    }

    /// Flatten one raw game into the canonical row. The six running-rating
    /// columns are left empty here; the sync pipeline fills them while
    /// folding over the chronologically ordered batch.
    pub fn normalize(&self, raw: &RawGame) -> GameRow {
        let mut row = GameRow::default();
        row.url = raw.url.clone();

        let parsed = pgn::parse(raw.pgn.as_deref().unwrap_or(""));
        let rules = raw.rules.clone().unwrap_or_default();
        let time_class = raw.time_class.clone().unwrap_or_default();

        // Timing
        let times =
            timeres::resolve_game_times(&parsed.tags, &time_class, raw.start_time, raw.end_time);
        if let Some(start) = times.start_utc {
            let (date, time) = timeres::utc_split(start);
            row.start_date_utc = date;
            row.start_time_utc = time;
            let (date, time) = timeres::local_split(start, self.display_tz);
            row.start_date_local = date;
            row.start_time_local = time;
        }
        if let Some(end) = times.end_utc {
            let (date, time) = timeres::utc_split(end);
            row.end_date_utc = date;
            row.end_time_utc = time;
            let (date, time) = timeres::local_split(end, self.display_tz);
            row.end_date_local = date;
            row.end_time_local = time;
        }
        if let Some(duration) = times.duration_s {
            row.duration_s = duration.to_string();
        }
        row.timezone = self.display_tz.name().to_string();
        if let Some(instant) = times.end_utc.or(times.start_utc) {
            row.tz_offset_hours =
                timeres::offset_hours(instant, self.display_tz).to_string();
        }

        row.time_control = raw.time_control.clone().unwrap_or_default();
        let (base, increment) = parse_time_control(&row.time_control);
        if let Some(base) = base {
            row.base_time_s = base.to_string();
        }
        if let Some(increment) = increment {
            row.increment_s = increment.to_string();
        }

        // Perspective
        let accuracies = raw.accuracies.clone().unwrap_or_default();
        let perspective = self.pick_side(raw).map(|(mine, theirs, color)| {
            let (my_acc, opp_acc) = if color == "white" {
                (accuracies.white, accuracies.black)
            } else {
                (accuracies.black, accuracies.white)
            };
            (mine, theirs, color, my_acc, opp_acc)
        });

        let mut opp_result_code = String::new();
        let mut opp_identity = String::new();
        if let Some((mine, theirs, color, my_acc, opp_acc)) = perspective {
            row.my_color = color.to_string();
            row.my_username = mine.username.clone().unwrap_or_default();
            row.my_player_id = mine.id_url.clone().unwrap_or_default();
            row.my_uuid = mine.uuid.clone().unwrap_or_default();
            row.my_rating = mine.rating.map(|r| r.to_string()).unwrap_or_default();
            row.my_accuracy = my_acc.map(|a| a.to_string()).unwrap_or_default();

            row.opp_username = theirs.username.clone().unwrap_or_default();
            row.opp_player_id = theirs.id_url.clone().unwrap_or_default();
            row.opp_uuid = theirs.uuid.clone().unwrap_or_default();
            row.opp_rating = theirs.rating.map(|r| r.to_string()).unwrap_or_default();
            row.opp_accuracy = opp_acc.map(|a| a.to_string()).unwrap_or_default();

            row.result_raw = mine.result.clone().unwrap_or_default();
            opp_result_code = theirs.result.clone().unwrap_or_default();
            opp_identity = if row.opp_username.is_empty() {
                capitalize_color(opposite(color))
            } else {
                row.opp_username.clone()
            };
        }

        let outcome = result_outcome(&row.result_raw);

        // Termination & winner
        let termination_tag = parsed.tags.get("Termination").cloned().unwrap_or_default();
        let parsed_term = if termination_tag.is_empty() {
            ParsedTermination::default()
        } else {
            parse_termination_tag(&termination_tag)
        };

        let cause = if !parsed_term.cause.is_empty() {
            parsed_term.cause.clone()
        } else {
            match outcome {
                Some(Outcome::Win) => opp_result_code,
                Some(Outcome::Draw) | Some(Outcome::Loss) => row.result_raw.clone(),
                None => String::new(),
            }
        };
        row.termination = termination_display(&cause, &termination_tag);

        row.winner = match parsed_term.winner {
            Some(w) if !w.is_empty() => w,
            _ => match outcome {
                Some(Outcome::Win) => {
                    if row.my_username.is_empty() {
                        capitalize_color(&row.my_color)
                    } else {
                        row.my_username.clone()
                    }
                }
                Some(Outcome::Loss) => opp_identity,
                Some(Outcome::Draw) => "Draw".to_string(),
                None => String::new(),
            },
        };

        // Classification
        let (mode, variant) = classify_mode_and_variant(&rules, &time_class);
        row.rules = rules;
        row.time_class = time_class;
        row.mode = mode;
        row.variant = variant;
        row.format = derive_format(&raw.url, &row.time_class);

        // Opening (slug only; classification fields are filled externally)
        row.eco = parsed.tags.get("ECO").cloned().unwrap_or_default();
        row.eco_url = parsed.tags.get("ECOUrl").cloned().unwrap_or_default();
        row.opening_slug = row
            .eco_url
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .filter(|s| !s.is_empty() && !s.starts_with("http"))
            .unwrap_or("")
            .to_string();

        // Moves
        row.moves_san = parsed.moves_san.join(",");
        row.moves_clock = if parsed.moves_clock.iter().all(|c| c.is_empty()) {
            String::new()
        } else {
            parsed.moves_clock.join(",")
        };
        row.move_pairs = parsed.move_pairs.to_string();

        // Data-quality warnings
        let tag_elo = |key: &str| -> Option<i64> {
            parsed.tags.get(key).and_then(|v| v.trim().parse().ok())
        };
        if elo_mismatch(tag_elo("WhiteElo"), raw.white.rating)
            || elo_mismatch(tag_elo("BlackElo"), raw.black.rating)
        {
            row.add_warning("rating-mismatch");
        }
        if times.start_utc.is_none() || times.end_utc.is_none() {
            row.add_warning("utc-missing");
        }
        if raw.end_time.is_none() {
            row.add_warning("time-missing");
        }
        if accuracies.white.is_none() && accuracies.black.is_none() {
            row.add_warning("accuracy-missing");
        }

        row
    }

    fn pick_side<'a>(&self, raw: &'a RawGame) -> Option<(&'a PlayerSide, &'a PlayerSide, &'static str)> {
        let matches = |side: &PlayerSide| {
            side.username
                .as_deref()
                .map(|u| u.eq_ignore_ascii_case(&self.username))
                .unwrap_or(false)
        };
        if matches(&raw.white) {
            Some((&raw.white, &raw.black, "white"))
        } else if matches(&raw.black) {
            Some((&raw.black, &raw.white, "black"))
        } else {
            None
        }
    }
}

/// `"600"` -> (600, 0), `"600+5"` -> (600, 5), daily `"1/86400"` -> (86400, 0).
fn parse_time_control(tc: &str) -> (Option<i64>, Option<i64>) {
    let tc = tc.trim();
    if tc.is_empty() {
        return (None, None);
    }
    if let Some((_, per_move)) = tc.split_once('/') {
        let base: Option<i64> = per_move.trim().parse().ok();
        let increment = base.map(|_| 0);
        return (base, increment);
    }
    if let Some((base, increment)) = tc.split_once('+') {
        return (base.trim().parse().ok(), increment.trim().parse().ok());
    }
    let base: Option<i64> = tc.parse().ok();
    let increment = base.map(|_| 0);
    (base, increment)
}

fn derive_format(url: &str, time_class: &str) -> String {
    if url.contains("/game/live/") {
        "live".to_string()
    } else if url.contains("/game/daily/") {
        "daily".to_string()
    } else if time_class.eq_ignore_ascii_case("daily") {
        "daily".to_string()
    } else if !time_class.is_empty() {
        "live".to_string()
    } else {
        String::new()
    }
}

fn elo_mismatch(tag: Option<i64>, json: Option<i64>) -> bool {
    matches!((tag, json), (Some(a), Some(b)) if a != b)
}

fn opposite(color: &str) -> &'static str {
    if color == "white" {
        "black"
    } else {
        "white"
    }
}

fn capitalize_color(color: &str) -> String {
    match color {
        "white" => "White".to_string(),
        "black" => "Black".to_string(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chesscom::models::{Accuracies, PlayerSide, RawGame};

    fn side(username: &str, rating: i64, result: &str) -> PlayerSide {
        PlayerSide {
            username: Some(username.to_string()),
            rating: Some(rating),
            result: Some(result.to_string()),
            id_url: Some(format!("https://api.chess.com/pub/player/{}", username)),
            uuid: Some(format!("{}-uuid", username)),
        }
    }

    fn raw_game(pgn: &str) -> RawGame {
        RawGame {
            url: "https://www.chess.com/game/live/421".to_string(),
            pgn: Some(pgn.to_string()),
            time_control: Some("180+2".to_string()),
            time_class: Some("blitz".to_string()),
            rules: Some("chess".to_string()),
            rated: Some(true),
            start_time: None,
            end_time: Some(1_705_341_000),
            fen: None,
            uuid: Some("game-uuid".to_string()),
            accuracies: Some(Accuracies {
                white: Some(91.2),
                black: Some(84.0),
            }),
            white: side("Alice", 1500, "win"),
            black: side("bob", 1490, "checkmated"),
        }
    }

    const WIN_PGN: &str = concat!(
        "[Event \"Live Chess\"]\n",
        "[White \"Alice\"]\n",
        "[Black \"bob\"]\n",
        "[WhiteElo \"1500\"]\n",
        "[BlackElo \"1490\"]\n",
        "[UTCDate \"2024.01.15\"]\n",
        "[UTCTime \"18:00:00\"]\n",
        "[EndDate \"2024.01.15\"]\n",
        "[EndTime \"18:03:30\"]\n",
        "[Timezone \"UTC\"]\n",
        "[Termination \"Alice won by checkmate\"]\n",
        "[ECO \"C50\"]\n",
        "[ECOUrl \"https://www.chess.com/openings/Italian-Game\"]\n",
        "\n",
        "1. e4 {[%clk 0:02:59]} 1... e5 {[%clk 0:02:58]} 2. Nf3 {[%clk 0:02:57]} 1-0\n",
    );

    #[test]
    fn test_normalize_white_win() {
        let normalizer = Normalizer::new("alice", chrono_tz::UTC);
        let row = normalizer.normalize(&raw_game(WIN_PGN));

        assert_eq!(row.my_color, "white");
        assert_eq!(row.my_username, "Alice");
        assert_eq!(row.my_rating, "1500");
        assert_eq!(row.opp_username, "bob");
        assert_eq!(row.opp_rating, "1490");
        assert_eq!(row.result_raw, "win");
        assert_eq!(row.winner, "Alice");
        assert_eq!(row.termination, "Checkmate");
        assert_eq!(row.mode, "blitz");
        assert_eq!(row.variant, "standard");
        assert_eq!(row.format, "live");
        assert_eq!(row.base_time_s, "180");
        assert_eq!(row.increment_s, "2");
        assert_eq!(row.start_date_utc, "2024-01-15");
        assert_eq!(row.end_time_utc, "18:03:30");
        assert_eq!(row.end_date_local, "2024-01-15");
        assert_eq!(row.duration_s, "210");
        assert_eq!(row.tz_offset_hours, "0");
        assert_eq!(row.eco, "C50");
        assert_eq!(row.opening_slug, "Italian-Game");
        assert_eq!(row.moves_san, "e4,e5,Nf3");
        assert_eq!(row.move_pairs, "2");
        assert_eq!(row.warnings, "");
    }

    #[test]
    fn test_normalize_black_loss_perspective() {
        let normalizer = Normalizer::new("BOB", chrono_tz::UTC);
        let row = normalizer.normalize(&raw_game(WIN_PGN));

        assert_eq!(row.my_color, "black");
        assert_eq!(row.my_username, "bob");
        assert_eq!(row.my_rating, "1490");
        assert_eq!(row.my_accuracy, "84");
        assert_eq!(row.opp_username, "Alice");
        assert_eq!(row.result_raw, "checkmated");
        // Tag winner takes precedence and names the opponent.
        assert_eq!(row.winner, "Alice");
    }

    #[test]
    fn test_normalize_unknown_perspective_keeps_color_fields_empty() {
        let normalizer = Normalizer::new("someone-else", chrono_tz::UTC);
        let row = normalizer.normalize(&raw_game(WIN_PGN));

        assert_eq!(row.my_color, "");
        assert_eq!(row.my_username, "");
        assert_eq!(row.my_rating, "");
        assert_eq!(row.opp_username, "");
        assert_eq!(row.result_raw, "");
        // The tag still names the winner.
        assert_eq!(row.winner, "Alice");
        assert_eq!(row.mode, "blitz");
    }

    #[test]
    fn test_normalize_draw_without_termination_tag() {
        let mut raw = raw_game("1. e4 e5");
        raw.white = side("Alice", 1500, "repetition");
        raw.black = side("bob", 1490, "repetition");

        let normalizer = Normalizer::new("alice", chrono_tz::UTC);
        let row = normalizer.normalize(&raw);

        assert_eq!(row.winner, "Draw");
        assert_eq!(row.termination, "Draw by repetition");
    }

    #[test]
    fn test_normalize_win_without_tag_uses_loser_cause() {
        let mut raw = raw_game("1. e4 e5");
        raw.white = side("Alice", 1500, "win");
        raw.black = side("bob", 1490, "resigned");

        let normalizer = Normalizer::new("alice", chrono_tz::UTC);
        let row = normalizer.normalize(&raw);

        assert_eq!(row.winner, "Alice");
        assert_eq!(row.termination, "Resigned");
    }

    #[test]
    fn test_normalize_warning_tokens() {
        let mut raw = raw_game("1. e4 e5");
        raw.accuracies = None;
        raw.end_time = None;

        let normalizer = Normalizer::new("alice", chrono_tz::UTC);
        let row = normalizer.normalize(&raw);

        assert_eq!(row.warnings, "utc-missing,time-missing,accuracy-missing");
        assert_eq!(row.end_date_utc, "");
        assert_eq!(row.duration_s, "");
    }

    #[test]
    fn test_normalize_rating_mismatch_warning() {
        let pgn = concat!(
            "[WhiteElo \"1400\"]\n",
            "[BlackElo \"1490\"]\n",
            "\n",
            "1. e4 e5\n",
        );
        let normalizer = Normalizer::new("alice", chrono_tz::UTC);
        let row = normalizer.normalize(&raw_game(pgn));

        assert!(row.warnings.split(',').any(|t| t == "rating-mismatch"));
    }

    #[test]
    fn test_parse_time_control_shapes() {
        assert_eq!(parse_time_control("600"), (Some(600), Some(0)));
        assert_eq!(parse_time_control("600+5"), (Some(600), Some(5)));
        assert_eq!(parse_time_control("1/86400"), (Some(86400), Some(0)));
        assert_eq!(parse_time_control(""), (None, None));
        assert_eq!(parse_time_control("weird"), (None, None));
    }

    #[test]
    fn test_derive_format() {
        assert_eq!(derive_format("https://www.chess.com/game/live/1", "blitz"), "live");
        assert_eq!(derive_format("https://www.chess.com/game/daily/2", "daily"), "daily");
        assert_eq!(derive_format("https://example.com/42", "daily"), "daily");
        assert_eq!(derive_format("https://example.com/42", "rapid"), "live");
        assert_eq!(derive_format("https://example.com/42", ""), "");
    }
}
