//! Core domain types: runtime configuration and the canonical game row.

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::errors::ChessTrackError;

/// Column names of the persisted games table, in canonical order.
///
/// This array is the single source of truth for the table layout: the schema
/// DDL, the insert/update statements, the row converters and the CSV export
/// header are all generated from it.
pub const COLUMNS: [&str; 49] = [
    "url",
    "time_control",
    "base_time_s",
    "increment_s",
    "start_date_utc",
    "start_time_utc",
    "end_date_utc",
    "end_time_utc",
    "start_date_local",
    "start_time_local",
    "end_date_local",
    "end_time_local",
    "duration_s",
    "timezone",
    "tz_offset_hours",
    "my_color",
    "my_username",
    "my_player_id",
    "my_uuid",
    "my_rating",
    "my_accuracy",
    "opp_username",
    "opp_player_id",
    "opp_uuid",
    "opp_rating",
    "opp_accuracy",
    "result_raw",
    "termination",
    "winner",
    "rules",
    "time_class",
    "mode",
    "variant",
    "format",
    "eco",
    "eco_url",
    "opening_slug",
    "opening_name",
    "opening_family",
    "moves_san",
    "moves_clock",
    "move_pairs",
    "my_bullet_rating",
    "my_blitz_rating",
    "my_rapid_rating",
    "my_daily_rating",
    "my_chess960_rating",
    "my_daily960_rating",
    "warnings",
];

/// One game, flattened. Every field is stored as TEXT; the empty string
/// means "absent". `url` is the dedup key and is never empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GameRow {
    pub url: String,
    pub time_control: String,
    pub base_time_s: String,
    pub increment_s: String,
    pub start_date_utc: String,
    pub start_time_utc: String,
    pub end_date_utc: String,
    pub end_time_utc: String,
    pub start_date_local: String,
    pub start_time_local: String,
    pub end_date_local: String,
    pub end_time_local: String,
    pub duration_s: String,
    pub timezone: String,
    pub tz_offset_hours: String,
    pub my_color: String,
    pub my_username: String,
    pub my_player_id: String,
    pub my_uuid: String,
    pub my_rating: String,
    pub my_accuracy: String,
    pub opp_username: String,
    pub opp_player_id: String,
    pub opp_uuid: String,
    pub opp_rating: String,
    pub opp_accuracy: String,
    pub result_raw: String,
    pub termination: String,
    pub winner: String,
    pub rules: String,
    pub time_class: String,
    pub mode: String,
    pub variant: String,
    pub format: String,
    pub eco: String,
    pub eco_url: String,
    pub opening_slug: String,
    pub opening_name: String,
    pub opening_family: String,
    pub moves_san: String,
    pub moves_clock: String,
    pub move_pairs: String,
    pub my_bullet_rating: String,
    pub my_blitz_rating: String,
    pub my_rapid_rating: String,
    pub my_daily_rating: String,
    pub my_chess960_rating: String,
    pub my_daily960_rating: String,
    pub warnings: String,
}

impl GameRow {
    /// All fields by reference, positionally aligned with [`COLUMNS`].
    pub fn fields(&self) -> [&String; 49] {
        [
            &self.url,
            &self.time_control,
            &self.base_time_s,
            &self.increment_s,
            &self.start_date_utc,
            &self.start_time_utc,
            &self.end_date_utc,
            &self.end_time_utc,
            &self.start_date_local,
            &self.start_time_local,
            &self.end_date_local,
            &self.end_time_local,
            &self.duration_s,
            &self.timezone,
            &self.tz_offset_hours,
            &self.my_color,
            &self.my_username,
            &self.my_player_id,
            &self.my_uuid,
            &self.my_rating,
            &self.my_accuracy,
            &self.opp_username,
            &self.opp_player_id,
            &self.opp_uuid,
            &self.opp_rating,
            &self.opp_accuracy,
            &self.result_raw,
            &self.termination,
            &self.winner,
            &self.rules,
            &self.time_class,
            &self.mode,
            &self.variant,
            &self.format,
            &self.eco,
            &self.eco_url,
            &self.opening_slug,
            &self.opening_name,
            &self.opening_family,
            &self.moves_san,
            &self.moves_clock,
            &self.move_pairs,
            &self.my_bullet_rating,
            &self.my_blitz_rating,
            &self.my_rapid_rating,
            &self.my_daily_rating,
            &self.my_chess960_rating,
            &self.my_daily960_rating,
            &self.warnings,
        ]
    }

    /// All fields by mutable reference, positionally aligned with [`COLUMNS`].
    pub fn fields_mut(&mut self) -> [&mut String; 49] {
        [
            &mut self.url,
            &mut self.time_control,
            &mut self.base_time_s,
            &mut self.increment_s,
            &mut self.start_date_utc,
            &mut self.start_time_utc,
            &mut self.end_date_utc,
            &mut self.end_time_utc,
            &mut self.start_date_local,
            &mut self.start_time_local,
            &mut self.end_date_local,
            &mut self.end_time_local,
            &mut self.duration_s,
            &mut self.timezone,
            &mut self.tz_offset_hours,
            &mut self.my_color,
            &mut self.my_username,
            &mut self.my_player_id,
            &mut self.my_uuid,
            &mut self.my_rating,
            &mut self.my_accuracy,
            &mut self.opp_username,
            &mut self.opp_player_id,
            &mut self.opp_uuid,
            &mut self.opp_rating,
            &mut self.opp_accuracy,
            &mut self.result_raw,
            &mut self.termination,
            &mut self.winner,
            &mut self.rules,
            &mut self.time_class,
            &mut self.mode,
            &mut self.variant,
            &mut self.format,
            &mut self.eco,
            &mut self.eco_url,
            &mut self.opening_slug,
            &mut self.opening_name,
            &mut self.opening_family,
            &mut self.moves_san,
            &mut self.moves_clock,
            &mut self.move_pairs,
            &mut self.my_bullet_rating,
            &mut self.my_blitz_rating,
            &mut self.my_rapid_rating,
            &mut self.my_daily_rating,
            &mut self.my_chess960_rating,
            &mut self.my_daily960_rating,
            &mut self.warnings,
        ]
    }

    /// Owned values in [`COLUMNS`] order.
    pub fn to_values(&self) -> Vec<String> {
        self.fields().iter().map(|s| (*s).clone()).collect()
    }

    /// Copy every non-empty incoming value into a still-empty field.
    /// Returns the number of fields filled. Non-empty existing values are
    /// never overwritten.
    pub fn fill_from(&mut self, incoming: &GameRow) -> usize {
        let inc = incoming.to_values();
        let mut filled = 0;
        for (dst, src) in self.fields_mut().into_iter().zip(inc) {
            if dst.is_empty() && !src.is_empty() {
                *dst = src;
                filled += 1;
            }
        }
        filled
    }

    /// Append a warning token unless it is already present.
    pub fn add_warning(&mut self, token: &str) {
        if self.warnings.split(',').any(|t| t == token) {
            return;
        }
        if self.warnings.is_empty() {
            self.warnings = token.to_string();
        } else {
            self.warnings = format!("{},{}", self.warnings, token);
        }
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub username: String,
    pub api_base: String,
    pub database_path: String,
    pub display_timezone: Tz,
    pub fetch_delay_ms: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, ChessTrackError> {
        dotenv::dotenv().ok();

        let username = std::env::var("CHESSCOM_USERNAME")
            .ok()
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty())
            .ok_or_else(|| {
                ChessTrackError::Config("CHESSCOM_USERNAME is not set".to_string())
            })?;

        let api_base = std::env::var("CHESSCOM_API_BASE")
            .unwrap_or_else(|_| "https://api.chess.com/pub".to_string())
            .trim_end_matches('/')
            .to_string();

        let database_path = std::env::var("DATABASE_PATH")
            .unwrap_or_else(|_| "./chesstrack.db".to_string());

        let tz_name =
            std::env::var("DISPLAY_TIMEZONE").unwrap_or_else(|_| "UTC".to_string());
        let display_timezone: Tz = tz_name.parse().map_err(|_| {
            ChessTrackError::Config(format!("unknown DISPLAY_TIMEZONE '{}'", tz_name))
        })?;

        let fetch_delay_ms = std::env::var("FETCH_DELAY_MS")
            .unwrap_or_else(|_| "300".to_string())
            .parse()
            .unwrap_or(300);

        Ok(Self {
            username,
            api_base,
            database_path,
            display_timezone,
            fetch_delay_ms,
        })
    }
}
