//! Typed views over the chess.com public API payloads.
//!
//! Every field the pipeline does not strictly need is optional: the monthly
//! archive format has grown fields over the years and older months omit
//! several of them. Numeric fields occasionally arrive as strings, so the
//! rating deserializers accept either.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// `GET /player/{username}/games/archives`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchivesResponse {
    pub archives: Vec<String>,
}

/// `GET /player/{username}/games/{YYYY}/{MM}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonthlyGames {
    #[serde(default)]
    pub games: Vec<RawGame>,
}

/// One game as served by the monthly archive endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawGame {
    pub url: String,
    #[serde(default)]
    pub pgn: Option<String>,
    #[serde(default)]
    pub time_control: Option<String>,
    #[serde(default)]
    pub time_class: Option<String>,
    #[serde(default)]
    pub rules: Option<String>,
    #[serde(default)]
    pub rated: Option<bool>,
    #[serde(default)]
    pub start_time: Option<i64>,
    #[serde(default)]
    pub end_time: Option<i64>,
    #[serde(default)]
    pub fen: Option<String>,
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default)]
    pub accuracies: Option<Accuracies>,
    pub white: PlayerSide,
    pub black: PlayerSide,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Accuracies {
    #[serde(default, deserialize_with = "de_num_f64_opt")]
    pub white: Option<f64>,
    #[serde(default, deserialize_with = "de_num_f64_opt")]
    pub black: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlayerSide {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default, deserialize_with = "de_num_i64_opt")]
    pub rating: Option<i64>,
    #[serde(default)]
    pub result: Option<String>,
    #[serde(rename = "@id", default)]
    pub id_url: Option<String>,
    #[serde(default)]
    pub uuid: Option<String>,
}

/// `GET /player/{username}` (only the fields the CLI surfaces).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlayerProfile {
    #[serde(default)]
    pub player_id: Option<i64>,
    #[serde(rename = "@id", default)]
    pub id_url: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub joined: Option<i64>,
    #[serde(default)]
    pub last_online: Option<i64>,
}

/// `GET /player/{username}/stats`. The live chess960 section is absent for
/// nearly every account; it is kept for the rare payloads that carry it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlayerStats {
    #[serde(default)]
    pub chess_bullet: Option<ModeStats>,
    #[serde(default)]
    pub chess_blitz: Option<ModeStats>,
    #[serde(default)]
    pub chess_rapid: Option<ModeStats>,
    #[serde(default)]
    pub chess_daily: Option<ModeStats>,
    #[serde(default)]
    pub chess960: Option<ModeStats>,
    #[serde(default)]
    pub chess960_daily: Option<ModeStats>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModeStats {
    #[serde(default)]
    pub last: Option<RatingPoint>,
    #[serde(default)]
    pub best: Option<RatingPoint>,
    #[serde(default)]
    pub highest: Option<RatingPoint>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RatingPoint {
    #[serde(default, deserialize_with = "de_num_i64_opt")]
    pub rating: Option<i64>,
    #[serde(default)]
    pub date: Option<i64>,
}

impl ModeStats {
    /// Rating preference order: last, then best, then highest.
    pub fn preferred_rating(&self) -> Option<i64> {
        self.last
            .as_ref()
            .and_then(|p| p.rating)
            .or_else(|| self.best.as_ref().and_then(|p| p.rating))
            .or_else(|| self.highest.as_ref().and_then(|p| p.rating))
    }
}

fn de_num_i64_opt<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Value::deserialize(deserializer)?;
    match v {
        Value::Null => Ok(None),
        Value::Number(n) => Ok(n.as_i64().or_else(|| n.as_f64().map(|f| f as i64))),
        Value::String(s) => {
            if s.is_empty() {
                Ok(None)
            } else {
                s.parse::<i64>().map(Some).map_err(serde::de::Error::custom)
            }
        }
        _ => Ok(None),
    }
}

fn de_num_f64_opt<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Value::deserialize(deserializer)?;
    match v {
        Value::Null => Ok(None),
        Value::Number(n) => Ok(n.as_f64()),
        Value::String(s) => {
            if s.is_empty() {
                Ok(None)
            } else {
                s.parse::<f64>().map(Some).map_err(serde::de::Error::custom)
            }
        }
        _ => Ok(None),
    }
}
