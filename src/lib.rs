//! chesstrack library
//!
//! Core pipeline: fetch monthly archives from the chess.com public API,
//! parse each game's annotation blob, normalize into one flat row per game,
//! upsert into SQLite with fill-only-if-empty dedup, then rebuild the
//! derived daily and per-game calculation tables.

pub mod analytics;
pub mod chesscom;
pub mod errors;
pub mod export;
pub mod models;
pub mod normalize;
pub mod opponents;
pub mod pgn;
pub mod store;
pub mod sync;
