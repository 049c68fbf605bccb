//! chess.com public API: client and payload models.

pub mod api;
pub mod models;

pub use api::ChessComClient;
pub use models::{
    Accuracies, ArchivesResponse, MonthlyGames, PlayerProfile, PlayerSide, PlayerStats, RawGame,
};
