pub mod games;

pub use games::{GameStore, RunRecord, UpsertCounters};
