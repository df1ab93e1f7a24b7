//! tennis-data crate
//!
//! Record sources for the tennis analysis toolkit: historical match results,
//! prediction tables, the odds merge and the player directory.

pub mod dates;
pub mod matches;
pub mod merge;
pub mod players;
pub mod predictions;
pub mod table;
pub mod types;

pub use types::{
    Handedness, MatchOdds, MatchRecord, PlayerId, PlayerProfile, PredictionQuery, PredictionRow,
};
