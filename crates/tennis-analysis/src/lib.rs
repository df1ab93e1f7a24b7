//! tennis-analysis crate
//!
//! Analytics over tennis results and predictions: the historical win graph
//! and its intransitive-loop query, scenario reporting, probability-source
//! metrics, Shin de-vig, win-graph clusters and player-feature summaries.

pub mod clusters;
pub mod devig;
pub mod features;
pub mod metrics;
pub mod misses;
pub mod scenarios;
pub mod stats;
pub mod win_graph;

pub use win_graph::{LoopEvidence, LoopWitness, WinGraph};
