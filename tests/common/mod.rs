//! Shared test helpers and utilities.
//!
//! Factory functions for match records, prediction rows and small CSV
//! fixtures with sensible defaults.

#![allow(dead_code)]

use std::collections::BTreeMap;

use chrono::NaiveDate;
use tennis_analysis::WinGraph;
use tennis_data::types::{MatchRecord, PlayerId, PredictionRow};

/// Normalized player id; panics on a blank name.
pub fn player(name: &str) -> PlayerId {
    PlayerId::normalize(name).expect("test player names are never blank")
}

/// A clay Grand Slam result on 2023-05-29.
pub fn sample_record(winner: &str, loser: &str) -> MatchRecord {
    MatchRecord {
        winner: player(winner),
        loser: player(loser),
        date: NaiveDate::from_ymd_opt(2023, 5, 29).expect("valid date"),
        surface: "Clay".to_string(),
        level: "Grand Slam".to_string(),
    }
}

/// Graph from `(winner, loser)` pairs.
///
/// # Example
/// ```ignore
/// let graph = graph_from(&[("Bob", "Alice"), ("Carol", "Bob")]);
/// assert!(graph.beats("Bob", "Alice"));
/// ```
pub fn graph_from(results: &[(&str, &str)]) -> WinGraph {
    let records: Vec<MatchRecord> = results
        .iter()
        .map(|(w, l)| sample_record(w, l))
        .collect();
    WinGraph::build(&records)
}

/// Bob beat Alice, Carol beat Bob, Alice beat Carol.
pub fn triangle_graph() -> WinGraph {
    graph_from(&[("Bob", "Alice"), ("Carol", "Bob"), ("Alice", "Carol")])
}

/// Prediction row with an outcome, Pinnacle odds and the given probabilities.
pub fn sample_row(
    a: &str,
    b: &str,
    a_won: bool,
    odds: (f64, f64),
    probs: &[(&str, f64)],
) -> PredictionRow {
    PredictionRow {
        index: 0,
        a_raw: a.to_string(),
        b_raw: b.to_string(),
        a: PlayerId::normalize(a),
        b: PlayerId::normalize(b),
        a_won: Some(a_won),
        odds_a: Some(odds.0),
        odds_b: Some(odds.1),
        probabilities: probs
            .iter()
            .map(|(k, v)| (k.to_string(), *v))
            .collect::<BTreeMap<_, _>>(),
    }
}

/// Results export covering the triangle above plus an unrelated match and an
/// out-of-window hard-court result.
pub const MATCHES_CSV: &str = "\
tourney_level,Date,Surface,winner_name,loser_name,PSW,PSL
Grand Slam,29/05/2023,Clay,Bob,Alice,2.1,1.7
Grand Slam,31/05/2023,Clay,Carol,Bob,1.6,2.4
Masters 1000,2023-04-14,Clay,Alice,Carol,1.5,2.8
Masters 1000,2023-04-15,Clay,Dave,Erin,1.9,1.9
Grand Slam,2023-01-20,Hard,Erin,Alice,3.0,1.4
";

/// Predictions for some of the matches above plus one unknown pairing.
pub const PREDICTIONS_CSV: &str = "\
A,B,model_prob,welo_prob,bt_prob
Alice,Carol,0.7,0.4,0.6
Dave,Erin,0.3,0.8,0.7
Bob,Alice,0.6,0.55,0.5
Zed,Yan,0.5,0.5,0.5
";
