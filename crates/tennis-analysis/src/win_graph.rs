//! Historical "beats" graph and the 2-hop intransitive-loop query.
//!
//! An edge `W -> L` means W beat L at least once inside the analysis window.
//! Multiplicity is collapsed, so the graph is simple. It is built once per run
//! and only read afterwards, which makes it safe to query from many threads.
//!
//! ## Loop query
//!
//! For a realized outcome "W beat L", a witness is any player C with
//! `L -> C` and `C -> W`. If results were a strict ranking, L beating C and C
//! beating W would put L above W, contradicting the observed result. The scan
//! only touches L's out-set, so a query costs O(out-degree(L)).

use std::collections::{HashMap, HashSet};
use std::fmt;

use rayon::prelude::*;
use serde::Serialize;
use tennis_data::types::{MatchRecord, PlayerId, PredictionQuery};
use tracing::{debug, info};

/// One 2-hop intransitivity witness: `loser > intermediate > winner`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct LoopWitness {
    /// Loser of the queried match.
    pub loser: PlayerId,
    /// Player the loser beat and who beat the winner.
    pub intermediate: PlayerId,
    /// Winner of the queried match.
    pub winner: PlayerId,
}

impl fmt::Display for LoopWitness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} > {} > {}", self.loser, self.intermediate, self.winner)
    }
}

/// Result of a loop query around one realized outcome.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct LoopEvidence {
    /// True when at least one witness exists.
    pub involved: bool,
    /// Witnesses ordered by intermediate player name.
    pub cycles: Vec<LoopWitness>,
}

impl LoopEvidence {
    fn from_cycles(cycles: Vec<LoopWitness>) -> Self {
        Self {
            involved: !cycles.is_empty(),
            cycles,
        }
    }

    /// Witnesses rendered as `"L > C > W"` and joined with `"; "`.
    pub fn describe(&self) -> String {
        self.cycles
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Simple directed win graph keyed by player.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WinGraph {
    beaten: HashMap<PlayerId, HashSet<PlayerId>>,
}

impl WinGraph {
    /// Builds the graph from records already filtered to the analysis window.
    ///
    /// Self-matches (winner equal to loser after normalization) carry no
    /// ordering information and are dropped.
    pub fn build<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a MatchRecord>,
    {
        let mut graph = Self::default();
        let mut records_seen = 0usize;
        let mut self_matches = 0usize;

        for record in records {
            records_seen += 1;
            if record.winner == record.loser {
                self_matches += 1;
                debug!(player = %record.winner, "dropping self-match");
                continue;
            }
            graph.insert(record.winner.clone(), record.loser.clone());
        }

        info!(
            records = records_seen,
            self_matches,
            players = graph.player_count(),
            edges = graph.edge_count(),
            "win graph built"
        );
        graph
    }

    /// Builds the graph from `(winner, loser)` pairs.
    pub fn from_edges<I>(edges: I) -> Self
    where
        I: IntoIterator<Item = (PlayerId, PlayerId)>,
    {
        let mut graph = Self::default();
        for (winner, loser) in edges {
            if winner != loser {
                graph.insert(winner, loser);
            }
        }
        graph
    }

    fn insert(&mut self, winner: PlayerId, loser: PlayerId) {
        self.beaten.entry(winner).or_default().insert(loser);
    }

    /// Number of players with at least one recorded win.
    pub fn player_count(&self) -> usize {
        self.beaten.len()
    }

    /// Number of distinct `winner -> loser` edges.
    pub fn edge_count(&self) -> usize {
        self.beaten.values().map(HashSet::len).sum()
    }

    /// True when the graph has no edges.
    pub fn is_empty(&self) -> bool {
        self.beaten.is_empty()
    }

    /// Whether `winner` has beaten `loser` in the window.
    pub fn beats(&self, winner: &str, loser: &str) -> bool {
        self.beaten
            .get(winner)
            .is_some_and(|out| out.contains(loser))
    }

    /// Every edge, sorted by winner then loser.
    pub fn edges(&self) -> Vec<(&PlayerId, &PlayerId)> {
        let mut edges: Vec<_> = self
            .beaten
            .iter()
            .flat_map(|(winner, losers)| losers.iter().map(move |loser| (winner, loser)))
            .collect();
        edges.sort();
        edges
    }

    /// Collects every witness `(loser, C, winner)` with `loser -> C -> winner`.
    pub fn loop_witnesses(&self, winner: &PlayerId, loser: &PlayerId) -> Vec<LoopWitness> {
        let Some(candidates) = self.beaten.get(loser) else {
            return Vec::new();
        };

        let mut cycles: Vec<LoopWitness> = candidates
            .iter()
            .filter(|c| *c != winner && self.beats(c.as_str(), winner.as_str()))
            .map(|c| LoopWitness {
                loser: loser.clone(),
                intermediate: c.clone(),
                winner: winner.clone(),
            })
            .collect();
        cycles.sort_by(|x, y| x.intermediate.cmp(&y.intermediate));
        cycles
    }

    /// Loop evidence for the realized outcome of `query`.
    pub fn query_loop(&self, query: &PredictionQuery) -> LoopEvidence {
        LoopEvidence::from_cycles(self.loop_witnesses(&query.actual_winner, &query.actual_loser))
    }

    /// Stops at the first witness.
    pub fn is_involved(&self, winner: &PlayerId, loser: &PlayerId) -> bool {
        self.beaten.get(loser).is_some_and(|candidates| {
            candidates
                .iter()
                .any(|c| c != winner && self.beats(c.as_str(), winner.as_str()))
        })
    }

    /// Runs `query_loop` for every query in parallel; results keep input order.
    pub fn query_all(&self, queries: &[PredictionQuery]) -> Vec<LoopEvidence> {
        queries.par_iter().map(|q| self.query_loop(q)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn id(name: &str) -> PlayerId {
        PlayerId::normalize(name).unwrap()
    }

    fn record(winner: &str, loser: &str) -> MatchRecord {
        MatchRecord {
            winner: id(winner),
            loser: id(loser),
            date: NaiveDate::from_ymd_opt(2023, 5, 1).unwrap(),
            surface: "Clay".to_string(),
            level: "Masters 1000".to_string(),
        }
    }

    fn outcome(winner: &str, loser: &str) -> PredictionQuery {
        PredictionQuery {
            a: id(winner),
            b: id(loser),
            actual_winner: id(winner),
            actual_loser: id(loser),
        }
    }

    /// Bob beat Alice, Carol beat Bob, Alice beat Carol.
    fn triangle() -> WinGraph {
        WinGraph::build(&[
            record("Bob", "Alice"),
            record("Carol", "Bob"),
            record("Alice", "Carol"),
        ])
    }

    #[test]
    fn duplicate_results_collapse() {
        let graph = WinGraph::build(&[
            record("Alice", "Bob"),
            record("Alice", "Bob"),
            record("Bob", "Alice"),
        ]);
        assert_eq!(graph.player_count(), 2);
        assert_eq!(graph.edge_count(), 2);
        assert!(graph.beats("Alice", "Bob"));
        assert!(graph.beats("Bob", "Alice"));
    }

    #[test]
    fn self_matches_are_dropped() {
        let graph = WinGraph::build(&[record("Alice", "Alice")]);
        assert!(graph.is_empty());
    }

    #[test]
    fn edge_set_ignores_input_order() {
        let records = vec![
            record("Alice", "Bob"),
            record("Bob", "Carol"),
            record("Carol", "Dave"),
            record("Dave", "Alice"),
        ];
        let mut reversed = records.clone();
        reversed.reverse();

        assert_eq!(WinGraph::build(&records), WinGraph::build(&reversed));
        assert_eq!(WinGraph::build(&records).edges(), WinGraph::build(&reversed).edges());
    }

    #[test]
    fn triangle_yields_witness() {
        let graph = triangle();
        let evidence = graph.query_loop(&outcome("Alice", "Carol"));

        assert!(evidence.involved);
        assert_eq!(
            evidence.cycles,
            vec![LoopWitness {
                loser: id("Carol"),
                intermediate: id("Bob"),
                winner: id("Alice"),
            }]
        );
        assert_eq!(evidence.describe(), "Carol > Bob > Alice");
        assert!(graph.is_involved(&id("Alice"), &id("Carol")));
    }

    #[test]
    fn direct_rematch_is_not_a_witness() {
        let graph = WinGraph::build(&[record("Alice", "Bob")]);
        let evidence = graph.query_loop(&outcome("Alice", "Bob"));
        assert!(!evidence.involved);
        assert!(evidence.cycles.is_empty());

        // Bob beat Alice earlier; C == W is excluded.
        let graph = WinGraph::build(&[record("Bob", "Alice"), record("Alice", "Bob")]);
        assert!(!graph.query_loop(&outcome("Alice", "Bob")).involved);
    }

    #[test]
    fn loser_without_wins_is_never_involved() {
        let graph = triangle();
        for winner in ["Alice", "Bob", "Carol", "Zed"] {
            assert!(!graph.query_loop(&outcome(winner, "Nobody")).involved);
            assert!(!graph.is_involved(&id(winner), &id("Nobody")));
        }
    }

    #[test]
    fn empty_graph_reports_nothing() {
        let graph = WinGraph::build(std::iter::empty::<&MatchRecord>());
        assert_eq!(graph.edge_count(), 0);
        assert!(!graph.query_loop(&outcome("Alice", "Bob")).involved);
    }

    #[test]
    fn witnesses_sorted_by_intermediate() {
        let graph = WinGraph::from_edges(
            [("Lena", "Zoe"), ("Lena", "Mia"), ("Zoe", "Wanda"), ("Mia", "Wanda")]
                .into_iter()
                .map(|(w, l)| (id(w), id(l))),
        );
        let evidence = graph.query_loop(&outcome("Wanda", "Lena"));

        let intermediates: Vec<&str> = evidence
            .cycles
            .iter()
            .map(|w| w.intermediate.as_str())
            .collect();
        assert_eq!(intermediates, vec!["Mia", "Zoe"]);
        assert_eq!(evidence.describe(), "Lena > Mia > Wanda; Lena > Zoe > Wanda");
    }

    #[test]
    fn batch_query_keeps_input_order() {
        let graph = triangle();
        let queries = vec![
            outcome("Alice", "Bob"),
            outcome("Alice", "Carol"),
            outcome("Bob", "Alice"),
        ];
        let results = graph.query_all(&queries);

        let flags: Vec<bool> = results.iter().map(|e| e.involved).collect();
        let expected: Vec<bool> = queries.iter().map(|q| graph.query_loop(q).involved).collect();
        assert_eq!(flags, expected);
        assert_eq!(flags, vec![false, true, true]);
    }
}
