//! Intransitive clusters: strongly connected components of the win graph.
//!
//! Inside a component of more than one player every pair is connected by a
//! chain of wins in both directions, so each member sits on at least one
//! intransitive cycle. Components are found with Tarjan's algorithm on a
//! petgraph copy of the adjacency.

use std::collections::{HashMap, HashSet};

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::Serialize;
use tennis_data::types::PlayerId;
use tracing::info;

use crate::win_graph::WinGraph;

/// One strongly connected group of players.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct IntransitiveCluster {
    /// Members, sorted by name.
    pub players: Vec<PlayerId>,
    /// Win edges with both ends inside the cluster.
    pub edge_count: usize,
}

impl IntransitiveCluster {
    /// Number of members.
    pub fn size(&self) -> usize {
        self.players.len()
    }
}

/// Finds every cluster of two or more players.
///
/// Clusters are ordered by size (largest first), then by their first member.
pub fn intransitive_clusters(graph: &WinGraph) -> Vec<IntransitiveCluster> {
    let mut dg: DiGraph<&PlayerId, ()> = DiGraph::new();
    let mut ix: HashMap<&PlayerId, NodeIndex> = HashMap::new();

    for (winner, loser) in graph.edges() {
        let from = *ix.entry(winner).or_insert_with(|| dg.add_node(winner));
        let to = *ix.entry(loser).or_insert_with(|| dg.add_node(loser));
        dg.add_edge(from, to, ());
    }

    let mut clusters: Vec<IntransitiveCluster> = tarjan_scc(&dg)
        .into_iter()
        .filter(|scc| scc.len() > 1)
        .map(|scc| {
            let members: HashSet<NodeIndex> = scc.iter().copied().collect();
            let edge_count = dg
                .edge_references()
                .filter(|e| members.contains(&e.source()) && members.contains(&e.target()))
                .count();
            let mut players: Vec<PlayerId> = scc.iter().map(|&n| dg[n].clone()).collect();
            players.sort();
            IntransitiveCluster {
                players,
                edge_count,
            }
        })
        .collect();

    clusters.sort_by(|a, b| {
        b.size()
            .cmp(&a.size())
            .then_with(|| a.players.first().cmp(&b.players.first()))
    });

    info!(
        clusters = clusters.len(),
        largest = clusters.first().map_or(0, IntransitiveCluster::size),
        "intransitive clusters detected"
    );
    clusters
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(edges: &[(&str, &str)]) -> WinGraph {
        WinGraph::from_edges(edges.iter().map(|(w, l)| {
            (
                PlayerId::normalize(w).unwrap(),
                PlayerId::normalize(l).unwrap(),
            )
        }))
    }

    fn names(cluster: &IntransitiveCluster) -> Vec<&str> {
        cluster.players.iter().map(PlayerId::as_str).collect()
    }

    #[test]
    fn three_cycle_is_one_cluster() {
        let clusters = intransitive_clusters(&graph(&[
            ("Alice", "Bob"),
            ("Bob", "Carol"),
            ("Carol", "Alice"),
            ("Carol", "Dave"),
        ]));

        assert_eq!(clusters.len(), 1);
        assert_eq!(names(&clusters[0]), vec!["Alice", "Bob", "Carol"]);
        assert_eq!(clusters[0].edge_count, 3);
    }

    #[test]
    fn chain_has_no_clusters() {
        // Alice > Bob > Carol > Dave, no upsets.
        let clusters = intransitive_clusters(&graph(&[
            ("Alice", "Bob"),
            ("Bob", "Carol"),
            ("Carol", "Dave"),
            ("Alice", "Dave"),
        ]));
        assert!(clusters.is_empty());
    }

    #[test]
    fn head_to_head_split_forms_pair() {
        let clusters = intransitive_clusters(&graph(&[
            ("Alice", "Bob"),
            ("Bob", "Alice"),
            ("Carol", "Dave"),
            ("Dave", "Erin"),
            ("Erin", "Carol"),
        ]));

        assert_eq!(clusters.len(), 2);
        assert_eq!(names(&clusters[0]), vec!["Carol", "Dave", "Erin"]);
        assert_eq!(names(&clusters[1]), vec!["Alice", "Bob"]);
        assert_eq!(clusters[1].edge_count, 2);
    }

    #[test]
    fn empty_graph() {
        assert!(intransitive_clusters(&WinGraph::default()).is_empty());
    }
}
