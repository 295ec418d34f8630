//! Relationship graph over node ids.
//!
//! Adjacency lists keyed by node id. Edges carry a [`Relation`] label so the
//! same structure answers both associative (`Connection`) and ownership
//! (`Parent`/`Child`) queries. Nothing here holds a node value, so removing a
//! node is a map operation and cannot leave a dangling reference.

use std::collections::{HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use super::types::NodeId;
use crate::error::check_unit;
use crate::{StrataError, StrataResult};

/// Edge label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    /// Weighted associative link
    Connection,
    /// From a parent to one of its children
    Child,
    /// From a child to its parent
    Parent,
}

/// Directed, weighted edge
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub target: NodeId,
    pub weight: f64,
    pub relation: Relation,
}

/// Directed graph keyed by node id
#[derive(Debug, Clone, Default)]
pub struct RelationshipGraph {
    adjacency: HashMap<NodeId, Vec<Edge>>,
}

impl RelationshipGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node. No-op if already present.
    pub fn add_node(&mut self, id: &str) {
        if !self.adjacency.contains_key(id) {
            self.adjacency.insert(id.to_string(), Vec::new());
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.adjacency.contains_key(id)
    }

    /// Add or reweight an edge. Re-adding keeps the original insertion slot.
    pub fn add_edge(
        &mut self,
        from: &str,
        to: &str,
        weight: f64,
        relation: Relation,
    ) -> StrataResult<()> {
        check_unit("edge weight", weight)?;
        if !self.adjacency.contains_key(to) {
            return Err(StrataError::not_found(to));
        }
        let edges = self
            .adjacency
            .get_mut(from)
            .ok_or_else(|| StrataError::not_found(from))?;

        match edges
            .iter_mut()
            .find(|e| e.target == to && e.relation == relation)
        {
            Some(existing) => existing.weight = weight,
            None => edges.push(Edge {
                target: to.to_string(),
                weight,
                relation,
            }),
        }
        Ok(())
    }

    /// Remove one labelled edge, returning whether it existed
    pub fn remove_edge(&mut self, from: &str, to: &str, relation: Relation) -> bool {
        let Some(edges) = self.adjacency.get_mut(from) else {
            return false;
        };
        let before = edges.len();
        edges.retain(|e| !(e.target == to && e.relation == relation));
        edges.len() != before
    }

    /// Remove a node and every edge incident to it, in both directions
    pub fn remove_node(&mut self, id: &str) -> bool {
        let existed = self.adjacency.remove(id).is_some();
        for edges in self.adjacency.values_mut() {
            edges.retain(|e| e.target != id);
        }
        existed
    }

    /// Outgoing edges in insertion order
    pub fn edges(&self, id: &str) -> &[Edge] {
        self.adjacency.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Distinct outgoing neighbours, optionally restricted to one relation
    pub fn neighbors(&self, id: &str, relation: Option<Relation>) -> Vec<NodeId> {
        let mut seen = HashSet::new();
        self.edges(id)
            .iter()
            .filter(|e| relation.is_none_or(|r| e.relation == r))
            .filter(|e| seen.insert(e.target.as_str()))
            .map(|e| e.target.clone())
            .collect()
    }

    /// Unweighted BFS path, ties broken by edge insertion order
    pub fn shortest_path(&self, from: &str, to: &str) -> Option<Vec<NodeId>> {
        if !self.contains(from) || !self.contains(to) {
            return None;
        }
        if from == to {
            return Some(vec![from.to_string()]);
        }

        let mut previous: HashMap<&str, &str> = HashMap::new();
        let mut visited: HashSet<&str> = HashSet::from([from]);
        let mut queue = VecDeque::from([from]);

        while let Some(current) = queue.pop_front() {
            for edge in self.edges(current) {
                let next = edge.target.as_str();
                if !self.contains(next) || !visited.insert(next) {
                    continue;
                }
                previous.insert(next, current);
                if next == to {
                    let mut path = vec![to.to_string()];
                    let mut cursor = to;
                    while let Some(&prev) = previous.get(cursor) {
                        path.push(prev.to_string());
                        cursor = prev;
                    }
                    path.reverse();
                    return Some(path);
                }
                queue.push_back(next);
            }
        }

        None
    }

    /// Ids reachable within `max_depth` hops over every relation, origin excluded.
    ///
    /// Returned in discovery order; each id at most once. Targets missing from
    /// the graph are skipped rather than reported.
    pub fn related_within(&self, id: &str, max_depth: usize) -> Vec<NodeId> {
        let mut result = Vec::new();
        if !self.contains(id) {
            return result;
        }

        let mut visited: HashSet<&str> = HashSet::from([id]);
        let mut queue = VecDeque::from([(id, 0usize)]);

        while let Some((current, depth)) = queue.pop_front() {
            if depth >= max_depth {
                continue;
            }
            for edge in self.edges(current) {
                let next = edge.target.as_str();
                if !self.contains(next) || !visited.insert(next) {
                    continue;
                }
                result.push(next.to_string());
                queue.push_back((next, depth + 1));
            }
        }

        result
    }

    /// Degree centrality per node: (in + out degree) / (n - 1)
    pub fn degree_centrality(&self) -> HashMap<NodeId, f64> {
        let n = self.adjacency.len();
        let mut degree: HashMap<&str, usize> =
            self.adjacency.keys().map(|id| (id.as_str(), 0)).collect();

        for (from, edges) in &self.adjacency {
            for edge in edges {
                if let Some(d) = degree.get_mut(edge.target.as_str()) {
                    *d += 1;
                    if let Some(out) = degree.get_mut(from.as_str()) {
                        *out += 1;
                    }
                }
            }
        }

        let denom = n.saturating_sub(1).max(1) as f64;
        degree
            .into_iter()
            .map(|(id, d)| (id.to_string(), if n > 1 { d as f64 / denom } else { 0.0 }))
            .collect()
    }

    pub fn node_count(&self) -> usize {
        self.adjacency.len()
    }

    pub fn edge_count(&self) -> usize {
        self.adjacency.values().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph_with(ids: &[&str]) -> RelationshipGraph {
        let mut graph = RelationshipGraph::new();
        for id in ids {
            graph.add_node(id);
        }
        graph
    }

    #[test]
    fn test_add_edge_validates() {
        let mut graph = graph_with(&["a", "b"]);
        assert!(graph.add_edge("a", "b", 0.5, Relation::Connection).is_ok());
        assert!(matches!(
            graph.add_edge("a", "b", 1.2, Relation::Connection),
            Err(StrataError::InvalidWeight { .. })
        ));
        assert!(graph
            .add_edge("a", "missing", 0.5, Relation::Connection)
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn test_readding_edge_reweights_in_place() {
        let mut graph = graph_with(&["a", "b", "c"]);
        graph.add_edge("a", "b", 0.1, Relation::Connection).unwrap();
        graph.add_edge("a", "c", 0.2, Relation::Connection).unwrap();
        graph.add_edge("a", "b", 0.9, Relation::Connection).unwrap();

        let edges = graph.edges("a");
        assert_eq!(edges.len(), 2);
        assert_eq!(edges[0].target, "b");
        assert!((edges[0].weight - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_neighbors_by_relation() {
        let mut graph = graph_with(&["p", "c", "x"]);
        graph.add_edge("p", "c", 1.0, Relation::Child).unwrap();
        graph.add_edge("p", "x", 0.4, Relation::Connection).unwrap();
        graph.add_edge("p", "c", 0.3, Relation::Connection).unwrap();

        assert_eq!(graph.neighbors("p", None), vec!["c", "x"]);
        assert_eq!(graph.neighbors("p", Some(Relation::Child)), vec!["c"]);
        assert_eq!(graph.neighbors("p", Some(Relation::Connection)), vec!["x", "c"]);
        assert!(graph.neighbors("missing", None).is_empty());
    }

    #[test]
    fn test_remove_node_drops_incident_edges() {
        let mut graph = graph_with(&["a", "b", "c"]);
        graph.add_edge("a", "b", 0.5, Relation::Connection).unwrap();
        graph.add_edge("b", "a", 0.5, Relation::Connection).unwrap();
        graph.add_edge("c", "b", 0.5, Relation::Connection).unwrap();

        assert!(graph.remove_node("b"));
        assert!(!graph.remove_node("b"));
        assert!(graph.edges("a").is_empty());
        assert!(graph.edges("c").is_empty());
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn test_shortest_path_prefers_insertion_order() {
        let mut graph = graph_with(&["a", "b", "c", "d"]);
        graph.add_edge("a", "b", 1.0, Relation::Connection).unwrap();
        graph.add_edge("a", "c", 1.0, Relation::Connection).unwrap();
        graph.add_edge("b", "d", 1.0, Relation::Connection).unwrap();
        graph.add_edge("c", "d", 1.0, Relation::Connection).unwrap();

        assert_eq!(graph.shortest_path("a", "d"), Some(vec!["a".into(), "b".into(), "d".into()]));
        assert_eq!(graph.shortest_path("a", "a"), Some(vec!["a".into()]));
        assert_eq!(graph.shortest_path("d", "a"), None);
        assert_eq!(graph.shortest_path("a", "zz"), None);
    }

    #[test]
    fn test_related_within_depth() {
        let mut graph = graph_with(&["a", "b", "c", "d"]);
        graph.add_edge("a", "b", 1.0, Relation::Connection).unwrap();
        graph.add_edge("b", "c", 1.0, Relation::Child).unwrap();
        graph.add_edge("c", "d", 1.0, Relation::Connection).unwrap();
        graph.add_edge("c", "a", 1.0, Relation::Connection).unwrap();

        assert_eq!(graph.related_within("a", 1), vec!["b"]);
        assert_eq!(graph.related_within("a", 2), vec!["b", "c"]);
        assert_eq!(graph.related_within("a", 5), vec!["b", "c", "d"]);
        assert!(graph.related_within("a", 0).is_empty());
    }

    #[test]
    fn test_degree_centrality() {
        let mut graph = graph_with(&["hub", "a", "b"]);
        graph.add_edge("hub", "a", 1.0, Relation::Connection).unwrap();
        graph.add_edge("hub", "b", 1.0, Relation::Connection).unwrap();

        let centrality = graph.degree_centrality();
        assert!((centrality["hub"] - 1.0).abs() < 1e-9);
        assert!((centrality["a"] - 0.5).abs() < 1e-9);

        let lonely = graph_with(&["solo"]);
        assert_eq!(lonely.degree_centrality()["solo"], 0.0);
    }
}
