//! Shared engine state.
//!
//! Owns one [`LevelStore`] per level, the [`RelationshipGraph`] and the
//! [`AccessTracker`], and is the only place that mutates them, so level
//! exclusivity and edge cleanup hold after every call returns.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use super::access::AccessTracker;
use super::graph::{Relation, RelationshipGraph};
use super::level_store::LevelStore;
use super::types::{MemoryKind, MemoryLevel, MemoryNode, MemoryStats, NodeId};
use crate::error::check_unit;
use crate::{StrataError, StrataResult};

/// Level stores, graph and access history behind one lock
#[derive(Debug, Clone)]
pub struct MemoryState {
    levels: [LevelStore; 5],
    index: HashMap<NodeId, MemoryLevel>,
    graph: RelationshipGraph,
    tracker: AccessTracker,
    pub(crate) last_episodic_pass: DateTime<Utc>,
    pub(crate) last_semantic_pass: DateTime<Utc>,
}

impl MemoryState {
    pub fn new(tracker: AccessTracker, now: DateTime<Utc>) -> Self {
        Self {
            levels: MemoryLevel::ALL.map(LevelStore::new),
            index: HashMap::new(),
            graph: RelationshipGraph::new(),
            tracker,
            last_episodic_pass: now,
            last_semantic_pass: now,
        }
    }

    pub fn level(&self, level: MemoryLevel) -> &LevelStore {
        &self.levels[level.index()]
    }

    pub fn graph(&self) -> &RelationshipGraph {
        &self.graph
    }

    pub fn tracker(&self) -> &AccessTracker {
        &self.tracker
    }

    pub(crate) fn tracker_mut(&mut self) -> &mut AccessTracker {
        &mut self.tracker
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn level_of(&self, id: &str) -> Option<MemoryLevel> {
        self.index.get(id).copied()
    }

    pub fn node(&self, id: &str) -> Option<&MemoryNode> {
        let level = self.level_of(id)?;
        self.levels[level.index()].get(id)
    }

    pub(crate) fn node_mut(&mut self, id: &str) -> Option<&mut MemoryNode> {
        let level = self.level_of(id)?;
        self.levels[level.index()].get_mut(id)
    }

    /// Every node, level by level
    pub fn nodes(&self) -> impl Iterator<Item = &MemoryNode> {
        self.levels.iter().flat_map(LevelStore::list)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Insertion
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert a freshly built node and wire its parent and connections.
    ///
    /// All validation happens before anything is stored. Connections are
    /// written on both sides.
    pub(crate) fn insert(&mut self, mut node: MemoryNode) -> StrataResult<()> {
        if self.contains(&node.id) {
            return Err(StrataError::duplicate_id(node.id));
        }
        if let Some(parent) = &node.parent {
            if !self.contains(parent) {
                return Err(StrataError::invalid_parent(parent.clone()));
            }
        }
        check_unit("metadata.quality", node.metadata.quality)?;
        for (target, weight) in &node.connections {
            check_unit("connections", *weight)?;
            if !self.contains(target) {
                return Err(StrataError::not_found(target.clone()));
            }
        }

        let connections = std::mem::take(&mut node.connections);
        let parent = node.parent.take();
        node.children.clear();
        let id = node.id.clone();

        self.insert_detached(node)?;
        if let Some(parent) = parent {
            self.set_parent(&id, &parent)?;
        }
        for (target, weight) in connections {
            self.connect_mutual(&id, &target, weight)?;
        }
        Ok(())
    }

    /// Store a node without touching any edge. Its link fields are kept as-is;
    /// callers must wire or clear them before releasing the lock.
    pub(crate) fn insert_detached(&mut self, node: MemoryNode) -> StrataResult<()> {
        if self.contains(&node.id) {
            return Err(StrataError::duplicate_id(node.id));
        }
        let id = node.id.clone();
        let level = node.level;
        self.levels[level.index()].insert(node)?;
        self.index.insert(id.clone(), level);
        self.graph.add_node(&id);
        self.tracker.seed(&id);
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Edges
    // ─────────────────────────────────────────────────────────────────────────

    /// Make `parent` own `child`
    pub(crate) fn set_parent(&mut self, child: &str, parent: &str) -> StrataResult<()> {
        if !self.contains(parent) {
            return Err(StrataError::invalid_parent(parent));
        }
        if !self.contains(child) {
            return Err(StrataError::not_found(child));
        }

        if let Some(old) = self.node(child).and_then(|n| n.parent.clone()) {
            if let Some(old_parent) = self.node_mut(&old) {
                old_parent.children.remove(child);
            }
            self.graph.remove_edge(&old, child, Relation::Child);
            self.graph.remove_edge(child, &old, Relation::Parent);
        }

        if let Some(node) = self.node_mut(child) {
            node.parent = Some(parent.to_string());
        }
        if let Some(node) = self.node_mut(parent) {
            node.children.insert(child.to_string());
        }
        self.graph.add_edge(parent, child, 1.0, Relation::Child)?;
        self.graph.add_edge(child, parent, 1.0, Relation::Parent)?;
        Ok(())
    }

    /// One-sided connection `from -> to`
    pub(crate) fn connect(&mut self, from: &str, to: &str, weight: f64) -> StrataResult<()> {
        check_unit("connections", weight)?;
        if !self.contains(to) {
            return Err(StrataError::not_found(to));
        }
        self.graph.add_edge(from, to, weight, Relation::Connection)?;
        let node = self
            .node_mut(from)
            .ok_or_else(|| StrataError::not_found(from))?;
        node.connections.insert(to.to_string(), weight);
        Ok(())
    }

    /// Connection written on both sides with the same weight
    pub(crate) fn connect_mutual(&mut self, a: &str, b: &str, weight: f64) -> StrataResult<()> {
        self.connect(a, b, weight)?;
        self.connect(b, a, weight)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Removal and movement
    // ─────────────────────────────────────────────────────────────────────────

    /// Remove a node together with every edge that mentions it
    pub(crate) fn remove(&mut self, id: &str) -> Option<MemoryNode> {
        let level = self.index.remove(id)?;
        let node = self.levels[level.index()].remove(id)?;

        let referrers: Vec<NodeId> = self
            .nodes()
            .filter(|n| n.connections.contains_key(id) || n.children.contains(id))
            .map(|n| n.id.clone())
            .collect();
        for referrer in referrers {
            if let Some(other) = self.node_mut(&referrer) {
                other.connections.remove(id);
                other.children.remove(id);
            }
        }
        for child in &node.children {
            if let Some(other) = self.node_mut(child) {
                if other.parent.as_deref() == Some(id) {
                    other.parent = None;
                }
            }
        }

        self.graph.remove_node(id);
        self.tracker.forget(id);
        Some(node)
    }

    /// Move a node to another level, preserving its id.
    ///
    /// The consolidation and access accumulators restart from zero.
    pub(crate) fn move_to(&mut self, id: &str, target: MemoryLevel) -> StrataResult<()> {
        let current = self.level_of(id).ok_or_else(|| StrataError::not_found(id))?;
        if current == target {
            return Ok(());
        }
        let mut node = self.levels[current.index()]
            .remove(id)
            .ok_or_else(|| StrataError::not_found(id))?;
        node.consolidation_score = 0.0;
        node.access_frequency = 0.0;
        self.levels[target.index()].insert(node)?;
        self.index.insert(id.to_string(), target);
        Ok(())
    }

    /// Record an access and return a copy of the node
    pub(crate) fn record_access(&mut self, id: &str, at: DateTime<Utc>) -> Option<MemoryNode> {
        let level = self.level_of(id)?;
        let node = self.levels[level.index()].get_mut(id)?;
        self.tracker.record_access(node, at);
        Some(node.clone())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Inspection
    // ─────────────────────────────────────────────────────────────────────────

    pub fn stats(&self) -> MemoryStats {
        let mut stats = MemoryStats {
            total_nodes: self.len(),
            total_edges: self.graph.edge_count(),
            ..Default::default()
        };
        for level in MemoryLevel::ALL {
            stats
                .count_by_level
                .insert(level.to_string(), self.level(level).len());
        }
        for kind in MemoryKind::ALL {
            let count = self.nodes().filter(|n| n.kind == kind).count();
            if count > 0 {
                stats.count_by_kind.insert(kind.to_string(), count);
            }
        }
        stats
    }

    /// Verify the structural invariants, describing the first violation found
    pub fn check_invariants(&self) -> Result<(), String> {
        for level in MemoryLevel::ALL {
            for node in self.level(level).list() {
                if node.level != level {
                    return Err(format!("{} stored in {level} but tagged {}", node.id, node.level));
                }
                if self.level_of(&node.id) != Some(level) {
                    return Err(format!("{} missing from level index", node.id));
                }
                let holders = MemoryLevel::ALL
                    .iter()
                    .filter(|l| self.level(**l).contains(&node.id))
                    .count();
                if holders != 1 {
                    return Err(format!("{} held by {holders} levels", node.id));
                }
                if let Some(parent) = &node.parent {
                    let owner = self
                        .node(parent)
                        .ok_or_else(|| format!("{} has dangling parent {parent}", node.id))?;
                    if !owner.children.contains(&node.id) {
                        return Err(format!("{parent} does not list child {}", node.id));
                    }
                }
                for child in &node.children {
                    if !self.contains(child) {
                        return Err(format!("{} has dangling child {child}", node.id));
                    }
                }
                for (target, weight) in &node.connections {
                    if !self.contains(target) {
                        return Err(format!("{} has dangling connection {target}", node.id));
                    }
                    if !(0.0..=1.0).contains(weight) {
                        return Err(format!("{} -> {target} weight {weight}", node.id));
                    }
                }
                if node.access_frequency < 0.0 || node.consolidation_score < 0.0 {
                    return Err(format!("{} has a negative accumulator", node.id));
                }
                if !self.graph.contains(&node.id) {
                    return Err(format!("{} missing from graph", node.id));
                }
            }
        }
        if self.index.len() != self.nodes().count() {
            return Err("level index out of step with level stores".into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> MemoryState {
        MemoryState::new(AccessTracker::default(), Utc::now())
    }

    fn node(content: &str) -> MemoryNode {
        MemoryNode::new(content, MemoryLevel::Working, MemoryKind::Fact)
    }

    #[test]
    fn test_insert_wires_parent_and_connections() {
        let mut state = state();
        let parent = node("parent");
        let parent_id = parent.id.clone();
        state.insert(parent).unwrap();

        let mut child = node("child");
        child.parent = Some(parent_id.clone());
        child.connections.insert(parent_id.clone(), 0.4);
        let child_id = child.id.clone();
        state.insert(child).unwrap();

        let parent = state.node(&parent_id).unwrap();
        assert!(parent.children.contains(&child_id));
        assert_eq!(parent.connections.get(&child_id), Some(&0.4));
        assert_eq!(
            state.graph().neighbors(&parent_id, Some(Relation::Child)),
            vec![child_id.clone()]
        );
        state.check_invariants().unwrap();
    }

    #[test]
    fn test_insert_validates_before_storing() {
        let mut state = state();

        let mut orphan = node("orphan");
        orphan.parent = Some("nope".into());
        assert!(matches!(state.insert(orphan), Err(StrataError::InvalidParent { .. })));

        let anchor = node("anchor");
        let anchor_id = anchor.id.clone();
        state.insert(anchor).unwrap();

        let mut heavy = node("heavy");
        heavy.connections.insert(anchor_id.clone(), 2.0);
        assert!(matches!(state.insert(heavy), Err(StrataError::InvalidWeight { .. })));

        assert_eq!(state.len(), 1);
        assert!(state.node(&anchor_id).unwrap().connections.is_empty());
    }

    #[test]
    fn test_remove_cleans_every_reference() {
        let mut state = state();
        let a = node("a");
        let a_id = a.id.clone();
        state.insert(a).unwrap();

        let mut b = node("b");
        b.parent = Some(a_id.clone());
        b.connections.insert(a_id.clone(), 0.5);
        let b_id = b.id.clone();
        state.insert(b).unwrap();

        let mut c = node("c");
        c.parent = Some(b_id.clone());
        let c_id = c.id.clone();
        state.insert(c).unwrap();

        let removed = state.remove(&b_id).unwrap();
        assert_eq!(removed.content, "b");
        assert!(state.remove(&b_id).is_none());

        let a = state.node(&a_id).unwrap();
        assert!(a.children.is_empty());
        assert!(a.connections.is_empty());
        assert!(state.node(&c_id).unwrap().parent.is_none());
        assert!(state.graph().related_within(&a_id, 3).is_empty());
        state.check_invariants().unwrap();
    }

    #[test]
    fn test_move_preserves_identity_and_resets_accumulators() {
        let mut state = state();
        let mut n = node("n");
        n.access_frequency = 0.7;
        n.consolidation_score = 0.3;
        let id = n.id.clone();
        state.insert(n).unwrap();

        state.move_to(&id, MemoryLevel::Episodic).unwrap();

        assert!(!state.level(MemoryLevel::Working).contains(&id));
        let moved = state.level(MemoryLevel::Episodic).get(&id).unwrap();
        assert_eq!(moved.id, id);
        assert_eq!(moved.level, MemoryLevel::Episodic);
        assert_eq!(moved.access_frequency, 0.0);
        assert_eq!(moved.consolidation_score, 0.0);
        state.check_invariants().unwrap();
    }

    #[test]
    fn test_stats_counts() {
        let mut state = state();
        state.insert(node("a")).unwrap();
        state
            .insert(MemoryNode::new("b", MemoryLevel::Semantic, MemoryKind::Concept))
            .unwrap();

        let stats = state.stats();
        assert_eq!(stats.total_nodes, 2);
        assert_eq!(stats.count_by_level["working"], 1);
        assert_eq!(stats.count_by_level["semantic"], 1);
        assert_eq!(stats.count_by_kind["concept"], 1);
    }
}
