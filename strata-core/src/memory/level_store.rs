//! Per-level node storage.

use std::collections::HashMap;

use super::types::{MemoryLevel, MemoryNode, NodeId};
use crate::{StrataError, StrataResult};

/// Indexed collection of the nodes occupying one memory level.
///
/// Knows nothing about graph edges or ranking; the owning state keeps both
/// in step with it.
#[derive(Debug, Clone)]
pub struct LevelStore {
    level: MemoryLevel,
    nodes: HashMap<NodeId, MemoryNode>,
}

impl LevelStore {
    /// Create an empty store for a level
    pub fn new(level: MemoryLevel) -> Self {
        Self {
            level,
            nodes: HashMap::new(),
        }
    }

    /// The level this store holds
    pub fn level(&self) -> MemoryLevel {
        self.level
    }

    /// Insert a node, rejecting ids already present.
    ///
    /// The node's `level` field is overwritten with this store's level.
    pub fn insert(&mut self, mut node: MemoryNode) -> StrataResult<()> {
        if self.nodes.contains_key(&node.id) {
            return Err(StrataError::duplicate_id(node.id));
        }
        node.level = self.level;
        self.nodes.insert(node.id.clone(), node);
        Ok(())
    }

    /// Remove a node. Idempotent: a second call returns `None`.
    pub fn remove(&mut self, id: &str) -> Option<MemoryNode> {
        self.nodes.remove(id)
    }

    pub fn get(&self, id: &str) -> Option<&MemoryNode> {
        self.nodes.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut MemoryNode> {
        self.nodes.get_mut(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Lazily iterate the nodes present at call time
    pub fn list(&self) -> impl Iterator<Item = &MemoryNode> {
        self.nodes.values()
    }

    /// Point-in-time copy of the id set, sorted for stable pass order
    pub fn ids(&self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self.nodes.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::types::MemoryKind;

    #[test]
    fn test_insert_and_get() {
        let mut store = LevelStore::new(MemoryLevel::Episodic);
        let node = MemoryNode::new("hello", MemoryLevel::Working, MemoryKind::Fact);
        let id = node.id.clone();

        store.insert(node).unwrap();
        let stored = store.get(&id).unwrap();
        assert_eq!(stored.content, "hello");
        assert_eq!(stored.level, MemoryLevel::Episodic);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_duplicate_insert_rejected() {
        let mut store = LevelStore::new(MemoryLevel::Working);
        let node = MemoryNode::new("a", MemoryLevel::Working, MemoryKind::Fact);
        store.insert(node.clone()).unwrap();

        let err = store.insert(node).unwrap_err();
        assert!(matches!(err, StrataError::DuplicateId { .. }));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let mut store = LevelStore::new(MemoryLevel::Working);
        let node = MemoryNode::new("a", MemoryLevel::Working, MemoryKind::Fact);
        let id = node.id.clone();
        store.insert(node).unwrap();

        assert!(store.remove(&id).is_some());
        assert!(store.remove(&id).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_list_reflects_store_at_call_time() {
        let mut store = LevelStore::new(MemoryLevel::Working);
        for i in 0..3 {
            store
                .insert(MemoryNode::new(format!("n{i}"), MemoryLevel::Working, MemoryKind::Fact))
                .unwrap();
        }
        assert_eq!(store.list().count(), 3);

        let ids = store.ids();
        store.remove(&ids[0]);
        assert_eq!(store.list().count(), 2);
        assert_eq!(ids.len(), 3);
    }
}
