//! Hierarchical Memory System
//!
//! High-level interface over the engine state with:
//! - Level-scoped retrieval and ranking
//! - Size and interval triggered consolidation
//! - Snapshot export, import and persistence

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{RwLock, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::access::AccessTracker;
use super::consolidation::{ConsolidationEngine, Relatedness};
use super::embeddings::{CosineSimilarity, Similarity};
use super::ranking::RetrievalRanker;
use super::snapshot::{self, ImportReport, MemorySnapshot, SnapshotSink};
use super::state::MemoryState;
use super::types::{
    ConsolidationResult, MemoryLevel, MemoryNode, MemoryStats, NewMemory, NodeId, NodeUpdate,
    QueryHit, QuerySpec, UpdateOutcome,
};
use crate::error::check_unit;
use crate::{StrataConfig, StrataError, StrataResult};

/// High-level hierarchical memory interface
pub struct HierarchicalMemory {
    state: Arc<RwLock<MemoryState>>,
    engine: Arc<ConsolidationEngine>,
    similarity: Arc<dyn Similarity>,
    config: StrataConfig,
    shutdown_tx: Option<mpsc::Sender<()>>,
    worker: Option<JoinHandle<()>>,
}

impl HierarchicalMemory {
    /// Create an empty memory system
    pub fn new(config: StrataConfig) -> StrataResult<Self> {
        config.validate()?;

        let tracker = AccessTracker::new(
            config.memory.access_history_cap,
            config.memory.access_increment,
        );
        let state = MemoryState::new(tracker, Utc::now());
        let similarity: Arc<dyn Similarity> = Arc::new(CosineSimilarity);
        let engine = ConsolidationEngine::new(&config).with_similarity(Arc::clone(&similarity));

        Ok(Self {
            state: Arc::new(RwLock::new(state)),
            engine: Arc::new(engine),
            similarity,
            config,
            shutdown_tx: None,
            worker: None,
        })
    }

    /// Replace the embedding comparison used by queries and grouping
    pub fn with_similarity(mut self, similarity: Arc<dyn Similarity>) -> Self {
        let engine = (*self.engine).clone().with_similarity(Arc::clone(&similarity));
        self.engine = Arc::new(engine);
        self.similarity = similarity;
        self
    }

    /// Replace the episodic grouping rule
    pub fn with_relatedness(mut self, relatedness: Arc<dyn Relatedness>) -> Self {
        let engine = (*self.engine).clone().with_relatedness(relatedness);
        self.engine = Arc::new(engine);
        self
    }

    pub fn config(&self) -> &StrataConfig {
        &self.config
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Node operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Add a node and return its id.
    ///
    /// Connections are written on both sides. Adding to a full Working level
    /// runs the working pass when `auto_consolidate` is set.
    pub async fn add(&self, input: NewMemory) -> StrataResult<NodeId> {
        let mut node = MemoryNode::new(input.content, input.level, input.kind);
        node.metadata = input.metadata;
        node.parent = input.parent;
        node.connections = input.connections;
        node.embedding = input.embedding;
        let id = node.id.clone();
        let level = node.level;

        let mut state = self.state.write().await;
        state.insert(node)?;
        debug!(node_id = %id, level = %level, "Added memory node");

        if self.config.memory.auto_consolidate
            && level == MemoryLevel::Working
            && state.level(MemoryLevel::Working).len() > self.config.memory.max_working_size
        {
            self.engine.working_pass(&mut state, Utc::now());
        }
        Ok(id)
    }

    /// Fetch a node, recording the access
    pub async fn get(&self, id: &str) -> StrataResult<MemoryNode> {
        let mut state = self.state.write().await;
        state
            .record_access(id, Utc::now())
            .ok_or_else(|| StrataError::not_found(id))
    }

    /// Fetch a node without touching its access history
    pub async fn peek(&self, id: &str) -> Option<MemoryNode> {
        self.state.read().await.node(id).cloned()
    }

    /// Apply a partial update.
    ///
    /// Changing the content without supplying a new embedding clears the old
    /// one and reports [`UpdateOutcome::EmbeddingStale`].
    pub async fn update(&self, id: &str, update: NodeUpdate) -> StrataResult<UpdateOutcome> {
        if let Some(metadata) = &update.metadata {
            check_unit("metadata.quality", metadata.quality)?;
        }

        let mut state = self.state.write().await;
        let Some(node) = state.node_mut(id) else {
            return Ok(UpdateOutcome::Missing);
        };

        let mut stale = false;
        if let Some(content) = update.content {
            if content != node.content {
                node.content = content;
                stale = true;
            }
        }
        if let Some(metadata) = update.metadata {
            node.metadata = metadata;
        }
        if let Some(kind) = update.kind {
            node.kind = kind;
        }
        match update.embedding {
            Some(embedding) => {
                node.embedding = Some(embedding);
                stale = false;
            }
            None if stale => node.embedding = None,
            None => {}
        }

        debug!(node_id = %id, stale, "Updated memory node");
        Ok(if stale {
            UpdateOutcome::EmbeddingStale
        } else {
            UpdateOutcome::Updated
        })
    }

    /// Delete a node and every edge touching it
    pub async fn delete(&self, id: &str) -> bool {
        let removed = self.state.write().await.remove(id).is_some();
        if removed {
            debug!(node_id = %id, "Deleted memory node");
        }
        removed
    }

    /// Ranked retrieval over the levels selected by the query's intent
    pub async fn query(&self, spec: &QuerySpec) -> Vec<QueryHit> {
        let guard = self.state.read().await;
        let state: &MemoryState = &guard;
        let ranker = RetrievalRanker::new(&self.config.ranking, self.similarity.as_ref());
        let candidates = spec
            .levels()
            .into_iter()
            .flat_map(|level| state.level(level).list());
        ranker.rank(candidates, spec, Utc::now())
    }

    /// Boost a node and, at half strength, its direct connections
    pub async fn reinforce(&self, id: &str, boost: f64) -> StrataResult<bool> {
        let mut state = self.state.write().await;
        self.engine.reinforce(&mut state, id, boost)
    }

    /// Nodes reachable within `max_depth` hops, nearest first
    pub async fn related(&self, id: &str, max_depth: usize) -> StrataResult<Vec<MemoryNode>> {
        let state = self.state.read().await;
        if !state.contains(id) {
            return Err(StrataError::not_found(id));
        }
        Ok(state
            .graph()
            .related_within(id, max_depth)
            .iter()
            .filter_map(|other| state.node(other).cloned())
            .collect())
    }

    /// Fewest-hop path between two nodes, endpoints included
    pub async fn shortest_path(&self, from: &str, to: &str) -> Option<Vec<NodeId>> {
        self.state.read().await.graph().shortest_path(from, to)
    }

    pub async fn stats(&self) -> MemoryStats {
        self.state.read().await.stats()
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.is_empty()
    }

    /// Ids currently held by one level
    pub async fn level_ids(&self, level: MemoryLevel) -> Vec<NodeId> {
        self.state.read().await.level(level).ids()
    }

    /// Verify level exclusivity and link consistency
    pub async fn check_invariants(&self) -> Result<(), String> {
        self.state.read().await.check_invariants()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Consolidation
    // ─────────────────────────────────────────────────────────────────────────

    /// Run the passes that are due now
    pub async fn consolidate(&self) -> ConsolidationResult {
        let mut state = self.state.write().await;
        self.engine.run_due(&mut state, Utc::now())
    }

    /// Run all three passes regardless of schedule
    pub async fn consolidate_all(&self) -> ConsolidationResult {
        let mut state = self.state.write().await;
        self.engine.run_all(&mut state, Utc::now())
    }

    pub async fn consolidate_working(&self) -> ConsolidationResult {
        let mut state = self.state.write().await;
        self.engine.working_pass(&mut state, Utc::now())
    }

    pub async fn consolidate_episodic(&self) -> ConsolidationResult {
        let mut state = self.state.write().await;
        self.engine.episodic_pass(&mut state, Utc::now())
    }

    pub async fn consolidate_semantic(&self) -> ConsolidationResult {
        let mut state = self.state.write().await;
        self.engine.semantic_pass(&mut state, Utc::now())
    }

    /// Start background consolidation task
    pub async fn start_background_consolidation(&mut self) {
        if self.shutdown_tx.is_some() {
            return; // Already running
        }

        let (tx, mut rx) = mpsc::channel::<()>(1);
        let state = Arc::clone(&self.state);
        let engine = Arc::clone(&self.engine);
        let tick_secs = self.config.memory.consolidation_tick_secs.max(1);

        let worker = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(tick_secs));
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let mut guard = state.write().await;
                        let result = engine.run_due(&mut guard, Utc::now());
                        if result.has_changes() {
                            info!(
                                affected = result.total_affected(),
                                "Background consolidation applied changes"
                            );
                        }
                    }
                    _ = rx.recv() => break,
                }
            }
        });

        self.shutdown_tx = Some(tx);
        self.worker = Some(worker);
        info!(interval_seconds = tick_secs, "Background consolidation started");
    }

    /// Stop background consolidation task
    pub async fn stop_background_consolidation(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(()).await;
        }
        if let Some(worker) = self.worker.take() {
            let _ = worker.await;
            info!("Background consolidation stopped");
        }
    }

    pub fn is_background_running(&self) -> bool {
        self.worker.is_some()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Snapshots
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn export(&self) -> StrataResult<MemorySnapshot> {
        let state = self.state.read().await;
        snapshot::export(&state, Utc::now())
    }

    /// Insert snapshot nodes at their recorded levels without consolidating
    pub async fn import(&self, snapshot: &MemorySnapshot) -> ImportReport {
        let mut state = self.state.write().await;
        let report = snapshot::import(&mut state, snapshot);
        info!(
            imported = report.imported,
            skipped = report.skipped(),
            "Imported snapshot"
        );
        report
    }

    /// Export and hand the snapshot to a sink, returning the node count
    pub async fn persist(&self, sink: &dyn SnapshotSink) -> StrataResult<usize> {
        let snapshot = self.export().await?;
        sink.save(&snapshot).await?;
        Ok(snapshot.total_nodes)
    }

    /// Import whatever the sink holds; `None` if it is empty
    pub async fn restore(&self, sink: &dyn SnapshotSink) -> StrataResult<Option<ImportReport>> {
        match sink.load().await? {
            Some(snapshot) => Ok(Some(self.import(&snapshot).await)),
            None => Ok(None),
        }
    }
}

impl Drop for HierarchicalMemory {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.abort();
        }
    }
}
