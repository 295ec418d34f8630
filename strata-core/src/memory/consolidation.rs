//! Memory consolidation.
//!
//! Moves nodes up the level hierarchy and forgets the weakest ones:
//!
//! - **Working → Episodic** when Working outgrows its capacity. The top half by
//!   retention score is promoted; any excess left over is deleted.
//! - **Episodic → Semantic** on an interval. Related episodic nodes are grouped
//!   and each group yields one new Semantic node linked back to its sources.
//! - **Semantic → LongTerm** on a longer interval, for nodes whose importance
//!   clears the configured threshold.
//!
//! Every pass works on the id set captured when it starts and runs entirely
//! under the caller's write guard.

use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::embeddings::{CosineSimilarity, Similarity, compare};
use super::graph::Relation;
use super::state::MemoryState;
use super::types::{ConsolidationResult, MemoryKind, MemoryLevel, MemoryNode, NodeId};
use crate::config::{ConsolidationConfig, StrataConfig};
use crate::utils::half_decay;
use crate::{StrataError, StrataResult};

/// Decides whether two episodic nodes belong in the same group
pub trait Relatedness: Send + Sync {
    fn related(&self, a: &MemoryNode, b: &MemoryNode, similarity: &dyn Similarity) -> bool;
}

impl<F> Relatedness for F
where
    F: Fn(&MemoryNode, &MemoryNode) -> bool + Send + Sync,
{
    fn related(&self, a: &MemoryNode, b: &MemoryNode, _similarity: &dyn Similarity) -> bool {
        self(a, b)
    }
}

/// Direct connection, shared tag, similar embedding, or overlapping tokens
#[derive(Debug, Clone)]
pub struct DefaultRelatedness {
    pub embedding_threshold: f32,
    pub token_overlap_threshold: f64,
}

impl DefaultRelatedness {
    pub fn new(config: &ConsolidationConfig) -> Self {
        Self {
            embedding_threshold: config.embedding_similarity_threshold,
            token_overlap_threshold: config.token_overlap_threshold,
        }
    }
}

impl Default for DefaultRelatedness {
    fn default() -> Self {
        Self::new(&ConsolidationConfig::default())
    }
}

impl Relatedness for DefaultRelatedness {
    fn related(&self, a: &MemoryNode, b: &MemoryNode, similarity: &dyn Similarity) -> bool {
        if a.connections.contains_key(&b.id) || b.connections.contains_key(&a.id) {
            return true;
        }
        if !a.metadata.tags.is_disjoint(&b.metadata.tags) {
            return true;
        }
        let similar = compare(similarity, a.embedding.as_deref(), b.embedding.as_deref())
            .is_some_and(|s| s > self.embedding_threshold);
        if similar {
            return true;
        }
        token_overlap(&a.content, &b.content) > self.token_overlap_threshold
    }
}

/// Jaccard overlap of whitespace-split, lowercased tokens
pub fn token_overlap(a: &str, b: &str) -> f64 {
    let a_lower = a.to_lowercase();
    let b_lower = b.to_lowercase();
    let a_words: HashSet<&str> = a_lower.split_whitespace().collect();
    let b_words: HashSet<&str> = b_lower.split_whitespace().collect();

    if a_words.is_empty() || b_words.is_empty() {
        return 0.0;
    }

    let intersection = a_words.intersection(&b_words).count();
    let union = a_words.union(&b_words).count();
    intersection as f64 / union as f64
}

/// Non-finite or out-of-range numbers make a node unusable for scoring
fn is_malformed(node: &MemoryNode) -> bool {
    !node.access_frequency.is_finite()
        || !node.consolidation_score.is_finite()
        || !node.metadata.quality.is_finite()
        || !(0.0..=1.0).contains(&node.metadata.quality)
}

/// Runs the consolidation passes over a [`MemoryState`]
#[derive(Clone)]
pub struct ConsolidationEngine {
    config: ConsolidationConfig,
    max_working_size: usize,
    similarity: Arc<dyn Similarity>,
    relatedness: Arc<dyn Relatedness>,
}

impl ConsolidationEngine {
    pub fn new(config: &StrataConfig) -> Self {
        Self {
            config: config.consolidation.clone(),
            max_working_size: config.memory.max_working_size,
            similarity: Arc::new(CosineSimilarity),
            relatedness: Arc::new(DefaultRelatedness::new(&config.consolidation)),
        }
    }

    pub fn with_similarity(mut self, similarity: Arc<dyn Similarity>) -> Self {
        self.similarity = similarity;
        self
    }

    pub fn with_relatedness(mut self, relatedness: Arc<dyn Relatedness>) -> Self {
        self.relatedness = relatedness;
        self
    }

    pub fn config(&self) -> &ConsolidationConfig {
        &self.config
    }

    pub fn max_working_size(&self) -> usize {
        self.max_working_size
    }

    /// Working retention score: access, 7-day recency, quality, connections.
    ///
    /// Reinforcement credit held in `consolidation_score` is added on top.
    pub fn working_score(&self, node: &MemoryNode, now: DateTime<Utc>) -> f64 {
        0.4 * node.access_frequency
            + 0.3 * half_decay(
                node.last_accessed,
                now,
                self.config.working_recency_half_life_days,
            )
            + 0.2 * node.metadata.quality
            + 0.1 * node.avg_connection_weight()
            + node.consolidation_score
    }

    /// Importance of a semantic node for long-term promotion
    pub fn importance(
        &self,
        state: &MemoryState,
        node: &MemoryNode,
        centrality: f64,
        now: DateTime<Utc>,
    ) -> f64 {
        let frequency = state
            .tracker()
            .frequency_over_recorded_span(&node.id, now);
        let length = node.content.chars().count() as f64;

        0.4 * (frequency / 10.0).min(1.0)
            + 0.3 * node.metadata.quality
            + 0.2 * centrality.min(1.0)
            + 0.1 * (length / 1000.0).min(1.0)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Passes
    // ─────────────────────────────────────────────────────────────────────────

    /// Promote the top half of an over-capacity Working level, then forget
    /// the lowest-scoring nodes still above capacity
    pub fn working_pass(&self, state: &mut MemoryState, now: DateTime<Utc>) -> ConsolidationResult {
        let started = Instant::now();
        let mut result = ConsolidationResult::default();

        let ids = state.level(MemoryLevel::Working).ids();
        if ids.len() <= self.max_working_size {
            return result;
        }

        let mut scored: Vec<(NodeId, f64)> = Vec::with_capacity(ids.len());
        for id in ids {
            match state.node(&id) {
                Some(node) if !is_malformed(node) => {
                    let score = self.working_score(node, now);
                    scored.push((id, score));
                }
                Some(_) => {
                    warn!(node_id = %id, "Skipping malformed working node");
                    result.skipped += 1;
                }
                None => result.skipped += 1,
            }
        }

        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        let promote_count = scored.len() / 2;

        for (id, score) in &scored[..promote_count] {
            match state.move_to(id, MemoryLevel::Episodic) {
                Ok(()) => {
                    debug!(node_id = %id, score, "Promoted to episodic");
                    result.promoted.push(id.clone());
                }
                Err(e) => {
                    warn!("Failed to promote {}: {}", id, e);
                    result.errors.push(format!("promote {id}: {e}"));
                }
            }
        }

        let remaining = state.level(MemoryLevel::Working).len();
        if remaining > self.max_working_size {
            let excess = remaining - self.max_working_size;
            for (id, score) in scored[promote_count..].iter().rev().take(excess) {
                if state.remove(id).is_some() {
                    debug!(node_id = %id, score, "Forgot working node");
                    result.forgotten.push(id.clone());
                }
            }
        }

        // Skipped nodes still occupy Working but are never forgotten
        let remaining = state.level(MemoryLevel::Working).len();
        if remaining > self.max_working_size {
            warn!(
                remaining,
                capacity = self.max_working_size,
                skipped = result.skipped,
                "Working memory still over capacity after consolidation"
            );
            result.errors.push(format!(
                "working memory holds {remaining} nodes, over its capacity of {}, \
                 because {} malformed nodes were skipped",
                self.max_working_size, result.skipped
            ));
        }

        result.duration_ms = started.elapsed().as_millis() as u64;
        info!(
            promoted = result.promoted.len(),
            forgotten = result.forgotten.len(),
            skipped = result.skipped,
            "Working consolidation complete"
        );
        result
    }

    /// Group related episodic nodes and create one semantic node per group
    pub fn episodic_pass(
        &self,
        state: &mut MemoryState,
        now: DateTime<Utc>,
    ) -> ConsolidationResult {
        let started = Instant::now();
        let mut result = ConsolidationResult::default();

        let mut nodes = Vec::new();
        for id in state.level(MemoryLevel::Episodic).ids() {
            match state.node(&id) {
                Some(node) if !is_malformed(node) => nodes.push(node.clone()),
                Some(_) => {
                    warn!(node_id = %id, "Skipping malformed episodic node");
                    result.skipped += 1;
                }
                None => result.skipped += 1,
            }
        }

        let min_size = self.config.min_group_size.max(2);
        for group in self.group(&nodes) {
            if group.len() < min_size {
                continue;
            }
            let members: Vec<&MemoryNode> = group.iter().map(|&i| &nodes[i]).collect();
            match self.merge(state, &members, now) {
                Ok(merged_id) => {
                    debug!(node_id = %merged_id, sources = members.len(), "Merged episodic group");
                    result.merged.push(merged_id);
                    if self.config.forget_merged_sources {
                        for member in &members {
                            if state.remove(&member.id).is_some() {
                                result.forgotten.push(member.id.clone());
                            }
                        }
                    }
                }
                Err(e) => {
                    warn!("Failed to merge episodic group: {}", e);
                    result.errors.push(format!("merge: {e}"));
                }
            }
        }

        state.last_episodic_pass = now;
        result.duration_ms = started.elapsed().as_millis() as u64;
        info!(
            merged = result.merged.len(),
            forgotten = result.forgotten.len(),
            skipped = result.skipped,
            "Episodic consolidation complete"
        );
        result
    }

    /// Promote semantic nodes whose importance meets the threshold
    pub fn semantic_pass(
        &self,
        state: &mut MemoryState,
        now: DateTime<Utc>,
    ) -> ConsolidationResult {
        let started = Instant::now();
        let mut result = ConsolidationResult::default();
        let centrality = state.graph().degree_centrality();

        for id in state.level(MemoryLevel::Semantic).ids() {
            let importance = match state.node(&id) {
                Some(node) if !is_malformed(node) => {
                    let c = centrality.get(&id).copied().unwrap_or(0.0);
                    self.importance(state, node, c, now)
                }
                Some(_) => {
                    warn!(node_id = %id, "Skipping malformed semantic node");
                    result.skipped += 1;
                    continue;
                }
                None => {
                    result.skipped += 1;
                    continue;
                }
            };

            if importance < self.config.importance_threshold {
                continue;
            }
            match state.move_to(&id, MemoryLevel::LongTerm) {
                Ok(()) => {
                    debug!(node_id = %id, importance, "Promoted to long-term");
                    result.promoted.push(id);
                }
                Err(e) => {
                    warn!("Failed to promote {}: {}", id, e);
                    result.errors.push(format!("promote {id}: {e}"));
                }
            }
        }

        state.last_semantic_pass = now;
        result.duration_ms = started.elapsed().as_millis() as u64;
        info!(
            promoted = result.promoted.len(),
            skipped = result.skipped,
            "Semantic consolidation complete"
        );
        result
    }

    /// Run the size-triggered pass plus any interval pass that is due
    pub fn run_due(&self, state: &mut MemoryState, now: DateTime<Utc>) -> ConsolidationResult {
        let mut result = self.working_pass(state, now);

        if self.is_due(state.last_episodic_pass, self.config.episodic_interval_secs, now) {
            result.absorb(self.episodic_pass(state, now));
        }
        if self.is_due(state.last_semantic_pass, self.config.semantic_interval_secs, now) {
            result.absorb(self.semantic_pass(state, now));
        }
        result
    }

    /// Run all three passes in level order regardless of schedule
    pub fn run_all(&self, state: &mut MemoryState, now: DateTime<Utc>) -> ConsolidationResult {
        let mut result = self.working_pass(state, now);
        result.absorb(self.episodic_pass(state, now));
        result.absorb(self.semantic_pass(state, now));
        result
    }

    fn is_due(&self, last: DateTime<Utc>, interval_secs: u64, now: DateTime<Utc>) -> bool {
        (now - last).num_seconds() >= i64::try_from(interval_secs).unwrap_or(i64::MAX)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Reinforcement
    // ─────────────────────────────────────────────────────────────────────────

    /// Boost a node and, at half strength, its direct connections.
    ///
    /// Returns `false` when the node does not exist.
    pub fn reinforce(&self, state: &mut MemoryState, id: &str, boost: f64) -> StrataResult<bool> {
        if !boost.is_finite() || boost < 0.0 {
            return Err(StrataError::invalid_operation(format!(
                "reinforcement boost must be a non-negative number, got {boost}"
            )));
        }
        if !state.contains(id) {
            return Ok(false);
        }

        // (access_frequency, consolidation_score) after the boost, per node
        let mut next: BTreeMap<NodeId, (f64, f64)> = BTreeMap::new();
        let bumps = std::iter::once((id.to_string(), boost, boost)).chain(
            state
                .graph()
                .neighbors(id, Some(Relation::Connection))
                .into_iter()
                .map(|neighbor| (neighbor, 0.0, 0.5 * boost)),
        );
        for (target, access, score) in bumps {
            let Some(node) = state.node(&target) else {
                continue;
            };
            let entry = next
                .entry(target)
                .or_insert((node.access_frequency, node.consolidation_score));
            entry.0 += access;
            entry.1 += score;
        }

        if let Some(target) = next
            .iter()
            .find(|(_, (access, score))| !access.is_finite() || !score.is_finite())
            .map(|(target, _)| target)
        {
            return Err(StrataError::invalid_operation(format!(
                "reinforcing {id} by {boost} would overflow the scores of {target}"
            )));
        }

        for (target, (access, score)) in next {
            if let Some(node) = state.node_mut(&target) {
                node.access_frequency = access;
                node.consolidation_score = score;
            }
        }
        debug!(node_id = %id, boost, "Reinforced node");
        Ok(true)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Grouping
    // ─────────────────────────────────────────────────────────────────────────

    /// Transitive closure of the relatedness relation, as index groups
    fn group(&self, nodes: &[MemoryNode]) -> Vec<Vec<usize>> {
        let mut assigned = vec![false; nodes.len()];
        let mut groups = Vec::new();

        for start in 0..nodes.len() {
            if assigned[start] {
                continue;
            }
            assigned[start] = true;
            let mut group = vec![start];
            let mut queue = VecDeque::from([start]);

            while let Some(current) = queue.pop_front() {
                for other in 0..nodes.len() {
                    if assigned[other] {
                        continue;
                    }
                    if self
                        .relatedness
                        .related(&nodes[current], &nodes[other], self.similarity.as_ref())
                    {
                        assigned[other] = true;
                        group.push(other);
                        queue.push_back(other);
                    }
                }
            }
            groups.push(group);
        }
        groups
    }

    /// Create the semantic node for one group and link it to every source
    fn merge(
        &self,
        state: &mut MemoryState,
        members: &[&MemoryNode],
        now: DateTime<Utc>,
    ) -> StrataResult<NodeId> {
        let mut ordered = members.to_vec();
        ordered.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));

        let content = ordered
            .iter()
            .map(|n| n.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        let mut merged = MemoryNode::new(content, MemoryLevel::Semantic, MemoryKind::Concept);
        merged.created_at = now;
        merged.last_accessed = now;
        merged.metadata.tags = ordered
            .iter()
            .flat_map(|n| n.metadata.tags.iter().cloned())
            .collect::<BTreeSet<_>>();
        merged.metadata.quality =
            ordered.iter().map(|n| n.metadata.quality).sum::<f64>() / ordered.len() as f64;
        let categories: BTreeSet<&str> = ordered
            .iter()
            .filter_map(|n| n.metadata.category.as_deref())
            .collect();
        if categories.len() == 1 {
            merged.metadata.category = categories.into_iter().next().map(str::to_string);
        }

        let merged_id = merged.id.clone();
        state.insert_detached(merged)?;
        for member in &ordered {
            state.connect_mutual(&merged_id, &member.id, self.config.merge_connection_weight)?;
        }
        Ok(merged_id)
    }
}
