//! Hierarchical Memory Engine
//!
//! Implements a five-level memory architecture:
//! - Working: recent, fast-access notes with a bounded capacity
//! - Episodic: events promoted out of working memory
//! - Semantic: concepts merged from related episodes
//! - Procedural: skills and procedures
//! - Long-term: durable knowledge promoted by importance
//!
//! # Architecture
//!
//! Memory flows upward through consolidation:
//! 1. New nodes start in working memory unless placed explicitly
//! 2. When working memory overflows, the strongest half moves to episodic
//! 3. Related episodes are merged into semantic concepts on an interval
//! 4. Important concepts are promoted to long-term storage
//!
//! Nodes reference each other only by id, through the [`RelationshipGraph`],
//! so deleting a node never leaves a dangling link behind.

mod access;
mod consolidation;
mod embeddings;
mod graph;
mod hierarchical;
mod level_store;
mod ranking;
mod snapshot;
mod state;
mod types;

pub use access::{AccessTracker, DEFAULT_ACCESS_INCREMENT, DEFAULT_HISTORY_CAP};
pub use consolidation::{ConsolidationEngine, DefaultRelatedness, Relatedness, token_overlap};
pub use embeddings::{CosineSimilarity, Similarity, compare, cosine_similarity};
pub use graph::{Edge, Relation, RelationshipGraph};
pub use hierarchical::HierarchicalMemory;
pub use level_store::LevelStore;
pub use ranking::RetrievalRanker;
pub use snapshot::{
    ImportEntryError, ImportReport, JsonFileSink, MemorySnapshot, PassSchedule, SnapshotSink,
};
pub use state::MemoryState;
pub use types::{
    AccessScope, ConsolidationResult, MatchReason, MemoryKind, MemoryLevel, MemoryNode,
    MemoryStats, NewMemory, NodeId, NodeMetadata, NodeUpdate, QueryHit, QueryIntent, QuerySpec,
    UpdateOutcome,
};
