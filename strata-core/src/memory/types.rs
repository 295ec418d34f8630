//! Memory Type Definitions
//!
//! Defines the core types for the leveled memory engine.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque node identifier (UUID v4 text)
pub type NodeId = String;

/// Memory level, ordered by increasing permanence
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryLevel {
    Working,
    Episodic,
    Semantic,
    Procedural,
    LongTerm,
}

impl MemoryLevel {
    /// Every level, in index order
    pub const ALL: [MemoryLevel; 5] = [
        Self::Working,
        Self::Episodic,
        Self::Semantic,
        Self::Procedural,
        Self::LongTerm,
    ];

    /// Convert to string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Working => "working",
            Self::Episodic => "episodic",
            Self::Semantic => "semantic",
            Self::Procedural => "procedural",
            Self::LongTerm => "long_term",
        }
    }

    /// Position in [`MemoryLevel::ALL`]
    pub fn index(&self) -> usize {
        *self as usize
    }

    /// Next level on the linear promotion chain.
    ///
    /// Procedural sits beside the chain and LongTerm ends it.
    pub fn next(&self) -> Option<Self> {
        match self {
            Self::Working => Some(Self::Episodic),
            Self::Episodic => Some(Self::Semantic),
            Self::Semantic => Some(Self::LongTerm),
            Self::Procedural | Self::LongTerm => None,
        }
    }

    /// Retrieval priority: favors immediacy over permanence
    pub fn priority(&self) -> f64 {
        match self {
            Self::Working => 1.0,
            Self::Episodic => 0.8,
            Self::Procedural => 0.7,
            Self::Semantic => 0.6,
            Self::LongTerm => 0.5,
        }
    }
}

impl std::str::FromStr for MemoryLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "working" => Ok(Self::Working),
            "episodic" => Ok(Self::Episodic),
            "semantic" => Ok(Self::Semantic),
            "procedural" => Ok(Self::Procedural),
            "long_term" => Ok(Self::LongTerm),
            other => Err(format!("unknown memory level: {other}")),
        }
    }
}

impl std::fmt::Display for MemoryLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Memory classification, used for filtering and grouping only
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryKind {
    Fact,
    Procedure,
    Concept,
    Experience,
    Skill,
    Reflection,
    Pattern,
    Relationship,
}

impl MemoryKind {
    pub const ALL: [MemoryKind; 8] = [
        Self::Fact,
        Self::Procedure,
        Self::Concept,
        Self::Experience,
        Self::Skill,
        Self::Reflection,
        Self::Pattern,
        Self::Relationship,
    ];

    /// Convert to string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fact => "fact",
            Self::Procedure => "procedure",
            Self::Concept => "concept",
            Self::Experience => "experience",
            Self::Skill => "skill",
            Self::Reflection => "reflection",
            Self::Pattern => "pattern",
            Self::Relationship => "relationship",
        }
    }

    /// Kinds that live in the procedural branch
    pub fn is_procedural(&self) -> bool {
        matches!(self, Self::Procedure | Self::Skill)
    }
}

impl std::str::FromStr for MemoryKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown memory kind: {s}"))
    }
}

impl std::fmt::Display for MemoryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Who may see a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessScope {
    #[default]
    Private,
    Shared,
    Public,
}

/// Node metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeMetadata {
    pub tags: BTreeSet<String>,
    pub category: Option<String>,
    pub scope: AccessScope,
    /// Quality score in [0, 1]
    pub quality: f64,
}

impl Default for NodeMetadata {
    fn default() -> Self {
        Self {
            tags: BTreeSet::new(),
            category: None,
            scope: AccessScope::default(),
            quality: 0.5,
        }
    }
}

/// The atomic record held by a level store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryNode {
    pub id: NodeId,
    pub content: String,
    pub level: MemoryLevel,
    pub kind: MemoryKind,
    #[serde(default)]
    pub metadata: NodeMetadata,
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
    #[serde(default)]
    pub parent: Option<NodeId>,
    #[serde(default)]
    pub children: BTreeSet<NodeId>,
    /// Related node id -> strength in [0, 1]
    #[serde(default)]
    pub connections: BTreeMap<NodeId, f64>,
    #[serde(default)]
    pub consolidation_score: f64,
    #[serde(default)]
    pub access_frequency: f64,
    #[serde(with = "crate::utils::fixed_rfc3339")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "crate::utils::fixed_rfc3339")]
    pub last_accessed: DateTime<Utc>,
}

impl MemoryNode {
    /// Create a detached node with a fresh id
    pub fn new(content: impl Into<String>, level: MemoryLevel, kind: MemoryKind) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            content: content.into(),
            level,
            kind,
            metadata: NodeMetadata::default(),
            embedding: None,
            parent: None,
            children: BTreeSet::new(),
            connections: BTreeMap::new(),
            consolidation_score: 0.0,
            access_frequency: 0.0,
            created_at: now,
            last_accessed: now,
        }
    }

    /// Mean connection weight, 0.0 when unconnected
    pub fn avg_connection_weight(&self) -> f64 {
        if self.connections.is_empty() {
            return 0.0;
        }
        self.connections.values().sum::<f64>() / self.connections.len() as f64
    }

    /// Check if the node carries a tag
    pub fn has_tag(&self, tag: &str) -> bool {
        self.metadata.tags.contains(tag)
    }
}

/// Input for adding a node
#[derive(Debug, Clone)]
pub struct NewMemory {
    pub content: String,
    pub level: MemoryLevel,
    pub kind: MemoryKind,
    pub metadata: NodeMetadata,
    pub parent: Option<NodeId>,
    pub connections: BTreeMap<NodeId, f64>,
    pub embedding: Option<Vec<f32>>,
}

impl NewMemory {
    /// Working-level fact with default metadata
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            level: MemoryLevel::Working,
            kind: MemoryKind::Fact,
            metadata: NodeMetadata::default(),
            parent: None,
            connections: BTreeMap::new(),
            embedding: None,
        }
    }

    pub fn level(mut self, level: MemoryLevel) -> Self {
        self.level = level;
        self
    }

    pub fn kind(mut self, kind: MemoryKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.metadata.tags.insert(tag.into());
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.metadata.category = Some(category.into());
        self
    }

    pub fn quality(mut self, quality: f64) -> Self {
        self.metadata.quality = quality;
        self
    }

    pub fn scope(mut self, scope: AccessScope) -> Self {
        self.metadata.scope = scope;
        self
    }

    pub fn parent(mut self, parent: impl Into<NodeId>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn connect(mut self, id: impl Into<NodeId>, weight: f64) -> Self {
        self.connections.insert(id.into(), weight);
        self
    }

    pub fn embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }
}

/// Partial update for an existing node
#[derive(Debug, Clone, Default)]
pub struct NodeUpdate {
    pub content: Option<String>,
    pub metadata: Option<NodeMetadata>,
    pub kind: Option<MemoryKind>,
    /// Replacement embedding, typically resupplied after [`UpdateOutcome::EmbeddingStale`]
    pub embedding: Option<Vec<f32>>,
}

impl NodeUpdate {
    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn metadata(mut self, metadata: NodeMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn kind(mut self, kind: MemoryKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }
}

/// Outcome of an update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// No node with that id
    Missing,
    /// Fields applied, embedding still valid
    Updated,
    /// Content changed and the embedding was cleared; the caller must resupply it
    EmbeddingStale,
}

impl UpdateOutcome {
    /// Whether the update touched a node
    pub fn applied(&self) -> bool {
        !matches!(self, Self::Missing)
    }
}

/// Retrieval intent hint, used to scope which levels are searched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryIntent {
    /// Infer from the query text
    #[default]
    Auto,
    General,
    Temporal,
    Conceptual,
    Procedural,
}

const TEMPORAL_CUES: &[&str] = &[
    "when", "recent", "recently", "yesterday", "today", "ago", "last", "earlier", "before",
    "after",
];
const PROCEDURAL_CUES: &[&str] = &["how to", "how do", "steps", "procedure", "workflow"];
const CONCEPTUAL_CUES: &[&str] = &[
    "what is", "what are", "why", "explain", "concept", "definition", "meaning",
];

impl QueryIntent {
    /// Keyword heuristic over the query text
    pub fn infer(text: &str) -> Self {
        let lower = text.to_lowercase();
        let words: BTreeSet<&str> = lower.split_whitespace().collect();

        if PROCEDURAL_CUES.iter().any(|cue| lower.contains(cue)) {
            Self::Procedural
        } else if CONCEPTUAL_CUES
            .iter()
            .any(|cue| if cue.contains(' ') { lower.contains(cue) } else { words.contains(cue) })
        {
            Self::Conceptual
        } else if TEMPORAL_CUES.iter().any(|cue| words.contains(cue)) {
            Self::Temporal
        } else {
            Self::General
        }
    }
}

/// A retrieval request
#[derive(Debug, Clone)]
pub struct QuerySpec {
    pub text: String,
    pub embedding: Option<Vec<f32>>,
    pub kind: Option<MemoryKind>,
    pub category: Option<String>,
    pub tags: BTreeSet<String>,
    pub limit: usize,
    pub intent: QueryIntent,
    /// Search every level regardless of intent
    pub comprehensive: bool,
}

impl Default for QuerySpec {
    fn default() -> Self {
        Self {
            text: String::new(),
            embedding: None,
            kind: None,
            category: None,
            tags: BTreeSet::new(),
            limit: 10,
            intent: QueryIntent::Auto,
            comprehensive: false,
        }
    }
}

impl QuerySpec {
    /// Free-text query with default options
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    pub fn kind(mut self, kind: MemoryKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn intent(mut self, intent: QueryIntent) -> Self {
        self.intent = intent;
        self
    }

    pub fn comprehensive(mut self) -> Self {
        self.comprehensive = true;
        self
    }

    /// No text, filters, or embedding: every node in scope qualifies
    pub fn is_browse(&self) -> bool {
        self.text.trim().is_empty()
            && self.embedding.is_none()
            && self.kind.is_none()
            && self.category.is_none()
            && self.tags.is_empty()
    }

    /// Levels searched for this query
    pub fn levels(&self) -> Vec<MemoryLevel> {
        if self.comprehensive {
            return MemoryLevel::ALL.to_vec();
        }

        let intent = match self.intent {
            QueryIntent::Auto => QueryIntent::infer(&self.text),
            explicit => explicit,
        };

        let mut levels = vec![MemoryLevel::Working];
        match intent {
            QueryIntent::Temporal => levels.push(MemoryLevel::Episodic),
            QueryIntent::Conceptual => {
                levels.push(MemoryLevel::Semantic);
                levels.push(MemoryLevel::LongTerm);
            }
            QueryIntent::Procedural => levels.push(MemoryLevel::Procedural),
            QueryIntent::Auto | QueryIntent::General => {}
        }
        if self.kind.is_some_and(|k| k.is_procedural()) && !levels.contains(&MemoryLevel::Procedural)
        {
            levels.push(MemoryLevel::Procedural);
        }
        levels
    }
}

/// Why a node qualified for a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchReason {
    Text,
    Embedding,
    Filter,
    Browse,
}

impl std::fmt::Display for MatchReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Text => "text match",
            Self::Embedding => "embedding similarity",
            Self::Filter => "filter match",
            Self::Browse => "browse",
        };
        write!(f, "{s}")
    }
}

/// Ranked retrieval result
#[derive(Debug, Clone, Serialize)]
pub struct QueryHit {
    pub node: MemoryNode,
    pub relevance: f64,
    pub reason: MatchReason,
}

/// Result from a consolidation pass (or several, merged)
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConsolidationResult {
    /// Nodes moved to a higher level
    pub promoted: Vec<NodeId>,
    /// Nodes deleted by forgetting
    pub forgotten: Vec<NodeId>,
    /// New semantic nodes created from related groups
    pub merged: Vec<NodeId>,
    /// Nodes skipped as malformed
    pub skipped: usize,
    /// Non-fatal errors encountered
    pub errors: Vec<String>,
    pub duration_ms: u64,
}

impl ConsolidationResult {
    /// Check if any work was done
    pub fn has_changes(&self) -> bool {
        !self.promoted.is_empty() || !self.forgotten.is_empty() || !self.merged.is_empty()
    }

    /// Total nodes affected
    pub fn total_affected(&self) -> usize {
        self.promoted.len() + self.forgotten.len() + self.merged.len()
    }

    /// Fold another pass into this result
    pub fn absorb(&mut self, other: ConsolidationResult) {
        self.promoted.extend(other.promoted);
        self.forgotten.extend(other.forgotten);
        self.merged.extend(other.merged);
        self.skipped += other.skipped;
        self.errors.extend(other.errors);
        self.duration_ms += other.duration_ms;
    }
}

/// Memory statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryStats {
    pub total_nodes: usize,
    pub total_edges: usize,
    pub count_by_level: BTreeMap<String, usize>,
    pub count_by_kind: BTreeMap<String, usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_conversion() {
        assert_eq!("long_term".parse::<MemoryLevel>(), Ok(MemoryLevel::LongTerm));
        assert_eq!(MemoryLevel::Episodic.as_str(), "episodic");
        assert!("short".parse::<MemoryLevel>().is_err());
        for level in MemoryLevel::ALL {
            assert_eq!(MemoryLevel::ALL[level.index()], level);
        }
    }

    #[test]
    fn test_promotion_chain() {
        assert_eq!(MemoryLevel::Working.next(), Some(MemoryLevel::Episodic));
        assert_eq!(MemoryLevel::Episodic.next(), Some(MemoryLevel::Semantic));
        assert_eq!(MemoryLevel::Semantic.next(), Some(MemoryLevel::LongTerm));
        assert_eq!(MemoryLevel::Procedural.next(), None);
        assert_eq!(MemoryLevel::LongTerm.next(), None);
    }

    #[test]
    fn test_kind_conversion() {
        for kind in MemoryKind::ALL {
            assert_eq!(kind.as_str().parse::<MemoryKind>(), Ok(kind));
        }
        assert!("gotcha".parse::<MemoryKind>().is_err());
    }

    #[test]
    fn test_serialized_level_and_kind_are_strings() {
        let node = MemoryNode::new("x", MemoryLevel::LongTerm, MemoryKind::Skill);
        let value = serde_json::to_value(&node).unwrap();
        assert_eq!(value["level"], "long_term");
        assert_eq!(value["kind"], "skill");
        assert!(value["created_at"].is_string());
    }

    #[test]
    fn test_node_timestamps_sort_as_text() {
        let mut early = MemoryNode::new("a", MemoryLevel::Working, MemoryKind::Fact);
        early.created_at = chrono::DateTime::parse_from_rfc3339("2024-03-01T08:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let mut late = early.clone();
        late.created_at = early.created_at + chrono::Duration::microseconds(1);

        let early_text = serde_json::to_value(&early).unwrap()["created_at"].clone();
        let late_text = serde_json::to_value(&late).unwrap()["created_at"].clone();
        assert_eq!(early_text, "2024-03-01T08:00:00.000000000Z");
        assert!(early_text.as_str().unwrap() < late_text.as_str().unwrap());

        let back: MemoryNode = serde_json::from_value(serde_json::to_value(&late).unwrap()).unwrap();
        assert_eq!(back.created_at, late.created_at);
    }

    #[test]
    fn test_intent_inference() {
        assert_eq!(QueryIntent::infer("how to deploy the service"), QueryIntent::Procedural);
        assert_eq!(QueryIntent::infer("what is a monad"), QueryIntent::Conceptual);
        assert_eq!(QueryIntent::infer("what happened yesterday"), QueryIntent::Temporal);
        assert_eq!(QueryIntent::infer("fibonacci"), QueryIntent::General);
    }

    #[test]
    fn test_query_level_scoping() {
        assert_eq!(QuerySpec::text("fibonacci").levels(), vec![MemoryLevel::Working]);
        assert_eq!(
            QuerySpec::text("x").intent(QueryIntent::Temporal).levels(),
            vec![MemoryLevel::Working, MemoryLevel::Episodic]
        );
        assert_eq!(
            QuerySpec::text("x").intent(QueryIntent::Conceptual).levels(),
            vec![MemoryLevel::Working, MemoryLevel::Semantic, MemoryLevel::LongTerm]
        );
        assert!(QuerySpec::text("x")
            .kind(MemoryKind::Skill)
            .levels()
            .contains(&MemoryLevel::Procedural));
        assert_eq!(QuerySpec::text("x").comprehensive().levels().len(), 5);
    }

    #[test]
    fn test_avg_connection_weight() {
        let mut node = MemoryNode::new("x", MemoryLevel::Working, MemoryKind::Fact);
        assert_eq!(node.avg_connection_weight(), 0.0);
        node.connections.insert("a".into(), 0.2);
        node.connections.insert("b".into(), 0.6);
        assert!((node.avg_connection_weight() - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_update_outcome() {
        assert!(!UpdateOutcome::Missing.applied());
        assert!(UpdateOutcome::Updated.applied());
        assert!(UpdateOutcome::EmbeddingStale.applied());
    }
}
