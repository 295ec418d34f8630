//! Snapshot export and import.
//!
//! A snapshot is a plain JSON record: export timestamp, node count, and every
//! node with all of its fields. Levels and kinds serialize as snake_case
//! strings and timestamps as RFC 3339 text, so snapshots sort and diff cleanly.
//!
//! Nodes are kept as raw JSON values so that one bad entry can be rejected on
//! import without losing the rest.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, warn};

use super::state::MemoryState;
use super::types::{MemoryNode, NodeId};
use crate::error::check_unit;
use crate::utils::fixed_rfc3339;
use crate::{StrataError, StrataResult};

/// Serialized engine contents
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemorySnapshot {
    #[serde(with = "fixed_rfc3339")]
    pub exported_at: DateTime<Utc>,
    pub total_nodes: usize,
    pub nodes: Vec<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<PassSchedule>,
    /// Recorded access times per node, oldest first
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub access_history: BTreeMap<NodeId, Vec<DateTime<Utc>>>,
}

/// When the interval passes last ran
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassSchedule {
    #[serde(with = "fixed_rfc3339")]
    pub last_episodic_pass: DateTime<Utc>,
    #[serde(with = "fixed_rfc3339")]
    pub last_semantic_pass: DateTime<Utc>,
}

/// One snapshot entry that could not be imported
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportEntryError {
    /// Position of the entry in `MemorySnapshot::nodes`
    pub index: usize,
    pub id: Option<NodeId>,
    pub message: String,
}

impl std::fmt::Display for ImportEntryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.id {
            Some(id) => write!(f, "entry {} ({}): {}", self.index, id, self.message),
            None => write!(f, "entry {}: {}", self.index, self.message),
        }
    }
}

impl From<ImportEntryError> for StrataError {
    fn from(e: ImportEntryError) -> Self {
        StrataError::ImportEntry {
            index: e.index,
            message: e.message,
        }
    }
}

/// Outcome of an import
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportReport {
    pub imported: usize,
    /// Parent or connection references dropped because their target was absent
    pub dangling_links: usize,
    pub errors: Vec<ImportEntryError>,
}

impl ImportReport {
    pub fn skipped(&self) -> usize {
        self.errors.len()
    }
}

/// Capture every node, ordered by level, then creation time, then id
pub fn export(state: &MemoryState, now: DateTime<Utc>) -> StrataResult<MemorySnapshot> {
    let mut nodes: Vec<&MemoryNode> = state.nodes().collect();
    nodes.sort_by(|a, b| {
        a.level
            .cmp(&b.level)
            .then_with(|| a.created_at.cmp(&b.created_at))
            .then_with(|| a.id.cmp(&b.id))
    });

    let access_history = nodes
        .iter()
        .map(|node| (node.id.clone(), state.tracker().history(&node.id)))
        .filter(|(_, times)| !times.is_empty())
        .collect();
    let nodes = nodes
        .into_iter()
        .map(serde_json::to_value)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(MemorySnapshot {
        exported_at: now,
        total_nodes: nodes.len(),
        nodes,
        schedule: Some(PassSchedule {
            last_episodic_pass: state.last_episodic_pass,
            last_semantic_pass: state.last_semantic_pass,
        }),
        access_history,
    })
}

/// Insert snapshot nodes at their recorded levels.
///
/// Runs in two phases: every valid entry is stored first, then parent and
/// connection links are restored among the nodes that now exist. Children
/// sets are rebuilt from parent links rather than trusted. Access histories
/// are restored for the imported nodes. The pass schedule is only adopted by
/// an empty engine.
pub fn import(state: &mut MemoryState, snapshot: &MemorySnapshot) -> ImportReport {
    let mut report = ImportReport::default();
    if let Some(schedule) = snapshot.schedule.filter(|_| state.is_empty()) {
        state.last_episodic_pass = schedule.last_episodic_pass;
        state.last_semantic_pass = schedule.last_semantic_pass;
    }
    let mut pending: Vec<(NodeId, Option<NodeId>, BTreeMap<NodeId, f64>)> = Vec::new();
    let mut seen: HashSet<NodeId> = HashSet::new();

    for (index, value) in snapshot.nodes.iter().enumerate() {
        let id = value
            .get("id")
            .and_then(serde_json::Value::as_str)
            .map(str::to_string);
        let reject = |message: String| ImportEntryError {
            index,
            id: id.clone(),
            message,
        };

        let mut node: MemoryNode = match serde_json::from_value(value.clone()) {
            Ok(node) => node,
            Err(e) => {
                report.errors.push(reject(e.to_string()));
                continue;
            }
        };
        if let Err(message) = validate_entry(&node) {
            report.errors.push(reject(message));
            continue;
        }
        if !seen.insert(node.id.clone()) || state.contains(&node.id) {
            report.errors.push(reject(format!("duplicate id {}", node.id)));
            continue;
        }

        let parent = node.parent.take();
        let connections = std::mem::take(&mut node.connections);
        node.children.clear();
        let node_id = node.id.clone();

        match state.insert_detached(node) {
            Ok(()) => pending.push((node_id, parent, connections)),
            Err(e) => report.errors.push(reject(e.to_string())),
        }
    }

    for (id, parent, connections) in pending {
        if let Some(times) = snapshot.access_history.get(&id) {
            state.tracker_mut().restore(&id, times.clone());
        }
        if let Some(parent) = parent {
            if state.set_parent(&id, &parent).is_err() {
                debug!(node_id = %id, parent = %parent, "Dropping dangling parent");
                report.dangling_links += 1;
            }
        }
        for (target, weight) in connections {
            if state.connect(&id, &target, weight).is_err() {
                debug!(node_id = %id, target = %target, "Dropping dangling connection");
                report.dangling_links += 1;
            }
        }
        report.imported += 1;
    }

    for error in &report.errors {
        warn!("Skipped snapshot {}", error);
    }
    report
}

fn validate_entry(node: &MemoryNode) -> Result<(), String> {
    if node.id.trim().is_empty() {
        return Err("empty id".into());
    }
    check_unit("metadata.quality", node.metadata.quality).map_err(|e| e.to_string())?;
    for weight in node.connections.values() {
        check_unit("connections", *weight).map_err(|e| e.to_string())?;
    }
    for (field, value) in [
        ("access_frequency", node.access_frequency),
        ("consolidation_score", node.consolidation_score),
    ] {
        if !value.is_finite() || value < 0.0 {
            return Err(format!("{field} must be a non-negative number, got {value}"));
        }
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Sinks
// ─────────────────────────────────────────────────────────────────────────────

/// Durable home for snapshots
#[async_trait]
pub trait SnapshotSink: Send + Sync {
    async fn save(&self, snapshot: &MemorySnapshot) -> StrataResult<()>;

    /// `None` when nothing has been saved yet
    async fn load(&self) -> StrataResult<Option<MemorySnapshot>>;
}

/// Pretty-printed JSON file, replaced atomically on save
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    path: PathBuf,
}

impl JsonFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "snapshot.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl SnapshotSink for JsonFileSink {
    async fn save(&self, snapshot: &MemorySnapshot) -> StrataResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let json = serde_json::to_string_pretty(snapshot)?;
        let temp = self.temp_path();
        fs::write(&temp, json).await?;
        fs::rename(&temp, &self.path).await?;

        debug!(path = %self.path.display(), nodes = snapshot.total_nodes, "Saved snapshot");
        Ok(())
    }

    async fn load(&self) -> StrataResult<Option<MemorySnapshot>> {
        if !fs::try_exists(&self.path).await? {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path).await?;
        let snapshot = serde_json::from_str(&content)?;
        Ok(Some(snapshot))
    }
}
