//! CLI argument definitions using clap derive macros.
//!
//! Every command operates on one JSON snapshot file.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use strata_core::memory::{MemoryKind, MemoryLevel, QueryIntent};

/// Strata memory engine CLI
///
/// Store, query and consolidate leveled memory nodes kept in a snapshot file.
#[derive(Parser, Debug)]
#[command(name = "strata")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Snapshot file to operate on (overrides config and STRATA_SNAPSHOT)
    #[arg(long, global = true)]
    pub snapshot: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Add a memory node
    Add(AddArgs),

    /// Show a node (records an access)
    Get {
        /// Node ID
        id: String,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Update a node's content, kind or metadata
    Update(UpdateArgs),

    /// Delete a node and its edges
    Delete {
        /// Node ID
        id: String,
    },

    /// Ranked retrieval
    Query(QueryArgs),

    /// List nodes reachable from a node
    Related {
        /// Node ID
        id: String,

        /// Maximum hops to follow
        #[arg(short, long, default_value = "2")]
        depth: usize,
    },

    /// Boost a node and its direct connections
    Reinforce {
        /// Node ID
        id: String,

        /// Amount added to the node's scores
        #[arg(short, long, default_value = "0.1")]
        boost: f64,
    },

    /// Run consolidation passes
    Consolidate {
        /// Which passes to run
        #[arg(short, long, value_enum, default_value = "due")]
        pass: ConsolidationPass,
    },

    /// Show node and edge counts
    Stats {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Write the current snapshot to a file
    Export {
        /// Destination file
        file: PathBuf,
    },

    /// Import nodes from a snapshot file
    Import {
        /// Source file
        file: PathBuf,
    },

    /// Show version
    Version,
}

// ─────────────────────────────────────────────────────────────────────────────
// Node Commands
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Args, Debug)]
pub struct AddArgs {
    /// Node content
    pub content: String,

    /// Level: working, episodic, semantic, procedural, long_term
    #[arg(short, long, default_value = "working")]
    pub level: MemoryLevel,

    /// Kind: fact, procedure, concept, experience, skill, reflection, pattern, relationship
    #[arg(short, long, default_value = "fact")]
    pub kind: MemoryKind,

    /// Tags for categorization
    #[arg(short = 'T', long = "tag", action = clap::ArgAction::Append)]
    pub tags: Vec<String>,

    /// Category
    #[arg(short, long)]
    pub category: Option<String>,

    /// Quality score (0.0 - 1.0)
    #[arg(short, long)]
    pub quality: Option<f64>,

    /// Parent node ID
    #[arg(short, long)]
    pub parent: Option<String>,

    /// Connection as ID=WEIGHT (repeatable)
    #[arg(long = "connect", value_parser = parse_connection, action = clap::ArgAction::Append)]
    pub connections: Vec<(String, f64)>,

    /// Pre-computed embedding, comma separated
    #[arg(long, value_delimiter = ',')]
    pub embedding: Vec<f32>,
}

#[derive(Args, Debug)]
pub struct UpdateArgs {
    /// Node ID
    pub id: String,

    /// New content
    #[arg(long)]
    pub content: Option<String>,

    /// New kind
    #[arg(short, long)]
    pub kind: Option<MemoryKind>,

    /// Replacement tags (repeatable)
    #[arg(short = 'T', long = "tag", action = clap::ArgAction::Append)]
    pub tags: Vec<String>,

    /// New category
    #[arg(short, long)]
    pub category: Option<String>,

    /// New quality score (0.0 - 1.0)
    #[arg(short, long)]
    pub quality: Option<f64>,

    /// Replacement embedding, comma separated
    #[arg(long, value_delimiter = ',')]
    pub embedding: Vec<f32>,
}

#[derive(Args, Debug)]
pub struct QueryArgs {
    /// Text to search for (empty lists everything in scope)
    #[arg(default_value = "")]
    pub text: String,

    /// Filter by kind
    #[arg(short, long)]
    pub kind: Option<MemoryKind>,

    /// Filter by category
    #[arg(short, long)]
    pub category: Option<String>,

    /// Filter by tag (repeatable)
    #[arg(short = 'T', long = "tag", action = clap::ArgAction::Append)]
    pub tags: Vec<String>,

    /// Maximum results
    #[arg(short, long, default_value = "10")]
    pub limit: usize,

    /// Which levels to search; inferred from the text by default
    #[arg(short, long, value_enum, default_value = "auto")]
    pub intent: IntentArg,

    /// Search every level
    #[arg(short, long)]
    pub all: bool,

    /// Query embedding, comma separated
    #[arg(long, value_delimiter = ',')]
    pub embedding: Vec<f32>,

    /// Print as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentArg {
    Auto,
    General,
    Temporal,
    Conceptual,
    Procedural,
}

impl From<IntentArg> for QueryIntent {
    fn from(intent: IntentArg) -> Self {
        match intent {
            IntentArg::Auto => QueryIntent::Auto,
            IntentArg::General => QueryIntent::General,
            IntentArg::Temporal => QueryIntent::Temporal,
            IntentArg::Conceptual => QueryIntent::Conceptual,
            IntentArg::Procedural => QueryIntent::Procedural,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsolidationPass {
    /// Every pass, in level order
    All,
    /// Size trigger plus interval passes that are due
    Due,
    Working,
    Episodic,
    Semantic,
}

/// Parse `ID=WEIGHT`
fn parse_connection(s: &str) -> Result<(String, f64), String> {
    let (id, weight) = s
        .rsplit_once('=')
        .ok_or_else(|| format!("expected ID=WEIGHT, got '{s}'"))?;
    if id.is_empty() {
        return Err(format!("missing node ID in '{s}'"));
    }
    let weight: f64 = weight
        .parse()
        .map_err(|_| format!("invalid weight '{weight}'"))?;
    Ok((id.to_string(), weight))
}
