//! Node commands: add, get, update, delete, query, related, reinforce.

use anyhow::{Context, Result, bail};
use colored::Colorize;
use strata_core::memory::{
    MemoryLevel, MemoryNode, NewMemory, NodeUpdate, QueryHit, QuerySpec, UpdateOutcome,
};

use super::Workspace;
use crate::cli::{AddArgs, QueryArgs, UpdateArgs};

/// Store a new node.
pub async fn add(workspace: &Workspace, args: AddArgs) -> Result<()> {
    let mut input = NewMemory::new(args.content).level(args.level).kind(args.kind);
    for tag in &args.tags {
        input = input.tag(tag);
    }
    if let Some(category) = args.category {
        input = input.category(category);
    }
    if let Some(quality) = args.quality {
        input = input.quality(quality);
    }
    if let Some(parent) = args.parent {
        input = input.parent(parent);
    }
    for (id, weight) in args.connections {
        input = input.connect(id, weight);
    }
    if !args.embedding.is_empty() {
        input = input.embedding(args.embedding);
    }

    let id = workspace
        .memory
        .add(input)
        .await
        .context("Failed to add memory")?;
    workspace.save().await?;

    let level = workspace
        .memory
        .peek(&id)
        .await
        .map(|n| n.level)
        .unwrap_or(args.level);
    println!("{} Stored in {} memory", "✓".green(), level.as_str().cyan());
    println!("  ID: {}", id);
    if !args.tags.is_empty() {
        println!("  Tags: {}", args.tags.join(", "));
    }
    Ok(())
}

/// Show one node, recording the access.
pub async fn get(workspace: &Workspace, id: &str, json: bool) -> Result<()> {
    let node = workspace.memory.get(id).await?;
    workspace.save().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&node)?);
        return Ok(());
    }

    print_node(&node);
    if let Some(parent) = &node.parent {
        println!("     Parent: {}", parent);
    }
    if !node.children.is_empty() {
        let children: Vec<&str> = node.children.iter().map(String::as_str).collect();
        println!("     Children: {}", children.join(", "));
    }
    for (target, weight) in &node.connections {
        println!("     → {} ({:.2})", target, weight);
    }
    println!(
        "     Access: {:.2}  Consolidation: {:.2}  Last accessed: {}",
        node.access_frequency,
        node.consolidation_score,
        node.last_accessed.format("%Y-%m-%d %H:%M:%S")
    );
    Ok(())
}

/// Apply a partial update.
pub async fn update(workspace: &Workspace, args: UpdateArgs) -> Result<()> {
    let mut update = NodeUpdate::default();
    if let Some(content) = args.content {
        update = update.content(content);
    }
    if let Some(kind) = args.kind {
        update = update.kind(kind);
    }
    if !args.embedding.is_empty() {
        update = update.embedding(args.embedding);
    }

    let metadata_changed =
        !args.tags.is_empty() || args.category.is_some() || args.quality.is_some();
    if metadata_changed {
        let Some(current) = workspace.memory.peek(&args.id).await else {
            bail!("Memory not found: {}", args.id);
        };
        let mut metadata = current.metadata;
        if !args.tags.is_empty() {
            metadata.tags = args.tags.into_iter().collect();
        }
        if let Some(category) = args.category {
            metadata.category = Some(category);
        }
        if let Some(quality) = args.quality {
            metadata.quality = quality;
        }
        update = update.metadata(metadata);
    }

    match workspace.memory.update(&args.id, update).await? {
        UpdateOutcome::Missing => {
            println!("{} Memory not found: {}", "⚠".yellow(), args.id);
            return Ok(());
        }
        UpdateOutcome::Updated => {
            println!("{} Updated memory: {}", "✓".green(), args.id);
        }
        UpdateOutcome::EmbeddingStale => {
            println!("{} Updated memory: {}", "✓".green(), args.id);
            println!(
                "  {} Content changed; embedding cleared. Supply a new one with --embedding",
                "⚠".yellow()
            );
        }
    }
    workspace.save().await
}

/// Delete a node.
pub async fn delete(workspace: &Workspace, id: &str) -> Result<()> {
    if workspace.memory.delete(id).await {
        workspace.save().await?;
        println!("{} Deleted memory: {}", "✓".green(), id);
    } else {
        println!("{} Memory not found: {}", "⚠".yellow(), id);
    }
    Ok(())
}

/// Ranked retrieval.
pub async fn query(workspace: &Workspace, args: QueryArgs) -> Result<()> {
    let mut spec = QuerySpec::text(args.text)
        .limit(args.limit)
        .intent(args.intent.into());
    if let Some(kind) = args.kind {
        spec = spec.kind(kind);
    }
    if let Some(category) = args.category {
        spec = spec.category(category);
    }
    for tag in args.tags {
        spec = spec.tag(tag);
    }
    if !args.embedding.is_empty() {
        spec = spec.embedding(args.embedding);
    }
    if args.all {
        spec = spec.comprehensive();
    }

    let hits = workspace.memory.query(&spec).await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&hits)?);
        return Ok(());
    }

    if hits.is_empty() {
        println!("{} No memories found matching criteria", "⚠".yellow());
        return Ok(());
    }

    println!("{} Found {} memories:", "✓".green(), hits.len());
    println!();
    for (i, hit) in hits.iter().enumerate() {
        print_hit(i + 1, hit);
    }
    Ok(())
}

/// List nodes reachable from a node.
pub async fn related(workspace: &Workspace, id: &str, depth: usize) -> Result<()> {
    let nodes = workspace.memory.related(id, depth).await?;

    if nodes.is_empty() {
        println!("{} Nothing related to {} within {} hops", "⚠".yellow(), id, depth);
        return Ok(());
    }

    println!("{} {} related memories:", "✓".green(), nodes.len());
    println!();
    for node in &nodes {
        print_node(node);
        println!();
    }
    Ok(())
}

/// Boost a node and its direct connections.
pub async fn reinforce(workspace: &Workspace, id: &str, boost: f64) -> Result<()> {
    if workspace.memory.reinforce(id, boost).await? {
        workspace.save().await?;
        println!("{} Reinforced {} by {:.2}", "✓".green(), id, boost);
    } else {
        println!("{} Memory not found: {}", "⚠".yellow(), id);
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Formatting
// ─────────────────────────────────────────────────────────────────────────────

pub(crate) fn level_color(level: MemoryLevel) -> &'static str {
    match level {
        MemoryLevel::Working => "yellow",
        MemoryLevel::Episodic => "cyan",
        MemoryLevel::Semantic => "blue",
        MemoryLevel::Procedural => "magenta",
        MemoryLevel::LongTerm => "green",
    }
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

/// Truncate on a character boundary
fn preview(content: &str, max_chars: usize) -> String {
    match content.char_indices().nth(max_chars) {
        Some((end, _)) => format!("{}...", &content[..end]),
        None => content.to_string(),
    }
}

fn print_node(node: &MemoryNode) {
    println!(
        "  {} [{}] <{}>",
        short_id(&node.id).cyan(),
        node.level.as_str().color(level_color(node.level)),
        node.kind.as_str().dimmed()
    );
    println!("     {}", preview(&node.content, 100));
    if !node.metadata.tags.is_empty() {
        let tags: Vec<&str> = node.metadata.tags.iter().map(String::as_str).collect();
        println!("     Tags: {}", tags.join(", ").dimmed());
    }
}

fn print_hit(index: usize, hit: &QueryHit) {
    print!("  {}. ", index);
    print_node(&hit.node);
    println!(
        "     Relevance: {:.2}  ({})",
        hit.relevance,
        hit.reason.to_string().dimmed()
    );
    println!();
}
