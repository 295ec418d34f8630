//! Engine-wide commands: consolidate, stats, export, import.

use std::path::Path;

use anyhow::{Context, Result, bail};
use colored::Colorize;
use strata_core::memory::{ConsolidationResult, JsonFileSink, MemoryLevel, SnapshotSink};

use super::Workspace;
use super::memory::level_color;
use crate::cli::ConsolidationPass;

/// Run consolidation passes and save the result.
pub async fn consolidate(workspace: &Workspace, pass: ConsolidationPass) -> Result<()> {
    let memory = &workspace.memory;
    let result = match pass {
        ConsolidationPass::All => memory.consolidate_all().await,
        ConsolidationPass::Due => memory.consolidate().await,
        ConsolidationPass::Working => memory.consolidate_working().await,
        ConsolidationPass::Episodic => memory.consolidate_episodic().await,
        ConsolidationPass::Semantic => memory.consolidate_semantic().await,
    };

    // Pass timestamps change even when no node moved
    workspace.save().await?;
    print_consolidation(&result);
    Ok(())
}

fn print_consolidation(result: &ConsolidationResult) {
    if !result.has_changes() {
        println!("{} Nothing to consolidate", "✓".green());
    } else {
        println!(
            "{} Consolidated {} memories in {}ms",
            "✓".green(),
            result.total_affected(),
            result.duration_ms
        );
        println!("  Promoted:  {}", result.promoted.len());
        println!("  Merged:    {}", result.merged.len());
        println!("  Forgotten: {}", result.forgotten.len());
    }

    if result.skipped > 0 {
        println!("  {} Skipped {} malformed nodes", "⚠".yellow(), result.skipped);
    }
    for error in &result.errors {
        println!("  {} {}", "⚠".yellow(), error.dimmed());
    }
}

/// Show node and edge counts.
pub async fn stats(workspace: &Workspace, json: bool) -> Result<()> {
    let stats = workspace.memory.stats().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("{}", "Memory Statistics".bold());
    println!("  Nodes: {}", stats.total_nodes);
    println!("  Edges: {}", stats.total_edges);
    println!();

    println!("{}", "By level:".bold());
    for level in MemoryLevel::ALL {
        let count = stats.count_by_level.get(level.as_str()).copied().unwrap_or(0);
        println!(
            "  {:<12} {}",
            level.as_str().color(level_color(level)),
            count
        );
    }

    if !stats.count_by_kind.is_empty() {
        println!();
        println!("{}", "By kind:".bold());
        for (kind, count) in &stats.count_by_kind {
            println!("  {:<12} {}", kind, count);
        }
    }
    Ok(())
}

/// Write the current state to a snapshot file.
pub async fn export(workspace: &Workspace, file: &Path) -> Result<()> {
    let snapshot = workspace
        .memory
        .export()
        .await
        .context("Failed to export memory")?;

    JsonFileSink::new(file)
        .save(&snapshot)
        .await
        .with_context(|| format!("Failed to write {}", file.display()))?;

    println!(
        "{} Exported {} memories to {}",
        "✓".green(),
        snapshot.total_nodes,
        file.display()
    );
    Ok(())
}

/// Merge a snapshot file into the current state.
pub async fn import(workspace: &Workspace, file: &Path) -> Result<()> {
    let Some(snapshot) = JsonFileSink::new(file)
        .load()
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?
    else {
        bail!("Snapshot file not found: {}", file.display());
    };

    let report = workspace.memory.import(&snapshot).await;
    if report.imported > 0 {
        workspace.save().await?;
    }

    println!(
        "{} Imported {} of {} memories",
        "✓".green(),
        report.imported,
        snapshot.nodes.len()
    );
    if report.dangling_links > 0 {
        println!(
            "  {} Dropped {} links to unknown nodes",
            "⚠".yellow(),
            report.dangling_links
        );
    }
    if report.skipped() > 0 {
        println!("  {} Skipped {} entries:", "⚠".yellow(), report.skipped());
        for error in &report.errors {
            println!("    {}", error.to_string().dimmed());
        }
    }
    Ok(())
}
