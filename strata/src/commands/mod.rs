//! Command implementations for strata CLI.
//!
//! Each submodule implements the logic for a command group. Commands share a
//! [`Workspace`]: the engine restored from the snapshot file plus the sink
//! used to write it back.

pub mod maintenance;
pub mod memory;

use std::path::PathBuf;

use anyhow::{Context, Result};
use strata_core::memory::{HierarchicalMemory, JsonFileSink};
use tracing::warn;

use crate::cli::Commands;
use crate::config::Config;

/// Engine state loaded from, and saved to, one snapshot file
pub struct Workspace {
    pub memory: HierarchicalMemory,
    sink: JsonFileSink,
}

impl Workspace {
    /// Build an engine and restore the snapshot file if it exists
    pub async fn open(config: &Config) -> Result<Self> {
        Self::open_at(config, config.snapshot_path()).await
    }

    pub async fn open_at(config: &Config, path: PathBuf) -> Result<Self> {
        let memory = HierarchicalMemory::new(config.engine.clone())
            .context("Invalid engine configuration")?;
        let sink = JsonFileSink::new(path);

        let report = memory
            .restore(&sink)
            .await
            .with_context(|| format!("Failed to load snapshot {}", sink.path().display()))?;
        if let Some(report) = report {
            for error in &report.errors {
                warn!("Ignored snapshot {}", error);
            }
        }

        Ok(Self { memory, sink })
    }

    /// Write the engine back to the snapshot file
    pub async fn save(&self) -> Result<()> {
        self.memory
            .persist(&self.sink)
            .await
            .with_context(|| format!("Failed to save snapshot {}", self.sink.path().display()))?;
        Ok(())
    }
}

/// Execute a command against the configured snapshot.
pub async fn execute(command: Commands, config: &Config) -> Result<()> {
    let workspace = Workspace::open(config).await?;

    match command {
        Commands::Add(args) => memory::add(&workspace, args).await,
        Commands::Get { id, json } => memory::get(&workspace, &id, json).await,
        Commands::Update(args) => memory::update(&workspace, args).await,
        Commands::Delete { id } => memory::delete(&workspace, &id).await,
        Commands::Query(args) => memory::query(&workspace, args).await,
        Commands::Related { id, depth } => memory::related(&workspace, &id, depth).await,
        Commands::Reinforce { id, boost } => memory::reinforce(&workspace, &id, boost).await,
        Commands::Consolidate { pass } => maintenance::consolidate(&workspace, pass).await,
        Commands::Stats { json } => maintenance::stats(&workspace, json).await,
        Commands::Export { file } => maintenance::export(&workspace, &file).await,
        Commands::Import { file } => maintenance::import(&workspace, &file).await,
        Commands::Version => Ok(()),
    }
}
