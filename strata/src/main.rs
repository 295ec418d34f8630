//! strata - Hierarchical Memory CLI
//!
//! Drives the strata engine against a JSON snapshot file: each invocation
//! restores the snapshot, runs one command, and saves it back if anything
//! changed.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod cli;
mod commands;
mod config;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing; stdout is reserved for command output
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive("strata=info".parse()?))
        .init();

    let cli = Cli::parse();

    if let Commands::Version = cli.command {
        println!("strata {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    // Load configuration
    let mut config = config::Config::load()?;
    if let Some(path) = cli.snapshot {
        config.paths.snapshot = Some(path);
    }

    commands::execute(cli.command, &config).await
}
