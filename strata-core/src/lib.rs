//! Strata - Hierarchical Memory Engine
//!
//! An in-process memory engine that stores knowledge as nodes across five
//! permanence levels, links them in a relationship graph, ranks them for
//! retrieval, and consolidates them upward over time.
//!
//! # Modules
//!
//! - **memory** - Level stores, relationship graph, ranking, consolidation
//! - **config** - Engine configuration with serde defaults and validation
//! - **error** - Engine error taxonomy
//! - **utils** - Time helpers shared by scoring code
//!
//! # Example
//!
//! ```rust,no_run
//! use strata_core::StrataConfig;
//! use strata_core::memory::{HierarchicalMemory, NewMemory, QuerySpec};
//!
//! async fn example() -> strata_core::StrataResult<()> {
//!     let memory = HierarchicalMemory::new(StrataConfig::default())?;
//!
//!     // Store a working note
//!     let id = memory.add(NewMemory::new("def fibonacci(n): ...").tag("code")).await?;
//!
//!     // Retrieve it by text
//!     let hits = memory.query(&QuerySpec::text("fibonacci")).await;
//!     assert_eq!(hits[0].node.id, id);
//!
//!     // Promote, merge and forget as needed
//!     let result = memory.consolidate().await;
//!     println!("{} nodes affected", result.total_affected());
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod memory;
pub mod utils;

pub use config::{
    ConfigValidationError, ConsolidationConfig, MemoryConfig, RankingConfig, StrataConfig,
};
pub use error::{StrataError, StrataResult};
