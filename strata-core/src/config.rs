//! Engine Configuration
//!
//! Defines configuration options for the strata memory engine.

use serde::{Deserialize, Serialize};

/// Engine configuration options
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrataConfig {
    /// Memory level configuration
    pub memory: MemoryConfig,

    /// Retrieval scoring configuration
    pub ranking: RankingConfig,

    /// Consolidation policy configuration
    pub consolidation: ConsolidationConfig,
}

/// Memory level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Working level capacity before the size trigger fires (default: 100)
    pub max_working_size: usize,

    /// Added to a node's access frequency per recorded access (default: 0.1)
    pub access_increment: f64,

    /// Access timestamps retained per node (default: 100)
    pub access_history_cap: usize,

    /// Run the working pass when an add pushes Working over capacity (default: true)
    pub auto_consolidate: bool,

    /// Background scheduler period in seconds (default: 60)
    pub consolidation_tick_secs: u64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_working_size: 100,
            access_increment: 0.1,
            access_history_cap: 100,
            auto_consolidate: true,
            consolidation_tick_secs: 60,
        }
    }
}

/// Retrieval scoring configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingConfig {
    pub access_weight: f64,
    pub recency_weight: f64,
    pub level_weight: f64,
    pub quality_weight: f64,
    pub connection_weight: f64,

    /// Days for recency to halve (default: 30)
    pub recency_half_life_days: f64,

    /// Embedding similarity above which a node matches a query (default: 0.5)
    pub similarity_threshold: f32,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            access_weight: 0.3,
            recency_weight: 0.2,
            level_weight: 0.2,
            quality_weight: 0.2,
            connection_weight: 0.1,
            recency_half_life_days: 30.0,
            similarity_threshold: 0.5,
        }
    }
}

/// Consolidation policy configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsolidationConfig {
    /// Seconds between Episodic -> Semantic passes (default: 3600 = 1 hour)
    pub episodic_interval_secs: u64,

    /// Seconds between Semantic -> LongTerm passes (default: 604800 = 1 week)
    pub semantic_interval_secs: u64,

    /// Minimum importance for Semantic -> LongTerm promotion (default: 0.3)
    pub importance_threshold: f64,

    /// Days for working recency to halve (default: 7)
    pub working_recency_half_life_days: f64,

    /// Weight of the links between a merged node and its sources (default: 0.8)
    pub merge_connection_weight: f64,

    /// Embedding similarity above which two episodic nodes are related (default: 0.7)
    pub embedding_similarity_threshold: f32,

    /// Token Jaccard overlap above which two episodic nodes are related (default: 0.6)
    pub token_overlap_threshold: f64,

    /// Smallest related group that produces a merged node (default: 2)
    pub min_group_size: usize,

    /// Delete grouped episodic sources once merged (default: false)
    pub forget_merged_sources: bool,
}

impl Default for ConsolidationConfig {
    fn default() -> Self {
        Self {
            episodic_interval_secs: 3600,   // 1 hour
            semantic_interval_secs: 604800, // 1 week
            importance_threshold: 0.3,
            working_recency_half_life_days: 7.0,
            merge_connection_weight: 0.8,
            embedding_similarity_threshold: 0.7,
            token_overlap_threshold: 0.6,
            min_group_size: 2,
            forget_merged_sources: false,
        }
    }
}

impl StrataConfig {
    /// Set memory configuration
    pub fn with_memory(mut self, memory: MemoryConfig) -> Self {
        self.memory = memory;
        self
    }

    /// Set ranking configuration
    pub fn with_ranking(mut self, ranking: RankingConfig) -> Self {
        self.ranking = ranking;
        self
    }

    /// Set consolidation configuration
    pub fn with_consolidation(mut self, consolidation: ConsolidationConfig) -> Self {
        self.consolidation = consolidation;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.memory.max_working_size == 0 {
            return Err(invalid("memory.max_working_size", "must be greater than 0"));
        }

        if self.memory.access_history_cap == 0 {
            return Err(invalid("memory.access_history_cap", "must be greater than 0"));
        }

        if !(self.memory.access_increment.is_finite() && self.memory.access_increment >= 0.0) {
            return Err(invalid("memory.access_increment", "must be a non-negative number"));
        }

        if self.memory.consolidation_tick_secs == 0 {
            return Err(invalid("memory.consolidation_tick_secs", "must be greater than 0"));
        }

        let weights = [
            ("ranking.access_weight", self.ranking.access_weight),
            ("ranking.recency_weight", self.ranking.recency_weight),
            ("ranking.level_weight", self.ranking.level_weight),
            ("ranking.quality_weight", self.ranking.quality_weight),
            ("ranking.connection_weight", self.ranking.connection_weight),
            ("consolidation.importance_threshold", self.consolidation.importance_threshold),
            ("consolidation.merge_connection_weight", self.consolidation.merge_connection_weight),
            ("consolidation.token_overlap_threshold", self.consolidation.token_overlap_threshold),
        ];
        for (field, value) in weights {
            if !(value.is_finite() && (0.0..=1.0).contains(&value)) {
                return Err(invalid(field, "must be between 0 and 1"));
            }
        }

        let thresholds = [
            ("ranking.similarity_threshold", self.ranking.similarity_threshold),
            (
                "consolidation.embedding_similarity_threshold",
                self.consolidation.embedding_similarity_threshold,
            ),
        ];
        for (field, value) in thresholds {
            if !(value.is_finite() && (-1.0..=1.0).contains(&value)) {
                return Err(invalid(field, "must be between -1 and 1"));
            }
        }

        let half_lives = [
            ("ranking.recency_half_life_days", self.ranking.recency_half_life_days),
            (
                "consolidation.working_recency_half_life_days",
                self.consolidation.working_recency_half_life_days,
            ),
        ];
        for (field, value) in half_lives {
            if !(value.is_finite() && value > 0.0) {
                return Err(invalid(field, "must be a finite number greater than 0"));
            }
        }

        if self.consolidation.min_group_size < 2 {
            return Err(invalid("consolidation.min_group_size", "must be at least 2"));
        }

        Ok(())
    }
}

fn invalid(field: &str, message: &str) -> ConfigValidationError {
    ConfigValidationError::InvalidValue {
        field: field.into(),
        message: message.into(),
    }
}

/// Configuration validation errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}
