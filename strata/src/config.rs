//! Configuration management for strata.
//!
//! Configuration is loaded from multiple sources with precedence:
//! 1. Environment variables (STRATA_*)
//! 2. Config file (STRATA_CONFIG, or config.toml in the data directory)
//! 3. Default values

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use strata_core::StrataConfig;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Engine settings (memory, ranking, consolidation)
    pub engine: StrataConfig,

    /// Paths
    pub paths: PathsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Base directory for strata data
    pub data_dir: PathBuf,

    /// Snapshot file (default: <data_dir>/memory.json)
    pub snapshot: Option<PathBuf>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            snapshot: None,
        }
    }
}

fn default_data_dir() -> PathBuf {
    if let Some(proj_dirs) = ProjectDirs::from("dev", "strata", "strata") {
        proj_dirs.data_dir().to_path_buf()
    } else {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".strata")
    }
}

impl Config {
    /// Load configuration from file and environment.
    pub fn load() -> Result<Self> {
        let config = Self::load_from(&Self::config_path())?
            .with_snapshot_override(std::env::var_os("STRATA_SNAPSHOT"));
        config
            .engine
            .validate()
            .context("Invalid engine configuration")?;
        Ok(config)
    }

    /// Read a TOML file, falling back to defaults when it does not exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Get the config file path.
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("STRATA_CONFIG") {
            PathBuf::from(path)
        } else {
            default_data_dir().join("config.toml")
        }
    }

    fn with_snapshot_override(mut self, value: Option<OsString>) -> Self {
        if let Some(path) = value.filter(|v| !v.is_empty()) {
            self.paths.snapshot = Some(PathBuf::from(path));
        }
        self
    }

    /// Snapshot file the CLI reads and writes
    pub fn snapshot_path(&self) -> PathBuf {
        self.paths
            .snapshot
            .clone()
            .unwrap_or_else(|| self.paths.data_dir.join("memory.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.engine, StrataConfig::default());
        assert!(config.snapshot_path().ends_with("memory.json"));
    }

    #[test]
    fn test_load_partial_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[engine.memory]
max_working_size = 7

[engine.consolidation]
forget_merged_sources = true

[paths]
data_dir = "/var/lib/strata"
"#,
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.engine.memory.max_working_size, 7);
        assert_eq!(config.engine.memory.access_history_cap, 100);
        assert!(config.engine.consolidation.forget_merged_sources);
        assert_eq!(
            config.snapshot_path(),
            PathBuf::from("/var/lib/strata").join("memory.json")
        );
    }

    #[test]
    fn test_invalid_toml_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "engine = [").unwrap();
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_snapshot_override() {
        let config = Config::default().with_snapshot_override(Some("/tmp/other.json".into()));
        assert_eq!(config.snapshot_path(), PathBuf::from("/tmp/other.json"));

        let config = Config::default().with_snapshot_override(Some(OsString::new()));
        assert!(config.snapshot_path().ends_with("memory.json"));
    }
}
