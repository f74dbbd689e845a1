//! Run Configuration
//!
//! Handles loading and saving run configuration from TOML files. The
//! protocol parameters live in [`SimConfig`]; this wraps them together
//! with the output settings.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use ezchain_node::SimConfig;

/// Full run configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Protocol and network parameters
    pub sim: SimConfig,

    /// Output settings
    pub output: OutputSettings,
}

/// Where the run's CSVs land
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputSettings {
    /// Directory for the statistics files, created on demand
    pub out_dir: PathBuf,

    /// Periodic statistics file name
    pub stats_file: String,

    /// Error summary file name
    pub errors_file: String,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            out_dir: PathBuf::from("result"),
            stats_file: "statistics.csv".to_string(),
            errors_file: "errors.csv".to_string(),
        }
    }
}

impl RunConfig {
    /// Quick-profile configuration for local experiments.
    pub fn quick() -> Self {
        Self {
            sim: SimConfig::quick(),
            output: OutputSettings::default(),
        }
    }

    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.sim.validate().map_err(anyhow::Error::msg)?;
        Ok(config)
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    /// Render as TOML.
    pub fn to_toml(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = RunConfig::default();
        assert_eq!(config.sim.nodes, 300);
        assert_eq!(config.output.out_dir, PathBuf::from("result"));
    }

    #[test]
    fn test_quick_config() {
        let config = RunConfig::quick();
        assert_eq!(config.sim.nodes, 20);
        config.sim.validate().unwrap();
    }

    #[test]
    fn test_save_load_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sim.toml");

        let mut config = RunConfig::quick();
        config.sim.seed = 99;
        config.save(&path).unwrap();

        let loaded = RunConfig::load(&path).unwrap();
        assert_eq!(loaded.sim.seed, 99);
        assert_eq!(loaded.sim.nodes, 20);
    }

    #[test]
    fn test_load_rejects_invalid() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sim.toml");

        let mut config = RunConfig::default();
        config.sim.nodes = 1;
        fs::write(&path, toml::to_string_pretty(&config).unwrap()).unwrap();

        assert!(RunConfig::load(&path).is_err());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sim.toml");
        fs::write(&path, "[sim]\nnodes = 12\ncommittee = 4\n").unwrap();

        let loaded = RunConfig::load(&path).unwrap();
        assert_eq!(loaded.sim.nodes, 12);
        assert_eq!(loaded.sim.committee, 4);
        assert_eq!(loaded.sim.epoch, 2_000.0);
    }
}
