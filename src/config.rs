//! campaign-runtime configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::scheduler::RuntimeConfig;

/// Main configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Defaults applied to every campaign runtime
    pub runtime: RuntimeConfig,

    /// Parameters for the `simulate` command
    pub simulation: SimulationConfig,
}

impl Config {
    /// Check that the runtime defaults are usable
    pub fn validate(&self) -> Result<()> {
        self.runtime.validate().context("Invalid runtime section")?;
        if self.simulation.campaign_id.is_empty() {
            return Err(eyre::eyre!("simulation.campaign-id must not be empty"));
        }
        Ok(())
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // Explicit path must load or fail
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Project-local config: .campaign-runtime.yml
        let local_config = PathBuf::from(".campaign-runtime.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // User config: ~/.config/campaign-runtime/campaign-runtime.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("campaign-runtime").join("campaign-runtime.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Simulated campaign driven by `crt simulate`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    #[serde(rename = "campaign-id")]
    pub campaign_id: String,

    #[serde(rename = "user-id")]
    pub user_id: String,

    /// Operations enqueued at start
    pub operations: usize,

    /// How long the runtime runs before stopping
    #[serde(rename = "duration-secs")]
    pub duration_secs: u64,

    /// Priorities are drawn from `0..=max-priority`
    #[serde(rename = "max-priority")]
    pub max_priority: i32,

    /// Seed for the simulated handlers; random when unset
    pub seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            campaign_id: "demo-campaign".to_string(),
            user_id: "demo-user".to_string(),
            operations: 20,
            duration_secs: 120,
            max_priority: 10,
            seed: None,
        }
    }
}
