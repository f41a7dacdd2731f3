use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use bakehouse_engine::EngineConfig;

/// Top-level configuration for the bakehouse server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the REST listener binds to.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Seconds between expiry sweep passes.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    #[serde(default)]
    pub engine: EngineConfig,
}

fn default_bind_addr() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_sweep_interval_secs() -> u64 {
    180
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            sweep_interval_secs: default_sweep_interval_secs(),
            engine: EngineConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load config from disk. Returns default if not found.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).context("Failed to read config file")?;
        let config: Self = toml::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }

    /// Save config to disk.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content).context("Failed to write config file")?;
        Ok(())
    }
}
