use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

/// Environment override for the chat application key.
pub const APP_KEY_ENV: &str = "CHARLA_APP_KEY";

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Config {
    /// Application key for the chat service. Optional here; its absence is
    /// only reported once the service is ready and a session would start.
    pub app_key: Option<String>,
    /// Simulated service bootstrap time, for demoing the not-ready window.
    pub ready_delay_ms: Option<u64>,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Effective application key: the CLI flag wins, then the environment,
    /// then the config file. Blank values count as missing.
    pub fn resolve_app_key(&self, flag: Option<&str>) -> Option<String> {
        flag.map(str::to_string)
            .or_else(|| std::env::var(APP_KEY_ENV).ok())
            .or_else(|| self.app_key.clone())
            .filter(|key| !key.trim().is_empty())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir =
            dirs::config_dir().ok_or_else(|| anyhow!("Could not determine config directory"))?;
        Ok(config_dir.join("charla").join("config.json"))
    }
}
