//! Daemon configuration, loaded from an optional JSON file.

use anyhow::{Context, Result, bail};
use btcmap_sync::{ApiClientConfig, CollectionsConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    pub api: ApiClientConfig,
    pub collections: CollectionsConfig,
    /// SQLite file holding snapshots and sync leases.
    pub db_path: PathBuf,
    /// Seconds between two sync passes.
    pub interval_secs: u64,
    /// Port of the status API.
    pub http_port: u16,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            api: ApiClientConfig::default(),
            collections: CollectionsConfig::default(),
            db_path: PathBuf::from("btcmap-cache.db"),
            interval_secs: 600,
            http_port: 4080,
        }
    }
}

impl DaemonConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    pub fn validate(&self) -> Result<()> {
        if self.interval_secs == 0 {
            bail!("interval_secs must be at least 1");
        }
        if self.collections.page_size == 0 {
            bail!("collections.page_size must be positive");
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}
