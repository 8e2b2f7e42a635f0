//! Configuration for lyceum-storage

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default data directory
pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("lyceum-storage")
}

/// Configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Data directory for the vault database
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Replay the platform's network latency on auth and verification
    /// flows (800ms login/signup, staged capsule verification)
    #[serde(default = "default_true")]
    pub simulate_latency: bool,

    /// Consecutive login failures before an account locks
    #[serde(default = "default_lockout_threshold")]
    pub lockout_threshold: u32,

    /// Lockout window in seconds
    #[serde(default = "default_lockout_window")]
    pub lockout_window_secs: u64,
}

fn default_true() -> bool {
    true
}

fn default_lockout_threshold() -> u32 {
    5
}

fn default_lockout_window() -> u64 {
    15 * 60
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            simulate_latency: true,
            lockout_threshold: 5,
            lockout_window_secs: 15 * 60,
        }
    }
}

impl Config {
    /// Load config from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    /// Save config to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), std::io::Error> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    /// Get vault database path
    pub fn vault_db_path(&self) -> PathBuf {
        self.data_dir.join("vault.sled")
    }

    /// Get config file path
    pub fn config_path(&self) -> PathBuf {
        self.data_dir.join("config.toml")
    }

    /// Lockout window as a duration
    pub fn lockout_window(&self) -> Duration {
        Duration::from_secs(self.lockout_window_secs)
    }
}
