use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::blacklist::{LocalBlacklist, NoBlacklist, RemoteBlacklist, UrlBlacklist};
use crate::bloom::{BloomConfig, BloomFilter};

pub const DEFAULT_CONFIG_PATH: &str = "settings.toml";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub blacklist: BlacklistConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:3000".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BlacklistMode {
    /// Filter kept inside the API process
    #[default]
    Local,
    /// Ask a running `blacklist-server`
    Remote,
    Off,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BlacklistConfig {
    pub mode: BlacklistMode,
    /// Address of the blacklist server in remote mode
    pub addr: String,
    /// Filter configuration line for local mode, e.g. "1024 1 2"
    pub filter: String,
    pub data_file: Option<PathBuf>,
    pub timeout_ms: u64,
    /// URLs added to the local filter at startup
    pub seed: Vec<String>,
}

impl Default for BlacklistConfig {
    fn default() -> Self {
        Self {
            mode: BlacklistMode::Local,
            addr: "127.0.0.1:5555".to_string(),
            filter: "1024 1 2".to_string(),
            data_file: None,
            timeout_ms: 2000,
            seed: Vec::new(),
        }
    }
}

impl BlacklistConfig {
    pub fn build(&self) -> Result<Arc<dyn UrlBlacklist>> {
        match self.mode {
            BlacklistMode::Local => {
                let bloom: BloomConfig = self
                    .filter
                    .parse()
                    .context("Invalid blacklist filter configuration")?;
                let local = LocalBlacklist::new(BloomFilter::new(bloom, self.data_file.clone()));
                for url in &self.seed {
                    local.add(url);
                }
                Ok(Arc::new(local))
            }
            BlacklistMode::Remote => Ok(Arc::new(RemoteBlacklist::new(
                self.addr.clone(),
                Duration::from_millis(self.timeout_ms),
            ))),
            BlacklistMode::Off => Ok(Arc::new(NoBlacklist)),
        }
    }
}

impl Config {
    /// Load from `path`, falling back to defaults when the file does not exist
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content)
                .with_context(|| format!("Failed to parse {}", path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
        }
    }

    pub fn load() -> Result<Self> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }
}
