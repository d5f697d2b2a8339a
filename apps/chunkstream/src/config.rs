//! Application configuration.
//!
//! Reads JSON at `~/.config/chunkstream/config.json` (or `--config`), then
//! applies `CHUNKSTREAM_*` environment overrides.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use chunkstream_protocol::ChunkSize;
use serde::{Deserialize, Serialize};

pub const DEFAULT_ADDRESS: &str = "127.0.0.1:10013";
pub const DEFAULT_LISTEN: &str = "0.0.0.0:10013";
pub const DEFAULT_BUCKET: &str = "default";

/// On-disk config format.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    #[serde(default)]
    address: String,
    #[serde(default)]
    listen: String,
    #[serde(default)]
    store_root: String,
    #[serde(default)]
    chunk_size: Option<usize>,
    #[serde(default)]
    bucket: String,
    #[serde(default)]
    timeout_secs: u64,
}

/// Resolved configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Server address the `upload` command dials.
    pub address: SocketAddr,
    /// Address the `serve` command binds.
    pub listen: SocketAddr,
    pub store_root: PathBuf,
    pub chunk_size: ChunkSize,
    pub bucket: String,
    pub timeout: Option<Duration>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            address: SocketAddr::from(([127, 0, 0, 1], 10013)),
            listen: SocketAddr::from(([0, 0, 0, 0], 10013)),
            store_root: home_dir().join(".local/share/chunkstream"),
            chunk_size: ChunkSize::default(),
            bucket: DEFAULT_BUCKET.into(),
            timeout: None,
        }
    }
}

impl AppConfig {
    /// Loads `path` (or the default location) and the process environment.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => config_file_path(),
        };
        Self::load_from(&path, |key| std::env::var(key).ok())
    }

    /// Loads `path`, then applies overrides looked up through `env`.
    ///
    /// A missing file yields the defaults. Unparseable files and invalid
    /// addresses fall back to the defaults with a warning; an out-of-range
    /// chunk size is an error.
    pub fn load_from(path: &Path, env: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let mut config = AppConfig::default();

        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            match serde_json::from_str::<ConfigFile>(&content) {
                Ok(file) => config.apply_file(file)?,
                Err(e) => tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config, using defaults"
                ),
            }
        }

        if let Some(address) = env("CHUNKSTREAM_ADDRESS") {
            config.address = address
                .parse()
                .with_context(|| format!("invalid CHUNKSTREAM_ADDRESS: {address}"))?;
        }
        if let Some(root) = env("CHUNKSTREAM_STORE_ROOT").filter(|r| !r.is_empty()) {
            config.store_root = PathBuf::from(root);
        }
        if let Some(bucket) = env("CHUNKSTREAM_BUCKET").filter(|b| !b.is_empty()) {
            config.bucket = bucket;
        }

        Ok(config)
    }

    fn apply_file(&mut self, file: ConfigFile) -> anyhow::Result<()> {
        if !file.address.is_empty() {
            match file.address.parse() {
                Ok(addr) => self.address = addr,
                Err(_) => tracing::warn!(value = %file.address, "invalid address in config"),
            }
        }
        if !file.listen.is_empty() {
            match file.listen.parse() {
                Ok(addr) => self.listen = addr,
                Err(_) => tracing::warn!(value = %file.listen, "invalid listen address in config"),
            }
        }
        if !file.store_root.is_empty() {
            self.store_root = PathBuf::from(file.store_root);
        }
        if let Some(size) = file.chunk_size {
            self.chunk_size = ChunkSize::new(size).context("invalid chunkSize in config")?;
        }
        if !file.bucket.is_empty() {
            self.bucket = file.bucket;
        }
        if file.timeout_secs > 0 {
            self.timeout = Some(Duration::from_secs(file.timeout_secs));
        }
        Ok(())
    }
}

fn config_file_path() -> PathBuf {
    home_dir()
        .join(".config")
        .join("chunkstream")
        .join("config.json")
}

fn home_dir() -> PathBuf {
    PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| "/tmp".into()))
}
