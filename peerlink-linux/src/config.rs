//! Load config from file and environment.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Daemon configuration. File: ~/.config/peerlink/config.toml or /etc/peerlink/config.toml.
/// Env overrides: PEERLINK_INTERFACE, PEERLINK_WPA_CLI, PEERLINK_POLL_INTERVAL_MS, PEERLINK_LOG.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// P2P control interface (default p2p-dev-wlan0).
    #[serde(default = "default_interface")]
    pub interface: String,
    /// wpa_cli binary (default `wpa_cli` from PATH).
    #[serde(default = "default_wpa_cli")]
    pub wpa_cli: String,
    /// Supplicant poll interval in milliseconds (default 1000).
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Log filter when RUST_LOG is unset (default info).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_interface() -> String {
    "p2p-dev-wlan0".to_string()
}
fn default_wpa_cli() -> String {
    "wpa_cli".to_string()
}
fn default_poll_interval_ms() -> u64 {
    1000
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            interface: default_interface(),
            wpa_cli: default_wpa_cli(),
            poll_interval_ms: default_poll_interval_ms(),
            log_level: default_log_level(),
        }
    }
}

impl Config {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("reading {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("parsing {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Load config: merge default, then config file (if present), then env vars.
/// A config file that exists but does not parse is an error.
pub fn load() -> Result<Config, ConfigError> {
    let c = match config_paths().into_iter().find(|p| p.exists()) {
        Some(path) => load_file(&path)?,
        None => Config::default(),
    };
    Ok(apply_env(c, |key| std::env::var(key).ok()))
}

/// Env overrides. Unparseable values are ignored.
fn apply_env(mut c: Config, var: impl Fn(&str) -> Option<String>) -> Config {
    if let Some(s) = var("PEERLINK_INTERFACE") {
        if !s.is_empty() {
            c.interface = s;
        }
    }
    if let Some(s) = var("PEERLINK_WPA_CLI") {
        if !s.is_empty() {
            c.wpa_cli = s;
        }
    }
    if let Some(s) = var("PEERLINK_POLL_INTERVAL_MS") {
        if let Ok(ms) = s.parse::<u64>() {
            c.poll_interval_ms = ms;
        }
    }
    if let Some(s) = var("PEERLINK_LOG") {
        if !s.is_empty() {
            c.log_level = s;
        }
    }
    c
}

fn config_paths() -> Vec<PathBuf> {
    let home = std::env::var_os("HOME").map(PathBuf::from);
    let mut out = Vec::new();
    if let Some(h) = home {
        out.push(h.join(".config/peerlink/config.toml"));
    }
    out.push(PathBuf::from("/etc/peerlink/config.toml"));
    out
}

fn load_file(path: &Path) -> Result<Config, ConfigError> {
    let s = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str::<Config>(&s).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
