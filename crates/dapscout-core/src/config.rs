//! Configuration system for dapscout.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $DAPSCOUT_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/dapscout/config.toml
//!   3. ~/.config/dapscout/config.toml
//!
//! The file is only ever read. A scan leaves nothing behind on disk.

use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::wire::{ANNOUNCE_PORTS, DISCOVERY_TIMEOUT_MS, MULTICAST_GROUP, MULTICAST_TTL};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DapscoutConfig {
    pub discovery: DiscoveryConfig,
    pub classify: ClassifyConfig,
    pub probe: ProbeConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Multicast group players announce to.
    pub group: Ipv4Addr,
    /// Ports to listen on. One socket per (local address × port).
    pub ports: Vec<u16>,
    /// Multicast TTL set on every listener.
    pub ttl: u32,
    /// Ceiling for the whole discovery round.
    pub timeout_ms: u64,
    /// Receive buffer per listener, in bytes.
    pub recv_buffer: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifyConfig {
    /// Executable stems that mark a process as the editor.
    pub editor_names: Vec<String>,
    /// Files whose presence next to the executable mark a player.
    pub player_loader_files: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Run the TCP fallback when nothing resolved over the network.
    pub enabled: bool,
    pub addresses: Vec<Ipv4Addr>,
    /// Inclusive range.
    pub start_port: u16,
    pub end_port: u16,
    pub attempt_timeout_ms: u64,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            group: MULTICAST_GROUP,
            ports: ANNOUNCE_PORTS.to_vec(),
            ttl: MULTICAST_TTL,
            timeout_ms: DISCOVERY_TIMEOUT_MS,
            recv_buffer: 4096,
        }
    }
}

impl Default for ClassifyConfig {
    fn default() -> Self {
        Self {
            editor_names: vec!["Unity".to_string()],
            player_loader_files: vec![
                "UnityPlayer.dll".to_string(),
                "UnityPlayer.so".to_string(),
                "UnityPlayer.dylib".to_string(),
            ],
        }
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            addresses: vec![Ipv4Addr::LOCALHOST],
            start_port: 56000,
            end_port: 56999,
            attempt_timeout_ms: 250,
        }
    }
}

impl DiscoveryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl ProbeConfig {
    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.attempt_timeout_ms)
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("dapscout")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl DapscoutConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::load_file(&Self::file_path())?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Read one file. A missing file yields defaults.
    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(DapscoutConfig::default());
        }
        let text =
            std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFailed(path.to_path_buf(), e))?;
        toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.to_path_buf(), e))
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("DAPSCOUT_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Apply DAPSCOUT_* overrides. Values that do not parse are ignored.
    fn apply_env_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(v) = var("DAPSCOUT_DISCOVERY__TIMEOUT_MS").and_then(|v| v.parse().ok()) {
            self.discovery.timeout_ms = v;
        }
        if let Some(v) = var("DAPSCOUT_DISCOVERY__TTL").and_then(|v| v.parse().ok()) {
            self.discovery.ttl = v;
        }
        if let Some(v) = var("DAPSCOUT_PROBE__ENABLED") {
            self.probe.enabled = v == "true" || v == "1";
        }
        if let Some(v) = var("DAPSCOUT_PROBE__START_PORT").and_then(|v| v.parse().ok()) {
            self.probe.start_port = v;
        }
        if let Some(v) = var("DAPSCOUT_PROBE__END_PORT").and_then(|v| v.parse().ok()) {
            self.probe.end_port = v;
        }
        if let Some(v) = var("DAPSCOUT_PROBE__ATTEMPT_TIMEOUT_MS").and_then(|v| v.parse().ok()) {
            self.probe.attempt_timeout_ms = v;
        }
    }
}
