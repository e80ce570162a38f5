//! Configuration for Scatter.
//!
//! Two layers:
//!   - `ShardingConfig`: the validated parameters threaded explicitly into
//!     the planner, publisher, and reassembler. No process-wide state.
//!   - `ScatterConfig`: the file/env layer the driver loads it from.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $SCATTER_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/scatter/config.toml
//!   3. ~/.config/scatter/config.toml

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::ShardError;

// ── Sharding parameters ──────────────────────────────────────────────────────

/// Validated sharding parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardingConfig {
    /// Maximum shard length in bytes. The last shard may be shorter.
    pub shard_size: usize,
    /// Maximum fragment length in bytes. The last fragment of a shard may be shorter.
    pub max_fragment_size: usize,
    /// Number of distinct peers holding each fragment (R).
    pub replication_factor: usize,
    /// Size of the peer pool (N).
    pub peer_count: usize,
    /// Upper bound on any single peer call.
    pub per_peer_timeout: Duration,
}

impl ShardingConfig {
    pub fn new(
        shard_size: usize,
        max_fragment_size: usize,
        replication_factor: usize,
        peer_count: usize,
        per_peer_timeout: Duration,
    ) -> Result<Self, ShardError> {
        let config = Self {
            shard_size,
            max_fragment_size,
            replication_factor,
            peer_count,
            per_peer_timeout,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ShardError> {
        let positive = [
            ("shard_size", self.shard_size),
            ("max_fragment_size", self.max_fragment_size),
            ("replication_factor", self.replication_factor),
            ("peer_count", self.peer_count),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(ShardError::InvalidConfiguration(format!(
                    "{name} must be positive"
                )));
            }
        }
        if self.replication_factor > self.peer_count {
            return Err(ShardError::InvalidConfiguration(format!(
                "replication factor {} exceeds peer count {}",
                self.replication_factor, self.peer_count
            )));
        }
        if self.per_peer_timeout.is_zero() {
            return Err(ShardError::InvalidConfiguration(
                "per_peer_timeout must be positive".into(),
            ));
        }
        Ok(())
    }
}

// ── File configuration ───────────────────────────────────────────────────────

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScatterConfig {
    pub sharding: ShardingSettings,
    pub broadcast: BroadcastSettings,
    pub storage: StorageSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShardingSettings {
    pub shard_size: usize,
    pub max_fragment_size: usize,
    pub replication_factor: usize,
    pub peer_count: usize,
    pub per_peer_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BroadcastSettings {
    /// Topic ShardInfo messages are announced on.
    pub topic: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Root for on-disk peer stores (`{root}/node{i}`). Unset = in-memory peers.
    pub root: Option<PathBuf>,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for ShardingSettings {
    fn default() -> Self {
        Self {
            shard_size: 1000 * 1024,
            max_fragment_size: 256 * 1024,
            replication_factor: 10,
            peer_count: 20,
            per_peer_timeout_ms: 5_000,
        }
    }
}

impl Default for BroadcastSettings {
    fn default() -> Self {
        Self {
            topic: "sharding".to_string(),
        }
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
        .join("scatter")
}

fn home_dir() -> PathBuf {
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
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl ScatterConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::file_path())
    }

    /// Load from an explicit path, then apply env overrides.
    pub fn load_from(path: &std::path::Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(path)
                .map_err(|e| ConfigError::ReadFailed(path.to_path_buf(), e))?;
            toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.to_path_buf(), e))?
        } else {
            ScatterConfig::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("SCATTER_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Write default config if none exists. Returns the path.
    pub fn write_default_if_missing() -> Result<PathBuf, ConfigError> {
        let path = Self::file_path();
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
            }
            let text = toml::to_string_pretty(&ScatterConfig::default())
                .map_err(ConfigError::SerializeFailed)?;
            std::fs::write(&path, text).map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
        }
        Ok(path)
    }

    /// Validated sharding parameters from this config.
    pub fn sharding_config(&self) -> Result<ShardingConfig, ShardError> {
        let s = &self.sharding;
        ShardingConfig::new(
            s.shard_size,
            s.max_fragment_size,
            s.replication_factor,
            s.peer_count,
            Duration::from_millis(s.per_peer_timeout_ms),
        )
    }

    /// Apply SCATTER_* env var overrides.
    fn apply_env_overrides(&mut self) {
        fn parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
            std::env::var(key).ok().and_then(|v| v.parse().ok())
        }

        if let Some(v) = parsed("SCATTER_SHARDING__SHARD_SIZE") {
            self.sharding.shard_size = v;
        }
        if let Some(v) = parsed("SCATTER_SHARDING__MAX_FRAGMENT_SIZE") {
            self.sharding.max_fragment_size = v;
        }
        if let Some(v) = parsed("SCATTER_SHARDING__REPLICATION_FACTOR") {
            self.sharding.replication_factor = v;
        }
        if let Some(v) = parsed("SCATTER_SHARDING__PEER_COUNT") {
            self.sharding.peer_count = v;
        }
        if let Some(v) = parsed("SCATTER_SHARDING__PER_PEER_TIMEOUT_MS") {
            self.sharding.per_peer_timeout_ms = v;
        }
        if let Ok(v) = std::env::var("SCATTER_BROADCAST__TOPIC") {
            self.broadcast.topic = v;
        }
        if let Ok(v) = std::env::var("SCATTER_STORAGE__ROOT") {
            self.storage.root = Some(PathBuf::from(v));
        }
    }
}
