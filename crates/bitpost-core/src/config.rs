//! Configuration system for bitpost.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $BITPOST_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/bitpost/config.toml
//!   3. ~/.config/bitpost/config.toml

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BitpostConfig {
    pub processing: ProcessingConfig,
    pub acknowledgements: AckConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Max objects processed at once. 0 = available parallelism.
    pub workers: u32,
    /// Inbound objects buffered before the network layer has to wait.
    pub queue_capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AckConfig {
    /// Store and announce the pre-built ack of every message we receive
    /// on an identity that advertises acknowledgements.
    pub announce: bool,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            workers: 0,
            queue_capacity: 1024,
        }
    }
}

impl Default for AckConfig {
    fn default() -> Self {
        Self { announce: true }
    }
}

impl ProcessingConfig {
    /// `workers` with 0 resolved to the machine's parallelism.
    pub fn effective_workers(&self) -> usize {
        if self.workers > 0 {
            return self.workers as usize;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("bitpost")
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
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl BitpostConfig {
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
            BitpostConfig::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("BITPOST_CONFIG")
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
            let text = toml::to_string_pretty(&BitpostConfig::default())
                .map_err(ConfigError::SerializeFailed)?;
            std::fs::write(&path, text).map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
        }
        Ok(path)
    }

    /// Apply BITPOST_* env var overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("BITPOST_PROCESSING__WORKERS") {
            if let Ok(n) = v.parse() {
                self.processing.workers = n;
            }
        }
        if let Ok(v) = std::env::var("BITPOST_PROCESSING__QUEUE_CAPACITY") {
            if let Ok(n) = v.parse() {
                self.processing.queue_capacity = n;
            }
        }
        if let Ok(v) = std::env::var("BITPOST_ACKNOWLEDGEMENTS__ANNOUNCE") {
            self.acknowledgements.announce = v == "true" || v == "1";
        }
    }
}
