use std::path::{Path, PathBuf};

use chrono::{FixedOffset, NaiveDate};
use serde::Deserialize;
use thiserror::Error;

const CONFIG_PATH_ENV: &str = "SUMMIT_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "summit.toml";
const PRETALX_TOKEN_ENV: &str = "PRETALX_TOKEN";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid utc_offset {0:?}, expected e.g. \"+02:00\"")]
    InvalidOffset(String),
}

/// One conference day as labeled in the schedule spreadsheet header.
#[derive(Debug, Clone, Deserialize)]
pub struct ConferenceDay {
    /// Day name matched (case-insensitively, as a prefix) against header cells.
    pub name: String,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PretalxConfig {
    pub event_slug: String,
    #[serde(default)]
    pub token: String,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub pretalx: PretalxConfig,
    #[serde(default)]
    pub conference_days: Vec<ConferenceDay>,
    /// Local offset of the conference venue, e.g. "+02:00".
    #[serde(default = "default_utc_offset")]
    pub utc_offset: String,
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

fn default_api_base_url() -> String {
    "https://pretalx.com/api".to_string()
}

fn default_utc_offset() -> String {
    "+02:00".to_string()
}

fn default_database_path() -> PathBuf {
    PathBuf::from("summit.sqlite")
}

fn default_bind_addr() -> String {
    "127.0.0.1:8000".to_string()
}

impl AppConfig {
    /// Load config from `SUMMIT_CONFIG` (default `summit.toml`). The pretalx
    /// token can be supplied via `PRETALX_TOKEN` instead of the file.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: AppConfig = toml::from_str(&raw)?;

        if let Ok(token) = std::env::var(PRETALX_TOKEN_ENV) {
            config.pretalx.token = token;
        }

        // Fail early on a bad offset instead of at import time.
        config.offset()?;

        Ok(config)
    }

    pub fn offset(&self) -> Result<FixedOffset, ConfigError> {
        self.utc_offset
            .parse::<FixedOffset>()
            .map_err(|_| ConfigError::InvalidOffset(self.utc_offset.clone()))
    }
}
