use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::FixedOffset;
use serde::Deserialize;
use tracing::{info, warn};

use crate::roster::RosterConfig;

const BUNDLED_CONFIG: &str = include_str!("../config.toml");

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_data_file")]
    pub data_file: PathBuf,
    #[serde(default = "default_utc_offset_minutes")]
    pub utc_offset_minutes: i32,
    #[serde(default = "default_cache_ttl_secs")]
    pub catalog_cache_ttl_secs: u64,
    pub roster: RosterSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RosterSettings {
    pub rotating_pool: Vec<String>,
    pub fixed_member: String,
    #[serde(default = "default_group_size")]
    pub group_size: usize,
    #[serde(default = "default_recency_window")]
    pub recency_window: usize,
    #[serde(default = "default_min_year")]
    pub min_year: i32,
}

fn default_data_file() -> PathBuf {
    PathBuf::from("data/louvor.json")
}

fn default_utc_offset_minutes() -> i32 {
    -180
}

fn default_cache_ttl_secs() -> u64 {
    300
}

fn default_group_size() -> usize {
    3
}

fn default_recency_window() -> usize {
    4
}

fn default_min_year() -> i32 {
    2024
}

impl AppConfig {
    /// Reads `path`, falling back to the bundled `config.toml` when it is
    /// missing, then applies `LOUVOR_*` environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => {
                info!("Using config {}", path.display());
                raw
            }
            Err(e) => {
                warn!("Could not read {}: {e}, using bundled config", path.display());
                BUNDLED_CONFIG.to_string()
            }
        };

        let mut config = Self::from_toml(&raw)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        toml::from_str(raw).context("invalid config.toml")
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(path) = var("LOUVOR_DATA_FILE") {
            self.data_file = PathBuf::from(path);
        }
        if let Some(offset) = var("LOUVOR_UTC_OFFSET_MINUTES") {
            self.utc_offset_minutes = offset
                .parse()
                .with_context(|| format!("LOUVOR_UTC_OFFSET_MINUTES is not an integer: {offset}"))?;
        }
        Ok(())
    }

    /// Offset used for the Monday 03:00 week rollover.
    pub fn timezone(&self) -> Result<FixedOffset> {
        FixedOffset::east_opt(self.utc_offset_minutes * 60)
            .with_context(|| format!("utc_offset_minutes out of range: {}", self.utc_offset_minutes))
    }

    pub fn catalog_cache_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.catalog_cache_ttl_secs as i64)
    }
}

impl RosterSettings {
    pub fn roster_config(&self) -> RosterConfig {
        RosterConfig {
            rotating_pool: self.rotating_pool.clone(),
            fixed_member: self.fixed_member.clone(),
            group_size: self.group_size,
            recency_window: self.recency_window,
        }
    }
}
