// src/config.rs
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::sync::SyncSettings;

pub const DEFAULT_SHEETS_BASE_URL: &str = "https://sheets.googleapis.com/v4/spreadsheets";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has invalid value {value:?}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_path: PathBuf,
    pub redis_enabled: bool,
    pub redis_url: String,
    pub sync: SyncConfig,
}

#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub enabled: bool,
    pub interval: Duration,
    pub fetch_timeout: Duration,
    /// Present whenever `enabled` is true.
    pub sheets: Option<SheetsConfig>,
}

impl SyncConfig {
    pub fn settings(&self) -> SyncSettings {
        SyncSettings {
            interval: self.interval,
            fetch_timeout: self.fetch_timeout,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetsConfig {
    pub spreadsheet_id: String,
    pub range: String,
    pub api_key: Option<String>,
    pub access_token: Option<String>,
    pub base_url: String,
}

impl AppConfig {
    /// Reads `.env` if present, then the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let database_path = get("DATABASE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("menusync.db"));
        let redis_enabled = parse_bool("REDIS_ENABLED", get("REDIS_ENABLED"), true)?;
        let redis_url =
            get("REDIS_URL").unwrap_or_else(|| "redis://127.0.0.1:6379/0".to_string());

        let enabled = parse_bool("SYNC_ENABLED", get("SYNC_ENABLED"), true)?;
        let interval = parse_secs("SYNC_INTERVAL_SECS", get("SYNC_INTERVAL_SECS"), 15)?;
        let fetch_timeout =
            parse_secs("SYNC_FETCH_TIMEOUT_SECS", get("SYNC_FETCH_TIMEOUT_SECS"), 10)?;

        let sheets = match get("SHEETS_SPREADSHEET_ID") {
            Some(spreadsheet_id) => Some(SheetsConfig {
                spreadsheet_id,
                range: get("SHEETS_RANGE").unwrap_or_else(|| "Sheet1".to_string()),
                api_key: get("SHEETS_API_KEY"),
                access_token: get("SHEETS_ACCESS_TOKEN"),
                base_url: get("SHEETS_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_SHEETS_BASE_URL.to_string()),
            }),
            None if enabled => return Err(ConfigError::Missing("SHEETS_SPREADSHEET_ID")),
            None => None,
        };

        Ok(Self {
            database_path,
            redis_enabled,
            redis_url,
            sync: SyncConfig {
                enabled,
                interval,
                fetch_timeout,
                sheets,
            },
        })
    }
}

fn parse_bool(name: &'static str, raw: Option<String>, default: bool) -> Result<bool, ConfigError> {
    match raw.as_deref().map(|v| v.trim().to_lowercase()) {
        None => Ok(default),
        Some(v) => match v.as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::Invalid { name, value: v }),
        },
    }
}

/// Whole seconds, at least one.
fn parse_secs(name: &'static str, raw: Option<String>, default: u64) -> Result<Duration, ConfigError> {
    let Some(raw) = raw else {
        return Ok(Duration::from_secs(default));
    };
    match raw.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
        _ => Err(ConfigError::Invalid { name, value: raw }),
    }
}
