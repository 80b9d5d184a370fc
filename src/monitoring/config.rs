//! Monitoring configuration
//!
//! Loads from environment variables:
//! - RUST_LOG: Tracing level (debug, info, warn, error)
//! - MONITORING_ENABLED: Enable/disable logging setup (true/false)
//! - LOG_FORMAT: Console output format (json or text)
//! - LOG_DIR: Directory for log files (default: ~/.menusync/logs)
//! - LOG_FILE_ENABLED: Write daily-rotated JSON log files (true/false)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    /// Enable or disable monitoring
    pub enabled: bool,

    /// Log level (debug, info, warn, error)
    pub log_level: String,

    /// Console format (json or text)
    pub log_format: LogFormat,

    /// Directory for log files
    pub log_dir: PathBuf,

    pub enable_file_logging: bool,

    pub enable_console_logging: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Text,
}

impl LogFormat {
    pub fn as_str(&self) -> &str {
        match self {
            LogFormat::Json => "json",
            LogFormat::Text => "text",
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "text" => Ok(LogFormat::Text),
            _ => Err(format!("Unknown log format: {}", s)),
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            log_dir: Self::default_log_dir(),
            enable_file_logging: false,
            enable_console_logging: true,
        }
    }
}

impl MonitoringConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(enabled) = lookup("MONITORING_ENABLED") {
            config.enabled = enabled.to_lowercase() == "true";
        }

        if let Some(log_level) = lookup("RUST_LOG") {
            config.log_level = log_level;
        }

        if let Some(log_format) = lookup("LOG_FORMAT") {
            if let Ok(format) = log_format.parse() {
                config.log_format = format;
            }
        }

        if let Some(log_dir) = lookup("LOG_DIR") {
            config.log_dir = PathBuf::from(log_dir);
        }

        if let Some(file_logging) = lookup("LOG_FILE_ENABLED") {
            config.enable_file_logging = file_logging.to_lowercase() == "true";
        }

        config
    }

    /// Get default log directory: ~/.menusync/logs
    pub fn default_log_dir() -> PathBuf {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
        PathBuf::from(format!("{}/.menusync/logs", home))
    }

    pub fn ensure_log_dir(&self) -> std::io::Result<()> {
        if !self.log_dir.exists() {
            std::fs::create_dir_all(&self.log_dir)?;
            tracing::info!(path = %self.log_dir.display(), "Created log directory");
        }
        Ok(())
    }
}
