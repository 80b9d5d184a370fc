//! Monitoring module
//!
//! Provides:
//! - Structured logging with tracing
//! - Prometheus counters for the cache and the reconciliation loop

pub mod config;
pub mod metrics;
pub mod tracing_config;

pub use config::{LogFormat, MonitoringConfig};
pub use tracing_config::init_tracing;
