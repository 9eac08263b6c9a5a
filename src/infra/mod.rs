//! Infrastructure - configuration, logging, and run metrics
//!
//! This module contains infrastructure concerns:
//! - `config` - TOML tuning, environment secrets, window validation
//! - `logging` - run-scoped tracing subscriber
//! - `metrics` - run counters and summary

pub mod config;
pub mod logging;
pub mod metrics;

// Re-export commonly used types
pub use config::{Config, ConfigError, Credentials, FetchWindow, RunEnv};
pub use metrics::{RunMetrics, RunSummary};
