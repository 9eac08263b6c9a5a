//! Domain models - traffic counts, request windows, and aggregation
//!
//! This module contains the canonical data types used throughout the system:
//! - `RawCount` / `NormalizedCount` - Traf-Sys records before and after normalization
//! - `DayWindow` - relative day ranges for Traf-Sys requests
//! - `Aggregator` / `Aggregates` - per-site, per-hour totals

pub mod aggregate;
pub mod types;
pub mod window;

// Re-export commonly used types at module level
pub use aggregate::{AggregateKey, AggregateTotal, Aggregates, Aggregator};
pub use types::{GateId, NormalizedCount, RawCount};
pub use window::{plan_windows, DayWindow};
