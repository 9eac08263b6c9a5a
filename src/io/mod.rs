//! IO modules - external system interfaces
//!
//! This module contains all external IO operations:
//! - `trafsys` - Traf-Sys REST client (token + windowed traffic fetch)
//! - `libinsight` - LibInsight gate count ingestion

pub mod libinsight;
pub mod trafsys;

// Re-export commonly used types
pub use libinsight::{BatchError, BatchSink, LibInsightClient, SinkRecord};
pub use trafsys::{TrafSysClient, TrafSysError};
