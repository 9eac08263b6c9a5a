//! Services - business logic between the Traf-Sys and LibInsight clients
//!
//! - `normalizer` - site code and timestamp translation
//! - `delivery` - batched LibInsight delivery with retry
//! - `pipeline` - run orchestration

pub mod delivery;
pub mod normalizer;
pub mod pipeline;

pub use delivery::{Deliverer, DeliveryError, RetryPolicy};
pub use normalizer::{normalize, GateLookup, NormalizeError, SiteGateTable};
pub use pipeline::{Pipeline, PipelineError};
