//! Internal telemetry for the semantic pipeline.
//!
//! Metrics stay in-process. The binary logs a snapshot at shutdown;
//! nothing is exported to an external system.

pub mod health;
pub mod metrics;
pub mod tracing_setup;

pub use health::*;
pub use metrics::*;
pub use tracing_setup::*;
