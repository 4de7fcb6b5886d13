//! Shared utilities.

pub mod metrics;
pub mod telemetry;

pub use metrics::LatencySnapshot;
pub use telemetry::init_tracing;
