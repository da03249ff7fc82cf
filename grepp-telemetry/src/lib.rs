//! # Grepp Telemetry and Monitoring
//!
//! Crate for logging and metrics around the lifecycle core.

pub mod logging;
pub mod metrics;

pub use logging::LifecycleLogger;
pub use metrics::MetricsRecorder;
