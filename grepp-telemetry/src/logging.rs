//! ## grepp-telemetry::logging
//! **Structured logging with tracing**
//!
//! Subscriber setup for the lifecycle core plus a structured event helper
//! for lifecycle milestones (object creation bursts, pool drains, limit
//! hits). The core itself only emits `tracing` events; wiring a
//! subscriber is the embedding application's call, made here.

use opentelemetry::KeyValue;
use tracing::info_span;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Clone)]
pub struct LifecycleLogger;

impl LifecycleLogger {
    /// Installs the global subscriber. `RUST_LOG` overrides the default
    /// `info` filter; `trace` exposes per-allocation events from the core.
    pub fn init() {
        fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
            )
            .with_thread_names(true)
            .with_span_events(FmtSpan::ENTER)
            .init()
    }

    #[inline]
    pub fn log_event(event_type: &str, metadata: Vec<KeyValue>) {
        let span = info_span!(
            "lifecycle_event",
            event_type = event_type,
            otel.kind = "INTERNAL"
        );
        let _guard = span.enter();
        tracing::info!(metadata = ?metadata, "Lifecycle event recorded");
    }
}
