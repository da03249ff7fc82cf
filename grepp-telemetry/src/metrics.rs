//! ## grepp-telemetry::metrics
//! **Prometheus exporter for lifecycle counters**
//!
//! Bridges the core's atomic [`StatsSnapshot`] counters into a prometheus
//! registry and exposes them in text format. Autorelease drain sizes are
//! observed separately since the core only reports them per `pop`.

use grepp_core::heap::stats::StatsSnapshot;
use prometheus::{Counter, Histogram, HistogramOpts, Registry};

#[derive(Debug, Clone)]
pub struct MetricsRecorder {
    pub registry: Registry,
    pub objects_created: Counter,
    pub objects_deallocated: Counter,
    pub heap_allocations: Counter,
    pub heap_deallocations: Counter,
    pub failed_allocations: Counter,
    pub drain_entries: Histogram,
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsRecorder {
    pub fn new() -> Self {
        let registry = Registry::new();
        let objects_created =
            Counter::new("grepp_objects_created_total", "Objects allocated and retained").unwrap();
        let objects_deallocated = Counter::new(
            "grepp_objects_deallocated_total",
            "Objects torn down after their retain count reached zero",
        )
        .unwrap();
        let heap_allocations =
            Counter::new("grepp_heap_allocations_total", "Heap requests served").unwrap();
        let heap_deallocations =
            Counter::new("grepp_heap_deallocations_total", "Heap blocks returned").unwrap();
        let failed_allocations = Counter::new(
            "grepp_failed_allocations_total",
            "Heap requests rejected or failed",
        )
        .unwrap();

        let drain_entries = Histogram::with_opts(
            HistogramOpts::new(
                "grepp_autorelease_drain_entries",
                "Deferred releases issued per pool drain",
            )
            .buckets(vec![1.0, 16.0, 256.0, 4096.0, 65536.0]),
        )
        .unwrap();

        registry.register(Box::new(objects_created.clone())).unwrap();
        registry
            .register(Box::new(objects_deallocated.clone()))
            .unwrap();
        registry.register(Box::new(heap_allocations.clone())).unwrap();
        registry
            .register(Box::new(heap_deallocations.clone()))
            .unwrap();
        registry
            .register(Box::new(failed_allocations.clone()))
            .unwrap();
        registry.register(Box::new(drain_entries.clone())).unwrap();

        Self {
            registry,
            objects_created,
            objects_deallocated,
            heap_allocations,
            heap_deallocations,
            failed_allocations,
            drain_entries,
        }
    }

    pub fn gather_metrics(&self) -> Result<String, prometheus::Error> {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let mut buffer = Vec::<u8>::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer).unwrap())
    }

    /// Feeds the counter deltas between two core snapshots into the
    /// registry. Call with the previous snapshot retained from the last
    /// scrape.
    pub fn record_snapshot(&self, previous: &StatsSnapshot, current: &StatsSnapshot) {
        let delta = |cur: usize, prev: usize| cur.saturating_sub(prev) as f64;
        self.objects_created
            .inc_by(delta(current.objects_created, previous.objects_created));
        self.objects_deallocated.inc_by(delta(
            current.objects_deallocated,
            previous.objects_deallocated,
        ));
        self.heap_allocations
            .inc_by(delta(current.heap_allocations, previous.heap_allocations));
        self.heap_deallocations.inc_by(delta(
            current.heap_deallocations,
            previous.heap_deallocations,
        ));
        self.failed_allocations.inc_by(delta(
            current.failed_allocations,
            previous.failed_allocations,
        ));
    }

    /// Records the entry count returned by one autorelease pool `pop`.
    pub fn observe_drain(&self, entries: usize) {
        self.drain_entries.observe(entries as f64);
    }
}
