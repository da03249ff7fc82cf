//! ## grepp-core::heap::stats
//! **Memory allocation statistics and tracking**
//!
//! Process-wide counters for heap traffic and object lifecycle events.
//! All counters use atomic operations and are safe to read from any
//! thread; they are observational only.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Global statistics instance updated by the heap adapter, the object
/// lifecycle, and the autorelease stack.
pub static STATS: MemoryStats = MemoryStats::new();

/// Memory statistics tracker.
pub struct MemoryStats {
    heap_allocations: AtomicUsize,
    heap_deallocations: AtomicUsize,
    heap_reallocations: AtomicUsize,
    failed_allocations: AtomicUsize,
    objects_created: AtomicUsize,
    objects_deallocated: AtomicUsize,
    pools_pushed: AtomicUsize,
    pools_drained: AtomicUsize,
}

/// Point-in-time copy of all counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub heap_allocations: usize,
    pub heap_deallocations: usize,
    pub heap_reallocations: usize,
    pub failed_allocations: usize,
    pub objects_created: usize,
    pub objects_deallocated: usize,
    pub pools_pushed: usize,
    pub pools_drained: usize,
}

impl MemoryStats {
    /// Creates a tracker with all counters at zero.
    pub const fn new() -> Self {
        MemoryStats {
            heap_allocations: AtomicUsize::new(0),
            heap_deallocations: AtomicUsize::new(0),
            heap_reallocations: AtomicUsize::new(0),
            failed_allocations: AtomicUsize::new(0),
            objects_created: AtomicUsize::new(0),
            objects_deallocated: AtomicUsize::new(0),
            pools_pushed: AtomicUsize::new(0),
            pools_drained: AtomicUsize::new(0),
        }
    }

    #[inline]
    pub fn increment_allocations(&self) {
        self.heap_allocations.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn increment_deallocations(&self) {
        self.heap_deallocations.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn increment_reallocations(&self) {
        self.heap_reallocations.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn increment_failed_allocations(&self) {
        self.failed_allocations.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn increment_objects_created(&self) {
        self.objects_created.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn increment_objects_deallocated(&self) {
        self.objects_deallocated.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn increment_pools_pushed(&self) {
        self.pools_pushed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn increment_pools_drained(&self) {
        self.pools_drained.fetch_add(1, Ordering::Relaxed);
    }

    pub fn heap_allocations(&self) -> usize {
        self.heap_allocations.load(Ordering::Relaxed)
    }

    pub fn heap_deallocations(&self) -> usize {
        self.heap_deallocations.load(Ordering::Relaxed)
    }

    pub fn failed_allocations(&self) -> usize {
        self.failed_allocations.load(Ordering::Relaxed)
    }

    pub fn objects_created(&self) -> usize {
        self.objects_created.load(Ordering::Relaxed)
    }

    pub fn objects_deallocated(&self) -> usize {
        self.objects_deallocated.load(Ordering::Relaxed)
    }

    /// Copies every counter at once for delta computations.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            heap_allocations: self.heap_allocations.load(Ordering::Relaxed),
            heap_deallocations: self.heap_deallocations.load(Ordering::Relaxed),
            heap_reallocations: self.heap_reallocations.load(Ordering::Relaxed),
            failed_allocations: self.failed_allocations.load(Ordering::Relaxed),
            objects_created: self.objects_created.load(Ordering::Relaxed),
            objects_deallocated: self.objects_deallocated.load(Ordering::Relaxed),
            pools_pushed: self.pools_pushed.load(Ordering::Relaxed),
            pools_drained: self.pools_drained.load(Ordering::Relaxed),
        }
    }
}

impl Default for MemoryStats {
    fn default() -> Self {
        Self::new()
    }
}
