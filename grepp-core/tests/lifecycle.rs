//! End-to-end lifecycle behavior: retain/release arithmetic, teardown
//! ordering, pool-tracked memory, and the autorelease stack discipline.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use grepp_core::autorelease::{self, ScopedPool};
use grepp_core::{Finalize, MemoryError, MemoryPool, ObjRef};

/// Records how many times its teardown hook ran.
struct Probe {
    name: &'static str,
    torn_down: Arc<AtomicUsize>,
    teardown_log: Arc<Mutex<Vec<&'static str>>>,
}

impl Probe {
    fn new(name: &'static str) -> (Self, Arc<AtomicUsize>, Arc<Mutex<Vec<&'static str>>>) {
        let torn_down = Arc::new(AtomicUsize::new(0));
        let log = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                name,
                torn_down: Arc::clone(&torn_down),
                teardown_log: Arc::clone(&log),
            },
            torn_down,
            log,
        )
    }

    fn with_log(
        name: &'static str,
        log: &Arc<Mutex<Vec<&'static str>>>,
    ) -> (Self, Arc<AtomicUsize>) {
        let torn_down = Arc::new(AtomicUsize::new(0));
        (
            Self {
                name,
                torn_down: Arc::clone(&torn_down),
                teardown_log: Arc::clone(log),
            },
            torn_down,
        )
    }
}

impl Finalize for Probe {
    fn finalize(&mut self, _pool: &MemoryPool) {
        self.torn_down.fetch_add(1, Ordering::SeqCst);
        self.teardown_log.lock().unwrap().push(self.name);
    }
}

#[test]
fn retain_count_matches_retain_release_arithmetic() {
    let (probe, torn_down, _) = Probe::new("obj");
    let obj = ObjRef::new(probe).unwrap();
    assert_eq!(obj.retain_count(), 1);

    for _ in 0..5 {
        obj.retain();
    }
    for _ in 0..3 {
        obj.release();
    }
    assert_eq!(obj.retain_count(), 3); // 1 + 5 - 3
    assert_eq!(torn_down.load(Ordering::SeqCst), 0);

    obj.release();
    obj.release();
    obj.release();
    assert_eq!(torn_down.load(Ordering::SeqCst), 1);
}

#[test]
fn teardown_runs_exactly_once_with_pool_access() {
    /// Frees one of its own pool entries from the teardown hook; the
    /// drain that follows must tolerate the missing entry.
    struct HookFree {
        tracked: usize,
        torn_down: Arc<AtomicUsize>,
    }

    impl Finalize for HookFree {
        fn finalize(&mut self, pool: &MemoryPool) {
            self.torn_down.fetch_add(1, Ordering::SeqCst);
            assert_eq!(pool.tracked(), 2);
            pool.free(self.tracked as *mut u8).unwrap();
            assert_eq!(pool.tracked(), 1);
        }
    }

    let torn_down = Arc::new(AtomicUsize::new(0));
    let torn_down_clone = Arc::clone(&torn_down);
    let obj = ObjRef::try_init(move |pool| {
        let first = pool.allocate(32)?;
        pool.allocate(48)?;
        Ok(HookFree {
            tracked: first.as_ptr() as usize,
            torn_down: torn_down_clone,
        })
    })
    .unwrap();

    assert_eq!(obj.pool().tracked(), 2);
    obj.release();
    assert_eq!(torn_down.load(Ordering::SeqCst), 1);
}

#[test]
fn drained_pool_no_longer_tracks_its_pointers() {
    let pool = MemoryPool::new();
    let ptr = pool.allocate(64).unwrap().as_ptr();
    pool.drain();
    assert_eq!(
        pool.free(ptr),
        Err(MemoryError::NotPooled { addr: ptr as usize })
    );
}

#[test]
fn overflowing_item_allocations_are_rejected_before_allocating() {
    let pool = MemoryPool::new();
    for (count, item_size) in [
        (usize::MAX, 2),
        (usize::MAX / 2 + 1, 2),
        (usize::MAX / 8 + 1, 8),
        (2, usize::MAX),
    ] {
        assert_eq!(
            pool.allocate_items(count, item_size),
            Err(MemoryError::Overflow { count, item_size })
        );
    }
    assert_eq!(pool.tracked(), 0);
}

#[test]
fn autorelease_drains_in_insertion_order_with_duplicates() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let (probe_a, a_torn) = Probe::with_log("a", &log);
    let (probe_b, b_torn) = Probe::with_log("b", &log);

    let a = ObjRef::new(probe_a).unwrap();
    let b = ObjRef::new(probe_b).unwrap();
    a.retain();
    a.retain(); // a: 3, survives the pool by one count
    assert_eq!(a.retain_count(), 3);
    assert_eq!(b.retain_count(), 1);

    let pool = autorelease::push();
    a.autorelease().unwrap();
    b.autorelease().unwrap();
    a.autorelease().unwrap();
    let drained = autorelease::pop(pool).unwrap();
    assert_eq!(drained, 3);

    // Net effect: a lost exactly its two recorded releases, b lost one.
    assert_eq!(a.retain_count(), 1);
    assert_eq!(a_torn.load(Ordering::SeqCst), 0);
    assert_eq!(b_torn.load(Ordering::SeqCst), 1);
    assert_eq!(*log.lock().unwrap(), vec!["b"]);

    a.release();
    assert_eq!(*log.lock().unwrap(), vec!["b", "a"]);
}

#[test]
fn pools_must_pop_in_lifo_order() {
    let p1 = autorelease::push();
    let p2 = autorelease::push();

    assert!(matches!(
        autorelease::pop(p1),
        Err(MemoryError::PoolOrderViolation { .. })
    ));
    autorelease::pop(p2).unwrap();
    autorelease::pop(p1).unwrap();
}

#[test]
fn autorelease_without_a_pool_is_an_error() {
    let (probe, _, _) = Probe::new("orphan");
    let obj = ObjRef::new(probe).unwrap();
    assert_eq!(obj.autorelease().unwrap_err(), MemoryError::NoActivePool);
    obj.release();
}

#[test]
fn reentrant_autorelease_lands_in_the_pool_below() {
    /// Teardown autoreleases another object; during a pool drain the
    /// entry must land in whatever pool is topmost at that moment.
    struct Chained {
        other: ObjRef<Probe>,
    }

    impl Finalize for Chained {
        fn finalize(&mut self, _pool: &MemoryPool) {
            self.other.autorelease().unwrap();
        }
    }

    let (probe, other_torn, _) = Probe::new("chained-target");
    let other = ObjRef::new(probe).unwrap();

    let outer = autorelease::push();
    let inner = autorelease::push();
    let chained = ObjRef::new(Chained { other }).unwrap();
    chained.autorelease().unwrap();

    autorelease::pop(inner).unwrap();
    // `other`'s deferred release moved to the outer pool; nothing is owed
    // until that pool drains.
    assert_eq!(other_torn.load(Ordering::SeqCst), 0);

    autorelease::pop(outer).unwrap();
    assert_eq!(other_torn.load(Ordering::SeqCst), 1);
}

#[test]
fn scoped_pool_releases_on_drop() {
    let (probe, torn_down, _) = Probe::new("scoped");
    let obj = ObjRef::new(probe).unwrap();
    {
        let _pool = ScopedPool::new();
        obj.autorelease().unwrap();
        assert_eq!(torn_down.load(Ordering::SeqCst), 0);
    }
    assert_eq!(torn_down.load(Ordering::SeqCst), 1);
}

#[test]
fn thread_exit_drains_remaining_pools() {
    let (probe, torn_down, _) = Probe::new("abandoned");
    let handle = std::thread::spawn(move || {
        let _never_popped = autorelease::push();
        let obj = ObjRef::new(probe).unwrap();
        obj.autorelease().unwrap();
    });
    handle.join().unwrap();
    assert_eq!(torn_down.load(Ordering::SeqCst), 1);
}

#[test]
fn cross_thread_retain_release_is_exact() {
    let (probe, torn_down, _) = Probe::new("shared");
    let obj = ObjRef::new(probe).unwrap();

    let mut handles = Vec::new();
    for _ in 0..8 {
        handles.push(std::thread::spawn(move || {
            for _ in 0..1000 {
                obj.retain();
            }
            for _ in 0..1000 {
                obj.release();
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(obj.retain_count(), 1);
    assert_eq!(torn_down.load(Ordering::SeqCst), 0);
    obj.release();
    assert_eq!(torn_down.load(Ordering::SeqCst), 1);
}

#[test]
fn failed_construction_reports_the_error_and_leaks_nothing() {
    let (probe, torn_down, _) = Probe::new("never-born");
    let result: Result<ObjRef<Probe>, _> = ObjRef::try_init(move |pool| {
        pool.allocate(128)?;
        pool.allocate(256)?;
        let _ = probe;
        Err(MemoryError::InvalidPointer)
    });

    assert_eq!(result.unwrap_err(), MemoryError::InvalidPointer);
    // The object never reached Live: no teardown hook, no leak of the two
    // pool entries (drained on the failure path).
    assert_eq!(torn_down.load(Ordering::SeqCst), 0);
}

#[test]
fn resize_round_trip_preserves_contents() {
    let pool = MemoryPool::new();
    let ptr = pool.allocate(64).unwrap();
    let old_addr = ptr.as_ptr();

    // SAFETY: freshly allocated 64-byte region, exclusively owned here.
    unsafe {
        let bytes = std::slice::from_raw_parts_mut(ptr.as_ptr(), 64);
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = i as u8;
        }
    }

    let grown = pool.resize(ptr, 128).unwrap();

    // SAFETY: `grown` references 128 valid bytes; the first 64 carry over.
    unsafe {
        let bytes = std::slice::from_raw_parts_mut(grown.as_ptr(), 128);
        for (i, byte) in bytes.iter().take(64).enumerate() {
            assert_eq!(*byte, i as u8);
        }
        for (i, byte) in bytes.iter_mut().enumerate().skip(64) {
            *byte = (255 - i) as u8;
        }
        for (i, byte) in bytes.iter().enumerate().skip(64) {
            assert_eq!(*byte, (255 - i) as u8);
        }
    }

    // The superseded pointer is no longer tracked (when realloc moved it).
    assert_eq!(pool.tracked(), 1);
    if grown.as_ptr() != old_addr {
        assert!(matches!(
            pool.free(old_addr),
            Err(MemoryError::NotPooled { .. })
        ));
    }
    pool.free(grown.as_ptr()).unwrap();
    assert_eq!(pool.tracked(), 0);
}
