//! ## grepp-core::autorelease
//! **Thread-local deferred-release pool stack**
//!
//! Each thread owns an independent stack of autorelease pools, created
//! lazily on first use. Only the topmost pool receives new deferred
//! entries, pools must be popped in strict LIFO order, and popping a pool
//! issues its deferred releases in insertion order — one release per
//! recorded occurrence, duplicates included.
//!
//! The pool being popped is removed from the stack *before* its releases
//! run, so a teardown hook that autoreleases some other object lands in
//! whatever pool is topmost at that moment (possibly one below the pool
//! being drained). Cross-thread autorelease into another thread's stack
//! is not supported and is a usage error.
//!
//! On thread exit any remaining pools are drained most-nested first.

use std::cell::RefCell;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::{error, trace, warn};

use crate::error::MemoryError;
use crate::heap::stats::STATS;

/// One recorded deferred release: a type-erased object pointer plus the
/// thunk that releases it.
pub(crate) struct Deferred {
    pub(crate) ptr: NonNull<()>,
    pub(crate) release: unsafe fn(NonNull<()>),
}

/// Identifies one pushed pool; required to pop it again.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PoolHandle(u64);

struct AutoreleasePool {
    id: u64,
    entries: Vec<Deferred>,
}

struct PoolStack {
    pools: Vec<AutoreleasePool>,
    next_id: u64,
}

impl PoolStack {
    const fn new() -> Self {
        Self {
            pools: Vec::new(),
            next_id: 1,
        }
    }
}

impl Drop for PoolStack {
    fn drop(&mut self) {
        // Thread exit: remaining pools drain most-nested first. Releases
        // that re-enter this thread's stack at this point are a usage
        // error (the thread-local is already being destroyed).
        while let Some(pool) = self.pools.pop() {
            trace!(
                pool = pool.id,
                entries = pool.entries.len(),
                "draining autorelease pool at thread exit"
            );
            for deferred in pool.entries {
                // SAFETY: each entry records exactly one owed release for
                // an object that is still live.
                unsafe { (deferred.release)(deferred.ptr) };
            }
            STATS.increment_pools_drained();
        }
    }
}

thread_local! {
    static STACK: RefCell<PoolStack> = const { RefCell::new(PoolStack::new()) };
}

/// Entry count at which `add_deferred` emits a warning (0 = disabled).
static WARN_POOL_ENTRIES: AtomicUsize = AtomicUsize::new(0);

pub(crate) fn set_warn_pool_entries(threshold: usize) {
    WARN_POOL_ENTRIES.store(threshold, Ordering::Relaxed);
}

/// Creates a new pool and makes it the topmost pool for this thread.
pub fn push() -> PoolHandle {
    STACK.with(|stack| {
        let mut stack = stack.borrow_mut();
        let id = stack.next_id;
        stack.next_id += 1;
        stack.pools.push(AutoreleasePool {
            id,
            entries: Vec::new(),
        });
        STATS.increment_pools_pushed();
        trace!(pool = id, depth = stack.pools.len(), "autorelease pool pushed");
        PoolHandle(id)
    })
}

/// Appends one deferred release to the topmost pool.
pub(crate) fn add_deferred(entry: Deferred) -> Result<(), MemoryError> {
    STACK.with(|stack| {
        let mut stack = stack.borrow_mut();
        let pool = stack.pools.last_mut().ok_or(MemoryError::NoActivePool)?;
        pool.entries.push(entry);

        let warn_at = WARN_POOL_ENTRIES.load(Ordering::Relaxed);
        if warn_at != 0 && pool.entries.len() == warn_at {
            warn!(
                pool = pool.id,
                entries = warn_at,
                "autorelease pool has grown unusually large"
            );
        }
        Ok(())
    })
}

/// Pops `handle`'s pool and issues its deferred releases in insertion
/// order. Returns the number of releases issued.
///
/// Fails with [`MemoryError::PoolOrderViolation`] unless `handle` refers
/// to the current topmost pool.
pub fn pop(handle: PoolHandle) -> Result<usize, MemoryError> {
    let pool = STACK.with(|stack| {
        let mut stack = stack.borrow_mut();
        let top_id = stack.pools.last().map(|pool| pool.id);
        match top_id {
            None => Err(MemoryError::NoActivePool),
            Some(id) if id != handle.0 => Err(MemoryError::PoolOrderViolation {
                expected: id,
                got: handle.0,
            }),
            Some(_) => stack.pools.pop().ok_or(MemoryError::NoActivePool),
        }
    })?;

    // The releases run outside the stack borrow: teardown hooks may push
    // pools or autorelease other objects re-entrantly, and those entries
    // belong to whatever pool is topmost now.
    let count = pool.entries.len();
    trace!(pool = pool.id, entries = count, "draining autorelease pool");
    for deferred in pool.entries {
        // SAFETY: each entry records exactly one owed release for an
        // object that is still live.
        unsafe { (deferred.release)(deferred.ptr) };
    }
    STATS.increment_pools_drained();
    Ok(count)
}

/// Number of pools currently on this thread's stack.
pub fn depth() -> usize {
    STACK.with(|stack| stack.borrow().pools.len())
}

/// RAII guard that pushes a pool on creation and pops it on drop.
pub struct ScopedPool {
    handle: PoolHandle,
}

impl ScopedPool {
    pub fn new() -> Self {
        Self { handle: push() }
    }

    pub fn handle(&self) -> PoolHandle {
        self.handle
    }
}

impl Default for ScopedPool {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ScopedPool {
    fn drop(&mut self) {
        // Drops run during unwind too, so a discipline violation here is
        // reported rather than escalated to a second panic.
        if let Err(err) = pop(self.handle) {
            error!(%err, "scoped autorelease pool dropped out of order");
        }
    }
}
