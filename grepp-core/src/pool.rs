//! ## grepp-core::pool
//! **Per-object tracked auxiliary allocations**
//!
//! A [`MemoryPool`] tracks every auxiliary allocation one object requests
//! beyond its fixed header and guarantees all of them are released exactly
//! once, at the latest when the owning object is deallocated. Entries are
//! an unordered set keyed by address; no entry is ever shared between two
//! pools.

use std::alloc::Layout;
use std::collections::HashMap;
use std::ptr::NonNull;

use parking_lot::Mutex;
use tracing::trace;

use crate::error::MemoryError;
use crate::heap;

/// Set of auxiliary allocations bound to one owner's lifetime.
pub struct MemoryPool {
    type_tag: &'static str,
    entries: Mutex<HashMap<usize, Layout>>,
}

impl MemoryPool {
    /// Creates an empty pool. No heap allocation happens until the first
    /// entry is tracked.
    pub fn new() -> Self {
        Self::with_tag("<anonymous>")
    }

    /// Creates an empty pool that reports `type_tag` in allocation
    /// failures and trace events.
    pub fn with_tag(type_tag: &'static str) -> Self {
        Self {
            type_tag,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Registers memory that was not obtained through this pool so it is
    /// freed when the pool is drained. The caller states the layout the
    /// memory was allocated with.
    pub fn adopt(&self, ptr: *mut u8, layout: Layout) -> Result<(), MemoryError> {
        if ptr.is_null() {
            return Err(MemoryError::InvalidPointer);
        }
        self.entries.lock().insert(ptr as usize, layout);
        Ok(())
    }

    /// Allocates `size` bytes of tracked memory.
    ///
    /// A failure here leaves the pool (and the owning object's retain
    /// count) untouched; partially constructed owners stay destructible.
    pub fn allocate(&self, size: usize) -> Result<NonNull<u8>, MemoryError> {
        let (ptr, layout) = heap::allocate(size, self.type_tag)?;
        self.entries.lock().insert(ptr.as_ptr() as usize, layout);
        Ok(ptr)
    }

    /// Allocates tracked memory for `count` items of `item_size` bytes.
    ///
    /// Fails with [`MemoryError::Overflow`] before any allocation attempt
    /// if the total size overflows `usize`.
    pub fn allocate_items(&self, count: usize, item_size: usize) -> Result<NonNull<u8>, MemoryError> {
        let total = count
            .checked_mul(item_size)
            .ok_or(MemoryError::Overflow { count, item_size })?;
        self.allocate(total)
    }

    /// Resizes a tracked allocation to `new_size` bytes.
    ///
    /// On success the tracking entry is rebound to the new pointer and the
    /// old pointer is invalidated. On failure the old entry and its
    /// contents remain valid.
    pub fn resize(&self, ptr: NonNull<u8>, new_size: usize) -> Result<NonNull<u8>, MemoryError> {
        let addr = ptr.as_ptr() as usize;
        let mut entries = self.entries.lock();
        let old_layout = *entries
            .get(&addr)
            .ok_or(MemoryError::NotPooled { addr })?;

        // SAFETY: the entry table records exactly the layout `ptr` was
        // allocated with. The lock is held across the rebinding so a
        // concurrent drain cannot observe a half-updated entry.
        let (new_ptr, new_layout) = unsafe { heap::reallocate(ptr, old_layout, new_size, self.type_tag)? };
        entries.remove(&addr);
        entries.insert(new_ptr.as_ptr() as usize, new_layout);
        Ok(new_ptr)
    }

    /// Resizes a tracked allocation to `count` items of `item_size` bytes,
    /// with the same overflow rule as [`MemoryPool::allocate_items`].
    pub fn resize_items(
        &self,
        ptr: NonNull<u8>,
        count: usize,
        item_size: usize,
    ) -> Result<NonNull<u8>, MemoryError> {
        let total = count
            .checked_mul(item_size)
            .ok_or(MemoryError::Overflow { count, item_size })?;
        self.resize(ptr, total)
    }

    /// Frees one tracked allocation immediately.
    ///
    /// No-op for the null sentinel. A non-null pointer this pool does not
    /// track fails with [`MemoryError::NotPooled`], which defends against
    /// double-free and cross-pool misuse.
    pub fn free(&self, ptr: *mut u8) -> Result<(), MemoryError> {
        if ptr.is_null() {
            return Ok(());
        }
        let addr = ptr as usize;
        let layout = self
            .entries
            .lock()
            .remove(&addr)
            .ok_or(MemoryError::NotPooled { addr })?;
        // SAFETY: the entry table only holds pointers allocated through
        // the heap adapter (or adopted with their stated layout), each
        // tracked at most once.
        unsafe { heap::deallocate(ptr, layout) };
        Ok(())
    }

    /// Releases every remaining tracked entry. Idempotent: entries freed
    /// individually beforehand are simply no longer present.
    pub fn drain(&self) {
        let drained = std::mem::take(&mut *self.entries.lock());
        if drained.is_empty() {
            return;
        }
        trace!(
            type_tag = self.type_tag,
            entries = drained.len(),
            "draining memory pool"
        );
        for (addr, layout) in drained {
            // SAFETY: same contract as in `free`; the entry was removed
            // from the table before this point, so it cannot be freed
            // twice.
            unsafe { heap::deallocate(addr as *mut u8, layout) };
        }
    }

    /// Number of currently tracked entries.
    pub fn tracked(&self) -> usize {
        self.entries.lock().len()
    }
}

impl Default for MemoryPool {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for MemoryPool {
    fn drop(&mut self) {
        self.drain();
    }
}
