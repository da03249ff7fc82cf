//! ## grepp-core::heap
//! **Allocator adapter over the global heap**
//!
//! Thin wrapper around `std::alloc` that centralizes out-of-memory
//! detection. Underlying failures never surface as dangling pointers;
//! they become [`MemoryError::AllocationFailed`] carrying the requested
//! size and the requesting object's type tag.
//!
//! The heap is the only resource in this core that is genuinely shared
//! across threads; the global allocator is assumed thread-safe and no
//! additional locking is added around allocation calls.

pub mod stats;

use std::alloc::{self, Layout};
use std::ptr::NonNull;
use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::trace;

use crate::error::MemoryError;
use self::stats::STATS;

/// Alignment for untyped pool allocations. Matches the strictest
/// fundamental alignment, the same guarantee `malloc` gives.
pub const DEFAULT_ALIGN: usize = 16;

/// Upper bound on a single heap request in bytes. Zero means unlimited.
static MAX_ALLOCATION: AtomicUsize = AtomicUsize::new(0);

/// Sets the single-request guard-rail (0 = unlimited).
pub fn set_max_allocation(limit: usize) {
    MAX_ALLOCATION.store(limit, Ordering::Relaxed);
}

/// Returns the current single-request guard-rail (0 = unlimited).
pub fn max_allocation() -> usize {
    MAX_ALLOCATION.load(Ordering::Relaxed)
}

fn exceeds_limit(size: usize, limit: usize) -> bool {
    limit != 0 && size > limit
}

fn untyped_layout(size: usize, type_tag: &'static str) -> Result<Layout, MemoryError> {
    // `std::alloc` forbids zero-size layouts; a zero-byte request still
    // yields a unique, freeable pointer.
    Layout::from_size_align(size.max(1), DEFAULT_ALIGN)
        .map_err(|_| MemoryError::AllocationFailed { size, type_tag })
}

/// Allocates `size` bytes with [`DEFAULT_ALIGN`] alignment.
///
/// Returns the pointer together with the layout it must later be freed
/// (or reallocated) with.
pub fn allocate(size: usize, type_tag: &'static str) -> Result<(NonNull<u8>, Layout), MemoryError> {
    let layout = untyped_layout(size, type_tag)?;
    let ptr = allocate_layout(layout, type_tag)?;
    Ok((ptr, layout))
}

/// Allocates storage for an explicit layout (object headers use their own
/// type-derived layout rather than [`DEFAULT_ALIGN`]).
pub fn allocate_layout(layout: Layout, type_tag: &'static str) -> Result<NonNull<u8>, MemoryError> {
    if exceeds_limit(layout.size(), max_allocation()) {
        STATS.increment_failed_allocations();
        return Err(MemoryError::AllocationFailed {
            size: layout.size(),
            type_tag,
        });
    }

    // SAFETY: `layout` has non-zero size.
    let raw = unsafe { alloc::alloc(layout) };
    match NonNull::new(raw) {
        Some(ptr) => {
            STATS.increment_allocations();
            trace!(size = layout.size(), type_tag, "heap allocation");
            Ok(ptr)
        }
        None => {
            STATS.increment_failed_allocations();
            Err(MemoryError::AllocationFailed {
                size: layout.size(),
                type_tag,
            })
        }
    }
}

/// Grows or shrinks an allocation to `new_size` bytes.
///
/// On success the old pointer is invalidated and the new pointer/layout
/// pair is returned. On failure the original pointer and its contents
/// remain valid and owned by the caller.
///
/// # Safety
///
/// `ptr` must have been obtained from this module with exactly
/// `old_layout`.
pub unsafe fn reallocate(
    ptr: NonNull<u8>,
    old_layout: Layout,
    new_size: usize,
    type_tag: &'static str,
) -> Result<(NonNull<u8>, Layout), MemoryError> {
    // A block's alignment is fixed at allocation time and `realloc`
    // keeps it; the rebound layout must describe that alignment, not
    // [`DEFAULT_ALIGN`] — adopted entries can be aligned differently.
    let new_layout = Layout::from_size_align(new_size.max(1), old_layout.align())
        .map_err(|_| MemoryError::AllocationFailed {
            size: new_size,
            type_tag,
        })?;
    if exceeds_limit(new_layout.size(), max_allocation()) {
        STATS.increment_failed_allocations();
        return Err(MemoryError::AllocationFailed {
            size: new_size,
            type_tag,
        });
    }

    let raw = alloc::realloc(ptr.as_ptr(), old_layout, new_layout.size());
    match NonNull::new(raw) {
        Some(new_ptr) => {
            STATS.increment_reallocations();
            trace!(
                old_size = old_layout.size(),
                new_size = new_layout.size(),
                type_tag,
                "heap reallocation"
            );
            Ok((new_ptr, new_layout))
        }
        None => {
            STATS.increment_failed_allocations();
            Err(MemoryError::AllocationFailed {
                size: new_size,
                type_tag,
            })
        }
    }
}

/// Returns an allocation to the heap. No-op for the null sentinel.
///
/// # Safety
///
/// A non-null `ptr` must have been obtained from this module with exactly
/// `layout`, and must not be used afterwards.
pub unsafe fn deallocate(ptr: *mut u8, layout: Layout) {
    if ptr.is_null() {
        return;
    }
    alloc::dealloc(ptr, layout);
    STATS.increment_deallocations();
}
