//! ## grepp-core::object
//! **Reference-counted object headers**
//!
//! Every tracked object is header-prefixed storage: an atomic retain
//! count, the object's own [`MemoryPool`], and a type tag, followed by
//! the collaborator-owned value. [`ObjRef`] is a plain `Copy` handle;
//! counting is strictly manual, so there is no `Drop` magic and cycles
//! must be broken by design (back-references hold no count).
//!
//! Lifecycle state machine: `Allocated → Live → Deallocating → Freed`.
//! A construction failure goes `Allocated → Freed` directly, draining any
//! pool entries made so far.

use std::alloc::Layout;
use std::fmt;
use std::mem::MaybeUninit;
use std::ops::Deref;
use std::ptr::{self, NonNull};
use std::sync::atomic::{fence, AtomicUsize, Ordering};

use tracing::trace;

use crate::autorelease::{self, Deferred};
use crate::error::MemoryError;
use crate::heap::{self, stats::STATS};
use crate::pool::MemoryPool;

/// Teardown hook supplied by the object's type.
///
/// Invoked exactly once, when the retain count reaches zero, with the
/// object still otherwise valid and its pool still usable. Hooks may free
/// individual pool entries; the drain that follows tolerates entries that
/// are already gone.
pub trait Finalize {
    fn finalize(&mut self, pool: &MemoryPool) {
        let _ = pool;
    }
}

/// Fixed-offset header preceding every tracked value.
struct Header {
    retain: AtomicUsize,
    pool: MemoryPool,
    type_tag: &'static str,
}

/// Header-prefixed storage. `repr(C)` keeps the header at a fixed offset
/// regardless of the value type.
#[repr(C)]
struct ObjectBox<T> {
    header: Header,
    value: MaybeUninit<T>,
}

/// Handle to a reference-counted object.
///
/// `Copy` by design: ownership is expressed through the retain count, not
/// through the handle. Dereferencing or operating on a handle after the
/// object's count reached zero is a caller contract violation.
pub struct ObjRef<T: Finalize> {
    ptr: NonNull<ObjectBox<T>>,
}

impl<T: Finalize> Clone for ObjRef<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: Finalize> Copy for ObjRef<T> {}

// SAFETY: the retain count is atomic, so handles may cross threads when
// the value itself is shareable. Pool contents stay single-thread-owned
// behind the pool's own lock.
unsafe impl<T: Finalize + Send + Sync> Send for ObjRef<T> {}
unsafe impl<T: Finalize + Send + Sync> Sync for ObjRef<T> {}

/// Decrements, panicking if the count is already zero. Returns the
/// previous count.
fn decrement_or_panic(header: &Header) -> usize {
    let mut current = header.retain.load(Ordering::Relaxed);
    loop {
        if current == 0 {
            // Unrecoverable: either a double release or a release issued
            // mid-teardown. Continuing would corrupt memory silently.
            panic!(
                "release of `{}` whose retain count is already zero",
                header.type_tag
            );
        }
        match header.retain.compare_exchange_weak(
            current,
            current - 1,
            Ordering::Release,
            Ordering::Relaxed,
        ) {
            Ok(_) => return current,
            Err(actual) => current = actual,
        }
    }
}

impl<T: Finalize> ObjRef<T> {
    /// Allocates header-prefixed storage for `value` and returns a live,
    /// retained (count = 1) handle.
    pub fn new(value: T) -> Result<Self, MemoryError> {
        Self::try_init(move |_| Ok(value))
    }

    /// Allocates storage, then runs `init` with access to the object's
    /// memory pool so the constructor can make tracked allocations.
    ///
    /// If `init` fails, everything allocated so far — pool entries and the
    /// header storage itself — is torn down before the error propagates.
    pub fn try_init<F>(init: F) -> Result<Self, MemoryError>
    where
        F: FnOnce(&MemoryPool) -> Result<T, MemoryError>,
    {
        let type_tag = std::any::type_name::<T>();
        let layout = Layout::new::<ObjectBox<T>>();
        let raw = heap::allocate_layout(layout, type_tag)?.cast::<ObjectBox<T>>();

        // SAFETY: fresh, exclusively owned allocation of `layout`; the
        // header is written before anything reads through `raw`.
        unsafe {
            ptr::addr_of_mut!((*raw.as_ptr()).header).write(Header {
                retain: AtomicUsize::new(1),
                pool: MemoryPool::with_tag(type_tag),
                type_tag,
            });
        }

        let obj = Self { ptr: raw };
        match init(obj.pool()) {
            Ok(value) => {
                // SAFETY: the value slot is uninitialized until this write.
                unsafe {
                    ptr::addr_of_mut!((*raw.as_ptr()).value).write(MaybeUninit::new(value));
                }
                STATS.increment_objects_created();
                trace!(type_tag, "object allocated");
                Ok(obj)
            }
            Err(err) => {
                // Allocated -> Freed: the value never existed, but pool
                // entries the constructor made must not leak.
                // SAFETY: only the header was initialized; it is dropped
                // exactly once and the storage freed with its layout.
                unsafe {
                    (*raw.as_ptr()).header.pool.drain();
                    ptr::drop_in_place(ptr::addr_of_mut!((*raw.as_ptr()).header));
                    heap::deallocate(raw.as_ptr().cast(), layout);
                }
                Err(err)
            }
        }
    }

    fn header(&self) -> &Header {
        // SAFETY: a live handle points at initialized header storage.
        unsafe { &(*self.ptr.as_ptr()).header }
    }

    /// The object's memory pool for auxiliary allocations.
    pub fn pool(&self) -> &MemoryPool {
        &self.header().pool
    }

    /// Type tag carried in the header, reported in diagnostics.
    pub fn type_tag(&self) -> &'static str {
        self.header().type_tag
    }

    /// Current retain count. Observational only; never a synchronization
    /// decision input.
    pub fn retain_count(&self) -> usize {
        self.header().retain.load(Ordering::Acquire)
    }

    /// Address of the object storage, usable as an identity.
    pub fn as_ptr(&self) -> *const T {
        // SAFETY: field projection only, no dereference.
        unsafe { (*self.ptr.as_ptr()).value.as_ptr() }
    }

    /// Increments the retain count. Never fails, no other observable
    /// effect.
    pub fn retain(&self) {
        self.header().retain.fetch_add(1, Ordering::Relaxed);
    }

    /// Decrements the retain count; on reaching zero runs the full
    /// teardown sequence: finalize hook, value `Drop`, pool drain, storage
    /// returned to the heap.
    ///
    /// Panics if the count is already zero — that is a double release and
    /// treated as unrecoverable corruption.
    pub fn release(self) {
        let previous = decrement_or_panic(self.header());
        if previous == 1 {
            // Synchronize with every earlier release before teardown reads
            // the value (same protocol as `Arc`).
            fence(Ordering::Acquire);
            // SAFETY: count went 1 -> 0, so this is the only remaining
            // owner and nobody else will touch the storage.
            unsafe { self.dealloc() };
        }
    }

    /// Registers one deferred release in the calling thread's topmost
    /// autorelease pool and returns the handle for chaining.
    pub fn autorelease(self) -> Result<Self, MemoryError> {
        autorelease::add_deferred(Deferred {
            ptr: self.ptr.cast(),
            release: release_erased::<T>,
        })?;
        Ok(self)
    }

    /// Live -> Deallocating -> Freed.
    ///
    /// # Safety
    ///
    /// Must only run once, after the count reached zero.
    unsafe fn dealloc(self) {
        let raw = self.ptr.as_ptr();
        let type_tag = (*raw).header.type_tag;

        // Teardown hook first: collaborator-owned state goes away while
        // the object and its pool are still valid.
        let value = (*raw).value.assume_init_mut();
        value.finalize(&(*raw).header.pool);
        ptr::drop_in_place(value as *mut T);

        // Auxiliary memory after the hook; entries the hook freed itself
        // are already gone and the drain skips them.
        (*raw).header.pool.drain();

        ptr::drop_in_place(ptr::addr_of_mut!((*raw).header));
        heap::deallocate(raw.cast(), Layout::new::<ObjectBox<T>>());
        STATS.increment_objects_deallocated();
        trace!(type_tag, "object deallocated");
    }
}

/// Type-erased release thunk stored in autorelease pool entries.
unsafe fn release_erased<T: Finalize>(ptr: NonNull<()>) {
    ObjRef::<T> { ptr: ptr.cast() }.release();
}

impl<T: Finalize> Deref for ObjRef<T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: liveness is a caller contract of the manual lifecycle;
        // a live object's value slot is initialized.
        unsafe { (*self.ptr.as_ptr()).value.assume_init_ref() }
    }
}

impl<T: Finalize> fmt::Debug for ObjRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjRef")
            .field("type_tag", &self.type_tag())
            .field("retain_count", &self.retain_count())
            .field("addr", &self.as_ptr())
            .finish()
    }
}
