use thiserror::Error;

/// Memory and lifecycle error conditions.
///
/// Double release is deliberately absent: releasing an object whose retain
/// count is already zero is treated as unrecoverable corruption and panics
/// instead of returning an error.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MemoryError {
    #[error("allocation of {size} bytes failed for `{type_tag}`")]
    AllocationFailed { size: usize, type_tag: &'static str },

    #[error("size computation overflowed: {count} items of {item_size} bytes")]
    Overflow { count: usize, item_size: usize },

    #[error("pointer {addr:#x} is not tracked by this pool")]
    NotPooled { addr: usize },

    #[error("a null pointer cannot be registered with a memory pool")]
    InvalidPointer,

    #[error("no autorelease pool is active on this thread")]
    NoActivePool,

    #[error("autorelease pools must be popped in LIFO order (topmost is pool #{expected}, got pool #{got})")]
    PoolOrderViolation { expected: u64, got: u64 },
}
