//! # grepp-core
//!
//! Manual reference-counted object lifecycle core.
//! Built with safety, determinism, and maintainability as primary design
//! constraints.
//!
//! Every tracked object carries a fixed-offset header: an atomic retain
//! count and a per-object memory pool for auxiliary allocations whose
//! lifetime is bound to the object. Releases can be deferred through a
//! thread-local stack of autorelease pools and are issued in recorded
//! order when a pool is popped.
//!
//! ### Expectations (Production):
//! - Deterministic teardown: teardown hook, then pool drain, then storage
//!   returned to the heap
//! - No leaks and no double-frees, including on partial-construction
//!   failure paths
//! - Atomic retain counts safe for cross-thread sharing
//!
//! ### Key Submodules:
//! - `heap`: Allocator adapter over the global heap + allocation statistics
//! - `pool`: Per-object tracked auxiliary allocations
//! - `object`: `ObjRef<T>` handles, retain/release/autorelease
//! - `autorelease`: Thread-local deferred-release pool stack
//! - `config`: Runtime limits loaded from YAML
//!
//! ### Future:
//! - Weak-handle registry for breaking ownership cycles by design
//! - Pluggable backing allocators

pub mod autorelease;
pub mod config;
pub mod error;
pub mod heap;
pub mod object;
pub mod pool;

pub mod prelude {
    pub use crate::autorelease::{PoolHandle, ScopedPool};
    pub use crate::error::*;
    pub use crate::object::*;
    pub use crate::pool::*;
}

pub use error::MemoryError;
pub use object::{Finalize, ObjRef};
pub use pool::MemoryPool;
