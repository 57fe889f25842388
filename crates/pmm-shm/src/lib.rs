//! `pmm-shm` - Named shared-memory buffers for pmm.
//!
//! This crate provides:
//! - `BufferKey` / `BufferHandle` identifying a buffer across processes
//! - A `SharedBackend` trait with create/attach/destroy lifecycle
//! - `MmapBackend`, file-backed `MAP_SHARED` mappings visible to other processes
//! - `HeapBackend`, reference-counted heap blocks for single-process runs
//! - `SharedRegion`, a per-process attachment with idempotent detach

pub mod backend;
pub mod error;
pub mod heap;
pub mod key;
pub mod mmap;
pub mod region;

// Re-export primary types at the crate root for convenience.
pub use backend::SharedBackend;
pub use error::{Result, ShmError};
pub use heap::HeapBackend;
pub use key::{BufferHandle, BufferKey};
pub use mmap::{default_shm_dir, MmapBackend};
pub use region::SharedRegion;
