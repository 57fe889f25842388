use std::fmt::Debug;

use crate::error::Result;
use crate::key::{BufferHandle, BufferKey};
use crate::region::SharedRegion;

/// Trait for pluggable shared-memory backends (mmap files, heap, etc.).
///
/// A buffer goes through `create` -> `attach`/`detach` (any number of times,
/// from any participant) -> `destroy`. The creator is responsible for calling
/// `destroy` exactly once, after every participant has detached.
pub trait SharedBackend: Send + Sync + Debug {
    /// Returns the name of this backend (e.g., "mmap", "heap").
    fn name(&self) -> &str;

    /// Reserve a zero-filled buffer of `len` bytes under `key`.
    ///
    /// Fails with `ShmError::Allocation` if the key is already taken, `len`
    /// is zero, or the backing store cannot be reserved.
    fn create(&self, key: &BufferKey, len: usize) -> Result<BufferHandle>;

    /// Map the buffer into the calling process.
    ///
    /// Fails with `ShmError::Attach` if the buffer does not exist, its size
    /// differs from `handle.len()`, or the mapping fails.
    fn attach(&self, handle: &BufferHandle) -> Result<SharedRegion>;

    /// Release the buffer from the system.
    ///
    /// Regions still attached keep their memory alive until dropped, but no
    /// new attachment can be made.
    fn destroy(&self, handle: &BufferHandle) -> Result<()>;

    /// Returns true if a buffer is currently registered under `key`.
    fn exists(&self, key: &BufferKey) -> bool;

    /// Returns true if processes other than the creator can attach.
    fn is_cross_process(&self) -> bool;
}
