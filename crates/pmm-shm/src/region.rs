use std::fmt;
use std::io;
use std::ptr::NonNull;
use std::sync::Arc;

use memmap2::MmapMut;

use crate::error::{Result, ShmError};
use crate::heap::HeapBlock;
use crate::key::BufferKey;

/// Keeps the underlying memory of an attachment alive.
pub(crate) enum Mapping {
    Mmap(MmapMut),
    Heap(Arc<HeapBlock>),
}

/// A shared buffer attached to the calling process.
///
/// The region exposes raw memory only. Other attachments of the same buffer
/// (in this or another process) may read and write the bytes concurrently, so
/// typed access is left to callers that know which parts they own.
pub struct SharedRegion {
    key: BufferKey,
    ptr: NonNull<u8>,
    len: usize,
    mapping: Option<Mapping>,
}

// SAFETY: the pointer targets a shared mapping or an `Arc`-owned heap block
// that stays valid until `mapping` is dropped. The region itself never
// dereferences it; synchronization is the responsibility of typed views.
unsafe impl Send for SharedRegion {}
unsafe impl Sync for SharedRegion {}

impl SharedRegion {
    pub(crate) fn from_mmap(key: BufferKey, mut mmap: MmapMut) -> Result<Self> {
        let len = mmap.len();
        let ptr = NonNull::new(mmap.as_mut_ptr())
            .ok_or_else(|| ShmError::attach(&key, io::Error::other("mapping returned null")))?;
        Ok(SharedRegion {
            key,
            ptr,
            len,
            mapping: Some(Mapping::Mmap(mmap)),
        })
    }

    pub(crate) fn from_heap(key: BufferKey, block: Arc<HeapBlock>) -> Self {
        let len = block.len();
        let ptr = block.as_ptr();
        SharedRegion {
            key,
            ptr,
            len,
            mapping: Some(Mapping::Heap(block)),
        }
    }

    pub fn key(&self) -> &BufferKey {
        &self.key
    }

    /// Size of the attached region in bytes, or 0 once detached.
    pub fn len(&self) -> usize {
        if self.is_attached() {
            self.len
        } else {
            0
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_attached(&self) -> bool {
        self.mapping.is_some()
    }

    /// Base address of the region in this process.
    ///
    /// # Errors
    /// Returns `ShmError::Detached` after [`detach`](Self::detach).
    pub fn as_ptr(&self) -> Result<*mut u8> {
        if self.is_attached() {
            Ok(self.ptr.as_ptr())
        } else {
            Err(ShmError::Detached(self.key.to_string()))
        }
    }

    /// Unmap the region from this process. Calling it again is a no-op.
    ///
    /// Detaching only affects this attachment; the buffer stays available to
    /// other participants until it is destroyed.
    pub fn detach(&mut self) {
        self.mapping = None;
    }
}

impl fmt::Debug for SharedRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.mapping {
            Some(Mapping::Mmap(_)) => "mmap",
            Some(Mapping::Heap(_)) => "heap",
            None => "detached",
        };
        f.debug_struct("SharedRegion")
            .field("key", &self.key)
            .field("len", &self.len)
            .field("mapping", &kind)
            .finish()
    }
}
