use std::cell::UnsafeCell;
use std::collections::HashMap;
use std::io;
use std::ptr::NonNull;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::backend::SharedBackend;
use crate::error::{Result, ShmError};
use crate::key::{BufferHandle, BufferKey};
use crate::region::SharedRegion;

/// Zero-initialized heap memory aligned to 8 bytes.
///
/// Stored as `UnsafeCell<u64>` words so that several attachments may write
/// through shared references.
pub(crate) struct HeapBlock {
    words: Box<[UnsafeCell<u64>]>,
    len: usize,
}

// SAFETY: the block is plain memory; attachments coordinate access
// themselves (disjoint writes, reads of data no one is writing).
unsafe impl Sync for HeapBlock {}

impl HeapBlock {
    fn zeroed(len: usize) -> io::Result<Self> {
        let n_words = len.div_ceil(8);
        let mut words: Vec<UnsafeCell<u64>> = Vec::new();
        words
            .try_reserve_exact(n_words)
            .map_err(|e| io::Error::new(io::ErrorKind::OutOfMemory, e))?;
        words.resize_with(n_words, || UnsafeCell::new(0u64));
        Ok(HeapBlock {
            words: words.into_boxed_slice(),
            len,
        })
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn as_ptr(&self) -> NonNull<u8> {
        let first = UnsafeCell::raw_get(self.words.as_ptr());
        // A boxed slice pointer is never null (dangling but aligned if empty).
        NonNull::new(first as *mut u8).unwrap_or(NonNull::dangling())
    }
}

/// Single-process backend: buffers are heap blocks shared by `Arc`.
///
/// Attachments from any thread of the creating process see the same memory.
/// Other processes cannot attach, which makes this backend suitable for
/// running workers as threads and for tests without OS shared memory.
#[derive(Debug, Default)]
pub struct HeapBackend {
    blocks: Mutex<HashMap<BufferKey, Arc<HeapBlock>>>,
}

impl HeapBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of buffers currently registered.
    pub fn len(&self) -> usize {
        self.blocks().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn blocks(&self) -> MutexGuard<'_, HashMap<BufferKey, Arc<HeapBlock>>> {
        self.blocks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for HeapBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeapBlock").field("len", &self.len).finish()
    }
}

impl SharedBackend for HeapBackend {
    fn name(&self) -> &str {
        "heap"
    }

    fn create(&self, key: &BufferKey, len: usize) -> Result<BufferHandle> {
        if len == 0 {
            return Err(ShmError::allocation(
                key,
                io::Error::new(io::ErrorKind::InvalidInput, "buffer size must be nonzero"),
            ));
        }
        let mut blocks = self.blocks();
        if blocks.contains_key(key) {
            return Err(ShmError::allocation(
                key,
                io::Error::new(io::ErrorKind::AlreadyExists, "key already in use"),
            ));
        }
        let block = HeapBlock::zeroed(len).map_err(|e| ShmError::allocation(key, e))?;
        blocks.insert(key.clone(), Arc::new(block));
        Ok(BufferHandle::new(key.clone(), len))
    }

    fn attach(&self, handle: &BufferHandle) -> Result<SharedRegion> {
        let block = self
            .blocks()
            .get(handle.key())
            .cloned()
            .ok_or_else(|| {
                ShmError::attach(
                    handle.key(),
                    io::Error::new(io::ErrorKind::NotFound, "no such buffer"),
                )
            })?;
        if block.len() != handle.len() {
            return Err(ShmError::attach(
                handle.key(),
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!(
                        "size mismatch: buffer has {} bytes, handle expects {}",
                        block.len(),
                        handle.len()
                    ),
                ),
            ));
        }
        Ok(SharedRegion::from_heap(handle.key().clone(), block))
    }

    fn destroy(&self, handle: &BufferHandle) -> Result<()> {
        match self.blocks().remove(handle.key()) {
            Some(_) => Ok(()),
            None => Err(ShmError::destroy(
                handle.key(),
                io::Error::new(io::ErrorKind::NotFound, "no such buffer"),
            )),
        }
    }

    fn exists(&self, key: &BufferKey) -> bool {
        self.blocks().contains_key(key)
    }

    fn is_cross_process(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> BufferKey {
        BufferKey::new(s).unwrap()
    }

    #[test]
    fn test_create_beyond_address_space() {
        let backend = HeapBackend::new();
        let result = backend.create(&key("huge"), usize::MAX / 2);
        assert!(matches!(result, Err(ShmError::Allocation { .. })));
        assert!(backend.is_empty());
    }

    #[test]
    fn test_create_attach_zeroed() {
        let backend = HeapBackend::new();
        let handle = backend.create(&key("zeroed"), 64).unwrap();
        let region = backend.attach(&handle).unwrap();
        assert_eq!(region.len(), 64);
        let ptr = region.as_ptr().unwrap();
        assert_eq!(ptr as usize % 8, 0);
        let bytes = unsafe { std::slice::from_raw_parts(ptr, 64) };
        assert!(bytes.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_attachments_share_memory() {
        let backend = HeapBackend::new();
        let handle = backend.create(&key("shared"), 16).unwrap();
        let writer = backend.attach(&handle).unwrap();
        let reader = backend.attach(&handle).unwrap();
        unsafe {
            *writer.as_ptr().unwrap().add(3) = 7;
            assert_eq!(*reader.as_ptr().unwrap().add(3), 7);
        }
    }

    #[test]
    fn test_key_collision() {
        let backend = HeapBackend::new();
        backend.create(&key("dup"), 8).unwrap();
        let err = backend.create(&key("dup"), 8).unwrap_err();
        assert!(matches!(err, ShmError::Allocation { .. }));
    }

    #[test]
    fn test_zero_size_rejected() {
        let backend = HeapBackend::new();
        assert!(matches!(
            backend.create(&key("empty"), 0),
            Err(ShmError::Allocation { .. })
        ));
    }

    #[test]
    fn test_destroy_then_attach_fails() {
        let backend = HeapBackend::new();
        let handle = backend.create(&key("gone"), 8).unwrap();
        backend.destroy(&handle).unwrap();
        assert!(!backend.exists(handle.key()));
        assert!(matches!(backend.attach(&handle), Err(ShmError::Attach { .. })));
        assert!(backend.destroy(&handle).is_err());
        assert!(backend.is_empty());
    }

    #[test]
    fn test_attach_size_mismatch() {
        let backend = HeapBackend::new();
        backend.create(&key("sized"), 32).unwrap();
        let wrong = BufferHandle::new(key("sized"), 16);
        assert!(backend.attach(&wrong).is_err());
    }

    #[test]
    fn test_detach_idempotent() {
        let backend = HeapBackend::new();
        let handle = backend.create(&key("detach"), 8).unwrap();
        let mut region = backend.attach(&handle).unwrap();
        region.detach();
        region.detach();
        assert!(!region.is_attached());
        assert_eq!(region.len(), 0);
        assert!(matches!(region.as_ptr(), Err(ShmError::Detached(_))));
    }

    #[test]
    fn test_recreate_after_destroy_is_fresh() {
        let backend = HeapBackend::new();
        let handle = backend.create(&key("reuse"), 8).unwrap();
        let region = backend.attach(&handle).unwrap();
        unsafe { *region.as_ptr().unwrap() = 0xff };
        drop(region);
        backend.destroy(&handle).unwrap();

        let handle = backend.create(&key("reuse"), 8).unwrap();
        let region = backend.attach(&handle).unwrap();
        assert_eq!(unsafe { *region.as_ptr().unwrap() }, 0);
    }
}
