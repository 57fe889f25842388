use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use memmap2::MmapMut;

use crate::backend::SharedBackend;
use crate::error::{Result, ShmError};
use crate::key::{BufferHandle, BufferKey};
use crate::region::SharedRegion;

/// Preferred location for shared-memory files on Linux (tmpfs).
pub const DEV_SHM: &str = "/dev/shm";

/// Returns `/dev/shm` when it exists, otherwise the system temp directory.
pub fn default_shm_dir() -> PathBuf {
    let dev_shm = Path::new(DEV_SHM);
    if dev_shm.is_dir() {
        dev_shm.to_path_buf()
    } else {
        std::env::temp_dir()
    }
}

/// File-backed shared memory.
///
/// Each buffer is a file named after its key inside `dir`. Files are sized
/// with `set_len` (so they start zero-filled) and mapped `MAP_SHARED`, which
/// makes writes from one process visible to every other process that maps the
/// same file. `destroy` unlinks the file; mappings that are still alive keep
/// the pages until they are dropped.
#[derive(Debug, Clone)]
pub struct MmapBackend {
    dir: PathBuf,
}

impl MmapBackend {
    /// Create a backend that stores its buffers in `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        MmapBackend { dir: dir.into() }
    }

    /// Path of the file backing `key`.
    pub fn path_for(&self, key: &BufferKey) -> PathBuf {
        self.dir.join(key.as_str())
    }
}

impl Default for MmapBackend {
    fn default() -> Self {
        Self::new(default_shm_dir())
    }
}

impl SharedBackend for MmapBackend {
    fn name(&self) -> &str {
        "mmap"
    }

    fn create(&self, key: &BufferKey, len: usize) -> Result<BufferHandle> {
        if len == 0 {
            return Err(ShmError::allocation(
                key,
                io::Error::new(io::ErrorKind::InvalidInput, "buffer size must be nonzero"),
            ));
        }

        let path = self.path_for(key);
        // `create_new` fails if the file already exists, which is how key
        // collisions surface.
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| ShmError::allocation(key, e))?;

        if let Err(e) = file.set_len(len as u64) {
            let _ = fs::remove_file(&path);
            return Err(ShmError::allocation(key, e));
        }

        Ok(BufferHandle::new(key.clone(), len))
    }

    fn attach(&self, handle: &BufferHandle) -> Result<SharedRegion> {
        let key = handle.key();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(self.path_for(key))
            .map_err(|e| ShmError::attach(key, e))?;

        let actual = file.metadata().map_err(|e| ShmError::attach(key, e))?.len();
        if actual != handle.len() as u64 {
            return Err(ShmError::attach(
                key,
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!(
                        "size mismatch: file has {} bytes, handle expects {}",
                        actual,
                        handle.len()
                    ),
                ),
            ));
        }

        // Map the file shared; the mapping outlives `file`.
        let mmap =
            unsafe { MmapMut::map_mut(&file) }.map_err(|e| ShmError::attach(key, e))?;
        SharedRegion::from_mmap(key.clone(), mmap)
    }

    fn destroy(&self, handle: &BufferHandle) -> Result<()> {
        fs::remove_file(self.path_for(handle.key()))
            .map_err(|e| ShmError::destroy(handle.key(), e))
    }

    fn exists(&self, key: &BufferKey) -> bool {
        self.path_for(key).is_file()
    }

    fn is_cross_process(&self) -> bool {
        true
    }
}
