use std::sync::Arc;

use pmm_kernel::{matrix_bytes, MatrixView, MatrixViewMut};
use pmm_shm::{BufferHandle, BufferKey, SharedBackend};

use crate::error::Result;

/// Handles of the three matrices of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatrixHandles {
    /// Left input.
    pub a: BufferHandle,
    /// Right input.
    pub b: BufferHandle,
    /// Output.
    pub c: BufferHandle,
}

impl MatrixHandles {
    /// Rebuild handles in a worker from the keys it was given.
    pub fn from_keys(dim: usize, a: BufferKey, b: BufferKey, c: BufferKey) -> Result<Self> {
        let len = matrix_bytes(dim)?;
        Ok(MatrixHandles {
            a: BufferHandle::new(a, len),
            b: BufferHandle::new(b, len),
            c: BufferHandle::new(c, len),
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &BufferHandle> {
        [&self.a, &self.b, &self.c].into_iter()
    }

    pub fn keys(&self) -> Vec<BufferKey> {
        self.iter().map(|h| h.key().clone()).collect()
    }
}

/// The shared matrices of one run, owned by the orchestrator.
///
/// Buffers are created together and destroyed together. If the value is
/// dropped without [`release`](Self::release) (an error unwound the run),
/// the buffers are destroyed on drop so nothing outlives the process.
#[derive(Debug)]
pub struct MatrixBuffers {
    backend: Arc<dyn SharedBackend>,
    handles: MatrixHandles,
    dim: usize,
    released: bool,
}

impl MatrixBuffers {
    /// Create A, B and C for a `dim`x`dim` multiplication under fresh keys.
    ///
    /// If any creation fails, buffers created so far are destroyed before
    /// the error is returned.
    pub fn allocate(backend: Arc<dyn SharedBackend>, dim: usize) -> Result<Self> {
        let len = matrix_bytes(dim)?;
        let a = create_one(backend.as_ref(), "a", len, &[])?;
        let b = create_one(backend.as_ref(), "b", len, &[&a])?;
        let c = create_one(backend.as_ref(), "c", len, &[&a, &b])?;
        Ok(MatrixBuffers {
            backend,
            handles: MatrixHandles { a, b, c },
            dim,
            released: false,
        })
    }

    pub fn handles(&self) -> &MatrixHandles {
        &self.handles
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Fill both inputs with `value`.
    ///
    /// Must run before any worker is launched.
    pub fn initialize(&self, value: f64) -> Result<()> {
        for handle in [&self.handles.a, &self.handles.b] {
            let mut region = self.backend.attach(handle)?;
            {
                // No worker exists yet, so this attachment is the only one.
                let mut view = unsafe { MatrixViewMut::from_region(&mut region, self.dim)? };
                view.fill(value);
            }
            region.detach();
        }
        Ok(())
    }

    /// Attach `handle` read-only and pass a view of it to `f`.
    ///
    /// Must only be used while no worker is writing the buffer.
    pub fn read<T>(
        &self,
        handle: &BufferHandle,
        f: impl FnOnce(&MatrixView<'_>) -> T,
    ) -> Result<T> {
        let mut region = self.backend.attach(handle)?;
        let out = {
            let view = unsafe { MatrixView::from_region(&region, self.dim)? };
            f(&view)
        };
        region.detach();
        Ok(out)
    }

    /// Destroy all three buffers.
    ///
    /// Every buffer is attempted; the first failure is returned.
    pub fn release(mut self) -> Result<()> {
        self.released = true;
        let mut first_err = None;
        for handle in self.handles.iter() {
            if let Err(e) = self.backend.destroy(handle) {
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }
}

/// Create one buffer, destroying `created` if that fails.
fn create_one(
    backend: &dyn SharedBackend,
    role: &str,
    len: usize,
    created: &[&BufferHandle],
) -> Result<BufferHandle> {
    BufferKey::unique(role)
        .and_then(|key| backend.create(&key, len))
        .map_err(|e| {
            for handle in created {
                let _ = backend.destroy(handle);
            }
            e.into()
        })
}

impl Drop for MatrixBuffers {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        for handle in self.handles.iter() {
            let _ = self.backend.destroy(handle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pmm_shm::{HeapBackend, MmapBackend};

    #[test]
    fn test_allocate_initialize_read() {
        let backend = Arc::new(HeapBackend::new());
        let buffers = MatrixBuffers::allocate(backend.clone(), 3).unwrap();
        assert_eq!(backend.len(), 3);
        buffers.initialize(1.0).unwrap();

        let handles = buffers.handles().clone();
        let a_sum = buffers.read(&handles.a, |v| v.as_slice().iter().sum::<f64>()).unwrap();
        assert_eq!(a_sum, 9.0);
        let c_zero = buffers
            .read(&handles.c, |v| v.as_slice().iter().all(|&x| x == 0.0))
            .unwrap();
        assert!(c_zero);

        buffers.release().unwrap();
        assert!(backend.is_empty());
    }

    #[test]
    fn test_drop_destroys_unreleased() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(MmapBackend::new(dir.path()));
        let keys = {
            let buffers = MatrixBuffers::allocate(backend.clone(), 2).unwrap();
            let keys = buffers.handles().keys();
            assert!(keys.iter().all(|k| backend.exists(k)));
            keys
        };
        assert!(keys.iter().all(|k| !backend.exists(k)));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_allocate_failure_leaves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(MmapBackend::new(dir.path().join("missing")));
        assert!(MatrixBuffers::allocate(backend, 2).is_err());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_keys_are_distinct() {
        let backend = Arc::new(HeapBackend::new());
        let buffers = MatrixBuffers::allocate(backend, 2).unwrap();
        let keys = buffers.handles().keys();
        assert_ne!(keys[0], keys[1]);
        assert_ne!(keys[1], keys[2]);
        assert!(keys[2].as_str().ends_with("-c"));
    }

    #[test]
    fn test_handles_from_keys() {
        let key = |s: &str| BufferKey::new(s).unwrap();
        let h = MatrixHandles::from_keys(4, key("x"), key("y"), key("z")).unwrap();
        assert_eq!(h.c.len(), 128);
        assert_eq!(h.keys(), vec![key("x"), key("y"), key("z")]);
        assert!(MatrixHandles::from_keys(1 << 32, key("x"), key("y"), key("z")).is_err());
    }

    #[test]
    fn test_allocate_oversized_creates_nothing() {
        let backend = Arc::new(HeapBackend::new());
        let err = MatrixBuffers::allocate(backend.clone(), (1 << 60) + 1).unwrap_err();
        assert!(err.is_usage());
        assert!(backend.is_empty());
    }
}
