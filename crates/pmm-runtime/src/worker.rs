use std::ffi::OsString;
use std::path::Path;

use pmm_kernel::{multiply_rows, row_range, MatrixView, MatrixViewMut, RowRange};
use pmm_shm::SharedBackend;

use crate::buffers::MatrixHandles;
use crate::error::Result;

/// One worker's assignment: its identity, the run's sizes, and the buffers.
///
/// The row range is not stored; it is re-derived from `(dim, workers, index)`
/// wherever the task runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerTask {
    pub index: usize,
    pub dim: usize,
    pub workers: usize,
    pub handles: MatrixHandles,
}

impl WorkerTask {
    pub fn new(index: usize, dim: usize, workers: usize, handles: MatrixHandles) -> Self {
        WorkerTask {
            index,
            dim,
            workers,
            handles,
        }
    }

    /// Output rows owned by this worker.
    pub fn rows(&self) -> Result<RowRange> {
        Ok(row_range(self.dim, self.workers, self.index)?)
    }

    /// Arguments for the `worker` subcommand describing this task.
    pub fn to_args(&self, shm_dir: &Path) -> Vec<OsString> {
        vec![
            "--dim".into(),
            self.dim.to_string().into(),
            "--workers".into(),
            self.workers.to_string().into(),
            "--index".into(),
            self.index.to_string().into(),
            "--shm-dir".into(),
            shm_dir.as_os_str().to_owned(),
            "--key-a".into(),
            self.handles.a.key().to_string().into(),
            "--key-b".into(),
            self.handles.b.key().to_string().into(),
            "--key-c".into(),
            self.handles.c.key().to_string().into(),
        ]
    }
}

/// Worker entry point: attach, compute the assigned rows of C, detach.
///
/// A and B are only read. Of C, only the task's rows are touched, which is
/// what allows every worker to run this concurrently without locking.
pub fn run_task(backend: &dyn SharedBackend, task: &WorkerTask) -> Result<()> {
    let rows = task.rows()?;
    let dim = task.dim;

    let mut a = backend.attach(&task.handles.a)?;
    let mut b = backend.attach(&task.handles.b)?;
    let mut c = backend.attach(&task.handles.c)?;

    {
        // SAFETY: A and B are immutable once workers run, and the partition
        // gives every worker a disjoint window of C.
        let a_view = unsafe { MatrixView::from_region(&a, dim)? };
        let b_view = unsafe { MatrixView::from_region(&b, dim)? };
        let mut c_rows = unsafe { MatrixViewMut::rows_of_region(&mut c, dim, rows)? };
        multiply_rows(&a_view, &b_view, &mut c_rows)?;
    }

    a.detach();
    b.detach();
    c.detach();
    Ok(())
}
