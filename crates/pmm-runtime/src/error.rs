use std::io;

use pmm_kernel::KernelError;
use pmm_shm::ShmError;
use thiserror::Error;

/// Exit status for invalid invocations (the classic `return -1`).
pub const USAGE_EXIT: u8 = 255;
/// Exit status for runtime failures.
pub const FAILURE_EXIT: u8 = 1;

#[derive(Error, Debug)]
pub enum RunError {
    #[error("{0}")]
    Usage(String),
    #[error("Matrix size {dim} must be a multiple of number of processes {workers}")]
    Partition { dim: usize, workers: usize },
    #[error("shared memory error: {0}")]
    Shm(#[from] ShmError),
    #[error("kernel error: {0}")]
    Kernel(KernelError),
    #[error("failed to spawn worker {index}: {source}")]
    Spawn {
        index: usize,
        #[source]
        source: io::Error,
    },
    #[error("worker {index} failed: {reason}")]
    WorkerFailed { index: usize, reason: String },
    #[error("result mismatch at ({row}, {col}): got {got}, expected {expected}")]
    Verification {
        row: usize,
        col: usize,
        got: f64,
        expected: f64,
    },
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl RunError {
    /// Returns true for errors fixed by re-invoking with different arguments.
    pub fn is_usage(&self) -> bool {
        matches!(self, RunError::Usage(_) | RunError::Partition { .. })
    }

    /// Process exit status for this error.
    pub fn exit_code(&self) -> u8 {
        if self.is_usage() {
            USAGE_EXIT
        } else {
            FAILURE_EXIT
        }
    }
}

impl From<KernelError> for RunError {
    fn from(e: KernelError) -> Self {
        match e {
            KernelError::ZeroDimension => {
                RunError::Usage("matrix size must be a positive integer".to_string())
            }
            KernelError::ZeroWorkers => {
                RunError::Usage("number of processes must be a positive integer".to_string())
            }
            KernelError::Partition { dim, workers } => RunError::Partition { dim, workers },
            KernelError::TooLarge { dim } => {
                RunError::Usage(format!("matrix size {dim} is too large for this machine"))
            }
            KernelError::Shm(e) => RunError::Shm(e),
            other => RunError::Kernel(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, RunError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kernel_errors_map_to_usage() {
        assert!(RunError::from(KernelError::ZeroDimension).is_usage());
        assert!(RunError::from(KernelError::ZeroWorkers).is_usage());
        let e = RunError::from(KernelError::Partition { dim: 10, workers: 3 });
        assert_eq!(e.exit_code(), USAGE_EXIT);
        assert_eq!(
            e.to_string(),
            "Matrix size 10 must be a multiple of number of processes 3"
        );
    }

    #[test]
    fn test_runtime_errors_are_failures() {
        let e = RunError::WorkerFailed {
            index: 1,
            reason: "exit status: 1".to_string(),
        };
        assert!(!e.is_usage());
        assert_eq!(e.exit_code(), FAILURE_EXIT);
        assert!(!RunError::from(KernelError::Misaligned).is_usage());
    }

    #[test]
    fn test_too_large_is_usage() {
        let e = RunError::from(KernelError::TooLarge { dim: 1 << 32 });
        assert_eq!(e.exit_code(), USAGE_EXIT);
        assert!(e.to_string().contains("4294967296"));
    }
}
