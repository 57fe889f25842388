use thiserror::Error;

#[derive(Error, Debug)]
pub enum KernelError {
    #[error("matrix dimension must be positive")]
    ZeroDimension,
    #[error("a {dim}x{dim} matrix of f64 does not fit in the address space")]
    TooLarge { dim: usize },
    #[error("worker count must be positive")]
    ZeroWorkers,
    #[error("Matrix size {dim} must be a multiple of number of processes {workers}")]
    Partition { dim: usize, workers: usize },
    #[error("worker index {index} out of range for {workers} workers")]
    WorkerIndex { index: usize, workers: usize },
    #[error("buffer of {got} bytes is too small for a {dim}x{dim} matrix ({needed} bytes)")]
    BufferTooSmall {
        dim: usize,
        needed: usize,
        got: usize,
    },
    #[error("buffer is not aligned for f64 access")]
    Misaligned,
    #[error("slice of {got} elements does not hold a {dim}x{dim} matrix")]
    LengthMismatch { dim: usize, got: usize },
    #[error("row range {start}..{end} outside matrix of dimension {dim}")]
    RowRangeOutOfBounds { start: usize, end: usize, dim: usize },
    #[error("dimension mismatch: a={a}, b={b}, c={c}")]
    DimensionMismatch { a: usize, b: usize, c: usize },
    #[error("shared memory error: {0}")]
    Shm(#[from] pmm_shm::ShmError),
}

pub type Result<T> = std::result::Result<T, KernelError>;
