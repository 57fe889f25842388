use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use pmm_kernel::{PartitionPlan, DUMP_MAX_DIM};

use crate::error::{Result, RunError};

/// Value written to every element of A and B before the workers start.
pub const DEFAULT_FILL: f64 = 1.0;

/// How workers are launched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutorKind {
    /// One OS process per worker (requires a cross-process backend).
    #[default]
    Process,
    /// One OS thread per worker inside the orchestrating process.
    Thread,
}

impl fmt::Display for ExecutorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutorKind::Process => write!(f, "process"),
            ExecutorKind::Thread => write!(f, "thread"),
        }
    }
}

impl FromStr for ExecutorKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "process" => Ok(ExecutorKind::Process),
            "thread" => Ok(ExecutorKind::Thread),
            other => Err(format!("unknown executor '{other}' (expected process or thread)")),
        }
    }
}

/// Where the shared matrices live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    /// Memory-mapped files, visible to other processes.
    #[default]
    Mmap,
    /// Heap blocks, visible to threads of this process only.
    Heap,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Mmap => write!(f, "mmap"),
            BackendKind::Heap => write!(f, "heap"),
        }
    }
}

/// Everything one run needs: sizes, execution strategy, and output options.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    /// Dimension N of the square matrices.
    pub dim: usize,
    /// Number of workers W; must divide `dim`.
    pub workers: usize,
    pub executor: ExecutorKind,
    pub backend: BackendKind,
    /// Directory for mmap buffers (default: `/dev/shm` or the temp dir).
    pub shm_dir: Option<PathBuf>,
    /// Program launched for process workers (default: the current executable).
    pub worker_program: Option<PathBuf>,
    /// Constant written to A and B.
    pub fill_value: f64,
    /// Matrices are dumped in the report when `dim <= dump_limit`.
    pub dump_limit: usize,
    /// Check that every element of C has the value implied by `fill_value`.
    pub verify: bool,
    /// Copy C into the report before the buffers are released.
    pub collect_result: bool,
    /// Trace phases and worker lifecycle on stderr.
    pub verbose: bool,
}

impl RunConfig {
    /// Create a configuration with default options. No validation is done
    /// until [`validate`](Self::validate).
    pub fn new(dim: usize, workers: usize) -> Self {
        RunConfig {
            dim,
            workers,
            executor: ExecutorKind::default(),
            backend: BackendKind::default(),
            shm_dir: None,
            worker_program: None,
            fill_value: DEFAULT_FILL,
            dump_limit: DUMP_MAX_DIM,
            verify: false,
            collect_result: false,
            verbose: false,
        }
    }

    /// Build a configuration from raw command-line integers.
    ///
    /// # Errors
    /// `Usage` if either value is not positive, `Partition` if `dim` is not a
    /// multiple of `workers`.
    pub fn from_args(dim: i64, workers: i64) -> Result<Self> {
        let dim = usize::try_from(dim)
            .ok()
            .filter(|&d| d > 0)
            .ok_or_else(|| {
                RunError::Usage(format!("matrix size must be a positive integer, got {dim}"))
            })?;
        let workers = usize::try_from(workers)
            .ok()
            .filter(|&w| w > 0)
            .ok_or_else(|| {
                RunError::Usage(format!(
                    "number of processes must be a positive integer, got {workers}"
                ))
            })?;
        let config = RunConfig::new(dim, workers);
        config.validate()?;
        Ok(config)
    }

    /// Check sizes and the executor/backend pairing, returning the plan.
    pub fn validate(&self) -> Result<PartitionPlan> {
        if self.executor == ExecutorKind::Process && self.backend == BackendKind::Heap {
            return Err(RunError::Usage(
                "the heap backend cannot be shared with worker processes".to_string(),
            ));
        }
        Ok(PartitionPlan::new(self.dim, self.workers)?)
    }

    /// Value every element of C must hold when A and B are filled with
    /// `fill_value`: `dim` additions of `fill_value^2`, in kernel order.
    pub fn expected_value(&self) -> f64 {
        let product = self.fill_value * self.fill_value;
        (0..self.dim).fold(0.0f64, |acc, _| acc + product)
    }

    /// Returns true if matrices should be included in the report.
    pub fn should_dump(&self) -> bool {
        self.dim <= self.dump_limit
    }

    pub fn with_executor(mut self, executor: ExecutorKind) -> Self {
        self.executor = executor;
        self
    }

    pub fn with_backend(mut self, backend: BackendKind) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_shm_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.shm_dir = Some(dir.into());
        self
    }

    pub fn with_worker_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.worker_program = Some(program.into());
        self
    }

    pub fn with_fill_value(mut self, value: f64) -> Self {
        self.fill_value = value;
        self
    }

    pub fn with_dump_limit(mut self, limit: usize) -> Self {
        self.dump_limit = limit;
        self
    }

    pub fn with_verify(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    pub fn with_collect_result(mut self, collect: bool) -> Self {
        self.collect_result = collect;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}
