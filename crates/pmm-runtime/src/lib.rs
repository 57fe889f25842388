//! `pmm-runtime` - Process-parallel matrix multiplication over shared memory.
//!
//! This crate provides:
//! - `RunConfig`, the explicit context for one multiplication run
//! - `Orchestrator`, which allocates the shared matrices, launches one worker
//!   per row partition, waits for all of them, and releases the buffers
//! - `Executor` implementations running workers as OS processes or threads
//! - `run_task`, the worker entry point shared by both executors

pub mod buffers;
pub mod config;
pub mod error;
pub mod executor;
pub mod orchestrator;
pub mod report;
pub mod worker;

// Re-export primary types at the crate root for convenience.
pub use buffers::{MatrixBuffers, MatrixHandles};
pub use config::{BackendKind, ExecutorKind, RunConfig};
pub use error::{Result, RunError};
pub use executor::{Executor, ProcessExecutor, ThreadExecutor, WorkerHandle};
pub use orchestrator::{Orchestrator, Phase};
pub use report::{MatrixDumps, RunReport};
pub use worker::{run_task, WorkerTask};

/// Run one multiplication with the backend and executor named in `config`.
pub fn run(config: RunConfig) -> Result<RunReport> {
    Orchestrator::new(config)?.run()
}
