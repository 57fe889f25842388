use std::fmt::Debug;

use crate::error::Result;
use crate::worker::WorkerTask;

pub mod process;
pub mod thread;

pub use process::ProcessExecutor;
pub use thread::ThreadExecutor;

/// Trait for pluggable worker launchers (OS processes, OS threads).
///
/// An executor only starts workers; the orchestrator decides how many, owns
/// the shared buffers, and waits on the returned handles.
pub trait Executor: Send + Sync + Debug {
    /// Returns the name of this executor (e.g., "process", "thread").
    fn name(&self) -> &str;

    /// Returns true if workers run in other address spaces and therefore
    /// need a cross-process backend.
    fn requires_cross_process(&self) -> bool;

    /// Start one worker running `task`.
    ///
    /// Returns immediately; the worker runs concurrently with the caller.
    fn spawn(&self, task: WorkerTask) -> Result<Box<dyn WorkerHandle>>;
}

/// A running worker.
pub trait WorkerHandle: Send {
    /// Index of the task this worker runs.
    fn index(&self) -> usize;

    /// Block until the worker terminates.
    ///
    /// Fails with `WorkerFailed` if the worker did not finish its rows.
    fn wait(self: Box<Self>) -> Result<()>;

    /// Stop the worker if possible and reap it.
    fn abort(self: Box<Self>);
}
