use std::sync::Arc;
use std::thread::{self, JoinHandle};

use pmm_shm::SharedBackend;

use crate::error::{Result, RunError};
use crate::executor::{Executor, WorkerHandle};
use crate::worker::{run_task, WorkerTask};

/// Runs every worker on its own OS thread against a shared backend.
#[derive(Debug, Clone)]
pub struct ThreadExecutor {
    backend: Arc<dyn SharedBackend>,
}

impl ThreadExecutor {
    pub fn new(backend: Arc<dyn SharedBackend>) -> Self {
        ThreadExecutor { backend }
    }
}

impl Executor for ThreadExecutor {
    fn name(&self) -> &str {
        "thread"
    }

    fn requires_cross_process(&self) -> bool {
        false
    }

    fn spawn(&self, task: WorkerTask) -> Result<Box<dyn WorkerHandle>> {
        let index = task.index;
        let backend = Arc::clone(&self.backend);
        let join = thread::Builder::new()
            .name(format!("pmm-worker-{index}"))
            .spawn(move || run_task(backend.as_ref(), &task))
            .map_err(|source| RunError::Spawn { index, source })?;
        Ok(Box::new(ThreadHandle { index, join }))
    }
}

struct ThreadHandle {
    index: usize,
    join: JoinHandle<Result<()>>,
}

impl WorkerHandle for ThreadHandle {
    fn index(&self) -> usize {
        self.index
    }

    fn wait(self: Box<Self>) -> Result<()> {
        match self.join.join() {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(RunError::WorkerFailed {
                index: self.index,
                reason: e.to_string(),
            }),
            Err(_) => Err(RunError::WorkerFailed {
                index: self.index,
                reason: "thread panicked".to_string(),
            }),
        }
    }

    // Threads cannot be killed; the task is bounded, so joining is enough.
    fn abort(self: Box<Self>) {
        let _ = self.join.join();
    }
}
