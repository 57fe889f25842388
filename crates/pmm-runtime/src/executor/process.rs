use std::env;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};

use crate::error::{Result, RunError};
use crate::executor::{Executor, WorkerHandle};
use crate::worker::WorkerTask;

/// Subcommand of the `pmm` binary that runs a single worker.
pub const WORKER_SUBCOMMAND: &str = "worker";

/// Runs every worker as a child process of `program`.
///
/// The child is invoked as `program worker <task args>` and attaches the
/// buffers by key from `shm_dir`.
#[derive(Debug, Clone)]
pub struct ProcessExecutor {
    program: PathBuf,
    shm_dir: PathBuf,
}

impl ProcessExecutor {
    pub fn new(program: impl Into<PathBuf>, shm_dir: impl Into<PathBuf>) -> Self {
        ProcessExecutor {
            program: program.into(),
            shm_dir: shm_dir.into(),
        }
    }

    /// Executor that re-executes the running binary.
    pub fn current_exe(shm_dir: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self::new(env::current_exe()?, shm_dir))
    }
}

impl Executor for ProcessExecutor {
    fn name(&self) -> &str {
        "process"
    }

    fn requires_cross_process(&self) -> bool {
        true
    }

    fn spawn(&self, task: WorkerTask) -> Result<Box<dyn WorkerHandle>> {
        let index = task.index;
        let child = Command::new(&self.program)
            .arg(WORKER_SUBCOMMAND)
            .args(task.to_args(&self.shm_dir))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| RunError::Spawn { index, source })?;
        Ok(Box::new(ProcessHandle { index, child }))
    }
}

struct ProcessHandle {
    index: usize,
    child: Child,
}

impl WorkerHandle for ProcessHandle {
    fn index(&self) -> usize {
        self.index
    }

    fn wait(mut self: Box<Self>) -> Result<()> {
        let status = self.child.wait().map_err(|e| RunError::WorkerFailed {
            index: self.index,
            reason: format!("wait failed: {e}"),
        })?;
        if status.success() {
            Ok(())
        } else {
            Err(RunError::WorkerFailed {
                index: self.index,
                reason: format!("exited with {status}"),
            })
        }
    }

    fn abort(mut self: Box<Self>) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffers::MatrixHandles;
    use pmm_shm::BufferKey;

    fn task(index: usize) -> WorkerTask {
        let key = |s: &str| BufferKey::new(s).unwrap();
        let handles = MatrixHandles::from_keys(2, key("a"), key("b"), key("c")).unwrap();
        WorkerTask::new(index, 2, 2, handles)
    }

    #[test]
    fn test_spawn_missing_program() {
        let dir = tempfile::tempdir().unwrap();
        let exec = ProcessExecutor::new(dir.path().join("no-such-program"), dir.path());
        match exec.spawn(task(1)) {
            Err(RunError::Spawn { index, .. }) => assert_eq!(index, 1),
            other => panic!("expected spawn error, got {:?}", other.map(|h| h.index())),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_nonzero_exit_is_worker_failure() {
        let exec = ProcessExecutor::new("false", "/tmp");
        let handle = exec.spawn(task(0)).unwrap();
        assert!(matches!(
            handle.wait(),
            Err(RunError::WorkerFailed { index: 0, .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_zero_exit_is_success() {
        let exec = ProcessExecutor::new("true", "/tmp");
        let handle = exec.spawn(task(0)).unwrap();
        assert_eq!(handle.index(), 0);
        handle.wait().unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_abort_reaps() {
        let exec = ProcessExecutor::new("sleep", "/tmp");
        // `sleep worker ...` fails fast on bad arguments; abort must not hang
        // either way.
        let handle = exec.spawn(task(1)).unwrap();
        handle.abort();
    }
}
