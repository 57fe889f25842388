use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use pmm_kernel::{first_mismatch, PartitionPlan};
use pmm_shm::{default_shm_dir, HeapBackend, MmapBackend, SharedBackend};

use crate::buffers::MatrixBuffers;
use crate::config::{BackendKind, ExecutorKind, RunConfig};
use crate::error::{Result, RunError};
use crate::executor::{Executor, ProcessExecutor, ThreadExecutor, WorkerHandle};
use crate::report::{MatrixDumps, RunReport};
use crate::worker::WorkerTask;

/// Stages of a run, entered strictly in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Validating,
    Allocating,
    Initializing,
    Spawning,
    Running,
    Joining,
    Reporting,
    Releasing,
    Done,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Validating => "validating",
            Phase::Allocating => "allocating",
            Phase::Initializing => "initializing",
            Phase::Spawning => "spawning",
            Phase::Running => "running",
            Phase::Joining => "joining",
            Phase::Reporting => "reporting",
            Phase::Releasing => "releasing",
            Phase::Done => "done",
        };
        f.write_str(name)
    }
}

/// Drives one multiplication from validation to cleanup.
///
/// The orchestrator owns the shared buffers for the whole run. On any error
/// after allocation the buffers are destroyed before the error is returned.
#[derive(Debug)]
pub struct Orchestrator {
    config: RunConfig,
    backend: Arc<dyn SharedBackend>,
    executor: Box<dyn Executor>,
    phases: Vec<Phase>,
}

impl Orchestrator {
    /// Build the backend and executor named in `config`.
    pub fn new(config: RunConfig) -> Result<Self> {
        let shm_dir = config.shm_dir.clone().unwrap_or_else(default_shm_dir);
        let backend: Arc<dyn SharedBackend> = match config.backend {
            BackendKind::Mmap => Arc::new(MmapBackend::new(&shm_dir)),
            BackendKind::Heap => Arc::new(HeapBackend::new()),
        };
        let executor: Box<dyn Executor> = match config.executor {
            ExecutorKind::Process => match &config.worker_program {
                Some(program) => Box::new(ProcessExecutor::new(program, &shm_dir)),
                None => Box::new(ProcessExecutor::current_exe(&shm_dir)?),
            },
            ExecutorKind::Thread => Box::new(ThreadExecutor::new(Arc::clone(&backend))),
        };
        Self::with_parts(config, backend, executor)
    }

    /// Assemble an orchestrator from an explicit backend and executor.
    ///
    /// # Errors
    /// `Usage` if the executor runs workers in other processes but the
    /// backend is not shareable across processes.
    pub fn with_parts(
        config: RunConfig,
        backend: Arc<dyn SharedBackend>,
        executor: Box<dyn Executor>,
    ) -> Result<Self> {
        if executor.requires_cross_process() && !backend.is_cross_process() {
            return Err(RunError::Usage(format!(
                "the {} backend cannot be shared with {} workers",
                backend.name(),
                executor.name()
            )));
        }
        Ok(Orchestrator {
            config,
            backend,
            executor,
            phases: Vec::new(),
        })
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn backend(&self) -> &Arc<dyn SharedBackend> {
        &self.backend
    }

    /// Execute the run.
    ///
    /// Sizes are validated before anything is allocated. All workers are
    /// waited for even if one fails, and the buffers are released before
    /// the report (or error) is returned.
    pub fn run(mut self) -> Result<RunReport> {
        self.enter(Phase::Validating);
        let plan = self.config.validate()?;

        self.enter(Phase::Allocating);
        let buffers = MatrixBuffers::allocate(Arc::clone(&self.backend), plan.dim())?;
        let keys = buffers.handles().keys();
        for key in &keys {
            self.trace(format_args!("created buffer {key}"));
        }

        self.enter(Phase::Initializing);
        buffers.initialize(self.config.fill_value)?;

        self.enter(Phase::Spawning);
        let start = Instant::now();
        let workers = self.spawn_all(&plan, &buffers)?;

        self.enter(Phase::Running);
        self.enter(Phase::Joining);
        self.join_all(workers)?;
        let elapsed = start.elapsed();

        self.enter(Phase::Reporting);
        let handles = buffers.handles();
        let dumps = if self.config.should_dump() {
            Some(MatrixDumps {
                a: buffers.read(&handles.a, |v| v.dump())?,
                b: buffers.read(&handles.b, |v| v.dump())?,
                c: buffers.read(&handles.c, |v| v.dump())?,
            })
        } else {
            None
        };
        if self.config.verify {
            let expected = self.config.expected_value();
            let mismatch = buffers.read(&handles.c, |v| first_mismatch(v, expected))?;
            if let Some((row, col, got)) = mismatch {
                return Err(RunError::Verification {
                    row,
                    col,
                    got,
                    expected,
                });
            }
        }
        let result = if self.config.collect_result {
            Some(buffers.read(&handles.c, |v| v.as_slice().to_vec())?)
        } else {
            None
        };

        self.enter(Phase::Releasing);
        buffers.release()?;

        self.enter(Phase::Done);
        Ok(RunReport {
            dim: plan.dim(),
            workers: plan.workers(),
            elapsed,
            executor: self.executor.name().to_string(),
            backend: self.backend.name().to_string(),
            keys,
            phases: self.phases,
            dumps,
            verified: self.config.verify,
            result,
        })
    }

    /// Launch one worker per partition. If a launch fails, workers already
    /// started are aborted and reaped before the error is returned.
    fn spawn_all(
        &self,
        plan: &PartitionPlan,
        buffers: &MatrixBuffers,
    ) -> Result<Vec<Box<dyn WorkerHandle>>> {
        let mut spawned: Vec<Box<dyn WorkerHandle>> = Vec::with_capacity(plan.workers());
        for (index, rows) in plan.iter() {
            let task =
                WorkerTask::new(index, plan.dim(), plan.workers(), buffers.handles().clone());
            match self.executor.spawn(task) {
                Ok(handle) => {
                    self.trace(format_args!("worker {index} started, rows {rows}"));
                    spawned.push(handle);
                }
                Err(e) => {
                    self.trace(format_args!("worker {index} failed to start, aborting"));
                    for handle in spawned {
                        handle.abort();
                    }
                    return Err(e);
                }
            }
        }
        Ok(spawned)
    }

    /// Wait for every worker; the first failure is returned after all exit.
    fn join_all(&self, workers: Vec<Box<dyn WorkerHandle>>) -> Result<()> {
        let mut first_err = None;
        for handle in workers {
            let index = handle.index();
            match handle.wait() {
                Ok(()) => self.trace(format_args!("worker {index} exited")),
                Err(e) => {
                    self.trace(format_args!("worker {index}: {e}"));
                    first_err.get_or_insert(e);
                }
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn enter(&mut self, phase: Phase) {
        self.trace(format_args!("{phase}"));
        self.phases.push(phase);
    }

    fn trace(&self, msg: fmt::Arguments<'_>) {
        if self.config.verbose {
            eprintln!("[pmm] {msg}");
        }
    }
}
