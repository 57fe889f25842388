use std::fmt;
use std::time::Duration;

use pmm_shm::BufferKey;

use crate::orchestrator::Phase;

/// Rendered contents of the three matrices, captured after all workers exit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatrixDumps {
    pub a: String,
    pub b: String,
    pub c: String,
}

/// Outcome of one successful run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub dim: usize,
    pub workers: usize,
    /// Wall-clock time from the first spawn to the last worker exit.
    pub elapsed: Duration,
    pub executor: String,
    pub backend: String,
    /// Keys the buffers were created under; all destroyed by the time the
    /// report is returned.
    pub keys: Vec<BufferKey>,
    /// Phases in the order they were entered.
    pub phases: Vec<Phase>,
    pub dumps: Option<MatrixDumps>,
    /// True if C was checked element by element and matched.
    pub verified: bool,
    /// Copy of C, row-major, when requested.
    pub result: Option<Vec<f64>>,
}

impl RunReport {
    /// Final line printed on success.
    pub fn summary(&self) -> String {
        format!(
            "Number of processes: {}\tExecution time: {:.3} sec",
            self.workers,
            self.elapsed.as_secs_f64()
        )
    }

    /// Full standard output of a run: matrix dumps (if any) then the summary.
    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(dumps) = &self.dumps {
            write!(f, "Matrix 1:\n{}", dumps.a)?;
            write!(f, "Matrix 2:\n{}", dumps.b)?;
            write!(f, "Matrix 3:\n{}", dumps.c)?;
        }
        writeln!(f, "{}", self.summary())
    }
}
