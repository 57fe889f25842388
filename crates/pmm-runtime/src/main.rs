//! pmm - parallel matrix multiplication over shared memory
//!
//! Multiplies two N x N matrices filled with ones. The output rows are split
//! evenly across W workers that all write into one shared result buffer.
//!
//! # Usage
//!
//! - `pmm 4 2` - multiply 4x4 matrices with two worker processes
//! - `pmm --executor thread 12 4` - same, with threads in one process
//! - `pmm worker ...` - internal entry point of a worker process

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use pmm_runtime::error::USAGE_EXIT;
use pmm_runtime::{
    run_task, BackendKind, ExecutorKind, MatrixHandles, RunConfig, RunError, WorkerTask,
};
use pmm_shm::{BufferKey, MmapBackend};

/// Parallel matrix multiplication with shared-memory workers
#[derive(Parser)]
#[command(name = "pmm")]
#[command(version, about, long_about = None)]
#[command(args_conflicts_with_subcommands = true, subcommand_negates_reqs = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Dimension N of the square matrices
    #[arg(value_name = "MATRIX_SIZE", required = true, allow_negative_numbers = true)]
    matrix_size: Option<i64>,

    /// Number of workers W; must divide N
    #[arg(value_name = "NUM_PROCESSES", required = true, allow_negative_numbers = true)]
    num_processes: Option<i64>,

    /// Worker strategy: process (shared files) or thread (in-process heap)
    #[arg(long, default_value = "process")]
    executor: ExecutorKind,

    /// Directory holding the shared-memory files
    #[arg(long, value_name = "DIR")]
    shm_dir: Option<PathBuf>,

    /// Check every element of the result
    #[arg(long)]
    verify: bool,

    /// Trace orchestrator phases on stderr
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Compute one row range of the result (launched by the orchestrator)
    #[command(hide = true)]
    Worker(WorkerArgs),
}

#[derive(Args)]
struct WorkerArgs {
    #[arg(long)]
    dim: usize,
    #[arg(long)]
    workers: usize,
    #[arg(long)]
    index: usize,
    #[arg(long)]
    shm_dir: PathBuf,
    #[arg(long)]
    key_a: BufferKey,
    #[arg(long)]
    key_b: BufferKey,
    #[arg(long)]
    key_c: BufferKey,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::from(USAGE_EXIT)
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    let result = match cli.command {
        Some(Command::Worker(ref args)) => run_worker(args),
        None => run_multiply(&cli),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(e.exit_code())
        }
    }
}

fn run_multiply(cli: &Cli) -> pmm_runtime::Result<()> {
    let (Some(dim), Some(workers)) = (cli.matrix_size, cli.num_processes) else {
        return Err(RunError::Usage(
            "usage: pmm <MATRIX_SIZE> <NUM_PROCESSES>".to_string(),
        ));
    };
    let backend = match cli.executor {
        ExecutorKind::Process => BackendKind::Mmap,
        ExecutorKind::Thread => BackendKind::Heap,
    };
    let mut config = RunConfig::from_args(dim, workers)?
        .with_executor(cli.executor)
        .with_backend(backend)
        .with_verify(cli.verify)
        .with_verbose(cli.verbose);
    if let Some(dir) = &cli.shm_dir {
        config = config.with_shm_dir(dir);
    }

    let report = pmm_runtime::run(config)?;
    print!("{}", report.render());
    Ok(())
}

fn run_worker(args: &WorkerArgs) -> pmm_runtime::Result<()> {
    let backend = MmapBackend::new(&args.shm_dir);
    let handles = MatrixHandles::from_keys(
        args.dim,
        args.key_a.clone(),
        args.key_b.clone(),
        args.key_c.clone(),
    )?;
    let task = WorkerTask::new(args.index, args.dim, args.workers, handles);
    run_task(&backend, &task).map_err(|e| RunError::WorkerFailed {
        index: args.index,
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_positionals() {
        let cli = Cli::try_parse_from(["pmm", "--executor", "thread", "8", "4"]).unwrap();
        assert_eq!(cli.matrix_size, Some(8));
        assert_eq!(cli.num_processes, Some(4));
        assert_eq!(cli.executor, ExecutorKind::Thread);
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_negative_size_reaches_validation() {
        let cli = Cli::try_parse_from(["pmm", "-4", "2"]).unwrap();
        assert_eq!(cli.matrix_size, Some(-4));
        assert_eq!(run_multiply(&cli).unwrap_err().exit_code(), USAGE_EXIT);
    }

    #[test]
    fn test_missing_argument_rejected() {
        let err = Cli::try_parse_from(["pmm", "4"]).err().unwrap();
        assert!(err.use_stderr());
    }

    #[test]
    fn test_parse_worker() {
        let cli = Cli::try_parse_from([
            "pmm", "worker", "--dim", "4", "--workers", "2", "--index", "1", "--shm-dir",
            "/tmp", "--key-a", "pmm-1-a", "--key-b", "pmm-1-b", "--key-c", "pmm-1-c",
        ])
        .unwrap();
        match cli.command {
            Some(Command::Worker(args)) => {
                assert_eq!((args.dim, args.workers, args.index), (4, 2, 1));
                assert_eq!(args.key_c.as_str(), "pmm-1-c");
            }
            None => panic!("expected worker subcommand"),
        }
    }

    #[test]
    fn test_worker_rejects_bad_key() {
        assert!(Cli::try_parse_from([
            "pmm", "worker", "--dim", "4", "--workers", "2", "--index", "1", "--shm-dir",
            "/tmp", "--key-a", "../etc", "--key-b", "b", "--key-c", "c",
        ])
        .is_err());
    }
}
