use std::fs;

use pmm_runtime::{run, RunConfig, RunError};

fn config(dim: usize, workers: usize, shm_dir: &std::path::Path) -> RunConfig {
    RunConfig::new(dim, workers)
        .with_shm_dir(shm_dir)
        .with_worker_program(env!("CARGO_BIN_EXE_pmm"))
}

#[test]
fn test_process_run_collects_result() {
    let dir = tempfile::tempdir().unwrap();
    let report = run(config(8, 4, dir.path())
        .with_collect_result(true)
        .with_verify(true))
    .unwrap();

    assert_eq!(report.executor, "process");
    assert_eq!(report.backend, "mmap");
    assert_eq!(report.result.unwrap(), vec![8.0; 64]);
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn test_process_run_matches_thread_run() {
    let dir = tempfile::tempdir().unwrap();
    let process = run(config(12, 6, dir.path())
        .with_fill_value(0.3)
        .with_collect_result(true))
    .unwrap();
    let thread = run(RunConfig::new(12, 1)
        .with_executor(pmm_runtime::ExecutorKind::Thread)
        .with_backend(pmm_runtime::BackendKind::Heap)
        .with_fill_value(0.3)
        .with_collect_result(true))
    .unwrap();
    assert_eq!(process.result, thread.result);
}

#[test]
fn test_concurrent_runs_do_not_collide() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().to_path_buf();
    let runs: Vec<_> = (0..3)
        .map(|_| {
            let path = path.clone();
            std::thread::spawn(move || run(config(6, 2, &path).with_verify(true)))
        })
        .collect();
    for r in runs {
        r.join().unwrap().unwrap();
    }
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn test_missing_program_is_spawn_error() {
    let dir = tempfile::tempdir().unwrap();
    let shm = dir.path().join("shm");
    fs::create_dir(&shm).unwrap();
    let config = RunConfig::new(4, 2)
        .with_shm_dir(&shm)
        .with_worker_program(dir.path().join("no-such-pmm"));
    let err = run(config).unwrap_err();
    assert!(matches!(err, RunError::Spawn { index: 0, .. }));
    assert_eq!(err.exit_code(), 1);
    assert_eq!(fs::read_dir(&shm).unwrap().count(), 0);
}

#[cfg(unix)]
#[test]
fn test_failing_worker_program() {
    let dir = tempfile::tempdir().unwrap();
    let config = RunConfig::new(4, 2)
        .with_shm_dir(dir.path())
        .with_worker_program("false");
    assert!(matches!(
        run(config),
        Err(RunError::WorkerFailed { .. })
    ));
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
}
