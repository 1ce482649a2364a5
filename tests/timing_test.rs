//! Wall-clock behaviour of the two strategies.
//!
//! The per-task pool must finish within 3x the pause no matter how many items
//! it holds; the bounded platform pool must take longer as items outnumber
//! its workers.

use std::time::Duration;

use vthread_bench::{run_benchmark, PoolKind};

use test_utils::{init_logging, quick_config};

const VIRTUAL_TOLERANCE: u32 = 3;

#[test]
fn virtual_duration_is_independent_of_task_count() {
    init_logging();
    let pause = Duration::from_millis(200);
    let config = quick_config(pause, 16);

    for tasks in [2000, 20_000] {
        let m = run_benchmark(PoolKind::Virtual, tasks, &config).unwrap();
        println!("{}", m);
        assert_eq!(m.drained.completed, tasks);
        assert!(m.elapsed >= pause);
        assert!(
            m.elapsed <= pause * VIRTUAL_TOLERANCE,
            "{} virtual items took {:?}",
            tasks,
            m.elapsed
        );
    }
}

#[test]
fn platform_duration_grows_with_task_count() {
    init_logging();
    let pause = Duration::from_millis(10);
    let config = quick_config(pause, 8);

    let small = run_benchmark(PoolKind::Platform, 40, &config).unwrap();
    let large = run_benchmark(PoolKind::Platform, 400, &config).unwrap();
    println!("{}\n{}", small, large);

    assert_eq!(large.drained.completed, 400);
    assert!(large.drained.peak_threads <= 8);
    assert!(large.elapsed > small.elapsed);
    // 400 items / 8 workers = 50 rounds of the pause
    assert!(large.elapsed >= pause * 50);
}
