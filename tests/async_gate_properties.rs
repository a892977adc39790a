//! Batch-level behavior of the async gate on the compio runtime

mod common;

use common::{jitter, test_timeout_guard, Occupancy};
use std::sync::Arc;
use std::time::Duration;
use throttler::{AsyncThrottleGate, GateState};

async fn run_batch(gate: &AsyncThrottleGate, jobs: usize) -> Arc<Occupancy> {
    let occupancy = Arc::new(Occupancy::default());
    let mut handles = Vec::new();
    for job in 0..jobs {
        let guard = gate.guard();
        let occupancy = Arc::clone(&occupancy);
        handles.push(compio::runtime::spawn(async move {
            occupancy.enter();
            compio::time::sleep(jitter(job)).await;
            occupancy.leave();
            drop(guard);
        }));
        gate.acquire().await;
    }
    for handle in handles {
        handle.await.unwrap();
    }
    occupancy
}

#[compio::test]
async fn test_async_batches_respect_limit() {
    let _timeout = test_timeout_guard(Duration::from_secs(30));

    for (max_concurrency, total_jobs) in [(5, 50), (1, 12), (50_000, 50), (3, 1)] {
        let gate = AsyncThrottleGate::new(max_concurrency, total_jobs);
        let occupancy = run_batch(&gate, total_jobs).await;

        assert_eq!(occupancy.released(), total_jobs);
        assert!(occupancy.peak() <= max_concurrency);
        assert_eq!(gate.state(), GateState::Done);
    }
}

#[compio::test]
async fn test_async_zero_total_never_waits() {
    let gate: AsyncThrottleGate = AsyncThrottleGate::new(5, 0);
    for _ in 0..10_000 {
        gate.acquire().await;
    }
    assert!(gate.is_passthrough());
}

#[compio::test]
async fn test_async_error_collection() {
    let _timeout = test_timeout_guard(Duration::from_secs(30));
    let gate: AsyncThrottleGate<String> = AsyncThrottleGate::new(5, 50);
    let mut handles = Vec::new();

    for job in 1..=50usize {
        let mut guard = gate.guard();
        handles.push(compio::runtime::spawn(async move {
            compio::time::sleep(jitter(job)).await;
            if job % 2 != 0 {
                guard.fail(format!("Error on job{job:02}"));
            }
        }));
        gate.acquire().await;
    }

    assert_eq!(gate.errors().len(), 25);
    assert_eq!(gate.stats().errors, 25);
    for handle in handles {
        handle.await.unwrap();
    }
}

#[compio::test]
async fn test_async_releases_from_worker_threads() {
    let _timeout = test_timeout_guard(Duration::from_secs(30));
    let gate: AsyncThrottleGate = AsyncThrottleGate::new(4, 40);
    let occupancy = Arc::new(Occupancy::default());
    let mut threads = Vec::new();

    for job in 0..40 {
        let guard = gate.guard();
        let occupancy = Arc::clone(&occupancy);
        threads.push(std::thread::spawn(move || {
            occupancy.enter();
            std::thread::sleep(jitter(job));
            occupancy.leave();
            drop(guard);
        }));
        gate.acquire().await;
    }

    assert!(gate.is_done());
    assert!(occupancy.peak() <= 4);
    for thread in threads {
        thread.join().unwrap();
    }
}
