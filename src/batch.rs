//! Simulated batch runner
//!
//! Launches `total_jobs` jobs through a throttle gate, each sleeping for a
//! random delay, and measures how many of them actually ran at once. Jobs
//! run either on OS threads behind a [`ThrottleGate`] or as compio tasks
//! behind an [`AsyncThrottleGate`].
//!
//! # Usage
//!
//! ```rust,ignore
//! use throttler::batch::run_batch;
//! use throttler::cli::Args;
//! use throttler::progress::ProgressTracker;
//! use clap::Parser;
//!
//! #[compio::main]
//! async fn main() -> throttler::Result<()> {
//!     let args = Args::parse();
//!     let stats = run_batch(&args, &ProgressTracker::hidden()).await?;
//!     println!("{} jobs, peak concurrency {}", stats.jobs_completed, stats.peak_concurrency);
//!     Ok(())
//! }
//! ```

use crate::cli::{Args, RuntimeKind};
use crate::error::{Result, ThrottlerError};
use crate::progress::ProgressTracker;
use rand::Rng;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use throttle_sync::{AsyncThrottleGate, GateStats, ThrottleGate};
use tracing::debug;

/// Outcome of one simulated batch
#[derive(Debug)]
pub struct BatchStats {
    /// Jobs launched
    pub jobs_launched: usize,
    /// Jobs that ran to completion
    pub jobs_completed: usize,
    /// Highest number of jobs observed running at the same time
    pub peak_concurrency: usize,
    /// Errors collected by the gate, in the order it observed them
    pub errors: Vec<ThrottlerError>,
    /// Final gate counters
    pub gate: GateStats,
    /// Wall-clock time for the whole batch
    pub duration: Duration,
}

impl BatchStats {
    /// Fail if the observed peak broke the gate's limit
    ///
    /// A gate without a known total does not bound concurrency, so the check
    /// is skipped for those runs.
    ///
    /// # Errors
    ///
    /// Returns [`ThrottlerError::LimitExceeded`] when more jobs ran at once
    /// than `max_concurrency`.
    pub fn check_limit(&self) -> Result<()> {
        if self.gate.total_jobs > 0 && self.peak_concurrency > self.gate.max_concurrency {
            return Err(ThrottlerError::LimitExceeded {
                observed: self.peak_concurrency,
                limit: self.gate.max_concurrency,
            });
        }
        Ok(())
    }
}

/// Counts jobs currently inside their work section
#[derive(Debug, Default)]
struct RunningJobs {
    running: AtomicUsize,
    peak: AtomicUsize,
    finished: AtomicUsize,
}

impl RunningJobs {
    fn enter(&self) {
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn leave(&self) {
        self.running.fetch_sub(1, Ordering::SeqCst);
        self.finished.fetch_add(1, Ordering::SeqCst);
    }

    fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn finished(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }
}

fn random_delay(max_delay_ms: u64) -> Duration {
    if max_delay_ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::thread_rng().gen_range(0..=max_delay_ms))
}

fn simulated_failure(job: usize) -> ThrottlerError {
    ThrottlerError::JobFailed {
        job,
        reason: "simulated failure".to_string(),
    }
}

/// Run the batch described by `args` on the selected runtime
///
/// # Errors
///
/// Returns an error if a job panics or its task cannot be joined.
pub async fn run_batch(args: &Args, progress: &ProgressTracker) -> Result<BatchStats> {
    match args.runtime {
        RuntimeKind::Threads => run_threaded(args, progress),
        RuntimeKind::Compio => run_compio(args, progress).await,
    }
}

/// Run the batch with one OS thread per job and a blocking gate
///
/// # Errors
///
/// Returns [`ThrottlerError::Runtime`] if a job thread panicked.
pub fn run_threaded(args: &Args, progress: &ProgressTracker) -> Result<BatchStats> {
    let start = Instant::now();
    let gate: ThrottleGate<ThrottlerError> =
        ThrottleGate::new(args.effective_max_workers(), args.gate_total());
    let running = Arc::new(RunningJobs::default());
    let mut handles = Vec::with_capacity(args.total_jobs);

    for job in 0..args.total_jobs {
        let mut guard = gate.guard();
        let running = Arc::clone(&running);
        let progress = progress.clone();
        let delay = random_delay(args.max_delay_ms);
        let fails = args.job_fails(job);

        debug!(job, ?delay, fails, "launching job thread");
        handles.push(thread::spawn(move || {
            running.enter();
            thread::sleep(delay);
            running.leave();
            progress.job_done();
            if fails {
                guard.fail(simulated_failure(job));
            }
        }));
        gate.acquire();
    }

    // Only needed when the gate had no total to wait for
    for handle in handles {
        handle
            .join()
            .map_err(|_| ThrottlerError::Runtime("job thread panicked".to_string()))?;
    }

    Ok(BatchStats {
        jobs_launched: args.total_jobs,
        jobs_completed: running.finished(),
        peak_concurrency: running.peak(),
        errors: gate.take_errors(),
        gate: gate.stats(),
        duration: start.elapsed(),
    })
}

/// Run the batch with one compio task per job and an async gate
///
/// # Errors
///
/// Returns [`ThrottlerError::Runtime`] if a job task panicked.
pub async fn run_compio(args: &Args, progress: &ProgressTracker) -> Result<BatchStats> {
    let start = Instant::now();
    let gate: AsyncThrottleGate<ThrottlerError> =
        AsyncThrottleGate::new(args.effective_max_workers(), args.gate_total());
    let running = Arc::new(RunningJobs::default());
    let mut handles = Vec::with_capacity(args.total_jobs);

    for job in 0..args.total_jobs {
        let mut guard = gate.guard();
        let running = Arc::clone(&running);
        let progress = progress.clone();
        let delay = random_delay(args.max_delay_ms);
        let fails = args.job_fails(job);

        debug!(job, ?delay, fails, "spawning job task");
        handles.push(compio::runtime::spawn(async move {
            running.enter();
            compio::time::sleep(delay).await;
            running.leave();
            progress.job_done();
            if fails {
                guard.fail(simulated_failure(job));
            }
        }));
        gate.acquire().await;
    }

    for handle in handles {
        handle
            .await
            .map_err(|_| ThrottlerError::Runtime("job task panicked".to_string()))?;
    }

    Ok(BatchStats {
        jobs_launched: args.total_jobs,
        jobs_completed: running.finished(),
        peak_concurrency: running.peak(),
        errors: gate.take_errors(),
        gate: gate.stats(),
        duration: start.elapsed(),
    })
}
