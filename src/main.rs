//! throttler: drive a simulated batch of jobs through a throttle gate
//!
//! Launches jobs with random delays, at most `--max-workers` at a time, and
//! reports the peak concurrency and the errors the gate collected.

use anyhow::{Context, Result};
use clap::Parser;
use throttler::batch::run_batch;
use throttler::cli::Args;
use throttler::progress::ProgressTracker;
use tracing::{info, warn, Level};

#[compio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging based on verbosity and quiet mode
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(if args.quiet {
            Level::ERROR
        } else {
            match args.verbose {
                0 => Level::WARN,
                1 => Level::INFO,
                2 => Level::DEBUG,
                _ => Level::TRACE,
            }
        })
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // Validate arguments
    args.validate().context("Invalid arguments")?;

    info!("Starting throttler v{}", env!("CARGO_PKG_VERSION"));
    info!("Max workers: {}", args.effective_max_workers());
    info!("Total jobs: {}", args.total_jobs);
    info!("Runtime: {:?}", args.runtime);
    if args.unknown_total {
        warn!("Gate has no total; concurrency will not be bounded");
    }

    let progress = if args.progress && !args.quiet {
        ProgressTracker::new(args.total_jobs)
    } else {
        ProgressTracker::hidden()
    };

    let stats = run_batch(&args, &progress)
        .await
        .context("Batch failed")?;
    progress.finish();

    info!("Jobs reported done: {}", progress.jobs_done());
    info!("Gate: {}", stats.gate);
    for error in &stats.errors {
        warn!("{}", error);
    }

    if !args.quiet {
        println!(
            "Completed {}/{} jobs in {:?}, peak concurrency {} (limit {}), {} errors",
            stats.jobs_completed,
            stats.jobs_launched,
            stats.duration,
            stats.peak_concurrency,
            stats.gate.max_concurrency,
            stats.errors.len()
        );
    }

    stats.check_limit().context("Throttle check failed")?;
    Ok(())
}
