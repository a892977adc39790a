//! Command-line interface definitions

use anyhow::Result;
use clap::Parser;

/// Run a simulated batch of jobs through a throttle gate
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Maximum number of jobs running at once (0 = number of CPU cores)
    #[arg(short = 'w', long, default_value = "0")]
    pub max_workers: usize,

    /// Number of jobs in the batch
    #[arg(short = 'n', long, default_value = "50")]
    pub total_jobs: usize,

    /// Upper bound for each job's random delay, in milliseconds
    #[arg(long, default_value = "5")]
    pub max_delay_ms: u64,

    /// Make every Nth job fail (0 = no failures)
    ///
    /// Failed jobs still release their slot; their errors are collected by
    /// the gate and reported once the batch is done.
    #[arg(long, default_value = "0")]
    pub fail_every: usize,

    /// How jobs are run
    #[arg(long, value_enum, default_value = "threads")]
    pub runtime: RuntimeKind,

    /// Do not tell the gate how many jobs to expect
    ///
    /// The gate then never blocks, so concurrency is not bounded. Useful to
    /// compare against a throttled run.
    #[arg(long)]
    pub unknown_total: bool,

    /// Show progress information
    #[arg(long)]
    pub progress: bool,

    /// Verbose output (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (suppress all output except errors)
    #[arg(short, long)]
    pub quiet: bool,
}

/// Where the simulated jobs run
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum RuntimeKind {
    /// One OS thread per job, blocking gate
    Threads,
    /// One compio task per job, async gate
    Compio,
}

impl Args {
    /// Validate command-line arguments
    ///
    /// # Errors
    ///
    /// This function will return an error if:
    /// - The worker count is larger than 10000
    /// - The total job count is larger than 1000000
    /// - The delay is larger than 60 seconds
    /// - Both quiet and verbose modes are specified
    pub fn validate(&self) -> Result<()> {
        if self.max_workers > 10_000 {
            anyhow::bail!(
                "Max workers must be between 1 and 10000 (0 = auto), got: {}",
                self.max_workers
            );
        }

        if self.total_jobs > 1_000_000 {
            anyhow::bail!(
                "Total jobs must be at most 1000000, got: {}",
                self.total_jobs
            );
        }

        if self.max_delay_ms > 60_000 {
            anyhow::bail!(
                "Max delay must be at most 60000 ms, got: {}",
                self.max_delay_ms
            );
        }

        if self.effective_max_workers() == 0 {
            anyhow::bail!("No CPU cores available");
        }

        if self.quiet && self.verbose > 0 {
            anyhow::bail!("Cannot use both --quiet and --verbose options");
        }

        Ok(())
    }

    /// Get the actual concurrency limit to use
    #[must_use]
    pub fn effective_max_workers(&self) -> usize {
        if self.max_workers == 0 {
            num_cpus::get()
        } else {
            self.max_workers
        }
    }

    /// Total handed to the gate (0 tells it no total is known)
    #[must_use]
    pub const fn gate_total(&self) -> usize {
        if self.unknown_total {
            0
        } else {
            self.total_jobs
        }
    }

    /// Whether the given job index should fail
    #[must_use]
    pub const fn job_fails(&self, job: usize) -> bool {
        self.fail_every != 0 && (job + 1) % self.fail_every == 0
    }

    #[cfg(test)]
    pub fn test_default() -> Self {
        Self {
            max_workers: 4,
            total_jobs: 20,
            max_delay_ms: 1,
            fail_every: 0,
            runtime: RuntimeKind::Threads,
            unknown_total: false,
            progress: false,
            verbose: 0,
            quiet: false,
        }
    }
}
