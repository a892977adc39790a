//! Progress tracking and reporting

use indicatif::{ProgressBar, ProgressStyle};

/// Progress bar counting finished jobs
///
/// Cheap to clone; workers tick it from any thread or task.
#[derive(Clone)]
pub struct ProgressTracker {
    progress_bar: ProgressBar,
}

impl ProgressTracker {
    /// Visible progress bar for `total_jobs` jobs
    #[must_use]
    pub fn new(total_jobs: usize) -> Self {
        let pb = ProgressBar::new(total_jobs as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} jobs ({eta})")
        {
            pb.set_style(style.progress_chars("#>-"));
        }

        Self { progress_bar: pb }
    }

    /// Tracker that draws nothing
    #[must_use]
    pub fn hidden() -> Self {
        Self {
            progress_bar: ProgressBar::hidden(),
        }
    }

    /// Record one finished job
    pub fn job_done(&self) {
        self.progress_bar.inc(1);
    }

    /// Jobs recorded so far, even when the bar is hidden
    #[must_use]
    pub fn jobs_done(&self) -> u64 {
        self.progress_bar.position()
    }

    pub fn finish(&self) {
        self.progress_bar.finish_with_message("Batch completed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hidden_tracker_counts() {
        let tracker = ProgressTracker::hidden();
        let clone = tracker.clone();
        tracker.job_done();
        clone.job_done();
        assert_eq!(tracker.jobs_done(), 2);
        tracker.finish();
    }
}
