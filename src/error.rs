//! Error handling and types

use thiserror::Error;

/// Errors from configuring and running a throttled batch
#[derive(Error, Debug)]
pub enum ThrottlerError {
    /// A simulated job reported a failure
    #[error("Job {job} failed: {reason}")]
    JobFailed {
        /// Index of the job within the batch
        job: usize,
        /// Why it failed
        reason: String,
    },

    /// More jobs ran at once than the gate allows
    #[error("Concurrency limit exceeded: observed {observed} running jobs, limit is {limit}")]
    LimitExceeded {
        /// Highest number of simultaneously running jobs seen
        observed: usize,
        /// Configured limit
        limit: usize,
    },

    /// A job thread or task could not be joined
    #[error("Runtime error: {0}")]
    Runtime(String),
}

pub type Result<T> = std::result::Result<T, ThrottlerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_failed_message() {
        let err = ThrottlerError::JobFailed {
            job: 7,
            reason: "simulated failure".to_string(),
        };
        assert_eq!(err.to_string(), "Job 7 failed: simulated failure");
    }

    #[test]
    fn test_limit_exceeded_message() {
        let err = ThrottlerError::LimitExceeded {
            observed: 6,
            limit: 5,
        };
        assert!(err.to_string().contains("observed 6"));
    }

    #[test]
    fn test_runtime_message() {
        let err = ThrottlerError::Runtime("job thread panicked".to_string());
        assert_eq!(err.to_string(), "Runtime error: job thread panicked");
    }
}
