//! throttler: run many jobs with at most N at a time, then wait for all
//!
//! This library re-exports the gate primitives from `throttle-sync` and adds
//! the pieces behind the `throttler` binary: argument parsing, a simulated
//! batch runner and progress reporting.

pub mod batch;
pub mod cli;
pub mod error;
pub mod progress;

// Re-export commonly used types
pub use error::{Result, ThrottlerError};
pub use throttle_sync::{
    AsyncThrottleGate, Completion, CompletionSink, GateState, GateStats, ReleaseGuard,
    ThrottleGate,
};
