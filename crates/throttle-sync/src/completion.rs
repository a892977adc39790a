//! Completion tokens and the RAII guard workers use to produce them
//!
//! Every launched job must hand exactly one [`Completion`] back to its gate.
//! [`ReleaseGuard`] makes that automatic: it sends the token when dropped, so a
//! job that returns early, propagates an error with `?`, or panics still frees
//! its slot.
//!
//! # Example
//!
//! ```rust
//! use throttle_sync::ThrottleGate;
//!
//! let gate: ThrottleGate<String> = ThrottleGate::new(2, 1);
//!
//! let worker = {
//!     let mut guard = gate.guard();
//!     std::thread::spawn(move || {
//!         guard.fail("disk full".to_string());
//!         // guard dropped here, completion sent
//!     })
//! };
//! gate.acquire();
//! worker.join().unwrap();
//!
//! assert_eq!(gate.errors(), vec!["disk full".to_string()]);
//! ```

use std::convert::Infallible;

/// One completion signal, produced exactly once per launched job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion<E = Infallible> {
    /// The job finished with nothing to report
    Ok,
    /// The job finished and handed back an error for post-batch inspection
    Failed(E),
}

impl<E> Completion<E> {
    /// Whether this token carries an error
    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// The carried error, if any
    #[must_use]
    pub fn into_error(self) -> Option<E> {
        match self {
            Self::Ok => None,
            Self::Failed(error) => Some(error),
        }
    }
}

impl<E> From<Result<(), E>> for Completion<E> {
    fn from(result: Result<(), E>) -> Self {
        match result {
            Ok(()) => Self::Ok,
            Err(error) => Self::Failed(error),
        }
    }
}

impl<E> From<Option<E>> for Completion<E> {
    fn from(error: Option<E>) -> Self {
        error.map_or(Self::Ok, Self::Failed)
    }
}

/// Anything that accepts completion tokens without blocking
///
/// Implemented by both gates so [`ReleaseGuard`] works with either.
pub trait CompletionSink<E> {
    /// Hand one completion token to the gate
    fn send_completion(&self, completion: Completion<E>);
}

/// RAII guard that releases one gate slot on drop
///
/// Returned by `ThrottleGate::guard()` and `AsyncThrottleGate::guard()`.
/// Move it into the job; the completion is sent exactly once, when the guard
/// goes out of scope or is consumed by [`ReleaseGuard::complete`].
#[must_use = "dropping the guard immediately releases the slot"]
pub struct ReleaseGuard<G, E = Infallible>
where
    G: CompletionSink<E>,
{
    gate: G,
    error: Option<E>,
}

impl<G, E> ReleaseGuard<G, E>
where
    G: CompletionSink<E>,
{
    pub(crate) fn new(gate: G) -> Self {
        Self { gate, error: None }
    }

    /// Attach an error to the pending completion
    ///
    /// Calling this more than once keeps only the last error.
    pub fn fail(&mut self, error: E) {
        self.error = Some(error);
    }

    /// Release now, carrying the job's result
    pub fn complete(mut self, result: Result<(), E>) {
        if let Err(error) = result {
            self.error = Some(error);
        }
    }

    /// Whether an error is attached
    #[must_use]
    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }
}

impl<G, E> Drop for ReleaseGuard<G, E>
where
    G: CompletionSink<E>,
{
    fn drop(&mut self) {
        let completion = Completion::from(self.error.take());
        self.gate.send_completion(completion);
    }
}
