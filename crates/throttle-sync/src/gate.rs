//! Blocking throttle gate for thread-based launchers
//!
//! The launcher thread starts a job, then calls [`ThrottleGate::acquire`]
//! before starting the next one. Each job calls [`ThrottleGate::release`]
//! (or drops a [`ReleaseGuard`]) when it finishes. The last `acquire` call
//! waits for the whole batch.
//!
//! # Example
//!
//! ```rust
//! use throttle_sync::ThrottleGate;
//!
//! let urls = ["a", "b", "c", "d", "e"];
//! // At most 2 fetches at a time
//! let gate: ThrottleGate = ThrottleGate::new(2, urls.len());
//!
//! for url in urls {
//!     let guard = gate.guard();
//!     std::thread::spawn(move || {
//!         let _guard = guard;
//!         println!("fetching {url}");
//!     });
//!     // Pauses until a worker is available or all jobs have completed
//!     gate.acquire();
//! }
//!
//! assert!(gate.is_done());
//! ```

use std::convert::Infallible;
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, trace, warn};

use crate::completion::{Completion, CompletionSink, ReleaseGuard};
use crate::ledger::Ledger;
use crate::state::{GateState, GateStats};

/// Bounded-concurrency gate with a completion barrier
///
/// Caps the number of simultaneously running jobs at `max_concurrency` and
/// turns the last of `total_jobs` `acquire` calls into a wait-for-all.
/// `E` is the error type jobs may report; the default `Infallible` gives a
/// gate that only counts.
///
/// # Design
///
/// - **Completion channel**: a bounded `sync_channel` sized to `total_jobs`;
///   releases never block and the launcher is the only consumer
/// - **Serialized launcher**: the admit-then-wait sequence runs under one lock
/// - **Lock-free stats**: counters are atomics, readable from any thread
/// - **Cloneable**: wraps an `Arc`, so each worker can own a handle
///
/// A gate created with `total_jobs == 0` never blocks. Calling `release`
/// fewer times than `acquire` makes the final `acquire` block forever.
pub struct ThrottleGate<E = Infallible> {
    inner: Arc<GateInner<E>>,
}

struct GateInner<E> {
    ledger: Ledger<E>,
    sender: SyncSender<Completion<E>>,
    receiver: Mutex<Receiver<Completion<E>>>,
}

impl<E> Clone for ThrottleGate<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E> ThrottleGate<E> {
    /// Create a gate for `total_jobs` jobs, at most `max_concurrency` at once
    ///
    /// A `total_jobs` of 0 means the total is unknown; the gate then never
    /// blocks.
    ///
    /// # Panics
    ///
    /// Panics if `max_concurrency` is 0
    ///
    /// # Example
    ///
    /// ```rust
    /// use throttle_sync::ThrottleGate;
    ///
    /// let gate: ThrottleGate = ThrottleGate::new(4, 100);
    /// assert_eq!(gate.max_concurrency(), 4);
    /// assert_eq!(gate.total_jobs(), 100);
    /// ```
    #[must_use]
    pub fn new(max_concurrency: usize, total_jobs: usize) -> Self {
        let ledger = Ledger::new(max_concurrency, total_jobs);
        let (sender, receiver) = mpsc::sync_channel(total_jobs);
        debug!(max_concurrency, total_jobs, "throttle gate created");
        Self {
            inner: Arc::new(GateInner {
                ledger,
                sender,
                receiver: Mutex::new(receiver),
            }),
        }
    }

    /// Create a gate with no known total; `acquire` never blocks
    ///
    /// # Panics
    ///
    /// Panics if `max_concurrency` is 0
    #[must_use]
    pub fn without_total(max_concurrency: usize) -> Self {
        Self::new(max_concurrency, 0)
    }

    /// Account for the job just launched and wait until another may start
    ///
    /// Blocks while every slot is taken. The call that accounts for the
    /// last of `total_jobs` jobs blocks until all of them have released.
    /// On a gate without a total, or one that is already done, this returns
    /// immediately.
    pub fn acquire(&self) {
        let ledger = &self.inner.ledger;
        if ledger.is_passthrough() {
            ledger.note_passthrough_launch();
            return;
        }

        // Admit and wait as one unit
        let receiver = self.lock_receiver();
        let Some(admission) = ledger.admit() else {
            return;
        };

        if admission.saturated {
            debug!(
                active = ledger.active(),
                max_concurrency = ledger.max_concurrency(),
                "all slots busy, waiting for a completion"
            );
            self.wait_one(&receiver);
        }

        if admission.last {
            debug!(
                outstanding = ledger.total_jobs() - ledger.completed(),
                "last job launched, draining"
            );
            while !ledger.is_done() {
                self.wait_one(&receiver);
            }
            debug!(total_jobs = ledger.total_jobs(), "batch complete");
        }
    }

    /// Signal that one job finished
    ///
    /// Never blocks. Call exactly once per job; prefer [`ThrottleGate::guard`]
    /// so the call happens on every exit path.
    pub fn release(&self) {
        self.send_completion(Completion::Ok);
    }

    /// Signal that one job finished, carrying its outcome
    ///
    /// Accepts a `Result<(), E>`, an `Option<E>` or a [`Completion`]. Errors
    /// are collected and returned by [`ThrottleGate::errors`].
    pub fn release_with(&self, outcome: impl Into<Completion<E>>) {
        self.send_completion(outcome.into());
    }

    /// RAII guard that releases this gate when dropped
    pub fn guard(&self) -> ReleaseGuard<Self, E> {
        ReleaseGuard::new(self.clone())
    }

    /// Errors collected so far, in the order the launcher observed them
    ///
    /// Inspect after the batch completes; errors still in flight are not
    /// included.
    #[must_use]
    pub fn errors(&self) -> Vec<E>
    where
        E: Clone,
    {
        self.inner.ledger.errors()
    }

    /// Move the collected errors out of the gate
    #[must_use]
    pub fn take_errors(&self) -> Vec<E> {
        self.inner.ledger.take_errors()
    }

    /// Configured concurrency limit
    #[must_use]
    pub fn max_concurrency(&self) -> usize {
        self.inner.ledger.max_concurrency()
    }

    /// Configured number of expected jobs (0 = unknown)
    #[must_use]
    pub fn total_jobs(&self) -> usize {
        self.inner.ledger.total_jobs()
    }

    /// Jobs currently holding a slot
    #[must_use]
    pub fn active(&self) -> usize {
        self.inner.ledger.active()
    }

    /// Number of admitted `acquire` calls
    #[must_use]
    pub fn started(&self) -> usize {
        self.inner.ledger.started()
    }

    /// Completions observed by the launcher
    #[must_use]
    pub fn completed(&self) -> usize {
        self.inner.ledger.completed()
    }

    /// Whether this gate was created without a total
    #[must_use]
    pub fn is_passthrough(&self) -> bool {
        self.inner.ledger.is_passthrough()
    }

    /// Whether every expected completion was observed
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.inner.ledger.is_done()
    }

    /// Current lifecycle phase
    #[must_use]
    pub fn state(&self) -> GateState {
        self.inner.ledger.state()
    }

    /// Snapshot of the gate's counters
    #[must_use]
    pub fn stats(&self) -> GateStats {
        self.inner.ledger.stats()
    }

    fn lock_receiver(&self) -> MutexGuard<'_, Receiver<Completion<E>>> {
        self.inner
            .receiver
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn wait_one(&self, receiver: &Receiver<Completion<E>>) {
        // The gate holds a sender, so the channel cannot disconnect here
        if let Ok(completion) = receiver.recv() {
            self.inner.ledger.record_completion(completion);
        }
    }
}

impl<E> CompletionSink<E> for ThrottleGate<E> {
    fn send_completion(&self, completion: Completion<E>) {
        let ledger = &self.inner.ledger;
        if !ledger.claim_release() {
            return;
        }

        if ledger.is_passthrough() {
            // Nobody will consume the token
            ledger.collect(completion);
            return;
        }

        match self.inner.sender.try_send(completion) {
            Ok(()) => trace!("completion queued"),
            Err(TrySendError::Full(completion) | TrySendError::Disconnected(completion)) => {
                warn!("completion channel refused a token");
                ledger.collect(completion);
            }
        }
    }
}

impl<E> std::fmt::Debug for ThrottleGate<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThrottleGate")
            .field("stats", &self.stats())
            .finish()
    }
}
