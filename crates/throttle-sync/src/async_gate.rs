//! Async throttle gate for compio launcher tasks
//!
//! Same contract as [`ThrottleGate`](crate::ThrottleGate), but
//! [`AsyncThrottleGate::acquire`] yields to the runtime instead of blocking
//! the thread. `release` stays synchronous, so workers on any task or thread
//! can call it.
//!
//! # Example
//!
//! ```rust,no_run
//! use throttle_sync::AsyncThrottleGate;
//!
//! #[compio::main]
//! async fn main() {
//!     let gate: AsyncThrottleGate = AsyncThrottleGate::new(100, 1000);
//!     let mut handles = Vec::new();
//!
//!     // Spawn many tasks, but only 100 run concurrently
//!     for i in 0..1000 {
//!         let guard = gate.guard();
//!         handles.push(compio::runtime::spawn(async move {
//!             let _guard = guard;
//!             println!("Task {}", i);
//!         }));
//!         gate.acquire().await;
//!     }
//!
//!     // The last acquire waited for every task
//!     assert!(gate.is_done());
//! }
//! ```

use std::convert::Infallible;
use std::sync::Arc;

use futures::channel::mpsc::{self, UnboundedReceiver, UnboundedSender};
use futures::lock::Mutex;
use futures::StreamExt;
use tracing::{debug, trace, warn};

use crate::completion::{Completion, CompletionSink, ReleaseGuard};
use crate::ledger::Ledger;
use crate::state::{GateState, GateStats};

/// Async bounded-concurrency gate with a completion barrier
///
/// The launcher task awaits [`AsyncThrottleGate::acquire`] after spawning
/// each job. Workers call [`AsyncThrottleGate::release`] or drop a
/// [`ReleaseGuard`]. Capacity of the completion channel is enforced by
/// counting releases against `total_jobs`, so a worker never waits.
pub struct AsyncThrottleGate<E = Infallible> {
    inner: Arc<AsyncGateInner<E>>,
}

struct AsyncGateInner<E> {
    ledger: Ledger<E>,
    sender: UnboundedSender<Completion<E>>,
    receiver: Mutex<UnboundedReceiver<Completion<E>>>,
}

impl<E> Clone for AsyncThrottleGate<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E> AsyncThrottleGate<E> {
    /// Create a gate for `total_jobs` jobs, at most `max_concurrency` at once
    ///
    /// # Panics
    ///
    /// Panics if `max_concurrency` is 0
    ///
    /// # Example
    ///
    /// ```rust
    /// use throttle_sync::AsyncThrottleGate;
    ///
    /// let gate: AsyncThrottleGate = AsyncThrottleGate::new(8, 64);
    /// assert_eq!(gate.max_concurrency(), 8);
    /// ```
    #[must_use]
    pub fn new(max_concurrency: usize, total_jobs: usize) -> Self {
        let ledger = Ledger::new(max_concurrency, total_jobs);
        let (sender, receiver) = mpsc::unbounded();
        debug!(max_concurrency, total_jobs, "async throttle gate created");
        Self {
            inner: Arc::new(AsyncGateInner {
                ledger,
                sender,
                receiver: Mutex::new(receiver),
            }),
        }
    }

    /// Create a gate with no known total; `acquire` never waits
    ///
    /// # Panics
    ///
    /// Panics if `max_concurrency` is 0
    #[must_use]
    pub fn without_total(max_concurrency: usize) -> Self {
        Self::new(max_concurrency, 0)
    }

    /// Account for the job just spawned and wait until another may start
    ///
    /// The call that accounts for the last of `total_jobs` jobs resolves
    /// only after every job has released.
    ///
    /// # Cancellation
    ///
    /// Dropping the future before it resolves does not undo the admission:
    /// the job stays counted as started and active, and that call's wait is
    /// skipped. The next call that waits picks up the outstanding
    /// completions, and the final call still drains all of them. The gate has
    /// no timeouts of its own; wrap the call if you need one.
    pub async fn acquire(&self) {
        let ledger = &self.inner.ledger;
        if ledger.is_passthrough() {
            ledger.note_passthrough_launch();
            return;
        }

        let mut receiver = self.inner.receiver.lock().await;
        let Some(admission) = ledger.admit() else {
            return;
        };

        if admission.saturated {
            debug!(
                active = ledger.active(),
                max_concurrency = ledger.max_concurrency(),
                "all slots busy, waiting for a completion"
            );
            self.wait_one(&mut receiver).await;
        }

        if admission.last {
            debug!(
                outstanding = ledger.total_jobs() - ledger.completed(),
                "last job launched, draining"
            );
            while !ledger.is_done() {
                self.wait_one(&mut receiver).await;
            }
            debug!(total_jobs = ledger.total_jobs(), "batch complete");
        }
    }

    /// Signal that one job finished; never blocks
    pub fn release(&self) {
        self.send_completion(Completion::Ok);
    }

    /// Signal that one job finished, carrying its outcome
    pub fn release_with(&self, outcome: impl Into<Completion<E>>) {
        self.send_completion(outcome.into());
    }

    /// RAII guard that releases this gate when dropped
    pub fn guard(&self) -> ReleaseGuard<Self, E> {
        ReleaseGuard::new(self.clone())
    }

    /// Errors collected so far, in the order the launcher observed them
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

    async fn wait_one(&self, receiver: &mut UnboundedReceiver<Completion<E>>) {
        // The gate holds a sender, so the stream never ends here
        if let Some(completion) = receiver.next().await {
            self.inner.ledger.record_completion(completion);
        }
    }
}

impl<E> CompletionSink<E> for AsyncThrottleGate<E> {
    fn send_completion(&self, completion: Completion<E>) {
        let ledger = &self.inner.ledger;
        if !ledger.claim_release() {
            return;
        }

        if ledger.is_passthrough() {
            ledger.collect(completion);
            return;
        }

        match self.inner.sender.unbounded_send(completion) {
            Ok(()) => trace!("completion queued"),
            Err(refused) => {
                warn!("completion channel refused a token");
                ledger.collect(refused.into_inner());
            }
        }
    }
}

impl<E> std::fmt::Debug for AsyncThrottleGate<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncThrottleGate")
            .field("stats", &self.stats())
            .finish()
    }
}
