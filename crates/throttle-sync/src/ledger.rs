//! Counter bookkeeping shared by the blocking and async gates
//!
//! Only the launcher mutates `active`, `started` and `completed`, and it does
//! so while holding its gate's launcher lock. The counters are atomics so
//! that stats can be read from any thread without taking that lock.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{trace, warn};

use crate::completion::Completion;
use crate::state::{GateState, GateStats};

/// What the launcher has to do after admitting one job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Admission {
    /// Every slot is taken: wait for one completion
    pub saturated: bool,
    /// This was the last expected job: drain everything
    pub last: bool,
}

pub(crate) struct Ledger<E> {
    max_concurrency: usize,
    total_jobs: usize,
    active: AtomicUsize,
    started: AtomicUsize,
    completed: AtomicUsize,
    released: AtomicUsize,
    failed: AtomicUsize,
    errors: Mutex<Vec<E>>,
}

impl<E> Ledger<E> {
    /// # Panics
    ///
    /// Panics if `max_concurrency` is 0
    pub fn new(max_concurrency: usize, total_jobs: usize) -> Self {
        assert!(max_concurrency > 0, "max_concurrency has to be at least 1");
        Self {
            max_concurrency,
            total_jobs,
            active: AtomicUsize::new(0),
            started: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
            released: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
            errors: Mutex::new(Vec::new()),
        }
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    pub fn total_jobs(&self) -> usize {
        self.total_jobs
    }

    pub fn active(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    pub fn started(&self) -> usize {
        self.started.load(Ordering::Acquire)
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::Acquire)
    }

    pub fn is_passthrough(&self) -> bool {
        self.total_jobs == 0
    }

    pub fn is_done(&self) -> bool {
        !self.is_passthrough() && self.completed() >= self.total_jobs
    }

    /// Count a launch on a gate that never blocks
    pub fn note_passthrough_launch(&self) {
        self.started.fetch_add(1, Ordering::AcqRel);
    }

    /// Admit one job. Returns `None` once the gate is done.
    ///
    /// Must be called with the launcher lock held.
    pub fn admit(&self) -> Option<Admission> {
        if self.is_done() {
            warn!(
                total_jobs = self.total_jobs,
                "acquire called after every expected job completed; ignoring"
            );
            return None;
        }

        let started = self.started.fetch_add(1, Ordering::AcqRel) + 1;
        let active = self.active.fetch_add(1, Ordering::AcqRel) + 1;
        trace!(started, active, "job admitted");

        Some(Admission {
            saturated: active >= self.max_concurrency,
            last: started == self.total_jobs,
        })
    }

    /// Reserve capacity for one completion token.
    ///
    /// Returns false when workers have already produced `total_jobs` tokens.
    pub fn claim_release(&self) -> bool {
        if self.is_passthrough() {
            self.released.fetch_add(1, Ordering::AcqRel);
            return true;
        }

        let mut current = self.released.load(Ordering::Acquire);
        loop {
            if current >= self.total_jobs {
                warn!(
                    total_jobs = self.total_jobs,
                    "release called more times than total_jobs; discarding completion"
                );
                return false;
            }

            match self.released.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    /// Account for one token consumed by the launcher.
    ///
    /// Must be called with the launcher lock held.
    pub fn record_completion(&self, completion: Completion<E>) {
        let completed = self.completed.fetch_add(1, Ordering::AcqRel) + 1;
        self.active.fetch_sub(1, Ordering::AcqRel);
        trace!(completed, failed = completion.is_failed(), "completion consumed");
        self.collect(completion);
    }

    /// Keep the error from a token that will never reach the launcher
    pub fn collect(&self, completion: Completion<E>) {
        if let Completion::Failed(error) = completion {
            self.failed.fetch_add(1, Ordering::AcqRel);
            self.lock_errors().push(error);
        }
    }

    pub fn errors(&self) -> Vec<E>
    where
        E: Clone,
    {
        self.lock_errors().clone()
    }

    pub fn take_errors(&self) -> Vec<E> {
        std::mem::take(&mut *self.lock_errors())
    }

    pub fn state(&self) -> GateState {
        if self.is_passthrough() {
            return GateState::Passthrough;
        }

        let started = self.started();
        if self.completed() >= self.total_jobs {
            GateState::Done
        } else if started >= self.total_jobs {
            GateState::Draining
        } else if started == 0 {
            GateState::Idle
        } else if self.active() >= self.max_concurrency {
            GateState::Saturated
        } else {
            GateState::Filling
        }
    }

    pub fn stats(&self) -> GateStats {
        GateStats {
            max_concurrency: self.max_concurrency,
            total_jobs: self.total_jobs,
            active: self.active(),
            started: self.started(),
            completed: self.completed(),
            released: self.released.load(Ordering::Acquire),
            errors: self.failed.load(Ordering::Acquire),
            state: self.state(),
        }
    }

    fn lock_errors(&self) -> MutexGuard<'_, Vec<E>> {
        self.errors.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admit_flags_saturation_and_last_job() {
        let ledger: Ledger<()> = Ledger::new(2, 3);

        assert_eq!(
            ledger.admit(),
            Some(Admission {
                saturated: false,
                last: false
            })
        );
        assert_eq!(
            ledger.admit(),
            Some(Admission {
                saturated: true,
                last: false
            })
        );
        ledger.record_completion(Completion::Ok);
        assert_eq!(
            ledger.admit(),
            Some(Admission {
                saturated: true,
                last: true
            })
        );
    }

    #[test]
    fn test_admit_ignored_once_done() {
        let ledger: Ledger<()> = Ledger::new(1, 1);
        ledger.admit();
        ledger.record_completion(Completion::Ok);
        assert!(ledger.is_done());
        assert_eq!(ledger.admit(), None);
        assert_eq!(ledger.started(), 1);
    }

    #[test]
    fn test_claim_release_caps_at_total() {
        let ledger: Ledger<()> = Ledger::new(1, 2);
        assert!(ledger.claim_release());
        assert!(ledger.claim_release());
        assert!(!ledger.claim_release());
        assert_eq!(ledger.stats().released, 2);
    }

    #[test]
    fn test_claim_release_unbounded_without_total() {
        let ledger: Ledger<()> = Ledger::new(1, 0);
        for _ in 0..100 {
            assert!(ledger.claim_release());
        }
    }

    #[test]
    fn test_record_completion_collects_errors_in_order() {
        let ledger: Ledger<&str> = Ledger::new(3, 3);
        for _ in 0..3 {
            ledger.admit();
        }
        ledger.record_completion(Completion::Failed("a"));
        ledger.record_completion(Completion::Ok);
        ledger.record_completion(Completion::Failed("b"));

        assert_eq!(ledger.errors(), vec!["a", "b"]);
        assert_eq!(ledger.stats().errors, 2);
        assert_eq!(ledger.take_errors(), vec!["a", "b"]);
        assert!(ledger.errors().is_empty());
    }

    #[test]
    fn test_state_transitions() {
        let ledger: Ledger<()> = Ledger::new(2, 3);
        assert_eq!(ledger.state(), GateState::Idle);
        ledger.admit();
        assert_eq!(ledger.state(), GateState::Filling);
        ledger.admit();
        assert_eq!(ledger.state(), GateState::Saturated);
        ledger.record_completion(Completion::Ok);
        assert_eq!(ledger.state(), GateState::Filling);
        ledger.admit();
        assert_eq!(ledger.state(), GateState::Draining);
        ledger.record_completion(Completion::Ok);
        ledger.record_completion(Completion::Ok);
        assert_eq!(ledger.state(), GateState::Done);
        assert_eq!(ledger.active(), 0);
    }

    #[test]
    fn test_passthrough_state() {
        let ledger: Ledger<()> = Ledger::new(5, 0);
        ledger.note_passthrough_launch();
        assert_eq!(ledger.state(), GateState::Passthrough);
        assert!(!ledger.is_done());
    }

    #[test]
    #[should_panic(expected = "max_concurrency has to be at least 1")]
    fn test_zero_concurrency_panics() {
        let _ledger: Ledger<()> = Ledger::new(0, 10);
    }
}
