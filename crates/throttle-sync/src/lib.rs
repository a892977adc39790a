//! Bounded-concurrency gate with a completion barrier
//!
//! A launcher starts an unbounded stream of independent jobs; the gate makes
//! sure no more than `max_concurrency` of them run at once and turns the
//! final launch into a wait for the whole batch. Think of a counting
//! semaphore fused with a wait group.
//!
//! # Primitives
//!
//! - [`ThrottleGate`] - blocking gate for thread-based launchers
//! - [`AsyncThrottleGate`] - the same gate for a [compio](https://github.com/compio-rs/compio) launcher task
//! - [`ReleaseGuard`] - RAII handle that releases a slot on every exit path
//!
//! Both gates are generic over the error type jobs may report. With the
//! default `Infallible` they only count; otherwise errors passed to
//! `release_with` are collected for inspection after the batch.
//!
//! # Example
//!
//! ```rust
//! use throttle_sync::ThrottleGate;
//!
//! let gate: ThrottleGate<String> = ThrottleGate::new(3, 10);
//!
//! for i in 0..10 {
//!     let mut guard = gate.guard();
//!     std::thread::spawn(move || {
//!         if i % 2 != 0 {
//!             guard.fail(format!("error on job {i}"));
//!         }
//!     });
//!     gate.acquire();
//! }
//!
//! assert_eq!(gate.errors().len(), 5);
//! ```

mod async_gate;
mod completion;
mod gate;
mod ledger;
mod state;

pub use async_gate::AsyncThrottleGate;
pub use completion::{Completion, CompletionSink, ReleaseGuard};
pub use gate::ThrottleGate;
pub use state::{GateState, GateStats};
