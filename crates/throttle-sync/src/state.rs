//! Observable gate state and statistics

use std::fmt;

/// Phase of a gate's lifecycle
///
/// ```text
/// Idle -> Filling <-> Saturated
///            |
///            v
///        Draining -> Done
/// ```
///
/// A gate built without a known total never leaves [`GateState::Passthrough`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GateState {
    /// Nothing launched yet
    Idle,
    /// Jobs launched, slots still free
    Filling,
    /// Every slot is taken; the launcher is waiting for a completion
    Saturated,
    /// The last job has been launched; the launcher waits for the rest
    Draining,
    /// Every expected completion was observed (terminal)
    Done,
    /// No total was given, so the gate never blocks
    Passthrough,
}

impl fmt::Display for GateState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Filling => "filling",
            Self::Saturated => "saturated",
            Self::Draining => "draining",
            Self::Done => "done",
            Self::Passthrough => "passthrough",
        };
        f.write_str(name)
    }
}

/// Point-in-time snapshot of a gate's counters
///
/// Counters are read independently, so a snapshot taken while workers are
/// running may be slightly inconsistent. Use it for monitoring, not decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateStats {
    /// Configured concurrency limit
    pub max_concurrency: usize,
    /// Configured number of expected completions (0 = unknown)
    pub total_jobs: usize,
    /// Jobs currently holding a slot
    pub active: usize,
    /// Number of `acquire` calls admitted
    pub started: usize,
    /// Completions consumed by the launcher
    pub completed: usize,
    /// Completions produced by workers
    pub released: usize,
    /// Completions that carried an error
    pub errors: usize,
    /// Lifecycle phase at snapshot time
    pub state: GateState,
}

impl fmt::Display for GateStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.state == GateState::Passthrough {
            return write!(
                f,
                "{} launched, {} released, {} errors (no total, max {})",
                self.started, self.released, self.errors, self.max_concurrency
            );
        }
        write!(
            f,
            "{}/{} completed, {} active (max {}), {} errors [{}]",
            self.completed,
            self.total_jobs,
            self.active,
            self.max_concurrency,
            self.errors,
            self.state
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_display_bounded() {
        let stats = GateStats {
            max_concurrency: 4,
            total_jobs: 10,
            active: 2,
            started: 5,
            completed: 3,
            released: 3,
            errors: 1,
            state: GateState::Filling,
        };
        assert_eq!(
            stats.to_string(),
            "3/10 completed, 2 active (max 4), 1 errors [filling]"
        );
    }

    #[test]
    fn test_stats_display_passthrough() {
        let stats = GateStats {
            max_concurrency: 5,
            total_jobs: 0,
            active: 0,
            started: 12,
            completed: 0,
            released: 9,
            errors: 0,
            state: GateState::Passthrough,
        };
        assert_eq!(
            stats.to_string(),
            "12 launched, 9 released, 0 errors (no total, max 5)"
        );
    }
}
