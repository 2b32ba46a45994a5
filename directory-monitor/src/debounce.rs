//! Debounce coordinator.
//!
//! Coalesces a burst of write signals into one deadline. Every signal while
//! a deadline is pending pushes it to `now + quiet`, so evaluation only
//! happens once the directory has been quiet for a full interval.

use std::time::Duration;

use tokio::time::Instant;
use tracing::trace;

/// State of the debounce coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebounceState {
    /// No usable source, signals are dropped.
    Idle,

    /// Source active, nothing scheduled.
    Armed,

    /// A deadline is scheduled.
    Pending { deadline: Instant },
}

/// What happened to a write signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalOutcome {
    /// The coordinator was idle.
    Dropped,

    /// A fresh deadline was scheduled.
    Scheduled,

    /// The pending deadline was pushed back.
    Extended,
}

/// Single-deadline debouncer.
#[derive(Debug)]
pub struct Debouncer {
    quiet: Duration,
    state: DebounceState,
}

impl Debouncer {
    /// Create an idle debouncer.
    pub fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            state: DebounceState::Idle,
        }
    }

    /// Current state.
    pub fn state(&self) -> DebounceState {
        self.state
    }

    /// Deadline of the pending evaluation, if any.
    pub fn deadline(&self) -> Option<Instant> {
        match self.state {
            DebounceState::Pending { deadline } => Some(deadline),
            DebounceState::Idle | DebounceState::Armed => None,
        }
    }

    /// Leave `Idle` once a source is available. No effect otherwise.
    pub fn arm(&mut self) {
        if self.state == DebounceState::Idle {
            self.state = DebounceState::Armed;
        }
    }

    /// Schedule an evaluation for `now`, replacing any pending deadline.
    pub fn schedule_immediate(&mut self, now: Instant) {
        self.state = DebounceState::Pending { deadline: now };
    }

    /// Record a write signal received at `now`.
    pub fn signal(&mut self, now: Instant) -> SignalOutcome {
        let deadline = now + self.quiet;
        match self.state {
            DebounceState::Idle => SignalOutcome::Dropped,
            DebounceState::Armed => {
                trace!("Debounce scheduled in {:?}", self.quiet);
                self.state = DebounceState::Pending { deadline };
                SignalOutcome::Scheduled
            }
            DebounceState::Pending { .. } => {
                self.state = DebounceState::Pending { deadline };
                SignalOutcome::Extended
            }
        }
    }

    /// Consume the pending deadline if it is due at `now`.
    ///
    /// Returns `true` when the deadline fired; the debouncer is then back
    /// in `Armed`.
    pub fn fire(&mut self, now: Instant) -> bool {
        match self.state {
            DebounceState::Pending { deadline } if deadline <= now => {
                trace!("Debounce deadline fired");
                self.state = DebounceState::Armed;
                true
            }
            _ => false,
        }
    }

    /// Return to `Idle`, dropping any pending deadline.
    pub fn reset(&mut self) {
        self.state = DebounceState::Idle;
    }
}
