//! Bounded busy-wait backoff.
//!
//! One escalation policy shared by every spin site in the crate: the
//! versioned snapshot lock's read retry, the synchronous continuation wait,
//! and the worker-pool stop/kill barriers. The caller owns the iteration
//! counter and passes it in, so independent waits never share state.
//!
//! Escalation: processor spin hints, then OS yields, then short sleeps.
//! Never an unbounded OS-level blocking wait.

use std::time::Duration;

/// Iterations spent in the pure-spin phase (spins double each iteration).
const SPIN_LIMIT: u32 = 6;
/// Iterations (inclusive) after which a yield becomes a short sleep.
const YIELD_LIMIT: u32 = 12;
/// Sleep length once escalation reaches the sleep phase.
const SLEEP: Duration = Duration::from_micros(50);

/// Waits an amount appropriate for the given attempt number.
///
/// `iteration` counts from zero; callers increment it between attempts and
/// reset it when progress is observed.
pub fn backoff(iteration: u32) {
    if iteration <= SPIN_LIMIT {
        for _ in 0..(1u32 << iteration) {
            core::hint::spin_loop();
        }
    } else if iteration <= YIELD_LIMIT {
        std::thread::yield_now();
    } else {
        std::thread::sleep(SLEEP);
    }
}

/// An iteration counter bundled with [`backoff`].
///
/// Convenience for loops that would otherwise thread a bare counter around.
#[derive(Debug, Default)]
pub struct Backoff {
    iteration: u32,
}

impl Backoff {
    /// Creates a counter starting at the spin phase.
    #[must_use]
    pub const fn new() -> Self {
        Self { iteration: 0 }
    }

    /// Waits once and advances the escalation.
    pub fn wait(&mut self) {
        backoff(self.iteration);
        self.iteration = self.iteration.saturating_add(1);
    }

    /// Resets the escalation after observed progress.
    pub fn reset(&mut self) {
        self.iteration = 0;
    }

    /// Returns true once the escalation has left the spin phase.
    ///
    /// Callers that own other work (e.g. a worker tick loop) use this to
    /// decide when polling has become pointless for the moment.
    #[must_use]
    pub const fn is_yielding(&self) -> bool {
        self.iteration > SPIN_LIMIT
    }
}
