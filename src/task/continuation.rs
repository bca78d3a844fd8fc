//! Continuation states, handles, and their reuse pool.
//!
//! A continuation is the cross-task "still running?" signal. The state is a
//! pooled heap object carrying a monotonically-increasing epoch; a handle is
//! a cheap value (state reference + captured epoch). `is_running` is a
//! single atomic comparison: equal epochs mean the task is still live,
//! anything else means it finished or the state was recycled. A stale handle
//! therefore degrades to "not running" — it never observes another task's
//! data — at worst costing a one-tick false negative.
//!
//! The epoch may be read by the thread stepping a waiting parent while the
//! thread stepping the child resolves it, so all epoch traffic is ordered
//! atomic operations.
//!
//! Ownership is explicit: the driver that acquired a state releases it back
//! to the pool (no finalizer tricks). Resolution and recycling each bump the
//! epoch, so handles captured before either step stay permanently invalid.

use crate::config::PoolConfig;
use crate::error::{Error, ErrorKind, Result};
use crate::util::backoff::backoff;
use crossbeam_queue::SegQueue;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Shared completion state for one spawned task.
#[derive(Debug, Default)]
pub struct ContinuationState {
    epoch: AtomicU64,
    /// Set when the task terminated with an abort
    /// ([`BreakMode::BreakAndStop`](crate::step::BreakMode::BreakAndStop)).
    stop_all: AtomicBool,
}

impl ContinuationState {
    fn new() -> Self {
        Self::default()
    }

    /// Captures a handle at the state's current epoch.
    pub(crate) fn handle(self: &Arc<Self>) -> ContinuationHandle {
        ContinuationHandle {
            state: Arc::clone(self),
            epoch: self.epoch.load(Ordering::Acquire),
        }
    }

    /// Marks the owning task finished. `aborted` records a terminal
    /// `BreakAndStop` so the waiting parent can keep propagating it.
    pub(crate) fn resolve(&self, aborted: bool) {
        if aborted {
            self.stop_all.store(true, Ordering::Release);
        }
        self.epoch.fetch_add(1, Ordering::AcqRel);
    }

    /// True if the resolved task terminated with an abort.
    pub(crate) fn aborted(&self) -> bool {
        self.stop_all.load(Ordering::Acquire)
    }

    /// Resets the state for reuse. Part of the single recycle operation
    /// guarded by the pool.
    fn recycle(&self) {
        self.stop_all.store(false, Ordering::Relaxed);
        self.epoch.fetch_add(1, Ordering::AcqRel);
    }
}

/// A value-type view of a [`ContinuationState`]: "is that task still
/// running?"
///
/// Clones share the captured epoch, so every copy of a handle reports the
/// same monotonic true→false transition.
#[derive(Debug, Clone)]
pub struct ContinuationHandle {
    state: Arc<ContinuationState>,
    epoch: u64,
}

impl ContinuationHandle {
    /// Returns true while the task behind this handle is still running.
    ///
    /// Once false, never true again for this handle, even after the
    /// underlying state is recycled for a different task.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state.epoch.load(Ordering::Acquire) == self.epoch
    }

    /// Blocks the calling thread until the task finishes, bounded by
    /// `timeout`.
    ///
    /// Uses the shared backoff policy, never an OS-level blocking wait. On
    /// timeout the task itself stays live; the error only means the
    /// scheduler did not get it finished in time. Must not be called from a
    /// task running on the same runner as the awaited task — that runner
    /// cannot tick while its thread is parked here.
    pub fn wait_timeout(&self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        let mut iteration = 0;
        while self.is_running() {
            if Instant::now() >= deadline {
                return Err(Error::new(ErrorKind::WaitTimeout));
            }
            backoff(iteration);
            iteration = iteration.saturating_add(1);
        }
        Ok(())
    }

    pub(crate) fn aborted(&self) -> bool {
        self.state.aborted()
    }
}

/// A concurrent reuse pool for [`ContinuationState`]s.
///
/// Multi-producer/multi-consumer: any thread may acquire or release. The
/// pool is explicit and constructor-injected (each runner owns one), so
/// tests get isolated pools for free. Construction pre-warms `prewarm`
/// states to absorb steady-state churn without allocation; the pool grows on
/// demand past that. No teardown beyond process exit.
#[derive(Debug)]
pub struct ContinuationPool {
    free: SegQueue<Arc<ContinuationState>>,
}

impl ContinuationPool {
    /// Creates a pool pre-warmed per `config`.
    #[must_use]
    pub fn new(config: PoolConfig) -> Self {
        let free = SegQueue::new();
        for _ in 0..config.prewarm {
            free.push(Arc::new(ContinuationState::new()));
        }
        Self { free }
    }

    /// Pops a state from the pool, or allocates one if the pool is dry.
    #[must_use]
    pub fn acquire(&self) -> Arc<ContinuationState> {
        self.free
            .pop()
            .unwrap_or_else(|| Arc::new(ContinuationState::new()))
    }

    /// Recycles a state and returns it to the pool.
    ///
    /// The recycle bumps the epoch, so handle copies made before this call
    /// report "not running" forever.
    pub fn release(&self, state: Arc<ContinuationState>) {
        state.recycle();
        self.free.push(state);
    }

    /// Number of states currently idle in the pool.
    #[must_use]
    pub fn idle(&self) -> usize {
        self.free.len()
    }
}
