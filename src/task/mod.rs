//! Tasks: drivers, continuations, and handles.
//!
//! - [`driver`]: the per-task step state machine
//! - [`continuation`]: cross-task "still running?" signalling and pooling

pub mod continuation;
pub mod driver;

pub use continuation::{ContinuationHandle, ContinuationPool};
pub use driver::{FaultHook, StepOutcome};

use crate::step::{StepValue, ValueCell};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// A producer-side handle to a task registered with a runner.
///
/// Lets the producer stop the task, poll whether it is still running, fetch
/// its terminal value, or obtain a [`ContinuationHandle`] another task can
/// yield to wait on it.
#[derive(Debug, Clone)]
pub struct TaskHandle {
    stop: Arc<AtomicBool>,
    continuation: ContinuationHandle,
    value: ValueCell,
}

impl TaskHandle {
    pub(crate) fn new(
        stop: Arc<AtomicBool>,
        continuation: ContinuationHandle,
        value: ValueCell,
    ) -> Self {
        Self {
            stop,
            continuation,
            value,
        }
    }

    /// Requests the task stop.
    ///
    /// The flag is consulted at the top of the task's next step; the task
    /// completes without its user code being resumed again.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    /// Returns true while the task is still live on its runner.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.continuation.is_running()
    }

    /// A continuation another task can yield
    /// ([`StepResult::Continuation`](crate::step::StepResult::Continuation))
    /// to suspend until this task finishes.
    #[must_use]
    pub fn continuation(&self) -> ContinuationHandle {
        self.continuation.clone()
    }

    /// Takes the task's terminal value, if it produced one.
    #[must_use]
    pub fn take_value(&self) -> Option<StepValue> {
        self.value.take()
    }

    /// Blocks the calling thread until the task finishes, bounded by
    /// `timeout`. See
    /// [`ContinuationHandle::wait_timeout`] for the cross-thread caveat.
    pub fn wait_timeout(&self, timeout: Duration) -> crate::error::Result<()> {
        self.continuation.wait_timeout(timeout)
    }
}
