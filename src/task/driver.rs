//! The per-task driver state machine.
//!
//! A driver wraps one user step-sequence and interprets the tagged result of
//! each resumption: plain continue, single-frame yield, abort, spawn-and-wait,
//! or pass-through of an inline non-suspending sequence. Drivers are
//! single-writer — only the thread ticking the owning runner ever touches
//! one.

use crate::error::{Error, ErrorKind};
use crate::step::{BoxSequence, BreakMode, NestedMode, NestedStep, StepResult, ValueCell};
use crate::task::continuation::{ContinuationHandle, ContinuationPool, ContinuationState};
use crate::tracing_compat::{debug, trace};
use core::fmt;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// The outcome of one driver step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// The task wants to run again next tick.
    Running,
    /// The task finished (completed, broke, produced a value, or was
    /// stopped).
    Completed,
    /// A panic escaped the user sequence; the task is dead, the runner is
    /// not.
    Faulted,
}

/// Per-task error callback invoked when the wrapped sequence faults.
pub type FaultHook = Box<dyn FnMut(&Error) + Send>;

/// Where child drivers spawned mid-step are registered.
///
/// The runner's shared half implements this by pushing onto its ingress
/// queue, which keeps the batch-visibility invariant: children become
/// visible at the next tick's drain, never mid-tick.
pub(crate) trait Spawn {
    fn spawn(&self, driver: TaskDriver);
}

/// Everything a driver may touch while stepping: the owning runner's
/// continuation pool and its spawn entry point.
pub(crate) struct StepContext<'a> {
    pub(crate) pool: &'a ContinuationPool,
    pub(crate) spawner: &'a dyn Spawn,
}

/// A pending wait on a spawned or external task.
struct Wait {
    handle: ContinuationHandle,
    /// Present for spawn-and-wait: this driver owns the state and both
    /// fetches the child's terminal break mode from it and releases it.
    /// Absent for waits on externally-obtained handles, which carry no
    /// result-fetch semantics.
    owned: Option<Arc<ContinuationState>>,
}

/// This task's own completion signal.
struct Completion {
    state: Arc<ContinuationState>,
    /// Whether this driver releases the state to the pool on dispose.
    /// Children spawned by a waiting parent only resolve; the parent owns.
    owned: bool,
}

/// Drives one step-sequence to completion across ticks.
pub struct TaskDriver {
    sequence: BoxSequence,
    /// Pass-through inline sequence currently being iterated, if any.
    inline: Option<BoxSequence>,
    /// Continuation wait currently in progress, if any.
    wait: Option<Wait>,
    completion: Option<Completion>,
    /// Where a terminal `StepResult::Value` payload lands.
    value_out: Option<ValueCell>,
    stop: Arc<AtomicBool>,
    fault_hook: Option<FaultHook>,
    completed: bool,
    /// Terminal state was `BreakAndStop`; propagated to the waiting parent
    /// through the completion state on dispose.
    abort: bool,
}

impl TaskDriver {
    pub(crate) fn new(sequence: BoxSequence) -> Self {
        Self {
            sequence,
            inline: None,
            wait: None,
            completion: None,
            value_out: None,
            stop: Arc::new(AtomicBool::new(false)),
            fault_hook: None,
            completed: false,
            abort: false,
        }
    }

    pub(crate) fn with_completion(
        mut self,
        state: Arc<ContinuationState>,
        owned: bool,
    ) -> Self {
        self.completion = Some(Completion { state, owned });
        self
    }

    pub(crate) fn with_value_out(mut self, cell: ValueCell) -> Self {
        self.value_out = Some(cell);
        self
    }

    pub(crate) fn with_fault_hook(mut self, hook: FaultHook) -> Self {
        self.fault_hook = Some(hook);
        self
    }

    /// The flag a `TaskHandle` flips to stop this task.
    pub(crate) fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// Steps the task once.
    ///
    /// Result-tag precedence: a pending continuation wait or inline
    /// pass-through sequence is serviced before the wrapped sequence is
    /// resumed.
    pub(crate) fn step(&mut self, ctx: &StepContext<'_>) -> StepOutcome {
        debug_assert!(!self.completed, "stepping a completed task driver");
        if self.completed {
            return StepOutcome::Completed;
        }
        if self.stop.load(Ordering::Acquire) {
            trace!("task stopped by explicit request");
            self.completed = true;
            return StepOutcome::Completed;
        }

        if self.inline.is_some() {
            return self.step_inline();
        }

        if let Some(wait) = &self.wait {
            if wait.handle.is_running() {
                return StepOutcome::Running;
            }
            let wait = self.wait.take().expect("wait present");
            if let Some(state) = wait.owned {
                // Spawn-and-wait: fetch the child's terminal break mode
                // before the state goes back to the pool.
                let aborted = state.aborted();
                ctx.pool.release(state);
                if aborted {
                    trace!("child aborted; propagating");
                    self.abort = true;
                    self.completed = true;
                    return StepOutcome::Completed;
                }
            }
            // Wait resolved normally: resume the wrapped sequence below.
        }

        match self.advance_wrapped() {
            Err(payload) => self.fault(&*payload),
            Ok(None) => {
                self.completed = true;
                StepOutcome::Completed
            }
            Ok(Some(result)) => self.interpret(result, ctx),
        }
    }

    fn advance_wrapped(
        &mut self,
    ) -> std::result::Result<Option<StepResult>, Box<dyn Any + Send>> {
        catch_unwind(AssertUnwindSafe(|| self.sequence.advance()))
    }

    fn interpret(&mut self, result: StepResult, ctx: &StepContext<'_>) -> StepOutcome {
        match result {
            StepResult::Yield | StepResult::Break(BreakMode::None) => StepOutcome::Running,
            StepResult::Break(BreakMode::Break) => {
                self.completed = true;
                StepOutcome::Completed
            }
            StepResult::Break(BreakMode::BreakAndStop) => {
                self.abort = true;
                self.completed = true;
                StepOutcome::Completed
            }
            StepResult::Value(value) => {
                if let Some(cell) = &self.value_out {
                    cell.put(value);
                }
                self.completed = true;
                StepOutcome::Completed
            }
            StepResult::Continuation(handle) => {
                self.wait = Some(Wait {
                    handle,
                    owned: None,
                });
                StepOutcome::Running
            }
            StepResult::Nested(nested) => self.interpret_nested(nested, ctx),
        }
    }

    fn interpret_nested(&mut self, nested: NestedStep, ctx: &StepContext<'_>) -> StepOutcome {
        match nested.mode {
            NestedMode::Inline => {
                self.inline = Some(nested.sequence);
                // Depth-first: the inline sequence gets its first advance in
                // the same tick it was yielded.
                self.step_inline()
            }
            NestedMode::Spawn { detached: true, into } => {
                debug!("spawning detached child");
                let mut child = TaskDriver::new(nested.sequence);
                if let Some(cell) = into {
                    child.value_out = Some(cell);
                }
                ctx.spawner.spawn(child);
                StepOutcome::Running
            }
            NestedMode::Spawn {
                detached: false,
                into,
            } => {
                debug!("spawning awaited child");
                let state = ctx.pool.acquire();
                let handle = state.handle();
                let mut child =
                    TaskDriver::new(nested.sequence).with_completion(Arc::clone(&state), false);
                if let Some(cell) = into {
                    child.value_out = Some(cell);
                }
                ctx.spawner.spawn(child);
                self.wait = Some(Wait {
                    handle,
                    owned: Some(state),
                });
                StepOutcome::Running
            }
        }
    }

    /// Advances the pass-through inline sequence once instead of the
    /// wrapped sequence.
    fn step_inline(&mut self) -> StepOutcome {
        let inline = self.inline.as_mut().expect("inline sequence in progress");
        let advanced = catch_unwind(AssertUnwindSafe(|| inline.advance()));
        match advanced {
            Err(payload) => self.fault(&*payload),
            Ok(None) => {
                // Exhausted: the wrapped sequence resumes next tick.
                self.inline = None;
                StepOutcome::Running
            }
            Ok(Some(StepResult::Yield | StepResult::Break(BreakMode::None))) => {
                StepOutcome::Running
            }
            Ok(Some(StepResult::Break(BreakMode::Break))) => {
                self.inline = None;
                StepOutcome::Running
            }
            Ok(Some(StepResult::Break(BreakMode::BreakAndStop))) => {
                self.inline = None;
                self.abort = true;
                self.completed = true;
                StepOutcome::Completed
            }
            Ok(Some(other)) => panic!(
                "contract violation: pass-through sequence yielded {other:?}; \
                 an inline sequence may only yield Yield or Break"
            ),
        }
    }

    fn fault(&mut self, payload: &(dyn Any + Send)) -> StepOutcome {
        let error = Error::with_detail(ErrorKind::TaskFault, panic_message(payload));
        debug!(error = %error, "task faulted");
        if let Some(hook) = &mut self.fault_hook {
            hook(&error);
        }
        self.completed = true;
        StepOutcome::Faulted
    }

    /// Releases pooled resources and resolves this task's completion signal.
    ///
    /// Called exactly once by the owning runner when the task leaves the
    /// live list — on completion, fault, stop, or kill. Resolution happens
    /// here even for tasks discarded mid-flight, so no waiter spins forever.
    pub(crate) fn dispose(&mut self, pool: &ContinuationPool) {
        if let Some(wait) = self.wait.take() {
            if let Some(state) = wait.owned {
                pool.release(state);
            }
        }
        if let Some(completion) = self.completion.take() {
            completion.state.resolve(self.abort);
            if completion.owned {
                pool.release(completion.state);
            }
        }
    }
}

impl fmt::Debug for TaskDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskDriver")
            .field("completed", &self.completed)
            .field("waiting", &self.wait.is_some())
            .field("inline", &self.inline.is_some())
            .finish_non_exhaustive()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic in step-sequence".to_owned()
    }
}
