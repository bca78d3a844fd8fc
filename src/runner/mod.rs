//! The runner: live-task list, ingress queue, and the tick loop.
//!
//! A runner drives a single-threaded cooperative loop. The host calls
//! [`Runner::tick`] once per frame or fixed interval; each tick drains newly
//! registered tasks into the live list as one atomic batch, then steps live
//! tasks under the installed [`FlowModifier`] policy, swap-removing
//! completed ones. Tasks never block the runner's thread — suspension is a
//! task returning "running" and being revisited next tick.
//!
//! Any thread may register tasks or drive the lifecycle through a cloned
//! [`RunnerHandle`]; stepping stays single-writer on the thread that owns
//! the `Runner`.

pub mod flow;

pub use flow::{FlowModifier, SerialFlow, StandardFlow, TimeSlicedFlow};

use crate::config::RunnerConfig;
use crate::error::{Error, ErrorKind, Result};
use crate::step::{BoxSequence, Sequence, ValueCell};
use crate::task::continuation::ContinuationPool;
use crate::task::driver::{FaultHook, Spawn, StepContext, StepOutcome, TaskDriver};
use crate::task::TaskHandle;
use crate::tracing_compat::{debug, trace};
use crate::util::slot_map::GenerationalSlotMap;
use crate::util::snapshot::{Snapshot, VersionedSnapshotLock};
use crossbeam_queue::SegQueue;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

/// Runner lifecycle states.
///
/// `Accepting → Stopping → (Accepting | Killed)`. The paused flag is
/// orthogonal and does not appear here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Lifecycle {
    /// Accepting new tasks and running live ones.
    Accepting = 0,
    /// Draining: no new tasks become visible; live ones run to completion.
    /// Flips back to [`Lifecycle::Accepting`] once the live list empties.
    Stopping = 1,
    /// Draining, then killed for good once the live list empties.
    StoppingThenKill = 2,
    /// Terminal. The ingress queue is discarded and `tick` returns false.
    Killed = 3,
}

impl Lifecycle {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Accepting,
            1 => Self::Stopping,
            2 => Self::StoppingThenKill,
            _ => Self::Killed,
        }
    }

    const fn is_draining(self) -> bool {
        matches!(self, Self::Stopping | Self::StoppingThenKill)
    }
}

/// A point-in-time view of a runner, published through the versioned
/// snapshot lock so any thread can read it without a mutex.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunnerMetrics {
    /// Ticks executed so far.
    pub ticks: u64,
    /// Tasks in the live list.
    pub live: u64,
    /// Tasks waiting in the ingress queue.
    pub pending: u64,
    /// Lifecycle state at publish time.
    pub lifecycle: Lifecycle,
}

impl RunnerMetrics {
    /// True when the runner had nothing queued or live at publish time.
    #[must_use]
    pub const fn is_idle(&self) -> bool {
        self.live == 0 && self.pending == 0
    }
}

impl Snapshot for RunnerMetrics {
    const WIDTH: usize = 4;

    fn store(&self, words: &[AtomicU64]) {
        words[0].store(self.ticks, Ordering::Relaxed);
        words[1].store(self.live, Ordering::Relaxed);
        words[2].store(self.pending, Ordering::Relaxed);
        words[3].store(u64::from(self.lifecycle as u8), Ordering::Relaxed);
    }

    fn load(words: &[AtomicU64]) -> Self {
        Self {
            ticks: words[0].load(Ordering::Relaxed),
            live: words[1].load(Ordering::Relaxed),
            pending: words[2].load(Ordering::Relaxed),
            lifecycle: Lifecycle::from_u8(words[3].load(Ordering::Relaxed) as u8),
        }
    }
}

/// The cross-thread half of a runner.
#[derive(Debug)]
struct Shared {
    ingress: SegQueue<TaskDriver>,
    lifecycle: AtomicU8,
    paused: AtomicBool,
    pool: ContinuationPool,
    metrics: VersionedSnapshotLock<RunnerMetrics>,
}

impl Shared {
    fn lifecycle(&self) -> Lifecycle {
        Lifecycle::from_u8(self.lifecycle.load(Ordering::Acquire))
    }

    fn set_lifecycle(&self, lifecycle: Lifecycle) {
        self.lifecycle.store(lifecycle as u8, Ordering::Release);
    }

    /// Requests a drain. `then_kill` upgrades an in-progress plain stop;
    /// a plain stop never downgrades a pending kill. Killed is terminal.
    fn request_stop(&self, then_kill: bool) {
        let _ = self
            .lifecycle
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                match Lifecycle::from_u8(current) {
                    Lifecycle::Killed => None,
                    Lifecycle::StoppingThenKill if !then_kill => None,
                    _ if then_kill => Some(Lifecycle::StoppingThenKill as u8),
                    _ => Some(Lifecycle::Stopping as u8),
                }
            });
    }
}

impl Spawn for Shared {
    fn spawn(&self, driver: TaskDriver) {
        self.ingress.push(driver);
    }
}

/// A clonable, thread-safe handle to a runner: task registration and
/// lifecycle control.
#[derive(Debug, Clone)]
pub struct RunnerHandle {
    shared: Arc<Shared>,
}

impl RunnerHandle {
    /// Registers a step-sequence as a new task.
    ///
    /// The task becomes visible to the tick loop at the next batch drain.
    /// Legal while paused or stopping (the task waits for the runner to
    /// accept again); an error once the runner is killed.
    pub fn enqueue(&self, sequence: impl Sequence + 'static) -> Result<TaskHandle> {
        self.enqueue_boxed(Box::new(sequence), None)
    }

    /// Like [`RunnerHandle::enqueue`], with a per-task fault hook that
    /// observes a panic escaping the sequence.
    pub fn enqueue_supervised(
        &self,
        sequence: impl Sequence + 'static,
        hook: FaultHook,
    ) -> Result<TaskHandle> {
        self.enqueue_boxed(Box::new(sequence), Some(hook))
    }

    fn enqueue_boxed(&self, sequence: BoxSequence, hook: Option<FaultHook>) -> Result<TaskHandle> {
        if self.shared.lifecycle() == Lifecycle::Killed {
            return Err(Error::new(ErrorKind::RunnerKilled));
        }
        let state = self.shared.pool.acquire();
        let continuation = state.handle();
        let value = ValueCell::new();
        let mut driver = TaskDriver::new(sequence)
            .with_completion(state, true)
            .with_value_out(value.clone());
        if let Some(hook) = hook {
            driver = driver.with_fault_hook(hook);
        }
        let stop = driver.stop_flag();
        self.shared.ingress.push(driver);
        trace!("task registered");
        Ok(TaskHandle::new(stop, continuation, value))
    }

    /// Pauses the runner: ticks become no-ops that neither advance tasks
    /// nor make queued tasks visible. Registration stays legal.
    ///
    /// Pausing a killed runner is an error. Pausing while stopping is
    /// accepted but does not affect the drain.
    pub fn pause(&self) -> Result<()> {
        if self.shared.lifecycle() == Lifecycle::Killed {
            return Err(Error::new(ErrorKind::RunnerKilled));
        }
        self.shared.paused.store(true, Ordering::Release);
        Ok(())
    }

    /// Clears the paused flag.
    ///
    /// An error while the runner is stopping or killed.
    pub fn resume(&self) -> Result<()> {
        match self.shared.lifecycle() {
            Lifecycle::Killed => Err(Error::new(ErrorKind::RunnerKilled)),
            lifecycle if lifecycle.is_draining() => Err(Error::new(ErrorKind::RunnerStopping)),
            _ => {
                self.shared.paused.store(false, Ordering::Release);
                Ok(())
            }
        }
    }

    /// Starts draining: no queued task becomes visible, live tasks run to
    /// completion, and the runner flips back to accepting once drained.
    pub fn stop(&self) {
        self.shared.request_stop(false);
    }

    /// Starts draining, then kills the runner for good once the live list
    /// empties.
    pub fn stop_and_kill(&self) {
        self.shared.request_stop(true);
    }

    /// Kills the runner immediately: live tasks and the ingress queue are
    /// discarded at the next tick, which returns false.
    pub fn kill(&self) {
        self.shared.set_lifecycle(Lifecycle::Killed);
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn lifecycle(&self) -> Lifecycle {
        self.shared.lifecycle()
    }

    /// True while the paused flag is set.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.shared.paused.load(Ordering::Acquire)
    }

    /// Reads the most recently published metrics snapshot.
    #[must_use]
    pub fn metrics(&self) -> RunnerMetrics {
        self.shared.metrics.read()
    }

    /// Number of tasks waiting in the ingress queue right now.
    ///
    /// Unlike [`RunnerHandle::metrics`], this is a live read, not a
    /// published snapshot.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.shared.ingress.len()
    }
}

/// Owns the live-task list and executes ticks. Single-threaded; pair with
/// [`RunnerHandle`] for cross-thread control.
pub struct Runner {
    shared: Arc<Shared>,
    live: GenerationalSlotMap<TaskDriver>,
    flow: Box<dyn FlowModifier>,
    ticks: u64,
}

impl Runner {
    /// Creates a runner with the standard once-per-tick flow policy.
    #[must_use]
    pub fn new(config: RunnerConfig) -> Self {
        let flow = Box::new(StandardFlow);
        Self::with_flow_boxed(config, flow)
    }

    /// Creates a runner whose ticks revisit tasks until the configured
    /// time-slice budget elapses.
    #[must_use]
    pub fn time_sliced(config: RunnerConfig) -> Self {
        let flow = Box::new(TimeSlicedFlow::new(config.time_slice));
        Self::with_flow_boxed(config, flow)
    }

    /// Creates a runner with a custom flow policy.
    #[must_use]
    pub fn with_flow(config: RunnerConfig, flow: impl FlowModifier + 'static) -> Self {
        Self::with_flow_boxed(config, Box::new(flow))
    }

    fn with_flow_boxed(config: RunnerConfig, flow: Box<dyn FlowModifier>) -> Self {
        let initial = RunnerMetrics {
            ticks: 0,
            live: 0,
            pending: 0,
            lifecycle: Lifecycle::Accepting,
        };
        Self {
            shared: Arc::new(Shared {
                ingress: SegQueue::new(),
                lifecycle: AtomicU8::new(Lifecycle::Accepting as u8),
                paused: AtomicBool::new(false),
                pool: ContinuationPool::new(config.pool),
                metrics: VersionedSnapshotLock::new(initial),
            }),
            live: GenerationalSlotMap::with_capacity(config.live_capacity),
            flow,
            ticks: 0,
        }
    }

    /// Returns a clonable cross-thread handle.
    #[must_use]
    pub fn handle(&self) -> RunnerHandle {
        RunnerHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Convenience for [`RunnerHandle::enqueue`].
    pub fn enqueue(&self, sequence: impl Sequence + 'static) -> Result<TaskHandle> {
        self.handle().enqueue(sequence)
    }

    /// Number of tasks currently in the live list.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// True when nothing is live or queued.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.live.is_empty() && self.shared.ingress.is_empty()
    }

    /// Executes one tick.
    ///
    /// Returns false once the runner is killed, signalling the host loop it
    /// may stop calling.
    pub fn tick(&mut self) -> bool {
        let mut lifecycle = self.shared.lifecycle();
        if lifecycle == Lifecycle::Killed {
            self.teardown();
            return false;
        }

        // A finished drain either kills for good or reopens for business.
        if lifecycle.is_draining() && self.live.is_empty() {
            if lifecycle == Lifecycle::StoppingThenKill {
                self.shared.set_lifecycle(Lifecycle::Killed);
                self.teardown();
                return false;
            }
            self.shared.set_lifecycle(Lifecycle::Accepting);
            lifecycle = Lifecycle::Accepting;
            debug!("drain complete; accepting again");
        }

        let paused = self.shared.paused.load(Ordering::Acquire);

        // Registered tasks become visible atomically, as one batch.
        if lifecycle == Lifecycle::Accepting && !paused {
            self.drain_ingress();
        }

        if (paused && !lifecycle.is_draining()) || self.live.is_empty() {
            self.finish_tick();
            return true;
        }

        self.flow.reset();
        let mut index = 0;
        while index < self.live.len() {
            if !self.flow.can_process(index) {
                break;
            }
            let ctx = StepContext {
                pool: &self.shared.pool,
                spawner: &*self.shared,
            };
            let outcome = self
                .live
                .get_at_mut(index)
                .expect("flow index in bounds")
                .step(&ctx);
            let completed = outcome != StepOutcome::Running;
            if completed {
                let mut driver = self.live.remove_at(index);
                driver.dispose(&self.shared.pool);
                trace!(outcome = ?outcome, "task left live list");
            }
            index = self.flow.next_index(index, self.live.len(), completed);
        }

        self.finish_tick();
        true
    }

    fn drain_ingress(&mut self) {
        let mut drained = 0usize;
        while let Some(driver) = self.shared.ingress.pop() {
            self.live.insert(driver);
            drained += 1;
        }
        if drained > 0 {
            debug!(count = drained, live = self.live.len(), "ingress batch drained");
        }
    }

    /// Discards everything. Disposal resolves each task's continuation so
    /// no waiter spins on a task that will never run.
    fn teardown(&mut self) {
        for mut driver in self.live.drain() {
            driver.dispose(&self.shared.pool);
        }
        while let Some(mut driver) = self.shared.ingress.pop() {
            driver.dispose(&self.shared.pool);
        }
        self.publish_metrics();
    }

    fn finish_tick(&mut self) {
        self.ticks += 1;
        self.publish_metrics();
    }

    fn publish_metrics(&self) {
        self.shared.metrics.publish(RunnerMetrics {
            ticks: self.ticks,
            live: self.live.len() as u64,
            pending: self.shared.ingress.len() as u64,
            lifecycle: self.shared.lifecycle(),
        });
    }
}

impl Default for Runner {
    fn default() -> Self {
        Self::new(RunnerConfig::default())
    }
}

impl core::fmt::Debug for Runner {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Runner")
            .field("live", &self.live.len())
            .field("ticks", &self.ticks)
            .field("lifecycle", &self.shared.lifecycle())
            .finish_non_exhaustive()
    }
}
