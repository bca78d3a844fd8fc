//! Multi-threaded parallel collection.
//!
//! Fans sub-sequences out across a fixed pool of dedicated single-thread
//! runners, each spinning its own tick loop on its own thread. The
//! partition is computed once at start (round-robin), so adding after start
//! is a contract error.

use crate::config::WorkerPoolConfig;
use crate::error::{Error, ErrorKind, Result};
use crate::runner::{Lifecycle, Runner, RunnerHandle};
use crate::step::{BoxSequence, Sequence, StepResult};
use crate::tracing_compat::{debug, trace};
use crate::util::backoff::{backoff, Backoff};
use core::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Wraps a sub-sequence so the collection's shared counter drops when the
/// task leaves its worker runner — on completion, fault, stop, or kill
/// alike.
struct CountedSequence {
    inner: BoxSequence,
    remaining: Arc<AtomicUsize>,
}

impl Sequence for CountedSequence {
    fn advance(&mut self) -> Option<StepResult> {
        self.inner.advance()
    }
}

impl Drop for CountedSequence {
    fn drop(&mut self) {
        self.remaining.fetch_sub(1, Ordering::AcqRel);
    }
}

struct Worker {
    handle: RunnerHandle,
    thread: Option<JoinHandle<()>>,
}

/// A parallel collection whose sub-sequences run on dedicated worker
/// threads.
///
/// The worker runners are created (and their threads spawned) at
/// construction. [`ThreadedParallelCollection::start`] partitions the added
/// sub-sequences round-robin across them; the collection's own step —
/// it is a [`Sequence`] like any other — reports running while any
/// sub-sequence is unfinished.
///
/// [`ThreadedParallelCollection::stop`] drains the workers and busy-waits
/// (bounded backoff, no OS-level block) until every worker confirms;
/// [`ThreadedParallelCollection::dispose`] kills the workers and joins their
/// threads — the one fully synchronous teardown path.
pub struct ThreadedParallelCollection {
    workers: Vec<Worker>,
    pending: Vec<BoxSequence>,
    remaining: Arc<AtomicUsize>,
    started: bool,
    disposed: bool,
}

impl ThreadedParallelCollection {
    /// Creates the collection and its worker pool.
    #[must_use]
    pub fn new(config: &WorkerPoolConfig) -> Self {
        let workers = (0..config.workers.max(1))
            .map(|index| {
                let mut runner = Runner::new(config.runner.clone());
                let handle = runner.handle();
                let thread = std::thread::Builder::new()
                    .name(format!("tickloop-worker-{index}"))
                    .spawn(move || worker_loop(&mut runner))
                    .expect("spawn worker thread");
                Worker {
                    handle,
                    thread: Some(thread),
                }
            })
            .collect();
        Self {
            workers,
            pending: Vec::new(),
            remaining: Arc::new(AtomicUsize::new(0)),
            started: false,
            disposed: false,
        }
    }

    /// Adds a sub-sequence.
    ///
    /// An error after [`ThreadedParallelCollection::start`]: the partition
    /// is computed once.
    pub fn add(&mut self, sequence: impl Sequence + 'static) -> Result<()> {
        if self.started {
            return Err(Error::new(ErrorKind::CollectionRunning));
        }
        self.pending.push(Box::new(sequence));
        Ok(())
    }

    /// Partitions the added sub-sequences across the workers and sets them
    /// running.
    ///
    /// An error if already started.
    pub fn start(&mut self) -> Result<()> {
        if self.started {
            return Err(Error::new(ErrorKind::CollectionRunning));
        }
        self.started = true;
        let tasks = core::mem::take(&mut self.pending);
        self.remaining.store(tasks.len(), Ordering::Release);
        debug!(tasks = tasks.len(), workers = self.workers.len(), "starting");
        for (index, inner) in tasks.into_iter().enumerate() {
            let counted = CountedSequence {
                inner,
                remaining: Arc::clone(&self.remaining),
            };
            let worker = &self.workers[index % self.workers.len()];
            worker.handle.enqueue(counted)?;
        }
        Ok(())
    }

    /// Number of sub-sequences not yet finished.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.remaining.load(Ordering::Acquire)
    }

    /// Blocks until every sub-sequence finishes, bounded by `timeout`.
    pub fn wait_timeout(&self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        let mut iteration = 0;
        while self.remaining() > 0 {
            if Instant::now() >= deadline {
                return Err(Error::new(ErrorKind::WaitTimeout));
            }
            backoff(iteration);
            iteration = iteration.saturating_add(1);
        }
        Ok(())
    }

    /// Stops every worker runner, then busy-waits until all confirm the
    /// drain.
    ///
    /// When this returns, no task belonging to the collection executes
    /// another step. Tasks are allowed to run to completion first, so a
    /// never-ending sub-sequence must be stopped through its own handle
    /// before calling this.
    pub fn stop(&self) {
        for worker in &self.workers {
            worker.handle.stop();
        }
        let mut wait = Backoff::new();
        // Every counted sub-sequence has been dropped by its worker: none of
        // them can step again.
        while self.remaining() > 0 {
            wait.wait();
        }
        // Then wait for the workers themselves to settle back to an idle
        // accepting state. The ingress check is a live read; the snapshot
        // alone can lag it by a tick.
        wait.reset();
        loop {
            let settled = self.workers.iter().all(|worker| {
                let metrics = worker.handle.metrics();
                worker.handle.pending() == 0
                    && metrics.is_idle()
                    && metrics.lifecycle == Lifecycle::Accepting
            });
            if settled {
                trace!("all workers confirmed stop");
                return;
            }
            wait.wait();
        }
    }

    /// Kills every worker runner and joins their threads.
    ///
    /// Safe to call more than once; also invoked on drop.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        for worker in &self.workers {
            worker.handle.kill();
        }
        for worker in &mut self.workers {
            if let Some(thread) = worker.thread.take() {
                let _ = thread.join();
            }
        }
        debug!("worker pool torn down");
    }
}

impl Sequence for ThreadedParallelCollection {
    fn advance(&mut self) -> Option<StepResult> {
        // First step starts the partition if the owner did not explicitly.
        if !self.started {
            let _ = self.start();
        }
        if self.remaining() > 0 {
            Some(StepResult::Yield)
        } else {
            None
        }
    }
}

impl Drop for ThreadedParallelCollection {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for ThreadedParallelCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadedParallelCollection")
            .field("workers", &self.workers.len())
            .field("remaining", &self.remaining())
            .field("started", &self.started)
            .finish()
    }
}

/// The dedicated runner's tick loop: tick until killed, backing off while
/// idle so an empty worker does not burn its core.
fn worker_loop(runner: &mut Runner) {
    let mut idle = Backoff::new();
    while runner.tick() {
        if runner.is_idle() {
            idle.wait();
        } else {
            idle.reset();
        }
    }
}
