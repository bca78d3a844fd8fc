//! Configuration types for runners, pools, and worker threads.
//!
//! All configuration is explicit and constructor-injected; there is no
//! process-global state. Tests construct isolated configurations per test.

use std::time::Duration;

/// Configuration for a [`Runner`](crate::runner::Runner).
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Initial capacity of the live-task storage.
    pub live_capacity: usize,
    /// Continuation pool configuration for tasks spawned on this runner.
    pub pool: PoolConfig,
    /// Wall-clock budget used when the runner is built with the time-sliced
    /// flow modifier.
    pub time_slice: Duration,
}

impl RunnerConfig {
    /// Default live-task capacity.
    pub const DEFAULT_LIVE_CAPACITY: usize = 64;
    /// Default time-slice budget.
    pub const DEFAULT_TIME_SLICE: Duration = Duration::from_millis(4);

    /// Sets the initial live-task capacity.
    #[must_use]
    pub const fn live_capacity(mut self, capacity: usize) -> Self {
        self.live_capacity = capacity;
        self
    }

    /// Sets the continuation pool configuration.
    #[must_use]
    pub const fn pool(mut self, pool: PoolConfig) -> Self {
        self.pool = pool;
        self
    }

    /// Sets the time-slice budget.
    #[must_use]
    pub const fn time_slice(mut self, budget: Duration) -> Self {
        self.time_slice = budget;
        self
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            live_capacity: Self::DEFAULT_LIVE_CAPACITY,
            pool: PoolConfig::default(),
            time_slice: Self::DEFAULT_TIME_SLICE,
        }
    }
}

/// Configuration for a [`ContinuationPool`](crate::task::ContinuationPool).
#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    /// Number of continuation states pre-allocated at pool construction.
    ///
    /// Pre-warming absorbs steady-state churn without allocation; the pool
    /// still grows on demand if the warm set is exhausted.
    pub prewarm: usize,
}

impl PoolConfig {
    /// Default pre-warm count.
    pub const DEFAULT_PREWARM: usize = 32;

    /// Sets the pre-warm count.
    #[must_use]
    pub const fn prewarm(mut self, count: usize) -> Self {
        self.prewarm = count;
        self
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            prewarm: Self::DEFAULT_PREWARM,
        }
    }
}

/// Configuration for the worker-thread pool behind a
/// [`ThreadedParallelCollection`](crate::collection::ThreadedParallelCollection).
#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    /// Number of dedicated worker runners. Zero is clamped to one.
    pub workers: usize,
    /// Runner configuration applied to every worker runner.
    pub runner: RunnerConfig,
}

impl WorkerPoolConfig {
    /// Default worker count: `max(1, logical_cores - 2)`.
    ///
    /// Leaving two cores free keeps the pool from starving the caller's own
    /// tick thread and whatever else the host process is doing.
    #[must_use]
    pub fn default_workers() -> usize {
        std::thread::available_parallelism()
            .map(|n| n.get().saturating_sub(2))
            .unwrap_or(1)
            .max(1)
    }

    /// Sets the worker count.
    #[must_use]
    pub fn workers(mut self, count: usize) -> Self {
        self.workers = count.max(1);
        self
    }

    /// Sets the per-worker runner configuration.
    #[must_use]
    pub fn runner(mut self, runner: RunnerConfig) -> Self {
        self.runner = runner;
        self
    }
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            workers: Self::default_workers(),
            runner: RunnerConfig::default(),
        }
    }
}
