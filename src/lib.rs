//! Tickloop: a tick-driven cooperative multitasking scheduler.
//!
//! # Overview
//!
//! Tickloop advances many independently-suspended computations — tasks
//! expressed as resumable step-sequences — on a controlled cadence, without
//! per-step heap allocation. The host loop calls [`Runner::tick`] once per
//! frame or fixed interval; everything else is cooperative: a task suspends
//! by yielding and is revisited next tick. There is no stack switching,
//! only explicit step re-entry.
//!
//! # Core Pieces
//!
//! - **Step results** ([`step`]): the tagged value a task yields each
//!   resumption — continue, break, terminal value, continuation wait, or a
//!   nested sequence.
//! - **Drivers** ([`task`]): the per-task state machine interpreting those
//!   tags, spawning children, and isolating faults.
//! - **Continuations** ([`task::continuation`]): pooled, epoch-invalidated
//!   "still running?" handles for cross-task waiting. Stale handles degrade
//!   to "not running"; they never misread recycled state.
//! - **The runner** ([`runner`]): live-task list, thread-safe ingress queue
//!   with atomic batch visibility, pluggable per-tick iteration policy, and
//!   the pause/stop/kill lifecycle.
//! - **Collections** ([`collection`]): serial and parallel composition of
//!   sequences, including fan-out across dedicated worker threads.
//! - **Utilities** ([`util`]): the generation-stamped slot map, the
//!   versioned snapshot lock, and the shared busy-wait backoff.
//!
//! # Example
//!
//! ```
//! use tickloop::runner::Runner;
//! use tickloop::step::{from_fn, StepResult};
//!
//! let mut runner = Runner::default();
//! let mut frames = 0i64;
//! let task = runner
//!     .enqueue(from_fn(move || {
//!         frames += 1;
//!         if frames < 3 {
//!             Some(StepResult::Yield)
//!         } else {
//!             Some(StepResult::value(frames))
//!         }
//!     }))
//!     .unwrap();
//!
//! while task.is_running() {
//!     runner.tick();
//! }
//! assert_eq!(task.take_value().unwrap().as_int(), Some(3));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]

pub mod collection;
pub mod config;
pub mod error;
pub mod runner;
pub mod step;
pub mod task;
pub mod tracing_compat;
pub mod util;

pub use collection::{ParallelCollection, SerialCollection, ThreadedParallelCollection};
pub use config::{PoolConfig, RunnerConfig, WorkerPoolConfig};
pub use error::{Error, ErrorKind, Result};
pub use runner::{
    FlowModifier, Lifecycle, Runner, RunnerHandle, RunnerMetrics, SerialFlow, StandardFlow,
    TimeSlicedFlow,
};
pub use step::{BreakMode, Sequence, StepResult, StepValue, ValueCell};
pub use task::{ContinuationHandle, ContinuationPool, StepOutcome, TaskHandle};
