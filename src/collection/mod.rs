//! Task collections: composing many step-sequences into one.
//!
//! Collections are themselves step-sequences, so they nest recursively and
//! the runner never treats them specially.
//!
//! - [`SerialCollection`]: one sub-sequence at a time, depth-first
//! - [`ParallelCollection`]: all sub-sequences interleaved per step
//! - [`ThreadedParallelCollection`]: sub-sequences fanned out across
//!   dedicated worker-thread runners

mod stack;

pub mod parallel;
pub mod serial;
pub mod threaded;

pub use parallel::ParallelCollection;
pub use serial::SerialCollection;
pub use threaded::ThreadedParallelCollection;
