//! Parallel task collection (cooperative, single-threaded).

use crate::collection::stack::{SeqStack, StackPoll};
use crate::error::{Error, ErrorKind, Result};
use crate::step::{BreakMode, Sequence, StepResult};
use core::fmt;

/// Drives all its sub-sequences within each step.
///
/// "Parallel" here is cooperative interleaving, not threads: one step of the
/// collection steps every unfinished child once, under the same tick budget
/// the owning runner gives the collection itself. A live counter tracks
/// unfinished children; the collection reports running while it is nonzero.
///
/// A `BreakAndStop` from any child aborts the entire collection: remaining
/// children are discarded (their drop is the final chance to unwind) and the
/// abort propagates upward.
#[derive(Default)]
pub struct ParallelCollection {
    children: Vec<Option<SeqStack>>,
    live: usize,
    started: bool,
}

impl ParallelCollection {
    /// Creates an empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a sub-sequence.
    ///
    /// An error once the collection has started stepping.
    pub fn add(&mut self, sequence: impl Sequence + 'static) -> Result<()> {
        if self.started {
            return Err(Error::new(ErrorKind::CollectionRunning));
        }
        self.children.push(Some(SeqStack::new(Box::new(sequence))));
        self.live += 1;
        Ok(())
    }

    /// Number of sub-sequences not yet finished.
    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.live
    }
}

impl Sequence for ParallelCollection {
    fn advance(&mut self) -> Option<StepResult> {
        self.started = true;
        if self.live == 0 {
            return None;
        }

        let mut abort = false;
        for slot in &mut self.children {
            let Some(stack) = slot else { continue };
            match stack.poll() {
                StackPoll::Pending => {}
                StackPoll::Done => {
                    *slot = None;
                    self.live -= 1;
                }
                StackPoll::Abort => {
                    abort = true;
                    break;
                }
            }
        }

        if abort {
            self.children.clear();
            self.live = 0;
            return Some(StepResult::Break(BreakMode::BreakAndStop));
        }
        if self.live == 0 {
            None
        } else {
            Some(StepResult::Yield)
        }
    }
}

impl fmt::Debug for ParallelCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParallelCollection")
            .field("children", &self.children.len())
            .field("live", &self.live)
            .field("started", &self.started)
            .finish()
    }
}
