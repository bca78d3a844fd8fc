//! Serial task collection.

use crate::collection::stack::{SeqStack, StackPoll};
use crate::error::{Error, ErrorKind, Result};
use crate::step::{BreakMode, Sequence, StepResult};
use core::fmt;
use std::collections::VecDeque;

/// Runs its sub-sequences one after another, depth-first.
///
/// A stack of stacks: each added sub-sequence becomes its own stack,
/// processed in registration order; a nested sequence yielded by the running
/// task is pushed onto that task's stack and executed immediately before
/// control returns. The collection is itself a [`Sequence`], so it can be
/// registered with a runner or nested inside another collection — the
/// runner never knows the difference.
///
/// Completion = all stacks empty. A `BreakAndStop` from any frame discards
/// the remaining work and propagates the abort upward.
#[derive(Default)]
pub struct SerialCollection {
    stacks: VecDeque<SeqStack>,
    started: bool,
}

impl SerialCollection {
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
        self.stacks.push_back(SeqStack::new(Box::new(sequence)));
        Ok(())
    }

    /// Number of sub-sequences not yet finished.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.stacks.len()
    }
}

impl Sequence for SerialCollection {
    fn advance(&mut self) -> Option<StepResult> {
        self.started = true;
        loop {
            let front = self.stacks.front_mut()?;
            match front.poll() {
                StackPoll::Pending => return Some(StepResult::Yield),
                // A finished task hands the step to the next one at once.
                StackPoll::Done => {
                    self.stacks.pop_front();
                }
                StackPoll::Abort => {
                    self.stacks.clear();
                    return Some(StepResult::Break(BreakMode::BreakAndStop));
                }
            }
        }
    }
}

impl fmt::Debug for SerialCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerialCollection")
            .field("remaining", &self.stacks.len())
            .field("started", &self.started)
            .finish()
    }
}
