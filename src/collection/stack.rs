//! Depth-first execution stack shared by the serial and parallel
//! collections.
//!
//! Collections run their sub-sequences without registering runner tasks: a
//! nested sequence yielded by the top frame is pushed onto the same stack
//! and advanced immediately, so a task "calls" a sub-sequence inline. The
//! detached spawn flag needs a runner and has no meaning here; inside a
//! collection every nested sequence runs on the stack.

use crate::step::{BoxSequence, BreakMode, NestedMode, NestedStep, StepResult, ValueCell};
use crate::task::ContinuationHandle;
use core::fmt;
use smallvec::SmallVec;

struct Frame {
    sequence: BoxSequence,
    /// Where this frame's terminal value lands, for spawn-into frames.
    into: Option<ValueCell>,
}

/// What one stack poll observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StackPoll {
    /// A frame yielded or a continuation wait is outstanding.
    Pending,
    /// Every frame finished.
    Done,
    /// A frame terminated with `BreakAndStop`; the stack has been cleared.
    Abort,
}

/// One sub-sequence plus the frames it has called into.
pub(crate) struct SeqStack {
    frames: SmallVec<[Frame; 4]>,
    wait: Option<ContinuationHandle>,
}

impl SeqStack {
    pub(crate) fn new(sequence: BoxSequence) -> Self {
        let mut frames = SmallVec::new();
        frames.push(Frame {
            sequence,
            into: None,
        });
        Self { frames, wait: None }
    }

    /// Advances the stack by one scheduling step.
    ///
    /// Pops finished frames and pushes nested ones depth-first until a frame
    /// yields, a continuation wait starts, or the stack runs dry.
    pub(crate) fn poll(&mut self) -> StackPoll {
        if let Some(handle) = &self.wait {
            if handle.is_running() {
                return StackPoll::Pending;
            }
            self.wait = None;
        }

        loop {
            let Some(top) = self.frames.last_mut() else {
                return StackPoll::Done;
            };
            match top.sequence.advance() {
                None => {
                    self.frames.pop();
                }
                Some(StepResult::Yield | StepResult::Break(BreakMode::None)) => {
                    return StackPoll::Pending;
                }
                Some(StepResult::Break(BreakMode::Break)) => {
                    self.frames.pop();
                }
                Some(StepResult::Break(BreakMode::BreakAndStop)) => {
                    self.frames.clear();
                    return StackPoll::Abort;
                }
                Some(StepResult::Value(value)) => {
                    let frame = self.frames.pop().expect("top frame present");
                    if let Some(cell) = frame.into {
                        cell.put(value);
                    }
                }
                Some(StepResult::Continuation(handle)) => {
                    self.wait = Some(handle);
                    return StackPoll::Pending;
                }
                Some(StepResult::Nested(nested)) => {
                    let NestedStep { sequence, mode } = nested;
                    let into = match mode {
                        NestedMode::Spawn { into, .. } => into,
                        NestedMode::Inline => None,
                    };
                    self.frames.push(Frame { sequence, into });
                    // Loop: the pushed frame is advanced immediately.
                }
            }
        }
    }
}

impl fmt::Debug for SeqStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SeqStack")
            .field("depth", &self.frames.len())
            .field("waiting", &self.wait.is_some())
            .finish()
    }
}
