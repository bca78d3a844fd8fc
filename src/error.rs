//! Error types for the tickloop scheduler.
//!
//! Error handling follows a small, closed taxonomy:
//!
//! - **Contract violations**: misuse of the API (adding to a running
//!   collection, resuming a stopping runner, enqueueing onto a killed
//!   runner). Surfaced synchronously to the caller, never retried.
//! - **User task faults**: a panic escaping a step-sequence. Isolated to the
//!   faulting task and observed through the task's fault hook or terminal
//!   state; the runner itself keeps going.
//! - **Wait timeouts**: a bounded synchronous wait on a continuation did not
//!   observe completion in time. The waited-on task stays live.
//!
//! Stale continuation handles are deliberately *not* errors: an epoch
//! mismatch is a defined "not running" outcome.

use core::fmt;

/// The kind of error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    // === Contract violations ===
    /// A sub-sequence was added to a collection that has already started.
    CollectionRunning,
    /// The runner has been killed; the requested operation is no longer legal.
    RunnerKilled,
    /// The runner is draining; resume is not legal until the drain finishes.
    RunnerStopping,

    // === Waits ===
    /// A bounded synchronous wait elapsed before the target completed.
    WaitTimeout,

    // === Task faults ===
    /// A panic escaped a user step-sequence.
    TaskFault,
}

impl ErrorKind {
    /// Returns true for API-misuse errors that indicate a programming bug.
    #[must_use]
    pub const fn is_contract_violation(self) -> bool {
        matches!(
            self,
            Self::CollectionRunning | Self::RunnerKilled | Self::RunnerStopping
        )
    }

    const fn as_str(self) -> &'static str {
        match self {
            Self::CollectionRunning => "collection already running",
            Self::RunnerKilled => "runner killed",
            Self::RunnerStopping => "runner stopping",
            Self::WaitTimeout => "wait timed out",
            Self::TaskFault => "task fault",
        }
    }
}

/// An error produced by the scheduler.
#[derive(Debug, Clone)]
pub struct Error {
    kind: ErrorKind,
    detail: Option<String>,
}

impl Error {
    /// Creates an error with no detail message.
    #[must_use]
    pub const fn new(kind: ErrorKind) -> Self {
        Self { kind, detail: None }
    }

    /// Creates an error carrying a detail message.
    #[must_use]
    pub fn with_detail(kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: Some(detail.into()),
        }
    }

    /// Returns the error kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the detail message, if any.
    #[must_use]
    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.detail {
            Some(detail) => write!(f, "{}: {detail}", self.kind.as_str()),
            None => f.write_str(self.kind.as_str()),
        }
    }
}

impl std::error::Error for Error {}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
