//! Structured logging shim.
//!
//! The scheduler logs through this module so that the `tracing` dependency
//! stays optional:
//!
//! - With the `tracing-integration` feature, the macros re-export from the
//!   `tracing` crate and emit real structured events.
//! - Without it, the macros expand to nothing and cost nothing at runtime.
//!
//! # Usage
//!
//! ```rust,ignore
//! use crate::tracing_compat::{debug, trace};
//!
//! debug!(live = live_count, "ingress batch drained");
//! trace!(index, "stepping task");
//! ```

#[cfg(feature = "tracing-integration")]
pub use tracing::{debug, error, info, trace, warn};

#[cfg(not(feature = "tracing-integration"))]
mod noop {
    //! No-op macro set compiled when tracing is disabled.

    /// No-op trace-level logging macro.
    #[macro_export]
    macro_rules! trace {
        ($($arg:tt)*) => {};
    }

    /// No-op debug-level logging macro.
    #[macro_export]
    macro_rules! debug {
        ($($arg:tt)*) => {};
    }

    /// No-op info-level logging macro.
    #[macro_export]
    macro_rules! info {
        ($($arg:tt)*) => {};
    }

    /// No-op warn-level logging macro.
    #[macro_export]
    macro_rules! warn {
        ($($arg:tt)*) => {};
    }

    /// No-op error-level logging macro.
    #[macro_export]
    macro_rules! error {
        ($($arg:tt)*) => {};
    }

    // Re-export the crate-root macros at module level so call sites can
    // `use crate::tracing_compat::debug` in both feature states.
    pub use crate::{debug, error, info, trace, warn};
}

#[cfg(not(feature = "tracing-integration"))]
pub use noop::*;

#[cfg(test)]
mod tests {
    #[test]
    fn macros_compile_in_current_feature_state() {
        let value = 7usize;
        super::trace!(value, "trace event");
        super::debug!(value, "debug event");
        super::info!("info event");
        super::warn!("warn event");
        super::error!("error event");
    }
}
