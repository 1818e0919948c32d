//! # Framework Errors
//!
//! The outcome taxonomy shared by every coordination primitive. Only a fatal
//! setup failure (see [`crate::lifecycle::SystemError`]) ever aborts a run; the
//! variants here are expected conditions that callers treat as control flow.

/// Conditions returned by gates, guards, channels and the actor table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FrameworkError {
    /// The resource was torn down while the operation was in progress.
    /// Expected during shutdown; unwind quietly.
    #[error("{0} is gone")]
    Gone(&'static str),
    /// A blocking wait was cancelled. Re-check termination flags, do not retry.
    #[error("wait interrupted")]
    Interrupted,
    /// A non-blocking attempt found no capacity or no message.
    #[error("would block")]
    WouldBlock,
    /// A bounded wait ran out of time.
    #[error("timed out")]
    TimedOut,
    /// The actor table reached its hard capacity.
    #[error("table full ({0} entries)")]
    Full(usize),
}

impl FrameworkError {
    /// True for the conditions that mean "stop, the system is going away".
    pub fn is_terminal(&self) -> bool {
        matches!(self, FrameworkError::Gone(_) | FrameworkError::Interrupted)
    }
}
