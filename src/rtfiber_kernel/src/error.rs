//! Error kinds that are values rather than fatal calls (spec §7).
//!
//! Precondition violations (full queues, arena exhaustion, LIFO
//! violations) are handled by [`rtfiber_core::fail::fail`] and never show
//! up here — this module is only for the *recoverable* half of spec §7:
//! a task's internal fault, observed uniformly by the scheduler regardless
//! of what actually went wrong inside the task.
use core::fmt;

/// How a task left the scheduler for good.
///
/// The scheduler treats every variant identically at the dispatch level
/// (the task is dropped either way); the distinction exists so a host-side
/// diagnostic (a logger, a test) can tell why.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    /// The root coroutine ran to completion normally.
    Completed,
    /// The root coroutine's chain was torn down by the task's error
    /// handler after an internal fault (spec §4.4's failure semantics).
    Failed,
    /// Popped from the running queue with an already-past deadline, and
    /// [`crate::task::TaskBase::missed_deadline`] returned `false`; the
    /// scheduler dropped it without ever calling `resume` again (spec
    /// §4.5's missed-deadline hook, §8.3's S7).
    MissedDeadline,
}

impl fmt::Display for Exit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::MissedDeadline => write!(f, "dropped (missed deadline)"),
        }
    }
}
