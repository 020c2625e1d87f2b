//! One-shot expiry scheduling.
//!
//! The preserved-field store consumes scheduling through the
//! [`ExpiryScheduler`] trait. Tasks are identified by a monotonically
//! increasing [`TaskId`] that is never reused, so a stale handle can be
//! compared by value without touching the task it once named.

mod manual;
mod task_manager;

use std::fmt;
use std::time::Duration;

pub use manual::ManualScheduler;
pub use task_manager::ExpiryTaskManager;

/// Opaque handle of a scheduled task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(u64);

impl TaskId {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task#{}", self.0)
    }
}

/// Callback run when a task fires. Receives the id it was scheduled under.
pub type ExpiryCallback = Box<dyn FnOnce(TaskId) + Send + 'static>;

/// Scheduling primitive for delayed one-shot callbacks.
///
/// Implementations guarantee:
/// - a callback runs at most once;
/// - `cancel` and `reschedule` never block on a running callback and never
///   run it themselves;
/// - a callback that was already handed to its executor when `cancel` was
///   called may still run, in which case `cancel` returns `false`.
pub trait ExpiryScheduler: Send + Sync {
    /// Schedules `callback` to run once after `delay`.
    fn schedule_once(&self, delay: Duration, callback: ExpiryCallback) -> TaskId;

    /// Cancels a pending task.
    ///
    /// # Returns
    /// `true` if the task was pending and will not run.
    fn cancel(&self, task: TaskId) -> bool;

    /// Moves a pending task's deadline to `delay` from now.
    ///
    /// # Returns
    /// `true` if the task was pending.
    fn reschedule(&self, task: TaskId, delay: Duration) -> bool;
}
