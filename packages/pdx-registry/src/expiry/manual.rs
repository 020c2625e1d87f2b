//! Deterministic scheduler driven by an explicit clock.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;

use super::{ExpiryCallback, ExpiryScheduler, TaskId};

#[derive(Default)]
struct State {
    now: Duration,
    next_id: u64,
    pending: HashMap<TaskId, (Duration, ExpiryCallback)>,
    fired: Vec<TaskId>,
    cancelled: usize,
}

/// Scheduler whose clock only moves when [`advance`](Self::advance) is called.
///
/// Callbacks run on the calling thread, in deadline order, and every fired
/// task is recorded.
#[derive(Default)]
pub struct ManualScheduler {
    state: Mutex<State>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves the clock forward, firing every task that falls due.
    pub fn advance(&self, by: Duration) {
        let target = self.state.lock().now + by;
        loop {
            let due = {
                let mut state = self.state.lock();
                let next = state
                    .pending
                    .iter()
                    .filter(|(_, (deadline, _))| *deadline <= target)
                    .min_by_key(|(task, (deadline, _))| (*deadline, **task))
                    .map(|(task, (deadline, _))| (*task, *deadline));

                match next {
                    Some((task, deadline)) => {
                        state.now = deadline;
                        state.fired.push(task);
                        state.pending.remove(&task).map(|(_, callback)| (task, callback))
                    }
                    None => {
                        state.now = target;
                        None
                    }
                }
            };

            match due {
                Some((task, callback)) => callback(task),
                None => break,
            }
        }
    }

    /// Time elapsed since creation on the manual clock.
    pub fn now(&self) -> Duration {
        self.state.lock().now
    }

    /// Tasks fired so far, in firing order.
    pub fn fired(&self) -> Vec<TaskId> {
        self.state.lock().fired.clone()
    }

    pub fn fired_count(&self) -> usize {
        self.state.lock().fired.len()
    }

    pub fn pending_count(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Number of successful cancellations.
    pub fn cancelled_count(&self) -> usize {
        self.state.lock().cancelled
    }
}

impl std::fmt::Debug for ManualScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("ManualScheduler")
            .field("now", &state.now)
            .field("pending", &state.pending.len())
            .field("fired", &state.fired.len())
            .finish()
    }
}

impl ExpiryScheduler for ManualScheduler {
    fn schedule_once(&self, delay: Duration, callback: ExpiryCallback) -> TaskId {
        let mut state = self.state.lock();
        state.next_id += 1;
        let task = TaskId::new(state.next_id);
        let deadline = state.now + delay;
        state.pending.insert(task, (deadline, callback));
        task
    }

    fn cancel(&self, task: TaskId) -> bool {
        let mut state = self.state.lock();
        let removed = state.pending.remove(&task).is_some();
        if removed {
            state.cancelled += 1;
        }
        removed
    }

    fn reschedule(&self, task: TaskId, delay: Duration) -> bool {
        let mut state = self.state.lock();
        let deadline = state.now + delay;
        match state.pending.get_mut(&task) {
            Some(entry) => {
                entry.0 = deadline;
                true
            }
            None => false,
        }
    }
}
