//! Background-thread expiry scheduler.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};

use super::{ExpiryCallback, ExpiryScheduler, TaskId};

struct Pending {
    deadline: Instant,
    callback: ExpiryCallback,
}

#[derive(Default)]
struct State {
    pending: HashMap<TaskId, Pending>,
    /// Deadline queue. Entries whose deadline no longer matches `pending` are stale.
    queue: BinaryHeap<Reverse<(Instant, TaskId)>>,
    shutdown: bool,
}

struct Shared {
    state: Mutex<State>,
    wakeup: Condvar,
    next_id: AtomicU64,
}

/// Runs expiry callbacks on a dedicated worker thread.
///
/// Callbacks run without the scheduler lock held, so they may call back into
/// the scheduler. Dropping the manager stops the worker; tasks still pending
/// at that point never run.
pub struct ExpiryTaskManager {
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
    worker_id: ThreadId,
}

impl ExpiryTaskManager {
    /// Starts the worker thread.
    pub fn new() -> std::io::Result<Self> {
        let shared = Arc::new(Shared {
            state: Mutex::new(State::default()),
            wakeup: Condvar::new(),
            next_id: AtomicU64::new(1),
        });

        let worker_shared = Arc::clone(&shared);
        let worker = thread::Builder::new()
            .name("pdx-expiry".to_string())
            .spawn(move || run_worker(&worker_shared))?;

        Ok(Self {
            shared,
            worker_id: worker.thread().id(),
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Number of tasks waiting to fire.
    pub fn pending_count(&self) -> usize {
        self.shared.state.lock().pending.len()
    }

    /// Stops the worker and drops every pending task. Idempotent.
    ///
    /// Called from inside a callback, the worker is detached instead of
    /// joined and exits once the callback returns.
    pub fn shutdown(&self) {
        {
            let mut state = self.shared.state.lock();
            state.shutdown = true;
            state.pending.clear();
            state.queue.clear();
        }
        self.shared.wakeup.notify_all();

        let Some(handle) = self.worker.lock().take() else {
            return;
        };
        if thread::current().id() == self.worker_id {
            tracing::debug!("Expiry scheduler stopped from its own worker, detaching");
            return;
        }
        if handle.join().is_err() {
            tracing::error!("Expiry worker thread panicked");
        }
    }
}

impl std::fmt::Debug for ExpiryTaskManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpiryTaskManager")
            .field("pending", &self.pending_count())
            .finish_non_exhaustive()
    }
}

impl Drop for ExpiryTaskManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl ExpiryScheduler for ExpiryTaskManager {
    fn schedule_once(&self, delay: Duration, callback: ExpiryCallback) -> TaskId {
        let task = TaskId::new(self.shared.next_id.fetch_add(1, Ordering::Relaxed));
        let deadline = Instant::now() + delay;
        {
            let mut state = self.shared.state.lock();
            if state.shutdown {
                tracing::warn!("Expiry scheduler stopped, dropping {}", task);
                return task;
            }
            state.pending.insert(task, Pending { deadline, callback });
            state.queue.push(Reverse((deadline, task)));
        }
        self.shared.wakeup.notify_one();
        task
    }

    fn cancel(&self, task: TaskId) -> bool {
        // The queue entry goes stale and is skipped by the worker.
        self.shared.state.lock().pending.remove(&task).is_some()
    }

    fn reschedule(&self, task: TaskId, delay: Duration) -> bool {
        let deadline = Instant::now() + delay;
        {
            let mut state = self.shared.state.lock();
            match state.pending.get_mut(&task) {
                Some(pending) => pending.deadline = deadline,
                None => return false,
            }
            state.queue.push(Reverse((deadline, task)));
        }
        self.shared.wakeup.notify_one();
        true
    }
}

fn run_worker(shared: &Shared) {
    let mut state = shared.state.lock();
    loop {
        if state.shutdown {
            break;
        }

        let next = state.queue.peek().map(|Reverse(entry)| *entry);
        let Some((deadline, task)) = next else {
            shared.wakeup.wait(&mut state);
            continue;
        };

        if deadline > Instant::now() {
            shared.wakeup.wait_until(&mut state, deadline);
            continue;
        }

        state.queue.pop();
        let is_current = state
            .pending
            .get(&task)
            .is_some_and(|pending| pending.deadline == deadline);
        if !is_current {
            continue;
        }
        let Some(pending) = state.pending.remove(&task) else {
            continue;
        };

        MutexGuard::unlocked(&mut state, || fire(task, pending.callback));
    }
}

fn fire(task: TaskId, callback: ExpiryCallback) {
    tracing::trace!("Firing {}", task);
    let result = std::panic::catch_unwind(AssertUnwindSafe(|| callback(task)));
    if let Err(panic) = result {
        let panic_msg = if let Some(msg) = panic.downcast_ref::<&str>() {
            msg.to_string()
        } else if let Some(msg) = panic.downcast_ref::<String>() {
            msg.clone()
        } else {
            "unknown panic".to_string()
        };
        tracing::error!("Expiry callback {} panicked: {}", task, panic_msg);
    }
}
