//! Deferred per-node fetch tasks and their dispatch seam.
//!
//! The session never runs task bodies itself: it collects one batch
//! per update, hands the whole batch to a dispatcher, and joins every
//! task before the batch list is reused or the session is torn down.

use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

/// A deferred per-node fetch.
///
/// `run` is executed by the dispatcher's worker pool; `wait` blocks
/// until the work has completed. Dispatchers are expected to eventually
/// run every task they accept, so `wait` may assume `run` will happen.
pub trait AsyncTask: Send + Sync {
    /// Execute the fetch. Called at most once, from a worker thread.
    fn run(&self);

    /// Block until the fetch has completed.
    fn wait(&self);
}

/// Hands a batch of tasks to a worker pool.
///
/// One call per frame batch; ordering within the batch is unspecified.
pub trait AsyncDispatcher: Send + Sync {
    fn dispatch(&self, batch: &[Arc<dyn AsyncTask>]);
}

/// Dispatcher backed by rayon's global pool.
#[derive(Default)]
pub struct RayonDispatcher;

impl AsyncDispatcher for RayonDispatcher {
    fn dispatch(&self, batch: &[Arc<dyn AsyncTask>]) {
        for task in batch {
            let task = Arc::clone(task);
            rayon::spawn(move || task.run());
        }
    }
}

/// Completion latch for task implementors.
///
/// A task typically marks the latch at the end of `run` and blocks on
/// it in `wait`.
#[derive(Default)]
pub struct TaskLatch {
    done: Mutex<bool>,
    cond: Condvar,
}

impl TaskLatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the work complete and wake every waiter.
    pub fn complete(&self) {
        let mut done = self.done.lock();
        *done = true;
        self.cond.notify_all();
    }

    /// Block until [`complete`](Self::complete) has been called.
    pub fn wait(&self) {
        let mut done = self.done.lock();
        while !*done {
            self.cond.wait(&mut done);
        }
    }

    /// Non-blocking completion check.
    pub fn is_complete(&self) -> bool {
        *self.done.lock()
    }
}
