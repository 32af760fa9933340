//! Cooperative single-threaded scheduler for [`crate::MemoryStore`]
//!
//! Two queues, one thread:
//! - macrotasks: FIFO [`Task`]s, one per turn (request execution, commit,
//!   finish notification, timers, posted callbacks)
//! - microtasks: futures spawned on a [`LocalPool`], drained after every
//!   macrotask and before the turn ends

use futures::channel::oneshot;
use futures::executor::{LocalPool, LocalSpawner};
use linger_core::{CursorStep, Operation, Result};
use std::cell::RefCell;
use std::collections::VecDeque;

use crate::backend::TxnId;
use crate::request::RequestHandle;

/// Work performed when a request executes
pub(crate) enum Job {
    Operation(Operation),
    Step(CursorStep),
    Probe,
}

/// A unit of synchronous work
pub(crate) enum Task {
    Execute {
        request: RequestHandle,
        job: Job,
    },
    Commit(TxnId),
    Finish {
        txn: TxnId,
        outcome: Result<()>,
    },
    Timer {
        remaining: usize,
        wake: oneshot::Sender<()>,
    },
    Callback(Box<dyn FnOnce()>),
}

impl Task {
    pub(crate) fn label(&self) -> &'static str {
        match self {
            Task::Execute { .. } => "execute",
            Task::Commit(_) => "commit",
            Task::Finish { .. } => "finish",
            Task::Timer { .. } => "timer",
            Task::Callback(_) => "callback",
        }
    }
}

pub(crate) struct Scheduler {
    tasks: RefCell<VecDeque<Task>>,
    pool: RefCell<LocalPool>,
    spawner: LocalSpawner,
}

impl Scheduler {
    pub(crate) fn new() -> Self {
        let pool = LocalPool::new();
        let spawner = pool.spawner();
        Self {
            tasks: RefCell::new(VecDeque::new()),
            pool: RefCell::new(pool),
            spawner,
        }
    }

    pub(crate) fn push(&self, task: Task) {
        self.tasks.borrow_mut().push_back(task);
    }

    pub(crate) fn pop(&self) -> Option<Task> {
        self.tasks.borrow_mut().pop_front()
    }

    pub(crate) fn pending(&self) -> usize {
        self.tasks.borrow().len()
    }

    pub(crate) fn spawner(&self) -> &LocalSpawner {
        &self.spawner
    }

    /// Run spawned futures until none can make progress
    ///
    /// Calling this from inside a microtask is a no-op: the pool is already
    /// being driven by the caller's caller.
    pub(crate) fn run_microtasks(&self) {
        match self.pool.try_borrow_mut() {
            Ok(mut pool) => pool.run_until_stalled(),
            Err(_) => tracing::trace!("microtask drain requested from inside a microtask"),
        }
    }
}
