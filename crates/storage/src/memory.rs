//! In-memory reference backend
//!
//! `MemoryStore` keeps every resource in a `BTreeMap<Key, Value>` and runs
//! transactions on its own cooperative [`Scheduler`].
//!
//! # Turns
//!
//! ```text
//! run_task():  pop one macrotask → execute (its transaction becomes active)
//! end_turn():  drain microtasks → every transaction becomes inactive
//!              → running transactions with nothing outstanding start committing
//! ```
//!
//! Code that runs outside any task (a test body, a `main`) belongs to the
//! current turn until [`MemoryStore::end_turn`] is called; a transaction
//! opened there is active until then.
//!
//! # Atomicity
//!
//! Writes are applied in place and recorded in a per-transaction undo log.
//! Abort replays the log backwards. Concurrent transactions over the same
//! resource are not isolated from each other.

use futures::channel::oneshot;
use futures::future::LocalFutureObj;
use futures::task::{LocalSpawn, SpawnError};
use linger_core::{
    CursorStep, Error, Key, Operation, Output, Result, TransactionMode, Value,
};
use rustc_hash::FxHashMap;
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};
use tracing::{debug, trace};

use crate::backend::{Backend, BackendExt, FinishCallback, TxnId};
use crate::cursor::HostCursor;
use crate::request::{Outcome, RequestHandle, RequestId};
use crate::scheduler::{Job, Scheduler, Task};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HostPhase {
    Running,
    Committing,
    Finished,
}

struct UndoEntry {
    resource: String,
    key: Key,
    previous: Option<Value>,
}

struct HostTxn {
    scope: Vec<String>,
    mode: TransactionMode,
    phase: HostPhase,
    active: bool,
    outstanding: usize,
    undo: Vec<UndoEntry>,
    cursors: FxHashMap<RequestId, HostCursor>,
    on_finish: Vec<FinishCallback>,
    notified: bool,
}

impl HostTxn {
    fn new(scope: Vec<String>, mode: TransactionMode) -> Self {
        Self {
            scope,
            mode,
            phase: HostPhase::Running,
            active: true,
            outstanding: 0,
            undo: Vec::new(),
            cursors: FxHashMap::default(),
            on_finish: Vec::new(),
            notified: false,
        }
    }
}

struct StoreInner {
    resources: RefCell<BTreeMap<String, BTreeMap<Key, Value>>>,
    txns: RefCell<FxHashMap<TxnId, HostTxn>>,
    scheduler: Scheduler,
    next_txn: Cell<u64>,
    next_request: Cell<u64>,
}

/// In-memory transactional store with auto-commit
///
/// Cloning is cheap and yields the same store.
///
/// # Example
///
/// ```ignore
/// let store = MemoryStore::new();
/// store.create_resource("books")?;
/// let db = Database::new(store.clone());
/// // ... issue requests ...
/// store.run_until_idle();
/// ```
#[derive(Clone)]
pub struct MemoryStore {
    inner: Rc<StoreInner>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            inner: Rc::new(StoreInner {
                resources: RefCell::new(BTreeMap::new()),
                txns: RefCell::new(FxHashMap::default()),
                scheduler: Scheduler::new(),
                next_txn: Cell::new(1),
                next_request: Cell::new(1),
            }),
        }
    }

    // ========================================================================
    // Resources
    // ========================================================================

    /// Create an empty resource
    pub fn create_resource(&self, name: impl Into<String>) -> Result<()> {
        let name = name.into();
        let mut resources = self.inner.resources.borrow_mut();
        if resources.contains_key(&name) {
            return Err(Error::Constraint(format!("resource {} already exists", name)));
        }
        debug!(resource = %name, "created resource");
        resources.insert(name, BTreeMap::new());
        Ok(())
    }

    /// Names of all resources, sorted
    pub fn resource_names(&self) -> Vec<String> {
        self.inner.resources.borrow().keys().cloned().collect()
    }

    /// Current value of `key`, outside of any transaction
    pub fn get(&self, resource: &str, key: impl Into<Key>) -> Option<Value> {
        let key = key.into();
        self.inner
            .resources
            .borrow()
            .get(resource)
            .and_then(|data| data.get(&key).cloned())
    }

    /// Current contents of `resource` in key order
    pub fn entries(&self, resource: &str) -> Vec<(Key, Value)> {
        self.inner
            .resources
            .borrow()
            .get(resource)
            .map(|data| data.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default()
    }

    // ========================================================================
    // Scheduling
    // ========================================================================

    /// Number of queued macrotasks
    pub fn pending_tasks(&self) -> usize {
        self.inner.scheduler.pending()
    }

    /// Queue a callback as its own macrotask
    pub fn post(&self, callback: impl FnOnce() + 'static) {
        self.inner.scheduler.push(Task::Callback(Box::new(callback)));
    }

    /// Future that completes after `turns` further macrotasks have been
    /// scheduled behind it. Stands in for external asynchronous work.
    pub fn sleep(&self, turns: usize) -> Sleep {
        let (wake, rx) = oneshot::channel();
        self.inner.scheduler.push(Task::Timer {
            remaining: turns,
            wake,
        });
        Sleep { rx }
    }

    /// Finish the current unit of work
    ///
    /// Drains microtasks, deactivates every transaction, and starts
    /// committing those with no outstanding request.
    pub fn end_turn(&self) {
        self.inner.scheduler.run_microtasks();

        let mut committing = Vec::new();
        {
            let mut txns = self.inner.txns.borrow_mut();
            for (id, txn) in txns.iter_mut() {
                txn.active = false;
                if txn.phase == HostPhase::Running && txn.outstanding == 0 {
                    txn.phase = HostPhase::Committing;
                    committing.push(*id);
                }
            }
        }

        committing.sort();
        for id in committing {
            debug!(txn = %id, "no outstanding requests, committing");
            self.inner.scheduler.push(Task::Commit(id));
        }
    }

    /// Run the next macrotask; `false` if the queue is empty
    pub fn run_task(&self) -> bool {
        let Some(task) = self.inner.scheduler.pop() else {
            return false;
        };
        trace!(task = task.label(), "running task");

        match task {
            Task::Execute { request, job } => self.execute(request, job),
            Task::Commit(txn) => self.commit(txn),
            Task::Finish { txn, outcome } => self.notify(txn, outcome),
            Task::Timer { remaining, wake } => {
                if remaining == 0 {
                    let _ = wake.send(());
                } else {
                    self.inner.scheduler.push(Task::Timer {
                        remaining: remaining - 1,
                        wake,
                    });
                }
            }
            Task::Callback(callback) => callback(),
        }
        true
    }

    /// Run turns until no work is left
    ///
    /// Must not be called from inside a spawned future.
    pub fn run_until_idle(&self) {
        loop {
            self.end_turn();
            if !self.run_task() {
                break;
            }
        }
    }

    /// Spawn `future`, run until idle, and return its output if it finished
    pub fn run_until<F>(&self, future: F) -> Option<F::Output>
    where
        F: Future + 'static,
        F::Output: 'static,
    {
        let (tx, mut rx) = oneshot::channel();
        let spawned = self.spawn(async move {
            let _ = tx.send(future.await);
        });
        if spawned.is_err() {
            return None;
        }
        self.run_until_idle();
        rx.try_recv().ok().flatten()
    }

    // ========================================================================
    // Task execution
    // ========================================================================

    fn execute(&self, request: RequestHandle, job: Job) {
        let txn_id = request.txn();
        let outcome = {
            let mut txns = self.inner.txns.borrow_mut();
            match txns.get_mut(&txn_id) {
                None => Err(Error::Internal(format!("unknown transaction {}", txn_id))),
                Some(txn) if txn.phase != HostPhase::Running => Err(Error::aborted(
                    "transaction was aborted before the request ran",
                )),
                Some(txn) => {
                    txn.active = true;
                    txn.outstanding = txn.outstanding.saturating_sub(1);
                    let mut resources = self.inner.resources.borrow_mut();
                    run_job(txn, &mut resources, &request, job)
                }
            }
        };

        trace!(
            txn = %txn_id,
            request = %request.id(),
            ok = outcome.is_ok(),
            "request settled"
        );
        request.settle(outcome);
    }

    fn commit(&self, txn_id: TxnId) {
        {
            let mut txns = self.inner.txns.borrow_mut();
            let Some(txn) = txns.get_mut(&txn_id) else {
                return;
            };
            if txn.phase != HostPhase::Committing {
                return;
            }
            txn.phase = HostPhase::Finished;
            txn.undo.clear();
            txn.cursors.clear();
        }
        debug!(txn = %txn_id, "transaction committed");
        self.notify(txn_id, Ok(()));
    }

    fn notify(&self, txn_id: TxnId, outcome: Result<()>) {
        let callbacks = {
            let mut txns = self.inner.txns.borrow_mut();
            match txns.get_mut(&txn_id) {
                Some(txn) if !txn.notified => {
                    txn.notified = true;
                    std::mem::take(&mut txn.on_finish)
                }
                _ => return,
            }
        };
        for callback in callbacks {
            callback(outcome.clone());
        }
    }

    // ========================================================================
    // Admission
    // ========================================================================

    fn admit(&self, txn_id: TxnId, target: &str, write: Option<&'static str>) -> Result<()> {
        let txns = self.inner.txns.borrow();
        let txn = txns
            .get(&txn_id)
            .ok_or_else(|| Error::InvalidState(format!("unknown transaction {}", txn_id)))?;

        if txn.phase != HostPhase::Running {
            return Err(Error::TransactionFinished);
        }
        if !txn.active {
            return Err(Error::TransactionInactive);
        }
        if !txn.scope.iter().any(|s| s == target) {
            return Err(Error::NotInScope(target.to_string()));
        }
        if let Some(operation) = write {
            if !txn.mode.is_writable() {
                return Err(Error::ReadOnly {
                    operation,
                    resource: target.to_string(),
                });
            }
        }
        Ok(())
    }

    fn enqueue(&self, txn_id: TxnId, target: &str, job: Job) -> RequestHandle {
        let id = RequestId(self.inner.next_request.get());
        self.inner.next_request.set(id.0 + 1);

        let request = RequestHandle::new(id, txn_id, target);
        if let Some(txn) = self.inner.txns.borrow_mut().get_mut(&txn_id) {
            txn.outstanding += 1;
        }
        self.inner.scheduler.push(Task::Execute {
            request: request.clone(),
            job,
        });
        request
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalSpawn for MemoryStore {
    fn spawn_local_obj(&self, future: LocalFutureObj<'static, ()>) -> std::result::Result<(), SpawnError> {
        self.inner.scheduler.spawner().spawn_local_obj(future)
    }

    fn status_local(&self) -> std::result::Result<(), SpawnError> {
        self.inner.scheduler.spawner().status_local()
    }
}

impl Backend for MemoryStore {
    fn open(&self, scope: &[String], mode: TransactionMode) -> Result<TxnId> {
        if scope.is_empty() && mode != TransactionMode::Exclusive {
            return Err(Error::Data(
                "a transaction scope must name at least one resource".to_string(),
            ));
        }
        {
            let resources = self.inner.resources.borrow();
            if let Some(missing) = scope.iter().find(|name| !resources.contains_key(*name)) {
                return Err(Error::UnknownResource(missing.clone()));
            }
        }

        let id = TxnId(self.inner.next_txn.get());
        self.inner.next_txn.set(id.0 + 1);
        self.inner
            .txns
            .borrow_mut()
            .insert(id, HostTxn::new(scope.to_vec(), mode));
        debug!(txn = %id, %mode, scope = ?scope, "transaction opened");
        Ok(id)
    }

    fn issue(&self, txn: TxnId, target: &str, operation: Operation) -> Result<RequestHandle> {
        let write = operation.is_write().then(|| operation.name());
        self.admit(txn, target, write)?;
        if let Some(range) = operation.range() {
            if !range.is_well_formed() {
                return Err(Error::Data(format!(
                    "malformed key range for {}",
                    operation.name()
                )));
            }
        }
        Ok(self.enqueue(txn, target, Job::Operation(operation)))
    }

    fn step(&self, txn_id: TxnId, request: &RequestHandle, step: CursorStep) -> Result<()> {
        self.admit(txn_id, request.source(), None)?;
        if step == CursorStep::Advance(0) {
            return Err(Error::Data("advance count must be positive".to_string()));
        }
        {
            let mut txns = self.inner.txns.borrow_mut();
            let txn = txns
                .get_mut(&txn_id)
                .ok_or_else(|| Error::InvalidState(format!("unknown transaction {}", txn_id)))?;
            if !txn.cursors.contains_key(&request.id()) {
                return Err(Error::InvalidState(format!(
                    "{} has no open cursor",
                    request.id()
                )));
            }
            txn.outstanding += 1;
        }
        self.inner.scheduler.push(Task::Execute {
            request: request.clone(),
            job: Job::Step(step),
        });
        Ok(())
    }

    fn probe(&self, txn: TxnId, target: &str) -> Result<RequestHandle> {
        self.admit(txn, target, None)?;
        Ok(self.enqueue(txn, target, Job::Probe))
    }

    fn abort(&self, txn_id: TxnId) -> Result<()> {
        let undo = {
            let mut txns = self.inner.txns.borrow_mut();
            let txn = txns
                .get_mut(&txn_id)
                .ok_or_else(|| Error::InvalidState(format!("unknown transaction {}", txn_id)))?;
            if txn.phase != HostPhase::Running {
                return Err(Error::TransactionFinished);
            }
            txn.phase = HostPhase::Finished;
            txn.active = false;
            txn.cursors.clear();
            std::mem::take(&mut txn.undo)
        };

        let rolled_back = undo.len();
        {
            let mut resources = self.inner.resources.borrow_mut();
            for entry in undo.into_iter().rev() {
                let Some(data) = resources.get_mut(&entry.resource) else {
                    continue;
                };
                match entry.previous {
                    Some(value) => {
                        data.insert(entry.key, value);
                    }
                    None => {
                        data.remove(&entry.key);
                    }
                }
            }
        }
        debug!(txn = %txn_id, rolled_back, "transaction aborted");

        // Queued behind any request still waiting to run, so those fail first.
        self.inner.scheduler.push(Task::Finish {
            txn: txn_id,
            outcome: Err(Error::aborted("transaction aborted")),
        });
        Ok(())
    }

    fn on_finish(&self, txn_id: TxnId, callback: FinishCallback) -> Result<()> {
        let mut txns = self.inner.txns.borrow_mut();
        let txn = txns
            .get_mut(&txn_id)
            .ok_or_else(|| Error::InvalidState(format!("unknown transaction {}", txn_id)))?;
        if txn.notified {
            return Err(Error::TransactionFinished);
        }
        txn.on_finish.push(callback);
        Ok(())
    }

    fn is_active(&self, txn_id: TxnId) -> Option<bool> {
        self.inner
            .txns
            .borrow()
            .get(&txn_id)
            .map(|txn| txn.active && txn.phase == HostPhase::Running)
    }
}

/// Future returned by [`MemoryStore::sleep`]
pub struct Sleep {
    rx: oneshot::Receiver<()>,
}

impl Future for Sleep {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        Pin::new(&mut self.rx).poll(cx).map(|_| ())
    }
}

// ============================================================================
// Request execution
// ============================================================================

fn run_job(
    txn: &mut HostTxn,
    resources: &mut BTreeMap<String, BTreeMap<Key, Value>>,
    request: &RequestHandle,
    job: Job,
) -> Outcome {
    let target = request.source();
    match job {
        Job::Probe => Ok(Output::Unit),
        Job::Operation(operation) => apply(txn, resources, request, operation),
        Job::Step(step) => {
            let Some(cursor) = txn.cursors.get_mut(&request.id()) else {
                return Err(Error::InvalidState(format!(
                    "{} has no open cursor",
                    request.id()
                )));
            };
            let data = resources
                .get(&cursor.resource)
                .ok_or_else(|| Error::UnknownResource(target.to_string()))?;
            let record = cursor.advance(data, &step);
            if record.is_none() {
                txn.cursors.remove(&request.id());
            }
            Ok(Output::Cursor(record))
        }
    }
}

fn apply(
    txn: &mut HostTxn,
    resources: &mut BTreeMap<String, BTreeMap<Key, Value>>,
    request: &RequestHandle,
    operation: Operation,
) -> Outcome {
    let target = request.source();
    let data = resources
        .get_mut(target)
        .ok_or_else(|| Error::UnknownResource(target.to_string()))?;

    match operation {
        Operation::Get { key } => Ok(Output::Value(data.get(&key).cloned())),
        Operation::GetAll { range, limit } => Ok(Output::Values(
            data.range((range.lower(), range.upper()))
                .map(|(_, v)| v.clone())
                .take(limit.unwrap_or(usize::MAX))
                .collect(),
        )),
        Operation::Put { key, value } => {
            let previous = data.insert(key.clone(), value);
            txn.undo.push(UndoEntry {
                resource: target.to_string(),
                key: key.clone(),
                previous,
            });
            Ok(Output::Key(key))
        }
        Operation::Add { key, value } => {
            if data.contains_key(&key) {
                return Err(Error::Constraint(format!(
                    "key {} already exists in {}",
                    key, target
                )));
            }
            data.insert(key.clone(), value);
            txn.undo.push(UndoEntry {
                resource: target.to_string(),
                key: key.clone(),
                previous: None,
            });
            Ok(Output::Key(key))
        }
        Operation::Delete { range } => {
            let keys: Vec<Key> = data
                .range((range.lower(), range.upper()))
                .map(|(k, _)| k.clone())
                .collect();
            for key in keys {
                let previous = data.remove(&key);
                txn.undo.push(UndoEntry {
                    resource: target.to_string(),
                    key,
                    previous,
                });
            }
            Ok(Output::Unit)
        }
        Operation::Clear => {
            for (key, value) in std::mem::take(data) {
                txn.undo.push(UndoEntry {
                    resource: target.to_string(),
                    key,
                    previous: Some(value),
                });
            }
            Ok(Output::Unit)
        }
        Operation::Count { range } => Ok(Output::Count(
            data.range((range.lower(), range.upper())).count() as u64,
        )),
        Operation::OpenCursor { range, direction } => {
            let mut cursor = HostCursor::new(target, range, direction, request.clone());
            let record = cursor.advance(data, &CursorStep::Advance(1));
            if record.is_some() {
                txn.cursors.insert(request.id(), cursor);
            }
            Ok(Output::Cursor(record))
        }
    }
}
