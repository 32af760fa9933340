//! Transaction state machine
//!
//! ```text
//!            extend()                extension resolves
//!   Open ─────────────► Waiting ─────────────────────► Committing
//!    │                    │ │                               │
//!    │                    │ └── extension rejects ──┐       │
//!    │                    │     or probe limit      ▼       ▼
//!    └── store commits ───┴──────────────────────► Finished ◄┘
//! ```
//!
//! `Open` is reported as `Active` or `Inactive` depending on the store.
//! Each call to [`Transaction::extend`] bumps the generation; only the
//! watcher of the current generation may move the machine out of `Waiting`.
//!
//! Dispatch rules while the machine is:
//! - `Open`/`Committing`: straight to the backend
//! - `Waiting`: captured in the deferred queue and replayed by the spinner
//! - `Finished`: refused with [`Error::TransactionFinished`]

use futures::future::{self, FutureExt, LocalBoxFuture, Shared, TryFutureExt};
use linger_core::{
    CursorStep, Direction, Error, KeyRange, Operation, ReadyState, Result, TransactionConfig,
    TransactionMode, TxnState,
};
use linger_storage::{Backend, BackendExt, Listen, RequestHandle, TxnId};
use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use std::rc::Rc;
use tracing::{debug, trace, warn};

use crate::completion::Completion;
use crate::cursor::CursorStepFuture;
use crate::queue::{Deferred, DeferredQueue};
use crate::request::Request;
use crate::spinner::KeepAlive;

/// All pending extensions of one transaction, combined
type Extension = Shared<LocalBoxFuture<'static, std::result::Result<(), String>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    Open,
    Waiting,
    Committing,
    Finished,
}

pub(crate) struct Machine {
    pub(crate) phase: Phase,
    pub(crate) generation: u64,
    pub(crate) extension: Option<Extension>,
    pub(crate) queue: DeferredQueue,
    pub(crate) keep_alive: KeepAlive,
    /// Requests this engine dispatched that have not settled yet
    pub(crate) outstanding: usize,
    pub(crate) abort_reason: Option<String>,
}

impl Machine {
    /// New requests must queue behind deferred ones still awaiting replay
    fn defers(&self) -> bool {
        match self.phase {
            Phase::Waiting => true,
            Phase::Committing => !self.queue.is_empty(),
            Phase::Open | Phase::Finished => false,
        }
    }
}

pub(crate) struct TxnShared {
    pub(crate) backend: Rc<dyn Backend>,
    pub(crate) id: TxnId,
    scope: Vec<String>,
    mode: TransactionMode,
    pub(crate) machine: RefCell<Machine>,
    completion: Completion,
}

/// Handle to an open transaction
///
/// Clones refer to the same transaction.
#[derive(Clone)]
pub struct Transaction {
    shared: Rc<TxnShared>,
}

impl Transaction {
    /// Open a transaction on `backend`
    ///
    /// Duplicate scope names are collapsed. A configured probe target must be
    /// part of the scope.
    ///
    /// # Errors
    ///
    /// - [`Error::NotInScope`] if `config.probe_target` is outside the scope
    /// - whatever the backend reports for `open` or `on_finish`
    pub fn begin<S: AsRef<str>>(
        backend: Rc<dyn Backend>,
        scope: &[S],
        mode: TransactionMode,
        config: TransactionConfig,
    ) -> Result<Self> {
        let mut names: Vec<String> = Vec::with_capacity(scope.len());
        for name in scope {
            let name = name.as_ref();
            if !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        }
        if let Some(target) = &config.probe_target {
            if !names.contains(target) {
                return Err(Error::NotInScope(target.clone()));
            }
        }

        let id = backend.open(&names, mode)?;
        let (finished, completion) = Completion::channel();
        let probe_target = config.probe_target.or_else(|| names.first().cloned());

        let shared = Rc::new(TxnShared {
            backend,
            id,
            scope: names,
            mode,
            machine: RefCell::new(Machine {
                phase: Phase::Open,
                generation: 0,
                extension: None,
                queue: DeferredQueue::default(),
                keep_alive: KeepAlive::new(probe_target, config.max_probe_rounds),
                outstanding: 0,
                abort_reason: None,
            }),
            completion,
        });

        let weak = Rc::downgrade(&shared);
        shared.backend.on_finish(
            id,
            Box::new(move |outcome| {
                let outcome = match weak.upgrade() {
                    Some(shared) => shared.on_finished(outcome),
                    None => outcome,
                };
                let _ = finished.send(outcome);
            }),
        )?;

        debug!(txn = %id, %mode, scope = ?shared.scope, "transaction begun");
        Ok(Self { shared })
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Backend transaction id
    pub fn id(&self) -> TxnId {
        self.shared.id
    }

    /// Resources in scope
    pub fn scope(&self) -> &[String] {
        &self.shared.scope
    }

    /// Access mode
    pub fn mode(&self) -> TransactionMode {
        self.shared.mode
    }

    /// Number of `extend` calls accepted so far
    pub fn generation(&self) -> u64 {
        self.shared.machine.borrow().generation
    }

    /// Requests captured and not yet replayed
    pub fn deferred_len(&self) -> usize {
        self.shared.machine.borrow().queue.len()
    }

    /// Requests dispatched through this handle that have not settled
    pub fn outstanding(&self) -> usize {
        self.shared.machine.borrow().outstanding
    }

    /// Completed keep-alive probe rounds
    pub fn probe_rounds(&self) -> u64 {
        self.shared.machine.borrow().keep_alive.rounds()
    }

    /// Current lifecycle state
    ///
    /// Outside of `Waiting`, activity comes from [`Backend::is_active`]. A
    /// backend without that hook is asked with a probe, which keeps the
    /// transaction alive for one more round when it is accepted. An inactive
    /// transaction with nothing outstanding reports `Committing`: the store
    /// commits it at the end of the turn.
    pub fn state(&self) -> TxnState {
        let (phase, outstanding) = {
            let machine = self.shared.machine.borrow();
            (machine.phase, machine.outstanding)
        };
        match phase {
            Phase::Waiting => TxnState::Waiting,
            Phase::Committing => TxnState::Committing,
            Phase::Finished => TxnState::Finished,
            Phase::Open => match self.shared.activity() {
                Some(true) | None => TxnState::Active,
                Some(false) if outstanding == 0 => TxnState::Committing,
                Some(false) => TxnState::Inactive,
            },
        }
    }

    /// Future settling when the transaction commits or aborts
    ///
    /// Every call returns a clone of the same future.
    pub fn completion(&self) -> Completion {
        self.shared.completion.clone()
    }

    // ========================================================================
    // Requests
    // ========================================================================

    /// Issue `operation` against `target`
    ///
    /// While an extension is pending, or earlier deferred requests have not
    /// been replayed yet, the request is deferred and a [`Request::Deferred`]
    /// proxy is returned; it is bound when the request is replayed. Otherwise
    /// the request goes straight to the backend.
    ///
    /// # Errors
    ///
    /// - [`Error::TransactionFinished`] once the transaction finished
    /// - [`Error::NotInScope`] for a deferred request outside the scope
    /// - backend admission errors for direct requests
    pub fn issue(&self, target: &str, operation: Operation) -> Result<Request> {
        let (phase, defers) = {
            let machine = self.shared.machine.borrow();
            (machine.phase, machine.defers())
        };
        match phase {
            Phase::Finished => Err(Error::TransactionFinished),
            _ if defers => {
                self.shared.ensure_in_scope(target)?;
                let name = operation.name();
                let proxy = self
                    .shared
                    .machine
                    .borrow_mut()
                    .queue
                    .push(target, Deferred::Issue(operation));
                trace!(txn = %self.shared.id, target, operation = name, "request deferred");
                Ok(Request::Deferred(proxy))
            }
            _ => {
                let handle = self.shared.backend.issue(self.shared.id, target, operation)?;
                self.shared.track(&handle);
                Ok(Request::Direct(handle))
            }
        }
    }

    /// Open a cursor over `range` of `target`
    ///
    /// The returned future resolves to the first record, or `None` when the
    /// range is empty.
    pub fn open_cursor(
        &self,
        target: &str,
        range: KeyRange,
        direction: Direction,
    ) -> Result<CursorStepFuture> {
        let request = self.issue(target, Operation::OpenCursor { range, direction })?;
        Ok(CursorStepFuture::new(self.clone(), request))
    }

    /// Move the cursor opened by `request`
    ///
    /// The request must have settled from its previous step. Its readiness
    /// is reset and the next settlement carries the new position.
    pub fn step_cursor(&self, request: &RequestHandle, step: CursorStep) -> Result<Request> {
        if request.txn() != self.shared.id {
            return Err(Error::InvalidState(format!(
                "{} belongs to {}",
                request.id(),
                request.txn()
            )));
        }
        if request.ready_state() == ReadyState::Pending {
            return Err(Error::InvalidState(format!(
                "{} has a cursor step in flight",
                request.id()
            )));
        }

        let (phase, defers) = {
            let machine = self.shared.machine.borrow();
            (machine.phase, machine.defers())
        };
        match phase {
            Phase::Finished => Err(Error::TransactionFinished),
            _ if defers => {
                self.shared.ensure_in_scope(request.source())?;
                request.reset();
                let name = step.name();
                let proxy = self.shared.machine.borrow_mut().queue.push(
                    request.source(),
                    Deferred::Step {
                        request: request.clone(),
                        step,
                    },
                );
                trace!(txn = %self.shared.id, request = %request.id(), step = name, "cursor step deferred");
                Ok(Request::Deferred(proxy))
            }
            _ => {
                self.shared.backend.step(self.shared.id, request, step)?;
                request.reset();
                self.shared.track(request);
                Ok(Request::Direct(request.clone()))
            }
        }
    }

    // ========================================================================
    // Extension
    // ========================================================================

    /// Keep the transaction alive until `awaitable` settles
    ///
    /// Requests issued meanwhile are deferred and replayed in order. If
    /// `awaitable` fails the transaction is aborted with its error message
    /// as reason. Extensions chain: while one is pending, another one
    /// combines with it and the transaction waits for both. The first
    /// failure aborts without waiting for the rest.
    ///
    /// Returns the transaction's [`Completion`]. Calling this on a committing
    /// or finished transaction returns an already-failed completion with
    /// [`Error::InvalidState`] and changes nothing.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let done = tx.extend(async move {
    ///     let rate = fetch_rate().await?;
    ///     tx2.issue("prices", Operation::Put { key, value: rate.into() })?;
    ///     Ok::<_, Error>(())
    /// });
    /// ```
    pub fn extend<F, T, E>(&self, awaitable: F) -> Completion
    where
        F: Future<Output = std::result::Result<T, E>> + 'static,
        E: fmt::Display,
    {
        let shared = &self.shared;
        let state = self.state();
        if !state.accepts_extension() {
            debug!(txn = %shared.id, %state, "extension refused");
            return Completion::rejected(Error::InvalidState(format!(
                "cannot extend a {} transaction",
                state
            )));
        }
        if shared.machine.borrow().keep_alive.target().is_none() {
            return Completion::rejected(Error::EmptyScope);
        }

        let supplied: LocalBoxFuture<'static, std::result::Result<(), String>> = awaitable
            .map(|settled| settled.map(|_| ()).map_err(|e| e.to_string()))
            .boxed_local();
        let (generation, composite) = {
            let machine = shared.machine.borrow();
            let composite = match &machine.extension {
                Some(existing) => future::try_join(existing.clone(), supplied)
                    .map_ok(|_| ())
                    .boxed_local()
                    .shared(),
                None => supplied.shared(),
            };
            (machine.generation + 1, composite)
        };

        let watcher = {
            let shared = shared.clone();
            let composite = composite.clone();
            async move {
                let settled = composite.await;
                shared.on_extension_settled(generation, settled);
            }
        };
        if let Err(e) = shared.backend.spawn(watcher) {
            warn!(txn = %shared.id, error = %e, "could not watch extension");
            return Completion::rejected(e);
        }

        let start = {
            let mut machine = shared.machine.borrow_mut();
            machine.generation = generation;
            machine.extension = Some(composite);
            let start = machine.phase == Phase::Open;
            machine.phase = Phase::Waiting;
            start
        };
        if start {
            debug!(txn = %shared.id, generation, "waiting on extension");
            shared.spin();
        } else {
            trace!(txn = %shared.id, generation, "extension chained");
        }
        shared.completion.clone()
    }

    // ========================================================================
    // Abort
    // ========================================================================

    /// Abort the transaction
    ///
    /// Deferred requests fail with [`Error::Aborted`] and the completion
    /// rejects.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidState`] if the transaction already finished
    /// - the backend's error if it refuses the abort (for example because
    ///   the store is already committing)
    pub fn abort(&self) -> Result<()> {
        match self.shared.finish_early("transaction aborted by caller".to_string()) {
            None => Err(Error::InvalidState(
                "transaction already finished".to_string(),
            )),
            Some(aborted) => aborted,
        }
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let machine = self.shared.machine.borrow();
        f.debug_struct("Transaction")
            .field("id", &self.shared.id)
            .field("scope", &self.shared.scope)
            .field("mode", &self.shared.mode)
            .field("phase", &machine.phase)
            .field("generation", &machine.generation)
            .field("deferred", &machine.queue.len())
            .finish()
    }
}

// ============================================================================
// Shared state
// ============================================================================

impl TxnShared {
    fn ensure_in_scope(&self, target: &str) -> Result<()> {
        if self.scope.iter().any(|name| name == target) {
            Ok(())
        } else {
            Err(Error::NotInScope(target.to_string()))
        }
    }

    fn activity(self: &Rc<Self>) -> Option<bool> {
        if let Some(active) = self.backend.is_active(self.id) {
            return Some(active);
        }
        let target = self.machine.borrow().keep_alive.target()?.to_string();
        match self.backend.probe(self.id, &target) {
            Ok(probe) => {
                self.track(&probe);
                Some(true)
            }
            Err(_) => Some(false),
        }
    }

    /// Count `handle` as outstanding until it next settles
    pub(crate) fn track(self: &Rc<Self>, handle: &RequestHandle) {
        self.machine.borrow_mut().outstanding += 1;
        let weak = Rc::downgrade(self);
        handle.subscribe(Box::new(move |_| {
            if let Some(shared) = weak.upgrade() {
                shared.on_request_settled();
            }
            Listen::Stop
        }));
    }

    fn on_request_settled(self: &Rc<Self>) {
        let resume = {
            let mut machine = self.machine.borrow_mut();
            machine.outstanding = machine.outstanding.saturating_sub(1);
            machine.keep_alive.is_armed()
                && (machine.phase == Phase::Waiting || !machine.queue.is_empty())
        };
        if resume {
            trace!(txn = %self.id, "request settled, resuming keep-alive");
            self.spin();
        }
    }

    fn on_extension_settled(
        self: &Rc<Self>,
        generation: u64,
        settled: std::result::Result<(), String>,
    ) {
        {
            let machine = self.machine.borrow();
            if machine.generation != generation || machine.phase != Phase::Waiting {
                trace!(txn = %self.id, generation, "superseded extension settled");
                return;
            }
        }
        match settled {
            Ok(()) => {
                let mut machine = self.machine.borrow_mut();
                machine.phase = Phase::Committing;
                machine.extension = None;
                debug!(txn = %self.id, generation, "extension resolved, transaction may commit");
            }
            Err(reason) => {
                debug!(txn = %self.id, generation, %reason, "extension rejected, aborting");
                self.abort_with(reason);
            }
        }
    }

    /// Abort without a caller to report to
    pub(crate) fn abort_with(self: &Rc<Self>, reason: String) {
        match self.finish_early(reason) {
            None => debug!(txn = %self.id, "abort ignored, transaction already finished"),
            Some(Err(e)) => debug!(txn = %self.id, error = %e, "backend refused abort"),
            Some(Ok(())) => {}
        }
    }

    /// Move to `Finished`, fail deferred requests, and abort on the backend
    ///
    /// `None` if the transaction had already finished.
    fn finish_early(&self, reason: String) -> Option<Result<()>> {
        let discarded = {
            let mut machine = self.machine.borrow_mut();
            if machine.phase == Phase::Finished {
                return None;
            }
            machine.phase = Phase::Finished;
            machine.abort_reason = Some(reason.clone());
            machine.extension = None;
            machine.keep_alive.stop();
            machine.queue.take_all()
        };

        if !discarded.is_empty() {
            debug!(txn = %self.id, count = discarded.len(), "discarding deferred requests");
        }
        let error = Error::aborted(&reason);
        for entry in discarded {
            entry.proxy.fail(error.clone());
        }

        debug!(txn = %self.id, %reason, "aborting transaction");
        Some(self.backend.abort(self.id))
    }

    /// Backend finish notification; returns the outcome to report
    fn on_finished(&self, outcome: Result<()>) -> Result<()> {
        let (discarded, reason) = {
            let mut machine = self.machine.borrow_mut();
            machine.phase = Phase::Finished;
            machine.extension = None;
            machine.keep_alive.stop();
            (machine.queue.take_all(), machine.abort_reason.clone())
        };

        let outcome = match (outcome, reason) {
            (Ok(()), _) => Ok(()),
            (Err(_), Some(reason)) => Err(Error::aborted(reason)),
            (Err(e), None) => Err(e),
        };

        if !discarded.is_empty() {
            warn!(
                txn = %self.id,
                count = discarded.len(),
                "transaction finished with deferred requests pending"
            );
            let error = match &outcome {
                Ok(()) => Error::TransactionFinished,
                Err(e) => e.clone(),
            };
            for entry in discarded {
                entry.proxy.fail(error.clone());
            }
        }

        match &outcome {
            Ok(()) => debug!(txn = %self.id, "transaction committed"),
            Err(e) => debug!(txn = %self.id, error = %e, "transaction aborted"),
        }
        outcome
    }
}
