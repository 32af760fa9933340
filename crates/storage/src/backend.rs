//! The store interface consumed by the engine
//!
//! A backend runs transactions that auto-commit: at the end of a unit of
//! synchronous work, a transaction with no outstanding request commits. The
//! engine only ever talks to the store through this trait, which is chosen
//! per transaction when it is opened.
//!
//! # Contract
//!
//! - `issue`, `step` and `probe` never settle the returned request
//!   synchronously; the outcome arrives on a later turn.
//! - Malformed arguments are reported synchronously as `Err`.
//! - The finish callback fires exactly once, with `Ok(())` on commit and
//!   `Err(Error::Aborted { .. })` on abort.
//! - A transaction is active while the unit of work that opened it runs and
//!   while one of its requests is being settled; otherwise requests fail
//!   with [`linger_core::Error::TransactionInactive`].

use futures::future::LocalFutureObj;
use futures::task::LocalSpawn;
use linger_core::{CursorStep, Error, Operation, Result, TransactionMode};
use std::fmt;
use std::future::Future;

use crate::request::RequestHandle;

/// Transaction identifier within a store
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TxnId(pub u64);

impl fmt::Display for TxnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "txn-{}", self.0)
    }
}

/// Commit-or-abort notification
pub type FinishCallback = Box<dyn FnOnce(Result<()>)>;

/// Transactional store with auto-commit semantics
pub trait Backend: LocalSpawn {
    /// Open a transaction over `scope`
    fn open(&self, scope: &[String], mode: TransactionMode) -> Result<TxnId>;

    /// Issue `operation` against `target`
    fn issue(&self, txn: TxnId, target: &str, operation: Operation) -> Result<RequestHandle>;

    /// Move the cursor opened by `request`, settling `request` again
    ///
    /// The engine resets the handle's readiness; the backend only schedules
    /// the step.
    fn step(&self, txn: TxnId, request: &RequestHandle, step: CursorStep) -> Result<()>;

    /// Issue a side-effect-free request against `target`
    fn probe(&self, txn: TxnId, target: &str) -> Result<RequestHandle>;

    /// Abort the transaction
    fn abort(&self, txn: TxnId) -> Result<()>;

    /// Register the commit-or-abort callback
    fn on_finish(&self, txn: TxnId, callback: FinishCallback) -> Result<()>;

    /// Whether the transaction is currently active, if the backend tracks it
    ///
    /// Backends that cannot answer return `None`; the engine then infers
    /// activity by probing.
    fn is_active(&self, _txn: TxnId) -> Option<bool> {
        None
    }
}

/// Spawning helpers for any [`Backend`]
pub trait BackendExt {
    /// Run `future` on the backend's local executor
    fn spawn<F>(&self, future: F) -> Result<()>
    where
        F: Future<Output = ()> + 'static;
}

impl<B: Backend + ?Sized> BackendExt for B {
    fn spawn<F>(&self, future: F) -> Result<()>
    where
        F: Future<Output = ()> + 'static,
    {
        self.spawn_local_obj(LocalFutureObj::from(Box::pin(future)))
            .map_err(|e| Error::Scheduler(e.to_string()))
    }
}
