//! Transaction Lifecycle Test Suite
//!
//! Drives transactions through the reference store turn by turn and checks
//! the lifecycle the engine reports, extension chaining, deferred replay,
//! keep-alive probing and cursor stepping.
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test --test transaction_lifecycle
//! cargo test --test transaction_lifecycle deferred::
//! ```

use futures::future::LocalFutureObj;
use futures::task::{LocalSpawn, SpawnError};
use linger::prelude::*;
use linger::{Backend, CursorStep, FinishCallback, Operation, RequestHandle, TxnId};

// Test modules
mod backends;
mod cursors;
mod deferred;
mod properties;
mod state_machine;

// =============================================================================
// SHARED TEST UTILITIES
// =============================================================================

/// Route engine logs to the test harness output
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

/// Store with empty `books` and `authors` resources
pub fn store() -> MemoryStore {
    init_tracing();
    let store = MemoryStore::new();
    store.create_resource("books").unwrap();
    store.create_resource("authors").unwrap();
    store
}

/// Store whose `books` holds keys 1..=3
pub fn seeded_store() -> MemoryStore {
    let store = store();
    let db = Database::new(store.clone());
    let tx = db.transaction(&["books"], TransactionMode::ReadWrite).unwrap();
    let books = tx.object_store("books").unwrap();
    for (key, title) in [(1, "Dune"), (2, "Emma"), (3, "Ulysses")] {
        books.put(key, json!(title)).unwrap();
    }
    store.run_until_idle();
    store
}

/// Poll a completion without driving the store
pub fn settled(completion: &Completion) -> Option<Result<()>> {
    use futures::FutureExt;
    completion.clone().now_or_never()
}

/// Backend that does not report activity, forcing probe-based inference
pub struct NoActivityHook(pub MemoryStore);

impl LocalSpawn for NoActivityHook {
    fn spawn_local_obj(&self, future: LocalFutureObj<'static, ()>) -> std::result::Result<(), SpawnError> {
        self.0.spawn_local_obj(future)
    }
}

impl Backend for NoActivityHook {
    fn open(&self, scope: &[String], mode: TransactionMode) -> Result<TxnId> {
        self.0.open(scope, mode)
    }

    fn issue(&self, txn: TxnId, target: &str, operation: Operation) -> Result<RequestHandle> {
        self.0.issue(txn, target, operation)
    }

    fn step(&self, txn: TxnId, request: &RequestHandle, step: CursorStep) -> Result<()> {
        self.0.step(txn, request, step)
    }

    fn probe(&self, txn: TxnId, target: &str) -> Result<RequestHandle> {
        self.0.probe(txn, target)
    }

    fn abort(&self, txn: TxnId) -> Result<()> {
        self.0.abort(txn)
    }

    fn on_finish(&self, txn: TxnId, callback: FinishCallback) -> Result<()> {
        self.0.on_finish(txn, callback)
    }
}
