//! Typed access to one resource of a transaction
//!
//! Every method dispatches synchronously (directly or into the deferred
//! queue) and returns a [`Pending`] future typed for the operation.
//!
//! ```ignore
//! let books = tx.object_store("books")?;
//! let key = books.put(1, json!({"title": "Dune"}))?.await?;
//! let total = books.count(KeyRange::all())?.await?;
//! ```

use futures::ready;
use linger_concurrency::{CursorStepFuture, Request, RequestFuture, Transaction};
use linger_core::{Direction, Error, Key, KeyRange, Operation, Output, Result, Value};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Handle to one resource within a transaction
#[derive(Debug, Clone)]
pub struct ObjectStore {
    txn: Transaction,
    name: String,
}

impl ObjectStore {
    /// Access `name` within `txn`
    ///
    /// # Errors
    ///
    /// [`Error::NotInScope`] if `name` is not part of the transaction's scope.
    pub fn open(txn: &Transaction, name: &str) -> Result<Self> {
        if !txn.scope().iter().any(|s| s == name) {
            return Err(Error::NotInScope(name.to_string()));
        }
        Ok(Self {
            txn: txn.clone(),
            name: name.to_string(),
        })
    }

    /// Resource name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Owning transaction
    pub fn transaction(&self) -> &Transaction {
        &self.txn
    }

    fn dispatch<T>(&self, operation: Operation, map: fn(Output) -> Result<T>) -> Result<Pending<T>> {
        let request = self.txn.issue(&self.name, operation)?;
        Ok(Pending::new(request, map))
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Value stored under `key`
    pub fn get(&self, key: impl Into<Key>) -> Result<Pending<Option<Value>>> {
        self.dispatch(Operation::Get { key: key.into() }, Output::into_value)
    }

    /// Values in `range`, in key order, at most `limit` of them
    pub fn get_all(&self, range: KeyRange, limit: Option<usize>) -> Result<Pending<Vec<Value>>> {
        self.dispatch(Operation::GetAll { range, limit }, Output::into_values)
    }

    /// Number of records in `range`
    pub fn count(&self, range: KeyRange) -> Result<Pending<u64>> {
        self.dispatch(Operation::Count { range }, Output::into_count)
    }

    /// Open a cursor over `range`
    pub fn open_cursor(&self, range: KeyRange, direction: Direction) -> Result<CursorStepFuture> {
        self.txn.open_cursor(&self.name, range, direction)
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Insert or replace the record under `key`
    pub fn put(&self, key: impl Into<Key>, value: impl Into<Value>) -> Result<Pending<Key>> {
        let operation = Operation::Put {
            key: key.into(),
            value: value.into(),
        };
        self.dispatch(operation, Output::into_key)
    }

    /// Insert a record; the future fails with [`Error::Constraint`] if the
    /// key exists
    pub fn add(&self, key: impl Into<Key>, value: impl Into<Value>) -> Result<Pending<Key>> {
        let operation = Operation::Add {
            key: key.into(),
            value: value.into(),
        };
        self.dispatch(operation, Output::into_key)
    }

    /// Delete the record under `key`
    pub fn delete(&self, key: impl Into<Key>) -> Result<Pending<()>> {
        self.delete_range(KeyRange::only(key))
    }

    /// Delete every record in `range`
    pub fn delete_range(&self, range: KeyRange) -> Result<Pending<()>> {
        self.dispatch(Operation::Delete { range }, Output::into_unit)
    }

    /// Delete every record
    pub fn clear(&self) -> Result<Pending<()>> {
        self.dispatch(Operation::Clear, Output::into_unit)
    }
}

/// Access to resources from a [`Transaction`]
pub trait TransactionExt {
    /// Typed handle to `name`
    fn object_store(&self, name: &str) -> Result<ObjectStore>;
}

impl TransactionExt for Transaction {
    fn object_store(&self, name: &str) -> Result<ObjectStore> {
        ObjectStore::open(self, name)
    }
}

/// Typed future over one request
pub struct Pending<T> {
    request: Request,
    inner: RequestFuture,
    map: fn(Output) -> Result<T>,
}

impl<T> Pending<T> {
    fn new(request: Request, map: fn(Output) -> Result<T>) -> Self {
        let inner = request.completion();
        Self {
            request,
            inner,
            map,
        }
    }

    /// The underlying request (a proxy if it was deferred)
    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Check if the request was deferred
    pub fn is_deferred(&self) -> bool {
        self.request.is_deferred()
    }
}

impl<T> Future for Pending<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let output = ready!(Pin::new(&mut self.inner).poll(cx))?;
        Poll::Ready((self.map)(output))
    }
}

impl<T> fmt::Debug for Pending<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pending")
            .field("request", &self.request)
            .field("adapter", &self.inner.id())
            .finish()
    }
}
