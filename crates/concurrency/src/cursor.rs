//! Cursors over a resource
//!
//! A cursor lives on the request that opened it: every step settles that
//! same request again. Each step gets its own [`RequestFuture`], so a
//! future never observes a settlement from an earlier or later step.

use futures::ready;
use linger_core::{CursorRecord, CursorStep, Error, Key, Result, Value};
use linger_storage::{RequestHandle, WeakRequestHandle};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::adapter::RequestFuture;
use crate::request::Request;
use crate::transaction::Transaction;

/// Future for one cursor step (including the initial open)
///
/// Resolves to the cursor at its new position, or `None` once the range
/// is exhausted.
pub struct CursorStepFuture {
    txn: Transaction,
    request: Request,
    adapter: RequestFuture,
}

impl CursorStepFuture {
    pub(crate) fn new(txn: Transaction, request: Request) -> Self {
        let adapter = request.completion();
        Self {
            txn,
            request,
            adapter,
        }
    }

    /// Identifier of the underlying [`RequestFuture`]
    pub fn adapter_id(&self) -> u64 {
        self.adapter.id()
    }

    /// The cursor's request (a proxy if the step was deferred)
    pub fn request(&self) -> &Request {
        &self.request
    }
}

impl Future for CursorStepFuture {
    type Output = Result<Option<Cursor>>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let output = ready!(Pin::new(&mut this.adapter).poll(cx))?;
        let Some(record) = output.into_cursor()? else {
            return Poll::Ready(Ok(None));
        };
        let handle = this.request.handle().ok_or_else(|| {
            Error::Internal("cursor request settled without being dispatched".to_string())
        })?;
        Poll::Ready(Ok(Some(Cursor {
            txn: this.txn.clone(),
            source: handle.source().to_string(),
            request: handle.downgrade(),
            record,
        })))
    }
}

impl fmt::Debug for CursorStepFuture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CursorStepFuture")
            .field("adapter", &self.adapter.id())
            .field("request", &self.request)
            .finish()
    }
}

/// Cursor positioned on a record
///
/// Holds the cursor's request weakly; the store keeps it alive while the
/// cursor is open.
pub struct Cursor {
    txn: Transaction,
    source: String,
    request: WeakRequestHandle,
    record: CursorRecord,
}

impl Cursor {
    /// Key of the current record
    pub fn key(&self) -> &Key {
        &self.record.key
    }

    /// Value of the current record
    pub fn value(&self) -> &Value {
        &self.record.value
    }

    /// Resource the cursor iterates
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Current record
    pub fn record(&self) -> &CursorRecord {
        &self.record
    }

    /// Take the current record
    pub fn into_record(self) -> CursorRecord {
        self.record
    }

    /// The request every step of this cursor settles
    pub fn request(&self) -> Option<RequestHandle> {
        self.request.upgrade()
    }

    /// Move to the next record
    pub fn step(&self) -> Result<CursorStepFuture> {
        self.advance(1)
    }

    /// Skip `count` records
    pub fn advance(&self, count: u32) -> Result<CursorStepFuture> {
        self.move_by(CursorStep::Advance(count))
    }

    /// Move to the first record at or past `key`
    pub fn continue_to(&self, key: impl Into<Key>) -> Result<CursorStepFuture> {
        self.move_by(CursorStep::ContinueTo(key.into()))
    }

    fn move_by(&self, step: CursorStep) -> Result<CursorStepFuture> {
        let handle = self
            .request
            .upgrade()
            .ok_or_else(|| Error::InvalidState("cursor is no longer open".to_string()))?;
        let request = self.txn.step_cursor(&handle, step)?;
        Ok(CursorStepFuture::new(self.txn.clone(), request))
    }
}

impl fmt::Debug for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cursor")
            .field("source", &self.source)
            .field("key", &self.record.key)
            .finish()
    }
}
