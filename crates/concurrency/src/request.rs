//! Requests as seen by callers

use linger_core::{Error, Output, ReadyState, Result};
use linger_storage::{Listener, RequestHandle};

use crate::adapter::RequestFuture;
use crate::proxy::RequestProxy;

/// A request returned by [`crate::Transaction::issue`]
///
/// `Direct` requests were dispatched immediately; `Deferred` ones were
/// captured while the transaction was waiting and are answered by a proxy
/// until they are replayed.
#[derive(Debug, Clone)]
pub enum Request {
    /// Dispatched to the store
    Direct(RequestHandle),
    /// Waiting in the deferred queue (or already replayed and bound)
    Deferred(RequestProxy),
}

impl Request {
    /// Future for the next outcome of this request
    pub fn completion(&self) -> RequestFuture {
        RequestFuture::new(self)
    }

    /// Subscribe to settlements
    pub fn subscribe(&self, listener: Listener) {
        match self {
            Request::Direct(handle) => handle.subscribe(listener),
            Request::Deferred(proxy) => proxy.subscribe(listener),
        }
    }

    /// Check if the request was deferred
    pub fn is_deferred(&self) -> bool {
        matches!(self, Request::Deferred(_))
    }

    /// The real request, if dispatched
    pub fn handle(&self) -> Option<RequestHandle> {
        match self {
            Request::Direct(handle) => Some(handle.clone()),
            Request::Deferred(proxy) => proxy.handle(),
        }
    }

    /// Readiness
    pub fn ready_state(&self) -> ReadyState {
        match self {
            Request::Direct(handle) => handle.ready_state(),
            Request::Deferred(proxy) => proxy.ready_state(),
        }
    }

    /// Successful output of the last settlement
    pub fn result(&self) -> Result<Option<Output>> {
        match self {
            Request::Direct(handle) => handle.result(),
            Request::Deferred(proxy) => proxy.result(),
        }
    }

    /// Error of the last settlement
    pub fn error(&self) -> Result<Option<Error>> {
        match self {
            Request::Direct(handle) => handle.error(),
            Request::Deferred(proxy) => proxy.error(),
        }
    }
}
