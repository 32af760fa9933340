//! Placeholder for a request that has not been dispatched yet

use linger_core::{Error, Output, ReadyState, Result};
use linger_storage::{Listener, RequestHandle};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

enum ProxyState {
    Unbound(Vec<Listener>),
    Bound(RequestHandle),
    Failed(Error),
}

/// Stand-in returned synchronously for a deferred request
///
/// Exposes the same read/subscribe contract as [`RequestHandle`]. Until it
/// is bound, reads fail with [`Error::InvalidState`] and subscriptions are
/// recorded; binding forwards them to the real request. A proxy is bound at
/// most once. If the deferred request can never be dispatched the proxy is
/// failed instead, which delivers the error to every recorded subscriber.
#[derive(Clone)]
pub struct RequestProxy {
    state: Rc<RefCell<ProxyState>>,
}

impl RequestProxy {
    pub(crate) fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(ProxyState::Unbound(Vec::new()))),
        }
    }

    /// Attach the real request and forward recorded subscriptions
    pub fn bind(&self, handle: RequestHandle) -> Result<()> {
        let previous = {
            let mut state = self.state.borrow_mut();
            if !matches!(*state, ProxyState::Unbound(_)) {
                return Err(Error::InvalidState(
                    "request proxy is already bound".to_string(),
                ));
            }
            std::mem::replace(&mut *state, ProxyState::Bound(handle.clone()))
        };
        if let ProxyState::Unbound(listeners) = previous {
            for listener in listeners {
                handle.subscribe(listener);
            }
        }
        Ok(())
    }

    /// Give up on the deferred request, notifying recorded subscribers
    pub(crate) fn fail(&self, error: Error) {
        let previous = {
            let mut state = self.state.borrow_mut();
            if !matches!(*state, ProxyState::Unbound(_)) {
                return;
            }
            std::mem::replace(&mut *state, ProxyState::Failed(error.clone()))
        };
        if let ProxyState::Unbound(listeners) = previous {
            let outcome = Err(error);
            for mut listener in listeners {
                listener(&outcome);
            }
        }
    }

    /// Subscribe to settlements of the eventual request
    pub fn subscribe(&self, mut listener: Listener) {
        let target = {
            let mut state = self.state.borrow_mut();
            match &mut *state {
                ProxyState::Unbound(pending) => {
                    pending.push(listener);
                    return;
                }
                ProxyState::Bound(handle) => Ok(handle.clone()),
                ProxyState::Failed(error) => Err(error.clone()),
            }
        };
        match target {
            Ok(handle) => handle.subscribe(listener),
            Err(error) => {
                listener(&Err(error));
            }
        }
    }

    /// Check if the real request is attached
    pub fn is_bound(&self) -> bool {
        matches!(*self.state.borrow(), ProxyState::Bound(_))
    }

    /// The real request, once bound
    pub fn handle(&self) -> Option<RequestHandle> {
        match &*self.state.borrow() {
            ProxyState::Bound(handle) => Some(handle.clone()),
            _ => None,
        }
    }

    /// Subscriptions waiting for the proxy to be bound
    pub fn pending_subscriptions(&self) -> usize {
        match &*self.state.borrow() {
            ProxyState::Unbound(pending) => pending.len(),
            _ => 0,
        }
    }

    /// Readiness of the eventual request
    pub fn ready_state(&self) -> ReadyState {
        match &*self.state.borrow() {
            ProxyState::Unbound(_) => ReadyState::Pending,
            ProxyState::Bound(handle) => handle.ready_state(),
            ProxyState::Failed(_) => ReadyState::Done,
        }
    }

    /// Successful output; [`Error::InvalidState`] while unbound
    pub fn result(&self) -> Result<Option<Output>> {
        match &*self.state.borrow() {
            ProxyState::Unbound(_) => Err(unbound("result")),
            ProxyState::Bound(handle) => handle.result(),
            ProxyState::Failed(_) => Ok(None),
        }
    }

    /// Error; [`Error::InvalidState`] while unbound
    pub fn error(&self) -> Result<Option<Error>> {
        match &*self.state.borrow() {
            ProxyState::Unbound(_) => Err(unbound("error")),
            ProxyState::Bound(handle) => handle.error(),
            ProxyState::Failed(error) => Ok(Some(error.clone())),
        }
    }
}

fn unbound(what: &str) -> Error {
    Error::InvalidState(format!(
        "request is deferred; its {} is not available until it is dispatched",
        what
    ))
}

impl fmt::Debug for RequestProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.state.borrow() {
            ProxyState::Unbound(pending) => f
                .debug_struct("RequestProxy")
                .field("bound", &false)
                .field("pending_subscriptions", &pending.len())
                .finish(),
            ProxyState::Bound(handle) => f
                .debug_struct("RequestProxy")
                .field("bound", handle)
                .finish(),
            ProxyState::Failed(error) => f
                .debug_struct("RequestProxy")
                .field("failed", error)
                .finish(),
        }
    }
}
