//! Request handles
//!
//! A [`RequestHandle`] is returned synchronously when a request is issued and
//! settled on a later turn. Subscribers are called on every settlement, so a
//! handle that is reused (cursor steps) can deliver more than one outcome;
//! a listener that only wants the first one returns [`Listen::Stop`].

use linger_core::{Error, Output, ReadyState, Result};
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::backend::TxnId;

/// Outcome delivered to subscribers
pub type Outcome = Result<Output>;

/// Whether a listener wants further outcomes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Listen {
    /// Stay subscribed
    Keep,
    /// Unsubscribe after this call
    Stop,
}

/// Settlement listener
pub type Listener = Box<dyn FnMut(&Outcome) -> Listen>;

/// Unique request identifier within a store
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "req-{}", self.0)
    }
}

struct Slot {
    ready: ReadyState,
    outcome: Option<Outcome>,
}

struct RequestInner {
    id: RequestId,
    txn: TxnId,
    source: String,
    slot: RefCell<Slot>,
    listeners: RefCell<Vec<Listener>>,
}

/// A request issued against one resource of one transaction
///
/// Cloning is cheap and yields the same request.
#[derive(Clone)]
pub struct RequestHandle {
    inner: Rc<RequestInner>,
}

impl RequestHandle {
    /// Create a pending request. Called by backends when a request is issued.
    pub fn new(id: RequestId, txn: TxnId, source: impl Into<String>) -> Self {
        Self {
            inner: Rc::new(RequestInner {
                id,
                txn,
                source: source.into(),
                slot: RefCell::new(Slot {
                    ready: ReadyState::Pending,
                    outcome: None,
                }),
                listeners: RefCell::new(Vec::new()),
            }),
        }
    }

    /// Request identifier
    pub fn id(&self) -> RequestId {
        self.inner.id
    }

    /// Owning transaction
    pub fn txn(&self) -> TxnId {
        self.inner.txn
    }

    /// Resource the request targets
    pub fn source(&self) -> &str {
        &self.inner.source
    }

    /// Current readiness
    pub fn ready_state(&self) -> ReadyState {
        self.inner.slot.borrow().ready
    }

    /// Successful output of the last settlement
    ///
    /// Fails with [`Error::InvalidState`] while pending; `None` if the request
    /// failed.
    pub fn result(&self) -> Result<Option<Output>> {
        let slot = self.inner.slot.borrow();
        match slot.ready {
            ReadyState::Pending => Err(Error::InvalidState(format!(
                "{} is still pending; its result is not available",
                self.inner.id
            ))),
            ReadyState::Done => Ok(slot.outcome.as_ref().and_then(|o| o.as_ref().ok().cloned())),
        }
    }

    /// Error of the last settlement
    ///
    /// Fails with [`Error::InvalidState`] while pending; `None` if the request
    /// succeeded.
    pub fn error(&self) -> Result<Option<Error>> {
        let slot = self.inner.slot.borrow();
        match slot.ready {
            ReadyState::Pending => Err(Error::InvalidState(format!(
                "{} is still pending; its error is not available",
                self.inner.id
            ))),
            ReadyState::Done => Ok(slot
                .outcome
                .as_ref()
                .and_then(|o| o.as_ref().err().cloned())),
        }
    }

    /// Subscribe to settlements
    pub fn subscribe(&self, listener: Listener) {
        self.inner.listeners.borrow_mut().push(listener);
    }

    /// Number of live subscriptions
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.borrow().len()
    }

    /// Put the request back into `Pending` so it can be settled again
    pub fn reset(&self) {
        let mut slot = self.inner.slot.borrow_mut();
        slot.ready = ReadyState::Pending;
        slot.outcome = None;
    }

    /// Record an outcome and notify subscribers
    ///
    /// Listeners run with no internal borrow held, so they may subscribe,
    /// read the result, or reset the handle.
    pub fn settle(&self, outcome: Outcome) {
        {
            let mut slot = self.inner.slot.borrow_mut();
            slot.ready = ReadyState::Done;
            slot.outcome = Some(outcome.clone());
        }

        let mut current = std::mem::take(&mut *self.inner.listeners.borrow_mut());
        current.retain_mut(|listener| listener(&outcome) == Listen::Keep);

        // Subscriptions made during notification go after the survivors.
        let mut listeners = self.inner.listeners.borrow_mut();
        let added = std::mem::replace(&mut *listeners, current);
        listeners.extend(added);
    }

    /// Non-owning reference
    pub fn downgrade(&self) -> WeakRequestHandle {
        WeakRequestHandle {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Check if both handles are the same request
    pub fn ptr_eq(&self, other: &RequestHandle) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for RequestHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestHandle")
            .field("id", &self.inner.id)
            .field("txn", &self.inner.txn)
            .field("source", &self.inner.source)
            .field("ready", &self.ready_state())
            .finish()
    }
}

/// Non-owning reference to a [`RequestHandle`]
#[derive(Clone)]
pub struct WeakRequestHandle {
    inner: Weak<RequestInner>,
}

impl WeakRequestHandle {
    /// The request, if it is still alive
    pub fn upgrade(&self) -> Option<RequestHandle> {
        self.inner.upgrade().map(|inner| RequestHandle { inner })
    }
}

impl fmt::Debug for WeakRequestHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.upgrade() {
            Some(handle) => write!(f, "WeakRequestHandle({})", handle.id()),
            None => write!(f, "WeakRequestHandle(<dropped>)"),
        }
    }
}
