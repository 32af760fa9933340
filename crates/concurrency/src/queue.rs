//! FIFO of requests captured while a transaction waits on an extension

use linger_core::{CursorStep, Operation, Result};
use linger_storage::{Backend, RequestHandle, TxnId};
use std::collections::VecDeque;

use crate::proxy::RequestProxy;

/// What to dispatch on replay
pub(crate) enum Deferred {
    Issue(Operation),
    Step {
        request: RequestHandle,
        step: CursorStep,
    },
}

pub(crate) struct DeferredOperation {
    pub(crate) seq: u64,
    pub(crate) target: String,
    pub(crate) deferred: Deferred,
    pub(crate) proxy: RequestProxy,
}

impl DeferredOperation {
    pub(crate) fn name(&self) -> &'static str {
        match &self.deferred {
            Deferred::Issue(operation) => operation.name(),
            Deferred::Step { step, .. } => step.name(),
        }
    }

    /// Send the captured call to the backend
    ///
    /// Hands back the proxy so the caller can bind or fail it.
    pub(crate) fn dispatch(
        self,
        backend: &dyn Backend,
        txn: TxnId,
    ) -> (RequestProxy, Result<RequestHandle>) {
        let dispatched = match self.deferred {
            Deferred::Issue(operation) => backend.issue(txn, &self.target, operation),
            Deferred::Step { request, step } => {
                backend.step(txn, &request, step).map(|()| request)
            }
        };
        (self.proxy, dispatched)
    }
}

/// Deferred requests in arrival order
#[derive(Default)]
pub(crate) struct DeferredQueue {
    entries: VecDeque<DeferredOperation>,
    next_seq: u64,
}

impl DeferredQueue {
    /// Capture a call and return the proxy standing in for it
    pub(crate) fn push(&mut self, target: &str, deferred: Deferred) -> RequestProxy {
        let proxy = RequestProxy::new();
        self.entries.push_back(DeferredOperation {
            seq: self.next_seq,
            target: target.to_string(),
            deferred,
            proxy: proxy.clone(),
        });
        self.next_seq += 1;
        proxy
    }

    /// Remove every entry, oldest first
    pub(crate) fn take_all(&mut self) -> VecDeque<DeferredOperation> {
        std::mem::take(&mut self.entries)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
