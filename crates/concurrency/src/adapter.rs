//! Single-resolution future over a request

use futures::channel::oneshot;
use linger_core::{Error, Output, Result};
use linger_storage::{Listen, Outcome};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll};

use crate::request::Request;

static NEXT_ADAPTER: AtomicU64 = AtomicU64::new(1);

/// Future resolving with the first outcome a request delivers after the
/// future was created
///
/// Requests that settle more than once (cursor steps) need a new
/// `RequestFuture` per settlement.
#[derive(Debug)]
pub struct RequestFuture {
    id: u64,
    rx: oneshot::Receiver<Outcome>,
}

impl RequestFuture {
    /// Subscribe to the next outcome of `request`
    ///
    /// Works on unbound proxies too: the subscription is replayed onto the
    /// real request when the proxy is bound.
    pub fn new(request: &Request) -> Self {
        let (tx, rx) = oneshot::channel();
        let mut tx = Some(tx);
        request.subscribe(Box::new(move |outcome| {
            if let Some(tx) = tx.take() {
                let _ = tx.send(outcome.clone());
            }
            Listen::Stop
        }));
        Self {
            id: NEXT_ADAPTER.fetch_add(1, Ordering::Relaxed),
            rx,
        }
    }

    /// Process-unique identifier of this future
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Future for RequestFuture {
    type Output = Result<Output>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx).map(|received| match received {
            Ok(outcome) => outcome,
            Err(oneshot::Canceled) => Err(Error::InvalidState(
                "request was dropped before it settled".to_string(),
            )),
        })
    }
}
