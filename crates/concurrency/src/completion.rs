//! Transaction completion future

use futures::channel::oneshot;
use futures::future::{self, FutureExt, LocalBoxFuture, Shared};
use linger_core::{Error, Result};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Settles with the transaction's outcome: `Ok(())` on commit,
/// `Err(Error::Aborted { .. })` on abort
///
/// Clones share one underlying future; [`crate::Transaction::completion`]
/// always hands out clones of the same one.
#[derive(Clone)]
pub struct Completion {
    inner: Shared<LocalBoxFuture<'static, Result<()>>>,
}

impl Completion {
    pub(crate) fn channel() -> (oneshot::Sender<Result<()>>, Completion) {
        let (tx, rx) = oneshot::channel();
        let inner = rx
            .map(|received| {
                received.unwrap_or_else(|_| {
                    Err(Error::InvalidState(
                        "transaction was dropped before it finished".to_string(),
                    ))
                })
            })
            .boxed_local()
            .shared();
        (tx, Completion { inner })
    }

    pub(crate) fn rejected(error: Error) -> Self {
        Completion {
            inner: future::ready(Err(error)).boxed_local().shared(),
        }
    }

    /// Check if both completions are the same future
    pub fn ptr_eq(&self, other: &Completion) -> bool {
        self.inner.ptr_eq(&other.inner)
    }

    /// Outcome, if already settled and polled
    pub fn peek(&self) -> Option<&Result<()>> {
        self.inner.peek()
    }
}

impl Future for Completion {
    type Output = Result<()>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner.poll_unpin(cx)
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion")
            .field("settled", &self.peek())
            .finish()
    }
}
