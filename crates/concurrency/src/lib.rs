//! Transaction-lifetime extension for auto-committing stores
//!
//! A store that commits a transaction as soon as a unit of work ends with
//! nothing outstanding cannot wait for `await`s on unrelated futures. This
//! crate keeps such a transaction alive on demand:
//! - [`Transaction`]: the state machine deciding, per call, whether to
//!   dispatch directly or defer, and driving commit/abort
//! - keep-alive probing: back-to-back no-op requests issued while an
//!   extension is pending, so the store never sees an idle transaction
//! - a deferred queue: requests made while waiting are captured, answered
//!   with a [`RequestProxy`], and replayed in order from the probe callback
//! - [`RequestFuture`]: first-signal-only future over a request
//! - [`Cursor`]: cursor steps bound to the request that opened the cursor
//!
//! # Example
//!
//! ```ignore
//! let tx = Transaction::begin(backend, &["books"], TransactionMode::ReadWrite, config)?;
//! let done = tx.extend({
//!     let tx = tx.clone();
//!     async move {
//!         let price = fetch_price().await?;          // transaction would have committed here
//!         tx.issue("books", Operation::Put { key, value: price })?.completion().await
//!     }
//! });
//! done.await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapter;
pub mod completion;
pub mod cursor;
pub mod proxy;
mod queue;
pub mod request;
mod spinner;
pub mod transaction;

pub use adapter::RequestFuture;
pub use completion::Completion;
pub use cursor::{Cursor, CursorStepFuture};
pub use proxy::RequestProxy;
pub use request::Request;
pub use transaction::Transaction;
