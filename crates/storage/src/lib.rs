//! Storage layer for linger
//!
//! This crate defines the boundary between the transaction-extension engine
//! and the store it runs on:
//! - [`Backend`]: the operations the engine consumes (open, issue, step,
//!   probe, abort, finish signal) plus a local spawner
//! - [`RequestHandle`]: a request whose outcome arrives on a later turn
//! - [`MemoryStore`]: an in-memory reference backend with its own
//!   cooperative scheduler (macrotask queue + microtask pool)

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
mod cursor;
pub mod memory;
pub mod request;
mod scheduler;

pub use backend::{Backend, BackendExt, FinishCallback, TxnId};
pub use memory::{MemoryStore, Sleep};
pub use request::{Listen, Listener, Outcome, RequestHandle, RequestId, WeakRequestHandle};
