//! Core types for linger
//!
//! This crate defines the vocabulary shared by the storage backend and the
//! transaction-extension engine:
//! - [`Key`], [`KeyRange`], [`Value`]: what the store holds
//! - [`Operation`], [`CursorStep`], [`Output`]: what a request asks and returns
//! - [`TransactionMode`], [`TxnState`], [`ReadyState`]: lifecycle enums
//! - [`TransactionConfig`]: per-transaction keep-alive settings
//! - [`Error`]: the error taxonomy

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod operation;
pub mod types;

pub use config::TransactionConfig;
pub use error::{Error, Result};
pub use operation::{CursorRecord, CursorStep, Operation, Output};
pub use types::{Direction, Key, KeyRange, ReadyState, TransactionMode, TxnState, Value};
