//! Public types for the linger API
//!
//! Re-exported from the internal crates with a flat namespace.

// Keys, values, ranges
pub use linger_core::{Direction, Key, KeyRange, Value};

// Operations and their results
pub use linger_core::{CursorRecord, CursorStep, Operation, Output};

// Transactions
pub use linger_core::{ReadyState, TransactionConfig, TransactionMode, TxnState};

// Backend seam
pub use linger_storage::{
    Backend, FinishCallback, Listen, Listener, Outcome, RequestHandle, RequestId, TxnId,
};

// Reference backend
pub use linger_storage::{MemoryStore, Sleep};

// Engine
pub use linger_concurrency::{
    Completion, Cursor, CursorStepFuture, Request, RequestFuture, RequestProxy, Transaction,
};
