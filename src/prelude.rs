//! Convenient imports for linger
//!
//! ```ignore
//! use linger::prelude::*;
//!
//! let db = Database::new(MemoryStore::new());
//! let tx = db.transaction(&["books"], TransactionMode::ReadWrite)?;
//! ```

// Main entry point
pub use crate::database::{Database, DatabaseBuilder};
pub use crate::object_store::{ObjectStore, Pending, TransactionExt};

// Error handling
pub use linger_core::{Error, Result};

// Core types
pub use crate::types::{
    Completion, Cursor, Direction, Key, KeyRange, MemoryStore, TransactionConfig,
    TransactionMode, Transaction, TxnState, Value,
};

// Re-export serde_json for convenience
pub use serde_json::json;
