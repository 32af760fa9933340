//! # linger
//!
//! Keeps auto-committing transactions alive across `await` points.
//!
//! Stores in the IndexedDB family commit a transaction as soon as a unit of
//! work ends with no request outstanding. Awaiting anything other than the
//! store's own requests therefore commits the transaction underneath the
//! caller. linger lets a transaction wait on arbitrary futures:
//!
//! ```ignore
//! use linger::prelude::*;
//!
//! let store = MemoryStore::new();
//! store.create_resource("prices")?;
//! let db = Database::new(store.clone());
//!
//! let tx = db.transaction(&["prices"], TransactionMode::ReadWrite)?;
//! let prices = tx.object_store("prices")?;
//! let done = tx.extend(async move {
//!     let quote = fetch_quote().await?;      // not a store request
//!     prices.put("EUR", json!(quote))?.await // deferred, then replayed
//! });
//! store.run_until_idle();
//! ```
//!
//! ## Crates
//!
//! - `linger-core`: keys, values, operations, errors, configuration
//! - `linger-storage`: the [`Backend`] trait and the in-memory [`MemoryStore`]
//! - `linger-concurrency`: the extension engine behind [`Transaction`]

#![warn(missing_docs)]

mod database;
mod object_store;
mod types;

pub mod prelude;

// Re-export main entry points
pub use database::{Database, DatabaseBuilder};
pub use object_store::{ObjectStore, Pending, TransactionExt};

// Error handling
pub use linger_core::{Error, Result};

// Re-export types
pub use types::*;
