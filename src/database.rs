//! Database entry point
//!
//! A `Database` wraps a [`Backend`] and the keep-alive settings applied to
//! every transaction it opens.

use linger_concurrency::Transaction;
use linger_core::{Result, TransactionConfig, TransactionMode};
use linger_storage::Backend;
use std::fmt;
use std::rc::Rc;
use tracing::debug;

/// A store with transaction-lifetime extension
///
/// # Example
///
/// ```ignore
/// use linger::prelude::*;
///
/// let store = MemoryStore::new();
/// store.create_resource("books")?;
///
/// let db = Database::new(store.clone());
/// let tx = db.transaction(&["books"], TransactionMode::ReadWrite)?;
/// tx.object_store("books")?.put(1, json!("Dune"))?;
/// store.run_until_idle();
/// ```
#[derive(Clone)]
pub struct Database {
    backend: Rc<dyn Backend>,
    config: TransactionConfig,
}

impl Database {
    /// Wrap `backend` with default settings
    pub fn new(backend: impl Backend + 'static) -> Self {
        Self::builder().build(backend)
    }

    /// Create a builder for database configuration
    ///
    /// # Example
    ///
    /// ```ignore
    /// let db = Database::builder()
    ///     .max_probe_rounds(10_000)
    ///     .build(store.clone());
    /// ```
    pub fn builder() -> DatabaseBuilder {
        DatabaseBuilder::new()
    }

    /// Open a transaction over `scope` with the database's default settings
    pub fn transaction<S: AsRef<str>>(
        &self,
        scope: &[S],
        mode: TransactionMode,
    ) -> Result<Transaction> {
        self.transaction_with(scope, mode, self.config.clone())
    }

    /// Open a transaction with settings for this transaction only
    pub fn transaction_with<S: AsRef<str>>(
        &self,
        scope: &[S],
        mode: TransactionMode,
        config: TransactionConfig,
    ) -> Result<Transaction> {
        Transaction::begin(self.backend.clone(), scope, mode, config)
    }

    /// Default transaction settings
    pub fn config(&self) -> &TransactionConfig {
        &self.config
    }

    /// The wrapped backend
    pub fn backend(&self) -> &Rc<dyn Backend> {
        &self.backend
    }
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Builder for [`Database`]
#[derive(Debug, Clone, Default)]
pub struct DatabaseBuilder {
    config: TransactionConfig,
}

impl DatabaseBuilder {
    /// Create a builder with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace all transaction settings
    pub fn config(mut self, config: TransactionConfig) -> Self {
        self.config = config;
        self
    }

    /// Probe `resource` while extensions are pending
    ///
    /// Transactions whose scope does not include `resource` fail to open,
    /// so this suits databases where one resource is in every scope.
    pub fn probe_target(mut self, resource: impl Into<String>) -> Self {
        self.config = self.config.with_probe_target(resource);
        self
    }

    /// Abort transactions whose extension outlasts `rounds` probe rounds
    pub fn max_probe_rounds(mut self, rounds: u64) -> Self {
        self.config = self.config.with_max_probe_rounds(rounds);
        self
    }

    /// Build the database over `backend`
    pub fn build(self, backend: impl Backend + 'static) -> Database {
        debug!(config = ?self.config, "database created");
        Database {
            backend: Rc::new(backend),
            config: self.config,
        }
    }
}
