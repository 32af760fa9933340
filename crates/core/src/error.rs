//! Error types for linger
//!
//! One enum covers the three families callers care about:
//!
//! | Family | Variants | Surfaced through |
//! |--------|----------|------------------|
//! | Invalid state | `InvalidState` | synchronous return, or a rejected `extend` |
//! | Operation error | `Constraint`, `Data` | the request's future (or synchronously for malformed arguments) |
//! | Abort | `Aborted` | the transaction's completion future and discarded requests |
//!
//! The remaining variants are activity and scope failures raised by the store
//! when a request cannot be issued at all.
//!
//! `Error` is `Clone` because outcomes are fanned out through shared futures
//! and replayed to every subscriber of a request.

use thiserror::Error;

/// All linger errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The object is not in a state that allows the call
    /// (extending a committing transaction, reading an unbound proxy, ...)
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// The transaction was aborted; carries the abort reason
    #[error("transaction aborted: {reason}")]
    Aborted {
        /// Why the transaction was aborted
        reason: String,
    },

    /// The transaction exists but is not currently accepting requests
    #[error("transaction is not active")]
    TransactionInactive,

    /// The transaction has committed, is committing, or was aborted
    #[error("transaction has finished")]
    TransactionFinished,

    /// The resource is not part of the transaction's scope
    #[error("resource not in transaction scope: {0}")]
    NotInScope(String),

    /// The resource does not exist in the store
    #[error("unknown resource: {0}")]
    UnknownResource(String),

    /// A write was attempted in a read-only transaction
    #[error("read-only transaction cannot {operation} on {resource}")]
    ReadOnly {
        /// Operation name
        operation: &'static str,
        /// Target resource
        resource: String,
    },

    /// The transaction has no resources to probe, so it cannot be kept alive
    #[error("transaction scope is empty; keep-alive probing is impossible")]
    EmptyScope,

    /// Store-reported constraint failure (e.g. `add` on an existing key)
    #[error("constraint violation: {0}")]
    Constraint(String),

    /// Malformed arguments (bad key range, zero advance count, ...)
    #[error("data error: {0}")]
    Data(String),

    /// The local executor refused a task
    #[error("scheduler error: {0}")]
    Scheduler(String),

    /// Bug or invariant violation
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type for linger operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Build an [`Error::Aborted`] from anything printable.
    pub fn aborted(reason: impl std::fmt::Display) -> Self {
        Error::Aborted {
            reason: reason.to_string(),
        }
    }

    /// Check if this is an abort.
    pub fn is_abort(&self) -> bool {
        matches!(self, Error::Aborted { .. })
    }

    /// Check if this is an invalid-state error.
    pub fn is_invalid_state(&self) -> bool {
        matches!(self, Error::InvalidState(_))
    }

    /// Check if this is a store-reported operation failure.
    pub fn is_operation_error(&self) -> bool {
        matches!(self, Error::Constraint(_) | Error::Data(_))
    }

    /// Check if the store refused the request because the transaction is
    /// inactive or already finished.
    pub fn is_inactive(&self) -> bool {
        matches!(self, Error::TransactionInactive | Error::TransactionFinished)
    }

    /// The abort reason, if this is an abort.
    pub fn abort_reason(&self) -> Option<&str> {
        match self {
            Error::Aborted { reason } => Some(reason),
            _ => None,
        }
    }
}
