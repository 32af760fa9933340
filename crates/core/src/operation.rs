//! Operations and their outputs
//!
//! An [`Operation`] is the captured form of a call against one resource.
//! Capturing calls as data (rather than invoking them) is what lets the
//! engine defer them and replay them later in submission order.

use crate::types::{Direction, Key, KeyRange, Value};
use crate::{Error, Result};

/// A request against one resource of a transaction's scope
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    /// Read one record
    Get {
        /// Key to read
        key: Key,
    },
    /// Read every value in a range, optionally capped
    GetAll {
        /// Keys to read
        range: KeyRange,
        /// Maximum number of values returned
        limit: Option<usize>,
    },
    /// Insert or overwrite a record
    Put {
        /// Record key
        key: Key,
        /// Record value
        value: Value,
    },
    /// Insert a record; fails with a constraint error if the key exists
    Add {
        /// Record key
        key: Key,
        /// Record value
        value: Value,
    },
    /// Remove every record in a range
    Delete {
        /// Keys to remove
        range: KeyRange,
    },
    /// Remove every record
    Clear,
    /// Count records in a range
    Count {
        /// Keys to count
        range: KeyRange,
    },
    /// Open a cursor positioned on the first record of the range
    OpenCursor {
        /// Keys to iterate
        range: KeyRange,
        /// Iteration order
        direction: Direction,
    },
}

impl Operation {
    /// Short name used in logs and errors
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Get { .. } => "get",
            Operation::GetAll { .. } => "get_all",
            Operation::Put { .. } => "put",
            Operation::Add { .. } => "add",
            Operation::Delete { .. } => "delete",
            Operation::Clear => "clear",
            Operation::Count { .. } => "count",
            Operation::OpenCursor { .. } => "open_cursor",
        }
    }

    /// Check if the operation mutates the resource
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            Operation::Put { .. } | Operation::Add { .. } | Operation::Delete { .. } | Operation::Clear
        )
    }

    /// Key range the operation reads or writes, if it takes one
    pub fn range(&self) -> Option<&KeyRange> {
        match self {
            Operation::GetAll { range, .. }
            | Operation::Delete { range }
            | Operation::Count { range }
            | Operation::OpenCursor { range, .. } => Some(range),
            _ => None,
        }
    }
}

/// Movement of an open cursor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CursorStep {
    /// Skip `n` records; `n` must be positive
    Advance(u32),
    /// Move to the first record at or past `key` in the cursor's direction
    ContinueTo(Key),
}

impl CursorStep {
    /// Short name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            CursorStep::Advance(_) => "advance",
            CursorStep::ContinueTo(_) => "continue_to",
        }
    }
}

/// Record a cursor is positioned on
#[derive(Debug, Clone, PartialEq)]
pub struct CursorRecord {
    /// Record key
    pub key: Key,
    /// Record value
    pub value: Value,
}

/// Successful result of a request
#[derive(Debug, Clone, PartialEq)]
pub enum Output {
    /// No payload (delete, clear, probe)
    Unit,
    /// A single value, `None` if the key was absent
    Value(Option<Value>),
    /// The key written by `put`/`add`
    Key(Key),
    /// A record count
    Count(u64),
    /// Values read by `get_all`
    Values(Vec<Value>),
    /// Current cursor record, `None` once the cursor is exhausted
    Cursor(Option<CursorRecord>),
}

impl Output {
    /// Variant name used in errors
    pub fn kind(&self) -> &'static str {
        match self {
            Output::Unit => "unit",
            Output::Value(_) => "value",
            Output::Key(_) => "key",
            Output::Count(_) => "count",
            Output::Values(_) => "values",
            Output::Cursor(_) => "cursor",
        }
    }

    /// Extract a single value
    pub fn into_value(self) -> Result<Option<Value>> {
        match self {
            Output::Value(v) => Ok(v),
            other => Err(unexpected("value", &other)),
        }
    }

    /// Extract a written key
    pub fn into_key(self) -> Result<Key> {
        match self {
            Output::Key(k) => Ok(k),
            other => Err(unexpected("key", &other)),
        }
    }

    /// Extract a count
    pub fn into_count(self) -> Result<u64> {
        match self {
            Output::Count(n) => Ok(n),
            other => Err(unexpected("count", &other)),
        }
    }

    /// Extract values
    pub fn into_values(self) -> Result<Vec<Value>> {
        match self {
            Output::Values(v) => Ok(v),
            other => Err(unexpected("values", &other)),
        }
    }

    /// Extract a cursor record
    pub fn into_cursor(self) -> Result<Option<CursorRecord>> {
        match self {
            Output::Cursor(r) => Ok(r),
            other => Err(unexpected("cursor", &other)),
        }
    }

    /// Expect no payload
    pub fn into_unit(self) -> Result<()> {
        match self {
            Output::Unit => Ok(()),
            other => Err(unexpected("unit", &other)),
        }
    }
}

fn unexpected(expected: &str, actual: &Output) -> Error {
    Error::Internal(format!(
        "expected {} output, got {}",
        expected,
        actual.kind()
    ))
}
