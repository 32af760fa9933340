//! Core types
//!
//! - [`Key`]: ordered primary key of a record
//! - [`KeyRange`]: bounded interval over keys
//! - [`TransactionMode`]: what a transaction may do
//! - [`TxnState`]: externally visible transaction state
//! - [`ReadyState`]: readiness of a single request

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::ops::Bound;

/// Stored value type.
pub type Value = serde_json::Value;

/// Primary key of a record
///
/// Integer keys sort before text keys; within a variant the natural order
/// applies.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Key {
    /// Integer key
    Int(i64),
    /// Text key
    Text(String),
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Int(i) => write!(f, "{}", i),
            Key::Text(s) => write!(f, "{:?}", s),
        }
    }
}

impl From<i64> for Key {
    fn from(i: i64) -> Self {
        Key::Int(i)
    }
}

impl From<i32> for Key {
    fn from(i: i32) -> Self {
        Key::Int(i64::from(i))
    }
}

impl From<u32> for Key {
    fn from(i: u32) -> Self {
        Key::Int(i64::from(i))
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key::Text(s.to_string())
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Key::Text(s)
    }
}

/// Interval over keys, used by `get_all`, `count`, `delete` and cursors
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRange {
    lower: Bound<Key>,
    upper: Bound<Key>,
}

impl KeyRange {
    /// Range covering every key
    pub fn all() -> Self {
        Self {
            lower: Bound::Unbounded,
            upper: Bound::Unbounded,
        }
    }

    /// Range covering exactly one key
    pub fn only(key: impl Into<Key>) -> Self {
        let key = key.into();
        Self {
            lower: Bound::Included(key.clone()),
            upper: Bound::Included(key),
        }
    }

    /// Keys at or above (`open == false`) or strictly above `key`
    pub fn lower_bound(key: impl Into<Key>, open: bool) -> Self {
        Self {
            lower: bound(key.into(), open),
            upper: Bound::Unbounded,
        }
    }

    /// Keys at or below (`open == false`) or strictly below `key`
    pub fn upper_bound(key: impl Into<Key>, open: bool) -> Self {
        Self {
            lower: Bound::Unbounded,
            upper: bound(key.into(), open),
        }
    }

    /// Keys between `lower` and `upper`
    ///
    /// The range is not validated here; the store rejects malformed ranges
    /// with [`crate::Error::Data`] when the request is issued.
    pub fn bound(
        lower: impl Into<Key>,
        upper: impl Into<Key>,
        lower_open: bool,
        upper_open: bool,
    ) -> Self {
        Self {
            lower: bound(lower.into(), lower_open),
            upper: bound(upper.into(), upper_open),
        }
    }

    /// Lower bound
    pub fn lower(&self) -> Bound<&Key> {
        self.lower.as_ref()
    }

    /// Upper bound
    pub fn upper(&self) -> Bound<&Key> {
        self.upper.as_ref()
    }

    /// Check whether `key` falls inside the range
    pub fn contains(&self, key: &Key) -> bool {
        let above = match &self.lower {
            Bound::Included(l) => key >= l,
            Bound::Excluded(l) => key > l,
            Bound::Unbounded => true,
        };
        let below = match &self.upper {
            Bound::Included(u) => key <= u,
            Bound::Excluded(u) => key < u,
            Bound::Unbounded => true,
        };
        above && below
    }

    /// A range is well formed when `lower <= upper`, and when the two are
    /// equal both ends are inclusive.
    pub fn is_well_formed(&self) -> bool {
        let (l, l_open) = match &self.lower {
            Bound::Included(k) => (k, false),
            Bound::Excluded(k) => (k, true),
            Bound::Unbounded => return true,
        };
        let (u, u_open) = match &self.upper {
            Bound::Included(k) => (k, false),
            Bound::Excluded(k) => (k, true),
            Bound::Unbounded => return true,
        };
        match l.cmp(u) {
            Ordering::Less => true,
            Ordering::Equal => !l_open && !u_open,
            Ordering::Greater => false,
        }
    }
}

impl Default for KeyRange {
    fn default() -> Self {
        Self::all()
    }
}

impl From<Key> for KeyRange {
    fn from(key: Key) -> Self {
        KeyRange::only(key)
    }
}

fn bound(key: Key, open: bool) -> Bound<Key> {
    if open {
        Bound::Excluded(key)
    } else {
        Bound::Included(key)
    }
}

/// Cursor iteration direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Direction {
    /// Ascending key order
    #[default]
    Next,
    /// Descending key order
    Prev,
}

/// What a transaction is allowed to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionMode {
    /// Reads only
    ReadOnly,
    /// Reads and writes
    ReadWrite,
    /// Reads and writes with the store otherwise locked; may have an empty
    /// scope while setting the store up
    Exclusive,
}

impl TransactionMode {
    /// Check if writes are allowed
    pub fn is_writable(&self) -> bool {
        !matches!(self, TransactionMode::ReadOnly)
    }
}

impl fmt::Display for TransactionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionMode::ReadOnly => write!(f, "readonly"),
            TransactionMode::ReadWrite => write!(f, "readwrite"),
            TransactionMode::Exclusive => write!(f, "exclusive"),
        }
    }
}

/// Transaction state as observed by callers
///
/// ```text
/// Active ⇄ Inactive ──► Committing ──► Finished
///    │         │             ▲             ▲
///    └──► Waiting ───────────┘─────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TxnState {
    /// Requests may be issued right now
    Active,
    /// Between units of work; requests would be refused
    Inactive,
    /// An extension is in effect; requests are deferred
    Waiting,
    /// Commit has been decided and is in flight
    Committing,
    /// Committed or aborted (terminal)
    Finished,
}

impl TxnState {
    /// Check if this state is terminal
    pub fn is_terminal(&self) -> bool {
        matches!(self, TxnState::Finished)
    }

    /// Check if `extend` is accepted in this state
    pub fn accepts_extension(&self) -> bool {
        matches!(
            self,
            TxnState::Active | TxnState::Inactive | TxnState::Waiting
        )
    }
}

impl fmt::Display for TxnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TxnState::Active => "active",
            TxnState::Inactive => "inactive",
            TxnState::Waiting => "waiting",
            TxnState::Committing => "committing",
            TxnState::Finished => "finished",
        };
        f.write_str(name)
    }
}

/// Readiness of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadyState {
    /// No outcome yet
    Pending,
    /// An outcome has been delivered
    Done,
}
