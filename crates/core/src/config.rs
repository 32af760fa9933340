//! Per-transaction keep-alive configuration
//!
//! Defaults reproduce the unbounded behavior: probing continues for as long
//! as an extension is pending and the first scope resource is probed.
//!
//! ```ignore
//! let config = TransactionConfig::default()
//!     .with_probe_target("settings")
//!     .with_max_probe_rounds(10_000);
//! ```

use serde::Deserialize;

/// Keep-alive settings applied when a transaction is opened
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TransactionConfig {
    /// Resource used for keep-alive probes. Must be in scope; defaults to the
    /// first scope resource.
    pub probe_target: Option<String>,

    /// Abort the transaction after this many probe rounds while an extension
    /// is still pending. `None` keeps probing until the extension settles.
    pub max_probe_rounds: Option<u64>,
}

impl TransactionConfig {
    /// Probe `resource` instead of the first scope resource
    pub fn with_probe_target(mut self, resource: impl Into<String>) -> Self {
        self.probe_target = Some(resource.into());
        self
    }

    /// Abort after `rounds` probe rounds
    pub fn with_max_probe_rounds(mut self, rounds: u64) -> Self {
        self.max_probe_rounds = Some(rounds);
        self
    }
}
