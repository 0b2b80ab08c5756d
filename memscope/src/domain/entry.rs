//! Profile entries and the content address of their logs.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// One probed call: memory before and after, when it started, and the
/// per-statement trace captured while it ran.
///
/// `mem_diff` is always `mem_after - mem_before`; constructors maintain
/// that, consumers may rely on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileEntry {
    /// Qualified function name, e.g. `outer.inner`.
    pub func: String,
    /// Resident set size before the call, in MiB.
    pub mem_before: f64,
    /// Resident set size after the call, in MiB.
    pub mem_after: f64,
    /// Net change in MiB.
    pub mem_diff: f64,
    /// Seconds since the Unix epoch when the call started.
    pub timestamp: f64,
    /// Statement trace; empty when sampling produced no detail.
    pub log: String,
}

impl ProfileEntry {
    pub fn new(
        func: impl Into<String>,
        mem_before: f64,
        mem_after: f64,
        timestamp: f64,
        log: String,
    ) -> Self {
        Self {
            func: func.into(),
            mem_before,
            mem_after,
            mem_diff: mem_after - mem_before,
            timestamp,
            log,
        }
    }

    /// Content address of the log text, shared by identical logs.
    pub fn log_hash(&self) -> String {
        hash_log(&self.log)
    }
}

/// Lowercase hex SHA-256 of `text`.
pub fn hash_log(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    digest.iter().map(|byte| format!("{byte:02x}")).collect()
}
