//! Diagnostic records: error ring entries and aggregated statistics.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::ErrorKind;
use crate::time::Timestamp;

/// One observed error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorRecord {
    pub timestamp: Timestamp,
    pub operation: String,
    pub kind: ErrorKind,
    pub message: String,
    pub context: BTreeMap<String, String>,
}

impl ErrorRecord {
    /// Key used for per-kind counters: `<operation>:<kind>`.
    #[must_use]
    pub fn count_key(&self) -> String {
        format!("{}:{}", self.operation, self.kind)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorCount {
    pub key: String,
    pub count: u64,
}

/// Snapshot of the error tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorStatistics {
    /// Records currently held in the ring.
    pub total_errors: usize,
    pub error_counts: BTreeMap<String, u64>,
    /// Newest last.
    pub recent_errors: Vec<ErrorRecord>,
    /// Errors observed within the trailing hour.
    pub error_rate: usize,
    pub most_common: Vec<ErrorCount>,
}

/// Timing aggregate for one named operation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OperationStats {
    pub count: u64,
    pub min_ms: f64,
    pub max_ms: f64,
    pub avg_ms: f64,
}
