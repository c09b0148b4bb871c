//! Error tracking, operation timing and retry policy.
//!
//! A [`Diagnostics`] context is built explicitly and handed to the engine;
//! nothing here is process-global.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use irrigo_domain::diagnostics::{ErrorCount, ErrorRecord, ErrorStatistics, OperationStats};
use irrigo_domain::error::{ErrorKind, IrrigoError};
use irrigo_domain::time::Timestamp;

/// Default size of the error ring.
pub const DEFAULT_ERROR_CAPACITY: usize = 50;

const RECENT_ERRORS: usize = 10;
const MOST_COMMON: usize = 5;

#[derive(Debug, Default)]
struct ErrorLog {
    records: VecDeque<ErrorRecord>,
    counts: HashMap<String, u64>,
}

/// Bounded ring of recent errors plus per `operation:kind` counters.
#[derive(Debug)]
pub struct ErrorTracker {
    capacity: usize,
    log: Mutex<ErrorLog>,
}

impl ErrorTracker {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            log: Mutex::default(),
        }
    }

    pub fn record(
        &self,
        operation: &str,
        error: &IrrigoError,
        context: BTreeMap<String, String>,
        at: Timestamp,
    ) {
        let record = ErrorRecord {
            timestamp: at,
            operation: operation.to_string(),
            kind: error.kind(),
            message: error.to_string(),
            context,
        };
        tracing::error!(
            operation,
            kind = %record.kind,
            error = %record.message,
            "operation failed"
        );

        let mut log = self.lock();
        *log.counts.entry(record.count_key()).or_insert(0) += 1;
        if log.records.len() == self.capacity {
            log.records.pop_front();
        }
        log.records.push_back(record);
    }

    #[must_use]
    pub fn statistics(&self, now: Timestamp) -> ErrorStatistics {
        let log = self.lock();
        let hour_ago = now - chrono::Duration::hours(1);

        let mut most_common: Vec<ErrorCount> = log
            .counts
            .iter()
            .map(|(key, count)| ErrorCount {
                key: key.clone(),
                count: *count,
            })
            .collect();
        most_common.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.key.cmp(&b.key)));
        most_common.truncate(MOST_COMMON);

        ErrorStatistics {
            total_errors: log.records.len(),
            error_counts: log
                .counts
                .iter()
                .map(|(key, count)| (key.clone(), *count))
                .collect(),
            recent_errors: log
                .records
                .iter()
                .skip(log.records.len().saturating_sub(RECENT_ERRORS))
                .cloned()
                .collect(),
            error_rate: log
                .records
                .iter()
                .filter(|record| record.timestamp > hour_ago)
                .count(),
            most_common,
        }
    }

    pub fn clear(&self) {
        let mut log = self.lock();
        log.records.clear();
        log.counts.clear();
    }

    fn lock(&self) -> MutexGuard<'_, ErrorLog> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug, Clone, Copy)]
struct Timing {
    count: u64,
    min: Duration,
    max: Duration,
    total: Duration,
}

/// Min/max/average duration of named operations.
#[derive(Debug, Default)]
pub struct PerformanceTracker {
    timings: Mutex<HashMap<&'static str, Timing>>,
}

impl PerformanceTracker {
    pub fn record(&self, operation: &'static str, elapsed: Duration) {
        let mut timings = self.timings.lock().unwrap_or_else(PoisonError::into_inner);
        timings
            .entry(operation)
            .and_modify(|timing| {
                timing.count += 1;
                timing.min = timing.min.min(elapsed);
                timing.max = timing.max.max(elapsed);
                timing.total += elapsed;
            })
            .or_insert(Timing {
                count: 1,
                min: elapsed,
                max: elapsed,
                total: elapsed,
            });
        tracing::debug!(operation, elapsed_ms = elapsed.as_millis(), "operation timed");
    }

    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn stats(&self) -> BTreeMap<String, OperationStats> {
        let timings = self.timings.lock().unwrap_or_else(PoisonError::into_inner);
        timings
            .iter()
            .map(|(operation, timing)| {
                let total_ms = timing.total.as_secs_f64() * 1000.0;
                (
                    (*operation).to_string(),
                    OperationStats {
                        count: timing.count,
                        min_ms: timing.min.as_secs_f64() * 1000.0,
                        max_ms: timing.max.as_secs_f64() * 1000.0,
                        avg_ms: total_ms / timing.count as f64,
                    },
                )
            })
            .collect()
    }
}

/// Exponential backoff for recoverable errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_attempts: 3,
        }
    }
}

impl RetryPolicy {
    /// Whether attempt number `attempt` (starting at 1) may run for `kind`.
    #[must_use]
    pub fn should_retry(&self, kind: ErrorKind, attempt: u32) -> bool {
        kind.is_recoverable() && attempt <= self.max_attempts
    }

    /// `min(base * 2^attempt, cap)`.
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }
}

/// Explicitly constructed diagnostics context shared by the engine.
#[derive(Debug)]
pub struct Diagnostics {
    pub errors: ErrorTracker,
    pub performance: PerformanceTracker,
}

impl Diagnostics {
    #[must_use]
    pub fn new(error_capacity: usize) -> Self {
        Self {
            errors: ErrorTracker::new(error_capacity),
            performance: PerformanceTracker::default(),
        }
    }
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::new(DEFAULT_ERROR_CAPACITY)
    }
}
