//! Operation statistics for operators.

use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

/// Smoothing factor of the execution-time moving average.
pub const EWMA_ALPHA: f64 = 0.1;

/// Outcome classes counted by [`StatsRecorder::record`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Timeout,
    Error,
}

/// The most recent rejected operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockedOperation {
    pub operation: String,
    pub subject: String,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

/// What a rejection was about, for the per-cause counters.
#[derive(Debug, Clone, Default)]
pub struct BlockReport {
    pub operation: String,
    pub subject: String,
    pub reason: String,
    pub symlink: bool,
    pub invalid_path: bool,
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationStats {
    pub total_operations: u64,
    pub timeout_operations: u64,
    pub error_operations: u64,
    pub blocked_operations: u64,
    pub symlink_attempts: u64,
    pub invalid_path_attempts: u64,
    /// Exponentially weighted average, milliseconds.
    pub average_execution_time: f64,
    pub failure_rate: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_blocked_operation: Option<BlockedOperation>,
}

#[derive(Debug, Default)]
struct Counters {
    total: u64,
    timeouts: u64,
    errors: u64,
    blocked: u64,
    symlink_attempts: u64,
    invalid_path_attempts: u64,
    average_ms: f64,
    last_blocked: Option<BlockedOperation>,
}

/// Thread-safe statistics owned by one protector.
#[derive(Debug, Default)]
pub struct StatsRecorder {
    inner: Mutex<Counters>,
}

impl StatsRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count an executed operation and fold its duration into the average.
    pub fn record(&self, elapsed: Duration, outcome: Outcome) {
        let sample = elapsed.as_secs_f64() * 1000.0;
        let mut c = self.inner.lock();
        c.total += 1;
        match outcome {
            Outcome::Success => {}
            Outcome::Timeout => c.timeouts += 1,
            Outcome::Error => c.errors += 1,
        }
        c.average_ms = c.average_ms * (1.0 - EWMA_ALPHA) + sample * EWMA_ALPHA;
    }

    /// Count a check that passed without executing anything.
    pub fn record_allowed(&self) {
        self.inner.lock().total += 1;
    }

    /// Count a rejected operation.
    pub fn record_blocked(&self, report: BlockReport) {
        let mut c = self.inner.lock();
        c.total += 1;
        c.blocked += 1;
        if report.symlink {
            c.symlink_attempts += 1;
        }
        if report.invalid_path {
            c.invalid_path_attempts += 1;
        }
        c.last_blocked = Some(BlockedOperation {
            operation: report.operation,
            subject: report.subject,
            reason: report.reason,
            timestamp: Utc::now(),
        });
    }

    /// Read the counters. No side effects.
    pub fn snapshot(&self) -> OperationStats {
        let c = self.inner.lock();
        let failure_rate = if c.total == 0 {
            0.0
        } else {
            (c.timeouts + c.errors) as f64 / c.total as f64
        };

        OperationStats {
            total_operations: c.total,
            timeout_operations: c.timeouts,
            error_operations: c.errors,
            blocked_operations: c.blocked,
            symlink_attempts: c.symlink_attempts,
            invalid_path_attempts: c.invalid_path_attempts,
            average_execution_time: c.average_ms,
            failure_rate,
            last_blocked_operation: c.last_blocked.clone(),
        }
    }

    pub fn reset(&self) {
        *self.inner.lock() = Counters::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_stats_have_zero_failure_rate() {
        let stats = StatsRecorder::new().snapshot();
        assert_eq!(stats.total_operations, 0);
        assert_eq!(stats.failure_rate, 0.0);
        assert!(stats.last_blocked_operation.is_none());
    }

    #[test]
    fn test_ewma_update() {
        let recorder = StatsRecorder::new();
        recorder.record(Duration::from_millis(10), Outcome::Success);
        let first = recorder.snapshot().average_execution_time;
        assert!((first - 1.0).abs() < 1e-9);

        recorder.record(Duration::from_millis(10), Outcome::Success);
        let second = recorder.snapshot().average_execution_time;
        assert!((second - 1.9).abs() < 1e-9);
    }

    #[test]
    fn test_failure_rate() {
        let recorder = StatsRecorder::new();
        recorder.record(Duration::from_millis(1), Outcome::Success);
        recorder.record(Duration::from_millis(1), Outcome::Timeout);
        recorder.record(Duration::from_millis(1), Outcome::Error);
        recorder.record_allowed();

        let stats = recorder.snapshot();
        assert_eq!(stats.total_operations, 4);
        assert_eq!(stats.timeout_operations, 1);
        assert_eq!(stats.error_operations, 1);
        assert!((stats.failure_rate - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_blocked_operation_tracking() {
        let recorder = StatsRecorder::new();
        recorder.record_blocked(BlockReport {
            operation: "write".into(),
            subject: "/tmp/link".into(),
            reason: "Symbolic links are not allowed".into(),
            symlink: true,
            invalid_path: true,
        });

        let stats = recorder.snapshot();
        assert_eq!(stats.blocked_operations, 1);
        assert_eq!(stats.symlink_attempts, 1);
        assert_eq!(stats.invalid_path_attempts, 1);
        let last = stats.last_blocked_operation.unwrap();
        assert_eq!(last.subject, "/tmp/link");
        assert_eq!(last.operation, "write");
    }

    #[test]
    fn test_reset() {
        let recorder = StatsRecorder::new();
        recorder.record(Duration::from_millis(5), Outcome::Error);
        recorder.reset();
        assert_eq!(recorder.snapshot(), OperationStats::default());
    }

    #[test]
    fn test_snapshot_serializes_camel_case() {
        let json = serde_json::to_value(StatsRecorder::new().snapshot()).unwrap();
        assert_eq!(json["totalOperations"], 0);
        assert_eq!(json["failureRate"], 0.0);
        assert!(json.get("lastBlockedOperation").is_none());
    }
}
