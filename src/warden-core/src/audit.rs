//! Audit sink for decisions the framework must report.
//!
//! Components receive an [`AuditSink`] at construction instead of looking a
//! logger up per call. [`TracingSink`] is what builders install when the
//! caller supplies nothing.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditLevel {
    Info,
    Warn,
    Error,
}

/// Destination for audit events. Must never fail.
pub trait AuditSink: Send + Sync {
    fn record(&self, level: AuditLevel, message: &str, context: serde_json::Value);
}

/// Forwards audit events to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl AuditSink for TracingSink {
    fn record(&self, level: AuditLevel, message: &str, context: serde_json::Value) {
        match level {
            AuditLevel::Info => info!(context = %context, "{}", message),
            AuditLevel::Warn => warn!(context = %context, "{}", message),
            AuditLevel::Error => error!(context = %context, "{}", message),
        }
    }
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl AuditSink for NoopSink {
    fn record(&self, _level: AuditLevel, _message: &str, _context: serde_json::Value) {}
}

/// One event captured by [`RecordingSink`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEntry {
    pub level: AuditLevel,
    pub message: String,
    pub context: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

/// Keeps events in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    entries: Mutex<Vec<AuditEntry>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().clone()
    }

    /// Number of events at `level`.
    pub fn count(&self, level: AuditLevel) -> usize {
        self.entries.lock().iter().filter(|e| e.level == level).count()
    }

    /// Whether any event message contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.entries.lock().iter().any(|e| e.message.contains(needle))
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

impl AuditSink for RecordingSink {
    fn record(&self, level: AuditLevel, message: &str, context: serde_json::Value) {
        self.entries.lock().push(AuditEntry {
            level,
            message: message.to_string(),
            context,
            timestamp: Utc::now(),
        });
    }
}

/// Sink installed when the caller supplies none.
pub fn default_sink() -> Arc<dyn AuditSink> {
    Arc::new(TracingSink)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_recording_sink_captures_events() {
        let sink = RecordingSink::new();
        sink.record(AuditLevel::Warn, "Blocked risky pattern", json!({"subject": "**/**"}));
        sink.record(AuditLevel::Error, "Operation timed out", json!({}));

        assert_eq!(sink.entries().len(), 2);
        assert_eq!(sink.count(AuditLevel::Warn), 1);
        assert!(sink.contains("timed out"));
        assert_eq!(sink.entries()[0].context["subject"], "**/**");

        sink.clear();
        assert!(sink.entries().is_empty());
    }

    #[test]
    fn test_shared_sink_records_through_arc() {
        let sink = Arc::new(RecordingSink::new());
        let erased: Arc<dyn AuditSink> = sink.clone();
        erased.record(AuditLevel::Info, "Configuration updated", json!(null));
        assert_eq!(sink.count(AuditLevel::Info), 1);
    }

    #[test]
    fn test_noop_and_tracing_sinks_never_fail() {
        NoopSink.record(AuditLevel::Error, "ignored", json!({}));
        TracingSink.record(AuditLevel::Error, "no subscriber installed", json!({"k": 1}));
        default_sink().record(AuditLevel::Info, "default", json!({}));
    }

    #[test]
    fn test_level_ordering() {
        assert!(AuditLevel::Info < AuditLevel::Warn);
        assert!(AuditLevel::Warn < AuditLevel::Error);
    }
}
