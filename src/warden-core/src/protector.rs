//! Protector facade: validation, circuit breaking, bounded execution and
//! statistics behind one object per validator flavor.
//!
//! ```text
//!  subject ──► Validator ──► CircuitBreaker ──► GuardedExecutor ──► result
//!                 │               │                   │
//!                 └───────────────┴──► StatsRecorder ◄┘
//!                                  └──► AuditSink
//! ```
//!
//! Expected rejections (invalid input, policy violation, open circuit,
//! timeout) come back as values in [`GuardedCallResult`]. Only faults in the
//! wrapped operation itself count against the circuit breaker, together with
//! timeouts.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::Serialize;
use serde_json::json;

use crate::audit::{AuditLevel, AuditSink, default_sink};
use crate::breaker::{
    Admission, CircuitBreaker, CircuitBreakerSnapshot, CircuitState, DEFAULT_COOLDOWN,
    DEFAULT_FAILURE_THRESHOLD,
};
use crate::config::ProtectorConfig;
use crate::error::CallError;
use crate::executor::{DEFAULT_DEADLINE, Execution, ExecutionError, GuardedExecutor};
use crate::policy::{PolicyConfig, PolicyUpdate};
use crate::stats::{BlockReport, OperationStats, StatsRecorder};
use crate::validator::{PatternValidator, StaticPathValidator, TempPathValidator, Validator};
use crate::verdict::{RiskLevel, ValidationVerdict};

pub type PatternProtector = Protector<PatternValidator>;
pub type TempFileProtector = Protector<TempPathValidator>;
pub type StaticFileProtector = Protector<StaticPathValidator>;

/// Per-call knobs for [`Protector::guarded_call`].
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    /// Deadline override. `None` uses the protector default.
    pub timeout: Option<Duration>,
    /// Free-form caller context attached to audit events.
    pub context: Option<String>,
    /// Run even when validation fails. The deadline and breaker still apply.
    pub allow_risky: bool,
}

impl CallOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn allow_risky(mut self, allow: bool) -> Self {
        self.allow_risky = allow;
        self
    }
}

/// Outcome of a guarded call.
#[derive(Debug, Clone)]
pub struct GuardedCallResult<T> {
    pub success: bool,
    pub result: Option<T>,
    pub error: Option<CallError>,
    /// Time spent in the operation. Zero when it never ran.
    pub execution_time: Duration,
    pub verdict: ValidationVerdict,
}

impl<T> GuardedCallResult<T> {
    fn succeeded(value: T, execution_time: Duration, verdict: ValidationVerdict) -> Self {
        Self {
            success: true,
            result: Some(value),
            error: None,
            execution_time,
            verdict,
        }
    }

    fn failed(error: CallError, execution_time: Duration, verdict: ValidationVerdict) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(error),
            execution_time,
            verdict,
        }
    }

    pub fn execution_time_ms(&self) -> f64 {
        self.execution_time.as_secs_f64() * 1000.0
    }

    pub fn into_result(self) -> Result<T, CallError> {
        match (self.result, self.error) {
            (Some(value), _) => Ok(value),
            (None, Some(err)) => Err(err),
            (None, None) => Err(CallError::OperationFault(
                "operation produced no result".to_string(),
            )),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> GuardedCallResult<U> {
        GuardedCallResult {
            success: self.success,
            result: self.result.map(f),
            error: self.error,
            execution_time: self.execution_time,
            verdict: self.verdict,
        }
    }
}

/// Statistics plus breaker state.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtectionStats {
    #[serde(flatten)]
    pub operations: OperationStats,
    pub circuit_breaker: CircuitBreakerSnapshot,
    /// Whether the next guarded call would be rejected by the breaker.
    pub is_blocked: bool,
}

/// Builder for [`Protector`].
pub struct ProtectorBuilder<V> {
    validator: V,
    sink: Option<Arc<dyn AuditSink>>,
    failure_threshold: u32,
    cooldown: Duration,
    default_timeout: Duration,
}

impl<V: Validator> ProtectorBuilder<V> {
    fn new(validator: V) -> Self {
        Self {
            validator,
            sink: None,
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            cooldown: DEFAULT_COOLDOWN,
            default_timeout: DEFAULT_DEADLINE,
        }
    }

    pub fn sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    pub fn cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    pub fn default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Take breaker and timeout settings from a loaded config.
    pub fn config(self, config: &ProtectorConfig) -> Self {
        self.failure_threshold(config.breaker.failure_threshold)
            .cooldown(Duration::from_millis(config.breaker.cooldown_ms))
            .default_timeout(Duration::from_millis(config.default_timeout_ms))
    }

    pub fn build(self) -> Protector<V> {
        Protector {
            validator: RwLock::new(self.validator),
            breaker: CircuitBreaker::new(self.failure_threshold, self.cooldown),
            stats: StatsRecorder::new(),
            executor: GuardedExecutor::new(),
            sink: self.sink.unwrap_or_else(default_sink),
            default_timeout: self.default_timeout,
        }
    }
}

/// Guards operations on untrusted values of one kind.
pub struct Protector<V> {
    validator: RwLock<V>,
    breaker: CircuitBreaker,
    stats: StatsRecorder,
    executor: GuardedExecutor,
    sink: Arc<dyn AuditSink>,
    default_timeout: Duration,
}

impl<V: Validator> Protector<V> {
    /// Protector with default breaker settings and a tracing sink.
    pub fn new(validator: V) -> Self {
        Self::builder(validator).build()
    }

    pub fn builder(validator: V) -> ProtectorBuilder<V> {
        ProtectorBuilder::new(validator)
    }

    pub fn kind(&self) -> &'static str {
        self.validator.read().kind()
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Copy of the current policy.
    pub fn policy(&self) -> PolicyConfig {
        self.validator.read().policy().clone()
    }

    pub fn validate(&self, value: &str) -> ValidationVerdict {
        self.validator.read().validate(value)
    }

    pub fn validate_many(&self, values: &[&str]) -> Vec<ValidationVerdict> {
        self.validator.read().validate_many(values)
    }

    pub fn should_block(&self, value: &str) -> bool {
        self.validator.read().should_block(value)
    }

    pub fn sanitize(&self, value: &str) -> String {
        self.validator.read().sanitize(value)
    }

    /// Decide whether `operation` may act on `subject`.
    ///
    /// Validation only: the breaker is not consulted and nothing runs.
    /// Rejections are counted and reported to the audit sink.
    pub fn protect(&self, operation: &str, subject: &str, context: Option<&str>) -> bool {
        let verdict = self.validate(subject);
        if verdict.is_valid {
            self.stats.record_allowed();
            return true;
        }

        let kind = self.kind();
        self.stats.record_blocked(BlockReport {
            operation: operation.to_string(),
            subject: subject.to_string(),
            reason: verdict.summary(),
            symlink: verdict.is_symlink,
            invalid_path: true,
        });
        self.sink.record(
            AuditLevel::Warn,
            &format!("Blocked {kind} operation"),
            json!({
                "operation": operation,
                "subject": subject,
                "context": context,
                "verdict": verdict_json(&verdict),
            }),
        );
        false
    }

    /// Validate `subject`, then run `operation` under the breaker and a
    /// deadline.
    ///
    /// `operation` is only invoked when the call is admitted. On timeout its
    /// future is dropped.
    pub async fn guarded_call<F, Fut, T, E>(
        &self,
        subject: &str,
        options: CallOptions,
        operation: F,
    ) -> GuardedCallResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let verdict = self.validate(subject);
        let empty = subject.is_empty();
        self.execute(subject, empty, verdict, &options, |deadline| {
            self.executor.run(operation(), deadline)
        })
        .await
    }

    /// Like [`guarded_call`](Self::guarded_call) for synchronous work.
    ///
    /// The closure runs on the blocking pool so the deadline can abandon it.
    /// An abandoned closure finishes in the background.
    pub async fn guarded_call_blocking<F, T, E>(
        &self,
        subject: &str,
        options: CallOptions,
        operation: F,
    ) -> GuardedCallResult<T>
    where
        F: FnOnce() -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: Display + Send + 'static,
    {
        let verdict = self.validate(subject);
        let empty = subject.is_empty();
        self.execute(subject, empty, verdict, &options, |deadline| {
            self.executor.run_blocking(operation, deadline)
        })
        .await
    }

    /// Guarded call over several subjects validated together.
    ///
    /// The worst verdict decides admission and is attached to the result.
    pub async fn guarded_call_many<F, Fut, T, E>(
        &self,
        subjects: &[&str],
        options: CallOptions,
        operation: F,
    ) -> GuardedCallResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let label = subjects.join(", ");
        let empty = subjects.is_empty() || subjects.iter().any(|s| s.is_empty());
        let verdict = if subjects.is_empty() {
            ValidationVerdict::invalid_input(
                "At least one subject is required",
                "Pass one or more values to validate",
            )
        } else {
            worst_verdict(self.validate_many(subjects))
        };
        self.execute(&label, empty, verdict, &options, |deadline| {
            self.executor.run(operation(), deadline)
        })
        .await
    }

    pub fn get_stats(&self) -> ProtectionStats {
        let circuit_breaker = self.breaker.snapshot();
        ProtectionStats {
            operations: self.stats.snapshot(),
            is_blocked: circuit_breaker.is_blocked,
            circuit_breaker,
        }
    }

    pub fn reset_stats(&self) {
        self.stats.reset();
    }

    pub fn reset_circuit_breaker(&self) {
        self.breaker.reset();
        self.sink.record(
            AuditLevel::Info,
            "Circuit breaker reset",
            json!({ "kind": self.kind() }),
        );
    }

    /// Merge `update` into the validator policy.
    pub fn update_config(&self, update: &PolicyUpdate) {
        let kind = {
            let mut validator = self.validator.write();
            validator.update_config(update);
            validator.kind()
        };
        self.sink.record(
            AuditLevel::Info,
            &format!("Updated {kind} policy"),
            serde_json::to_value(update).unwrap_or_default(),
        );
    }

    async fn execute<T, E, Run, Fut>(
        &self,
        subject: &str,
        empty: bool,
        verdict: ValidationVerdict,
        options: &CallOptions,
        run: Run,
    ) -> GuardedCallResult<T>
    where
        Run: FnOnce(Duration) -> Fut,
        Fut: Future<Output = Execution<T, E>>,
        E: Display,
    {
        if let Err(rejected) = self.admit(subject, empty, &verdict, options) {
            return GuardedCallResult::failed(rejected, Duration::ZERO, verdict);
        }

        let deadline = options.timeout.unwrap_or(self.default_timeout);
        let execution = run(deadline).await;
        self.settle(subject, verdict, options, execution)
    }

    fn admit(
        &self,
        subject: &str,
        empty: bool,
        verdict: &ValidationVerdict,
        options: &CallOptions,
    ) -> Result<(), CallError> {
        let kind = self.kind();

        if empty {
            self.block(subject, verdict, "invalid input", true);
            return Err(CallError::InvalidInput(verdict.summary()));
        }

        if !verdict.is_valid {
            if !options.allow_risky {
                self.block(subject, verdict, "policy violation", true);
                self.sink.record(
                    AuditLevel::Warn,
                    &format!("Blocked risky {kind}"),
                    self.call_context(subject, verdict, options, None),
                );
                return Err(CallError::PolicyViolation(verdict.summary()));
            }
            self.sink.record(
                AuditLevel::Warn,
                &format!("Proceeding with risky {kind} at caller request"),
                self.call_context(subject, verdict, options, None),
            );
        } else if verdict.risk_level >= RiskLevel::High {
            self.sink.record(
                AuditLevel::Warn,
                &format!("High-risk {kind} accepted"),
                self.call_context(subject, verdict, options, None),
            );
        }

        if self.breaker.acquire() == Admission::Rejected {
            self.block(subject, verdict, "circuit breaker open", false);
            self.sink.record(
                AuditLevel::Warn,
                &format!("Circuit breaker open, rejecting {kind} operation"),
                self.call_context(subject, verdict, options, None),
            );
            return Err(CallError::CircuitOpen);
        }

        Ok(())
    }

    fn settle<T, E: Display>(
        &self,
        subject: &str,
        verdict: ValidationVerdict,
        options: &CallOptions,
        execution: Execution<T, E>,
    ) -> GuardedCallResult<T> {
        let kind = self.kind();
        let elapsed = execution.elapsed;
        self.stats.record(elapsed, execution.kind());

        let error = match execution.outcome {
            Ok(value) => {
                if self.breaker.record_success() == Some(CircuitState::Closed) {
                    self.sink.record(
                        AuditLevel::Info,
                        &format!("Circuit breaker closed for {kind} operations"),
                        json!({ "subject": subject }),
                    );
                }
                return GuardedCallResult::succeeded(value, elapsed, verdict);
            }
            Err(ExecutionError::TimedOut(deadline)) => CallError::Timeout(deadline),
            Err(ExecutionError::Operation(err)) => CallError::OperationFault(err.to_string()),
            Err(ExecutionError::Panicked(msg)) => {
                CallError::OperationFault(format!("operation panicked: {msg}"))
            }
        };

        let message = match error {
            CallError::Timeout(_) => format!("Guarded {kind} operation timed out"),
            _ => format!("Guarded {kind} operation failed"),
        };
        let mut context = self.call_context(subject, &verdict, options, Some(elapsed));
        context["error"] = json!(error.to_string());
        self.sink.record(AuditLevel::Error, &message, context);

        if self.breaker.record_failure() == Some(CircuitState::Open) {
            self.sink.record(
                AuditLevel::Error,
                &format!("Circuit breaker opened for {kind} operations"),
                json!({
                    "subject": subject,
                    "failures": self.breaker.consecutive_failures(),
                    "cooldownMs": self.breaker.cooldown().as_millis() as u64,
                }),
            );
        }

        GuardedCallResult::failed(error, elapsed, verdict)
    }

    fn block(&self, subject: &str, verdict: &ValidationVerdict, operation: &str, invalid: bool) {
        let reason = if invalid {
            verdict.summary()
        } else {
            operation.to_string()
        };
        self.stats.record_blocked(BlockReport {
            operation: operation.to_string(),
            subject: subject.to_string(),
            reason,
            symlink: invalid && verdict.is_symlink,
            invalid_path: invalid,
        });
    }

    fn call_context(
        &self,
        subject: &str,
        verdict: &ValidationVerdict,
        options: &CallOptions,
        elapsed: Option<Duration>,
    ) -> serde_json::Value {
        json!({
            "subject": subject,
            "verdict": verdict_json(verdict),
            "context": options.context,
            "executionTimeMs": elapsed.map(|d| d.as_secs_f64() * 1000.0),
            "timeoutMs": options.timeout.unwrap_or(self.default_timeout).as_millis() as u64,
        })
    }
}

fn verdict_json(verdict: &ValidationVerdict) -> serde_json::Value {
    serde_json::to_value(verdict).unwrap_or_default()
}

fn worst_verdict(verdicts: Vec<ValidationVerdict>) -> ValidationVerdict {
    verdicts
        .into_iter()
        .max_by_key(|v| (!v.is_valid, v.risk_level))
        .unwrap_or_else(ValidationVerdict::unchecked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::RecordingSink;

    fn pattern_protector(sink: Arc<RecordingSink>) -> PatternProtector {
        Protector::builder(PatternValidator::default())
            .sink(sink)
            .failure_threshold(3)
            .build()
    }

    #[tokio::test]
    async fn test_guarded_call_success() {
        let sink = Arc::new(RecordingSink::new());
        let protector = pattern_protector(sink.clone());

        let result = protector
            .guarded_call("*.js", CallOptions::new(), || async { Ok::<_, String>(7) })
            .await;
        assert!(result.success);
        assert_eq!(result.result, Some(7));
        assert!(result.error.is_none());
        assert!(result.verdict.is_valid);

        let stats = protector.get_stats();
        assert_eq!(stats.operations.total_operations, 1);
        assert_eq!(stats.operations.failure_rate, 0.0);
        assert!(sink.entries().is_empty());
    }

    #[tokio::test]
    async fn test_risky_pattern_is_rejected_without_running() {
        let sink = Arc::new(RecordingSink::new());
        let protector = pattern_protector(sink.clone());
        let mut ran = false;

        let result = protector
            .guarded_call("**/*/**/*/**/*", CallOptions::new(), || {
                ran = true;
                async { Ok::<_, String>(()) }
            })
            .await;
        assert!(!ran);
        assert!(!result.success);
        assert!(matches!(result.error, Some(CallError::PolicyViolation(_))));
        assert_eq!(result.execution_time, Duration::ZERO);

        let stats = protector.get_stats();
        assert_eq!(stats.operations.blocked_operations, 1);
        assert_eq!(stats.circuit_breaker.failures, 0);
        assert_eq!(sink.count(AuditLevel::Warn), 1);
    }

    #[tokio::test]
    async fn test_allow_risky_runs_anyway() {
        let sink = Arc::new(RecordingSink::new());
        let protector = pattern_protector(sink.clone());

        let result = protector
            .guarded_call(
                "**/*/**/*/**/*",
                CallOptions::new().allow_risky(true),
                || async { Ok::<_, String>("ran") },
            )
            .await;
        assert!(result.success);
        assert!(!result.verdict.is_valid);
        assert!(sink.contains("Proceeding with risky pattern"));
    }

    #[tokio::test]
    async fn test_empty_subject_is_invalid_input() {
        let protector = pattern_protector(Arc::new(RecordingSink::new()));
        let result = protector
            .guarded_call("", CallOptions::new(), || async { Ok::<_, String>(()) })
            .await;
        assert!(matches!(result.error, Some(CallError::InvalidInput(_))));
        assert_eq!(result.verdict.risk_level, RiskLevel::Critical);
    }

    #[tokio::test]
    async fn test_operation_fault_is_surfaced_and_counted() {
        let sink = Arc::new(RecordingSink::new());
        let protector = pattern_protector(sink.clone());

        let result = protector
            .guarded_call("*.rs", CallOptions::new().with_context("unit"), || async {
                Err::<(), _>("matcher exploded")
            })
            .await;
        assert_eq!(
            result.error,
            Some(CallError::OperationFault("matcher exploded".to_string()))
        );
        assert_eq!(protector.get_stats().operations.error_operations, 1);
        assert_eq!(protector.breaker().consecutive_failures(), 1);

        let entries = sink.entries();
        let failure = entries
            .iter()
            .find(|e| e.level == AuditLevel::Error)
            .unwrap();
        assert_eq!(failure.context["subject"], "*.rs");
        assert_eq!(failure.context["context"], "unit");
        assert_eq!(failure.context["verdict"]["isValid"], true);
    }

    #[tokio::test]
    async fn test_timeout_counts_against_breaker() {
        let protector = pattern_protector(Arc::new(RecordingSink::new()));
        let result = protector
            .guarded_call(
                "*.rs",
                CallOptions::new().with_timeout(Duration::from_millis(20)),
                || async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok::<_, String>(())
                },
            )
            .await;
        assert_eq!(
            result.error,
            Some(CallError::Timeout(Duration::from_millis(20)))
        );
        assert_eq!(protector.get_stats().operations.timeout_operations, 1);
    }

    #[tokio::test]
    async fn test_breaker_opens_and_rejects() {
        let sink = Arc::new(RecordingSink::new());
        let protector = pattern_protector(sink.clone());

        for _ in 0..3 {
            protector
                .guarded_call("*.rs", CallOptions::new(), || async { Err::<(), _>("boom") })
                .await;
        }
        assert_eq!(protector.breaker().state(), CircuitState::Open);
        assert!(sink.contains("Circuit breaker opened"));

        let mut ran = false;
        let result = protector
            .guarded_call("*.rs", CallOptions::new(), || {
                ran = true;
                async { Ok::<_, String>(()) }
            })
            .await;
        assert!(!ran);
        assert_eq!(result.error, Some(CallError::CircuitOpen));

        let stats = protector.get_stats();
        assert!(stats.is_blocked);
        assert_eq!(stats.operations.blocked_operations, 1);
        assert_eq!(stats.operations.invalid_path_attempts, 0);

        protector.reset_circuit_breaker();
        assert!(!protector.get_stats().is_blocked);
    }

    #[tokio::test]
    async fn test_half_open_trial_success_closes() {
        let protector = pattern_protector(Arc::new(RecordingSink::new()));
        for _ in 0..3 {
            protector
                .guarded_call("*.rs", CallOptions::new(), || async { Err::<(), _>("boom") })
                .await;
        }
        protector.breaker().expire_cooldown();

        let result = protector
            .guarded_call("*.rs", CallOptions::new(), || async { Ok::<_, String>(1) })
            .await;
        assert!(result.success);
        assert_eq!(protector.breaker().state(), CircuitState::Closed);
        assert_eq!(protector.breaker().consecutive_failures(), 0);
    }

    #[tokio::test]
    async fn test_guarded_call_blocking() {
        let protector = pattern_protector(Arc::new(RecordingSink::new()));
        let result = protector
            .guarded_call_blocking("src/**/*.rs", CallOptions::new(), || {
                Ok::<_, String>(vec!["src/lib.rs"])
            })
            .await;
        assert_eq!(result.into_result(), Ok(vec!["src/lib.rs"]));
    }

    #[tokio::test]
    async fn test_guarded_call_many_uses_worst_verdict() {
        let protector = pattern_protector(Arc::new(RecordingSink::new()));

        let result = protector
            .guarded_call_many(&["*.js", "**/*/**/*/**/*"], CallOptions::new(), || async {
                Ok::<_, String>(())
            })
            .await;
        assert!(matches!(result.error, Some(CallError::PolicyViolation(_))));
        assert_eq!(result.verdict.risk_level, RiskLevel::High);

        let result = protector
            .guarded_call_many(&[], CallOptions::new(), || async { Ok::<_, String>(()) })
            .await;
        assert!(matches!(result.error, Some(CallError::InvalidInput(_))));

        let result = protector
            .guarded_call_many(&["*.js", "*.ts"], CallOptions::new(), || async {
                Ok::<_, String>(2)
            })
            .await;
        assert!(result.success);
    }

    #[test]
    fn test_protect_records_blocks() {
        let sink = Arc::new(RecordingSink::new());
        let protector = pattern_protector(sink.clone());

        assert!(protector.protect("match", "*.js", None));
        assert!(!protector.protect("match", "", Some("request 42")));

        let stats = protector.get_stats();
        assert_eq!(stats.operations.total_operations, 2);
        assert_eq!(stats.operations.blocked_operations, 1);
        let last = stats.operations.last_blocked_operation.unwrap();
        assert_eq!(last.operation, "match");
        assert!(last.reason.contains("non-empty"));
        assert_eq!(sink.entries()[0].context["context"], "request 42");
    }

    #[test]
    fn test_update_config_swaps_policy() {
        let sink = Arc::new(RecordingSink::new());
        let protector = pattern_protector(sink.clone());
        let update = PolicyUpdate {
            allow_symlinks: Some(true),
            ..PolicyUpdate::default()
        };
        protector.update_config(&update);
        assert!(protector.policy().allow_symlinks);
        assert!(sink.contains("Updated pattern policy"));
    }

    #[test]
    fn test_stats_serialization_shape() {
        let protector = pattern_protector(Arc::new(RecordingSink::new()));
        let json = serde_json::to_value(protector.get_stats()).unwrap();
        assert_eq!(json["totalOperations"], 0);
        assert_eq!(json["circuitBreaker"]["state"], "CLOSED");
        assert_eq!(json["isBlocked"], false);
    }

    #[test]
    fn test_result_map_and_into_result() {
        let verdict = ValidationVerdict::unchecked();
        let ok = GuardedCallResult::succeeded(2, Duration::from_millis(1), verdict.clone());
        assert_eq!(ok.map(|v| v * 10).into_result(), Ok(20));

        let err: GuardedCallResult<u8> =
            GuardedCallResult::failed(CallError::CircuitOpen, Duration::ZERO, verdict);
        assert_eq!(err.into_result(), Err(CallError::CircuitOpen));
    }
}
