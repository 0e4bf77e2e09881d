//! Three-state circuit breaker.
//!
//! ```text
//!            failures >= threshold
//!   Closed ------------------------> Open
//!     ^                               |  cooldown elapsed
//!     |  trial success                v
//!     +-------------------------- HalfOpen
//!                                     |  trial failure
//!                                     +-------> Open (cooldown restarts)
//! ```
//!
//! State lives behind one mutex so concurrent callers always observe a
//! consistent state, failure count and timestamps.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Consecutive failures that open the circuit.
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 5;

/// Time the circuit stays open before allowing a trial call.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(60);

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    /// Normal operation.
    Closed,
    /// Failing fast.
    Open,
    /// Letting one trial call through.
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half-open"),
        }
    }
}

/// Answer to [`CircuitBreaker::acquire`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed,
    /// Allowed as the single half-open trial.
    Trial,
    Rejected,
}

impl Admission {
    pub fn is_allowed(&self) -> bool {
        !matches!(self, Admission::Rejected)
    }
}

/// Read-only view of the breaker for statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CircuitBreakerSnapshot {
    pub state: CircuitState,
    pub failures: u32,
    pub last_failure_time: Option<DateTime<Utc>>,
    /// Whether the next call would be rejected.
    pub is_blocked: bool,
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    consecutive_failures: u32,
    last_failure_at: Option<DateTime<Utc>>,
    /// When an open circuit may move to half-open.
    reopen_at: Option<Instant>,
    /// Start of the outstanding half-open trial, if any.
    trial_started: Option<Instant>,
}

impl BreakerState {
    fn closed() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            last_failure_at: None,
            reopen_at: None,
            trial_started: None,
        }
    }
}

/// Failure-tolerance gate in front of guarded operations.
#[derive(Debug)]
pub struct CircuitBreaker {
    failure_threshold: u32,
    cooldown: Duration,
    inner: Mutex<BreakerState>,
}

impl CircuitBreaker {
    /// Create a breaker. A threshold of zero is treated as one.
    pub fn new(failure_threshold: u32, cooldown: Duration) -> Self {
        Self {
            failure_threshold: failure_threshold.max(1),
            cooldown,
            inner: Mutex::new(BreakerState::closed()),
        }
    }

    pub fn failure_threshold(&self) -> u32 {
        self.failure_threshold
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Current state as last recorded. Does not advance the state machine.
    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.inner.lock().consecutive_failures
    }

    /// Ask to run one operation.
    ///
    /// An open circuit whose cooldown has elapsed moves to half-open first,
    /// so the caller that notices is the trial.
    pub fn acquire(&self) -> Admission {
        let mut inner = self.inner.lock();
        self.maybe_transition(&mut inner);

        match inner.state {
            CircuitState::Closed => Admission::Allowed,
            CircuitState::Open => Admission::Rejected,
            CircuitState::HalfOpen => {
                // A trial abandoned by its caller must not wedge the breaker.
                let trial_live = inner
                    .trial_started
                    .is_some_and(|started| started.elapsed() < self.cooldown);
                if trial_live {
                    Admission::Rejected
                } else {
                    inner.trial_started = Some(Instant::now());
                    Admission::Trial
                }
            }
        }
    }

    /// Record a successful operation. Returns the new state on a transition.
    ///
    /// Successes do not decay failures while closed.
    pub fn record_success(&self) -> Option<CircuitState> {
        let mut inner = self.inner.lock();
        self.maybe_transition(&mut inner);

        match inner.state {
            CircuitState::HalfOpen => {
                *inner = BreakerState {
                    last_failure_at: inner.last_failure_at,
                    ..BreakerState::closed()
                };
                debug!("Circuit breaker closed after successful recovery");
                Some(CircuitState::Closed)
            }
            CircuitState::Closed | CircuitState::Open => None,
        }
    }

    /// Record a failed operation. Returns the new state on a transition.
    pub fn record_failure(&self) -> Option<CircuitState> {
        let mut inner = self.inner.lock();
        self.maybe_transition(&mut inner);

        let now = Utc::now();
        inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);

        match inner.state {
            CircuitState::Closed => {
                inner.last_failure_at = Some(now);
                if inner.consecutive_failures >= self.failure_threshold {
                    self.open(&mut inner);
                    warn!(
                        "Circuit breaker opened after {} failures",
                        inner.consecutive_failures
                    );
                    Some(CircuitState::Open)
                } else {
                    None
                }
            }
            CircuitState::HalfOpen => {
                inner.last_failure_at = Some(now);
                self.open(&mut inner);
                debug!("Circuit breaker re-opened after half-open failure");
                Some(CircuitState::Open)
            }
            // Late result of a call admitted before the circuit opened.
            CircuitState::Open => None,
        }
    }

    /// Force the closed state with zero failures.
    pub fn reset(&self) {
        *self.inner.lock() = BreakerState::closed();
    }

    /// Treat the current cooldown as already elapsed.
    pub fn expire_cooldown(&self) {
        let mut inner = self.inner.lock();
        if inner.state == CircuitState::Open {
            inner.reopen_at = Some(Instant::now());
        }
    }

    /// Whether the next [`acquire`](Self::acquire) would be rejected.
    pub fn is_blocked(&self) -> bool {
        let inner = self.inner.lock();
        self.blocked(&inner)
    }

    pub fn snapshot(&self) -> CircuitBreakerSnapshot {
        let inner = self.inner.lock();
        CircuitBreakerSnapshot {
            state: inner.state,
            failures: inner.consecutive_failures,
            last_failure_time: inner.last_failure_at,
            is_blocked: self.blocked(&inner),
        }
    }

    fn blocked(&self, inner: &BreakerState) -> bool {
        match inner.state {
            CircuitState::Closed => false,
            CircuitState::Open => !Self::cooldown_elapsed(inner),
            CircuitState::HalfOpen => inner
                .trial_started
                .is_some_and(|started| started.elapsed() < self.cooldown),
        }
    }

    fn open(&self, inner: &mut BreakerState) {
        inner.state = CircuitState::Open;
        inner.reopen_at = Some(Instant::now() + self.cooldown);
        inner.trial_started = None;
    }

    fn cooldown_elapsed(inner: &BreakerState) -> bool {
        inner.reopen_at.is_some_and(|at| Instant::now() >= at)
    }

    fn maybe_transition(&self, inner: &mut BreakerState) {
        if inner.state == CircuitState::Open && Self::cooldown_elapsed(inner) {
            inner.state = CircuitState::HalfOpen;
            inner.trial_started = None;
            debug!("Circuit breaker entering half-open state");
        }
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(DEFAULT_FAILURE_THRESHOLD, DEFAULT_COOLDOWN)
    }
}
