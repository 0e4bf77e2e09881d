//! Deadline-bounded execution of untrusted work.
//!
//! The executor holds no per-call state. Each call owns its own
//! `tokio::time::timeout`, so the timer is dropped with the call and an early
//! completion can never leak a timeout into a later, unrelated call.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};

use futures::FutureExt;

use crate::stats::Outcome;

/// Default deadline for guarded work.
pub const DEFAULT_DEADLINE: Duration = Duration::from_millis(1000);

/// Why a guarded operation did not produce a value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExecutionError<E> {
    /// The deadline elapsed first. The caller is unblocked; work that cannot
    /// be cancelled may keep running in the background.
    #[error("operation timed out after {}ms", .0.as_millis())]
    TimedOut(Duration),

    /// The operation itself returned an error.
    #[error("operation failed: {0}")]
    Operation(E),

    #[error("operation panicked: {0}")]
    Panicked(String),
}

/// Outcome of one guarded run plus its wall-clock duration.
#[derive(Debug)]
pub struct Execution<T, E> {
    pub outcome: Result<T, ExecutionError<E>>,
    pub elapsed: Duration,
}

impl<T, E> Execution<T, E> {
    /// Classification used by statistics and the circuit breaker.
    pub fn kind(&self) -> Outcome {
        match &self.outcome {
            Ok(_) => Outcome::Success,
            Err(ExecutionError::TimedOut(_)) => Outcome::Timeout,
            Err(_) => Outcome::Error,
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    /// Map the operation error, keeping the rest.
    pub fn map_err<E2, O>(self, op: O) -> Execution<T, E2>
    where
        O: FnOnce(E) -> E2,
    {
        let outcome = self.outcome.map_err(|err| match err {
            ExecutionError::TimedOut(d) => ExecutionError::TimedOut(d),
            ExecutionError::Operation(e) => ExecutionError::Operation(op(e)),
            ExecutionError::Panicked(msg) => ExecutionError::Panicked(msg),
        });
        Execution {
            outcome,
            elapsed: self.elapsed,
        }
    }
}

/// Races operations against a deadline.
#[derive(Debug, Clone, Copy, Default)]
pub struct GuardedExecutor;

impl GuardedExecutor {
    pub fn new() -> Self {
        Self
    }

    /// Run an async operation under `deadline`.
    ///
    /// On timeout the future is dropped, which cancels it at its next
    /// suspension point.
    pub async fn run<Fut, T, E>(&self, operation: Fut, deadline: Duration) -> Execution<T, E>
    where
        Fut: Future<Output = Result<T, E>>,
    {
        let started = Instant::now();
        let guarded = AssertUnwindSafe(operation).catch_unwind();

        let outcome = match tokio::time::timeout(deadline, guarded).await {
            Ok(Ok(Ok(value))) => Ok(value),
            Ok(Ok(Err(err))) => Err(ExecutionError::Operation(err)),
            Ok(Err(payload)) => Err(ExecutionError::Panicked(panic_message(payload.as_ref()))),
            Err(_) => Err(ExecutionError::TimedOut(deadline)),
        };

        Execution {
            outcome,
            elapsed: started.elapsed(),
        }
    }

    /// Run a synchronous, possibly CPU-bound operation on the blocking pool
    /// under `deadline`.
    ///
    /// A timed out closure can not be interrupted; its thread finishes in the
    /// background and the result is discarded.
    pub async fn run_blocking<F, T, E>(&self, operation: F, deadline: Duration) -> Execution<T, E>
    where
        F: FnOnce() -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        let started = Instant::now();
        let handle = tokio::task::spawn_blocking(operation);

        let outcome = match tokio::time::timeout(deadline, handle).await {
            Ok(Ok(Ok(value))) => Ok(value),
            Ok(Ok(Err(err))) => Err(ExecutionError::Operation(err)),
            Ok(Err(join_error)) if join_error.is_panic() => {
                let payload = join_error.into_panic();
                Err(ExecutionError::Panicked(panic_message(payload.as_ref())))
            }
            Ok(Err(join_error)) => Err(ExecutionError::Panicked(join_error.to_string())),
            Err(_) => Err(ExecutionError::TimedOut(deadline)),
        };

        Execution {
            outcome,
            elapsed: started.elapsed(),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
