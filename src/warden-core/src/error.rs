//! Error types.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Why a guarded call produced no result.
///
/// Every variant is an expected outcome on adversarial input and is returned
/// as a value inside [`crate::protector::GuardedCallResult`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallError {
    /// The subject was empty or malformed.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Validation rejected the subject.
    #[error("policy violation: {0}")]
    PolicyViolation(String),

    /// The circuit breaker refused to run the operation.
    #[error("circuit breaker is open")]
    CircuitOpen,

    #[error("operation timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// The wrapped operation failed or panicked.
    #[error("operation failed: {0}")]
    OperationFault(String),
}

impl CallError {
    /// Stable short name for logs and JSON.
    pub fn kind(&self) -> &'static str {
        match self {
            CallError::InvalidInput(_) => "invalid_input",
            CallError::PolicyViolation(_) => "policy_violation",
            CallError::CircuitOpen => "circuit_open",
            CallError::Timeout(_) => "timeout",
            CallError::OperationFault(_) => "operation_fault",
        }
    }

    /// Whether the failure was counted against the circuit breaker.
    pub fn is_breaker_failure(&self) -> bool {
        matches!(self, CallError::Timeout(_) | CallError::OperationFault(_))
    }
}

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for {key}: {message}")]
    Invalid { key: String, message: String },
}

/// Temp artifact errors.
#[derive(Debug, Error)]
pub enum TempFileError {
    #[error("temp path blocked: {path}: {reason}")]
    Blocked { path: PathBuf, reason: String },

    #[error("temp file size {size} exceeds limit of {limit} bytes")]
    TooLarge { size: u64, limit: u64 },

    #[error("temp file I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl TempFileError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        TempFileError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

pub type TempFileResult<T> = std::result::Result<T, TempFileError>;
