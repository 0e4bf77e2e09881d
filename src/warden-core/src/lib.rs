//! Guarded validation for untrusted patterns and paths.
//!
//! Warden sits between untrusted input (glob patterns, temp-file paths, URL
//! paths for a static file server) and the code that acts on it:
//!
//! ```text
//!                     ┌──────────────────────────── Protector ───────────────────────────┐
//!   untrusted value ─►│ Validator ─► CircuitBreaker ─► GuardedExecutor ─► StatsRecorder   │─► GuardedCallResult
//!                     │   │  ▲                                                            │
//!                     │   │  └── RiskScorer (patterns)                                    │
//!                     │   └───── PathNormalizer (paths)                 AuditSink ◄───────│
//!                     └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! - [`risk`]: linear-time complexity scoring of glob patterns
//! - [`normalize`]: percent-decoding to a fixed point and `..` resolution
//! - [`validator`]: the three validator flavors behind one trait
//! - [`executor`]: deadline-bounded execution
//! - [`breaker`]: three-state circuit breaker
//! - [`stats`]: counters and a moving average of execution time
//! - [`protector`]: the facade combining all of the above
//! - [`matcher`]: glob matching with safe defaults on failure
//! - [`temp_manager`]: scoped temp artifacts
//!
//! # Example
//!
//! ```no_run
//! use warden_core::{CallOptions, PatternProtector, PatternValidator};
//!
//! # async fn demo() {
//! let protector = PatternProtector::new(PatternValidator::default());
//! let result = protector
//!     .guarded_call("src/**/*.rs", CallOptions::new(), || async {
//!         Ok::<_, std::io::Error>(vec!["src/lib.rs".to_string()])
//!     })
//!     .await;
//! assert!(result.success);
//! # }
//! ```

pub mod audit;
pub mod breaker;
pub mod config;
pub mod error;
pub mod executor;
pub mod matcher;
pub mod normalize;
pub mod policy;
pub mod protector;
pub mod risk;
pub mod stats;
pub mod temp_manager;
pub mod validator;
pub mod verdict;

pub use audit::{AuditLevel, AuditSink, NoopSink, RecordingSink, TracingSink};
pub use breaker::{CircuitBreaker, CircuitBreakerSnapshot, CircuitState};
pub use config::{BreakerConfig, ProtectorConfig, WardenConfig};
pub use error::{CallError, ConfigError, TempFileError};
pub use executor::{Execution, ExecutionError, GuardedExecutor};
pub use matcher::{GlobCrateMatcher, GlobMatcher, SafeMatcher};
pub use normalize::{has_traversal, normalize};
pub use policy::{ListUpdate, PolicyConfig, PolicyUpdate};
pub use protector::{
    CallOptions, GuardedCallResult, PatternProtector, ProtectionStats, Protector,
    StaticFileProtector, TempFileProtector,
};
pub use risk::{ComplexityMetrics, RiskScorer, RiskThresholds, sanitize_pattern};
pub use stats::{OperationStats, Outcome, StatsRecorder};
pub use temp_manager::{TempDirHandle, TempFileHandle, TempFileManager};
pub use validator::{PatternValidator, StaticPathValidator, TempPathValidator, Validator};
pub use verdict::{RiskLevel, ValidationVerdict};
