//! Validators turn one untrusted value plus a policy into a verdict.
//!
//! Three flavors share the [`Validator`] trait:
//!
//! - [`PatternValidator`]: glob patterns, scored by [`crate::risk::RiskScorer`]
//! - [`TempPathValidator`]: temp-file paths, checked against the filesystem
//! - [`StaticPathValidator`]: URL paths handed to a static file server

mod pattern;
mod static_path;
mod temp_file;

pub use pattern::PatternValidator;
pub use static_path::StaticPathValidator;
pub use temp_file::{NOT_IN_ALLOWED_DIRS, SYMLINK_NOT_ALLOWED, SYMLINK_OUTSIDE, TempPathValidator};

use crate::policy::{PolicyConfig, PolicyUpdate};
use crate::verdict::ValidationVerdict;

/// A policy-driven validator for one kind of untrusted value.
pub trait Validator: Send + Sync {
    /// Short name used in logs, e.g. `"pattern"`.
    fn kind(&self) -> &'static str;

    /// Validate one value. Never caches.
    fn validate(&self, value: &str) -> ValidationVerdict;

    /// Validate every value, in input order, without stopping at failures.
    fn validate_many(&self, values: &[&str]) -> Vec<ValidationVerdict> {
        values.iter().map(|value| self.validate(value)).collect()
    }

    /// Whether a caller should refuse to act on `value`.
    fn should_block(&self, value: &str) -> bool {
        let verdict = self.validate(value);
        !verdict.is_valid || verdict.is_sensitive || verdict.is_symlink
    }

    /// Rewrite `value` into a safer form. The result still needs validating.
    fn sanitize(&self, value: &str) -> String;

    fn policy(&self) -> &PolicyConfig;

    /// Replace the whole policy.
    fn replace_policy(&mut self, policy: PolicyConfig);

    /// Merge `update` into the current policy and swap it in.
    fn update_config(&mut self, update: &PolicyUpdate) {
        let next = self.policy().merged(update);
        self.replace_policy(next);
    }
}
