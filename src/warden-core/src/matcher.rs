//! Guarded glob matching with safe defaults.
//!
//! Matching itself is delegated to a [`GlobMatcher`]; this module only decides
//! whether the patterns may run and what to return when they can not.
//!
//! | operation    | on failure          |
//! |--------------|---------------------|
//! | `match_list` | empty list          |
//! | `is_match`   | `false`             |
//! | `some`       | `false`             |
//! | `every`      | `false`             |
//! | `not`        | input list unchanged|

use std::sync::Arc;

use tracing::warn;

use crate::protector::{CallOptions, GuardedCallResult, PatternProtector, ProtectionStats, Protector};
use crate::validator::PatternValidator;
use crate::verdict::ValidationVerdict;

/// Glob engine used by [`SafeMatcher`].
pub trait GlobMatcher: Send + Sync + 'static {
    fn is_match(&self, candidate: &str, pattern: &str) -> bool;
}

/// [`GlobMatcher`] backed by the `glob` crate. Invalid patterns match nothing.
#[derive(Debug, Clone, Copy)]
pub struct GlobCrateMatcher {
    options: glob::MatchOptions,
}

impl GlobCrateMatcher {
    pub fn new() -> Self {
        Self {
            options: glob::MatchOptions {
                case_sensitive: true,
                require_literal_separator: true,
                require_literal_leading_dot: false,
            },
        }
    }

    pub fn case_insensitive(mut self) -> Self {
        self.options.case_sensitive = false;
        self
    }
}

impl Default for GlobCrateMatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl GlobMatcher for GlobCrateMatcher {
    fn is_match(&self, candidate: &str, pattern: &str) -> bool {
        glob::Pattern::new(pattern)
            .map(|p| p.matches_with(candidate, self.options))
            .unwrap_or(false)
    }
}

/// Runs a [`GlobMatcher`] behind a [`PatternProtector`].
pub struct SafeMatcher<M> {
    matcher: Arc<M>,
    protector: PatternProtector,
    options: CallOptions,
}

impl<M: GlobMatcher> SafeMatcher<M> {
    pub fn new(matcher: M, protector: PatternProtector) -> Self {
        Self {
            matcher: Arc::new(matcher),
            protector,
            options: CallOptions::default(),
        }
    }

    /// Matcher guarded by a default pattern protector.
    pub fn with_defaults(matcher: M) -> Self {
        Self::new(matcher, Protector::new(PatternValidator::default()))
    }

    /// Options applied to every call.
    pub fn with_options(mut self, options: CallOptions) -> Self {
        self.options = options;
        self
    }

    pub fn protector(&self) -> &PatternProtector {
        &self.protector
    }

    /// Candidates matching any pattern, with the full call outcome.
    pub async fn try_match_list(
        &self,
        candidates: &[&str],
        patterns: &[&str],
    ) -> GuardedCallResult<Vec<String>> {
        let candidates = to_owned(candidates);
        self.guarded(patterns, move |matcher, patterns| {
            candidates
                .into_iter()
                .filter(|c| matches_any(matcher, c, patterns))
                .collect()
        })
        .await
    }

    pub async fn match_list(&self, candidates: &[&str], patterns: &[&str]) -> Vec<String> {
        let result = self.try_match_list(candidates, patterns).await;
        self.or_default(result, patterns, Vec::new)
    }

    pub async fn is_match(&self, candidate: &str, patterns: &[&str]) -> bool {
        let candidate = candidate.to_string();
        let result = self
            .guarded(patterns, move |matcher, patterns| {
                matches_any(matcher, &candidate, patterns)
            })
            .await;
        self.or_default(result, patterns, || false)
    }

    /// Whether any candidate matches any pattern.
    pub async fn some(&self, candidates: &[&str], patterns: &[&str]) -> bool {
        let candidates = to_owned(candidates);
        let result = self
            .guarded(patterns, move |matcher, patterns| {
                candidates.iter().any(|c| matches_any(matcher, c, patterns))
            })
            .await;
        self.or_default(result, patterns, || false)
    }

    /// Whether every candidate matches some pattern.
    pub async fn every(&self, candidates: &[&str], patterns: &[&str]) -> bool {
        let candidates = to_owned(candidates);
        let result = self
            .guarded(patterns, move |matcher, patterns| {
                candidates.iter().all(|c| matches_any(matcher, c, patterns))
            })
            .await;
        self.or_default(result, patterns, || false)
    }

    /// Candidates matching none of the patterns.
    pub async fn not(&self, candidates: &[&str], patterns: &[&str]) -> Vec<String> {
        let kept = to_owned(candidates);
        let result = self
            .guarded(patterns, move |matcher, patterns| {
                kept.into_iter()
                    .filter(|c| !matches_any(matcher, c, patterns))
                    .collect()
            })
            .await;
        self.or_default(result, patterns, || to_owned(candidates))
    }

    pub fn validate_patterns(&self, patterns: &[&str]) -> Vec<ValidationVerdict> {
        self.protector.validate_many(patterns)
    }

    pub fn sanitize_pattern(&self, pattern: &str) -> String {
        self.protector.sanitize(pattern)
    }

    pub fn stats(&self) -> ProtectionStats {
        self.protector.get_stats()
    }

    pub fn reset_circuit_breaker(&self) {
        self.protector.reset_circuit_breaker();
    }

    async fn guarded<R, F>(&self, patterns: &[&str], work: F) -> GuardedCallResult<R>
    where
        F: FnOnce(&M, &[String]) -> R + Send + 'static,
        R: Send + 'static,
    {
        let matcher = Arc::clone(&self.matcher);
        let owned = to_owned(patterns);
        self.protector
            .guarded_call_many(patterns, self.options.clone(), move || async move {
                tokio::task::spawn_blocking(move || work(&matcher, &owned)).await
            })
            .await
    }

    fn or_default<R>(
        &self,
        result: GuardedCallResult<R>,
        patterns: &[&str],
        fallback: impl FnOnce() -> R,
    ) -> R {
        let execution_time_ms = result.execution_time_ms();
        match result.into_result() {
            Ok(value) => value,
            Err(err) => {
                warn!(
                    patterns = ?patterns,
                    execution_time_ms,
                    error = %err,
                    "Guarded match failed, returning safe default"
                );
                fallback()
            }
        }
    }
}

fn matches_any<M: GlobMatcher>(matcher: &M, candidate: &str, patterns: &[String]) -> bool {
    patterns.iter().any(|p| matcher.is_match(candidate, p))
}

fn to_owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
