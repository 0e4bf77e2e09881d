//! Glob pattern flavor: complexity scoring only, no filesystem access.

use crate::policy::PolicyConfig;
use crate::risk::{RiskScorer, sanitize_pattern};
use crate::validator::Validator;
use crate::verdict::ValidationVerdict;

/// Validates glob patterns before they reach a matcher.
#[derive(Debug, Clone)]
pub struct PatternValidator {
    policy: PolicyConfig,
    scorer: RiskScorer,
}

impl PatternValidator {
    pub fn new(policy: PolicyConfig) -> Self {
        let scorer = RiskScorer::new(policy.risk);
        Self { policy, scorer }
    }
}

impl Default for PatternValidator {
    fn default() -> Self {
        Self::new(PolicyConfig::pattern_defaults())
    }
}

impl Validator for PatternValidator {
    fn kind(&self) -> &'static str {
        "pattern"
    }

    fn validate(&self, value: &str) -> ValidationVerdict {
        self.scorer.score(value).into_verdict(value)
    }

    fn sanitize(&self, value: &str) -> String {
        sanitize_pattern(value)
    }

    fn policy(&self) -> &PolicyConfig {
        &self.policy
    }

    fn replace_policy(&mut self, policy: PolicyConfig) {
        self.scorer = RiskScorer::new(policy.risk);
        self.policy = policy;
    }
}
