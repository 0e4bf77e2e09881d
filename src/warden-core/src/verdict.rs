//! Validation verdicts and risk levels.

use serde::{Deserialize, Serialize};

/// Severity of a validation finding.
///
/// Variants are declared in ascending order so `Ord` gives
/// `Low < Medium < High < Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// Lowercase name used in logs and JSON output.
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RiskLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(RiskLevel::Low),
            "medium" => Ok(RiskLevel::Medium),
            "high" => Ok(RiskLevel::High),
            "critical" => Ok(RiskLevel::Critical),
            _ => Err(format!("Unknown risk level: {}", s)),
        }
    }
}

/// A single problem found while validating a value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub level: RiskLevel,
    pub issue: String,
    pub recommendation: String,
}

/// Ordered collection of findings for one value.
///
/// The verdict is derived from this, so `risk_level` and `is_valid` can never
/// disagree with the issue list.
#[derive(Debug, Clone, Default)]
pub struct Findings {
    items: Vec<Finding>,
    floor: RiskLevel,
}

impl Findings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a problem.
    pub fn push(
        &mut self,
        level: RiskLevel,
        issue: impl Into<String>,
        recommendation: impl Into<String>,
    ) {
        self.items.push(Finding {
            level,
            issue: issue.into(),
            recommendation: recommendation.into(),
        });
    }

    /// Raise the minimum risk level without attaching an issue.
    pub fn raise_floor(&mut self, level: RiskLevel) {
        self.floor = self.floor.max(level);
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Finding> {
        self.items.iter()
    }

    /// Highest severity among the findings and the floor.
    pub fn risk_level(&self) -> RiskLevel {
        self.items
            .iter()
            .map(|f| f.level)
            .fold(self.floor, RiskLevel::max)
    }

    /// Check whether any issue text contains `needle`.
    pub fn mentions(&self, needle: &str) -> bool {
        self.items.iter().any(|f| f.issue.contains(needle))
    }

    /// Turn the findings into a verdict for `normalized_value`.
    pub fn into_verdict(self, normalized_value: impl Into<String>) -> ValidationVerdict {
        let risk_level = self.risk_level();
        let is_valid = self.items.is_empty() && risk_level < RiskLevel::Critical;
        let (issues, recommendations) = self
            .items
            .into_iter()
            .map(|f| (f.issue, f.recommendation))
            .unzip();

        ValidationVerdict {
            is_valid,
            risk_level,
            complexity_score: 0,
            issues,
            recommendations,
            normalized_value: normalized_value.into(),
            is_symlink: false,
            is_sensitive: false,
            target_path: None,
        }
    }
}

/// Outcome of validating one untrusted value.
///
/// Produced fresh on every call and never cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationVerdict {
    pub is_valid: bool,
    pub risk_level: RiskLevel,
    pub complexity_score: u32,
    pub issues: Vec<String>,
    pub recommendations: Vec<String>,
    pub normalized_value: String,
    pub is_symlink: bool,
    pub is_sensitive: bool,
    /// Raw link target when the value named a symbolic link.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_path: Option<String>,
}

impl ValidationVerdict {
    /// Verdict for a malformed or empty subject.
    pub fn invalid_input(issue: impl Into<String>, recommendation: impl Into<String>) -> Self {
        let mut findings = Findings::new();
        findings.push(RiskLevel::Critical, issue, recommendation);
        findings.into_verdict(String::new())
    }

    /// Placeholder verdict attached to calls rejected before validation ran.
    pub fn unchecked() -> Self {
        let mut findings = Findings::new();
        findings.raise_floor(RiskLevel::Critical);
        findings.into_verdict(String::new())
    }

    pub fn with_complexity(mut self, complexity: u32) -> Self {
        self.complexity_score = complexity;
        self
    }

    pub fn with_symlink(mut self, is_symlink: bool, target_path: Option<String>) -> Self {
        self.is_symlink = is_symlink;
        self.target_path = target_path;
        self
    }

    pub fn with_sensitive(mut self, is_sensitive: bool) -> Self {
        self.is_sensitive = is_sensitive;
        self
    }

    /// Issues joined into one line for logs and error values.
    pub fn summary(&self) -> String {
        if self.issues.is_empty() {
            format!("risk level {}", self.risk_level)
        } else {
            self.issues.join(", ")
        }
    }
}
