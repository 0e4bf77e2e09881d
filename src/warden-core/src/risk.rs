//! Static risk scoring for glob-style patterns.
//!
//! The scorer walks the pattern once, counting the features that make glob
//! matching expensive: wildcard runs, recursive globstars, brace groups and
//! their cartesian expansion, extglob alternations and nesting. It never
//! compiles or matches the pattern, and it never uses a backtracking regex, so
//! scoring cost stays proportional to the pattern length whatever the input.

use serde::{Deserialize, Serialize};

use crate::verdict::{Findings, RiskLevel, ValidationVerdict};

/// Complexity above this is reported as medium risk.
pub const MEDIUM_COMPLEXITY_THRESHOLD: u32 = 30;

/// Complexity above this is reported as high risk.
pub const HIGH_COMPLEXITY_THRESHOLD: u32 = 50;

/// Complexity above this is reported as critical risk.
pub const CRITICAL_COMPLEXITY_THRESHOLD: u32 = 200;

/// Longest run of consecutive wildcard characters before the pattern is critical.
pub const MAX_WILDCARD_RUN: usize = 8;

/// Largest number of alternatives allowed in a single brace group.
pub const MAX_BRACE_ITEMS: u64 = 20;

/// Largest cartesian brace expansion allowed for a whole pattern.
pub const MAX_BRACE_EXPANSION: u64 = 1000;

/// Deepest allowed nesting of braces, groups and classes.
pub const MAX_NESTING_DEPTH: usize = 3;

/// Brace lists are cut down to this many items by [`sanitize_pattern`].
pub const SANITIZED_BRACE_ITEMS: usize = 10;

const WILDCARD_WEIGHT: u64 = 5;
const GLOBSTAR_WEIGHT: u64 = 10;
const QUESTION_WEIGHT: u64 = 2;
const CHAR_CLASS_WEIGHT: u64 = 3;
const ADJACENT_WILDCARD_SEGMENT_WEIGHT: u64 = 20;
const BRACE_GROUP_WEIGHT: u64 = 4;
const BRACE_ITEM_WEIGHT: u64 = 1;
const EXPANSION_BIT_WEIGHT: u64 = 2;
const ALTERNATION_WEIGHT: u64 = 3;
const EXTGLOB_WEIGHT: u64 = 8;
const NESTING_WEIGHT: u64 = 15;
const NESTED_QUANTIFIER_WEIGHT: u64 = 25;

/// Tunable limits used by [`RiskScorer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskThresholds {
    pub medium: u32,
    pub high: u32,
    pub critical: u32,
    pub max_wildcard_run: usize,
    pub max_brace_items: u64,
    pub max_brace_expansion: u64,
    pub max_nesting_depth: usize,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            medium: MEDIUM_COMPLEXITY_THRESHOLD,
            high: HIGH_COMPLEXITY_THRESHOLD,
            critical: CRITICAL_COMPLEXITY_THRESHOLD,
            max_wildcard_run: MAX_WILDCARD_RUN,
            max_brace_items: MAX_BRACE_ITEMS,
            max_brace_expansion: MAX_BRACE_EXPANSION,
            max_nesting_depth: MAX_NESTING_DEPTH,
        }
    }
}

impl RiskThresholds {
    /// Map a bare complexity score to a risk level.
    pub fn level_for(&self, complexity: u32) -> RiskLevel {
        if complexity > self.critical {
            RiskLevel::Critical
        } else if complexity > self.high {
            RiskLevel::High
        } else if complexity > self.medium {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

/// Features counted in a pattern, plus the resulting score.
#[derive(Debug, Clone, Default)]
pub struct ComplexityMetrics {
    pub length: usize,
    pub wildcards: u32,
    pub globstars: u32,
    pub questions: u32,
    pub char_classes: u32,
    pub max_wildcard_run: usize,
    pub wildcard_segments: u32,
    pub adjacent_wildcard_segments: u32,
    pub brace_groups: u32,
    pub brace_items: u64,
    pub max_brace_items: u64,
    /// Estimated number of patterns after brace expansion (saturating).
    pub expansion: u64,
    pub alternations: u32,
    pub extglobs: u32,
    pub nested_quantifiers: u32,
    pub max_depth: usize,
    pub unbalanced: u32,
    pub complexity: u32,
    pub risk_level: RiskLevel,
    pub findings: Findings,
}

impl ComplexityMetrics {
    /// Build the verdict for `pattern` from these metrics.
    pub fn into_verdict(self, pattern: &str) -> ValidationVerdict {
        let complexity = self.complexity;
        let mut findings = self.findings;
        findings.raise_floor(self.risk_level);
        findings.into_verdict(pattern).with_complexity(complexity)
    }

    fn wildcard_score(&self) -> u64 {
        u64::from(self.wildcards) * WILDCARD_WEIGHT
            + u64::from(self.globstars) * GLOBSTAR_WEIGHT
            + u64::from(self.questions) * QUESTION_WEIGHT
            + u64::from(self.adjacent_wildcard_segments) * ADJACENT_WILDCARD_SEGMENT_WEIGHT
    }

    fn raw_complexity(&self) -> u64 {
        let expansion_bits = if self.expansion > 1 {
            u64::from(64 - (self.expansion - 1).leading_zeros())
        } else {
            0
        };

        self.wildcard_score()
            + u64::from(self.char_classes) * CHAR_CLASS_WEIGHT
            + u64::from(self.brace_groups) * BRACE_GROUP_WEIGHT
            + self.brace_items.saturating_mul(BRACE_ITEM_WEIGHT)
            + expansion_bits * EXPANSION_BIT_WEIGHT
            + u64::from(self.alternations) * ALTERNATION_WEIGHT
            + u64::from(self.extglobs) * EXTGLOB_WEIGHT
            + (self.max_depth.saturating_sub(1) as u64) * NESTING_WEIGHT
            + u64::from(self.nested_quantifiers) * NESTED_QUANTIFIER_WEIGHT
    }
}

/// Pattern risk scorer.
#[derive(Debug, Clone, Copy, Default)]
pub struct RiskScorer {
    thresholds: RiskThresholds,
}

impl RiskScorer {
    pub fn new(thresholds: RiskThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &RiskThresholds {
        &self.thresholds
    }

    /// Score a pattern. Total over all inputs and linear in its length.
    pub fn score(&self, pattern: &str) -> ComplexityMetrics {
        let mut metrics = ComplexityMetrics {
            length: pattern.len(),
            ..Default::default()
        };

        if pattern.is_empty() {
            metrics
                .findings
                .push(RiskLevel::Critical, "Pattern must be a non-empty string", "Provide a non-empty glob pattern");
            metrics.risk_level = RiskLevel::Critical;
            return metrics;
        }

        Scan::new(pattern).run(&mut metrics);

        metrics.complexity = u32::try_from(metrics.raw_complexity()).unwrap_or(u32::MAX);
        self.assess(&mut metrics);
        metrics
    }

    fn assess(&self, m: &mut ComplexityMetrics) {
        let t = &self.thresholds;
        let mut findings = Findings::new();

        let complexity_level = t.level_for(m.complexity);
        let wildcard_heavy = m.wildcard_score() * 2 >= u64::from(m.complexity);
        match complexity_level {
            RiskLevel::Critical => findings.push(
                RiskLevel::Critical,
                "Pattern complexity exceeds critical threshold",
                "Split the pattern into simpler, anchored patterns",
            ),
            RiskLevel::High if wildcard_heavy => findings.push(
                RiskLevel::High,
                "Excessive wildcard usage may cause performance issues",
                "Reduce the number of wildcard and globstar segments",
            ),
            RiskLevel::High => findings.push(
                RiskLevel::High,
                "Pattern complexity exceeds high-risk threshold",
                "Simplify brace groups and alternations",
            ),
            RiskLevel::Medium => findings.push(
                RiskLevel::Medium,
                "Pattern complexity is elevated",
                "Narrow the pattern or anchor it to a directory",
            ),
            RiskLevel::Low => {}
        }

        if m.max_wildcard_run > t.max_wildcard_run {
            findings.push(
                RiskLevel::Critical,
                format!(
                    "Wildcard run of {} exceeds hard limit of {}",
                    m.max_wildcard_run, t.max_wildcard_run
                ),
                "Collapse consecutive wildcards to at most '**'",
            );
        } else if m.max_wildcard_run > 2 {
            findings.push(
                RiskLevel::Medium,
                "Consecutive wildcards beyond '**' are redundant",
                "Collapse consecutive wildcards to at most '**'",
            );
        }

        if m.max_brace_items > t.max_brace_items || m.expansion > t.max_brace_expansion {
            let alternatives = m.max_brace_items.max(m.expansion);
            findings.push(
                RiskLevel::Critical,
                format!(
                    "Brace expansion of {} alternatives exceeds limit of {}",
                    alternatives,
                    t.max_brace_items.min(t.max_brace_expansion)
                ),
                "Limit brace lists and ranges to a handful of items",
            );
        }

        if m.max_depth > t.max_nesting_depth {
            findings.push(
                RiskLevel::High,
                format!(
                    "Pattern nesting depth {} exceeds limit of {}",
                    m.max_depth, t.max_nesting_depth
                ),
                "Flatten nested groups",
            );
        }

        if m.nested_quantifiers > 0 {
            findings.push(
                RiskLevel::High,
                "Nested quantified groups can cause catastrophic backtracking",
                "Avoid quantified extglob groups inside other quantified groups",
            );
        }

        if m.unbalanced > 0 {
            findings.push(
                RiskLevel::Medium,
                "Pattern has unbalanced braces, brackets or parentheses",
                "Close every group or escape the delimiter",
            );
        }

        findings.raise_floor(complexity_level);
        m.risk_level = findings.risk_level();
        m.findings = findings;
    }
}

/// Score `pattern` with the default thresholds.
pub fn score(pattern: &str) -> ComplexityMetrics {
    RiskScorer::default().score(pattern)
}

#[derive(Debug)]
enum FrameKind {
    Brace,
    Group { quantified: bool },
}

#[derive(Debug)]
struct Frame {
    kind: FrameKind,
    start: usize,
    sum: u64,
    current: u64,
    items: u64,
    has_separator: bool,
    has_nested: bool,
}

impl Frame {
    fn new(kind: FrameKind, start: usize) -> Self {
        Self {
            kind,
            start,
            sum: 0,
            current: 1,
            items: 1,
            has_separator: false,
            has_nested: false,
        }
    }

    fn split(&mut self) {
        self.sum = self.sum.saturating_add(self.current);
        self.current = 1;
        self.items += 1;
        self.has_separator = true;
    }

    fn alternatives(&self) -> u64 {
        self.sum.saturating_add(self.current)
    }
}

struct Scan<'a> {
    pattern: &'a str,
    bytes: &'a [u8],
    stack: Vec<Frame>,
    root_product: u64,
    quantified_open: u32,
    no_class_close: bool,
    segment_wild: bool,
    segment_literal: bool,
    previous_segment_wild: bool,
}

impl<'a> Scan<'a> {
    fn new(pattern: &'a str) -> Self {
        Self {
            pattern,
            bytes: pattern.as_bytes(),
            stack: Vec::new(),
            root_product: 1,
            quantified_open: 0,
            no_class_close: false,
            segment_wild: false,
            segment_literal: false,
            previous_segment_wild: false,
        }
    }

    fn run(mut self, m: &mut ComplexityMetrics) {
        let bytes = self.bytes;
        let mut i = 0;

        while i < bytes.len() {
            match bytes[i] {
                b'\\' => {
                    self.segment_literal = true;
                    i += 2;
                    continue;
                }
                b'*' | b'?' => {
                    let start = i;
                    while i < bytes.len() && matches!(bytes[i], b'*' | b'?') {
                        i += 1;
                    }
                    self.wildcard_run(m, &bytes[start..i]);
                    continue;
                }
                b'[' => {
                    if let Some(end) = self.class_end(i) {
                        m.char_classes += 1;
                        m.max_depth = m.max_depth.max(self.stack.len() + 1);
                        self.segment_wild = true;
                        i = end + 1;
                        continue;
                    }
                    self.segment_literal = true;
                }
                b'{' => {
                    self.open(m, Frame::new(FrameKind::Brace, i));
                    self.segment_literal = true;
                }
                b',' => {
                    match self.stack.last_mut() {
                        Some(frame) if matches!(frame.kind, FrameKind::Brace) => frame.split(),
                        _ => {}
                    }
                    self.segment_literal = true;
                }
                b'}' => {
                    self.close_brace(m, i);
                    self.segment_literal = true;
                }
                b'(' => {
                    let quantified = i > 0 && matches!(bytes[i - 1], b'*' | b'?' | b'+' | b'@' | b'!');
                    if quantified {
                        m.extglobs += 1;
                        if self.quantified_open > 0 {
                            m.nested_quantifiers += 1;
                        }
                        self.quantified_open += 1;
                    }
                    self.open(m, Frame::new(FrameKind::Group { quantified }, i));
                    self.segment_literal = true;
                }
                b')' => {
                    self.close_group();
                    self.segment_literal = true;
                }
                b'|' => {
                    match self.stack.last_mut() {
                        Some(frame) if matches!(frame.kind, FrameKind::Group { .. }) => {
                            frame.split();
                            m.alternations += 1;
                        }
                        _ => {}
                    }
                    self.segment_literal = true;
                }
                b'/' => self.finish_segment(m),
                _ => self.segment_literal = true,
            }
            i += 1;
        }

        self.finish_segment(m);
        // A plain `(` left open is just a character.
        m.unbalanced += self
            .stack
            .iter()
            .filter(|frame| !matches!(frame.kind, FrameKind::Group { quantified: false }))
            .count() as u32;
        m.expansion = self.root_product;
    }

    fn wildcard_run(&mut self, m: &mut ComplexityMetrics, run: &[u8]) {
        m.max_wildcard_run = m.max_wildcard_run.max(run.len());
        let stars = run.iter().filter(|b| **b == b'*').count() as u32;
        let questions = run.len() as u32 - stars;

        if stars >= 2 {
            m.globstars += 1;
            m.wildcards += stars - 2;
        } else {
            m.wildcards += stars;
        }
        m.questions += questions;
        self.segment_wild = true;
    }

    /// Index of the `]` closing a class opened at `open`.
    fn class_end(&mut self, open: usize) -> Option<usize> {
        if self.no_class_close {
            return None;
        }

        let bytes = self.bytes;
        let mut j = open + 1;
        if j < bytes.len() && matches!(bytes[j], b'!' | b'^') {
            j += 1;
        }
        // A `]` right after the opener is a member, not the terminator.
        if j < bytes.len() && bytes[j] == b']' {
            j += 1;
        }
        while j < bytes.len() {
            match bytes[j] {
                b'\\' => j += 2,
                b']' => return Some(j),
                _ => j += 1,
            }
        }

        // Every later `[` would fail the same scan.
        self.no_class_close = true;
        None
    }

    fn open(&mut self, m: &mut ComplexityMetrics, frame: Frame) {
        if let Some(parent) = self.stack.last_mut() {
            parent.has_nested = true;
        }
        self.stack.push(frame);
        m.max_depth = m.max_depth.max(self.stack.len());
    }

    fn close_brace(&mut self, m: &mut ComplexityMetrics, close: usize) {
        let is_brace = matches!(self.stack.last(), Some(Frame { kind: FrameKind::Brace, .. }));
        if !is_brace {
            m.unbalanced += 1;
            return;
        }
        let Some(frame) = self.stack.pop() else {
            return;
        };

        let (alternatives, items) = if frame.has_separator {
            (frame.alternatives(), frame.items)
        } else if !frame.has_nested {
            match range_span(&self.pattern[frame.start + 1..close]) {
                Some(span) => (span, span),
                None => (frame.current, 0),
            }
        } else {
            (frame.current, 0)
        };

        if items > 0 {
            m.brace_groups += 1;
            m.brace_items = m.brace_items.saturating_add(items);
            m.max_brace_items = m.max_brace_items.max(items);
        }
        self.absorb(alternatives);
    }

    fn close_group(&mut self) {
        let quantified = match self.stack.last() {
            Some(Frame { kind: FrameKind::Group { quantified }, .. }) => *quantified,
            // A stray `)` is a literal.
            _ => return,
        };
        let Some(frame) = self.stack.pop() else {
            return;
        };
        if quantified {
            self.quantified_open -= 1;
        }
        self.absorb(frame.alternatives());
    }

    fn absorb(&mut self, alternatives: u64) {
        match self.stack.last_mut() {
            Some(parent) => parent.current = parent.current.saturating_mul(alternatives),
            None => self.root_product = self.root_product.saturating_mul(alternatives),
        }
    }

    fn finish_segment(&mut self, m: &mut ComplexityMetrics) {
        if self.segment_wild && !self.segment_literal {
            m.wildcard_segments += 1;
            if self.previous_segment_wild {
                m.adjacent_wildcard_segments += 1;
            }
            self.previous_segment_wild = true;
        } else if self.segment_wild || self.segment_literal {
            self.previous_segment_wild = false;
        }
        self.segment_wild = false;
        self.segment_literal = false;
    }
}

/// Number of items produced by a `{a..b}` or `{a..b..step}` range body.
fn range_span(body: &str) -> Option<u64> {
    let parts: Vec<&str> = body.split("..").collect();
    if !(2..=3).contains(&parts.len()) {
        return None;
    }

    let step = match parts.get(2) {
        Some(raw) => match parse_bound(raw)? {
            Bound::Int(v) => v.unsigned_abs().max(1),
            Bound::Overflow => return Some(1),
        },
        None => 1,
    };

    match (parse_bound(parts[0]), parse_bound(parts[1])) {
        (Some(Bound::Int(a)), Some(Bound::Int(b))) => {
            let span = a.abs_diff(b) / step + 1;
            Some(u64::try_from(span).unwrap_or(u64::MAX))
        }
        (Some(Bound::Overflow), Some(_)) | (Some(_), Some(Bound::Overflow)) => Some(u64::MAX),
        _ => {
            let mut a = parts[0].chars();
            let mut b = parts[1].chars();
            match (a.next(), a.next(), b.next(), b.next()) {
                (Some(x), None, Some(y), None) => {
                    let span = u128::from(u32::from(x).abs_diff(u32::from(y))) / step + 1;
                    Some(u64::try_from(span).unwrap_or(u64::MAX))
                }
                _ => None,
            }
        }
    }
}

enum Bound {
    Int(i128),
    Overflow,
}

fn parse_bound(raw: &str) -> Option<Bound> {
    let digits = raw.strip_prefix('-').unwrap_or(raw);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(raw.parse::<i128>().map(Bound::Int).unwrap_or(Bound::Overflow))
}

/// Rewrite a pattern into a cheaper equivalent-ish form.
///
/// Wildcard runs longer than `**` collapse to `**` and brace lists with more
/// than [`SANITIZED_BRACE_ITEMS`] items keep only their first items.
pub fn sanitize_pattern(pattern: &str) -> String {
    let collapsed = collapse_wildcard_runs(pattern);
    truncate_brace_lists(&collapsed, SANITIZED_BRACE_ITEMS)
}

fn collapse_wildcard_runs(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    let mut stars = 0;
    let mut escaped = false;

    for ch in pattern.chars() {
        if escaped {
            out.push(ch);
            escaped = false;
            stars = 0;
            continue;
        }
        match ch {
            '\\' => {
                out.push(ch);
                escaped = true;
                stars = 0;
            }
            '*' => {
                stars += 1;
                if stars <= 2 {
                    out.push(ch);
                }
            }
            _ => {
                out.push(ch);
                stars = 0;
            }
        }
    }
    out
}

fn truncate_brace_lists(pattern: &str, max_items: usize) -> String {
    let bytes = pattern.as_bytes();
    let mut close_of = vec![None; bytes.len()];
    let mut open = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 1,
            b'{' => open.push(i),
            b'}' => {
                if let Some(start) = open.pop() {
                    close_of[start] = Some(i);
                }
            }
            _ => {}
        }
        i += 1;
    }

    let mut out: Vec<u8> = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' {
            out.extend_from_slice(&bytes[i..(i + 2).min(bytes.len())]);
            i += 2;
            continue;
        }
        if let (b'{', Some(end)) = (bytes[i], close_of[i]) {
            let items = split_top_level(&bytes[i + 1..end]);
            if items.len() > max_items {
                out.push(b'{');
                out.extend_from_slice(&items[..max_items].join(&b','));
                out.push(b'}');
                i = end + 1;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }

    String::from_utf8(out).unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned())
}

fn split_top_level(body: &[u8]) -> Vec<&[u8]> {
    let mut items = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    let mut i = 0;
    while i < body.len() {
        match body[i] {
            b'\\' => i += 1,
            b'{' => depth += 1,
            b'}' => depth = depth.saturating_sub(1),
            b',' if depth == 0 => {
                items.push(&body[start..i]);
                start = i + 1;
            }
            _ => {}
        }
        i += 1;
    }
    items.push(&body[start.min(body.len())..]);
    items
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_extension_pattern_is_low() {
        let m = score("*.js");
        assert_eq!(m.risk_level, RiskLevel::Low);
        assert!(m.complexity < HIGH_COMPLEXITY_THRESHOLD);
        assert!(m.findings.is_empty());
        assert_eq!(m.wildcards, 1);
    }

    #[test]
    fn test_repeated_globstar_segments_are_high() {
        let m = score("**/*/**/*/**/*");
        assert_eq!(m.risk_level, RiskLevel::High);
        assert!(m.complexity > HIGH_COMPLEXITY_THRESHOLD);
        assert!(m.findings.mentions("Excessive wildcard usage may cause performance issues"));
        assert_eq!(m.globstars, 3);
        assert_eq!(m.wildcard_segments, 6);
        assert_eq!(m.adjacent_wildcard_segments, 5);
    }

    #[test]
    fn test_globstar_with_trailing_wildcard_is_flagged() {
        let m = score("**/*");
        assert_eq!(m.risk_level, RiskLevel::Medium);
        assert!(!m.findings.is_empty());
    }

    #[test]
    fn test_common_source_globs_stay_low() {
        for pattern in ["src/**/*.rs", "**/*.{js,ts}", "src/**/*.{js,jsx,ts,tsx}", "docs/*.md"] {
            let m = score(pattern);
            assert_eq!(m.risk_level, RiskLevel::Low, "{pattern} scored {}", m.complexity);
        }
    }

    #[test]
    fn test_empty_pattern_is_critical() {
        let m = score("");
        assert_eq!(m.risk_level, RiskLevel::Critical);
        assert!(m.findings.mentions("non-empty string"));
    }

    #[test]
    fn test_repeated_brace_groups_exceed_critical_threshold() {
        let m = score(&"{a,b,c,d,e,f,g,h,i,j}*".repeat(10));
        assert_eq!(m.risk_level, RiskLevel::Critical);
        assert!(m.findings.mentions("Pattern complexity exceeds critical threshold"));
        assert_eq!(m.brace_groups, 10);
        assert_eq!(m.expansion, 10_000_000_000);
    }

    #[test]
    fn test_large_brace_list_is_critical() {
        let m = score("{a,b,c,d,e,f,g,h,i,j,k,l,m,n,o,p,q,r,s,t,u,v,w,x,y,z}");
        assert_eq!(m.max_brace_items, 26);
        assert_eq!(m.risk_level, RiskLevel::Critical);
        assert!(m.findings.mentions("Brace expansion"));
    }

    #[test]
    fn test_numeric_range_counts_items() {
        let m = score("file-{1..100}.txt");
        assert_eq!(m.brace_groups, 1);
        assert_eq!(m.max_brace_items, 100);
        assert_eq!(m.risk_level, RiskLevel::Critical);
    }

    #[test]
    fn test_stepped_and_char_ranges() {
        assert_eq!(range_span("1..10..2"), Some(5));
        assert_eq!(range_span("a..e"), Some(5));
        assert_eq!(range_span("10..1"), Some(10));
        assert_eq!(range_span("1..99999999999999999999999999999999999999999"), Some(u64::MAX));
        assert_eq!(range_span("abc"), None);
        assert_eq!(range_span("a..bc"), None);
    }

    #[test]
    fn test_literal_braces_are_not_groups() {
        let m = score("{literal}");
        assert_eq!(m.brace_groups, 0);
        assert_eq!(m.expansion, 1);
        assert_eq!(m.risk_level, RiskLevel::Low);
    }

    #[test]
    fn test_nested_brace_expansion_multiplies() {
        let m = score("{a,b{c,d}}{e,f}");
        // {a,bc,bd} x {e,f}
        assert_eq!(m.expansion, 6);
        assert_eq!(m.brace_groups, 3);
    }

    #[test]
    fn test_wildcard_run_cap_is_critical() {
        let m = score("a*********b");
        assert_eq!(m.max_wildcard_run, 9);
        assert_eq!(m.risk_level, RiskLevel::Critical);
        assert!(m.findings.mentions("hard limit"));

        let m = score("a***b");
        assert!(m.findings.mentions("redundant"));
    }

    #[test]
    fn test_nested_extglob_quantifiers() {
        let m = score("+(a|+(b|c))");
        assert_eq!(m.extglobs, 2);
        assert_eq!(m.nested_quantifiers, 1);
        assert_eq!(m.alternations, 2);
        assert!(m.findings.mentions("catastrophic backtracking"));
        assert!(m.risk_level >= RiskLevel::High);
    }

    #[test]
    fn test_unbalanced_delimiters() {
        let m = score("src/{a,b");
        assert_eq!(m.unbalanced, 1);
        assert!(m.findings.mentions("unbalanced"));

        let m = score("@(a|b");
        assert_eq!(m.unbalanced, 1);
    }

    #[test]
    fn test_stray_parentheses_are_literal() {
        for pattern in ["a)b", "notes(draft", "x(y", "report (final).txt", "))(("] {
            let m = score(pattern);
            assert_eq!(m.unbalanced, 0, "{pattern}");
            assert_eq!(m.risk_level, RiskLevel::Low, "{pattern}");
            assert!(m.into_verdict(pattern).is_valid, "{pattern}");
        }
    }

    #[test]
    fn test_unclosed_classes_scan_once() {
        let pattern = "[".repeat(10_000);
        let m = score(&pattern);
        assert_eq!(m.char_classes, 0);
        assert_eq!(m.risk_level, RiskLevel::Low);
    }

    #[test]
    fn test_char_class_contents_are_skipped() {
        let m = score("file[*?].txt");
        assert_eq!(m.char_classes, 1);
        assert_eq!(m.wildcards, 0);
        assert_eq!(m.questions, 0);
    }

    #[test]
    fn test_escaped_wildcards_are_literal() {
        let m = score(r"\*\*\*.txt");
        assert_eq!(m.wildcards, 0);
        assert_eq!(m.globstars, 0);
        assert_eq!(m.risk_level, RiskLevel::Low);
    }

    #[test]
    fn test_literal_patterns_are_low() {
        for pattern in ["a", "README.md", "src/lib.rs", "a b c", "../x", "weird,name", "x".repeat(4096).as_str()] {
            let m = score(pattern);
            assert_eq!(m.risk_level, RiskLevel::Low, "{pattern}");
            assert!(m.findings.is_empty(), "{pattern}");
        }
    }

    #[test]
    fn test_complexity_monotonic_in_wildcard_segments() {
        let mut previous = 0;
        for n in 1..40 {
            let pattern = vec!["*"; n].join("/");
            let m = score(&pattern);
            assert!(m.complexity >= previous, "n={n}");
            previous = m.complexity;
        }
    }

    #[test]
    fn test_custom_thresholds() {
        let scorer = RiskScorer::new(RiskThresholds {
            medium: 1,
            high: 2,
            critical: 1_000,
            ..Default::default()
        });
        let m = scorer.score("*.js");
        assert_eq!(m.risk_level, RiskLevel::High);
    }

    #[test]
    fn test_threshold_mapping() {
        let t = RiskThresholds::default();
        assert_eq!(t.level_for(0), RiskLevel::Low);
        assert_eq!(t.level_for(30), RiskLevel::Low);
        assert_eq!(t.level_for(31), RiskLevel::Medium);
        assert_eq!(t.level_for(51), RiskLevel::High);
        assert_eq!(t.level_for(201), RiskLevel::Critical);
    }

    #[test]
    fn test_verdict_from_metrics() {
        let verdict = score("**/*/**/*/**/*").into_verdict("**/*/**/*/**/*");
        assert!(!verdict.is_valid);
        assert_eq!(verdict.risk_level, RiskLevel::High);
        assert!(verdict.complexity_score > 50);
    }

    #[test]
    fn test_sanitize_collapses_wildcards() {
        assert_eq!(sanitize_pattern("***file***"), "**file**");
        assert_eq!(sanitize_pattern(r"\***"), r"\***");
    }

    #[test]
    fn test_sanitize_truncates_brace_lists() {
        let pattern = "{a,b,c,d,e,f,g,h,i,j,k,l}";
        let sanitized = sanitize_pattern(pattern);
        assert_eq!(sanitized, "{a,b,c,d,e,f,g,h,i,j}");
        assert!(sanitized.len() < pattern.len());
        assert_eq!(sanitize_pattern("src/{a,b}/*.rs"), "src/{a,b}/*.rs");
    }

    #[test]
    fn test_sanitize_keeps_multibyte_text() {
        assert_eq!(sanitize_pattern("données/***/é.txt"), "données/**/é.txt");
    }
}
