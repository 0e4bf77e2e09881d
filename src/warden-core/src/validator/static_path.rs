//! URL paths requested from a static file server.
//!
//! Checks are lexical unless the policy names a `serve_root`, in which case
//! the resolved file is also inspected for symlinks.

use std::fs;
use std::path::Path;

use crate::normalize::{
    decode_fully, has_percent_encoding, has_suspicious_sequences, has_traversal, is_within,
    normalize, sanitize_static_path,
};
use crate::policy::PolicyConfig;
use crate::validator::Validator;
use crate::verdict::{Findings, RiskLevel, ValidationVerdict};

pub const TRAVERSAL_NOT_ALLOWED: &str = "Path contains directory traversal (..) which is not allowed";

/// Validates URL paths before a static file server resolves them.
#[derive(Debug, Clone)]
pub struct StaticPathValidator {
    policy: PolicyConfig,
}

impl StaticPathValidator {
    pub fn new(policy: PolicyConfig) -> Self {
        Self { policy }
    }

    fn is_sensitive_directory(&self, segments: &[&str]) -> bool {
        segments
            .iter()
            .any(|segment| self.policy.sensitive_directories.iter().any(|dir| dir == segment))
    }

    fn is_sensitive_file(&self, file_name: &str) -> bool {
        self.policy.sensitive_files.iter().any(|name| name == file_name)
    }

    /// Symlink and escape checks against the directory files are served from.
    fn inspect_serve_root(
        &self,
        serve_root: &Path,
        relative: &str,
        findings: &mut Findings,
    ) -> (bool, Option<String>) {
        let full = serve_root.join(relative);
        let Ok(meta) = fs::symlink_metadata(&full) else {
            return (false, None);
        };

        let is_symlink = meta.file_type().is_symlink();
        let target = if is_symlink {
            if !self.policy.allow_symlinks {
                findings.push(
                    RiskLevel::High,
                    "Symbolic links are not allowed for static files",
                    "Serve regular files only",
                );
            }
            fs::read_link(&full).ok().map(|t| t.display().to_string())
        } else {
            None
        };

        match (fs::canonicalize(&full), fs::canonicalize(serve_root)) {
            (Ok(real), Ok(root)) if is_within(&real, &root) => {}
            (Ok(_), Ok(_)) => findings.push(
                RiskLevel::Critical,
                "Path resolves outside the serving root",
                "Remove links that point outside the static directory",
            ),
            _ => findings.push(
                RiskLevel::Medium,
                "Cannot resolve symbolic link target",
                "Verify symlink integrity before use",
            ),
        }

        (is_symlink, target)
    }
}

impl Default for StaticPathValidator {
    fn default() -> Self {
        Self::new(PolicyConfig::static_file_defaults())
    }
}

/// Extension of `file_name` including the dot, when it is alphanumeric.
fn extension_of(file_name: &str) -> Option<&str> {
    let dot = file_name.rfind('.')?;
    let ext = &file_name[dot + 1..];
    if ext.is_empty() || !ext.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return None;
    }
    Some(&file_name[dot..])
}

impl Validator for StaticPathValidator {
    fn kind(&self) -> &'static str {
        "static-file"
    }

    fn validate(&self, value: &str) -> ValidationVerdict {
        if value.is_empty() {
            return ValidationVerdict::invalid_input(
                "Path must be a non-empty string",
                "Provide a valid file path",
            );
        }

        let mut findings = Findings::new();
        let normalized = normalize(value).trim_start_matches('/').to_string();
        let segments: Vec<&str> = normalized.split('/').filter(|s| !s.is_empty()).collect();
        let file_name = segments.last().copied().unwrap_or("");

        if has_percent_encoding(value) {
            findings.push(
                RiskLevel::Medium,
                "Path contains URL encoding which is not allowed for security",
                "Avoid URL encoding in static file paths",
            );
        }

        let traversal = has_traversal(value);
        if traversal {
            findings.push(
                RiskLevel::Critical,
                TRAVERSAL_NOT_ALLOWED,
                "Remove directory traversal from path",
            );
        }

        let sensitive_dir = self.is_sensitive_directory(&segments);
        if sensitive_dir {
            findings.push(
                RiskLevel::Critical,
                "Path points to sensitive directory",
                "Restrict access to sensitive directories",
            );
        }

        let sensitive_file = self.is_sensitive_file(file_name);
        if sensitive_file {
            findings.push(
                RiskLevel::Critical,
                "Path points to sensitive file",
                "Block access to sensitive files",
            );
        }

        if let Some(ext) = extension_of(file_name) {
            let ext = ext.to_lowercase();
            let is_html = ext == ".html" || ext == ".htm";
            if is_html && !self.policy.allow_html {
                findings.push(
                    RiskLevel::Medium,
                    "HTML files are not allowed to be served statically",
                    "Disable HTML file serving or use proper routing",
                );
            }
            let listed = self.policy.allowed_extensions.contains(&ext);
            let html_allowed = is_html && self.policy.allow_html;
            if !self.policy.allowed_extensions.is_empty() && !listed && !html_allowed {
                findings.push(
                    RiskLevel::Low,
                    format!("File extension '{ext}' is not in allowed list"),
                    "Add extension to allowed list or block the file",
                );
            }
        }

        if !self.policy.allow_dot_files && file_name.starts_with('.') {
            findings.push(
                RiskLevel::Medium,
                "Dot files are not allowed",
                "Block access to dot files or enable if necessary",
            );
        }

        let decoded = decode_fully(value).value.replace('\\', "/");
        if decoded.contains('\0') {
            findings.push(
                RiskLevel::Critical,
                "Path contains a NUL byte",
                "Reject paths with embedded NUL bytes",
            );
        } else if has_suspicious_sequences(decoded.trim_start_matches('/')) {
            findings.push(
                RiskLevel::Medium,
                "Path contains suspicious patterns",
                "Review path for potential security issues",
            );
        }

        if !self.policy.allowed_roots.is_empty() {
            let rooted = format!("/{normalized}");
            let inside = self
                .policy
                .allowed_roots
                .iter()
                .any(|root| is_within(Path::new(&rooted), root));
            if !inside {
                findings.push(
                    RiskLevel::High,
                    "Path is not in allowed static directories",
                    "Serve files only from the configured directories",
                );
            }
        }

        let mut is_symlink = false;
        let mut target_path = None;
        if let Some(serve_root) = &self.policy.serve_root {
            if !traversal && !decoded.contains('\0') {
                (is_symlink, target_path) = self.inspect_serve_root(serve_root, &normalized, &mut findings);
            }
        }

        let is_sensitive = sensitive_dir || sensitive_file;
        if is_sensitive {
            findings.raise_floor(RiskLevel::Critical);
        }

        findings
            .into_verdict(normalized)
            .with_sensitive(is_sensitive)
            .with_symlink(is_symlink, target_path)
    }

    fn sanitize(&self, value: &str) -> String {
        sanitize_static_path(value)
    }

    fn policy(&self) -> &PolicyConfig {
        &self.policy
    }

    fn replace_policy(&mut self, policy: PolicyConfig) {
        self.policy = policy;
    }
}
