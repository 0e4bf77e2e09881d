//! Temp-file paths checked against allowed roots on the live filesystem.

use std::fs;
use std::path::{Path, PathBuf};

use crate::normalize::{
    absolutize, forbidden_char, has_encoded_traversal, has_traversal, is_within, normalize,
    sanitize_temp_path,
};
use crate::policy::PolicyConfig;
use crate::validator::Validator;
use crate::verdict::{Findings, RiskLevel, ValidationVerdict};

pub const NOT_IN_ALLOWED_DIRS: &str = "File path is not in allowed temporary directories";
pub const SYMLINK_NOT_ALLOWED: &str = "Symbolic links are not allowed in temporary file operations";
pub const SYMLINK_OUTSIDE: &str = "Symbolic link points outside allowed temporary directories";

/// Validates temp-file paths against the live filesystem.
///
/// Symlinks are inspected with `symlink_metadata` so the link itself is
/// examined rather than whatever it currently points at. Validation is a
/// point-in-time check; callers that act on the path should open it with
/// `O_NOFOLLOW` (see [`crate::temp_manager`]).
#[derive(Debug, Clone)]
pub struct TempPathValidator {
    policy: PolicyConfig,
}

/// An allowed root as written and as resolved on disk.
struct Root {
    lexical: PathBuf,
    canonical: Option<PathBuf>,
}

impl Root {
    fn contains(&self, path: &Path) -> bool {
        is_within(path, &self.lexical)
            || self
                .canonical
                .as_deref()
                .is_some_and(|canonical| is_within(path, canonical))
    }
}

impl TempPathValidator {
    pub fn new(policy: PolicyConfig) -> Self {
        Self { policy }
    }

    /// Roots are resolved per call; a root may be created after the
    /// validator.
    fn roots(&self) -> Vec<Root> {
        self.policy
            .allowed_roots
            .iter()
            .map(|root| Root {
                lexical: absolutize(root),
                canonical: fs::canonicalize(root).ok(),
            })
            .collect()
    }

    fn inspect_link(&self, path: &Path, roots: &[Root], findings: &mut Findings) -> Option<String> {
        if !self.policy.allow_symlinks {
            findings.push(
                RiskLevel::High,
                SYMLINK_NOT_ALLOWED,
                "Avoid using symbolic links in temp file operations",
            );
        }

        let target = match fs::read_link(path) {
            Ok(target) => target,
            Err(_) => {
                findings.push(
                    RiskLevel::Medium,
                    "Cannot resolve symbolic link target",
                    "Verify symlink integrity before use",
                );
                return None;
            }
        };

        let base = path.parent().unwrap_or_else(|| Path::new("/"));
        match fs::canonicalize(base.join(&target)) {
            Ok(real) if roots.iter().any(|root| root.contains(&real)) => {}
            Ok(_) => findings.push(
                RiskLevel::High,
                SYMLINK_OUTSIDE,
                "Ensure symlinks point within allowed temp directories",
            ),
            Err(_) => findings.push(
                RiskLevel::Medium,
                "Cannot resolve symbolic link target",
                "Verify symlink integrity before use",
            ),
        }

        Some(target.display().to_string())
    }

    fn inspect_file(&self, metadata: &fs::Metadata, findings: &mut Findings) {
        #[cfg(unix)]
        {
            use std::os::unix::fs::FileTypeExt;

            let file_type = metadata.file_type();
            if file_type.is_block_device()
                || file_type.is_char_device()
                || file_type.is_fifo()
                || file_type.is_socket()
            {
                findings.push(
                    RiskLevel::High,
                    "Path refers to a special file (device, FIFO or socket)",
                    "Only use regular files and directories for temp artifacts",
                );
            }
        }

        let limit = self.policy.max_artifact_size;
        if metadata.is_file() && limit > 0 && metadata.len() > limit {
            findings.push(
                RiskLevel::Medium,
                format!(
                    "File size {} exceeds maximum temp artifact size of {} bytes",
                    metadata.len(),
                    limit
                ),
                "Keep temp artifacts below the configured size limit",
            );
        }
    }

    fn inspect_parent(&self, path: &Path, roots: &[Root], findings: &mut Findings) {
        let Some(parent) = path.parent() else {
            return;
        };

        match fs::symlink_metadata(parent) {
            Ok(meta) if meta.file_type().is_symlink() => match fs::canonicalize(parent) {
                Ok(real) if roots.iter().any(|root| root.contains(&real)) => {}
                Ok(_) => findings.push(
                    RiskLevel::High,
                    "Parent directory is a symbolic link pointing outside allowed areas",
                    "Avoid creating files in symlinked directories pointing outside temp areas",
                ),
                Err(_) => findings.push(
                    RiskLevel::Medium,
                    "Cannot resolve parent directory symlink target",
                    "Verify parent directory symlink integrity",
                ),
            },
            Ok(_) => {}
            Err(_) => findings.push(
                RiskLevel::Medium,
                "Cannot access parent directory",
                "Ensure parent directory exists and is accessible",
            ),
        }
    }
}

impl Default for TempPathValidator {
    fn default() -> Self {
        Self::new(PolicyConfig::temp_file_defaults())
    }
}

/// Canonicalize the longest existing prefix of `path` and re-append the rest,
/// so a missing file under a symlinked directory still resolves to where it
/// would really be created.
fn resolve_existing_prefix(path: &Path) -> PathBuf {
    let mut existing = path;
    let mut rest = Vec::new();

    loop {
        if let Ok(real) = fs::canonicalize(existing) {
            return rest.iter().rev().fold(real, |acc, name| acc.join(name));
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                rest.push(name);
                existing = parent;
            }
            _ => return path.to_path_buf(),
        }
    }
}

impl Validator for TempPathValidator {
    fn kind(&self) -> &'static str {
        "temp-file"
    }

    fn validate(&self, value: &str) -> ValidationVerdict {
        if value.is_empty() {
            return ValidationVerdict::invalid_input(
                "File path must be a non-empty string",
                "Provide a valid file path",
            );
        }

        let mut findings = Findings::new();
        if value.contains('\0') {
            findings.push(
                RiskLevel::Critical,
                "Path contains a NUL byte",
                "Reject paths with embedded NUL bytes",
            );
            return findings.into_verdict(value.replace('\0', ""));
        }

        let path = absolutize(Path::new(value));
        let roots = self.roots();

        // The literal path is what gets opened; the normalized one is what a
        // decoding consumer would see. Both must stay inside a root.
        let resolved = resolve_existing_prefix(&path);
        let normalized = absolutize(Path::new(&normalize(value)));
        let contained = |candidate: &Path| roots.iter().any(|root| root.contains(candidate));
        if !contained(&resolved) || !contained(&normalized) {
            findings.push(
                RiskLevel::Critical,
                NOT_IN_ALLOWED_DIRS,
                "Use paths within allowed temporary directories only",
            );
        }

        if has_encoded_traversal(value) {
            findings.push(
                RiskLevel::High,
                "Path contains encoded directory traversal",
                "Decode and validate paths before use",
            );
        } else if has_traversal(value) {
            findings.push(
                RiskLevel::High,
                "Path contains directory traversal",
                "Resolve .. segments before passing the path",
            );
        }

        let mut is_symlink = false;
        let mut target_path = None;
        match fs::symlink_metadata(&path) {
            Ok(meta) if meta.file_type().is_symlink() => {
                is_symlink = true;
                target_path = self.inspect_link(&path, &roots, &mut findings);
            }
            Ok(meta) => self.inspect_file(&meta, &mut findings),
            Err(_) => {}
        }

        if self.policy.validate_parent_dirs {
            self.inspect_parent(&path, &roots, &mut findings);
        }

        let text = path.to_string_lossy().into_owned();
        if forbidden_char(&text).is_some() || text.contains("...") {
            findings.push(
                RiskLevel::Medium,
                "Path contains suspicious patterns",
                "Review path for potential security issues",
            );
        }

        if is_symlink {
            findings.raise_floor(RiskLevel::High);
        }

        findings
            .into_verdict(text)
            .with_symlink(is_symlink, target_path)
    }

    fn sanitize(&self, value: &str) -> String {
        let root = self
            .policy
            .allowed_roots
            .first()
            .cloned()
            .unwrap_or_else(std::env::temp_dir);
        sanitize_temp_path(value, &root).display().to_string()
    }

    fn policy(&self) -> &PolicyConfig {
        &self.policy
    }

    fn replace_policy(&mut self, policy: PolicyConfig) {
        self.policy = policy;
    }
}
