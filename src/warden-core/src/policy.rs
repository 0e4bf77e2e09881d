//! Validator policy configuration and typed merging.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::risk::RiskThresholds;

/// Default largest temp artifact, 100 MiB.
pub const DEFAULT_MAX_ARTIFACT_SIZE: u64 = 100 * 1024 * 1024;

/// Directories accepted as temp roots when nothing else is configured.
pub const DEFAULT_TEMP_ROOTS: &[&str] = &["/tmp", "/var/tmp", "/dev/shm", "/private/tmp", "/var/folders"];

/// Extensions a static file server hands out by default.
pub const DEFAULT_STATIC_EXTENSIONS: &[&str] = &[
    ".js", ".css", ".png", ".jpg", ".jpeg", ".gif", ".svg", ".ico", ".woff", ".woff2", ".ttf", ".eot",
];

/// Directory names that are never served.
pub const DEFAULT_SENSITIVE_DIRECTORIES: &[&str] = &[
    "node_modules",
    ".git",
    ".env",
    "dist",
    "build",
    "coverage",
    "logs",
    "tmp",
    "temp",
];

/// File names that are never served.
pub const DEFAULT_SENSITIVE_FILES: &[&str] = &[
    ".env",
    ".env.local",
    ".env.production",
    "package.json",
    "yarn.lock",
    "pnpm-lock.yaml",
    "webpack.config.js",
];

/// Immutable configuration owned by one validator.
///
/// Only [`PolicyConfig::merged`] produces a changed copy; validators swap the
/// whole struct on update.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Roots a path must live under. Empty means unrestricted for the static
    /// flavor.
    pub allowed_roots: Vec<PathBuf>,

    /// Lowercase extensions including the leading dot.
    pub allowed_extensions: Vec<String>,

    pub sensitive_directories: Vec<String>,

    pub sensitive_files: Vec<String>,

    pub allow_symlinks: bool,

    /// Inspect the parent directory of temp paths for symlink escapes.
    pub validate_parent_dirs: bool,

    /// Largest existing artifact accepted, in bytes. Zero disables the check.
    pub max_artifact_size: u64,

    pub allow_html: bool,

    pub allow_dot_files: bool,

    /// Directory static paths are served from; enables symlink inspection.
    pub serve_root: Option<PathBuf>,

    pub risk: RiskThresholds,
}

impl PolicyConfig {
    /// Create a builder starting from the empty policy.
    pub fn builder() -> PolicyConfigBuilder {
        PolicyConfigBuilder::default()
    }

    /// Policy for glob patterns; only the risk thresholds matter.
    pub fn pattern_defaults() -> Self {
        Self::default()
    }

    /// Policy for temp-file paths.
    pub fn temp_file_defaults() -> Self {
        let mut allowed_roots: Vec<PathBuf> = DEFAULT_TEMP_ROOTS.iter().map(PathBuf::from).collect();
        let system_temp = std::env::temp_dir();
        if !allowed_roots.contains(&system_temp) {
            allowed_roots.push(system_temp);
        }

        Self {
            allowed_roots,
            allow_symlinks: false,
            validate_parent_dirs: true,
            max_artifact_size: DEFAULT_MAX_ARTIFACT_SIZE,
            ..Default::default()
        }
    }

    /// Policy for static files served over HTTP.
    pub fn static_file_defaults() -> Self {
        Self {
            allowed_extensions: to_strings(DEFAULT_STATIC_EXTENSIONS),
            sensitive_directories: to_strings(DEFAULT_SENSITIVE_DIRECTORIES),
            sensitive_files: to_strings(DEFAULT_SENSITIVE_FILES),
            allow_html: false,
            allow_dot_files: false,
            ..Default::default()
        }
    }

    /// Copy of this policy with `update` applied.
    ///
    /// Scalars present in the update replace the current value. Lists follow
    /// their [`ListUpdate`] mode.
    pub fn merged(&self, update: &PolicyUpdate) -> Self {
        let mut next = self.clone();

        if let Some(list) = &update.allowed_roots {
            list.apply_to(&mut next.allowed_roots);
        }
        if let Some(list) = &update.allowed_extensions {
            list.apply_to(&mut next.allowed_extensions);
        }
        if let Some(list) = &update.sensitive_directories {
            list.apply_to(&mut next.sensitive_directories);
        }
        if let Some(list) = &update.sensitive_files {
            list.apply_to(&mut next.sensitive_files);
        }
        if let Some(v) = update.allow_symlinks {
            next.allow_symlinks = v;
        }
        if let Some(v) = update.validate_parent_dirs {
            next.validate_parent_dirs = v;
        }
        if let Some(v) = update.max_artifact_size {
            next.max_artifact_size = v;
        }
        if let Some(v) = update.allow_html {
            next.allow_html = v;
        }
        if let Some(v) = update.allow_dot_files {
            next.allow_dot_files = v;
        }
        if let Some(v) = &update.serve_root {
            next.serve_root = Some(v.clone());
        }
        if let Some(v) = update.risk {
            next.risk = v;
        }

        next
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// How a list-valued key is merged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListUpdate<T> {
    /// Swap the whole list.
    Replace(Vec<T>),
    /// Append the items not already present, keeping order.
    Union(Vec<T>),
}

impl<T: Clone + PartialEq> ListUpdate<T> {
    pub fn apply_to(&self, target: &mut Vec<T>) {
        match self {
            ListUpdate::Replace(items) => *target = items.clone(),
            ListUpdate::Union(items) => {
                for item in items {
                    if !target.contains(item) {
                        target.push(item.clone());
                    }
                }
            }
        }
    }
}

/// Partial policy. `None` keeps the current value.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_roots: Option<ListUpdate<PathBuf>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_extensions: Option<ListUpdate<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sensitive_directories: Option<ListUpdate<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sensitive_files: Option<ListUpdate<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_symlinks: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validate_parent_dirs: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_artifact_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_html: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_dot_files: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serve_root: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk: Option<RiskThresholds>,
}

impl PolicyUpdate {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// Builder for [`PolicyConfig`].
#[derive(Debug, Default)]
pub struct PolicyConfigBuilder {
    config: PolicyConfig,
}

impl PolicyConfigBuilder {
    /// Start from an existing policy, usually one of the presets.
    pub fn from_policy(config: PolicyConfig) -> Self {
        Self { config }
    }

    /// Add an allowed root.
    pub fn allow_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.config.allowed_roots.push(root.into());
        self
    }

    /// Replace the allowed roots.
    pub fn allowed_roots(mut self, roots: impl IntoIterator<Item = impl Into<PathBuf>>) -> Self {
        self.config.allowed_roots = roots.into_iter().map(Into::into).collect();
        self
    }

    /// Add an allowed extension. A missing leading dot is added.
    pub fn allow_extension(mut self, ext: impl Into<String>) -> Self {
        let ext = ext.into().to_lowercase();
        let ext = if ext.starts_with('.') { ext } else { format!(".{ext}") };
        self.config.allowed_extensions.push(ext);
        self
    }

    pub fn sensitive_directory(mut self, name: impl Into<String>) -> Self {
        self.config.sensitive_directories.push(name.into());
        self
    }

    pub fn sensitive_file(mut self, name: impl Into<String>) -> Self {
        self.config.sensitive_files.push(name.into());
        self
    }

    pub fn allow_symlinks(mut self, allow: bool) -> Self {
        self.config.allow_symlinks = allow;
        self
    }

    pub fn validate_parent_dirs(mut self, validate: bool) -> Self {
        self.config.validate_parent_dirs = validate;
        self
    }

    pub fn max_artifact_size(mut self, bytes: u64) -> Self {
        self.config.max_artifact_size = bytes;
        self
    }

    pub fn allow_html(mut self, allow: bool) -> Self {
        self.config.allow_html = allow;
        self
    }

    pub fn allow_dot_files(mut self, allow: bool) -> Self {
        self.config.allow_dot_files = allow;
        self
    }

    pub fn serve_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.config.serve_root = Some(root.into());
        self
    }

    pub fn risk(mut self, thresholds: RiskThresholds) -> Self {
        self.config.risk = thresholds;
        self
    }

    /// Build the policy.
    pub fn build(self) -> PolicyConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_temp_defaults() {
        let policy = PolicyConfig::temp_file_defaults();
        assert!(policy.allowed_roots.contains(&PathBuf::from("/tmp")));
        assert!(policy.allowed_roots.contains(&std::env::temp_dir()));
        assert!(!policy.allow_symlinks);
        assert!(policy.validate_parent_dirs);
        assert_eq!(policy.max_artifact_size, DEFAULT_MAX_ARTIFACT_SIZE);
    }

    #[test]
    fn test_static_defaults() {
        let policy = PolicyConfig::static_file_defaults();
        assert!(policy.allowed_extensions.iter().any(|e| e == ".woff2"));
        assert!(policy.sensitive_directories.iter().any(|d| d == "node_modules"));
        assert!(policy.sensitive_files.iter().any(|f| f == "package.json"));
        assert!(!policy.allow_html);
        assert!(policy.allowed_roots.is_empty());
    }

    #[test]
    fn test_merge_replaces_scalars_only_when_present() {
        let base = PolicyConfig::temp_file_defaults();
        let update = PolicyUpdate {
            allow_symlinks: Some(true),
            ..Default::default()
        };
        let merged = base.merged(&update);
        assert!(merged.allow_symlinks);
        assert_eq!(merged.allowed_roots, base.allowed_roots);
        assert_eq!(merged.max_artifact_size, base.max_artifact_size);
    }

    #[test]
    fn test_merge_replace_list() {
        let base = PolicyConfig::temp_file_defaults();
        let update = PolicyUpdate {
            allowed_roots: Some(ListUpdate::Replace(vec![PathBuf::from("/srv/scratch")])),
            ..Default::default()
        };
        let merged = base.merged(&update);
        assert_eq!(merged.allowed_roots, vec![PathBuf::from("/srv/scratch")]);
    }

    #[test]
    fn test_merge_union_list_keeps_order_and_dedupes() {
        let base = PolicyConfig::builder().allow_root("/tmp").allow_root("/var/tmp").build();
        let update = PolicyUpdate {
            allowed_roots: Some(ListUpdate::Union(vec![
                PathBuf::from("/var/tmp"),
                PathBuf::from("/srv/scratch"),
            ])),
            ..Default::default()
        };
        let merged = base.merged(&update);
        assert_eq!(
            merged.allowed_roots,
            vec![
                PathBuf::from("/tmp"),
                PathBuf::from("/var/tmp"),
                PathBuf::from("/srv/scratch"),
            ]
        );
    }

    #[test]
    fn test_merge_does_not_touch_source() {
        let base = PolicyConfig::static_file_defaults();
        let update = PolicyUpdate {
            allowed_extensions: Some(ListUpdate::Replace(vec![".txt".into()])),
            allow_html: Some(true),
            ..Default::default()
        };
        let _ = base.merged(&update);
        assert_eq!(base, PolicyConfig::static_file_defaults());
    }

    #[test]
    fn test_update_from_toml() {
        let update: PolicyUpdate = toml::from_str(
            r#"
            allow_html = true
            allowed_extensions = { union = [".map"] }
            allowed_roots = { replace = ["/srv/www"] }
            "#,
        )
        .unwrap();

        assert_eq!(update.allow_html, Some(true));
        assert_eq!(update.allowed_extensions, Some(ListUpdate::Union(vec![".map".to_string()])));
        assert_eq!(update.allowed_roots, Some(ListUpdate::Replace(vec![PathBuf::from("/srv/www")])));
        assert!(update.allow_symlinks.is_none());
        assert!(!update.is_empty());
        assert!(PolicyUpdate::default().is_empty());
    }

    #[test]
    fn test_builder_normalizes_extensions() {
        let policy = PolicyConfig::builder().allow_extension("JS").allow_extension(".css").build();
        assert_eq!(policy.allowed_extensions, vec![".js".to_string(), ".css".to_string()]);
    }
}
