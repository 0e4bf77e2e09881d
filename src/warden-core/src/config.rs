//! TOML configuration with environment overrides.
//!
//! ```toml
//! [protector]
//! default_timeout_ms = 500
//!
//! [protector.breaker]
//! failure_threshold = 3
//! cooldown_ms = 30000
//!
//! [temp_files]
//! allowed_roots = { union = ["/srv/scratch"] }
//! allow_symlinks = false
//!
//! [static_files]
//! allowed_extensions = { replace = [".css", ".js"] }
//! ```
//!
//! Each policy section is a partial update applied on top of the flavor's
//! defaults, so an empty file yields the default configuration.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::audit::AuditSink;
use crate::breaker::{DEFAULT_COOLDOWN, DEFAULT_FAILURE_THRESHOLD};
use crate::error::{ConfigError, ConfigResult};
use crate::policy::{PolicyConfig, PolicyUpdate};
use crate::protector::{PatternProtector, Protector, StaticFileProtector, TempFileProtector};
use crate::validator::{PatternValidator, StaticPathValidator, TempPathValidator};

pub const DEFAULT_TIMEOUT_MS: u64 = 1000;

pub const ENV_DEFAULT_TIMEOUT_MS: &str = "WARDEN_DEFAULT_TIMEOUT_MS";
pub const ENV_BREAKER_THRESHOLD: &str = "WARDEN_BREAKER_THRESHOLD";
pub const ENV_BREAKER_COOLDOWN_MS: &str = "WARDEN_BREAKER_COOLDOWN_MS";

/// Circuit breaker settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerConfig {
    pub failure_threshold: u32,
    pub cooldown_ms: u64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            cooldown_ms: DEFAULT_COOLDOWN.as_millis() as u64,
        }
    }
}

/// Settings shared by every protector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtectorConfig {
    pub default_timeout_ms: u64,
    pub breaker: BreakerConfig,
}

impl Default for ProtectorConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: DEFAULT_TIMEOUT_MS,
            breaker: BreakerConfig::default(),
        }
    }
}

/// Top-level configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WardenConfig {
    pub protector: ProtectorConfig,
    pub pattern: PolicyUpdate,
    pub temp_files: PolicyUpdate,
    pub static_files: PolicyUpdate,
}

impl WardenConfig {
    /// Read and validate a config file.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&content)?;
        debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `WARDEN_*` overrides from `lookup`, usually `std::env::var`.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_DEFAULT_TIMEOUT_MS) {
            self.protector.default_timeout_ms = parse_env(ENV_DEFAULT_TIMEOUT_MS, &value)?;
        }
        if let Some(value) = lookup(ENV_BREAKER_THRESHOLD) {
            self.protector.breaker.failure_threshold = parse_env(ENV_BREAKER_THRESHOLD, &value)?;
        }
        if let Some(value) = lookup(ENV_BREAKER_COOLDOWN_MS) {
            self.protector.breaker.cooldown_ms = parse_env(ENV_BREAKER_COOLDOWN_MS, &value)?;
        }
        self.validate()
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.protector.breaker.failure_threshold == 0 {
            return Err(ConfigError::Invalid {
                key: "protector.breaker.failure_threshold".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.protector.default_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                key: "protector.default_timeout_ms".to_string(),
                message: "must be greater than 0".to_string(),
            });
        }
        Ok(())
    }

    pub fn pattern_policy(&self) -> PolicyConfig {
        PolicyConfig::pattern_defaults().merged(&self.pattern)
    }

    pub fn temp_file_policy(&self) -> PolicyConfig {
        PolicyConfig::temp_file_defaults().merged(&self.temp_files)
    }

    pub fn static_file_policy(&self) -> PolicyConfig {
        PolicyConfig::static_file_defaults().merged(&self.static_files)
    }

    pub fn pattern_protector(&self, sink: Arc<dyn AuditSink>) -> PatternProtector {
        Protector::builder(PatternValidator::new(self.pattern_policy()))
            .config(&self.protector)
            .sink(sink)
            .build()
    }

    pub fn temp_file_protector(&self, sink: Arc<dyn AuditSink>) -> TempFileProtector {
        Protector::builder(TempPathValidator::new(self.temp_file_policy()))
            .config(&self.protector)
            .sink(sink)
            .build()
    }

    pub fn static_file_protector(&self, sink: Arc<dyn AuditSink>) -> StaticFileProtector {
        Protector::builder(StaticPathValidator::new(self.static_file_policy()))
            .config(&self.protector)
            .sink(sink)
            .build()
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> ConfigResult<T> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        key: key.to_string(),
        message: format!("cannot parse '{value}'"),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::time::Duration;

    use super::*;
    use crate::audit::NoopSink;
    use crate::policy::ListUpdate;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_config_is_default() {
        let config = WardenConfig::from_toml_str("").unwrap();
        assert_eq!(config, WardenConfig::default());
        assert_eq!(config.protector.default_timeout_ms, 1000);
        assert_eq!(config.protector.breaker.failure_threshold, 5);
        assert_eq!(config.protector.breaker.cooldown_ms, 60_000);
    }

    #[test]
    fn test_parse_full_config() {
        let config = WardenConfig::from_toml_str(
            r#"
            [protector]
            default_timeout_ms = 250

            [protector.breaker]
            failure_threshold = 2

            [temp_files]
            allowed_roots = { union = ["/srv/scratch"] }
            allow_symlinks = true

            [static_files]
            allowed_extensions = { replace = [".css"] }
            "#,
        )
        .unwrap();

        assert_eq!(config.protector.default_timeout_ms, 250);
        assert_eq!(config.protector.breaker.failure_threshold, 2);
        assert_eq!(config.protector.breaker.cooldown_ms, 60_000);
        assert_eq!(
            config.temp_files.allowed_roots,
            Some(ListUpdate::Union(vec![PathBuf::from("/srv/scratch")]))
        );

        let temp = config.temp_file_policy();
        assert!(temp.allow_symlinks);
        assert!(temp.allowed_roots.contains(&PathBuf::from("/srv/scratch")));
        assert!(temp.allowed_roots.contains(&PathBuf::from("/tmp")));

        let statics = config.static_file_policy();
        assert_eq!(statics.allowed_extensions, vec![".css".to_string()]);
    }

    #[test]
    fn test_zero_threshold_rejected() {
        let err = WardenConfig::from_toml_str("[protector.breaker]\nfailure_threshold = 0\n")
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn test_parse_error() {
        let err = WardenConfig::from_toml_str("[protector\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_DEFAULT_TIMEOUT_MS, "750"),
            (ENV_BREAKER_THRESHOLD, " 9 "),
        ]);
        let mut config = WardenConfig::default();
        config
            .apply_env_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.protector.default_timeout_ms, 750);
        assert_eq!(config.protector.breaker.failure_threshold, 9);
        assert_eq!(config.protector.breaker.cooldown_ms, 60_000);
    }

    #[test]
    fn test_bad_env_override() {
        let mut config = WardenConfig::default();
        let err = config
            .apply_env_overrides(|key| (key == ENV_BREAKER_COOLDOWN_MS).then(|| "soon".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains(ENV_BREAKER_COOLDOWN_MS));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("warden.toml");
        std::fs::write(&path, "[protector]\ndefault_timeout_ms = 42\n").unwrap();

        let config = WardenConfig::load(&path).unwrap();
        assert_eq!(config.protector.default_timeout_ms, 42);

        let missing = WardenConfig::load(dir.path().join("missing.toml")).unwrap_err();
        assert!(matches!(missing, ConfigError::Io { .. }));
    }

    #[test]
    fn test_protectors_from_config() {
        let config = WardenConfig::from_toml_str(
            "[protector]\ndefault_timeout_ms = 300\n[protector.breaker]\nfailure_threshold = 4\n",
        )
        .unwrap();

        let protector = config.pattern_protector(Arc::new(NoopSink));
        assert_eq!(protector.default_timeout(), Duration::from_millis(300));
        assert_eq!(protector.breaker().failure_threshold(), 4);
        assert_eq!(protector.kind(), "pattern");

        assert_eq!(config.temp_file_protector(Arc::new(NoopSink)).kind(), "temp-file");
        assert_eq!(config.static_file_protector(Arc::new(NoopSink)).kind(), "static-file");
    }
}
