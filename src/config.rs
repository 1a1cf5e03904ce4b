//! Configuration file handling.
//!
//! Settings are read from a TOML file, then selected values are overridden
//! from the environment.
//!
//! # Configuration Location
//!
//! - Linux: `~/.config/depdoctor/config.toml`
//! - macOS: `~/Library/Application Support/depdoctor/config.toml`
//! - Windows: `%APPDATA%\depdoctor\config.toml`
//!
//! # Environment Overrides
//!
//! | Variable | Field |
//! |----------|-------|
//! | `GITHUB_TOKEN` | `github_token` |
//! | `DEPDOCTOR_ENV` | `environment` |
//! | `DEPDOCTOR_REGISTRY_URL` | `registry_url` |
//! | `DEPDOCTOR_GITHUB_API_URL` | `github_api_url` |
//!
//! # Example Configuration
//!
//! ```toml
//! environment = "production"
//! branch = "main"
//! registry_url = "https://pypi.org"
//! audit_command = ["uv", "run", "pip-audit"]
//! request_timeout_secs = 30
//! audit_timeout_secs = 300
//! concurrency = 8
//! cache_ttl_hours = 24
//!
//! [ignore]
//! packages = ["internal-*"]
//! vulnerabilities = ["PYSEC-2023-0001"]
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Free-form deployment label reported by `status`.
    pub environment: String,

    /// Branch to read manifests from when none is given.
    pub branch: String,

    /// Bearer token for the GitHub API. Raises rate limits and allows
    /// private repositories. Never written back to disk.
    #[serde(skip_serializing)]
    pub github_token: Option<String>,

    pub github_api_url: String,

    /// Base URL of the PyPI-compatible JSON API.
    pub registry_url: String,

    /// Program and leading arguments for the audit tool. The requirements
    /// path and JSON format flags are appended.
    pub audit_command: Vec<String>,

    pub request_timeout_secs: u64,

    pub audit_timeout_secs: u64,

    /// Maximum registry lookups in flight at once.
    pub concurrency: usize,

    /// How long to cache registry answers. Zero disables the cache.
    pub cache_ttl_hours: u64,

    /// Default output format: "table" or "json".
    pub default_format: String,

    #[serde(default)]
    pub ignore: IgnoreConfig,
}

/// Suppression lists for accepted risks and intentionally pinned packages.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IgnoreConfig {
    /// Package names left out of update and vulnerability reports.
    /// Supports `*` wildcards (e.g. "internal-*").
    pub packages: Vec<String>,

    /// Vulnerability IDs (e.g. "PYSEC-2023-0001", "GHSA-xxxx") never reported.
    pub vulnerabilities: Vec<String>,
}

impl IgnoreConfig {
    pub fn should_ignore_package(&self, name: &str) -> bool {
        let name = crate::specifier::normalize_name(name);
        self.packages.iter().any(|pattern| {
            let pattern = pattern.to_ascii_lowercase();
            if pattern.contains('*') {
                glob_match(&pattern, &name)
            } else {
                crate::specifier::normalize_name(&pattern) == name
            }
        })
    }

    pub fn should_ignore_vulnerability(&self, vuln_id: &str) -> bool {
        self.vulnerabilities
            .iter()
            .any(|id| id.eq_ignore_ascii_case(vuln_id))
    }
}

/// Simple glob matching (supports * as wildcard).
fn glob_match(pattern: &str, text: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();

    if parts.len() == 1 {
        return pattern == text;
    }

    let mut remaining = text;

    if !parts[0].is_empty() {
        if !remaining.starts_with(parts[0]) {
            return false;
        }
        remaining = &remaining[parts[0].len()..];
    }

    let last_part = parts[parts.len() - 1];
    if !last_part.is_empty() {
        if !remaining.ends_with(last_part) {
            return false;
        }
        remaining = &remaining[..remaining.len() - last_part.len()];
    }

    for part in &parts[1..parts.len() - 1] {
        if part.is_empty() {
            continue;
        }
        if let Some(pos) = remaining.find(part) {
            remaining = &remaining[pos + part.len()..];
        } else {
            return false;
        }
    }

    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            branch: "main".to_string(),
            github_token: None,
            github_api_url: "https://api.github.com".to_string(),
            registry_url: "https://pypi.org".to_string(),
            audit_command: vec!["uv".to_string(), "run".to_string(), "pip-audit".to_string()],
            request_timeout_secs: 30,
            audit_timeout_secs: 300,
            concurrency: 8,
            cache_ttl_hours: 24,
            default_format: "table".to_string(),
            ignore: IgnoreConfig::default(),
        }
    }
}

impl Config {
    /// Loads the config file (defaults if absent) and applies environment
    /// overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed, or
    /// if the resulting values are invalid.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path(), |key| std::env::var(key).ok())
    }

    /// [`Config::load`] with an explicit file path and variable lookup.
    pub fn load_from<F>(path: &Path, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = if path.exists() {
            let content = fs::read_to_string(path)?;
            Self::from_toml(&content)?
        } else {
            Self::default()
        };

        config.apply_env(lookup);
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Overrides fields from environment-style lookups. Empty values are
    /// ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(token) = get("GITHUB_TOKEN") {
            self.github_token = Some(token);
        }
        if let Some(env) = get("DEPDOCTOR_ENV") {
            self.environment = env;
        }
        if let Some(url) = get("DEPDOCTOR_REGISTRY_URL") {
            self.registry_url = url;
        }
        if let Some(url) = get("DEPDOCTOR_GITHUB_API_URL") {
            self.github_api_url = url;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.audit_command.is_empty() {
            return Err(Error::Config("audit_command must not be empty".to_string()));
        }
        if self.concurrency == 0 {
            return Err(Error::Config("concurrency must be at least 1".to_string()));
        }
        if self.request_timeout_secs == 0 || self.audit_timeout_secs == 0 {
            return Err(Error::Config("timeouts must be at least 1 second".to_string()));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn audit_timeout(&self) -> Duration {
        Duration::from_secs(self.audit_timeout_secs)
    }

    /// Saves the configuration, creating the parent directory if needed.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path();

        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(e.to_string()))?;
        fs::write(&path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("depdoctor")
            .join("config.toml")
    }

    pub fn generate_default_config() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_glob_match() {
        assert!(glob_match("internal-*", "internal-tools"));
        assert!(glob_match("*-stubs", "types-stubs"));
        assert!(glob_match("*django*", "my-django-plugin"));
        assert!(!glob_match("internal-*", "requests"));
        assert!(glob_match("requests", "requests"));
    }

    #[test]
    fn test_ignore_packages_normalizes_names() {
        let ignore = IgnoreConfig {
            packages: vec!["Ruamel.Yaml".to_string(), "internal-*".to_string()],
            vulnerabilities: vec![],
        };

        assert!(ignore.should_ignore_package("ruamel-yaml"));
        assert!(ignore.should_ignore_package("internal_tools"));
        assert!(!ignore.should_ignore_package("requests"));
    }

    #[test]
    fn test_ignore_vulnerabilities() {
        let ignore = IgnoreConfig {
            packages: vec![],
            vulnerabilities: vec!["PYSEC-2023-0001".to_string()],
        };

        assert!(ignore.should_ignore_vulnerability("pysec-2023-0001"));
        assert!(!ignore.should_ignore_vulnerability("GHSA-xxxx"));
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();

        assert_eq!(config.branch, "main");
        assert_eq!(config.registry_url, "https://pypi.org");
        assert_eq!(config.audit_command, vec!["uv", "run", "pip-audit"]);
        assert!(config.github_token.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml(
            r#"
            environment = "production"
            concurrency = 2

            [ignore]
            vulnerabilities = ["GHSA-1234"]
            "#,
        )
        .unwrap();

        assert_eq!(config.environment, "production");
        assert_eq!(config.concurrency, 2);
        assert_eq!(config.request_timeout_secs, 30);
        assert!(config.ignore.should_ignore_vulnerability("GHSA-1234"));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("GITHUB_TOKEN", "ghp_secret"),
            ("DEPDOCTOR_ENV", "staging"),
            ("DEPDOCTOR_REGISTRY_URL", ""),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_env(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.github_token.as_deref(), Some("ghp_secret"));
        assert_eq!(config.environment, "staging");
        assert_eq!(config.registry_url, "https://pypi.org");
    }

    #[test]
    fn test_load_missing_file_applies_env() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.toml"), |key| {
            (key == "GITHUB_TOKEN").then(|| "ghp_secret".to_string())
        })
        .unwrap();

        assert_eq!(config.github_token.as_deref(), Some("ghp_secret"));
        assert_eq!(config.branch, "main");
    }

    #[test]
    fn test_load_file_then_env() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "environment = \"production\"\nregistry_url = \"https://pypi.example\"\n").unwrap();

        let config = Config::load_from(&path, |key| {
            (key == "DEPDOCTOR_REGISTRY_URL").then(|| "https://mirror.example".to_string())
        })
        .unwrap();

        assert_eq!(config.environment, "production");
        assert_eq!(config.registry_url, "https://mirror.example");
    }

    #[test]
    fn test_load_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "concurrency = \"many\"\n[ignore\n").unwrap();

        let err = Config::load_from(&path, |_| Some("ghp_secret".to_string())).unwrap_err();
        assert!(matches!(err, Error::Toml(_)));
    }

    #[test]
    fn test_load_invalid_values_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "concurrency = 0\n").unwrap();

        let err = Config::load_from(&path, |_| None).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_token_is_not_serialized() {
        let mut config = Config::default();
        config.github_token = Some("ghp_secret".to_string());
        let toml = toml::to_string_pretty(&config).unwrap();
        assert!(!toml.contains("ghp_secret"));
    }

    #[test]
    fn test_validate_rejects_empty_command() {
        let config = Config {
            audit_command: vec![],
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }
}
