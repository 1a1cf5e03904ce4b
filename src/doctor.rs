//! The full pipeline behind the CLI and HTTP front ends.
//!
//! [`Doctor`] wires a manifest source, a version registry and an audit
//! runner together and applies the configured ignore lists.

use crate::cache::Cache;
use crate::checker::{
    AuditRunner, PipAudit, PyPiRegistry, SecurityScanner, UpdateChecker, VersionRegistry,
};
use crate::config::{Config, IgnoreConfig};
use crate::error::Result;
use crate::manifest::{DependencyExtractor, GitHubSource, ManifestSource};
use crate::model::{ScanOutcome, ScanResult, SecurityReport, UpdateReport};
use crate::specifier::Specifier;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Which checks [`Doctor::scan`] runs after extracting dependencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanOptions {
    pub check_updates: bool,
    pub security_scan: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            check_updates: true,
            security_scan: true,
        }
    }
}

pub struct Doctor {
    extractor: DependencyExtractor,
    updates: UpdateChecker,
    security: SecurityScanner,
    ignore: IgnoreConfig,
    branch: String,
}

impl Doctor {
    pub fn new(
        source: Arc<dyn ManifestSource>,
        registry: Arc<dyn VersionRegistry>,
        runner: Arc<dyn AuditRunner>,
    ) -> Self {
        Self {
            extractor: DependencyExtractor::new(source),
            updates: UpdateChecker::new(registry.clone()),
            security: SecurityScanner::new(registry, runner),
            ignore: IgnoreConfig::default(),
            branch: "main".to_string(),
        }
    }

    /// Builds the production pipeline: GitHub, PyPI (cached) and pip-audit.
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;

        let source = GitHubSource::with_base_url(
            &config.github_api_url,
            config.github_token.clone(),
            config.request_timeout(),
        )?;

        let mut registry = PyPiRegistry::with_base_url(&config.registry_url, config.request_timeout())?;
        if config.cache_ttl_hours > 0 {
            registry = registry.with_cache(Cache::at(
                crate::cache::cache_dir(),
                Duration::from_secs(config.cache_ttl_hours * 3600),
            ));
        }

        let runner = PipAudit::new(config.audit_command.clone(), config.audit_timeout());

        Ok(Self::new(Arc::new(source), Arc::new(registry), Arc::new(runner))
            .with_concurrency(config.concurrency)
            .with_ignore(config.ignore.clone())
            .with_branch(&config.branch))
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.updates = self.updates.with_concurrency(concurrency);
        self.security = self.security.with_concurrency(concurrency);
        self
    }

    pub fn with_ignore(mut self, ignore: IgnoreConfig) -> Self {
        self.ignore = ignore;
        self
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = branch.into();
        self
    }

    pub fn default_branch(&self) -> &str {
        &self.branch
    }

    /// Declared dependencies of the repository at `url`.
    ///
    /// # Errors
    ///
    /// See [`DependencyExtractor::extract`].
    pub async fn dependencies(&self, url: &str, branch: Option<&str>) -> Result<Vec<String>> {
        self.extractor
            .extract(url, branch.unwrap_or(self.branch.as_str()))
            .await
    }

    pub async fn check_updates(&self, declarations: &[String]) -> UpdateReport {
        self.updates.check(&self.without_ignored(declarations)).await
    }

    pub async fn security_scan(&self, declarations: &[String]) -> SecurityReport {
        let mut report = self.security.scan(&self.without_ignored(declarations)).await;

        if let ScanOutcome::Found { vulnerabilities } = &report.outcome {
            let kept: Vec<_> = vulnerabilities
                .iter()
                .filter(|v| {
                    let ignored = self.ignore.should_ignore_vulnerability(&v.id);
                    if ignored {
                        debug!(id = %v.id, package = %v.package, "vulnerability ignored by config");
                    }
                    !ignored
                })
                .cloned()
                .collect();
            report.outcome = ScanOutcome::from_findings(kept);
        }

        report
    }

    /// Extracts dependencies and runs the selected checks.
    ///
    /// # Errors
    ///
    /// Only extraction errors are returned; check failures are part of the
    /// result.
    pub async fn scan(
        &self,
        url: &str,
        branch: Option<&str>,
        options: ScanOptions,
    ) -> Result<ScanResult> {
        let branch = branch.unwrap_or(self.branch.as_str());
        let dependencies = self.extractor.extract(url, branch).await?;
        let mut result = ScanResult::new(url, branch, dependencies);

        if result.dependencies.is_empty() {
            return Ok(result);
        }

        if options.check_updates {
            result.updates = Some(self.check_updates(&result.dependencies).await);
        }
        if options.security_scan {
            result.security = Some(self.security_scan(&result.dependencies).await);
        }

        Ok(result)
    }

    fn without_ignored(&self, declarations: &[String]) -> Vec<String> {
        declarations
            .iter()
            .filter(|declaration| {
                let name = Specifier::parse(declaration).name;
                let ignored = self.ignore.should_ignore_package(&name);
                if ignored {
                    debug!(package = %name, "dependency ignored by config");
                }
                !ignored
            })
            .cloned()
            .collect()
    }
}
