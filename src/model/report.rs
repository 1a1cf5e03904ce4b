use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

use super::{ScanOutcome, Vulnerability};

/// A dependency whose latest release is newer than its declared baseline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateRecord {
    pub package: String,
    /// The constraint as written, e.g. `>=8.1.3`.
    pub specifier: String,
    pub latest_version: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum SkipReason {
    /// No version constraint to compare against.
    Unversioned,
    /// Direct URL reference.
    UrlDependency,
    /// The registry had no record or could not be reached.
    RegistryMiss,
    /// A version string that does not follow PEP 440.
    InvalidVersion(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Unversioned => write!(f, "no version constraint"),
            SkipReason::UrlDependency => write!(f, "URL dependency"),
            SkipReason::RegistryMiss => write!(f, "latest version not found"),
            SkipReason::InvalidVersion(v) => write!(f, "invalid version '{}'", v),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedDependency {
    pub declaration: String,
    pub reason: SkipReason,
}

impl SkippedDependency {
    pub fn new(declaration: impl Into<String>, reason: SkipReason) -> Self {
        Self {
            declaration: declaration.into(),
            reason,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UpdateReport {
    pub updates: Vec<UpdateRecord>,
    pub skipped: Vec<SkippedDependency>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecurityReport {
    #[serde(flatten)]
    pub outcome: ScanOutcome,
    /// Pinned declarations handed to the audit.
    pub submitted: Vec<String>,
    pub skipped: Vec<SkippedDependency>,
}

impl SecurityReport {
    pub fn new(
        outcome: ScanOutcome,
        submitted: Vec<String>,
        skipped: Vec<SkippedDependency>,
    ) -> Self {
        Self {
            outcome,
            submitted,
            skipped,
        }
    }

    pub fn vulnerabilities(&self) -> Option<&[Vulnerability]> {
        self.outcome.vulnerabilities()
    }
}

/// Everything gathered for one repository.
#[derive(Debug, Clone, Serialize)]
pub struct ScanResult {
    pub repository: String,
    pub branch: String,
    pub scan_time: DateTime<Utc>,
    pub dependencies: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updates: Option<UpdateReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security: Option<SecurityReport>,
}

impl ScanResult {
    pub fn new(
        repository: impl Into<String>,
        branch: impl Into<String>,
        dependencies: Vec<String>,
    ) -> Self {
        Self {
            repository: repository.into(),
            branch: branch.into(),
            scan_time: Utc::now(),
            dependencies,
            updates: None,
            security: None,
        }
    }

    pub fn has_vulnerabilities(&self) -> bool {
        self.security
            .as_ref()
            .and_then(SecurityReport::vulnerabilities)
            .is_some_and(|v| !v.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vuln(id: &str) -> Vulnerability {
        Vulnerability {
            package: "jinja2".to_string(),
            version: "2.4.1".to_string(),
            id: id.to_string(),
            description: None,
            fix_versions: vec!["2.10.1".to_string()],
        }
    }

    #[test]
    fn test_outcome_from_findings() {
        assert_eq!(ScanOutcome::from_findings(Vec::new()), ScanOutcome::Clean);
        let outcome = ScanOutcome::from_findings(vec![vuln("PYSEC-1")]);
        assert_eq!(outcome.vulnerabilities().unwrap().len(), 1);
    }

    #[test]
    fn test_failed_is_not_empty() {
        let outcome = ScanOutcome::failed("pip-audit exited with status 2");
        assert!(outcome.is_failed());
        assert!(outcome.vulnerabilities().is_none());
    }

    #[test]
    fn test_scan_result_has_vulnerabilities() {
        let mut result = ScanResult::new("https://github.com/a/b", "main", vec![]);
        assert!(!result.has_vulnerabilities());

        result.security = Some(SecurityReport::new(ScanOutcome::failed("boom"), vec![], vec![]));
        assert!(!result.has_vulnerabilities());

        result.security = Some(SecurityReport::new(
            ScanOutcome::from_findings(vec![vuln("PYSEC-1")]),
            vec!["jinja2==2.4.1".to_string()],
            vec![],
        ));
        assert!(result.has_vulnerabilities());
    }

    #[test]
    fn test_security_report_json_shape() {
        let report = SecurityReport::new(
            ScanOutcome::from_findings(vec![vuln("PYSEC-1")]),
            vec!["jinja2==2.4.1".to_string()],
            vec![SkippedDependency::new("ghost", SkipReason::RegistryMiss)],
        );
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], "found");
        assert_eq!(json["vulnerabilities"][0]["id"], "PYSEC-1");
        assert_eq!(json["skipped"][0]["reason"]["kind"], "registry_miss");
    }
}
