use super::{VersionRegistry, DEFAULT_CONCURRENCY};
use crate::error::{Error, Result};
use crate::model::{ScanOutcome, SecurityReport, SkipReason, SkippedDependency, Vulnerability};
use crate::specifier::{normalize_name, Specifier};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde_json::Value;
use std::collections::HashSet;
use std::io::Write;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tracing::{error, info, warn};

/// The external vulnerability lookup.
///
/// Implementations take a batch of exact pins and return a tagged outcome,
/// so callers never see raw exit codes.
#[async_trait]
pub trait AuditRunner: Send + Sync {
    fn name(&self) -> &'static str;
    async fn audit(&self, pinned: &[String]) -> ScanOutcome;
}

/// Runs `pip-audit` (or a compatible command) over a temporary
/// requirements file.
///
/// Exit status 0 means clean and 1 means vulnerabilities were found; both
/// are successful runs. Anything else fails the scan.
pub struct PipAudit {
    command: Vec<String>,
    timeout: Duration,
}

impl PipAudit {
    pub fn new(command: Vec<String>, timeout: Duration) -> Self {
        Self { command, timeout }
    }

    async fn run(&self, pinned: &[String]) -> Result<ScanOutcome> {
        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| Error::Config("audit command is empty".to_string()))?;

        // Removed when dropped, on every return path.
        let mut manifest = tempfile::Builder::new()
            .prefix("depdoctor-")
            .suffix(".txt")
            .tempfile()?;
        manifest.write_all(pinned.join("\n").as_bytes())?;
        manifest.flush()?;

        let mut command = Command::new(program);
        command
            .args(args)
            .arg("-r")
            .arg(manifest.path())
            .args(["--format", "json"])
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| Error::Timeout(self.timeout.as_secs()))??;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        Ok(interpret_audit(output.status.code(), &stdout, &stderr))
    }
}

impl Default for PipAudit {
    fn default() -> Self {
        Self::new(
            vec!["uv".to_string(), "run".to_string(), "pip-audit".to_string()],
            Duration::from_secs(300),
        )
    }
}

#[async_trait]
impl AuditRunner for PipAudit {
    fn name(&self) -> &'static str {
        "pip-audit"
    }

    async fn audit(&self, pinned: &[String]) -> ScanOutcome {
        match self.run(pinned).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(error = %e, "security scan could not be run");
                ScanOutcome::failed(e.to_string())
            }
        }
    }
}

/// Maps an audit process result to an outcome.
fn interpret_audit(code: Option<i32>, stdout: &str, stderr: &str) -> ScanOutcome {
    match code {
        Some(0) | Some(1) => {}
        Some(code) => {
            error!(code, stderr = %stderr.trim(), "pip-audit command failed");
            return ScanOutcome::failed(format!("pip-audit exited with status {}", code));
        }
        None => {
            error!(stderr = %stderr.trim(), "pip-audit was terminated by a signal");
            return ScanOutcome::failed("pip-audit was terminated by a signal");
        }
    }

    if stdout.trim().is_empty() {
        info!("no vulnerabilities found by pip-audit");
        return ScanOutcome::Clean;
    }

    match parse_audit_output(stdout) {
        Ok(vulnerabilities) => ScanOutcome::from_findings(vulnerabilities),
        Err(e) => {
            error!(error = %e, output = %stdout.trim(), "failed to decode JSON from pip-audit");
            ScanOutcome::failed(format!("invalid pip-audit output: {}", e))
        }
    }
}

/// Flattens pip-audit JSON into one record per (package, finding).
///
/// Accepts a list of package entries, a single entry, or the
/// `{"dependencies": [...]}` document. Entries without a name or version
/// and findings without an id are skipped.
///
/// # Errors
///
/// Returns an error if `output` is not JSON.
pub fn parse_audit_output(output: &str) -> serde_json::Result<Vec<Vulnerability>> {
    let data: Value = serde_json::from_str(output)?;

    let entries = match data {
        Value::Array(items) => items,
        Value::Object(mut doc) if doc.get("dependencies").is_some_and(Value::is_array) => {
            match doc.remove("dependencies") {
                Some(Value::Array(items)) => items,
                _ => Vec::new(),
            }
        }
        other => vec![other],
    };

    let mut vulnerabilities = Vec::new();
    for entry in &entries {
        let Some(package) = entry.as_object() else {
            warn!(item = %entry, "skipping unexpected item in pip-audit output");
            continue;
        };
        let (Some(name), Some(version)) = (
            package.get("name").and_then(Value::as_str),
            package.get("version").and_then(Value::as_str),
        ) else {
            warn!(item = %entry, "skipping pip-audit entry without name or version");
            continue;
        };

        let findings = package
            .get("vulns")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();

        for finding in findings {
            let Some(id) = finding.get("id").and_then(Value::as_str) else {
                warn!(package = name, "skipping pip-audit finding without an id");
                continue;
            };
            let fix_versions = finding
                .get("fix_versions")
                .and_then(Value::as_array)
                .map(|versions| {
                    versions
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();

            vulnerabilities.push(Vulnerability {
                package: name.to_string(),
                version: version.to_string(),
                id: id.to_string(),
                description: finding
                    .get("description")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                fix_versions,
            });
        }
    }

    Ok(vulnerabilities)
}

/// Pins every declaration to an exact version and audits the batch.
pub struct SecurityScanner {
    registry: Arc<dyn VersionRegistry>,
    runner: Arc<dyn AuditRunner>,
    concurrency: usize,
}

impl SecurityScanner {
    pub fn new(registry: Arc<dyn VersionRegistry>, runner: Arc<dyn AuditRunner>) -> Self {
        Self {
            registry,
            runner,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub async fn scan(&self, declarations: &[String]) -> SecurityReport {
        info!(count = declarations.len(), "resolving dependency versions for security scan");

        let resolved: Vec<std::result::Result<String, SkippedDependency>> =
            stream::iter(declarations)
                .map(|declaration| self.pin(declaration))
                .buffered(self.concurrency)
                .collect()
                .await;

        let mut submitted = Vec::new();
        let mut skipped = Vec::new();
        for item in resolved {
            match item {
                Ok(pinned) => submitted.push(pinned),
                Err(skip) => skipped.push(skip),
            }
        }

        if submitted.is_empty() {
            warn!("no dependencies could be resolved for scanning");
            return SecurityReport::new(ScanOutcome::Clean, submitted, skipped);
        }

        let runner = self.runner.name();
        info!(runner, count = submitted.len(), "running security audit");
        let outcome = self.runner.audit(&submitted).await;
        let outcome = retain_submitted(outcome, &submitted);
        match &outcome {
            ScanOutcome::Clean => info!(runner, "no vulnerabilities found"),
            ScanOutcome::Found { vulnerabilities } => {
                info!(runner, count = vulnerabilities.len(), "vulnerabilities found")
            }
            ScanOutcome::Failed { reason } => {
                error!(runner, reason = %reason, "security scan failed to complete")
            }
        }

        SecurityReport::new(outcome, submitted, skipped)
    }

    async fn pin(&self, declaration: &str) -> std::result::Result<String, SkippedDependency> {
        let spec = Specifier::parse(declaration);
        if spec.is_pinned() {
            return Ok(declaration.to_string());
        }

        match self.registry.latest_version(&spec.name).await {
            Some(latest) => {
                let pinned = spec.pinned(&latest);
                info!(from = declaration, to = %pinned, "resolved unpinned dependency for scanning");
                Ok(pinned)
            }
            None => {
                warn!(package = %spec.name, "could not resolve latest version, skipping scan for it");
                Err(SkippedDependency::new(declaration, SkipReason::RegistryMiss))
            }
        }
    }
}

/// Drops findings for packages that were never submitted.
fn retain_submitted(outcome: ScanOutcome, submitted: &[String]) -> ScanOutcome {
    let vulnerabilities = match outcome {
        ScanOutcome::Found { vulnerabilities } => vulnerabilities,
        other => return other,
    };

    let names: HashSet<String> = submitted
        .iter()
        .map(|pinned| normalize_name(&Specifier::parse(pinned).name))
        .collect();

    let (kept, dropped): (Vec<_>, Vec<_>) = vulnerabilities
        .into_iter()
        .partition(|v| names.contains(&normalize_name(&v.package)));
    for v in &dropped {
        warn!(package = %v.package, id = %v.id, "ignoring finding for a package that was not submitted");
    }

    ScanOutcome::from_findings(kept)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_FINDINGS: &str = r#"[
        {
            "name": "jinja2",
            "version": "2.4.1",
            "vulns": [
                {"id": "PYSEC-2019-217", "description": "sandbox escape", "fix_versions": ["2.10.1"]},
                {"id": "GHSA-462w-v97r-4m45", "fix_versions": ["2.11.3", "3.0.0"]}
            ]
        }
    ]"#;

    #[test]
    fn test_parse_flattens_findings() {
        let vulns = parse_audit_output(TWO_FINDINGS).unwrap();
        assert_eq!(vulns.len(), 2);
        assert_eq!(vulns[0].package, "jinja2");
        assert_eq!(vulns[0].id, "PYSEC-2019-217");
        assert_eq!(vulns[0].description.as_deref(), Some("sandbox escape"));
        assert_eq!(vulns[1].fix_versions, vec!["2.11.3", "3.0.0"]);
        assert_eq!(vulns[1].description, None);
    }

    #[test]
    fn test_parse_single_object_and_document() {
        let single = r#"{"name": "flask", "version": "0.5", "vulns": [{"id": "PYSEC-1"}]}"#;
        assert_eq!(parse_audit_output(single).unwrap().len(), 1);

        let document = r#"{
            "dependencies": [
                {"name": "flask", "version": "0.5", "vulns": [{"id": "PYSEC-1", "fix_versions": []}]},
                {"name": "private-pkg", "skip_reason": "not on PyPI"}
            ],
            "fixes": []
        }"#;
        let vulns = parse_audit_output(document).unwrap();
        assert_eq!(vulns.len(), 1);
        assert!(vulns[0].fix_versions.is_empty());
    }

    #[test]
    fn test_parse_skips_malformed_entries() {
        let output = r#"[
            "garbage",
            {"version": "1.0", "vulns": [{"id": "X"}]},
            {"name": "ok", "version": "1.0", "vulns": [{"description": "no id"}, {"id": "Y"}]}
        ]"#;
        let vulns = parse_audit_output(output).unwrap();
        assert_eq!(vulns.len(), 1);
        assert_eq!(vulns[0].id, "Y");
    }

    #[test]
    fn test_parse_rejects_non_json() {
        assert!(parse_audit_output("Traceback (most recent call last):").is_err());
    }

    #[test]
    fn test_interpret_exit_codes() {
        assert_eq!(interpret_audit(Some(0), "[]", ""), ScanOutcome::Clean);
        assert_eq!(interpret_audit(Some(0), "  \n", ""), ScanOutcome::Clean);

        let found = interpret_audit(Some(1), TWO_FINDINGS, "");
        assert_eq!(found.vulnerabilities().unwrap().len(), 2);

        assert!(interpret_audit(Some(2), "[]", "usage error").is_failed());
        assert!(interpret_audit(None, "", "").is_failed());
        assert!(interpret_audit(Some(1), "not json", "").is_failed());
    }

    #[test]
    fn test_retain_submitted() {
        let outcome = ScanOutcome::from_findings(parse_audit_output(TWO_FINDINGS).unwrap());
        let kept = retain_submitted(outcome.clone(), &["Jinja2==2.4.1".to_string()]);
        assert_eq!(kept.vulnerabilities().unwrap().len(), 2);

        let dropped = retain_submitted(outcome, &["flask==3.0.0".to_string()]);
        assert_eq!(dropped, ScanOutcome::Clean);
    }
}
