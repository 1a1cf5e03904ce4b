//! End-to-end pipeline runs with in-memory sources.

use async_trait::async_trait;
use depdoctor::checker::{AuditRunner, VersionRegistry};
use depdoctor::config::IgnoreConfig;
use depdoctor::manifest::{ManifestSource, RepoRef};
use depdoctor::model::SkipReason;
use depdoctor::{Doctor, Error, ScanOptions, ScanOutcome, Vulnerability};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

const REPO: &str = "https://github.com/acme/widgets";

struct StaticSource {
    files: HashMap<&'static str, &'static str>,
}

#[async_trait]
impl ManifestSource for StaticSource {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn fetch_file(
        &self,
        _repo: &RepoRef,
        path: &str,
        _branch: &str,
    ) -> depdoctor::Result<Option<String>> {
        Ok(self.files.get(path).map(|s| s.to_string()))
    }
}

struct MapRegistry(HashMap<&'static str, &'static str>);

#[async_trait]
impl VersionRegistry for MapRegistry {
    fn name(&self) -> &'static str {
        "map"
    }

    async fn latest_version(&self, package: &str) -> Option<String> {
        self.0.get(package).map(|v| v.to_string())
    }
}

#[derive(Default)]
struct RecordingAudit {
    findings: Vec<Vulnerability>,
    submitted: Mutex<Vec<Vec<String>>>,
}

#[async_trait]
impl AuditRunner for RecordingAudit {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn audit(&self, pinned: &[String]) -> ScanOutcome {
        self.submitted.lock().unwrap().push(pinned.to_vec());
        ScanOutcome::from_findings(self.findings.clone())
    }
}

fn vuln(package: &str, version: &str, id: &str) -> Vulnerability {
    Vulnerability {
        package: package.to_string(),
        version: version.to_string(),
        id: id.to_string(),
        description: None,
        fix_versions: vec![],
    }
}

fn registry() -> Arc<MapRegistry> {
    Arc::new(MapRegistry(
        [
            ("click", "8.2.1"),
            ("jinja2", "3.1.4"),
            ("numpy", "2.1.0"),
            ("git-pkg", "1.0.0"),
        ]
        .into_iter()
        .collect(),
    ))
}

fn source(requirements: &'static str) -> Arc<StaticSource> {
    Arc::new(StaticSource {
        files: [("requirements.txt", requirements)].into_iter().collect(),
    })
}

const REQUIREMENTS: &str = "\
click==8.1.3
jinja2
# tooling
numpy>=1.26

git-pkg @ https://example.com/git-pkg-1.0.0.tar.gz
unknown-pkg>=0.1
";

#[tokio::test]
async fn test_full_scan() {
    let audit = Arc::new(RecordingAudit {
        findings: vec![
            vuln("jinja2", "3.1.4", "GHSA-aaaa"),
            vuln("unrelated", "0.1", "PYSEC-0000"),
        ],
        ..Default::default()
    });
    let doctor = Doctor::new(source(REQUIREMENTS), registry(), audit.clone());

    let result = doctor.scan(REPO, None, ScanOptions::default()).await.unwrap();

    assert_eq!(result.repository, REPO);
    assert_eq!(result.branch, "main");
    assert_eq!(
        result.dependencies,
        vec![
            "click==8.1.3",
            "jinja2",
            "numpy>=1.26",
            "git-pkg @ https://example.com/git-pkg-1.0.0.tar.gz",
            "unknown-pkg>=0.1",
        ]
    );

    let updates = result.updates.as_ref().unwrap();
    let outdated: Vec<_> = updates.updates.iter().map(|u| u.package.as_str()).collect();
    assert_eq!(outdated, vec!["click", "numpy"]);
    let reasons: Vec<_> = updates.skipped.iter().map(|s| s.reason.clone()).collect();
    assert_eq!(
        reasons,
        vec![
            SkipReason::Unversioned,
            SkipReason::UrlDependency,
            SkipReason::RegistryMiss,
        ]
    );

    let security = result.security.as_ref().unwrap();
    assert_eq!(
        security.submitted,
        vec!["click==8.1.3", "jinja2==3.1.4", "numpy==2.1.0", "git-pkg==1.0.0"]
    );
    assert_eq!(security.skipped.len(), 1);
    assert_eq!(security.skipped[0].declaration, "unknown-pkg>=0.1");

    // Findings for packages that were never submitted are dropped.
    let vulns = security.vulnerabilities().unwrap();
    assert_eq!(vulns.len(), 1);
    assert_eq!(vulns[0].id, "GHSA-aaaa");
    assert!(result.has_vulnerabilities());

    assert_eq!(audit.submitted.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_ignore_lists_apply() {
    let audit = Arc::new(RecordingAudit {
        findings: vec![vuln("click", "8.1.3", "PYSEC-2023-0001")],
        ..Default::default()
    });
    let doctor = Doctor::new(source("click==8.1.3\nNumPy>=1.26\n"), registry(), audit.clone())
        .with_ignore(IgnoreConfig {
            packages: vec!["numpy".to_string()],
            vulnerabilities: vec!["pysec-2023-0001".to_string()],
        });

    let result = doctor.scan(REPO, None, ScanOptions::default()).await.unwrap();

    let updates = result.updates.unwrap();
    assert_eq!(updates.updates.len(), 1);
    assert_eq!(updates.updates[0].package, "click");

    let security = result.security.unwrap();
    assert_eq!(security.submitted, vec!["click==8.1.3"]);
    assert_eq!(security.outcome, ScanOutcome::Clean);
}

#[tokio::test]
async fn test_empty_repository_runs_no_checks() {
    let audit = Arc::new(RecordingAudit::default());
    let doctor = Doctor::new(
        Arc::new(StaticSource {
            files: HashMap::new(),
        }),
        registry(),
        audit.clone(),
    );

    let result = doctor.scan(REPO, Some("dev"), ScanOptions::default()).await.unwrap();

    assert_eq!(result.branch, "dev");
    assert!(result.dependencies.is_empty());
    assert!(result.updates.is_none());
    assert!(result.security.is_none());
    assert!(audit.submitted.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_nothing_resolvable_skips_audit() {
    let audit = Arc::new(RecordingAudit::default());
    let doctor = Doctor::new(source("unknown-pkg\nother-unknown>=2\n"), registry(), audit.clone());

    let report = doctor
        .security_scan(&["unknown-pkg".to_string(), "other-unknown>=2".to_string()])
        .await;

    assert_eq!(report.outcome, ScanOutcome::Clean);
    assert!(report.submitted.is_empty());
    assert_eq!(report.skipped.len(), 2);
    assert!(audit.submitted.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_selected_checks_only() {
    let audit = Arc::new(RecordingAudit::default());
    let doctor = Doctor::new(source("click==8.1.3\n"), registry(), audit.clone());
    let options = ScanOptions {
        check_updates: true,
        security_scan: false,
    };

    let result = doctor.scan(REPO, None, options).await.unwrap();

    assert!(result.updates.is_some());
    assert!(result.security.is_none());
    assert!(audit.submitted.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_invalid_url_is_an_error() {
    let doctor = Doctor::new(source("click\n"), registry(), Arc::new(RecordingAudit::default()));

    let err = doctor
        .scan("https://example.com/not/github", None, ScanOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidRepositoryUrl(_)));
}

#[tokio::test]
async fn test_report_json_shape() {
    let audit = Arc::new(RecordingAudit {
        findings: vec![vuln("click", "8.1.3", "GHSA-bbbb")],
        ..Default::default()
    });
    let doctor = Doctor::new(source("click==8.1.3\njinja2\n"), registry(), audit);

    let result = doctor.scan(REPO, None, ScanOptions::default()).await.unwrap();
    let json = serde_json::to_value(&result).unwrap();

    assert_eq!(json["repository"], REPO);
    assert!(json["scan_time"].is_string());
    assert_eq!(json["updates"]["updates"][0]["latest_version"], "8.2.1");
    assert_eq!(json["updates"]["skipped"][0]["reason"]["kind"], "unversioned");
    assert_eq!(json["security"]["status"], "found");
    assert_eq!(json["security"]["vulnerabilities"][0]["id"], "GHSA-bbbb");
    assert_eq!(json["security"]["submitted"][1], "jinja2==3.1.4");
}

#[tokio::test]
async fn test_listing_only_runs_no_checks() {
    let audit = Arc::new(RecordingAudit::default());
    let doctor = Doctor::new(source("click==8.1.3\njinja2\n"), registry(), audit.clone());
    let options = ScanOptions {
        check_updates: false,
        security_scan: false,
    };

    let result = doctor.scan(REPO, Some("release"), options).await.unwrap();

    assert_eq!(result.branch, "release");
    assert_eq!(result.dependencies, vec!["click==8.1.3", "jinja2"]);
    assert!(result.updates.is_none());
    assert!(result.security.is_none());
    assert!(audit.submitted.lock().unwrap().is_empty());
}
