use serde::{Deserialize, Serialize};

/// One finding for one pinned package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vulnerability {
    pub package: String,
    pub version: String,
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub fix_versions: Vec<String>,
}

/// Result of one audit run.
///
/// `Failed` means the scan could not complete. It is never the same thing
/// as a clean scan, so callers must not collapse it into an empty list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ScanOutcome {
    Clean,
    Found { vulnerabilities: Vec<Vulnerability> },
    Failed { reason: String },
}

impl ScanOutcome {
    pub fn from_findings(vulnerabilities: Vec<Vulnerability>) -> Self {
        if vulnerabilities.is_empty() {
            ScanOutcome::Clean
        } else {
            ScanOutcome::Found { vulnerabilities }
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        ScanOutcome::Failed {
            reason: reason.into(),
        }
    }

    /// The findings, or `None` if the scan did not complete.
    pub fn vulnerabilities(&self) -> Option<&[Vulnerability]> {
        match self {
            ScanOutcome::Clean => Some(&[]),
            ScanOutcome::Found { vulnerabilities } => Some(vulnerabilities),
            ScanOutcome::Failed { .. } => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, ScanOutcome::Failed { .. })
    }
}
