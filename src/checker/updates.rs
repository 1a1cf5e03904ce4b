use super::{VersionRegistry, DEFAULT_CONCURRENCY};
use crate::model::{SkipReason, SkippedDependency, UpdateRecord, UpdateReport};
use crate::specifier::Specifier;
use crate::version::Version;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{debug, warn};

/// Finds declared dependencies whose latest release is newer than the
/// version in their constraint.
///
/// Only the first clause of a constraint is compared: `>=1.0,<2.0` is
/// treated as "declared 1.0". Registry lookups run concurrently but the
/// report keeps declaration order.
pub struct UpdateChecker {
    registry: Arc<dyn VersionRegistry>,
    concurrency: usize,
}

enum Checked {
    Outdated(UpdateRecord),
    Current,
    Skipped(SkippedDependency),
}

impl UpdateChecker {
    pub fn new(registry: Arc<dyn VersionRegistry>) -> Self {
        Self {
            registry,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub async fn check(&self, declarations: &[String]) -> UpdateReport {
        let results: Vec<Checked> = stream::iter(declarations)
            .map(|declaration| self.check_one(declaration))
            .buffered(self.concurrency)
            .collect()
            .await;

        results
            .into_iter()
            .fold(UpdateReport::default(), |mut report, checked| {
                match checked {
                    Checked::Outdated(record) => report.updates.push(record),
                    Checked::Skipped(skipped) => report.skipped.push(skipped),
                    Checked::Current => {}
                }
                report
            })
    }

    async fn check_one(&self, declaration: &str) -> Checked {
        let skip = |reason| Checked::Skipped(SkippedDependency::new(declaration, reason));
        let spec = Specifier::parse(declaration);

        if spec.is_url() {
            return skip(SkipReason::UrlDependency);
        }

        // Nothing to compare an unconstrained dependency against.
        let Some(clause) = spec.constraint() else {
            return skip(SkipReason::Unversioned);
        };

        let declared = match Version::parse(&clause.version) {
            Ok(v) => v,
            Err(e) => {
                warn!(declaration, error = %e, "could not parse declared version");
                return skip(SkipReason::InvalidVersion(clause.version.clone()));
            }
        };

        let Some(latest_str) = self.registry.latest_version(&spec.name).await else {
            return skip(SkipReason::RegistryMiss);
        };

        let latest = match Version::parse(&latest_str) {
            Ok(v) => v,
            Err(e) => {
                warn!(package = %spec.name, error = %e, "registry returned an invalid version");
                return skip(SkipReason::InvalidVersion(latest_str));
            }
        };

        if latest > declared {
            debug!(package = %spec.name, declared = %declared, latest = %latest, "update available");
            Checked::Outdated(UpdateRecord {
                package: spec.name.clone(),
                specifier: spec.clauses_string(),
                latest_version: latest_str,
            })
        } else {
            Checked::Current
        }
    }
}
