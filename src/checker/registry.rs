use crate::cache::Cache;
use crate::error::{Error, Result};
use crate::http::{build_client, request_error};
use crate::specifier::normalize_name;
use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, error, info};

pub const PYPI_URL: &str = "https://pypi.org";

/// Source of "latest published version" answers.
#[async_trait]
pub trait VersionRegistry: Send + Sync {
    fn name(&self) -> &'static str;

    /// The current published version of `package`, or `None` if the
    /// registry has no record of it or could not be reached.
    async fn latest_version(&self, package: &str) -> Option<String>;
}

/// Client for the PyPI JSON API (`/pypi/{package}/json`).
pub struct PyPiRegistry {
    client: reqwest::Client,
    base_url: String,
    cache: Option<Cache>,
    timeout: Duration,
}

#[derive(Deserialize)]
struct PypiProject {
    info: Option<PypiInfo>,
}

#[derive(Deserialize)]
struct PypiInfo {
    version: Option<String>,
}

impl PyPiRegistry {
    pub fn new(timeout: Duration) -> Result<Self> {
        Self::with_base_url(PYPI_URL, timeout)
    }

    pub fn with_base_url(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: base_url.into(),
            cache: None,
            timeout,
        })
    }

    pub fn with_cache(mut self, cache: Cache) -> Self {
        self.cache = Some(cache);
        self
    }

    fn project_url(&self, package: &str) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| Error::Config(format!("invalid registry URL '{}': {}", self.base_url, e)))?;
        url.path_segments_mut()
            .map_err(|_| Error::Config(format!("registry URL cannot be a base: {}", self.base_url)))?
            .pop_if_empty()
            .extend(["pypi", package, "json"]);
        Ok(url)
    }

    /// Distinguishes "no such package" (`Ok(None)`) from failures.
    async fn lookup(&self, package: &str) -> Result<Option<String>> {
        let url = self.project_url(package)?;

        let response = self
            .client
            .get(url)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| request_error(e, self.timeout))?;

        match response.status() {
            StatusCode::NOT_FOUND => return Ok(None),
            status if !status.is_success() => {
                return Err(Error::upstream(self.name(), format!("HTTP {}", status)));
            }
            _ => {}
        }

        let project: PypiProject = response.json().await.map_err(|e| {
            if e.is_timeout() {
                Error::Timeout(self.timeout.as_secs())
            } else {
                Error::upstream(self.name(), format!("unexpected response format: {}", e))
            }
        })?;

        project
            .info
            .and_then(|info| info.version)
            .filter(|v| !v.trim().is_empty())
            .map(Some)
            .ok_or_else(|| Error::upstream(self.name(), "unexpected response format: missing info.version"))
    }
}

#[async_trait]
impl VersionRegistry for PyPiRegistry {
    fn name(&self) -> &'static str {
        "PyPI"
    }

    async fn latest_version(&self, package: &str) -> Option<String> {
        let package = package.trim();
        if package.is_empty() {
            return None;
        }

        let cache_key = format!("pypi_{}", normalize_name(package));
        if let Some(cache) = &self.cache {
            if let Some(version) = cache.get::<String>(&cache_key) {
                debug!(package, version = %version, "registry cache hit");
                return Some(version);
            }
        }

        match self.lookup(package).await {
            Ok(Some(version)) => {
                if let Some(cache) = &self.cache {
                    let _ = cache.set(&cache_key, &version);
                }
                Some(version)
            }
            Ok(None) => {
                info!(package, "package not found on PyPI");
                None
            }
            Err(e) => {
                error!(package, error = %e, "failed to fetch from PyPI");
                None
            }
        }
    }
}
