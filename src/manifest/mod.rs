//! Manifest extraction.
//!
//! Turns a repository URL into the ordered list of dependency declarations
//! it ships. `pyproject.toml` is tried first; `requirements.txt` is the
//! fallback. A repository with neither yields an empty list.
//!
//! # Example
//!
//! ```no_run
//! use depdoctor::manifest::{DependencyExtractor, GitHubSource};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> depdoctor::Result<()> {
//!     let source = GitHubSource::new(None, Duration::from_secs(30))?;
//!     let extractor = DependencyExtractor::new(Arc::new(source));
//!     let deps = extractor.extract("https://github.com/psf/black", "main").await?;
//!     for dep in deps {
//!         println!("{}", dep);
//!     }
//!     Ok(())
//! }
//! ```

mod github;
mod parse;

pub use github::{GitHubSource, GITHUB_API_URL};
pub use parse::{parse_pyproject, parse_requirements};

use crate::error::{Error, Result};
use async_trait::async_trait;
use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, LazyLock};
use tracing::{error, info, warn};

pub const PYPROJECT: &str = "pyproject.toml";
pub const REQUIREMENTS: &str = "requirements.txt";

static GITHUB_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"github\.com/([^/?#\s]+)/([^/?#\s]+?)(?:\.git)?(?:[/?#]|$)")
        .expect("GitHub URL pattern is valid")
});

/// Owner and name of a GitHub repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRef {
    pub owner: String,
    pub repo: String,
}

impl FromStr for RepoRef {
    type Err = Error;

    fn from_str(url: &str) -> Result<Self> {
        let caps = GITHUB_URL_RE
            .captures(url.trim())
            .ok_or_else(|| Error::InvalidRepositoryUrl(url.to_string()))?;
        Ok(Self {
            owner: caps[1].to_string(),
            repo: caps[2].to_string(),
        })
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

/// A place manifest files can be read from.
#[async_trait]
pub trait ManifestSource: Send + Sync {
    fn name(&self) -> &'static str;

    /// Fetches a file at `branch`.
    ///
    /// Returns `Ok(None)` if the file (or the repository) does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error on connectivity failures and unexpected responses.
    async fn fetch_file(&self, repo: &RepoRef, path: &str, branch: &str) -> Result<Option<String>>;
}

pub struct DependencyExtractor {
    source: Arc<dyn ManifestSource>,
}

impl DependencyExtractor {
    pub fn new(source: Arc<dyn ManifestSource>) -> Self {
        Self { source }
    }

    /// Returns the declared dependencies of the repository at `url`.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidRepositoryUrl`] if `url` is not a GitHub repository URL.
    /// - An upstream error if neither manifest could be fetched because the
    ///   source was unreachable. Missing files are not errors.
    pub async fn extract(&self, url: &str, branch: &str) -> Result<Vec<String>> {
        let repo: RepoRef = url.parse().inspect_err(|_| {
            error!(url, "invalid GitHub URL format");
        })?;
        info!(owner = %repo.owner, repo = %repo.repo, branch, "parsed GitHub repository");

        let mut pyproject_error = None;
        match self.source.fetch_file(&repo, PYPROJECT, branch).await {
            Ok(Some(content)) => match parse_pyproject(&content) {
                Ok(Some(deps)) => {
                    info!(count = deps.len(), "dependencies read from pyproject.toml");
                    return Ok(deps);
                }
                Ok(None) => info!("pyproject.toml has no dependency table, falling back to requirements.txt"),
                Err(e) => warn!(error = %e, "failed to parse pyproject.toml, falling back to requirements.txt"),
            },
            Ok(None) => info!("pyproject.toml not found, falling back to requirements.txt"),
            Err(e) => {
                warn!(error = %e, "failed to fetch pyproject.toml, falling back to requirements.txt");
                pyproject_error = Some(e);
            }
        }

        match self.source.fetch_file(&repo, REQUIREMENTS, branch).await {
            Ok(Some(content)) => {
                let deps = parse_requirements(&content);
                info!(count = deps.len(), "dependencies read from requirements.txt");
                Ok(deps)
            }
            Ok(None) => {
                info!("no dependency files (pyproject.toml or requirements.txt) found");
                Ok(Vec::new())
            }
            Err(e) => {
                error!(error = %e, "failed to fetch requirements.txt");
                match pyproject_error {
                    // Neither file could be reached: nothing is known about the repository.
                    Some(_) => Err(e),
                    None => Ok(Vec::new()),
                }
            }
        }
    }
}
