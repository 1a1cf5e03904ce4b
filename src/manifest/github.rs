use super::{ManifestSource, RepoRef};
use crate::error::{Error, Result};
use crate::http::{build_client, request_error};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::{StatusCode, Url};
use std::time::Duration;

pub const GITHUB_API_URL: &str = "https://api.github.com";

/// Reads single files through the GitHub contents API.
///
/// Files are requested with the raw media type, so no base64 decoding is
/// needed. Set a token for private repositories and higher rate limits.
pub struct GitHubSource {
    client: reqwest::Client,
    api_url: String,
    token: Option<String>,
    timeout: Duration,
}

impl GitHubSource {
    pub fn new(token: Option<String>, timeout: Duration) -> Result<Self> {
        Self::with_base_url(GITHUB_API_URL, token, timeout)
    }

    pub fn with_base_url(
        api_url: impl Into<String>,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            api_url: api_url.into(),
            token,
            timeout,
        })
    }

    fn contents_url(&self, repo: &RepoRef, path: &str, branch: &str) -> Result<Url> {
        let mut url = Url::parse(&self.api_url)
            .map_err(|e| Error::Config(format!("invalid GitHub API URL '{}': {}", self.api_url, e)))?;
        url.path_segments_mut()
            .map_err(|_| Error::Config(format!("GitHub API URL cannot be a base: {}", self.api_url)))?
            .pop_if_empty()
            .extend(["repos", repo.owner.as_str(), repo.repo.as_str(), "contents"])
            .extend(path.split('/'));
        url.query_pairs_mut().append_pair("ref", branch);
        Ok(url)
    }
}

#[async_trait]
impl ManifestSource for GitHubSource {
    fn name(&self) -> &'static str {
        "GitHub"
    }

    async fn fetch_file(&self, repo: &RepoRef, path: &str, branch: &str) -> Result<Option<String>> {
        let url = self.contents_url(repo, path, branch)?;
        tracing::debug!(%url, "fetching file from GitHub");

        let mut request = self
            .client
            .get(url)
            .header(ACCEPT, "application/vnd.github.raw+json")
            .header("X-GitHub-Api-Version", "2022-11-28");
        if let Some(token) = &self.token {
            request = request.header(AUTHORIZATION, format!("Bearer {}", token));
        }

        let response = request
            .send()
            .await
            .map_err(|e| request_error(e, self.timeout))?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let text = response
                    .text()
                    .await
                    .map_err(|e| request_error(e, self.timeout))?;
                Ok(Some(text))
            }
            status => Err(Error::upstream(
                self.name(),
                format!("HTTP {} fetching {} from {}", status, path, repo),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contents_url() {
        let source =
            GitHubSource::with_base_url("https://api.github.com/", None, Duration::from_secs(5))
                .unwrap();
        let repo: RepoRef = "https://github.com/psf/black".parse().unwrap();
        let url = source.contents_url(&repo, "pyproject.toml", "main").unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.github.com/repos/psf/black/contents/pyproject.toml?ref=main"
        );
    }

    #[test]
    fn test_contents_url_encodes_branch() {
        let source =
            GitHubSource::with_base_url("http://localhost:1234", None, Duration::from_secs(5))
                .unwrap();
        let repo: RepoRef = "github.com/a/b".parse().unwrap();
        let url = source
            .contents_url(&repo, "requirements.txt", "release/1.x")
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:1234/repos/a/b/contents/requirements.txt?ref=release%2F1.x"
        );
    }
}
