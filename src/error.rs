//! Error types for depdoctor.
//!
//! Only whole-operation failures surface as [`Error`]. Per-dependency
//! problems (a registry miss, an unparseable version) are recorded as
//! skipped entries instead, see [`crate::model::SkippedDependency`].

use thiserror::Error;

/// Result type alias using the depdoctor [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The repository identifier could not be parsed. Never retried.
    #[error("Invalid GitHub URL format: {0}")]
    InvalidRepositoryUrl(String),

    /// The upstream service answered with something we cannot use.
    #[error("Upstream error from {service}: {message}")]
    Upstream { service: String, message: String },

    /// A blocking call ran past its deadline.
    #[error("Timed out after {0} seconds")]
    Timeout(u64),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl Error {
    pub fn upstream(service: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Upstream {
            service: service.into(),
            message: message.into(),
        }
    }

    /// True for failures caused by the caller's input rather than the
    /// environment.
    pub fn is_user_error(&self) -> bool {
        matches!(self, Error::InvalidRepositoryUrl(_))
    }

    /// True for connectivity problems and unexpected upstream responses.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            Error::Upstream { .. } | Error::Timeout(_) | Error::Http(_)
        )
    }
}
