//! Shared HTTP client construction.

use crate::error::{Error, Result};
use std::time::Duration;

pub const USER_AGENT: &str = concat!("depdoctor/", env!("CARGO_PKG_VERSION"));

/// Builds a client whose every request is bounded by `timeout`.
pub fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .user_agent(USER_AGENT)
        .build()?;
    Ok(client)
}

/// Maps a transport error, turning deadline hits into [`Error::Timeout`].
pub fn request_error(err: reqwest::Error, timeout: Duration) -> Error {
    if err.is_timeout() {
        Error::Timeout(timeout.as_secs())
    } else {
        Error::Http(err)
    }
}
