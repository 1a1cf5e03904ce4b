//! Dependency health checks for Python projects hosted on GitHub.
//!
//! depdoctor reads a repository's declared dependencies (`pyproject.toml`,
//! falling back to `requirements.txt`), compares them with the latest
//! releases on PyPI and audits them for known vulnerabilities with
//! `pip-audit`.
//!
//! ```no_run
//! use depdoctor::{Config, Doctor, ScanOptions};
//!
//! # async fn run() -> depdoctor::Result<()> {
//! let doctor = Doctor::from_config(&Config::load()?)?;
//! let result = doctor
//!     .scan("https://github.com/psf/black", None, ScanOptions::default())
//!     .await?;
//! println!("{} dependencies", result.dependencies.len());
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod checker;
pub mod config;
pub mod doctor;
pub mod error;
pub mod http;
pub mod logging;
pub mod manifest;
pub mod model;
pub mod output;
pub mod server;
pub mod specifier;
pub mod version;

pub use cache::Cache;
pub use config::Config;
pub use doctor::{Doctor, ScanOptions};
pub use error::{Error, Result};
pub use model::{ScanOutcome, ScanResult, SecurityReport, UpdateRecord, UpdateReport, Vulnerability};
