//! Core data types for dependency checks and scan results.
//!
//! - [`UpdateRecord`] - An outdated dependency
//! - [`Vulnerability`] - A known vulnerability in a pinned dependency
//! - [`SkippedDependency`] - A declaration that could not be processed, and why
//! - [`UpdateReport`] / [`SecurityReport`] - Per-check results
//! - [`ScanResult`] - Everything gathered for one repository
//!
//! # Example
//!
//! ```
//! use depdoctor::model::{ScanOutcome, SecurityReport};
//!
//! let report = SecurityReport::new(ScanOutcome::Clean, Vec::new(), Vec::new());
//! assert_eq!(report.vulnerabilities().map(|v| v.len()), Some(0));
//! ```

mod report;
mod vulnerability;

pub use report::*;
pub use vulnerability::*;
