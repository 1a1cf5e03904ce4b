//! Registry lookups, update checks and vulnerability scanning.
//!
//! - [`VersionRegistry`] / [`PyPiRegistry`] - latest published versions
//! - [`UpdateChecker`] - which declared dependencies are behind
//! - [`AuditRunner`] / [`PipAudit`] - the external vulnerability lookup
//! - [`SecurityScanner`] - pins dependencies and runs the audit

mod audit;
mod registry;
mod updates;

pub use audit::{parse_audit_output, AuditRunner, PipAudit, SecurityScanner};
pub use registry::{PyPiRegistry, VersionRegistry, PYPI_URL};
pub use updates::UpdateChecker;

/// Registry lookups in flight at once, unless configured otherwise.
pub const DEFAULT_CONCURRENCY: usize = 8;
