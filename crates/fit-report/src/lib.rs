//! The canonical run report, the gate policy that decides it, and the
//! freshness contract advisory consumers must honour before trusting it.

pub mod error;
pub mod freshness;
pub mod policy;
pub mod report;
pub mod summary;

pub use error::ReportError;
pub use freshness::{check_report, inputs_hash, AdvisoryVerdict, Freshness, ReportHeader};
pub use policy::{evaluate_policy, PolicySection};
pub use report::{FullValidationReport, Provenance, SCHEMA_VERSION};
pub use summary::render_summary;
