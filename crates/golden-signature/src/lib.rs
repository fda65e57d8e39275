//! Golden geometry signatures and drift detection.
//!
//! Two distinct operations share one file format: [`compare`] checks live
//! metrics against the committed baselines and never writes, while
//! [`commit_baseline`] is the only path that replaces the file.

pub mod baseline;
pub mod drift;
pub mod error;
pub mod metrics;
pub mod policy;

pub use baseline::{commit_baseline, BaselineFile, MetricBaseline, Provenance, ToleranceBands};
pub use drift::{compare, DriftEntry, DriftMode, DriftReport};
pub use error::SignatureError;
pub use metrics::{geometry_signature, signature_metrics, Signature};
pub use policy::{DriftOverride, OverrideSource, ALLOW_DRIFT_ENV};
