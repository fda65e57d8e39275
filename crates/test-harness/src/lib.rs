//! Test harness for end-to-end fit validation.
//!
//! Drives the real pipeline (procedural export, content-hash cache,
//! orchestrator, drift policy, report) against an isolated temporary
//! directory, and checks the outcome without panicking so a test can
//! collect every broken property in one pass.
//!
//! # Key Components
//!
//! - [`FitBench`]: Fluent API for configuring and running a sweep
//! - [`BenchRun`]: Lookup helpers over the finished sweep
//! - [`oracle`]: Verification functions returning pass/fail verdicts
//! - [`assertions`]: Assertion helpers with diagnostic context

pub mod assertions;
pub mod bench;
pub mod error;
pub mod oracle;

pub use bench::{BenchRun, FitBench};
pub use error::HarnessError;
pub use oracle::OracleVerdict;
