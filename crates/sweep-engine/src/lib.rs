//! Scenario sweeps: profiles, the scenario matrix, and the orchestrator
//! that exports and validates every scenario on a bounded worker pool.

pub mod aggregate;
pub mod error;
pub mod orchestrator;
pub mod profile;
pub mod sensitivity;

pub use aggregate::{ReportAggregator, ScenarioRun};
pub use error::SweepError;
pub use orchestrator::{GateFailure, Orchestrator, SweepOptions, SweepOutcome};
pub use profile::{Perturbation, SweepConfig, SweepProfile};
