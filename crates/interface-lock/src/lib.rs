//! The frozen mating-interface contract.
//!
//! An [`InterfaceLock`] is loaded once per run, checked with
//! [`InterfaceLock::assert_invariants`], and then only read. Validators
//! consume the model-space [`FitGeometry`] derived from it.

pub mod constants;
pub mod expr;
pub mod geometry;
pub mod lock;

pub use constants::LockKey;
pub use geometry::FitGeometry;
pub use lock::{InterfaceLock, LockDelta, LockLoadError, LockViolationError};
