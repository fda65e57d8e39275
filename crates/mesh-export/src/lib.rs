//! Turning scenario parameters into trusted meshes.
//!
//! A [`GeometryGenerator`] writes an STL for one part of one scenario. The
//! [`ExportCache`] sits in front of it: artifacts are keyed by content hash,
//! reused across runs, and loaded into [`mesh_query::MeshHandle`]s.

pub mod cache;
pub mod command;
pub mod error;
pub mod generator;
pub mod procedural;

pub use cache::{ExportCache, ExportRecord};
pub use command::{CommandConfig, CommandGenerator, PartEntry};
pub use error::ExportError;
pub use generator::{ExportRequest, GeometryGenerator};
pub use procedural::ProceduralGenerator;
