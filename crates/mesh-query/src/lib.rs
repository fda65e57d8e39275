//! Triangle-mesh loading and geometric queries for fit validation.
//!
//! A [`MeshHandle`] wraps a welded [`TriMesh`] together with its derived
//! attributes (bounding box, watertight flag, component count) and an
//! acceleration hierarchy. All queries in [`query`] refuse to run on a
//! handle that is not a single closed shell.

pub mod bvh;
pub mod error;
pub mod mesh;
pub mod primitives;
pub mod query;
pub mod stl;

pub use bvh::Aabb;
pub use error::{IntegrityIssue, MeshLoadError, QueryError};
pub use mesh::{MeshHandle, TriMesh};
pub use query::{
    is_inside, local_thickness_sample, nearest_surface_point, ray_intersect, signed_distance,
    SurfacePoint,
};
