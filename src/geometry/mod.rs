//! Geometry primitives: polygons, boxes, trajectories and navigation meshes.

mod navmesh;
mod polygon;
mod shoebox;
mod track;

pub use navmesh::NavMesh;
pub use polygon::{NearestPoint, Polygon};
pub use shoebox::{Shoebox, raised_cosine};
pub use track::{EulerTrack, InterpolationMode, Keyframe, PositionTrack, ScaleBy, Track};
