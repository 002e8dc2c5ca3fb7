//! # `contour_cells`
//!
//! Exact convex cell decomposition of contour-plane sets, with per-cell axis
//! projection and Delaunay surface reconstruction.
//!
//! ## What is this?
//!
//! A set of labeled planes ("contour planes", each carrying a planar contour)
//! carves space into convex regions. This crate computes those regions
//! exactly, remembers which input planes bound each one, snaps each cell's
//! contours onto an axis-aligned plane through the cell and triangulates the
//! result into a mesh.
//!
//! ## Quick Start
//!
//! ```rust
//! use contour_cells::{SpacePartitioner, PlaneIdx, parse_contours};
//!
//! // Two parallel planes, z = 0 and z = 10, with square contours.
//! let text = "
//!     2
//!     0 0 1 0     4 0   0 0 0   10 0 0   10 10 0   0 10 0
//!     0 0 1 -10   4 0   0 0 10  10 0 10  10 10 10  0 10 10
//! ";
//! let store = parse_contours(text, "slab.contour").unwrap();
//!
//! let mut partitioner = SpacePartitioner::new(&store);
//! let cells = partitioner.compute_cells();
//!
//! // Above, between and below the planes; only the slab touches both.
//! assert_eq!(cells.len(), 3);
//! let slabs = cells.iter().filter(|c| c.planes == [PlaneIdx(0), PlaneIdx(1)]).count();
//! assert_eq!(slabs, 1);
//! ```
//!
//! ## Key Features
//!
//! - **Exact kernel**: every topological decision uses `BigRational`
//!   arithmetic; `f64` only appears when reading input and when producing
//!   display meshes
//! - **Plane provenance**: each cell lists the input planes carrying one of
//!   its faces
//! - **Cell cache**: computed cell sets are written to disk per source and
//!   reloaded on the next run
//! - **Axis projection**: signed alignment of the first contour plane picks one
//!   of three axis planes through the cell's bounding-box center
//! - **Surface reconstruction**: exact Bowyer–Watson tetrahedralization of the
//!   original and projected contour vertices
//!
//! ## When NOT to Use
//!
//! - Hundreds of planes or more: the partition recursion branches twice per
//!   plane, `O(2^N)` in the worst case (see [`partition`])
//! - Real-time use: rational arithmetic is orders of magnitude slower than
//!   floating point
//! - Watertight meshing: reconstruction returns every triangle of a
//!   tetrahedralization, not a manifold surface
//!
//! Everything runs on the calling thread; the only I/O is the blocking cache
//! access inside [`CellPipeline::run`].

#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod cache;
pub mod config;
pub mod contour_io;
pub mod delaunay;
pub mod error;
pub mod exact;
pub mod partition;
pub mod pipeline;
pub mod plane_store;
pub mod polytope;
pub mod projection;
pub mod reconstruction;

pub use cache::{CACHE_SCHEMA_VERSION, CellCache};
pub use config::PipelineConfig;
pub use contour_io::{list_contour_files, load_contour_file, parse_contours};
pub use delaunay::Tetrahedralization;
pub use error::{CacheError, ContourError, GeometryError, GeometryResult};
pub use exact::{ExactPlane, ExactPoint, ExactVec3, Scalar};
pub use partition::{ConvexCell, DEFAULT_PADDING_RATIO, Provenance, SpacePartitioner};
pub use pipeline::{CellPipeline, ViewState};
pub use plane_store::{Aabb, ContourEdge, ContourPlane, ExtendedMesh, MeshFace, Plane, PlaneIdx, PlaneStore};
pub use polytope::{Clip, ConvexPolytope, FacetIdx, FacetTag, TopologyError, VertexIdx};
pub use projection::{Axis, AxisPlane, AxisPlanes, AxisSelection, ProjectedContour, Projection, select_axis_plane};
pub use reconstruction::{CellSurface, ReconstructedMesh, SurfaceReconstructor, reconstruct};

/// Re-export glam types for convenience
pub mod math {
    pub use glam::DVec3;
}
