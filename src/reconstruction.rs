//! # Surface Reconstructor
//!
//! Per cell, the original contour vertices and their axis-plane projections
//! are pooled (original first, no deduplication) and tetrahedralized; every
//! triangle of the tetrahedralization becomes a mesh triangle.
//!
//! The result is the full triangle set of the tetrahedralization, interior
//! triangles included. It is a display aid and makes no manifold guarantee.

use glam::DVec3;
use serde::Serialize;
use tracing::{debug, warn};

use crate::delaunay::Tetrahedralization;
use crate::error::GeometryResult;
use crate::projection::{ProjectedContour, Projection};

/// Indexed triangle mesh.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ReconstructedMesh {
    pub vertices: Vec<DVec3>,
    pub triangles: Vec<[usize; 3]>,
}

impl ReconstructedMesh {
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    #[must_use]
    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    /// Triangle corners, for immediate drawing.
    pub fn triangle_positions(&self) -> impl Iterator<Item = [DVec3; 3]> + '_ {
        self.triangles.iter().map(|t| t.map(|v| self.vertices[v]))
    }
}

/// Triangulate `original ∪ projected` (concatenated, original first).
pub fn reconstruct(original: &[DVec3], projected: &[DVec3]) -> GeometryResult<ReconstructedMesh> {
    let vertices: Vec<DVec3> = original.iter().chain(projected).copied().collect();
    let tetrahedralization = Tetrahedralization::from_dvec3(&vertices)?;
    let triangles = tetrahedralization.facets();
    debug!(
        points = vertices.len(),
        tetrahedra = tetrahedralization.tetrahedra().len(),
        triangles = triangles.len(),
        "surface reconstructed"
    );
    Ok(ReconstructedMesh { vertices, triangles })
}

/// The projected contours of one cell and the mesh built from them.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CellSurface {
    pub cell: usize,
    pub contours: Vec<ProjectedContour>,
    pub mesh: ReconstructedMesh,
}

/// One reconstructed surface per cell of a [`Projection`].
#[derive(Debug, Default)]
pub struct SurfaceReconstructor {
    surfaces: Vec<CellSurface>,
}

impl SurfaceReconstructor {
    #[must_use]
    pub fn new(projection: &Projection) -> Self {
        let surfaces = (0..projection.cell_count())
            .map(|cell| {
                let contours = projection.project_cell(cell);
                let original: Vec<DVec3> = contours.iter().flat_map(|c| c.original.iter().copied()).collect();
                let projected: Vec<DVec3> = contours.iter().flat_map(|c| c.projected.iter().copied()).collect();
                let mesh = reconstruct(&original, &projected).unwrap_or_else(|err| {
                    warn!(cell, %err, "surface reconstruction failed");
                    ReconstructedMesh::default()
                });
                CellSurface { cell, contours, mesh }
            })
            .collect();
        Self { surfaces }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.surfaces.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.surfaces.is_empty()
    }

    #[must_use]
    pub fn surface(&self, cell: usize) -> Option<&CellSurface> {
        self.surfaces.get(cell)
    }

    #[must_use]
    pub fn mesh(&self, cell: usize) -> Option<&ReconstructedMesh> {
        self.surface(cell).map(|s| &s.mesh)
    }

    pub fn surfaces(&self) -> impl Iterator<Item = &CellSurface> {
        self.surfaces.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::SpacePartitioner;
    use crate::plane_store::{ContourPlane, Plane, PlaneIdx, PlaneStore};

    #[test]
    fn test_five_points() {
        let original = [
            DVec3::new(2.0, 0.0, 0.0),
            DVec3::new(-1.0, 2.0, 0.0),
            DVec3::new(-1.0, -2.0, 0.0),
        ];
        let projected = [DVec3::new(0.0, 0.0, 10.0), DVec3::new(0.0, 0.0, -10.0)];
        let mesh = reconstruct(&original, &projected).unwrap();
        assert_eq!(mesh.vertex_count(), 5);
        assert_eq!(mesh.triangle_count(), 7);
        assert!(mesh.triangles.iter().flatten().all(|&v| v < 5));
        assert_eq!(mesh.vertices[3], projected[0]);
    }

    #[test]
    fn test_nearly_coplanar_contour_keeps_triangles() {
        for eps in [1e-2, 1e-5, 1e-8] {
            let original = [DVec3::ZERO, DVec3::X, DVec3::Y];
            let projected = [DVec3::new(1.0, 1.0, eps), DVec3::new(0.5, 0.5, -eps)];
            let mesh = reconstruct(&original, &projected).unwrap();
            assert_eq!(mesh.triangle_count(), 7, "eps = {eps}");
        }
    }

    #[test]
    fn test_flat_points_give_empty_mesh() {
        let original = [DVec3::ZERO, DVec3::X, DVec3::Y];
        let projected = [DVec3::new(1.0, 1.0, 0.0)];
        let mesh = reconstruct(&original, &projected).unwrap();
        assert!(mesh.is_empty());
        assert_eq!(mesh.vertex_count(), 4);
    }

    #[test]
    fn test_non_finite_input_is_error() {
        assert!(reconstruct(&[DVec3::new(f64::NAN, 0.0, 0.0)], &[]).is_err());
    }

    #[test]
    fn test_reconstructor_covers_every_cell() {
        let square = |z: f64| {
            vec![
                DVec3::new(0.0, 0.0, z),
                DVec3::new(10.0, 0.0, z),
                DVec3::new(10.0, 10.0, z),
                DVec3::new(0.0, 10.0, z),
            ]
        };
        let store = PlaneStore::new(
            vec![
                ContourPlane::new(Plane::new(0.0, 0.0, 1.0, 0.0), square(0.0), Vec::new(), "slab"),
                ContourPlane::new(Plane::new(0.0, 0.0, 1.0, -10.0), square(10.0), Vec::new(), "slab"),
            ],
            "slab",
        );
        let mut partitioner = SpacePartitioner::new(&store);
        let cells = partitioner.compute_cells().to_vec();
        let reconstructor = SurfaceReconstructor::new(&Projection::new(&cells, &store));

        assert_eq!(reconstructor.len(), cells.len());
        assert!(reconstructor.mesh(cells.len()).is_none());

        let slab = cells.iter().position(|c| c.planes == vec![PlaneIdx(0), PlaneIdx(1)]).unwrap();
        let surface = reconstructor.surface(slab).unwrap();
        assert_eq!(surface.contours.len(), 2);
        assert_eq!(surface.mesh.vertex_count(), 16);
        assert!(!surface.mesh.is_empty());
        assert!(surface.mesh.triangles.iter().flatten().all(|&v| v < 16));
        assert_eq!(surface.mesh.triangle_positions().count(), surface.mesh.triangle_count());
    }
}
