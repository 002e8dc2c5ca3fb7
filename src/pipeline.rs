//! End-to-end driver: contours in, cells, axis planes and meshes out.
//!
//! ```text
//! PlaneStore ──► CellCache::load ──hit──┐
//!      │                miss            │
//!      └──► SpacePartitioner ──► store ─┤
//!                                       ▼
//!                      Projection ──► SurfaceReconstructor
//! ```
//!
//! Everything the pipeline exposes is a read-only view indexed by cell.
//! Out-of-range indices give `None` or an empty slice.

use glam::DVec3;
use tracing::info;

use crate::cache::CellCache;
use crate::config::PipelineConfig;
use crate::partition::{ConvexCell, SpacePartitioner};
use crate::plane_store::{ContourPlane, PlaneStore};
use crate::projection::{AxisPlane, AxisPlanes, AxisSelection, ProjectedContour, Projection};
use crate::reconstruction::{ReconstructedMesh, SurfaceReconstructor};

/// Display toggles handed to whatever draws the pipeline's output.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ViewState {
    pub show_cells: bool,
    pub show_contours: bool,
    pub show_axis_planes: bool,
    pub show_meshes: bool,
    /// Restrict cell-scoped output to one cell.
    pub focus: Option<usize>,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            show_cells: true,
            show_contours: true,
            show_axis_planes: false,
            show_meshes: true,
            focus: None,
        }
    }
}

impl ViewState {
    #[must_use]
    pub const fn focused(mut self, cell: usize) -> Self {
        self.focus = Some(cell);
        self
    }

    fn includes(&self, cell: usize) -> bool {
        self.focus.is_none_or(|f| f == cell)
    }
}

/// Result of one pipeline run.
#[derive(Debug)]
pub struct CellPipeline {
    store: PlaneStore,
    identifier: String,
    from_cache: bool,
    projection: Projection,
    surfaces: SurfaceReconstructor,
}

impl CellPipeline {
    /// Cells from the cache or a fresh partition, then projection and
    /// reconstruction.
    #[must_use]
    pub fn run(store: PlaneStore, identifier: &str, config: &PipelineConfig) -> Self {
        let compute = || {
            let mut partitioner = SpacePartitioner::with_padding(&store, config.padding_ratio);
            partitioner.compute_cells();
            partitioner.into_cells()
        };
        let (cells, from_cache) = if config.use_cache {
            CellCache::new(&config.cache_root).load_or_compute(identifier, compute)
        } else {
            (compute(), false)
        };

        let projection = Projection::new(&cells, &store);
        let surfaces = SurfaceReconstructor::new(&projection);
        info!(
            identifier,
            planes = store.len(),
            cells = cells.len(),
            from_cache,
            "pipeline complete"
        );

        Self {
            store,
            identifier: identifier.to_string(),
            from_cache,
            projection,
            surfaces,
        }
    }

    #[must_use]
    pub const fn store(&self) -> &PlaneStore {
        &self.store
    }

    #[must_use]
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Whether the cells came from the cache.
    #[must_use]
    pub const fn from_cache(&self) -> bool {
        self.from_cache
    }

    #[must_use]
    pub fn cells(&self) -> &[ConvexCell] {
        self.projection.cells()
    }

    #[must_use]
    pub fn cell(&self, index: usize) -> Option<&ConvexCell> {
        self.cells().get(index)
    }

    /// Contour planes referenced by any cell, without duplicates.
    #[must_use]
    pub fn contour_planes(&self) -> &[ContourPlane] {
        self.projection.contour_planes()
    }

    #[must_use]
    pub fn planes_for_cell(&self, index: usize) -> Vec<&ContourPlane> {
        self.projection.planes_for_cell(index)
    }

    #[must_use]
    pub fn axis_planes(&self, index: usize) -> Option<&AxisPlanes> {
        self.projection.axis_planes(index)
    }

    #[must_use]
    pub fn selection(&self, index: usize) -> Option<AxisSelection> {
        self.projection.selection(index)
    }

    #[must_use]
    pub fn mesh(&self, index: usize) -> Option<&ReconstructedMesh> {
        self.surfaces.mesh(index)
    }

    #[must_use]
    pub fn projected(&self, index: usize) -> &[ProjectedContour] {
        self.surfaces
            .surface(index)
            .map(|s| s.contours.as_slice())
            .unwrap_or_default()
    }

    // VIEWS

    /// Meshes to draw under `view`.
    #[must_use]
    pub fn visible_meshes(&self, view: &ViewState) -> Vec<(usize, &ReconstructedMesh)> {
        if !view.show_meshes {
            return Vec::new();
        }
        self.surfaces
            .surfaces()
            .filter(|s| view.includes(s.cell))
            .map(|s| (s.cell, &s.mesh))
            .collect()
    }

    /// Cell wireframes to draw under `view`.
    #[must_use]
    pub fn visible_cell_edges(&self, view: &ViewState) -> Vec<(usize, Vec<(DVec3, DVec3)>)> {
        if !view.show_cells {
            return Vec::new();
        }
        self.cells()
            .iter()
            .enumerate()
            .filter(|(i, _)| view.includes(*i))
            .map(|(i, cell)| (i, cell.polytope.edge_segments()))
            .collect()
    }

    /// Contour segments to draw under `view`: every contour, or the focused
    /// cell's contours.
    #[must_use]
    pub fn visible_contour_edges(&self, view: &ViewState) -> Vec<(DVec3, DVec3)> {
        if !view.show_contours {
            return Vec::new();
        }
        match view.focus {
            Some(cell) => self
                .planes_for_cell(cell)
                .into_iter()
                .flat_map(ContourPlane::display_edges)
                .collect(),
            None => self.store.as_slice().iter().flat_map(ContourPlane::display_edges).collect(),
        }
    }

    /// Selected axis plane per cell under `view`.
    #[must_use]
    pub fn visible_axis_planes(&self, view: &ViewState) -> Vec<(usize, &AxisPlane)> {
        if !view.show_axis_planes {
            return Vec::new();
        }
        (0..self.projection.cell_count())
            .filter(|&i| view.includes(i))
            .filter_map(|i| Some((i, self.projection.selected_plane(i)?)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plane_store::{ContourEdge, Plane, PlaneIdx};

    fn slab_store() -> PlaneStore {
        let square = |z: f64| {
            vec![
                DVec3::new(0.0, 0.0, z),
                DVec3::new(10.0, 0.0, z),
                DVec3::new(10.0, 10.0, z),
                DVec3::new(0.0, 10.0, z),
            ]
        };
        let ring: Vec<ContourEdge> = (0..4).map(|i| ContourEdge::new(i, (i + 1) % 4)).collect();
        PlaneStore::new(
            vec![
                ContourPlane::new(Plane::new(0.0, 0.0, 1.0, 0.0), square(0.0), ring.clone(), "slab"),
                ContourPlane::new(Plane::new(0.0, 0.0, 1.0, -10.0), square(10.0), ring, "slab"),
            ],
            "slab",
        )
    }

    #[test]
    fn test_run_without_cache() {
        let pipeline = CellPipeline::run(slab_store(), "slab", &PipelineConfig::default().without_cache());
        assert!(!pipeline.from_cache());
        assert_eq!(pipeline.cells().len(), 3);
        assert_eq!(pipeline.contour_planes().len(), 2);
        assert!(pipeline.cell(3).is_none());
        assert!(pipeline.mesh(3).is_none());
        assert!(pipeline.projected(3).is_empty());
        assert!(pipeline.axis_planes(3).is_none());

        let slab = pipeline
            .cells()
            .iter()
            .position(|c| c.planes == vec![PlaneIdx(0), PlaneIdx(1)])
            .unwrap();
        assert_eq!(pipeline.projected(slab).len(), 2);
        assert!(pipeline.mesh(slab).is_some_and(|m| !m.is_empty()));
    }

    #[test]
    fn test_second_run_hits_cache() {
        let root = std::env::temp_dir().join(format!("contour_cells_pipeline_{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&root);
        let config = PipelineConfig::default().with_cache_root(&root);

        let first = CellPipeline::run(slab_store(), "slab", &config);
        let second = CellPipeline::run(slab_store(), "slab", &config);
        assert!(!first.from_cache());
        assert!(second.from_cache());
        assert_eq!(first.cells().len(), second.cells().len());
        for (a, b) in first.cells().iter().zip(second.cells()) {
            assert_eq!(a.planes, b.planes);
            assert!(a.polytope.same_geometry(&b.polytope));
        }

        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn test_view_state_filters_output() {
        let pipeline = CellPipeline::run(slab_store(), "slab", &PipelineConfig::default().without_cache());
        let all = ViewState::default();
        assert_eq!(pipeline.visible_meshes(&all).len(), 3);
        assert_eq!(pipeline.visible_contour_edges(&all).len(), 8);
        assert!(pipeline.visible_axis_planes(&all).is_empty());

        let focused = ViewState {
            show_axis_planes: true,
            ..ViewState::default()
        }
        .focused(1);
        assert_eq!(pipeline.visible_meshes(&focused).len(), 1);
        assert_eq!(pipeline.visible_cell_edges(&focused).len(), 1);
        assert_eq!(pipeline.visible_axis_planes(&focused).len(), 1);

        let hidden = ViewState {
            show_meshes: false,
            show_cells: false,
            show_contours: false,
            ..ViewState::default()
        };
        assert!(pipeline.visible_meshes(&hidden).is_empty());
        assert!(pipeline.visible_cell_edges(&hidden).is_empty());
        assert!(pipeline.visible_contour_edges(&hidden).is_empty());
    }
}
