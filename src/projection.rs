//! # Projection Engine
//!
//! Per cell: three axis-aligned planes through the center of the cell's
//! bounding box, one of them picked by the orientation of the cell's first
//! contour plane, and every contour of the cell snapped onto it.
//!
//! ```text
//!  cell bbox [min, max]
//!        │ center c = (min + max) / 2       (exact)
//!        ▼
//!  x = c.x     y = c.y     z = c.z          AxisPlanes
//!        │ argmax  n̂ · axis                 first contour plane of the cell
//!        ▼
//!  (x, y, z) → (x, y, c.z)                  e.g. for the z plane
//! ```
//!
//! Alignment is signed: a contour facing -Z is *not* aligned with the z plane.
//! Ties go to the lower axis (x before y before z).

use std::fmt;

use glam::DVec3;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::GeometryResult;
use crate::exact::{ExactPoint, Scalar, int, scalar_to_f64};
use crate::partition::ConvexCell;
use crate::plane_store::{ContourPlane, Plane, PlaneIdx, PlaneStore};

/// Coordinate axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const ALL: [Self; 3] = [Self::X, Self::Y, Self::Z];

    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::X => 0,
            Self::Y => 1,
            Self::Z => 2,
        }
    }

    #[must_use]
    pub const fn unit(self) -> DVec3 {
        match self {
            Self::X => DVec3::X,
            Self::Y => DVec3::Y,
            Self::Z => DVec3::Z,
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::X => "x",
            Self::Y => "y",
            Self::Z => "z",
        };
        f.write_str(label)
    }
}

/// Plane `axis = position`, with the four corners where it meets the cell's
/// bounding box.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AxisPlane {
    pub axis: Axis,
    #[serde(with = "crate::exact::scalar_serde")]
    pub position: Scalar,
    pub corners: [ExactPoint; 4],
}

impl AxisPlane {
    fn new(axis: Axis, min: &ExactPoint, max: &ExactPoint) -> Self {
        let a = axis.index();
        let (u, v) = ((a + 1) % 3, (a + 2) % 3);
        let position = (min.component(a) + max.component(a)) / int(2);
        let corner = |cu: &ExactPoint, cv: &ExactPoint| {
            min.with_component(a, position.clone())
                .with_component(u, cu.component(u).clone())
                .with_component(v, cv.component(v).clone())
        };
        let corners = [corner(min, min), corner(max, min), corner(max, max), corner(min, max)];
        Self {
            axis,
            position,
            corners,
        }
    }

    /// Unit normal (the positive axis direction).
    #[must_use]
    pub const fn normal(&self) -> DVec3 {
        self.axis.unit()
    }

    #[must_use]
    pub fn position_f64(&self) -> f64 {
        scalar_to_f64(&self.position)
    }

    /// Replace the axis coordinate with the plane position.
    #[must_use]
    pub fn project_exact(&self, p: &ExactPoint) -> ExactPoint {
        p.with_component(self.axis.index(), self.position.clone())
    }

    /// Same as [`Self::project_exact`] for input-space vertices.
    pub fn project(&self, p: DVec3) -> GeometryResult<DVec3> {
        let exact = ExactPoint::from_dvec3(p)?;
        Ok(self.project_exact(&exact).to_dvec3())
    }

    #[must_use]
    pub fn corners_f64(&self) -> [DVec3; 4] {
        [
            self.corners[0].to_dvec3(),
            self.corners[1].to_dvec3(),
            self.corners[2].to_dvec3(),
            self.corners[3].to_dvec3(),
        ]
    }
}

/// The three axis planes of one cell.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AxisPlanes {
    planes: [AxisPlane; 3],
}

impl AxisPlanes {
    /// Planes through the center of the box `[min, max]`.
    #[must_use]
    pub fn from_bounds(min: &ExactPoint, max: &ExactPoint) -> Self {
        Self {
            planes: Axis::ALL.map(|axis| AxisPlane::new(axis, min, max)),
        }
    }

    #[must_use]
    pub const fn get(&self, axis: Axis) -> &AxisPlane {
        &self.planes[axis.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = &AxisPlane> {
        self.planes.iter()
    }
}

/// Chosen axis plane and the alignment that chose it.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct AxisSelection {
    pub axis: Axis,
    /// `n̂ · axis`, in `[-1, 1]`.
    pub dot: f64,
}

/// Axis plane best aligned with `plane`'s normal, `None` for a zero normal.
#[must_use]
pub fn select_axis_plane(plane: &Plane, axis_planes: &AxisPlanes) -> Option<AxisSelection> {
    let normal = plane.unit_normal()?;
    let mut best: Option<AxisSelection> = None;
    for candidate in axis_planes.iter() {
        let dot = normal.dot(candidate.normal());
        // Strictly greater keeps the earlier axis on ties.
        if best.is_none_or(|b| dot > b.dot) {
            best = Some(AxisSelection {
                axis: candidate.axis,
                dot,
            });
        }
    }
    best
}

/// One contour snapped onto its cell's axis plane.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProjectedContour {
    pub cell: usize,
    pub contour: PlaneIdx,
    pub axis_plane: AxisPlane,
    pub original: Vec<DVec3>,
    pub projected: Vec<DVec3>,
}

/// Projection engine over a cell set.
#[derive(Debug)]
pub struct Projection {
    cells: Vec<ConvexCell>,
    /// Contour planes referenced by any cell, first occurrence order, no
    /// duplicates.
    contour_planes: Vec<ContourPlane>,
    /// Per cell: store index and slot in `contour_planes`, in the cell's
    /// plane order.
    cell_planes: Vec<Vec<(PlaneIdx, usize)>>,
    axis_planes: Vec<Option<AxisPlanes>>,
    selections: Vec<Option<AxisSelection>>,
}

impl Projection {
    #[must_use]
    pub fn new(cells: &[ConvexCell], store: &PlaneStore) -> Self {
        let mut contour_planes: Vec<ContourPlane> = Vec::new();
        let mut cell_planes = Vec::with_capacity(cells.len());
        for (i, cell) in cells.iter().enumerate() {
            let mut local = Vec::with_capacity(cell.planes.len());
            for &idx in &cell.planes {
                let Some(contour) = store.get(idx) else {
                    warn!(cell = i, plane = idx.0, "cell references a plane outside the store");
                    continue;
                };
                let existing = contour_planes.iter().position(|c| c == contour);
                let slot = if let Some(slot) = existing {
                    slot
                } else {
                    contour_planes.push(contour.clone());
                    contour_planes.len() - 1
                };
                local.push((idx, slot));
            }
            cell_planes.push(local);
        }

        let axis_planes: Vec<Option<AxisPlanes>> = cells
            .iter()
            .map(|cell| cell.bounds().map(|(min, max)| AxisPlanes::from_bounds(&min, &max)))
            .collect();

        let selections = cell_planes
            .iter()
            .zip(&axis_planes)
            .enumerate()
            .map(|(i, (planes, axes))| {
                let first = &contour_planes[planes.first()?.1];
                let selection = select_axis_plane(&first.plane, axes.as_ref()?);
                match selection {
                    Some(s) => debug!(cell = i, axis = %s.axis, dot = s.dot, "axis plane selected"),
                    None => warn!(cell = i, file = %first.filename, "first contour plane has no normal"),
                }
                selection
            })
            .collect();

        Self {
            cells: cells.to_vec(),
            contour_planes,
            cell_planes,
            axis_planes,
            selections,
        }
    }

    #[must_use]
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    #[must_use]
    pub fn cells(&self) -> &[ConvexCell] {
        &self.cells
    }

    /// Deduplicated contour planes referenced by the cells.
    #[must_use]
    pub fn contour_planes(&self) -> &[ContourPlane] {
        &self.contour_planes
    }

    /// Contour planes of one cell, empty for an unknown cell.
    #[must_use]
    pub fn planes_for_cell(&self, cell: usize) -> Vec<&ContourPlane> {
        self.cell_planes
            .get(cell)
            .map(|slots| slots.iter().map(|&(_, s)| &self.contour_planes[s]).collect())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn axis_planes(&self, cell: usize) -> Option<&AxisPlanes> {
        self.axis_planes.get(cell)?.as_ref()
    }

    #[must_use]
    pub fn selection(&self, cell: usize) -> Option<AxisSelection> {
        *self.selections.get(cell)?
    }

    /// The cell's selected axis plane.
    #[must_use]
    pub fn selected_plane(&self, cell: usize) -> Option<&AxisPlane> {
        let selection = self.selection(cell)?;
        Some(self.axis_planes(cell)?.get(selection.axis))
    }

    /// Every contour of the cell projected onto the one selected axis plane.
    #[must_use]
    pub fn project_cell(&self, cell: usize) -> Vec<ProjectedContour> {
        let Some(axis_plane) = self.selected_plane(cell) else {
            return Vec::new();
        };
        self.cell_planes[cell]
            .iter()
            .filter_map(|&(idx, slot)| {
                let contour = &self.contour_planes[slot];
                let projected = contour
                    .vertices
                    .iter()
                    .map(|&v| axis_plane.project(v))
                    .collect::<GeometryResult<Vec<_>>>();
                match projected {
                    Ok(projected) => Some(ProjectedContour {
                        cell,
                        contour: idx,
                        axis_plane: axis_plane.clone(),
                        original: contour.vertices.clone(),
                        projected,
                    }),
                    Err(err) => {
                        warn!(cell, plane = idx.0, %err, "skipping contour");
                        None
                    }
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exact::ExactVec3;
    use crate::partition::SpacePartitioner;

    fn planes(min: (i64, i64, i64), max: (i64, i64, i64)) -> AxisPlanes {
        AxisPlanes::from_bounds(
            &ExactVec3::from_integers(min.0, min.1, min.2),
            &ExactVec3::from_integers(max.0, max.1, max.2),
        )
    }

    #[test]
    fn test_axis_planes_at_center() {
        let axes = planes((0, 0, 0), (10, 20, 30));
        assert_eq!(axes.get(Axis::X).position, int(5));
        assert_eq!(axes.get(Axis::Y).position, int(10));
        assert_eq!(axes.get(Axis::Z).position, int(15));

        for plane in axes.iter() {
            assert!(plane.corners.iter().all(|c| c.component(plane.axis.index()) == &plane.position));
        }
        let z = axes.get(Axis::Z).corners_f64();
        assert_eq!(z[0], DVec3::new(0.0, 0.0, 15.0));
        assert_eq!(z[2], DVec3::new(10.0, 20.0, 15.0));
    }

    #[test]
    fn test_select_aligned_axis() {
        let axes = planes((0, 0, 0), (1, 1, 1));
        let up = select_axis_plane(&Plane::new(0.0, 0.0, 1.0, -3.0), &axes).unwrap();
        assert_eq!(up.axis, Axis::Z);
        assert_eq!(up.dot, 1.0);

        let scaled = select_axis_plane(&Plane::new(0.0, 7.0, 0.0, 0.0), &axes).unwrap();
        assert_eq!(scaled.axis, Axis::Y);
        assert_eq!(scaled.dot, 1.0);
    }

    #[test]
    fn test_selection_is_signed() {
        let axes = planes((0, 0, 0), (1, 1, 1));
        let down = select_axis_plane(&Plane::new(0.0, 0.0, -1.0, 0.0), &axes).unwrap();
        assert_ne!(down.axis, Axis::Z);
        assert_eq!(down.dot, 0.0);
    }

    #[test]
    fn test_selection_ties_prefer_lower_axis() {
        let axes = planes((0, 0, 0), (1, 1, 1));
        let diagonal = select_axis_plane(&Plane::new(1.0, 1.0, 0.0, 0.0), &axes).unwrap();
        assert_eq!(diagonal.axis, Axis::X);
        let yz = select_axis_plane(&Plane::new(0.0, 1.0, 1.0, 0.0), &axes).unwrap();
        assert_eq!(yz.axis, Axis::Y);
    }

    #[test]
    fn test_zero_normal_selects_nothing() {
        let axes = planes((0, 0, 0), (1, 1, 1));
        assert!(select_axis_plane(&Plane::new(0.0, 0.0, 0.0, 1.0), &axes).is_none());
    }

    #[test]
    fn test_projection_substitutes_axis_coordinate() {
        let axes = planes((0, 0, 0), (10, 20, 30));
        let projected = axes.get(Axis::Z).project(DVec3::new(1.5, -2.0, 7.0)).unwrap();
        assert_eq!(projected, DVec3::new(1.5, -2.0, 15.0));
        let projected = axes.get(Axis::X).project(DVec3::new(1.5, -2.0, 7.0)).unwrap();
        assert_eq!(projected, DVec3::new(5.0, -2.0, 7.0));
    }

    fn slab_store() -> PlaneStore {
        let square = |z: f64| {
            vec![
                DVec3::new(0.0, 0.0, z),
                DVec3::new(10.0, 0.0, z),
                DVec3::new(10.0, 10.0, z),
                DVec3::new(0.0, 10.0, z),
            ]
        };
        PlaneStore::new(
            vec![
                ContourPlane::new(Plane::new(0.0, 0.0, 1.0, 0.0), square(0.0), Vec::new(), "slab"),
                ContourPlane::new(Plane::new(0.0, 0.0, 1.0, -10.0), square(10.0), Vec::new(), "slab"),
            ],
            "slab",
        )
    }

    #[test]
    fn test_engine_over_slab_cells() {
        let store = slab_store();
        let mut partitioner = SpacePartitioner::new(&store);
        let cells = partitioner.compute_cells().to_vec();
        let engine = Projection::new(&cells, &store);

        assert_eq!(engine.cell_count(), cells.len());
        assert_eq!(engine.contour_planes().len(), 2);
        assert!(engine.planes_for_cell(cells.len()).is_empty());
        assert!(engine.axis_planes(cells.len()).is_none());

        let slab = cells.iter().position(|c| c.planes == vec![PlaneIdx(0), PlaneIdx(1)]).unwrap();
        assert_eq!(engine.planes_for_cell(slab).len(), 2);
        assert_eq!(engine.selection(slab).unwrap().axis, Axis::Z);

        let projected = engine.project_cell(slab);
        assert_eq!(projected.len(), 2);
        for contour in &projected {
            assert_eq!(contour.original.len(), contour.projected.len());
            assert!(contour.projected.iter().all(|p| p.z == 5.0));
        }
        assert_eq!(projected[1].original[0].z, 10.0);
    }

    #[test]
    fn test_duplicate_contours_are_merged() {
        let store = slab_store();
        let mut partitioner = SpacePartitioner::new(&store);
        let mut cells = partitioner.compute_cells().to_vec();

        // Plane 2 repeats plane 0 under another index.
        let mut planes = store.as_slice().to_vec();
        planes.push(planes[0].clone());
        let doubled = PlaneStore::new(planes, "doubled");
        let slab = cells.iter().position(|c| c.planes.len() == 2).unwrap();
        cells[slab].planes.push(PlaneIdx(2));

        let engine = Projection::new(&cells, &doubled);
        assert_eq!(engine.contour_planes().len(), 2);
        assert_eq!(engine.planes_for_cell(slab).len(), 3);
        assert_eq!(engine.planes_for_cell(slab)[2], engine.planes_for_cell(slab)[0]);
    }
}
