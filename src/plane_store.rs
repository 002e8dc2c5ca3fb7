//! Input data model: planes, contour planes and the ordered plane store.
//!
//! Everything here is plain `f64` input data. It crosses into the exact
//! kernel through [`Plane::positive_halfspace`] / [`Plane::negative_halfspace`]
//! and [`Aabb::to_exact`].

use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::error::{GeometryError, GeometryResult};
use crate::exact::{ExactPlane, ExactPoint, ExactVec3, exact_from_f64};

/// Index into the plane store. Using a newtype keeps plane indices apart
/// from vertex and cell indices.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlaneIdx(pub usize);

/// Plane `a·x + b·y + c·z + d = 0`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Plane {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
}

impl Plane {
    #[must_use]
    pub const fn new(a: f64, b: f64, c: f64, d: f64) -> Self {
        Self { a, b, c, d }
    }

    /// Raw (unnormalized) normal `(a, b, c)`.
    #[must_use]
    pub const fn normal(&self) -> DVec3 {
        DVec3::new(self.a, self.b, self.c)
    }

    /// Unit normal, `None` for a zero normal.
    #[must_use]
    pub fn unit_normal(&self) -> Option<DVec3> {
        self.normal().try_normalize()
    }

    /// Signed value `a·x + b·y + c·z + d` (not a distance unless normalized).
    #[must_use]
    pub fn evaluate(&self, p: DVec3) -> f64 {
        self.normal().dot(p) + self.d
    }

    /// Closed positive side `{ a·x + b·y + c·z + d ≥ 0 }` in exact form.
    pub fn positive_halfspace(&self) -> GeometryResult<ExactPlane> {
        let normal = ExactVec3::from_dvec3(-self.normal())?;
        ExactPlane::new(normal, exact_from_f64(self.d)?)
    }

    /// Closed negative side `{ a·x + b·y + c·z + d ≤ 0 }` in exact form.
    pub fn negative_halfspace(&self) -> GeometryResult<ExactPlane> {
        let normal = ExactVec3::from_dvec3(self.normal())?;
        ExactPlane::new(normal, exact_from_f64(-self.d)?)
    }
}

/// Contour edge between two vertices of the same contour plane, optionally
/// carrying the material ids on either side.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContourEdge {
    pub start: usize,
    pub end: usize,
    pub materials: Option<[i32; 2]>,
}

impl ContourEdge {
    #[must_use]
    pub const fn new(start: usize, end: usize) -> Self {
        Self {
            start,
            end,
            materials: None,
        }
    }

    #[must_use]
    pub const fn with_materials(start: usize, end: usize, left: i32, right: i32) -> Self {
        Self {
            start,
            end,
            materials: Some([left, right]),
        }
    }
}

/// Triangle of an extended mesh, with the materials on both sides.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeshFace {
    pub vertices: [usize; 3],
    pub materials: [i32; 2],
}

/// Explicit triangulation shipped alongside a contour; used for display
/// instead of the raw contour edges when present.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtendedMesh {
    pub vertices: Vec<DVec3>,
    pub faces: Vec<MeshFace>,
    pub contour_edges: Vec<[usize; 2]>,
}

/// A labeled input plane with its contour.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ContourPlane {
    pub plane: Plane,
    pub vertices: Vec<DVec3>,
    pub edges: Vec<ContourEdge>,
    pub filename: String,
    pub extended: Option<ExtendedMesh>,
}

impl ContourPlane {
    #[must_use]
    pub fn new(plane: Plane, vertices: Vec<DVec3>, edges: Vec<ContourEdge>, filename: impl Into<String>) -> Self {
        Self {
            plane,
            vertices,
            edges,
            filename: filename.into(),
            extended: None,
        }
    }

    #[must_use]
    pub fn with_extended_mesh(mut self, mesh: ExtendedMesh) -> Self {
        self.extended = Some(mesh);
        self
    }

    /// Line segments to draw for this contour: the extended mesh's contour
    /// edges when an override exists, the raw contour edges otherwise.
    #[must_use]
    pub fn display_edges(&self) -> Vec<(DVec3, DVec3)> {
        match &self.extended {
            Some(mesh) => mesh
                .contour_edges
                .iter()
                .filter_map(|&[a, b]| Some((*mesh.vertices.get(a)?, *mesh.vertices.get(b)?)))
                .collect(),
            None => self
                .edges
                .iter()
                .filter_map(|e| Some((*self.vertices.get(e.start)?, *self.vertices.get(e.end)?)))
                .collect(),
        }
    }

    /// All vertex positions contributing to bounds.
    fn all_vertices(&self) -> impl Iterator<Item = DVec3> + '_ {
        self.vertices
            .iter()
            .chain(self.extended.iter().flat_map(|m| m.vertices.iter()))
            .copied()
    }
}

// Identity is plane + contour + source; the display override does not count.
impl PartialEq for ContourPlane {
    fn eq(&self, other: &Self) -> bool {
        self.plane == other.plane
            && self.vertices == other.vertices
            && self.edges == other.edges
            && self.filename == other.filename
    }
}

/// Axis-aligned bounding box in input (float) space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub min: DVec3,
    pub max: DVec3,
}

impl Aabb {
    #[must_use]
    pub const fn new(min: DVec3, max: DVec3) -> Self {
        Self { min, max }
    }

    /// Tight box around the points, `None` when there are none.
    pub fn from_points(points: impl IntoIterator<Item = DVec3>) -> Option<Self> {
        points.into_iter().fold(None, |acc, p| match acc {
            None => Some(Self::new(p, p)),
            Some(b) => Some(Self::new(b.min.min(p), b.max.max(p))),
        })
    }

    #[must_use]
    pub fn diagonal(&self) -> f64 {
        (self.max - self.min).length()
    }

    /// Grow by `ratio × diagonal` on every side.
    #[must_use]
    pub fn padded(&self, ratio: f64) -> Self {
        let pad = DVec3::splat(self.diagonal() * ratio);
        Self::new(self.min - pad, self.max + pad)
    }

    /// Exact corners; fails when the box has no volume or is non-finite.
    pub fn to_exact(&self) -> GeometryResult<(ExactPoint, ExactPoint)> {
        let extent = self.max - self.min;
        if extent.min_element() <= 0.0 {
            return Err(GeometryError::EmptyBounds("bounding box has no volume"));
        }
        Ok((ExactVec3::from_dvec3(self.min)?, ExactVec3::from_dvec3(self.max)?))
    }
}

/// Ordered, immutable list of input planes.
#[derive(Clone, Debug, Default)]
pub struct PlaneStore {
    planes: Vec<ContourPlane>,
    source: String,
}

impl PlaneStore {
    #[must_use]
    pub fn new(planes: Vec<ContourPlane>, source: impl Into<String>) -> Self {
        Self {
            planes,
            source: source.into(),
        }
    }

    /// Identifier of the data set (usually the contour file name); keys the
    /// cell cache.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.planes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.planes.is_empty()
    }

    #[must_use]
    pub fn get(&self, idx: PlaneIdx) -> Option<&ContourPlane> {
        self.planes.get(idx.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (PlaneIdx, &ContourPlane)> {
        self.planes.iter().enumerate().map(|(i, p)| (PlaneIdx(i), p))
    }

    #[must_use]
    pub fn as_slice(&self) -> &[ContourPlane] {
        &self.planes
    }

    /// Bounding box of every contour vertex in the store.
    #[must_use]
    pub fn bounds(&self) -> Option<Aabb> {
        Aabb::from_points(self.planes.iter().flat_map(ContourPlane::all_vertices))
    }
}
