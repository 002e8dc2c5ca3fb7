//! # Exact Convex Polytope
//!
//! A bounded convex polytope in 3D stored as the intersection of closed
//! halfspaces (its *facets*) together with its vertices. Every facet carries
//! a [`FacetTag`] recording where the halfspace came from, which is how cells
//! keep their plane provenance.
//!
//! ## Key Concepts
//!
//! - **Facet**: halfspace `n · x ≤ d` whose boundary holds a 2D face
//! - **Vertex**: exact point with the sorted list of facets passing through it
//! - **Edge**: two vertices sharing at least two facets
//! - **Face**: the vertices of one facet, in counter-clockwise order seen from
//!   outside
//!
//! ## Algorithm Overview
//!
//! Polytopes start as an axis-aligned box and are refined by clipping:
//!
//! 1. **Classify** every vertex against the new halfspace (exact sign)
//! 2. **Keep** inside vertices, tag vertices on the boundary with the new facet
//! 3. **Split** every edge with one strictly inside and one strictly outside
//!    endpoint at the boundary; the new vertex inherits the edge's facets
//! 4. **Drop** facets left with fewer than three vertices (now redundant)
//!
//! A clip that leaves no vertex strictly inside produces at most a flat
//! polygon, which is reported as [`Clip::Empty`]: cells must have volume.
//!
//! ## Complexity
//!
//! | Operation      | Complexity    | Notes                               |
//! |----------------|---------------|-------------------------------------|
//! | Clip           | O(V² × F)     | Edge discovery by shared facets     |
//! | Intersection   | O(F_b × clip) | Clip by every facet of the other    |
//! | Face ordering  | O(V_f log V_f)| Exact angular comparator            |
//!
//! All arithmetic is exact ([`crate::exact`]); nothing here compares against
//! an epsilon.

use std::cmp::Ordering;

use glam::DVec3;
use itertools::Itertools;
use num_traits::{One, Signed, Zero};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::{GeometryError, GeometryResult};
use crate::exact::{ExactPlane, ExactPoint, ExactVec3, Scalar, int};
use crate::plane_store::PlaneIdx;

// TYPE-SAFE INDICES

/// Index into a polytope's facet list.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FacetIdx(pub usize);

/// Index into a polytope's vertex list.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VertexIdx(pub usize);

// CORE TYPES

/// Origin of a facet.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FacetTag {
    /// One of the six sides of the bounding box (`0..6` = +X, -X, +Y, -Y, +Z, -Z).
    Bounds(u8),
    /// Halfspace of an input plane.
    Input(PlaneIdx),
}

/// A halfspace constraint with its provenance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Facet {
    pub plane: ExactPlane,
    pub tag: FacetTag,
}

/// A polytope corner.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vertex {
    pub position: ExactPoint,
    /// Facets through this vertex, sorted, at least three.
    pub facets: Vec<FacetIdx>,
}

impl Vertex {
    /// Facets shared with another vertex.
    #[must_use]
    pub fn shared_facets(&self, other: &Self) -> Vec<FacetIdx> {
        self.facets
            .iter()
            .filter(|f| other.facets.binary_search(f).is_ok())
            .copied()
            .collect()
    }
}

/// Outcome of clipping by one halfspace.
#[derive(Clone, Debug)]
pub enum Clip {
    /// Every vertex already satisfies the halfspace.
    Unchanged,
    /// The halfspace cut the polytope.
    Clipped(ConvexPolytope),
    /// Nothing with volume is left.
    Empty,
}

/// Structural inconsistencies found by [`ConvexPolytope::validate`] or while
/// loading a stored polytope.
#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum TopologyError {
    #[error("Euler mismatch: V={vertices}, E={edges}, F={faces} (expected χ = 2)")]
    EulerMismatch {
        vertices: usize,
        edges: usize,
        faces: usize,
    },
    #[error("vertex {vertex:?} has only {facet_count} incident facets (need ≥3)")]
    UnderconstrainedVertex { vertex: VertexIdx, facet_count: usize },
    #[error("vertex {vertex:?} references missing facet {facet:?}")]
    DanglingFacet { vertex: VertexIdx, facet: FacetIdx },
    #[error("vertex {vertex:?} does not lie on facet {facet:?}")]
    VertexOffFacet { vertex: VertexIdx, facet: FacetIdx },
    #[error("vertex {vertex:?} violates facet {facet:?}")]
    VertexOutside { vertex: VertexIdx, facet: FacetIdx },
    #[error("facet {facet:?} has only {vertex_count} vertices (need ≥3)")]
    DegenerateFace { facet: FacetIdx, vertex_count: usize },
}

// MAIN STRUCTURE

/// A bounded, full-dimensional convex polytope with exact coordinates.
///
/// Immutable by convention: clipping returns a new polytope, so different
/// branches of a search can share a parent without aliasing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvexPolytope {
    facets: Vec<Facet>,
    vertices: Vec<Vertex>,
}

impl ConvexPolytope {
    // CONSTRUCTION

    /// Axis-aligned box `[min, max]`.
    pub fn from_aabb(min: &ExactPoint, max: &ExactPoint) -> GeometryResult<Self> {
        if (0..3).any(|axis| min.component(axis) >= max.component(axis)) {
            return Err(GeometryError::EmptyBounds("box corners are not strictly ordered"));
        }

        let axes = [
            ExactVec3::from_integers(1, 0, 0),
            ExactVec3::from_integers(0, 1, 0),
            ExactVec3::from_integers(0, 0, 1),
        ];
        let mut facets = Vec::with_capacity(6);
        for (axis, unit) in axes.iter().enumerate() {
            // +axis: x ≤ max, -axis: -x ≤ -min
            let tag = |k: usize| FacetTag::Bounds(u8::try_from(k).unwrap_or(u8::MAX));
            facets.push(Facet {
                plane: ExactPlane::new(unit.clone(), max.component(axis).clone())?,
                tag: tag(axis * 2),
            });
            facets.push(Facet {
                plane: ExactPlane::new(-unit, -min.component(axis))?,
                tag: tag(axis * 2 + 1),
            });
        }

        let mut vertices = Vec::with_capacity(8);
        for corner in 0..8_usize {
            let pick = |axis: usize| (corner >> axis) & 1 == 1;
            let coord = |axis: usize| {
                if pick(axis) {
                    max.component(axis).clone()
                } else {
                    min.component(axis).clone()
                }
            };
            let facet_of = |axis: usize| FacetIdx(axis * 2 + usize::from(!pick(axis)));
            let mut incident = vec![facet_of(0), facet_of(1), facet_of(2)];
            incident.sort();
            vertices.push(Vertex {
                position: ExactVec3::new(coord(0), coord(1), coord(2)),
                facets: incident,
            });
        }

        Ok(Self { facets, vertices })
    }

    // BASIC QUERIES

    #[inline]
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    #[inline]
    #[must_use]
    pub fn facet_count(&self) -> usize {
        self.facets.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    #[must_use]
    pub fn facet(&self, idx: FacetIdx) -> Option<&Facet> {
        self.facets.get(idx.0)
    }

    #[must_use]
    pub fn vertex(&self, idx: VertexIdx) -> Option<&Vertex> {
        self.vertices.get(idx.0)
    }

    pub fn facets(&self) -> impl Iterator<Item = (FacetIdx, &Facet)> {
        self.facets.iter().enumerate().map(|(i, f)| (FacetIdx(i), f))
    }

    pub fn vertices(&self) -> impl Iterator<Item = (VertexIdx, &Vertex)> {
        self.vertices.iter().enumerate().map(|(i, v)| (VertexIdx(i), v))
    }

    /// Input planes carrying a face of this polytope, sorted and unique.
    #[must_use]
    pub fn input_planes(&self) -> Vec<PlaneIdx> {
        self.facets
            .iter()
            .filter_map(|f| match f.tag {
                FacetTag::Input(idx) => Some(idx),
                FacetTag::Bounds(_) => None,
            })
            .sorted()
            .dedup()
            .collect()
    }

    /// Whether any face lies on the bounding box.
    #[must_use]
    pub fn touches_bounds(&self) -> bool {
        self.facets.iter().any(|f| matches!(f.tag, FacetTag::Bounds(_)))
    }

    /// Exact axis-aligned bounds `(min, max)` of the vertices.
    #[must_use]
    pub fn bounds(&self) -> Option<(ExactPoint, ExactPoint)> {
        let first = &self.vertices.first()?.position;
        Some(self.vertices.iter().skip(1).fold(
            (first.clone(), first.clone()),
            |(lo, hi), v| (lo.component_min(&v.position), hi.component_max(&v.position)),
        ))
    }

    /// Closed containment test.
    #[must_use]
    pub fn contains(&self, p: &ExactPoint) -> bool {
        !self.is_empty() && self.facets.iter().all(|f| f.plane.side(p) != Ordering::Greater)
    }

    /// Exact average of the vertices (an interior point).
    #[must_use]
    pub fn centroid(&self) -> Option<ExactPoint> {
        if self.is_empty() {
            return None;
        }
        let sum = self
            .vertices
            .iter()
            .fold(ExactVec3::zero(), |acc, v| &acc + &v.position);
        let n = int(i64::try_from(self.vertices.len()).unwrap_or(i64::MAX));
        Some(sum.scale(&(Scalar::one() / n)))
    }

    /// Same point set: equal vertex sets, independent of storage order.
    #[must_use]
    pub fn same_geometry(&self, other: &Self) -> bool {
        if self.vertex_count() != other.vertex_count() {
            return false;
        }
        let mine: Vec<&ExactPoint> = self.vertices.iter().map(|v| &v.position).sorted().collect();
        let theirs: Vec<&ExactPoint> = other.vertices.iter().map(|v| &v.position).sorted().collect();
        mine == theirs
    }

    // TOPOLOGY

    /// Edges as vertex pairs `(i, j)` with `i < j`.
    ///
    /// Two vertices of a convex polytope span an edge exactly when they share
    /// two faces; facets are kept geometrically distinct so two shared facets
    /// always meet in a line.
    #[must_use]
    pub fn edges(&self) -> Vec<(VertexIdx, VertexIdx)> {
        let mut edges = Vec::new();
        for (i, a) in self.vertices.iter().enumerate() {
            for (j, b) in self.vertices.iter().enumerate().skip(i + 1) {
                let shared = a
                    .facets
                    .iter()
                    .filter(|f| b.facets.binary_search(f).is_ok())
                    .take(2)
                    .count();
                if shared >= 2 {
                    edges.push((VertexIdx(i), VertexIdx(j)));
                }
            }
        }
        edges
    }

    /// Vertices of one facet, counter-clockwise seen from outside.
    #[must_use]
    pub fn face(&self, facet: FacetIdx) -> Vec<VertexIdx> {
        let Some(plane) = self.facets.get(facet.0).map(|f| &f.plane) else {
            return Vec::new();
        };
        let on_face: Vec<VertexIdx> = self
            .vertices()
            .filter(|(_, v)| v.facets.binary_search(&facet).is_ok())
            .map(|(i, _)| i)
            .collect();
        if on_face.len() < 3 {
            return Vec::new();
        }

        // Angular sort around the exact centroid of the face.
        let n = int(i64::try_from(on_face.len()).unwrap_or(i64::MAX));
        let center = on_face
            .iter()
            .fold(ExactVec3::zero(), |acc, &i| &acc + &self.vertices[i.0].position)
            .scale(&(Scalar::one() / n));
        let normal = &plane.normal;
        let reference = &self.vertices[on_face[0].0].position - &center;

        // Half 0 sweeps [0, π) from the reference direction, half 1 [π, 2π).
        let half = |d: &ExactVec3| -> u8 {
            let turn = reference.cross(d).dot(normal);
            if turn.is_positive() || (turn.is_zero() && reference.dot(d).is_positive()) {
                0
            } else {
                1
            }
        };

        let mut keyed: Vec<(u8, ExactVec3, VertexIdx)> = on_face
            .iter()
            .map(|&i| {
                let d = &self.vertices[i.0].position - &center;
                (half(&d), d, i)
            })
            .collect();
        keyed.sort_by(|(ha, da, _), (hb, db, _)| {
            ha.cmp(hb).then_with(|| {
                // a before b when b is counter-clockwise of a
                let turn = da.cross(db).dot(normal);
                if turn.is_positive() {
                    Ordering::Less
                } else if turn.is_negative() {
                    Ordering::Greater
                } else {
                    Ordering::Equal
                }
            })
        });
        keyed.into_iter().map(|(_, _, i)| i).collect()
    }

    /// All faces with their facet index.
    #[must_use]
    pub fn faces(&self) -> Vec<(FacetIdx, Vec<VertexIdx>)> {
        (0..self.facets.len())
            .map(FacetIdx)
            .map(|f| (f, self.face(f)))
            .filter(|(_, face)| face.len() >= 3)
            .collect()
    }

    /// Check vertex/facet incidence and the Euler characteristic.
    pub fn validate(&self) -> Result<(), TopologyError> {
        for (v_idx, vertex) in self.vertices() {
            if vertex.facets.len() < 3 {
                return Err(TopologyError::UnderconstrainedVertex {
                    vertex: v_idx,
                    facet_count: vertex.facets.len(),
                });
            }
            for &f_idx in &vertex.facets {
                let Some(facet) = self.facet(f_idx) else {
                    return Err(TopologyError::DanglingFacet {
                        vertex: v_idx,
                        facet: f_idx,
                    });
                };
                if facet.plane.side(&vertex.position) != Ordering::Equal {
                    return Err(TopologyError::VertexOffFacet {
                        vertex: v_idx,
                        facet: f_idx,
                    });
                }
            }
            for (f_idx, facet) in self.facets() {
                if facet.plane.side(&vertex.position) == Ordering::Greater {
                    return Err(TopologyError::VertexOutside {
                        vertex: v_idx,
                        facet: f_idx,
                    });
                }
            }
        }

        for (f_idx, _) in self.facets() {
            let count = self.vertices.iter().filter(|v| v.facets.contains(&f_idx)).count();
            if count < 3 {
                return Err(TopologyError::DegenerateFace {
                    facet: f_idx,
                    vertex_count: count,
                });
            }
        }

        let (v, e, f) = (self.vertex_count(), self.edges().len(), self.facet_count());
        if v + f != e + 2 {
            return Err(TopologyError::EulerMismatch {
                vertices: v,
                edges: e,
                faces: f,
            });
        }
        Ok(())
    }

    // CLIPPING

    /// Intersect with the closed halfspace `plane`, tagging the new facet.
    ///
    /// # Algorithm
    ///
    /// ```text
    /// 1. Halfspace already present → Unchanged
    /// 2. Classify vertices (exact sign of n·v - d)
    /// 3. No vertex strictly inside → Empty; none outside → Unchanged
    /// 4. Keep inside/on vertices (on vertices gain the new facet)
    /// 5. Split every inside/outside edge at the boundary
    /// 6. Drop facets with < 3 vertices, reindex
    /// ```
    pub fn clip(&self, plane: &ExactPlane, tag: FacetTag) -> GeometryResult<Clip> {
        if self.is_empty() {
            return Ok(Clip::Empty);
        }
        if plane.normal.is_zero() {
            return Err(GeometryError::DegeneratePlane(input_of(tag)));
        }
        if self.facets.iter().any(|f| f.plane.same_halfspace(plane)) {
            return Ok(Clip::Unchanged);
        }

        let values: Vec<Scalar> = self.vertices.iter().map(|v| plane.evaluate(&v.position)).collect();
        let any_inside = values.iter().any(Signed::is_negative);
        let any_outside = values.iter().any(Signed::is_positive);
        if !any_inside {
            return Ok(Clip::Empty);
        }
        if !any_outside {
            return Ok(Clip::Unchanged);
        }

        let new_facet = FacetIdx(self.facets.len());
        let mut facets = self.facets.clone();
        facets.push(Facet {
            plane: plane.clone(),
            tag,
        });

        // Steps 4-5
        let mut vertices: Vec<Vertex> = Vec::with_capacity(self.vertices.len() + 4);
        for (vertex, value) in self.vertices.iter().zip(&values) {
            if value.is_positive() {
                continue;
            }
            let mut kept = vertex.clone();
            if value.is_zero() {
                kept.facets.push(new_facet);
            }
            vertices.push(kept);
        }

        for (a, b) in self.edges() {
            let (va, vb) = (&values[a.0], &values[b.0]);
            let crosses = (va.is_negative() && vb.is_positive()) || (va.is_positive() && vb.is_negative());
            if !crosses {
                continue;
            }
            let denom = va - vb;
            if denom.is_zero() {
                return Err(GeometryError::SingularIntersection {
                    edge: (a.0, b.0),
                    plane: input_of(tag),
                });
            }
            let t = va / denom;
            let pa = &self.vertices[a.0].position;
            let pb = &self.vertices[b.0].position;
            let position = pa + &(pb - pa).scale(&t);

            let mut incident = self.vertices[a.0].shared_facets(&self.vertices[b.0]);
            incident.push(new_facet);
            vertices.push(Vertex {
                position,
                facets: incident,
            });
        }

        Ok(Clip::Clipped(Self::compacted(facets, vertices)))
    }

    /// Exact intersection with another polytope, `None` when it has no volume.
    pub fn intersection(&self, other: &Self) -> GeometryResult<Option<Self>> {
        let mut current = self.clone();
        for facet in &other.facets {
            match current.clip(&facet.plane, facet.tag)? {
                Clip::Unchanged => {}
                Clip::Clipped(next) => current = next,
                Clip::Empty => return Ok(None),
            }
        }
        Ok(Some(current))
    }

    /// Drop facets with fewer than three vertices and renumber.
    fn compacted(facets: Vec<Facet>, mut vertices: Vec<Vertex>) -> Self {
        let mut counts = vec![0_usize; facets.len()];
        for v in &vertices {
            for f in &v.facets {
                counts[f.0] += 1;
            }
        }

        let mut remap = vec![None; facets.len()];
        let mut kept = Vec::with_capacity(facets.len());
        for (i, facet) in facets.into_iter().enumerate() {
            if counts[i] >= 3 {
                remap[i] = Some(FacetIdx(kept.len()));
                kept.push(facet);
            }
        }

        for v in &mut vertices {
            v.facets = v.facets.iter().filter_map(|f| remap[f.0]).sorted().dedup().collect();
        }

        Self {
            facets: kept,
            vertices,
        }
    }

    // OUTPUT

    /// Display mesh: float positions and counter-clockwise faces.
    #[must_use]
    pub fn to_mesh(&self) -> (Vec<DVec3>, Vec<Vec<usize>>) {
        let positions = self.vertices.iter().map(|v| v.position.to_dvec3()).collect();
        let faces = self
            .faces()
            .into_iter()
            .map(|(_, face)| face.into_iter().map(|v| v.0).collect())
            .collect();
        (positions, faces)
    }

    /// Display edges as float segments.
    #[must_use]
    pub fn edge_segments(&self) -> Vec<(DVec3, DVec3)> {
        self.edges()
            .into_iter()
            .map(|(a, b)| {
                (
                    self.vertices[a.0].position.to_dvec3(),
                    self.vertices[b.0].position.to_dvec3(),
                )
            })
            .collect()
    }
}

const fn input_of(tag: FacetTag) -> Option<PlaneIdx> {
    match tag {
        FacetTag::Input(idx) => Some(idx),
        FacetTag::Bounds(_) => None,
    }
}
