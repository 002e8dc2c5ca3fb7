//! # Space Partitioner
//!
//! Splits a padded bounding box by every input plane and returns the convex
//! cells of the resulting arrangement, each tagged with the input planes that
//! bound it.
//!
//! ## Algorithm
//!
//! ```text
//! branch(region, k, provenance):
//!     if k == N: emit region as a candidate
//!     for side in [positive(k), negative(k)]:
//!         match clip(region, side):
//!             Empty      → prune
//!             Unchanged  → branch(region,  k + 1, provenance)
//!             Clipped(r) → branch(r,       k + 1, provenance + k)
//! ```
//!
//! Both sides clip the *same* parent region, and every branch owns its own
//! [`Provenance`] (a persistent list sharing its prefix with siblings), so no
//! branch can observe another branch's planes.
//!
//! At a leaf the provenance is tightened to the planes that still carry a 2D
//! face of the cell: a plane that cut an ancestor region may be made redundant
//! by a later cut.
//!
//! ## Scalability
//!
//! The recursion is binary at every level, so the number of branches is
//! `O(2^N)` in the worst case. Empty branches are pruned, which bounds the
//! result by the number of arrangement cells (`O(N³)` for planes in general
//! position), but intermediate work still grows quickly. Fine for tens of
//! planes, not for thousands.

use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::exact::{ExactPlane, ExactPoint};
use crate::plane_store::{Aabb, PlaneIdx, PlaneStore};
use crate::polytope::{Clip, ConvexPolytope, FacetTag};

/// Padding around the contour bounding box, as a fraction of its diagonal.
pub const DEFAULT_PADDING_RATIO: f64 = 0.1;

// PROVENANCE

#[derive(Debug)]
struct ProvenanceNode {
    plane: PlaneIdx,
    parent: Provenance,
}

/// Append-only list of plane indices that cut a branch on its way down.
///
/// Pushing returns a new list sharing the old one as its tail; the old list is
/// untouched, so sibling branches can extend the same parent independently.
#[derive(Clone, Debug, Default)]
pub struct Provenance(Option<Rc<ProvenanceNode>>);

impl Provenance {
    #[must_use]
    pub const fn empty() -> Self {
        Self(None)
    }

    #[must_use]
    pub fn push(&self, plane: PlaneIdx) -> Self {
        Self(Some(Rc::new(ProvenanceNode {
            plane,
            parent: self.clone(),
        })))
    }

    /// Most recent first.
    pub fn iter(&self) -> impl Iterator<Item = PlaneIdx> + '_ {
        std::iter::successors(self.0.as_deref(), |&node| node.parent.0.as_deref()).map(|node| node.plane)
    }

    /// Ascending plane indices.
    #[must_use]
    pub fn to_sorted_vec(&self) -> Vec<PlaneIdx> {
        let mut planes: Vec<PlaneIdx> = self.iter().collect();
        planes.sort_unstable();
        planes.dedup();
        planes
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_none()
    }
}

// CELLS

/// A convex cell of the partition with the input planes bounding it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvexCell {
    pub polytope: ConvexPolytope,
    /// Input planes carrying a face of the cell; sorted, unique.
    ///
    /// Cells reaching the padding box count the planes that cut them inside
    /// the box, so a plane count alone does not single out bounded cells: four
    /// planes around a tetrahedron give 15 cells, 11 of them with all four
    /// planes. [`ConvexCell::is_interior`] tells the bounded one apart.
    pub planes: Vec<PlaneIdx>,
}

impl ConvexCell {
    #[must_use]
    pub fn new(polytope: ConvexPolytope, mut planes: Vec<PlaneIdx>) -> Self {
        planes.sort_unstable();
        planes.dedup();
        Self { polytope, planes }
    }

    /// `true` when no face lies on the padding box.
    #[must_use]
    pub fn is_interior(&self) -> bool {
        !self.polytope.touches_bounds()
    }

    #[must_use]
    pub fn bounds(&self) -> Option<(ExactPoint, ExactPoint)> {
        self.polytope.bounds()
    }

    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.polytope.vertex_count()
    }
}

// PARTITIONER

/// Recursive exact partition of a padded box by the planes of a [`PlaneStore`].
///
/// See the [module docs](self) for the algorithm and its `O(2^N)` ceiling.
#[derive(Debug)]
pub struct SpacePartitioner {
    /// Positive and negative halfspace per plane, `None` for degenerate planes.
    halfspaces: Vec<Option<(ExactPlane, ExactPlane)>>,
    bounds: Option<Aabb>,
    cells: Vec<ConvexCell>,
}

impl SpacePartitioner {
    /// Partitioner over the store's bounds padded by [`DEFAULT_PADDING_RATIO`].
    #[must_use]
    pub fn new(store: &PlaneStore) -> Self {
        Self::with_padding(store, DEFAULT_PADDING_RATIO)
    }

    #[must_use]
    pub fn with_padding(store: &PlaneStore, ratio: f64) -> Self {
        let bounds = store.bounds().map(|b| b.padded(ratio));
        Self::build(store, bounds)
    }

    /// Partitioner over an explicit box, used as is.
    #[must_use]
    pub fn with_bounds(store: &PlaneStore, bounds: Aabb) -> Self {
        Self::build(store, Some(bounds))
    }

    fn build(store: &PlaneStore, bounds: Option<Aabb>) -> Self {
        let halfspaces = store
            .iter()
            .map(|(idx, contour)| {
                let sides = contour
                    .plane
                    .positive_halfspace()
                    .and_then(|pos| Ok((pos, contour.plane.negative_halfspace()?)));
                match sides {
                    Ok(sides) => Some(sides),
                    Err(err) => {
                        warn!(plane = idx.0, file = %contour.filename, %err, "skipping degenerate plane");
                        None
                    }
                }
            })
            .collect();
        Self {
            halfspaces,
            bounds,
            cells: Vec::new(),
        }
    }

    #[must_use]
    pub fn plane_count(&self) -> usize {
        self.halfspaces.len()
    }

    #[must_use]
    pub const fn bounds(&self) -> Option<Aabb> {
        self.bounds
    }

    /// The starting region, `None` when there is nothing to partition.
    fn root(&self) -> Option<ConvexPolytope> {
        if self.halfspaces.is_empty() {
            return None;
        }
        let Some(bounds) = self.bounds else {
            warn!("no contour vertices, cannot bound the partition");
            return None;
        };
        let root = bounds
            .to_exact()
            .and_then(|(min, max)| ConvexPolytope::from_aabb(&min, &max));
        match root {
            Ok(root) => Some(root),
            Err(err) => {
                warn!(?bounds, %err, "bounding box has no volume");
                None
            }
        }
    }

    /// Every leaf of the recursion, before redundancy filtering.
    #[must_use]
    pub fn candidates(&self) -> Vec<ConvexCell> {
        let mut out = Vec::new();
        if let Some(root) = self.root() {
            self.branch(&root, 0, &Provenance::empty(), &mut out);
        }
        debug!(count = out.len(), "partition candidates");
        out
    }

    fn branch(&self, region: &ConvexPolytope, next: usize, provenance: &Provenance, out: &mut Vec<ConvexCell>) {
        let Some(sides) = self.halfspaces.get(next) else {
            out.push(Self::leaf(region.clone(), provenance));
            return;
        };
        let Some((positive, negative)) = sides else {
            // Degenerate plane, logged at construction.
            self.branch(region, next + 1, provenance, out);
            return;
        };

        let idx = PlaneIdx(next);
        for halfspace in [positive, negative] {
            match region.clip(halfspace, FacetTag::Input(idx)) {
                Ok(Clip::Unchanged) => self.branch(region, next + 1, provenance, out),
                Ok(Clip::Clipped(child)) => self.branch(&child, next + 1, &provenance.push(idx), out),
                Ok(Clip::Empty) => {}
                Err(err) => warn!(plane = next, %err, "skipping branch"),
            }
        }
    }

    fn leaf(polytope: ConvexPolytope, provenance: &Provenance) -> ConvexCell {
        let bounding = polytope.input_planes();
        let planes = provenance
            .to_sorted_vec()
            .into_iter()
            .filter(|p| bounding.binary_search(p).is_ok())
            .collect();
        ConvexCell::new(polytope, planes)
    }

    /// Compute the candidates and keep the elementary ones.
    pub fn compute_cells(&mut self) -> &[ConvexCell] {
        let candidates = self.candidates();
        self.cells = elementary_cells(candidates);
        info!(
            planes = self.plane_count(),
            cells = self.cells.len(),
            "space partition complete"
        );
        &self.cells
    }

    /// Cells from the last [`Self::compute_cells`], empty before that.
    #[must_use]
    pub fn cells(&self) -> &[ConvexCell] {
        &self.cells
    }

    #[must_use]
    pub fn cell(&self, index: usize) -> Option<&ConvexCell> {
        let cell = self.cells.get(index);
        if cell.is_none() {
            debug!(index, len = self.cells.len(), "cell index out of range");
        }
        cell
    }

    #[must_use]
    pub fn into_cells(self) -> Vec<ConvexCell> {
        self.cells
    }
}

/// Pairwise redundancy filter.
///
/// When two candidates overlap and the overlap has as many vertices as one of
/// them, the one with more vertices is dropped (the later one on a tie).
/// Candidates coming out of [`SpacePartitioner::candidates`] have disjoint
/// interiors, so for them this keeps everything; the test matters for cell
/// sets assembled elsewhere, e.g. loaded from an older cache.
#[must_use]
pub fn elementary_cells(candidates: Vec<ConvexCell>) -> Vec<ConvexCell> {
    let mut redundant = vec![false; candidates.len()];
    for i in 0..candidates.len() {
        for j in i + 1..candidates.len() {
            let (a, b) = (&candidates[i], &candidates[j]);
            let overlap = match a.polytope.intersection(&b.polytope) {
                Ok(overlap) => overlap,
                Err(err) => {
                    warn!(i, j, %err, "cell intersection failed, treating as disjoint");
                    continue;
                }
            };
            let Some(overlap) = overlap else { continue };
            let shared = overlap.vertex_count();
            if shared == a.vertex_count() || shared == b.vertex_count() {
                let drop = if a.vertex_count() > b.vertex_count() { i } else { j };
                debug!(i, j, dropped = drop, "redundant cell");
                redundant[drop] = true;
            }
        }
    }
    candidates
        .into_iter()
        .zip(redundant)
        .filter_map(|(cell, redundant)| (!redundant).then_some(cell))
        .collect()
}
