//! Exact 3D Delaunay tetrahedralization.
//!
//! # Algorithm
//!
//! Incremental Bowyer–Watson with a symbolic vertex at infinity:
//!
//! ```text
//! seed with the first four affinely independent points
//! close the hull with one ghost tetrahedron (face, ∞) per hull face
//! for each remaining point p:
//!     1. Cavity: finite tetrahedra whose circumsphere strictly contains p,
//!        ghosts whose hull face p sees strictly (or, when coplanar, whose
//!        circumcircle strictly contains p)
//!     2. Repair: while a cavity boundary face would give a flat
//!        tetrahedron with p, add the tetrahedron behind it
//!     3. Replace the cavity by the cone from p to its boundary faces
//! report the finite tetrahedra
//! ```
//!
//! Ghosts cover everything outside the hull, so there is no enclosing
//! construction whose circumsphere could swallow real hull tetrahedra, and
//! every input point ends up as a vertex. Ghost orientation is never stored:
//! the outside of a hull face is the side away from the seed centroid, which
//! stays strictly inside the hull as it grows.
//!
//! Predicates are exact ([`orient3d`], [`insphere`]), so the result is a valid
//! tetrahedralization of the convex hull for any input that is not flat; it
//! is Delaunay up to ties between cospherical points.

use std::cmp::Ordering;

use glam::DVec3;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, warn};

use crate::error::GeometryResult;
use crate::exact::{ExactPoint, insphere, orient3d, ratio};

/// Index of the vertex at infinity.
const INFINITE: usize = usize::MAX;

type Tet = [usize; 4];
type FaceKey = [usize; 3];

/// Tetrahedralization of a point set.
#[derive(Clone, Debug, Default)]
pub struct Tetrahedralization {
    points: Vec<ExactPoint>,
    /// Positively oriented, indices into `points`.
    tetrahedra: Vec<Tet>,
    duplicates: usize,
}

impl Tetrahedralization {
    #[must_use]
    pub fn new(points: &[ExactPoint]) -> Self {
        let mut result = Self {
            points: points.to_vec(),
            tetrahedra: Vec::new(),
            duplicates: 0,
        };

        let mut seen: FxHashSet<&ExactPoint> = FxHashSet::default();
        let mut order = Vec::with_capacity(points.len());
        for (pi, p) in points.iter().enumerate() {
            if seen.insert(p) {
                order.push(pi);
            } else {
                result.duplicates += 1;
            }
        }

        let Some(seed) = seed_simplex(points, &order) else {
            debug!(points = points.len(), "input is flat, no tetrahedra");
            return result;
        };

        let mut hull = Hull::new(points, seed);
        for &pi in order.iter().filter(|pi| !seed.contains(*pi)) {
            hull.insert(pi);
        }

        result.tetrahedra = hull.tets.into_iter().filter(|t| !t.contains(&INFINITE)).collect();
        debug!(
            points = points.len(),
            tetrahedra = result.tetrahedra.len(),
            duplicates = result.duplicates,
            "tetrahedralization built"
        );
        result
    }

    /// Tetrahedralize float input.
    pub fn from_dvec3(points: &[DVec3]) -> GeometryResult<Self> {
        let exact = points
            .iter()
            .map(|&p| ExactPoint::from_dvec3(p))
            .collect::<GeometryResult<Vec<_>>>()?;
        Ok(Self::new(&exact))
    }

    #[must_use]
    pub fn points(&self) -> &[ExactPoint] {
        &self.points
    }

    /// Positively oriented tetrahedra.
    #[must_use]
    pub fn tetrahedra(&self) -> &[[usize; 4]] {
        &self.tetrahedra
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tetrahedra.is_empty()
    }

    /// Input points dropped because an identical point came earlier.
    #[must_use]
    pub const fn duplicate_count(&self) -> usize {
        self.duplicates
    }

    /// Every triangle of every tetrahedron, once, as sorted index triples in
    /// ascending order.
    #[must_use]
    pub fn facets(&self) -> Vec<[usize; 3]> {
        let mut facets: Vec<FaceKey> = self
            .tetrahedra
            .iter()
            .flat_map(|t| faces_of(t).map(|(key, _)| key))
            .collect();
        facets.sort_unstable();
        facets.dedup();
        facets
    }
}

/// First four affinely independent points of `order`, positively oriented.
fn seed_simplex(points: &[ExactPoint], order: &[usize]) -> Option<Tet> {
    let a = *order.first()?;
    let b = *order.get(1)?;
    let ab = &points[b] - &points[a];
    let c = *order
        .iter()
        .find(|&&c| !ab.cross(&(&points[c] - &points[a])).is_zero())?;
    let (pa, pb, pc) = (&points[a], &points[b], &points[c]);
    let d = *order.iter().find(|&&d| orient3d(pa, pb, pc, &points[d]) != Ordering::Equal)?;
    Some(if orient3d(pa, pb, pc, &points[d]) == Ordering::Greater {
        [a, b, c, d]
    } else {
        [b, a, c, d]
    })
}

/// The four faces of a tetrahedron: sorted key and opposite vertex.
fn faces_of(t: &Tet) -> [(FaceKey, usize); 4] {
    [0, 1, 2, 3].map(|skip| {
        let mut key = [0; 3];
        let mut k = 0;
        for (i, &v) in t.iter().enumerate() {
            if i != skip {
                key[k] = v;
                k += 1;
            }
        }
        key.sort_unstable();
        (key, t[skip])
    })
}

fn face_map(tets: &[Tet]) -> FxHashMap<FaceKey, Vec<usize>> {
    let mut map: FxHashMap<FaceKey, Vec<usize>> = FxHashMap::default();
    for (ti, t) in tets.iter().enumerate() {
        for (key, _) in faces_of(t) {
            map.entry(key).or_default().push(ti);
        }
    }
    map
}

/// Hull face of a ghost tetrahedron, `None` for a finite one.
fn ghost_face(t: &Tet) -> Option<FaceKey> {
    faces_of(t)
        .into_iter()
        .find_map(|(key, opposite)| (opposite == INFINITE).then_some(key))
}

/// Finite and ghost tetrahedra covering all of space.
struct Hull<'a> {
    points: &'a [ExactPoint],
    /// Seed centroid, strictly inside every later hull.
    inner: ExactPoint,
    tets: Vec<Tet>,
}

impl<'a> Hull<'a> {
    fn new(points: &'a [ExactPoint], seed: Tet) -> Self {
        let [a, b, c, d] = seed.map(|v| &points[v]);
        let inner = (&(a + b) + &(c + d)).scale(&ratio(1, 4));
        let mut tets = vec![seed];
        tets.extend(faces_of(&seed).map(|([x, y, z], _)| [x, y, z, INFINITE]));
        Self { points, inner, tets }
    }

    /// Side of hull face `key` facing away from the hull.
    fn outside(&self, key: &FaceKey) -> Ordering {
        let [a, b, c] = key.map(|v| &self.points[v]);
        orient3d(a, b, c, &self.inner).reverse()
    }

    fn in_conflict(&self, t: &Tet, p: &ExactPoint) -> bool {
        let Some(key) = ghost_face(t) else {
            let [a, b, c, d] = t.map(|v| &self.points[v]);
            return insphere(a, b, c, d, p) == Ordering::Greater;
        };
        let [a, b, c] = key.map(|v| &self.points[v]);
        match orient3d(a, b, c, p) {
            Ordering::Equal => {
                // Any sphere through a, b, c cuts their plane in the circumcircle.
                let apex = a + &(b - a).cross(&(c - a));
                insphere(a, b, c, &apex, p) == Ordering::Greater
            }
            side => side == self.outside(&key),
        }
    }

    /// Whether coning boundary face `key` (opposite vertex `opposite` in the
    /// cavity) to `p` would give a flat or inverted tetrahedron.
    fn blocks_cone(&self, key: &FaceKey, opposite: usize, p: &ExactPoint) -> bool {
        if key[2] == INFINITE {
            let [a, b] = [key[0], key[1]].map(|v| &self.points[v]);
            return (b - a).cross(&(p - a)).is_zero();
        }
        let [a, b, c] = key.map(|v| &self.points[v]);
        let side = orient3d(a, b, c, p);
        let expected = if opposite == INFINITE {
            self.outside(key)
        } else {
            orient3d(a, b, c, &self.points[opposite])
        };
        side == Ordering::Equal || side != expected
    }

    fn insert(&mut self, pi: usize) {
        let points = self.points;
        let p = &points[pi];
        let mut in_cavity: Vec<bool> = self.tets.iter().map(|t| self.in_conflict(t, p)).collect();
        if !in_cavity.contains(&true) {
            warn!(point = pi, "no tetrahedron conflicts with the point, skipped");
            return;
        }

        let faces = face_map(&self.tets);
        let neighbor = |ti: usize, key: &FaceKey| faces.get(key).and_then(|ts| ts.iter().copied().find(|&o| o != ti));

        loop {
            let mut grown = Vec::new();
            for (ti, t) in self.tets.iter().enumerate().filter(|(ti, _)| in_cavity[*ti]) {
                for (key, opposite) in faces_of(t) {
                    let outside = neighbor(ti, &key);
                    if outside.is_some_and(|ni| in_cavity[ni]) || !self.blocks_cone(&key, opposite, p) {
                        continue;
                    }
                    let Some(ni) = outside else {
                        warn!(point = pi, "cavity boundary has no neighbor, point skipped");
                        return;
                    };
                    grown.push(ni);
                }
            }
            if grown.is_empty() {
                break;
            }
            for ni in grown {
                in_cavity[ni] = true;
            }
        }

        let mut cone = Vec::new();
        for (ti, t) in self.tets.iter().enumerate().filter(|(ti, _)| in_cavity[*ti]) {
            for (key, _) in faces_of(t) {
                if neighbor(ti, &key).is_some_and(|ni| in_cavity[ni]) {
                    continue;
                }
                let [a, b, c] = key;
                let tet = if c == INFINITE {
                    [a, b, pi, INFINITE]
                } else if orient3d(&points[a], &points[b], &points[c], p) == Ordering::Greater {
                    [a, b, c, pi]
                } else {
                    [b, a, c, pi]
                };
                cone.push(tet);
            }
        }

        let mut kept: Vec<Tet> = self
            .tets
            .iter()
            .zip(&in_cavity)
            .filter_map(|(t, &gone)| (!gone).then_some(*t))
            .collect();
        kept.extend(cone);
        self.tets = kept;
    }
}
