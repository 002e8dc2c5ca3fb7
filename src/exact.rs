//! # Exact kernel
//!
//! Arbitrary-precision rational arithmetic for everything that changes
//! topology: halfspace clipping, polytope intersection, bounding boxes of
//! cells, axis-plane positions and the Delaunay predicates.
//!
//! Floating point only appears on the two sides of the numeric boundary:
//!
//! ```text
//!   f64 input (contour files)
//!        │  exact_from_f64 / ExactVec3::from_dvec3   (lossless, fails on NaN/inf)
//!        ▼
//!   Scalar = BigRational  ── all predicates and constructions ──
//!        │  scalar_to_f64 / ExactVec3::to_dvec3      (rounding, display only)
//!        ▼
//!   f64 output (meshes for rendering)
//! ```
//!
//! Every finite `f64` is a dyadic rational, so the inbound conversion never
//! rounds. Repeated clipping therefore cannot drift.

use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};

use glam::DVec3;
use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{One, Signed, ToPrimitive, Zero};
use serde::{Deserialize, Serialize};

use crate::error::{GeometryError, GeometryResult};

/// Exact scalar type.
pub type Scalar = BigRational;

/// Convert an input float into the exact kernel.
pub fn exact_from_f64(value: f64) -> GeometryResult<Scalar> {
    BigRational::from_float(value).ok_or(GeometryError::NonFinite(value))
}

/// Round an exact value to the nearest representable float (display side).
#[must_use]
pub fn scalar_to_f64(value: &Scalar) -> f64 {
    value.to_f64().unwrap_or(f64::NAN)
}

/// Exact integer scalar.
#[must_use]
pub fn int(value: i64) -> Scalar {
    BigRational::from_integer(BigInt::from(value))
}

/// Exact `num / den`.
///
/// # Panics
/// Panics if `den` is zero.
#[must_use]
pub fn ratio(num: i64, den: i64) -> Scalar {
    BigRational::new(BigInt::from(num), BigInt::from(den))
}

#[inline]
fn sign(value: &Scalar) -> Ordering {
    if value.is_positive() {
        Ordering::Greater
    } else if value.is_negative() {
        Ordering::Less
    } else {
        Ordering::Equal
    }
}

// VECTORS

/// Exact 3-vector, used both for points and directions.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ExactVec3 {
    #[serde(with = "scalar_serde")]
    pub x: Scalar,
    #[serde(with = "scalar_serde")]
    pub y: Scalar,
    #[serde(with = "scalar_serde")]
    pub z: Scalar,
}

/// Points and vectors share one representation.
pub type ExactPoint = ExactVec3;

impl ExactVec3 {
    #[must_use]
    pub const fn new(x: Scalar, y: Scalar, z: Scalar) -> Self {
        Self { x, y, z }
    }

    #[must_use]
    pub fn zero() -> Self {
        Self::new(Scalar::zero(), Scalar::zero(), Scalar::zero())
    }

    /// Integer coordinates, mostly for tests and bounding constructions.
    #[must_use]
    pub fn from_integers(x: i64, y: i64, z: i64) -> Self {
        Self::new(int(x), int(y), int(z))
    }

    /// Lossless conversion from an input float vector.
    pub fn from_dvec3(v: DVec3) -> GeometryResult<Self> {
        Ok(Self::new(
            exact_from_f64(v.x)?,
            exact_from_f64(v.y)?,
            exact_from_f64(v.z)?,
        ))
    }

    /// Rounded conversion for display.
    #[must_use]
    pub fn to_dvec3(&self) -> DVec3 {
        DVec3::new(
            scalar_to_f64(&self.x),
            scalar_to_f64(&self.y),
            scalar_to_f64(&self.z),
        )
    }

    /// Component by axis index (0 = x, 1 = y, 2 = z).
    #[must_use]
    pub fn component(&self, axis: usize) -> &Scalar {
        match axis {
            0 => &self.x,
            1 => &self.y,
            _ => &self.z,
        }
    }

    /// Copy with one component replaced.
    #[must_use]
    pub fn with_component(&self, axis: usize, value: Scalar) -> Self {
        let mut out = self.clone();
        match axis {
            0 => out.x = value,
            1 => out.y = value,
            _ => out.z = value,
        }
        out
    }

    #[must_use]
    pub fn dot(&self, other: &Self) -> Scalar {
        &self.x * &other.x + &self.y * &other.y + &self.z * &other.z
    }

    #[must_use]
    pub fn cross(&self, other: &Self) -> Self {
        Self::new(
            &self.y * &other.z - &self.z * &other.y,
            &self.z * &other.x - &self.x * &other.z,
            &self.x * &other.y - &self.y * &other.x,
        )
    }

    #[must_use]
    pub fn scale(&self, k: &Scalar) -> Self {
        Self::new(&self.x * k, &self.y * k, &self.z * k)
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.x.is_zero() && self.y.is_zero() && self.z.is_zero()
    }

    #[must_use]
    pub fn length_squared(&self) -> Scalar {
        self.dot(self)
    }

    /// Component-wise minimum.
    #[must_use]
    pub fn component_min(&self, other: &Self) -> Self {
        Self::new(
            self.x.clone().min(other.x.clone()),
            self.y.clone().min(other.y.clone()),
            self.z.clone().min(other.z.clone()),
        )
    }

    /// Component-wise maximum.
    #[must_use]
    pub fn component_max(&self, other: &Self) -> Self {
        Self::new(
            self.x.clone().max(other.x.clone()),
            self.y.clone().max(other.y.clone()),
            self.z.clone().max(other.z.clone()),
        )
    }
}

impl fmt::Display for ExactVec3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

impl Add for &ExactVec3 {
    type Output = ExactVec3;

    fn add(self, rhs: Self) -> ExactVec3 {
        ExactVec3::new(&self.x + &rhs.x, &self.y + &rhs.y, &self.z + &rhs.z)
    }
}

impl Sub for &ExactVec3 {
    type Output = ExactVec3;

    fn sub(self, rhs: Self) -> ExactVec3 {
        ExactVec3::new(&self.x - &rhs.x, &self.y - &rhs.y, &self.z - &rhs.z)
    }
}

impl Neg for &ExactVec3 {
    type Output = ExactVec3;

    fn neg(self) -> ExactVec3 {
        ExactVec3::new(-&self.x, -&self.y, -&self.z)
    }
}

impl Mul<&Scalar> for &ExactVec3 {
    type Output = ExactVec3;

    fn mul(self, rhs: &Scalar) -> ExactVec3 {
        self.scale(rhs)
    }
}

// HALFSPACES

/// Closed halfspace `normal · p ≤ offset`.
///
/// The normal points toward the excluded side, as in the polytope code: a
/// point with positive [`ExactPlane::evaluate`] lies outside.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExactPlane {
    pub normal: ExactVec3,
    #[serde(with = "scalar_serde")]
    pub offset: Scalar,
}

impl ExactPlane {
    /// Build a halfspace, rejecting a zero normal.
    pub fn new(normal: ExactVec3, offset: Scalar) -> GeometryResult<Self> {
        if normal.is_zero() {
            return Err(GeometryError::DegeneratePlane(None));
        }
        Ok(Self { normal, offset })
    }

    /// `normal · p - offset`: negative inside, zero on the boundary, positive outside.
    #[must_use]
    pub fn evaluate(&self, p: &ExactPoint) -> Scalar {
        self.normal.dot(p) - &self.offset
    }

    /// Exact side test: `Less` inside, `Equal` on the boundary, `Greater` outside.
    #[must_use]
    pub fn side(&self, p: &ExactPoint) -> Ordering {
        sign(&self.evaluate(p))
    }

    /// The closed complement halfspace (same boundary plane).
    #[must_use]
    pub fn flipped(&self) -> Self {
        Self {
            normal: -&self.normal,
            offset: -&self.offset,
        }
    }

    /// `other` describes the same halfspace (positive multiple of `self`).
    #[must_use]
    pub fn same_halfspace(&self, other: &Self) -> bool {
        matches!(self.proportionality(other), Some(k) if k.is_positive())
    }

    /// Same boundary plane, either orientation.
    #[must_use]
    pub fn coincident(&self, other: &Self) -> bool {
        self.proportionality(other).is_some()
    }

    fn proportionality(&self, other: &Self) -> Option<Scalar> {
        let pivot = (0..3).find(|&axis| !self.normal.component(axis).is_zero())?;
        let k = other.normal.component(pivot) / self.normal.component(pivot);
        if k.is_zero() {
            return None;
        }
        (self.normal.scale(&k) == other.normal && &self.offset * &k == other.offset).then_some(k)
    }
}

// PREDICATES

fn det3(m: &[[Scalar; 3]; 3]) -> Scalar {
    &m[0][0] * (&m[1][1] * &m[2][2] - &m[1][2] * &m[2][1])
        - &m[0][1] * (&m[1][0] * &m[2][2] - &m[1][2] * &m[2][0])
        + &m[0][2] * (&m[1][0] * &m[2][1] - &m[1][1] * &m[2][0])
}

/// Sign of `((b - a) × (c - a)) · (d - a)`.
///
/// `Greater` when `d` lies on the side the right-handed normal of `a, b, c`
/// points to, `Equal` when the four points are coplanar.
#[must_use]
pub fn orient3d(a: &ExactPoint, b: &ExactPoint, c: &ExactPoint, d: &ExactPoint) -> Ordering {
    let ab = b - a;
    let ac = c - a;
    let ad = d - a;
    sign(&ab.cross(&ac).dot(&ad))
}

/// Exact circumsphere test.
///
/// `Greater` when `e` is strictly inside the circumsphere of the tetrahedron
/// `a, b, c, d`, `Equal` when on it, `Less` when outside. Orientation of the
/// tetrahedron does not matter; a flat tetrahedron yields `Equal`.
#[must_use]
pub fn insphere(
    a: &ExactPoint,
    b: &ExactPoint,
    c: &ExactPoint,
    d: &ExactPoint,
    e: &ExactPoint,
) -> Ordering {
    let orientation = orient3d(a, b, c, d);
    if orientation == Ordering::Equal {
        return Ordering::Equal;
    }

    let rows: Vec<(ExactVec3, Scalar)> = [a, b, c, d]
        .into_iter()
        .map(|p| {
            let v = p - e;
            let lifted = v.length_squared();
            (v, lifted)
        })
        .collect();

    // Cofactor expansion along the lifted column.
    let mut det = Scalar::zero();
    for skip in 0..4 {
        let minor_rows: Vec<&ExactVec3> = rows
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != skip)
            .map(|(_, (v, _))| v)
            .collect();
        let minor = [
            [minor_rows[0].x.clone(), minor_rows[0].y.clone(), minor_rows[0].z.clone()],
            [minor_rows[1].x.clone(), minor_rows[1].y.clone(), minor_rows[1].z.clone()],
            [minor_rows[2].x.clone(), minor_rows[2].y.clone(), minor_rows[2].z.clone()],
        ];
        // Column 4, row `skip`: sign (-1)^(skip + 3).
        let term = &rows[skip].1 * det3(&minor);
        if skip % 2 == 0 {
            det -= term;
        } else {
            det += term;
        }
    }

    // A positively oriented tetrahedron gives a negative lifted determinant
    // for interior points.
    match orientation {
        Ordering::Greater => sign(&det).reverse(),
        _ => sign(&det),
    }
}

/// Intersection point of three planes' boundaries, `None` if they do not
/// meet in a single point.
#[must_use]
pub fn intersect_three_planes(p1: &ExactPlane, p2: &ExactPlane, p3: &ExactPlane) -> Option<ExactPoint> {
    let n23 = p2.normal.cross(&p3.normal);
    let det = p1.normal.dot(&n23);
    if det.is_zero() {
        return None;
    }
    let n31 = p3.normal.cross(&p1.normal);
    let n12 = p1.normal.cross(&p2.normal);
    let sum = &(&n23.scale(&p1.offset) + &n31.scale(&p2.offset)) + &n12.scale(&p3.offset);
    Some(sum.scale(&(Scalar::one() / det)))
}

/// Rationals travel through the cache as `"num/den"` strings.
pub mod scalar_serde {
    use std::str::FromStr;

    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    use super::Scalar;

    pub fn serialize<S: Serializer>(value: &Scalar, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Scalar, D::Error> {
        let text = String::deserialize(deserializer)?;
        Scalar::from_str(&text).map_err(|e| D::Error::custom(format!("{text:?}: {e}")))
    }
}
