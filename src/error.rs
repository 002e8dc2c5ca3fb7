//! Error taxonomy.
//!
//! Three families, matching how each failure is treated by the pipeline:
//!
//! - [`ContourError`]: contour input could not be read. Always fatal for the
//!   caller that asked for the contours.
//! - [`CacheError`]: a cache record could not be read or written. Reads turn
//!   into a logged cache miss; writes are reported and the computed result is
//!   kept.
//! - [`GeometryError`]: a degenerate configuration inside the exact kernel.
//!   Caught at the smallest scope (one branch, one clip) and logged.

use std::path::PathBuf;

use thiserror::Error;

use crate::plane_store::PlaneIdx;

/// Result alias for geometry operations.
pub type GeometryResult<T> = std::result::Result<T, GeometryError>;

/// Degenerate geometry encountered by the exact kernel.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeometryError {
    /// Plane with an all-zero normal; it does not split space.
    #[error("plane {0:?} has a zero normal")]
    DegeneratePlane(Option<PlaneIdx>),

    /// NaN or infinite value crossing into the exact kernel.
    #[error("non-finite coordinate {0} cannot enter the exact kernel")]
    NonFinite(f64),

    /// Edge/plane intersection with a vanishing denominator.
    #[error("singular intersection between edge {edge:?} and plane {plane:?}")]
    SingularIntersection {
        edge: (usize, usize),
        plane: Option<PlaneIdx>,
    },

    /// No vertex data to derive a bounding volume from.
    #[error("cannot derive a bounding volume: {0}")]
    EmptyBounds(&'static str),
}

/// Failure while reading contour input.
#[derive(Error, Debug)]
pub enum ContourError {
    #[error("failed to read contour file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unexpected end of input while reading {0}")]
    UnexpectedEof(&'static str),

    #[error("invalid token {token:?} while reading {expected}")]
    InvalidToken {
        token: String,
        expected: &'static str,
    },

    #[error("plane {plane}: {what} index {index} out of range (len {len})")]
    IndexOutOfRange {
        plane: usize,
        what: &'static str,
        index: usize,
        len: usize,
    },

    #[error(transparent)]
    Geometry(#[from] GeometryError),
}

/// Failure while reading or writing the cell cache.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("cache I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed cache record {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("cache schema version {found} does not match {expected}")]
    SchemaMismatch { found: u32, expected: u32 },

    #[error("cache record {0} is missing")]
    MissingRecord(PathBuf),

    #[error("plane index list {path} is invalid: {reason}")]
    InvalidPlaneList { path: PathBuf, reason: String },

    #[error("cache record holds invalid geometry: {0}")]
    InvalidGeometry(String),
}

impl CacheError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Json {
            path: path.into(),
            source,
        }
    }
}
