//! On-disk cell cache.
//!
//! ```text
//! <root>/<identifier>/
//!     manifest.json      schema version + cell count, written last
//!     0.cell.json        exact polytope of cell 0
//!     0.planes           "0 3 7": plane indices of cell 0
//!     1.cell.json
//!     ...
//! ```
//!
//! Loading is all-or-nothing: any unreadable record, a missing manifest or a
//! manifest from another schema version is a miss, logged and reported as
//! `None`. Records from an older schema are not migrated in place; the cell
//! set is recomputed and the directory rewritten at the current version.
//!
//! There is no invalidation. A hit is trusted even if the contour file behind
//! the identifier has changed since it was written.

use std::fs;
use std::path::{Path, PathBuf};

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::CacheError;
use crate::partition::ConvexCell;
use crate::plane_store::PlaneIdx;
use crate::polytope::ConvexPolytope;

/// Bumped whenever the record layout changes.
pub const CACHE_SCHEMA_VERSION: u32 = 1;

const MANIFEST: &str = "manifest.json";

#[derive(Debug, Serialize, Deserialize)]
struct Manifest {
    schema_version: u32,
    cell_count: usize,
}

/// Cell sets keyed by a source identifier.
#[derive(Clone, Debug)]
pub struct CellCache {
    root: PathBuf,
}

impl CellCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding one identifier's records.
    #[must_use]
    pub fn dir_for(&self, identifier: &str) -> PathBuf {
        self.root.join(sanitize(identifier))
    }

    /// Cached cells, or `None` on any kind of miss.
    #[must_use]
    pub fn load(&self, identifier: &str) -> Option<Vec<ConvexCell>> {
        match self.try_load(identifier) {
            Ok(cells) => {
                info!(identifier, cells = cells.len(), "cell cache hit");
                Some(cells)
            }
            Err(CacheError::MissingRecord(path)) if path.ends_with(MANIFEST) => {
                debug!(identifier, "cell cache empty");
                None
            }
            Err(err) => {
                warn!(identifier, %err, "cell cache miss");
                None
            }
        }
    }

    /// Like [`Self::load`], keeping the reason for a miss.
    pub fn try_load(&self, identifier: &str) -> Result<Vec<ConvexCell>, CacheError> {
        let dir = self.dir_for(identifier);
        let manifest: Manifest = read_json(&dir.join(MANIFEST))?;
        if manifest.schema_version != CACHE_SCHEMA_VERSION {
            return Err(CacheError::SchemaMismatch {
                found: manifest.schema_version,
                expected: CACHE_SCHEMA_VERSION,
            });
        }

        (0..manifest.cell_count)
            .map(|i| {
                let polytope: ConvexPolytope = read_json(&geometry_path(&dir, i))?;
                polytope
                    .validate()
                    .map_err(|e| CacheError::InvalidGeometry(format!("cell {i}: {e}")))?;
                let planes = read_plane_list(&planes_path(&dir, i))?;
                Ok(ConvexCell::new(polytope, planes))
            })
            .collect()
    }

    /// Write a cell set, replacing whatever was stored for the identifier.
    pub fn store(&self, identifier: &str, cells: &[ConvexCell]) -> Result<(), CacheError> {
        let dir = self.dir_for(identifier);
        fs::create_dir_all(&dir).map_err(|e| CacheError::io(&dir, e))?;

        // Readers must never pair a new manifest with old records.
        let manifest_path = dir.join(MANIFEST);
        if manifest_path.exists() {
            fs::remove_file(&manifest_path).map_err(|e| CacheError::io(&manifest_path, e))?;
        }

        for (i, cell) in cells.iter().enumerate() {
            write_json(&geometry_path(&dir, i), &cell.polytope)?;
            let list = cell.planes.iter().map(|p| p.0).join(" ");
            let path = planes_path(&dir, i);
            fs::write(&path, list).map_err(|e| CacheError::io(&path, e))?;
        }

        write_json(
            &manifest_path,
            &Manifest {
                schema_version: CACHE_SCHEMA_VERSION,
                cell_count: cells.len(),
            },
        )?;
        info!(identifier, cells = cells.len(), dir = %dir.display(), "cell cache written");
        Ok(())
    }

    /// Cached cells, or `compute()` followed by a cache write. The flag is
    /// `true` on a cache hit.
    ///
    /// A failed write is logged; the computed cells are returned regardless.
    pub fn load_or_compute(
        &self,
        identifier: &str,
        compute: impl FnOnce() -> Vec<ConvexCell>,
    ) -> (Vec<ConvexCell>, bool) {
        if let Some(cells) = self.load(identifier) {
            return (cells, true);
        }
        let cells = compute();
        if let Err(err) = self.store(identifier, &cells) {
            warn!(identifier, %err, "failed to write cell cache");
        }
        (cells, false)
    }
}

fn geometry_path(dir: &Path, index: usize) -> PathBuf {
    dir.join(format!("{index}.cell.json"))
}

fn planes_path(dir: &Path, index: usize) -> PathBuf {
    dir.join(format!("{index}.planes"))
}

/// One path component, no separators, never `.` or `..`.
fn sanitize(identifier: &str) -> String {
    let cleaned: String = identifier
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.chars().all(|c| c == '.') {
        format!("_{cleaned}")
    } else {
        cleaned
    }
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, CacheError> {
    let text = read_text(path)?;
    serde_json::from_str(&text).map_err(|e| CacheError::json(path, e))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), CacheError> {
    let text = serde_json::to_string_pretty(value).map_err(|e| CacheError::json(path, e))?;
    fs::write(path, text).map_err(|e| CacheError::io(path, e))
}

fn read_text(path: &Path) -> Result<String, CacheError> {
    fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => CacheError::MissingRecord(path.to_path_buf()),
        _ => CacheError::io(path, e),
    })
}

fn read_plane_list(path: &Path) -> Result<Vec<PlaneIdx>, CacheError> {
    read_text(path)?
        .split_whitespace()
        .map(|token| {
            token
                .parse::<usize>()
                .map(PlaneIdx)
                .map_err(|e| CacheError::InvalidPlaneList {
                    path: path.to_path_buf(),
                    reason: format!("{token:?}: {e}"),
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use glam::DVec3;

    use super::*;
    use crate::partition::SpacePartitioner;
    use crate::plane_store::{ContourPlane, Plane, PlaneStore};

    /// Scratch directory removed on drop.
    struct ScratchDir(PathBuf);

    impl ScratchDir {
        fn new(name: &str) -> Self {
            let path = std::env::temp_dir().join(format!("contour_cells_cache_{name}_{}", std::process::id()));
            let _ = fs::remove_dir_all(&path);
            Self(path)
        }
    }

    impl Drop for ScratchDir {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.0);
        }
    }

    fn slab_cells() -> Vec<ConvexCell> {
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
        partitioner.compute_cells();
        partitioner.into_cells()
    }

    #[test]
    fn test_round_trip() {
        let scratch = ScratchDir::new("round_trip");
        let cache = CellCache::new(&scratch.0);
        let cells = slab_cells();
        cache.store("slab.contour", &cells).unwrap();

        let loaded = cache.load("slab.contour").unwrap();
        assert_eq!(loaded.len(), cells.len());
        for (a, b) in cells.iter().zip(&loaded) {
            assert_eq!(a.planes, b.planes);
            assert!(a.polytope.same_geometry(&b.polytope));
        }
        assert_eq!(fs::read_to_string(cache.dir_for("slab.contour").join("1.planes")).unwrap(), "0 1");
    }

    #[test]
    fn test_missing_directory_is_miss() {
        let scratch = ScratchDir::new("missing");
        let cache = CellCache::new(&scratch.0);
        assert!(cache.load("nothing").is_none());
        assert!(matches!(cache.try_load("nothing"), Err(CacheError::MissingRecord(_))));
    }

    #[test]
    fn test_corrupt_record_is_full_miss() {
        let scratch = ScratchDir::new("corrupt");
        let cache = CellCache::new(&scratch.0);
        cache.store("slab", &slab_cells()).unwrap();
        fs::write(cache.dir_for("slab").join("1.cell.json"), "{ not json").unwrap();
        assert!(cache.load("slab").is_none());

        cache.store("slab", &slab_cells()).unwrap();
        fs::write(cache.dir_for("slab").join("0.planes"), "0 x").unwrap();
        assert!(matches!(cache.try_load("slab"), Err(CacheError::InvalidPlaneList { .. })));
    }

    #[test]
    fn test_schema_mismatch_is_miss() {
        let scratch = ScratchDir::new("schema");
        let cache = CellCache::new(&scratch.0);
        cache.store("slab", &slab_cells()).unwrap();
        fs::write(
            cache.dir_for("slab").join(MANIFEST),
            r#"{"schema_version":0,"cell_count":3}"#,
        )
        .unwrap();
        assert!(matches!(
            cache.try_load("slab"),
            Err(CacheError::SchemaMismatch { found: 0, expected: CACHE_SCHEMA_VERSION })
        ));
    }

    #[test]
    fn test_load_or_compute_writes_once() {
        let scratch = ScratchDir::new("compute");
        let cache = CellCache::new(&scratch.0);
        let calls = Cell::new(0);
        let compute = || {
            calls.set(calls.get() + 1);
            slab_cells()
        };
        let (first, first_hit) = cache.load_or_compute("slab", compute);
        let (second, second_hit) = cache.load_or_compute("slab", compute);
        assert_eq!(calls.get(), 1);
        assert!(!first_hit);
        assert!(second_hit);
        assert_eq!(first.len(), second.len());
    }

    #[test]
    fn test_store_overwrites() {
        let scratch = ScratchDir::new("overwrite");
        let cache = CellCache::new(&scratch.0);
        cache.store("slab", &slab_cells()).unwrap();
        cache.store("slab", &slab_cells()[..1]).unwrap();
        assert_eq!(cache.load("slab").unwrap().len(), 1);
    }

    #[test]
    fn test_identifier_is_one_path_component() {
        let cache = CellCache::new("/cache");
        assert_eq!(cache.dir_for("data/a b.contour"), PathBuf::from("/cache/data_a_b.contour"));
        assert_eq!(cache.dir_for(".."), PathBuf::from("/cache/_.."));
    }
}
