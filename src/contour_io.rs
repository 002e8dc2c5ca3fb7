//! Reader for `.contour` files.
//!
//! Whitespace-separated tokens:
//!
//! ```text
//! <plane count>
//! per plane:
//!     a b c d
//!     <vertex count> <edge count>
//!     x y z                       × vertex count
//!     v0 v1 m_left m_right        × edge count
//!     [ #                         optional extended mesh
//!       <vertex count> <face count>
//!       x y z                     × vertex count
//!       v0 v1 v2 m0 m1            × face count
//!       <contour edge count>
//!       v0 v1                     × contour edge count ]
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use glam::DVec3;
use tracing::{debug, info};

use crate::error::ContourError;
use crate::plane_store::{ContourEdge, ContourPlane, ExtendedMesh, MeshFace, Plane, PlaneStore};

/// Token introducing an extended mesh block.
pub const EXTENDED_MESH_MARKER: &str = "#";

/// File extension of contour files.
pub const CONTOUR_EXTENSION: &str = "contour";

struct Tokens<'a> {
    inner: std::iter::Peekable<std::str::SplitWhitespace<'a>>,
}

impl<'a> Tokens<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            inner: text.split_whitespace().peekable(),
        }
    }

    fn next<T: FromStr>(&mut self, expected: &'static str) -> Result<T, ContourError> {
        let token = self.inner.next().ok_or(ContourError::UnexpectedEof(expected))?;
        token.parse().map_err(|_| ContourError::InvalidToken {
            token: token.to_string(),
            expected,
        })
    }

    fn next_vec3(&mut self, expected: &'static str) -> Result<DVec3, ContourError> {
        Ok(DVec3::new(self.next(expected)?, self.next(expected)?, self.next(expected)?))
    }

    fn next_index(&mut self, plane: usize, what: &'static str, len: usize) -> Result<usize, ContourError> {
        let index: usize = self.next(what)?;
        if index >= len {
            return Err(ContourError::IndexOutOfRange { plane, what, index, len });
        }
        Ok(index)
    }

    fn eat(&mut self, marker: &str) -> bool {
        self.inner.next_if_eq(&marker).is_some()
    }

    fn peek(&mut self) -> Option<&&'a str> {
        self.inner.peek()
    }
}

/// Parse contour text into a plane store identified by `source`.
pub fn parse_contours(text: &str, source: &str) -> Result<PlaneStore, ContourError> {
    let mut tokens = Tokens::new(text);
    let count: usize = tokens.next("plane count")?;
    let mut planes = Vec::with_capacity(count);

    for index in 0..count {
        let plane = Plane::new(
            tokens.next("plane coefficient")?,
            tokens.next("plane coefficient")?,
            tokens.next("plane coefficient")?,
            tokens.next("plane coefficient")?,
        );
        let vertex_count: usize = tokens.next("vertex count")?;
        let edge_count: usize = tokens.next("edge count")?;

        let vertices = (0..vertex_count)
            .map(|_| tokens.next_vec3("vertex coordinate"))
            .collect::<Result<Vec<_>, _>>()?;
        let edges = (0..edge_count)
            .map(|_| {
                let start = tokens.next_index(index, "edge vertex", vertex_count)?;
                let end = tokens.next_index(index, "edge vertex", vertex_count)?;
                Ok(ContourEdge::with_materials(
                    start,
                    end,
                    tokens.next("edge material")?,
                    tokens.next("edge material")?,
                ))
            })
            .collect::<Result<Vec<_>, ContourError>>()?;

        let mut contour = ContourPlane::new(plane, vertices, edges, source);
        if tokens.eat(EXTENDED_MESH_MARKER) {
            contour = contour.with_extended_mesh(parse_extended_mesh(&mut tokens, index)?);
        }
        planes.push(contour);
    }

    if let Some(extra) = tokens.peek() {
        debug!(source, token = *extra, "ignoring trailing tokens");
    }
    Ok(PlaneStore::new(planes, source))
}

fn parse_extended_mesh(tokens: &mut Tokens<'_>, plane: usize) -> Result<ExtendedMesh, ContourError> {
    let vertex_count: usize = tokens.next("mesh vertex count")?;
    let face_count: usize = tokens.next("mesh face count")?;
    let vertices = (0..vertex_count)
        .map(|_| tokens.next_vec3("mesh vertex coordinate"))
        .collect::<Result<Vec<_>, _>>()?;

    let mut faces = Vec::with_capacity(face_count);
    for _ in 0..face_count {
        let vertices = [
            tokens.next_index(plane, "mesh face vertex", vertex_count)?,
            tokens.next_index(plane, "mesh face vertex", vertex_count)?,
            tokens.next_index(plane, "mesh face vertex", vertex_count)?,
        ];
        let materials = [tokens.next("mesh face material")?, tokens.next("mesh face material")?];
        faces.push(MeshFace { vertices, materials });
    }

    let edge_count: usize = tokens.next("contour edge count")?;
    let contour_edges = (0..edge_count)
        .map(|_| {
            Ok([
                tokens.next_index(plane, "contour edge vertex", vertex_count)?,
                tokens.next_index(plane, "contour edge vertex", vertex_count)?,
            ])
        })
        .collect::<Result<Vec<_>, ContourError>>()?;

    Ok(ExtendedMesh {
        vertices,
        faces,
        contour_edges,
    })
}

/// Read a contour file; the file name becomes the store's source identifier.
pub fn load_contour_file(path: impl AsRef<Path>) -> Result<PlaneStore, ContourError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|source| ContourError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let source = path
        .file_name()
        .map_or_else(|| path.display().to_string(), |name| name.to_string_lossy().into_owned());
    let store = parse_contours(&text, &source)?;
    info!(path = %path.display(), planes = store.len(), "loaded contour file");
    Ok(store)
}

/// Names of the `*.contour` files in `dir`, sorted.
pub fn list_contour_files(dir: impl AsRef<Path>) -> Result<Vec<String>, ContourError> {
    let dir = dir.as_ref();
    let io_err = |source| ContourError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut names = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_err)? {
        let path: PathBuf = entry.map_err(io_err)?.path();
        if path.is_file()
            && path.extension().is_some_and(|ext| ext == CONTOUR_EXTENSION)
            && let Some(name) = path.file_name()
        {
            names.push(name.to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_PLANES: &str = "
        2
        0 0 1 0
        3 2
        0 0 0   1 0 0   0 1 0
        0 1 0 1
        1 2 1 0
        0 0 1 -10
        3 1
        0 0 10  1 0 10  0 1 10
        0 2 2 3
    ";

    #[test]
    fn test_parse_planes() {
        let store = parse_contours(TWO_PLANES, "two.contour").unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.source(), "two.contour");

        let first = &store.as_slice()[0];
        assert_eq!(first.plane, Plane::new(0.0, 0.0, 1.0, 0.0));
        assert_eq!(first.vertices.len(), 3);
        assert_eq!(first.edges[1], ContourEdge::with_materials(1, 2, 1, 0));
        assert!(first.extended.is_none());

        let second = &store.as_slice()[1];
        assert_eq!(second.plane.d, -10.0);
        assert_eq!(second.vertices[1], DVec3::new(1.0, 0.0, 10.0));
        assert_eq!(second.filename, "two.contour");
    }

    #[test]
    fn test_parse_extended_mesh() {
        let text = "
            1
            0 0 1 0
            3 1
            0 0 0  1 0 0  0 1 0
            0 1 0 1
            #
            4 2
            0 0 0  1 0 0  1 1 0  0 1 0
            0 1 2 0 1
            0 2 3 0 1
            1
            0 2
        ";
        let store = parse_contours(text, "mesh").unwrap();
        let mesh = store.as_slice()[0].extended.as_ref().unwrap();
        assert_eq!(mesh.vertices.len(), 4);
        assert_eq!(mesh.faces[1].vertices, [0, 2, 3]);
        assert_eq!(mesh.contour_edges, vec![[0, 2]]);
    }

    #[test]
    fn test_truncated_input() {
        let err = parse_contours("1 0 0 1 0 3 0 0 0 0", "bad").unwrap_err();
        assert!(matches!(err, ContourError::UnexpectedEof("vertex coordinate")));
    }

    #[test]
    fn test_invalid_token() {
        let err = parse_contours("1 0 0 one 0 0 0", "bad").unwrap_err();
        assert!(matches!(err, ContourError::InvalidToken { ref token, .. } if token == "one"));
    }

    #[test]
    fn test_edge_index_checked() {
        let err = parse_contours("1 0 0 1 0 2 1 0 0 0 1 0 0 0 5 0 0", "bad").unwrap_err();
        assert!(matches!(
            err,
            ContourError::IndexOutOfRange {
                plane: 0,
                index: 5,
                len: 2,
                ..
            }
        ));
    }

    #[test]
    fn test_missing_file_is_error() {
        assert!(matches!(
            load_contour_file("/definitely/not/here.contour"),
            Err(ContourError::Io { .. })
        ));
    }

    #[test]
    fn test_list_and_load_files() {
        let dir = std::env::temp_dir().join(format!("contour_cells_io_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("b.contour"), TWO_PLANES).unwrap();
        fs::write(dir.join("a.contour"), "0").unwrap();
        fs::write(dir.join("notes.txt"), "ignored").unwrap();

        let names = list_contour_files(&dir).unwrap();
        assert_eq!(names, vec!["a.contour".to_string(), "b.contour".to_string()]);

        let store = load_contour_file(dir.join("b.contour")).unwrap();
        assert_eq!(store.source(), "b.contour");
        assert_eq!(store.len(), 2);

        let empty = load_contour_file(dir.join("a.contour")).unwrap();
        assert!(empty.is_empty());

        fs::remove_dir_all(&dir).unwrap();
    }
}
