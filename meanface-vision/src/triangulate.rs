use log::{debug, warn};
use serde::{Deserialize, Serialize};
use spade::{DelaunayTriangulation, Point2, Triangulation};

use crate::error::{Error, Result};
use crate::geometry::{Point, Rect};
use crate::shape::{CanvasSize, Shape};

/// Maximum per-axis distance for a triangulation vertex to be matched to an input point.
pub const VERTEX_TOLERANCE: f64 = 1.0;

/// Vertex indices into the shared augmented-shape ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Triangle(pub [usize; 3]);

impl Triangle {
    pub fn vertices(&self, shape: &Shape) -> [Point; 3] {
        let [i, j, k] = self.0;
        [shape[i], shape[j], shape[k]]
    }
}

/// First input point within `VERTEX_TOLERANCE` of `p` on both axes.
pub fn lookup_vertex(points: &[Point], p: Point) -> Option<usize> {
    points.iter().position(|q| lookup_matches(*q, p))
}

/// Delaunay triangulation of `shape`, returned as index triples.
///
/// Indices come from the triangulation's own vertex handles. Every vertex is still checked
/// against the input coordinates, falling back to a tolerance lookup, so points merged by
/// the triangulation (exact duplicates) resolve to the first index at that position.
/// Triangles that do not resolve to three distinct indices, or that leave the canvas,
/// are dropped.
pub fn triangulate(shape: &Shape, canvas: CanvasSize) -> Result<Vec<Triangle>> {
    let points = shape.points();
    let mut delaunay: DelaunayTriangulation<Point2<f64>> = DelaunayTriangulation::new();

    // Handle index -> first input index inserted at that vertex.
    let mut owner: Vec<Option<usize>> = Vec::with_capacity(points.len());
    for (i, p) in points.iter().enumerate() {
        let handle = delaunay
            .insert(Point2::new(p.x, p.y))
            .map_err(|e| {
                Error::Triangulation(format!("point #{i} ({:.2}, {:.2}): {e:?}", p.x, p.y))
            })?;
        let slot = handle.index();
        if slot >= owner.len() {
            owner.resize(slot + 1, None);
        }
        if owner[slot].is_none() {
            owner[slot] = Some(i);
        } else {
            debug!("point #{i} coincides with an earlier vertex, merged");
        }
    }

    let bounds = Rect {
        x: 0,
        y: 0,
        width: canvas.width as i64,
        height: canvas.height as i64,
    };

    let mut triangles = Vec::with_capacity(delaunay.num_inner_faces());
    for face in delaunay.inner_faces() {
        let vertices = face.vertices();
        let positions = vertices.map(|v| {
            let p = v.position();
            Point::new(p.x, p.y)
        });

        if !positions.iter().all(|p| bounds.contains(*p)) {
            debug!("dropping triangle outside canvas: {:?}", positions);
            continue;
        }

        let mut resolved = [None; 3];
        for (slot, (v, p)) in resolved.iter_mut().zip(vertices.iter().zip(positions)) {
            *slot = owner
                .get(v.fix().index())
                .copied()
                .flatten()
                .filter(|&i| lookup_matches(points[i], p))
                .or_else(|| lookup_vertex(points, p));
        }

        match resolve(resolved) {
            Ok(t) => triangles.push(t),
            Err(e) => warn!("{}", e),
        }
    }

    debug!(
        "triangulated {} points into {} triangles",
        points.len(),
        triangles.len()
    );
    Ok(triangles)
}

fn lookup_matches(q: Point, p: Point) -> bool {
    (q.x - p.x).abs() < VERTEX_TOLERANCE && (q.y - p.y).abs() < VERTEX_TOLERANCE
}

fn resolve(vertices: [Option<usize>; 3]) -> Result<Triangle> {
    match vertices {
        [Some(i), Some(j), Some(k)] if i != j && j != k && i != k => Ok(Triangle([i, j, k])),
        _ => Err(Error::TriangulationAmbiguity { vertices }),
    }
}
