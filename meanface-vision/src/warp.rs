//! Piecewise affine warping of a normalized face onto the mean shape.

use log::{debug, warn};

use crate::error::{Error, Result};
use crate::geometry::{triangle_area, Affine, Point, Rect, SINGULAR_EPS};
use crate::raster::Canvas;
use crate::shape::Shape;
use crate::triangulate::Triangle;

/// One directed triangle edge.
///
/// The edge function is always evaluated from the lexicographically smaller endpoint and
/// then sign-corrected, so two triangles sharing an edge get exactly opposite values for
/// every pixel.
#[derive(Debug, Clone, Copy)]
struct Edge {
    lo: Point,
    hi: Point,
    sign: f64,
    dx: f64,
    dy: f64,
}

impl Edge {
    fn new(a: Point, b: Point) -> Self {
        let forward = (a.x, a.y) <= (b.x, b.y);
        let (lo, hi) = if forward { (a, b) } else { (b, a) };
        Self {
            lo,
            hi,
            sign: if forward { 1.0 } else { -1.0 },
            dx: b.x - a.x,
            dy: b.y - a.y,
        }
    }

    #[inline]
    fn eval(&self, p: Point) -> f64 {
        let ex = self.hi.x - self.lo.x;
        let ey = self.hi.y - self.lo.y;
        self.sign * (ex * (p.y - self.lo.y) - ey * (p.x - self.lo.x))
    }

    /// Whether a pixel lying exactly on this edge is taken when the sample point is nudged
    /// by `(sx, sy * eps)`.
    #[inline]
    fn owns(&self, sx: f64, sy: f64) -> bool {
        if self.dy != 0.0 {
            -self.dy * sx > 0.0
        } else {
            self.dx * sy > 0.0
        }
    }
}

/// Binary coverage of a triangle over integer pixel positions.
///
/// Pixels on an edge or vertex are resolved by nudging the sample point towards the canvas
/// interior, which gives every pixel of a gap-free triangulation exactly one owner.
#[derive(Debug, Clone, Copy)]
pub struct Coverage {
    edges: [Edge; 3],
    width: u32,
    height: u32,
}

impl Coverage {
    /// `None` for zero-area triangles.
    pub fn new(tri: &[Point; 3], width: u32, height: u32) -> Option<Self> {
        let area = triangle_area(tri);
        if area.abs() < SINGULAR_EPS {
            return None;
        }
        let [a, mut b, mut c] = *tri;
        if area < 0.0 {
            std::mem::swap(&mut b, &mut c);
        }
        Some(Self {
            edges: [Edge::new(a, b), Edge::new(b, c), Edge::new(c, a)],
            width,
            height,
        })
    }

    #[inline]
    pub fn covers(&self, x: i64, y: i64) -> bool {
        let sx = if x >= self.width as i64 - 1 { -1.0 } else { 1.0 };
        let sy = if y >= self.height as i64 - 1 { -1.0 } else { 1.0 };
        let p = Point::new(x as f64, y as f64);
        self.edges.iter().all(|e| {
            let v = e.eval(p);
            v > 0.0 || (v == 0.0 && e.owns(sx, sy))
        })
    }
}

/// Warp the triangle `src_tri` of `src` onto `dst_tri` of `dst`.
///
/// Both triangles must already lie inside their canvases. The source patch is the
/// bounding rectangle of `src_tri`; samples falling outside it are reflected back in.
/// Only pixels covered by `dst_tri` are written.
pub fn warp_triangle(
    src: &Canvas,
    dst: &mut Canvas,
    src_tri: &[Point; 3],
    dst_tri: &[Point; 3],
) -> Result<()> {
    if triangle_area(src_tri).abs() < SINGULAR_EPS {
        return Err(Error::OutOfBoundsSample {
            side: "source",
            vertices: *src_tri,
        });
    }
    let coverage = Coverage::new(dst_tri, dst.width(), dst.height()).ok_or(
        Error::OutOfBoundsSample {
            side: "destination",
            vertices: *dst_tri,
        },
    )?;

    let r1 = Rect::bounding(src_tri);
    let r2 = Rect::bounding(dst_tri);
    let local =
        |t: &[Point; 3], r: Rect| t.map(|p| Point::new(p.x - r.x as f64, p.y - r.y as f64));

    // Maps destination-patch coordinates back into the source patch.
    let inverse = Affine::from_triangles(&local(dst_tri, r2), &local(src_tri, r1)).ok_or(
        Error::OutOfBoundsSample {
            side: "destination",
            vertices: *dst_tri,
        },
    )?;

    let x_end = (r2.x + r2.width).min(dst.width() as i64);
    let y_end = (r2.y + r2.height).min(dst.height() as i64);
    for y in r2.y.max(0)..y_end {
        for x in r2.x.max(0)..x_end {
            if !coverage.covers(x, y) {
                continue;
            }
            let s = inverse.apply(Point::new((x - r2.x) as f64, (y - r2.y) as f64));
            let rgb = src.sample_bilinear(r1, s.x, s.y);
            dst.put_pixel(x as usize, y as usize, rgb);
        }
    }
    Ok(())
}

/// Warp a whole normalized face from `shape` onto `mean`, one triangle at a time.
///
/// Vertices outside the canvas are clamped to its edge. Triangles that collapse to zero
/// area are logged and left unwritten.
pub fn warp_face(image: &Canvas, shape: &Shape, mean: &Shape, triangles: &[Triangle]) -> Canvas {
    let (w, h) = (image.width(), image.height());
    let mut out = Canvas::new(w, h);
    let mut skipped = 0usize;

    for t in triangles {
        let src_tri = t.vertices(shape).map(|p| p.clamp(w, h));
        let dst_tri = t.vertices(mean).map(|p| p.clamp(w, h));
        if let Err(e) = warp_triangle(image, &mut out, &src_tri, &dst_tri) {
            warn!("skipping triangle {:?}: {}", t.0, e);
            skipped += 1;
        }
    }

    if skipped > 0 {
        debug!("{} of {} triangles skipped", skipped, triangles.len());
    }
    out
}
