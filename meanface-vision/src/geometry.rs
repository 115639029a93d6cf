use serde::{Deserialize, Serialize};

/// Determinants below this are treated as singular.
pub const SINGULAR_EPS: f64 = 1e-9;

/// A real-valued 2D coordinate in pixel units.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Clamp into `[0, w - 1] x [0, h - 1]`.
    pub fn clamp(self, width: u32, height: u32) -> Self {
        let max_x = width.saturating_sub(1) as f64;
        let max_y = height.saturating_sub(1) as f64;
        Self {
            x: self.x.max(0.0).min(max_x),
            y: self.y.max(0.0).min(max_y),
        }
    }

    pub fn distance(&self, other: &Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// 2x3 affine transform: `[x', y'] = [[a, b], [d, e]] * [x, y] + [c, f]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Affine {
    pub m: [[f64; 3]; 2],
}

impl Affine {
    pub const IDENTITY: Affine = Affine {
        m: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
    };

    pub fn new(m: [[f64; 3]; 2]) -> Self {
        Self { m }
    }

    #[inline]
    pub fn apply(&self, p: Point) -> Point {
        let [[a, b, c], [d, e, f]] = self.m;
        Point {
            x: a * p.x + b * p.y + c,
            y: d * p.x + e * p.y + f,
        }
    }

    /// Determinant of the linear part.
    pub fn determinant(&self) -> f64 {
        self.m[0][0] * self.m[1][1] - self.m[0][1] * self.m[1][0]
    }

    pub fn invert(&self) -> Option<Affine> {
        let det = self.determinant();
        if !det.is_finite() || det.abs() < SINGULAR_EPS {
            return None;
        }
        let [[a, b, c], [d, e, f]] = self.m;
        let ia = e / det;
        let ib = -b / det;
        let id = -d / det;
        let ie = a / det;
        Some(Affine {
            m: [
                [ia, ib, -(ia * c + ib * f)],
                [id, ie, -(id * c + ie * f)],
            ],
        })
    }

    /// Exact affine map taking each `src[i]` onto `dst[i]`.
    ///
    /// Returns `None` when the source triangle is collinear (the 3x3 system is singular)
    /// or when the destination triangle has no area.
    pub fn from_triangles(src: &[Point; 3], dst: &[Point; 3]) -> Option<Affine> {
        if triangle_area(dst).abs() < SINGULAR_EPS {
            return None;
        }

        let [p0, p1, p2] = *src;
        // Rows are [x, y, 1]; invert via the adjugate.
        let det = p0.x * (p1.y - p2.y) - p0.y * (p1.x - p2.x) + (p1.x * p2.y - p2.x * p1.y);
        if !det.is_finite() || det.abs() < SINGULAR_EPS {
            return None;
        }

        let inv = [
            [p1.y - p2.y, p2.y - p0.y, p0.y - p1.y],
            [p2.x - p1.x, p0.x - p2.x, p1.x - p0.x],
            [
                p1.x * p2.y - p2.x * p1.y,
                p2.x * p0.y - p0.x * p2.y,
                p0.x * p1.y - p1.x * p0.y,
            ],
        ];

        let solve = |u: [f64; 3]| -> [f64; 3] {
            let mut out = [0.0; 3];
            for (row, coeff) in inv.iter().zip(out.iter_mut()) {
                *coeff = (row[0] * u[0] + row[1] * u[1] + row[2] * u[2]) / det;
            }
            out
        };

        Some(Affine {
            m: [
                solve([dst[0].x, dst[1].x, dst[2].x]),
                solve([dst[0].y, dst[1].y, dst[2].y]),
            ],
        })
    }

    /// True when the linear part is a rotation times a uniform scale (no shear, no reflection).
    pub fn is_similarity(&self, tol: f64) -> bool {
        let [[a, b, _], [d, e, _]] = self.m;
        let scale = (a * a + d * d).sqrt().max(f64::MIN_POSITIVE);
        ((a - e) / scale).abs() < tol && ((b + d) / scale).abs() < tol
    }

    /// Uniform scale factor of a similarity transform.
    pub fn scale(&self) -> f64 {
        self.determinant().abs().sqrt()
    }
}

/// Signed area of a triangle; positive when the vertices run counter-clockwise in a
/// y-up frame (clockwise on screen).
pub fn triangle_area(t: &[Point; 3]) -> f64 {
    0.5 * ((t[1].x - t[0].x) * (t[2].y - t[0].y) - (t[2].x - t[0].x) * (t[1].y - t[0].y))
}

/// Integer pixel rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
}

impl Rect {
    /// Smallest pixel rectangle covering every point: `floor(min)` to `floor(max)` inclusive.
    pub fn bounding(points: &[Point]) -> Rect {
        let mut min_x = f64::INFINITY;
        let mut min_y = f64::INFINITY;
        let mut max_x = f64::NEG_INFINITY;
        let mut max_y = f64::NEG_INFINITY;
        for p in points {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        if points.is_empty() {
            return Rect {
                x: 0,
                y: 0,
                width: 0,
                height: 0,
            };
        }
        let x = min_x.floor() as i64;
        let y = min_y.floor() as i64;
        Rect {
            x,
            y,
            width: max_x.floor() as i64 - x + 1,
            height: max_y.floor() as i64 - y + 1,
        }
    }

    /// Inclusive containment test against the real-valued rectangle `(x, y)`-`(x + w, y + h)`.
    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x as f64
            && p.y >= self.y as f64
            && p.x <= (self.x + self.width) as f64
            && p.y <= (self.y + self.height) as f64
    }
}
