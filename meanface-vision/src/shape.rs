//! Landmark conventions, canvas boundary points and mean-shape accumulation.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::geometry::{Affine, Point};

/// Points produced per face by the 68-point landmark model.
pub const LANDMARK_COUNT: usize = 68;
/// Outer corner of the left eye (subject's right) in the 68-point layout.
pub const LEFT_EYE_OUTER: usize = 36;
/// Outer corner of the right eye (subject's left) in the 68-point layout.
pub const RIGHT_EYE_OUTER: usize = 45;
pub const BOUNDARY_COUNT: usize = 8;
pub const AUGMENTED_COUNT: usize = LANDMARK_COUNT + BOUNDARY_COUNT;

/// Output canvas dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanvasSize {
    pub width: u32,
    pub height: u32,
}

impl CanvasSize {
    pub const DEFAULT: CanvasSize = CanvasSize {
        width: 170,
        height: 240,
    };

    pub fn new(width: u32, height: u32) -> Result<Self> {
        // Anything smaller cannot hold distinct corner and midpoint boundary points.
        if width < 3 || height < 3 {
            return Err(Error::InvalidCanvas { width, height });
        }
        Ok(Self { width, height })
    }
}

impl Default for CanvasSize {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// The 68 landmarks of one face, index-significant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Point>", into = "Vec<Point>")]
pub struct LandmarkSet {
    points: Vec<Point>,
}

impl LandmarkSet {
    pub fn new(points: Vec<Point>) -> Result<Self> {
        if points.len() != LANDMARK_COUNT {
            return Err(Error::LandmarkCount {
                expected: LANDMARK_COUNT,
                found: points.len(),
            });
        }
        Ok(Self { points })
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn eye_corners(&self) -> [Point; 2] {
        [self.points[LEFT_EYE_OUTER], self.points[RIGHT_EYE_OUTER]]
    }

    pub fn transform(&self, t: &Affine) -> LandmarkSet {
        LandmarkSet {
            points: self.points.iter().map(|p| t.apply(*p)).collect(),
        }
    }
}

impl TryFrom<Vec<Point>> for LandmarkSet {
    type Error = Error;

    fn try_from(points: Vec<Point>) -> Result<Self> {
        Self::new(points)
    }
}

impl From<LandmarkSet> for Vec<Point> {
    fn from(set: LandmarkSet) -> Self {
        set.points
    }
}

/// Fixed ring of canvas-edge points: corners and edge midpoints, clockwise from the origin.
pub fn boundary_points(canvas: CanvasSize) -> [Point; BOUNDARY_COUNT] {
    let w = canvas.width as f64;
    let h = canvas.height as f64;
    [
        Point::new(0.0, 0.0),
        Point::new(w / 2.0, 0.0),
        Point::new(w - 1.0, 0.0),
        Point::new(w - 1.0, h / 2.0),
        Point::new(w - 1.0, h - 1.0),
        Point::new(w / 2.0, h - 1.0),
        Point::new(0.0, h - 1.0),
        Point::new(0.0, h / 2.0),
    ]
}

/// Landmarks followed by the canvas boundary ring; always `AUGMENTED_COUNT` points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Point>", into = "Vec<Point>")]
pub struct Shape {
    points: Vec<Point>,
}

impl Shape {
    /// Append the boundary ring to an already-normalized landmark set.
    pub fn augment(landmarks: &LandmarkSet, canvas: CanvasSize) -> Shape {
        let mut points = Vec::with_capacity(AUGMENTED_COUNT);
        points.extend_from_slice(landmarks.points());
        points.extend_from_slice(&boundary_points(canvas));
        Shape { points }
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn landmarks(&self) -> &[Point] {
        &self.points[..LANDMARK_COUNT]
    }

    pub fn boundary(&self) -> &[Point] {
        &self.points[LANDMARK_COUNT..]
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

impl TryFrom<Vec<Point>> for Shape {
    type Error = Error;

    fn try_from(points: Vec<Point>) -> Result<Self> {
        if points.len() != AUGMENTED_COUNT {
            return Err(Error::LandmarkCount {
                expected: AUGMENTED_COUNT,
                found: points.len(),
            });
        }
        Ok(Shape { points })
    }
}

impl From<Shape> for Vec<Point> {
    fn from(shape: Shape) -> Self {
        shape.points
    }
}

impl std::ops::Index<usize> for Shape {
    type Output = Point;

    fn index(&self, i: usize) -> &Point {
        &self.points[i]
    }
}

/// Running per-index mean over a known number of shapes.
///
/// Each landmark contribution is pre-scaled by `1 / n`, so partial sums stay in coordinate
/// range no matter how many shapes are folded in. The boundary ring is identical in every
/// shape and is appended verbatim rather than averaged, keeping it pixel-exact.
#[derive(Debug, Clone)]
pub struct MeanShapeBuilder {
    sum: Vec<Point>,
    canvas: CanvasSize,
    weight: f64,
    expected: usize,
    added: usize,
}

impl MeanShapeBuilder {
    pub fn new(n: usize, canvas: CanvasSize) -> Self {
        Self {
            sum: vec![Point::default(); LANDMARK_COUNT],
            canvas,
            weight: if n == 0 { 0.0 } else { 1.0 / n as f64 },
            expected: n,
            added: 0,
        }
    }

    pub fn add(&mut self, shape: &Shape) {
        debug_assert_eq!(shape.len(), AUGMENTED_COUNT);
        for (acc, p) in self.sum.iter_mut().zip(shape.landmarks()) {
            acc.x += p.x * self.weight;
            acc.y += p.y * self.weight;
        }
        self.added += 1;
    }

    pub fn finish(self) -> Result<Shape> {
        if self.expected == 0 {
            return Err(Error::Empty);
        }
        if self.added != self.expected {
            return Err(Error::MissingCorrespondence {
                images: self.expected,
                landmarks: self.added,
            });
        }
        let mut points = self.sum;
        points.extend_from_slice(&boundary_points(self.canvas));
        Ok(Shape { points })
    }
}

/// Mean of a batch of augmented shapes laid out on `canvas`.
pub fn mean_shape(shapes: &[Shape], canvas: CanvasSize) -> Result<Shape> {
    let mut builder = MeanShapeBuilder::new(shapes.len(), canvas);
    for shape in shapes {
        builder.add(shape);
    }
    builder.finish()
}
