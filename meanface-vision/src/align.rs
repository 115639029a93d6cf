use log::debug;

use crate::error::{Error, Result};
use crate::geometry::{Affine, Point};
use crate::raster::Canvas;
use crate::shape::{CanvasSize, LandmarkSet, Shape};

/// Eye-corner pairs closer than this (in pixels) cannot define a transform.
const MIN_EYE_DISTANCE: f64 = 1e-6;

/// Third vertex of the equilateral triangle built on `p0`, `p1`: `p0` rotated by 60°
/// about `p1`.
pub fn synthesize_third(p0: Point, p1: Point) -> Point {
    let (s60, c60) = 60f64.to_radians().sin_cos();
    let dx = p0.x - p1.x;
    let dy = p0.y - p1.y;
    Point {
        x: c60 * dx - s60 * dy + p1.x,
        y: s60 * dx + c60 * dy + p1.y,
    }
}

/// Best-fit similarity (rotation, uniform scale, translation) taking `src[0] -> dst[0]`
/// and `src[1] -> dst[1]`.
///
/// A third correspondence is synthesized on each side, then the 4-DOF partial affine is
/// solved in closed form by least squares. Because both synthesized triangles are
/// equilateral the fit is exact for the two given pairs.
pub fn similarity_transform(src: [Point; 2], dst: [Point; 2]) -> Result<Affine> {
    check_pair(&src, "source")?;
    check_pair(&dst, "destination")?;

    let src = [src[0], src[1], synthesize_third(src[0], src[1])];
    let dst = [dst[0], dst[1], synthesize_third(dst[0], dst[1])];
    estimate_partial_affine(&src, &dst)
}

fn check_pair(pair: &[Point; 2], side: &str) -> Result<()> {
    if !pair[0].is_finite() || !pair[1].is_finite() {
        return Err(Error::DegenerateAlignment(format!(
            "{side} eye corners are not finite: {:?}",
            pair
        )));
    }
    if pair[0].distance(&pair[1]) < MIN_EYE_DISTANCE {
        return Err(Error::DegenerateAlignment(format!(
            "{side} eye corners coincide at ({:.2}, {:.2})",
            pair[0].x, pair[0].y
        )));
    }
    Ok(())
}

/// Least-squares `[[a, -b, tx], [b, a, ty]]` over point correspondences.
fn estimate_partial_affine(src: &[Point], dst: &[Point]) -> Result<Affine> {
    let n = src.len() as f64;
    let centroid = |pts: &[Point]| {
        let (sx, sy) = pts.iter().fold((0.0, 0.0), |(x, y), p| (x + p.x, y + p.y));
        Point::new(sx / n, sy / n)
    };
    let cs = centroid(src);
    let cd = centroid(dst);

    let mut norm = 0.0;
    let mut dot = 0.0;
    let mut cross = 0.0;
    for (p, q) in src.iter().zip(dst) {
        let (px, py) = (p.x - cs.x, p.y - cs.y);
        let (qx, qy) = (q.x - cd.x, q.y - cd.y);
        norm += px * px + py * py;
        dot += px * qx + py * qy;
        cross += px * qy - py * qx;
    }
    if norm < MIN_EYE_DISTANCE * MIN_EYE_DISTANCE {
        return Err(Error::DegenerateAlignment(
            "source points are collinear or coincident".to_string(),
        ));
    }

    let a = dot / norm;
    let b = cross / norm;
    let tx = cd.x - (a * cs.x - b * cs.y);
    let ty = cd.y - (b * cs.x + a * cs.y);
    let t = Affine::new([[a, -b, tx], [b, a, ty]]);

    if t.m.iter().flatten().any(|v| !v.is_finite()) || t.scale() < MIN_EYE_DISTANCE {
        return Err(Error::DegenerateAlignment(format!(
            "estimated transform is singular: {:?}",
            t.m
        )));
    }
    Ok(t)
}

/// Target canvas positions for the two outer eye corners.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EyeAnchors {
    pub left: Point,
    pub right: Point,
}

impl EyeAnchors {
    /// Anchors at fractions of the canvas, snapped to whole pixels.
    pub fn from_fractions(canvas: CanvasSize, left: [f64; 2], right: [f64; 2]) -> Self {
        let w = canvas.width as f64;
        let h = canvas.height as f64;
        Self {
            left: Point::new((left[0] * w).floor(), (left[1] * h).floor()),
            right: Point::new((right[0] * w).floor(), (right[1] * h).floor()),
        }
    }

    pub fn for_canvas(canvas: CanvasSize) -> Self {
        Self::from_fractions(canvas, [0.3, 1.0 / 3.0], [0.7, 1.0 / 3.0])
    }

    pub fn points(&self) -> [Point; 2] {
        [self.left, self.right]
    }
}

/// One face mapped into the canonical frame.
#[derive(Debug, Clone)]
pub struct NormalizedFace {
    pub image: Canvas,
    pub landmarks: LandmarkSet,
    pub shape: Shape,
    pub transform: Affine,
}

/// Map a face's pixels and landmarks into the canonical canvas using the eye-corner
/// similarity transform.
pub fn normalize(
    image: &Canvas,
    landmarks: &LandmarkSet,
    canvas: CanvasSize,
    anchors: &EyeAnchors,
) -> Result<NormalizedFace> {
    if image.width() == 0 || image.height() == 0 {
        return Err(Error::InvalidCanvas {
            width: image.width(),
            height: image.height(),
        });
    }

    let transform = similarity_transform(landmarks.eye_corners(), anchors.points())?;
    let inverse = transform.invert().ok_or_else(|| {
        Error::DegenerateAlignment(format!("transform {:?} is not invertible", transform.m))
    })?;
    debug!(
        "similarity transform scale={:.4} m={:?}",
        transform.scale(),
        transform.m
    );

    let source = image.full_rect();
    let mut out = Canvas::new(canvas.width, canvas.height);
    for y in 0..canvas.height as usize {
        for x in 0..canvas.width as usize {
            let src = inverse.apply(Point::new(x as f64, y as f64));
            out.put_pixel(x, y, image.sample_bilinear(source, src.x, src.y));
        }
    }

    let landmarks = landmarks.transform(&transform);
    let shape = Shape::augment(&landmarks, canvas);
    Ok(NormalizedFace {
        image: out,
        landmarks,
        shape,
        transform,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::{LANDMARK_COUNT, LEFT_EYE_OUTER, RIGHT_EYE_OUTER};
    use proptest::prelude::*;

    fn assert_maps(t: &Affine, from: Point, to: Point) {
        let got = t.apply(from);
        assert!(
            got.distance(&to) < 1e-4,
            "expected {:?} -> {:?}, got {:?}",
            from,
            to,
            got
        );
    }

    #[test]
    fn test_synthesized_point_is_equilateral() {
        let p0 = Point::new(10.0, 20.0);
        let p1 = Point::new(40.0, 25.0);
        let p2 = synthesize_third(p0, p1);
        let side = p0.distance(&p1);
        assert!((p2.distance(&p0) - side).abs() < 1e-9);
        assert!((p2.distance(&p1) - side).abs() < 1e-9);
    }

    #[test]
    fn test_identity_when_points_match() {
        let pts = [Point::new(51.0, 80.0), Point::new(119.0, 80.0)];
        let t = similarity_transform(pts, pts).unwrap();
        for (got, want) in t.m.iter().flatten().zip(Affine::IDENTITY.m.iter().flatten()) {
            assert!((got - want).abs() < 1e-9);
        }
    }

    #[test]
    fn test_rotated_and_scaled_eyes() {
        let src = [Point::new(100.0, 200.0), Point::new(180.0, 260.0)];
        let dst = [Point::new(51.0, 80.0), Point::new(119.0, 80.0)];
        let t = similarity_transform(src, dst).unwrap();
        assert_maps(&t, src[0], dst[0]);
        assert_maps(&t, src[1], dst[1]);
        assert!(t.is_similarity(1e-9));
        assert!((t.scale() - 68.0 / 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_coincident_eyes_rejected() {
        let p = Point::new(5.0, 5.0);
        let dst = [Point::new(51.0, 80.0), Point::new(119.0, 80.0)];
        let err = similarity_transform([p, p], dst).unwrap_err();
        assert!(matches!(err, Error::DegenerateAlignment(_)));
        let err = similarity_transform(dst, [p, p]).unwrap_err();
        assert!(matches!(err, Error::DegenerateAlignment(_)));
    }

    #[test]
    fn test_non_finite_eyes_rejected() {
        let src = [Point::new(f64::NAN, 0.0), Point::new(1.0, 0.0)];
        let dst = [Point::new(51.0, 80.0), Point::new(119.0, 80.0)];
        assert!(similarity_transform(src, dst).is_err());
    }

    #[test]
    fn test_default_anchors() {
        let anchors = EyeAnchors::for_canvas(CanvasSize::DEFAULT);
        assert_eq!(anchors.left, Point::new(51.0, 80.0));
        // 0.7 * 170 truncates to 118 in floating point.
        assert_eq!(anchors.right, Point::new(118.0, 80.0));
    }

    #[test]
    fn test_normalize_moves_eyes_onto_anchors() {
        let canvas = CanvasSize::DEFAULT;
        let anchors = EyeAnchors::for_canvas(canvas);
        let image = Canvas::from_fn(300, 400, |x, y| [x as f32 / 300.0, y as f32 / 400.0, 0.25]);

        let mut points: Vec<Point> = (0..LANDMARK_COUNT)
            .map(|i| Point::new(100.0 + i as f64, 150.0 + (i % 5) as f64 * 3.0))
            .collect();
        points[LEFT_EYE_OUTER] = Point::new(110.0, 160.0);
        points[RIGHT_EYE_OUTER] = Point::new(190.0, 170.0);
        let landmarks = LandmarkSet::new(points).unwrap();

        let face = normalize(&image, &landmarks, canvas, &anchors).unwrap();
        assert_eq!(face.image.width(), canvas.width);
        assert_eq!(face.image.height(), canvas.height);
        assert_maps(&face.transform, Point::new(110.0, 160.0), anchors.left);
        assert!(face.landmarks.points()[LEFT_EYE_OUTER].distance(&anchors.left) < 1e-4);
        assert!(face.landmarks.points()[RIGHT_EYE_OUTER].distance(&anchors.right) < 1e-4);
        assert_eq!(face.shape.len(), crate::shape::AUGMENTED_COUNT);
    }

    #[test]
    fn test_normalize_reflects_beyond_small_source() {
        let canvas = CanvasSize::DEFAULT;
        let anchors = EyeAnchors::for_canvas(canvas);
        // Red ramps with x and green with y, so a reflected sample reads back its distance
        // from the mirror line.
        let image = Canvas::from_fn(40, 40, |x, y| [x as f32 / 40.0, y as f32 / 40.0, 0.5]);

        let mut points = vec![Point::new(20.0, 25.0); LANDMARK_COUNT];
        points[LEFT_EYE_OUTER] = Point::new(10.0, 15.0);
        points[RIGHT_EYE_OUTER] = Point::new(30.0, 15.0);
        let landmarks = LandmarkSet::new(points).unwrap();

        let face = normalize(&image, &landmarks, canvas, &anchors).unwrap();
        let inverse = face.transform.invert().unwrap();

        // Top-left maps above and left of the source: mirrored about 0.
        let s = inverse.apply(Point::new(0.0, 0.0));
        assert!(s.x < 0.0 && s.y < 0.0);
        let got = face.image.pixel(0, 0);
        assert!((got[0] as f64 - s.x.abs() / 40.0).abs() < 1e-4);
        assert!((got[1] as f64 - s.y.abs() / 40.0).abs() < 1e-4);
        assert!((got[2] - 0.5).abs() < 1e-6);

        // Bottom-right maps past the far edge: mirrored about 39.
        let (x, y) = (canvas.width - 1, canvas.height - 1);
        let s = inverse.apply(Point::new(x as f64, y as f64));
        assert!(s.x > 39.0 && s.x < 78.0 && s.y > 39.0 && s.y < 78.0);
        let got = face.image.pixel(x as usize, y as usize);
        assert!((got[0] as f64 - (78.0 - s.x) / 40.0).abs() < 1e-4);
        assert!((got[1] as f64 - (78.0 - s.y) / 40.0).abs() < 1e-4);
    }

    fn coord() -> impl Strategy<Value = f64> {
        -500.0f64..500.0
    }

    proptest! {
        #[test]
        fn prop_similarity_maps_pairs_without_shear(
            p0x in coord(), p0y in coord(), p1x in coord(), p1y in coord(),
            q0x in coord(), q0y in coord(), q1x in coord(), q1y in coord(),
        ) {
            let src = [Point::new(p0x, p0y), Point::new(p1x, p1y)];
            let dst = [Point::new(q0x, q0y), Point::new(q1x, q1y)];
            prop_assume!(src[0].distance(&src[1]) > 1.0);
            prop_assume!(dst[0].distance(&dst[1]) > 1.0);

            let t = similarity_transform(src, dst).unwrap();
            prop_assert!(t.apply(src[0]).distance(&dst[0]) < 1e-4);
            prop_assert!(t.apply(src[1]).distance(&dst[1]) < 1e-4);
            prop_assert!(t.is_similarity(1e-6));

            let [[a, b, _], [d, e, _]] = t.m;
            let ortho = (a * b + d * e) / (a * a + d * d);
            prop_assert!(ortho.abs() < 1e-6);
        }
    }
}
