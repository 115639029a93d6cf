use image::DynamicImage;
use log::info;
use rayon::prelude::*;

use crate::accumulate::Accumulator;
use crate::align::{self, EyeAnchors, NormalizedFace};
use crate::error::{Error, Result};
use crate::raster::Canvas;
use crate::shape::{CanvasSize, LandmarkSet, MeanShapeBuilder, Shape};
use crate::triangulate::{self, Triangle};
use crate::warp;

/// One input photograph paired with its landmarks.
#[derive(Debug, Clone)]
pub struct FaceInput {
    pub image: DynamicImage,
    pub landmarks: LandmarkSet,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineOptions {
    pub canvas: CanvasSize,
    pub anchors: EyeAnchors,
}

impl PipelineOptions {
    pub fn for_canvas(canvas: CanvasSize) -> Self {
        Self {
            canvas,
            anchors: EyeAnchors::for_canvas(canvas),
        }
    }
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self::for_canvas(CanvasSize::DEFAULT)
    }
}

/// Result of averaging a batch of faces.
#[derive(Debug, Clone)]
pub struct Average {
    pub image: Canvas,
    pub mean_shape: Shape,
    pub triangles: Vec<Triangle>,
    pub faces: usize,
}

/// Full pipeline: normalize → mean shape → triangulate → warp → accumulate.
///
/// Per-face stages run on the rayon thread pool; the mean shape and triangulation are
/// sequential barriers between them.
pub struct Pipeline {
    pub options: PipelineOptions,
}

impl Pipeline {
    pub fn new(options: PipelineOptions) -> Self {
        Self { options }
    }

    /// Map every face into the canonical canvas. Fails on the first face that cannot be
    /// aligned, naming its index.
    pub fn normalize_all(&self, faces: &[FaceInput]) -> Result<Vec<NormalizedFace>> {
        let PipelineOptions { canvas, anchors } = self.options;
        faces
            .par_iter()
            .enumerate()
            .map(|(index, face)| {
                let image = Canvas::from_image(&face.image);
                align::normalize(&image, &face.landmarks, canvas, &anchors)
                    .map_err(|e| e.for_face(index))
            })
            .collect()
    }

    /// Average a batch of faces.
    pub fn run(&self, faces: &[FaceInput]) -> Result<Average> {
        if faces.is_empty() {
            return Err(Error::Empty);
        }
        let canvas = self.options.canvas;

        info!(
            "Normalizing {} face(s) into {}x{}",
            faces.len(),
            canvas.width,
            canvas.height
        );
        let normalized = self.normalize_all(faces)?;

        let mut builder = MeanShapeBuilder::new(normalized.len(), canvas);
        for face in &normalized {
            builder.add(&face.shape);
        }
        let mean_shape = builder.finish()?;

        let triangles = triangulate::triangulate(&mean_shape, canvas)?;
        if triangles.is_empty() {
            return Err(Error::Triangulation(
                "mean shape produced no triangles inside the canvas".to_string(),
            ));
        }
        info!("Mean shape triangulated into {} triangles", triangles.len());

        let (w, h) = (canvas.width, canvas.height);
        let sum = normalized
            .par_iter()
            .map(|face| warp::warp_face(&face.image, &face.shape, &mean_shape, &triangles))
            .fold(
                || Accumulator::new(w, h),
                |mut acc, warped| {
                    acc.add(&warped);
                    acc
                },
            )
            .reduce(|| Accumulator::new(w, h), Accumulator::merge);

        let image = sum.finish()?;
        info!("Averaged {} face(s)", normalized.len());

        Ok(Average {
            image,
            mean_shape,
            triangles,
            faces: normalized.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point;
    use crate::shape::{LANDMARK_COUNT, LEFT_EYE_OUTER, RIGHT_EYE_OUTER};

    fn face(eye_y: f64) -> FaceInput {
        let img = image::RgbImage::from_fn(200, 260, |x, y| image::Rgb([x as u8, y as u8, 90]));
        let mut points: Vec<Point> = (0..LANDMARK_COUNT)
            .map(|i| Point::new(60.0 + (i % 10) as f64 * 8.0, 100.0 + (i / 10) as f64 * 12.0))
            .collect();
        points[LEFT_EYE_OUTER] = Point::new(60.0, eye_y);
        points[RIGHT_EYE_OUTER] = Point::new(140.0, eye_y);
        FaceInput {
            image: DynamicImage::ImageRgb8(img),
            landmarks: LandmarkSet::new(points).unwrap(),
        }
    }

    #[test]
    fn test_empty_batch() {
        let pipeline = Pipeline::new(PipelineOptions::default());
        assert!(matches!(pipeline.run(&[]), Err(Error::Empty)));
    }

    #[test]
    fn test_failure_names_face_index() {
        let pipeline = Pipeline::new(PipelineOptions::default());
        let mut bad = face(90.0);
        let mut points = bad.landmarks.points().to_vec();
        points[RIGHT_EYE_OUTER] = points[LEFT_EYE_OUTER];
        bad.landmarks = LandmarkSet::new(points).unwrap();

        let err = pipeline.run(&[face(90.0), bad]).unwrap_err();
        match err {
            Error::Face { index, source } => {
                assert_eq!(index, 1);
                assert!(matches!(*source, Error::DegenerateAlignment(_)));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_run_produces_canvas_sized_average() {
        let pipeline = Pipeline::new(PipelineOptions::default());
        let avg = pipeline.run(&[face(90.0), face(95.0)]).unwrap();
        assert_eq!(avg.faces, 2);
        assert_eq!(avg.image.width(), 170);
        assert_eq!(avg.image.height(), 240);
        assert_eq!(avg.mean_shape.len(), crate::shape::AUGMENTED_COUNT);
        assert!(!avg.triangles.is_empty());
    }
}
