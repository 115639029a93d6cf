use anyhow::{Context, Result};
use image::{ImageFormat, RgbImage};
use log::info;
use meanface_vision::{Average, CanvasSize, Point, Triangle};
use serde::Serialize;
use std::io::{BufWriter, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// Mean shape and triangulation as written next to the averaged image.
#[derive(Debug, Serialize)]
struct ShapeReport<'a> {
    width: u32,
    height: u32,
    faces: usize,
    points: &'a [Point],
    triangles: &'a [Triangle],
}

/// Write into a temporary file beside `path`, then rename it over `path`.
fn write_atomic(
    path: &Path,
    write: impl FnOnce(&mut BufWriter<&mut NamedTempFile>) -> Result<()>,
) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;

    let mut tmp = tempfile::Builder::new()
        .prefix(".meanface-")
        .tempfile_in(dir)
        .with_context(|| format!("creating temporary file in {}", dir.display()))?;
    {
        let mut writer = BufWriter::new(&mut tmp);
        write(&mut writer)?;
        writer.flush()?;
    }
    tmp.persist(path)
        .with_context(|| format!("replacing {}", path.display()))?;
    Ok(())
}

/// Encode `img` in the format implied by the extension of `path`.
pub fn write_image_atomic(img: &RgbImage, path: &Path) -> Result<()> {
    let format = ImageFormat::from_path(path)
        .with_context(|| format!("unsupported output format: {}", path.display()))?;
    write_atomic(path, |w| {
        img.write_to(w, format)
            .with_context(|| format!("encoding {}", path.display()))
    })?;
    info!(
        "Wrote {}x{} image to {}",
        img.width(),
        img.height(),
        path.display()
    );
    Ok(())
}

pub fn write_shape_json(average: &Average, canvas: CanvasSize, path: &Path) -> Result<()> {
    let report = ShapeReport {
        width: canvas.width,
        height: canvas.height,
        faces: average.faces,
        points: average.mean_shape.points(),
        triangles: &average.triangles,
    };
    write_atomic(path, |w| {
        serde_json::to_writer_pretty(&mut *w, &report)?;
        Ok(())
    })?;
    info!("Wrote mean shape to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use meanface_vision::{Canvas, LandmarkSet, Shape};

    #[test]
    fn test_image_round_trip_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/avg.png");
        let img = RgbImage::from_fn(5, 4, |x, y| image::Rgb([x as u8 * 40, y as u8 * 50, 7]));
        write_image_atomic(&img, &path).unwrap();

        let back = image::open(&path).unwrap().to_rgb8();
        assert_eq!(back, img);
        // Only the final file is left behind.
        assert_eq!(std::fs::read_dir(path.parent().unwrap()).unwrap().count(), 1);
    }

    #[test]
    fn test_unknown_extension_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let img = RgbImage::new(2, 2);
        assert!(write_image_atomic(&img, &dir.path().join("avg.unknown")).is_err());
        assert!(!dir.path().join("avg.unknown").exists());
    }

    #[test]
    fn test_shape_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shape.json");
        let canvas = CanvasSize::DEFAULT;
        let landmarks: Vec<Point> = (0..68)
            .map(|i| Point::new(20.0 + i as f64, 40.0 + (i % 7) as f64))
            .collect();
        let shape = Shape::augment(&LandmarkSet::new(landmarks).unwrap(), canvas);
        let average = Average {
            image: Canvas::new(canvas.width, canvas.height),
            mean_shape: shape,
            triangles: vec![Triangle([0, 1, 68])],
            faces: 3,
        };
        write_shape_json(&average, canvas, &path).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["width"], 170);
        assert_eq!(value["faces"], 3);
        assert_eq!(value["points"].as_array().unwrap().len(), 76);
        assert_eq!(value["points"][68]["x"], 0.0);
        assert_eq!(value["triangles"][0], serde_json::json!([0, 1, 68]));
    }
}
