use anyhow::{Context, Result};
use log::{debug, info};
use meanface_vision::{Error, FaceInput, LandmarkSet, Point};
use rayon::prelude::*;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];
const LANDMARK_EXTENSION: &str = "txt";

/// An image and the landmark file that describes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FacePair {
    pub image: PathBuf,
    pub landmarks: PathBuf,
}

fn has_extension(path: &Path, exts: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| exts.iter().any(|x| x.eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}

/// Pair every image in `dir` with its landmark file.
///
/// `face.jpg` is matched with `face.jpg.txt` first, then `face.txt`. An image without
/// landmarks, or a landmark file without an image, is an error. Pairs come back sorted by
/// image file name.
pub fn discover(dir: &Path) -> Result<Vec<FacePair>> {
    let mut images = Vec::new();
    let mut landmark_files = BTreeSet::new();
    for entry in
        std::fs::read_dir(dir).with_context(|| format!("reading directory {}", dir.display()))?
    {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        if has_extension(&path, &IMAGE_EXTENSIONS) {
            images.push(path);
        } else if has_extension(&path, &[LANDMARK_EXTENSION]) {
            landmark_files.insert(path);
        }
    }
    images.sort();

    if images.is_empty() {
        anyhow::bail!("no images found in {}", dir.display());
    }

    let missing = Error::MissingCorrespondence {
        images: images.len(),
        landmarks: landmark_files.len(),
    };
    let mut pairs = Vec::with_capacity(images.len());
    for image in images {
        let full = append_extension(&image, LANDMARK_EXTENSION);
        let stem = image.with_extension(LANDMARK_EXTENSION);
        let landmarks = if landmark_files.remove(&full) {
            full
        } else if landmark_files.remove(&stem) {
            stem
        } else {
            return Err(anyhow::Error::new(missing))
                .with_context(|| format!("{} has no landmark file", image.display()));
        };
        debug!("{} <- {}", image.display(), landmarks.display());
        pairs.push(FacePair { image, landmarks });
    }

    if let Some(orphan) = landmark_files.iter().next() {
        return Err(anyhow::Error::new(missing))
            .with_context(|| format!("{} has no matching image", orphan.display()));
    }

    Ok(pairs)
}

fn append_extension(path: &Path, ext: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".");
    name.push(ext);
    PathBuf::from(name)
}

/// Parse one `x y` pair per line. Blank lines are skipped.
pub fn parse_landmarks(text: &str) -> Result<LandmarkSet> {
    let mut points = Vec::new();
    for (lineno, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let mut fields = line.split_whitespace();
        let (x, y) = match (fields.next(), fields.next(), fields.next()) {
            (Some(x), Some(y), None) => (x, y),
            _ => anyhow::bail!("line {}: expected `x y`, got {:?}", lineno + 1, line),
        };
        let x: f64 = x
            .parse()
            .with_context(|| format!("line {}: bad x coordinate {:?}", lineno + 1, x))?;
        let y: f64 = y
            .parse()
            .with_context(|| format!("line {}: bad y coordinate {:?}", lineno + 1, y))?;
        points.push(Point::new(x, y));
    }
    Ok(LandmarkSet::new(points)?)
}

pub fn read_landmarks(path: &Path) -> Result<LandmarkSet> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading landmarks {}", path.display()))?;
    parse_landmarks(&text).with_context(|| format!("parsing landmarks {}", path.display()))
}

/// Decode every pair in parallel, preserving order.
pub fn load_faces(pairs: &[FacePair]) -> Result<Vec<FaceInput>> {
    info!("Loading {} face(s)", pairs.len());
    pairs
        .par_iter()
        .map(|pair| {
            let landmarks = read_landmarks(&pair.landmarks)?;
            let image = image::open(&pair.image)
                .with_context(|| format!("decoding {}", pair.image.display()))?;
            Ok(FaceInput { image, landmarks })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt::Write as _;

    fn landmark_text(offset: f64) -> String {
        let mut s = String::new();
        for i in 0..68 {
            writeln!(s, "{} {}", 40.0 + i as f64 + offset, 60 + i % 9).unwrap();
        }
        s
    }

    fn touch_image(path: &Path) {
        image::RgbImage::from_pixel(8, 8, image::Rgb([10, 20, 30]))
            .save(path)
            .unwrap();
    }

    #[test]
    fn test_parse_landmarks() {
        let set = parse_landmarks(&format!("\n{}\n\n", landmark_text(0.5))).unwrap();
        assert_eq!(set.points().len(), 68);
        assert_eq!(set.points()[2], Point::new(42.5, 62.0));
    }

    #[test]
    fn test_parse_rejects_bad_lines() {
        let err = parse_landmarks("1 2\n3\n").unwrap_err();
        assert!(format!("{err:#}").contains("line 2"));
        let err = parse_landmarks("1 x\n").unwrap_err();
        assert!(format!("{err:#}").contains("bad y"));
        // Right format, wrong count.
        assert!(parse_landmarks("1 2\n3 4\n").is_err());
    }

    #[test]
    fn test_discover_pairs_by_name() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch_image(&root.join("b.png"));
        std::fs::write(root.join("b.txt"), landmark_text(0.0)).unwrap();
        touch_image(&root.join("a.jpg"));
        std::fs::write(root.join("a.jpg.txt"), landmark_text(1.0)).unwrap();
        std::fs::write(root.join("notes.md"), "ignored").unwrap();

        let pairs = discover(root).unwrap();
        assert_eq!(
            pairs,
            vec![
                FacePair {
                    image: root.join("a.jpg"),
                    landmarks: root.join("a.jpg.txt"),
                },
                FacePair {
                    image: root.join("b.png"),
                    landmarks: root.join("b.txt"),
                },
            ]
        );

        let faces = load_faces(&pairs).unwrap();
        assert_eq!(faces.len(), 2);
        assert_eq!(faces[0].landmarks.points()[0], Point::new(41.0, 60.0));
        assert_eq!(faces[1].image.width(), 8);
    }

    #[test]
    fn test_discover_reports_missing_landmarks() {
        let dir = tempfile::tempdir().unwrap();
        touch_image(&dir.path().join("lonely.jpg"));
        let err = discover(dir.path()).unwrap_err();
        assert!(format!("{err:#}").contains("lonely.jpg"));
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::MissingCorrespondence {
                images: 1,
                landmarks: 0
            })
        ));
    }

    #[test]
    fn test_discover_reports_orphan_landmarks() {
        let dir = tempfile::tempdir().unwrap();
        touch_image(&dir.path().join("a.jpg"));
        std::fs::write(dir.path().join("a.txt"), landmark_text(0.0)).unwrap();
        std::fs::write(dir.path().join("ghost.txt"), landmark_text(0.0)).unwrap();
        let err = discover(dir.path()).unwrap_err();
        assert!(format!("{err:#}").contains("ghost.txt"));
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::MissingCorrespondence {
                images: 1,
                landmarks: 2
            })
        ));
    }

    #[test]
    fn test_discover_empty_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(discover(dir.path()).is_err());
    }
}
