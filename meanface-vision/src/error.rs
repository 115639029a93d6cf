use thiserror::Error;

use crate::geometry::Point;

#[derive(Error, Debug)]
pub enum Error {
    #[error("degenerate alignment: {0}")]
    DegenerateAlignment(String),

    #[error("missing correspondence: {images} image(s) but {landmarks} landmark set(s)")]
    MissingCorrespondence { images: usize, landmarks: usize },

    #[error("landmark set has {found} points, expected {expected}")]
    LandmarkCount { expected: usize, found: usize },

    #[error("invalid canvas size {width}x{height}")]
    InvalidCanvas { width: u32, height: u32 },

    #[error("no faces to average")]
    Empty,

    #[error("triangulation failed: {0}")]
    Triangulation(String),

    #[error("triangle {vertices:?} could not be resolved to three distinct points")]
    TriangulationAmbiguity { vertices: [Option<usize>; 3] },

    #[error("{side} triangle {vertices:?} has no area")]
    OutOfBoundsSample {
        side: &'static str,
        vertices: [Point; 3],
    },

    #[error("face #{index}: {source}")]
    Face {
        index: usize,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Attach the index of the input face that produced this error.
    pub fn for_face(self, index: usize) -> Error {
        Error::Face {
            index,
            source: Box::new(self),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
