pub mod accumulate;
pub mod align;
pub mod error;
pub mod geometry;
pub mod pipeline;
pub mod raster;
pub mod shape;
pub mod triangulate;
pub mod warp;

// Re-export commonly used types
pub use error::{Error, Result};
pub use geometry::Point;
pub use pipeline::{Average, FaceInput, Pipeline, PipelineOptions};
pub use raster::Canvas;
pub use shape::{CanvasSize, LandmarkSet, Shape};
pub use triangulate::Triangle;
