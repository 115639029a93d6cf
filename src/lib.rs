pub mod config;
pub mod dataset;
pub mod output;

// Re-export vision types for convenience
pub use meanface_vision::{
    align, pipeline, shape, Average, CanvasSize, Error, FaceInput, LandmarkSet, Pipeline,
    PipelineOptions, Point,
};
