//! Pipeline errors
//!
//! Raised by the compositor and the orchestrator's own checks. They reach
//! callers classified as processing failures at the stage that raised them.
use thiserror::Error;
use tryon_values::ValueError;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(
        "Segmenter returned a {actual_width}x{actual_height} mask for a \
         {expected_width}x{expected_height} parse map"
    )]
    MaskDimensions {
        actual_width: u32,
        actual_height: u32,
        expected_width: u32,
        expected_height: u32,
    },

    #[error("Mask is {mask_width}x{mask_height} but the source image is {width}x{height}")]
    CompositeDimensions {
        mask_width: u32,
        mask_height: u32,
        width: u32,
        height: u32,
    },

    #[error("Synthesizer returned {actual} images, expected {expected}")]
    SampleCount { expected: u32, actual: usize },

    #[error(transparent)]
    Value(#[from] ValueError),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
