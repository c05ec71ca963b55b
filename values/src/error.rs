//! Error types for value construction.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValueError {
    #[error("Unknown profile: {0}")]
    UnknownProfile(String),

    #[error("Image dimensions {width}x{height} do not match the expected {expected_width}x{expected_height}")]
    DimensionMismatch {
        width: u32,
        height: u32,
        expected_width: u32,
        expected_height: u32,
    },

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

pub type ValueResult<T> = std::result::Result<T, ValueError>;
