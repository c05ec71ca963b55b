use std::path::PathBuf;

use common::TryOnError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode output image: {0}")]
    Encode(#[from] image::ImageError),
}

impl ArtifactError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, ArtifactError>;

impl From<ArtifactError> for TryOnError {
    fn from(err: ArtifactError) -> Self {
        TryOnError::resource("filesystem", err.to_string())
    }
}
