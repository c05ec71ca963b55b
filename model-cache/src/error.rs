use std::time::Duration;

use common::TryOnError;
use thiserror::Error;
use tryon_values::Profile;

#[derive(Debug, Clone, Error)]
pub enum ModelCacheError {
    #[error("Failed to construct models for profile '{profile}': {message}")]
    Construction { profile: Profile, message: String },

    #[error("Models not ready after {waited:?}; still pending: {pending:?}")]
    Timeout { waited: Duration, pending: Vec<Profile> },

    #[error("Invalid device '{0}'; expected auto, cpu, cuda or cuda:<index>")]
    InvalidDevice(String),
}

pub type Result<T> = std::result::Result<T, ModelCacheError>;

impl From<ModelCacheError> for TryOnError {
    fn from(err: ModelCacheError) -> Self {
        match &err {
            ModelCacheError::Construction { profile, message } => {
                TryOnError::model_load(profile.model_name(), message.clone())
            }
            ModelCacheError::Timeout { pending, .. } => {
                let models: Vec<&str> = pending.iter().map(|p| p.model_name()).collect();
                TryOnError::model_load(models.join(","), err.to_string())
            }
            ModelCacheError::InvalidDevice(_) => TryOnError::model_load("device", err.to_string()),
        }
    }
}
