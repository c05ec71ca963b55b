use std::sync::Arc;

use tryon_values::{
    CanonicalRequest, Category, FieldError, ProcessRequest, Profile, UploadedImage, Uploads,
    MAX_SEED,
};

use crate::config::ValidationConfig;

pub const FIELD_MODEL_IMAGE: &str = "modelImage";
pub const FIELD_CLOTH_IMAGE: &str = "clothImage";

/// Stateless rule evaluator. Collects every violation instead of stopping at
/// the first one.
#[derive(Debug, Clone)]
pub struct ValidationEngine {
    config: Arc<ValidationConfig>,
}

impl ValidationEngine {
    pub fn new(config: Arc<ValidationConfig>) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    pub fn validate(
        &self,
        request: &ProcessRequest,
        uploads: &Uploads,
    ) -> Result<CanonicalRequest, Vec<FieldError>> {
        let mut errors = request.transport_errors.clone();

        let profile = self.check_profile(request, &mut errors);
        let category = self.check_category(request, profile, &mut errors);
        let samples = self.check_count(
            "samples",
            request.samples,
            self.config.default_samples,
            self.config.max_samples,
            &mut errors,
        );
        let steps = self.check_count(
            "steps",
            request.steps,
            self.config.default_steps,
            self.config.max_steps,
            &mut errors,
        );
        let scale = self.check_scale(request.scale, &mut errors);
        let seed = self.check_seed(request.seed, &mut errors);

        for (field, upload) in [
            (FIELD_MODEL_IMAGE, uploads.model_image.as_ref()),
            (FIELD_CLOTH_IMAGE, uploads.cloth_image.as_ref()),
        ] {
            if !request.rejected(field) {
                self.check_upload(field, upload, &mut errors);
            }
        }

        if !errors.is_empty() {
            tracing::debug!(violations = errors.len(), "Request failed validation");
            return Err(errors);
        }

        match (profile, category, samples, steps, scale, seed) {
            (Some(profile), Some(category), Some(samples), Some(steps), Some(scale), Some(seed)) => {
                CanonicalRequest::new(profile, category, samples, steps, scale, seed)
                    .map_err(|e| vec![e])
            }
            _ => Err(vec![FieldError::new("request", "incomplete request")]),
        }
    }

    fn check_profile(&self, request: &ProcessRequest, errors: &mut Vec<FieldError>) -> Option<Profile> {
        if request.rejected("profile") {
            return None;
        }
        match request.profile.as_deref() {
            None => Some(Profile::Hd),
            Some(raw) => match raw.parse::<Profile>() {
                Ok(profile) => Some(profile),
                Err(_) => {
                    errors.push(FieldError::new(
                        "profile",
                        format!("unknown profile '{}'; expected 'hd' or 'dc'", raw),
                    ));
                    None
                }
            },
        }
    }

    fn check_category(
        &self,
        request: &ProcessRequest,
        profile: Option<Profile>,
        errors: &mut Vec<FieldError>,
    ) -> Option<Category> {
        if request.rejected("category") {
            return None;
        }
        let category = match &request.category {
            None => Category::Upper,
            Some(input) => match input.resolve() {
                Some(category) => category,
                None => {
                    errors.push(FieldError::new(
                        "category",
                        format!(
                            "unknown category '{}'; expected 0, 1, 2 or upper, lower, dress",
                            input
                        ),
                    ));
                    return None;
                }
            },
        };

        if let Some(profile) = profile {
            if !profile.supports(category) {
                errors.push(FieldError::new(
                    "category",
                    format!(
                        "profile '{}' only supports the upper category, got '{}'",
                        profile, category
                    ),
                ));
                return None;
            }
        }
        Some(category)
    }

    fn check_count(
        &self,
        field: &str,
        value: Option<i64>,
        default: u32,
        max: u32,
        errors: &mut Vec<FieldError>,
    ) -> Option<u32> {
        let value = value.unwrap_or(i64::from(default));
        if value < 1 || value > i64::from(max) {
            errors.push(FieldError::new(
                field,
                format!("must be between 1 and {}, got {}", max, value),
            ));
            return None;
        }
        u32::try_from(value).ok()
    }

    fn check_scale(&self, value: Option<f64>, errors: &mut Vec<FieldError>) -> Option<f64> {
        let scale = value.unwrap_or(self.config.default_scale);
        if !scale.is_finite() || scale < self.config.min_scale || scale > self.config.max_scale {
            errors.push(FieldError::new(
                "scale",
                format!(
                    "must be between {} and {}, got {}",
                    self.config.min_scale, self.config.max_scale, scale
                ),
            ));
            return None;
        }
        Some(scale)
    }

    fn check_seed(&self, value: Option<i64>, errors: &mut Vec<FieldError>) -> Option<i64> {
        let seed = value.unwrap_or(-1);
        if seed != -1 && !(0..=MAX_SEED).contains(&seed) {
            errors.push(FieldError::new(
                "seed",
                format!("must be -1 or between 0 and {}, got {}", MAX_SEED, seed),
            ));
            return None;
        }
        Some(seed)
    }

    fn check_upload(&self, field: &str, upload: Option<&UploadedImage>, errors: &mut Vec<FieldError>) {
        let Some(upload) = upload else {
            errors.push(FieldError::new(field, "is required"));
            return;
        };

        if upload.is_empty() {
            errors.push(FieldError::new(field, "is empty"));
            return;
        }

        match upload.content_type.as_deref() {
            Some(media) if media.to_ascii_lowercase().starts_with("image/") => {}
            Some(media) => errors.push(FieldError::new(
                field,
                format!("must declare an image media type, got '{}'", media),
            )),
            None => errors.push(FieldError::new(field, "must declare an image media type")),
        }

        match upload.extension() {
            Some(ext) if self.config.allows_extension(&ext) => {}
            Some(ext) => errors.push(FieldError::new(
                field,
                format!(
                    "extension '{}' is not allowed; expected one of {}",
                    ext,
                    self.config.allowed_extensions.join(", ")
                ),
            )),
            None => errors.push(FieldError::new(field, "filename has no extension")),
        }

        if upload.len() > self.config.max_file_size {
            errors.push(FieldError::new(
                field,
                format!(
                    "is {} bytes, larger than the {} byte limit",
                    upload.len(),
                    self.config.max_file_size
                ),
            ));
            return;
        }

        match image::load_from_memory(&upload.bytes) {
            Ok(decoded) => {
                let (width, height) = (decoded.width(), decoded.height());
                let (min, max) = (self.config.min_dimension, self.config.max_dimension);
                if width < min || height < min || width > max || height > max {
                    errors.push(FieldError::new(
                        field,
                        format!(
                            "dimensions {}x{} are outside {}x{}..{}x{}",
                            width, height, min, min, max, max
                        ),
                    ));
                }
            }
            Err(e) => errors.push(FieldError::new(field, format!("could not be decoded: {}", e))),
        }
    }
}

impl Default for ValidationEngine {
    fn default() -> Self {
        Self::new(Arc::new(ValidationConfig::default()))
    }
}
