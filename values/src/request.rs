//! Request types: the raw transport form and the validated canonical form.

use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

use crate::types::{Category, CategoryInput, Profile};

/// Hard ceiling on samples per request, independent of configuration.
pub const MAX_SAMPLES_LIMIT: u32 = 4;
/// Hard ceiling on denoising steps per request, independent of configuration.
pub const MAX_STEPS_LIMIT: u32 = 40;
/// Largest explicit seed. `-1` requests a random seed.
pub const MAX_SEED: i64 = (1 << 31) - 1;

/// Try-on parameters exactly as received. Every field is optional; defaults
/// are applied by the validation engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProcessRequest {
    /// `hd` or `dc`. Also accepted as `model_type`.
    #[serde(default, alias = "model_type", alias = "modelType")]
    pub profile: Option<String>,
    #[serde(default)]
    pub category: Option<CategoryInput>,
    #[serde(default)]
    pub samples: Option<i64>,
    #[serde(default)]
    pub steps: Option<i64>,
    #[serde(default)]
    pub scale: Option<f64>,
    #[serde(default)]
    pub seed: Option<i64>,
    /// Problems a transport hit while reading the form, reported alongside
    /// the engine's own findings.
    #[serde(skip)]
    pub transport_errors: Vec<FieldError>,
}

impl ProcessRequest {
    /// Whether a transport already rejected `field`.
    pub fn rejected(&self, field: &str) -> bool {
        self.transport_errors.iter().any(|e| e.field == field)
    }
}

/// One uploaded image as received from a transport.
#[derive(Clone, PartialEq)]
pub struct UploadedImage {
    pub filename: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl UploadedImage {
    pub fn new(
        filename: impl Into<String>,
        content_type: Option<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            filename: filename.into(),
            content_type,
            bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Lowercased extension including the dot, e.g. `.png`.
    pub fn extension(&self) -> Option<String> {
        let (_, ext) = self.filename.rsplit_once('.')?;
        if ext.is_empty() {
            return None;
        }
        Some(format!(".{}", ext.to_ascii_lowercase()))
    }
}

impl fmt::Debug for UploadedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadedImage")
            .field("filename", &self.filename)
            .field("content_type", &self.content_type)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

/// The two uploads of a try-on request.
#[derive(Debug, Clone, Default)]
pub struct Uploads {
    pub model_image: Option<UploadedImage>,
    pub cloth_image: Option<UploadedImage>,
}

/// Field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Fully validated request. Constructed only through [`CanonicalRequest::new`],
/// which rejects any combination that breaks the structural rules.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
pub struct CanonicalRequest {
    profile: Profile,
    category: Category,
    samples: u32,
    steps: u32,
    scale: f64,
    seed: i64,
}

impl CanonicalRequest {
    pub fn new(
        profile: Profile,
        category: Category,
        samples: u32,
        steps: u32,
        scale: f64,
        seed: i64,
    ) -> Result<Self, FieldError> {
        if !profile.supports(category) {
            return Err(FieldError::new(
                "category",
                format!("profile '{}' only supports the upper category", profile),
            ));
        }
        if samples == 0 || samples > MAX_SAMPLES_LIMIT {
            return Err(FieldError::new(
                "samples",
                format!("must be between 1 and {}", MAX_SAMPLES_LIMIT),
            ));
        }
        if steps == 0 || steps > MAX_STEPS_LIMIT {
            return Err(FieldError::new(
                "steps",
                format!("must be between 1 and {}", MAX_STEPS_LIMIT),
            ));
        }
        if !scale.is_finite() || scale <= 0.0 {
            return Err(FieldError::new("scale", "must be a positive finite number"));
        }
        if seed != -1 && !(0..=MAX_SEED).contains(&seed) {
            return Err(FieldError::new(
                "seed",
                format!("must be -1 or between 0 and {}", MAX_SEED),
            ));
        }
        Ok(Self {
            profile,
            category,
            samples,
            steps,
            scale,
            seed,
        })
    }

    pub fn profile(&self) -> Profile {
        self.profile
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn samples(&self) -> u32 {
        self.samples
    }

    pub fn steps(&self) -> u32 {
        self.steps
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn seed(&self) -> i64 {
        self.seed
    }
}
