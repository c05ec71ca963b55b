//! Core enums shared by every layer: profile, garment category, pipeline stage.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

use crate::error::ValueError;

/// Named bundle of pose/parsing/synthesis models tuned for a garment class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    /// Half-body profile. Upper-body garments only.
    Hd,
    /// Full-body profile. Upper, lower and dress garments.
    Dc,
}

impl Profile {
    /// Every profile, in device-assignment order.
    pub const ALL: [Profile; 2] = [Profile::Hd, Profile::Dc];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hd => "hd",
            Self::Dc => "dc",
        }
    }

    /// Name used when reporting construction failures for this profile.
    pub fn model_name(&self) -> &'static str {
        match self {
            Self::Hd => "tryon-hd",
            Self::Dc => "tryon-dc",
        }
    }

    /// Whether this profile can synthesize the given category.
    pub fn supports(&self, category: Category) -> bool {
        match self {
            Self::Hd => category == Category::Upper,
            Self::Dc => true,
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Profile {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hd" => Ok(Self::Hd),
            "dc" => Ok(Self::Dc),
            other => Err(ValueError::UnknownProfile(other.to_string())),
        }
    }
}

/// Garment category, resolved from an integer index or a symbolic name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Upper,
    Lower,
    Dress,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Upper, Category::Lower, Category::Dress];

    pub fn index(&self) -> u8 {
        match self {
            Self::Upper => 0,
            Self::Lower => 1,
            Self::Dress => 2,
        }
    }

    pub fn from_index(index: i64) -> Option<Self> {
        match index {
            0 => Some(Self::Upper),
            1 => Some(Self::Lower),
            2 => Some(Self::Dress),
            _ => None,
        }
    }

    /// Accepts `upper`, `upperbody`, `upper_body` and the equivalents for the
    /// other categories, case-insensitively.
    pub fn from_name(name: &str) -> Option<Self> {
        let normalized: String = name
            .trim()
            .to_ascii_lowercase()
            .chars()
            .filter(|c| *c != '_' && *c != '-' && *c != ' ')
            .collect();
        match normalized.as_str() {
            "upper" | "upperbody" => Some(Self::Upper),
            "lower" | "lowerbody" => Some(Self::Lower),
            "dress" | "dresses" => Some(Self::Dress),
            _ => None,
        }
    }

    /// Region name understood by the mask segmenter.
    pub fn region(&self) -> &'static str {
        match self {
            Self::Upper => "upper_body",
            Self::Lower => "lower_body",
            Self::Dress => "dresses",
        }
    }

    /// Category label passed to the synthesizer.
    pub fn synth_name(&self) -> &'static str {
        match self {
            Self::Upper => "upperbody",
            Self::Lower => "lowerbody",
            Self::Dress => "dress",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Upper => write!(f, "upper"),
            Self::Lower => write!(f, "lower"),
            Self::Dress => write!(f, "dress"),
        }
    }
}

/// Category exactly as a transport received it. Never travels past validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum CategoryInput {
    Index(i64),
    Name(String),
}

impl CategoryInput {
    /// Form fields arrive as text, so digits become an index.
    pub fn from_text(text: &str) -> Self {
        match text.trim().parse::<i64>() {
            Ok(index) => Self::Index(index),
            Err(_) => Self::Name(text.trim().to_string()),
        }
    }

    pub fn resolve(&self) -> Option<Category> {
        match self {
            Self::Index(index) => Category::from_index(*index),
            Self::Name(name) => Category::from_name(name),
        }
    }
}

impl fmt::Display for CategoryInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(index) => write!(f, "{}", index),
            Self::Name(name) => write!(f, "{}", name),
        }
    }
}

/// Working stages of one try-on request, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum Stage {
    Validating,
    Loading,
    PoseEstimating,
    Parsing,
    Masking,
    Synthesizing,
    Persisting,
}

impl Stage {
    pub const ORDER: [Stage; 7] = [
        Stage::Validating,
        Stage::Loading,
        Stage::PoseEstimating,
        Stage::Parsing,
        Stage::Masking,
        Stage::Synthesizing,
        Stage::Persisting,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validating => "Validating",
            Self::Loading => "Loading",
            Self::PoseEstimating => "PoseEstimating",
            Self::Parsing => "Parsing",
            Self::Masking => "Masking",
            Self::Synthesizing => "Synthesizing",
            Self::Persisting => "Persisting",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a single pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineState {
    Running(Stage),
    Done,
    Errored { at: Stage },
}

/// Failure classes every transport understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum ErrorKind {
    #[serde(rename = "ValidationError")]
    Validation,
    #[serde(rename = "ModelLoadError")]
    ModelLoad,
    #[serde(rename = "ProcessingError")]
    Processing,
    #[serde(rename = "ResourceError")]
    Resource,
    #[serde(rename = "UnclassifiedError")]
    Unclassified,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "ValidationError",
            Self::ModelLoad => "ModelLoadError",
            Self::Processing => "ProcessingError",
            Self::Resource => "ResourceError",
            Self::Unclassified => "UnclassifiedError",
        }
    }

    /// Status class a transport should report for this kind.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation => 400,
            Self::ModelLoad | Self::Resource => 503,
            Self::Processing | Self::Unclassified => 500,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_parsing_is_case_insensitive() {
        assert_eq!("HD".parse::<Profile>().unwrap(), Profile::Hd);
        assert_eq!(" dc ".parse::<Profile>().unwrap(), Profile::Dc);
        assert!("xl".parse::<Profile>().is_err());
    }

    #[test]
    fn test_hd_supports_only_upper() {
        assert!(Profile::Hd.supports(Category::Upper));
        assert!(!Profile::Hd.supports(Category::Lower));
        assert!(!Profile::Hd.supports(Category::Dress));
        for category in Category::ALL {
            assert!(Profile::Dc.supports(category));
        }
    }

    #[test]
    fn test_category_aliases() {
        assert_eq!(Category::from_name("Upper_Body"), Some(Category::Upper));
        assert_eq!(Category::from_name("lowerbody"), Some(Category::Lower));
        assert_eq!(Category::from_name("dresses"), Some(Category::Dress));
        assert_eq!(Category::from_name("hat"), None);
        assert_eq!(Category::from_index(2), Some(Category::Dress));
        assert_eq!(Category::from_index(5), None);
        assert_eq!(Category::from_index(-1), None);
    }

    #[test]
    fn test_category_input_from_json() {
        let index: CategoryInput = serde_json::from_str("1").unwrap();
        assert_eq!(index.resolve(), Some(Category::Lower));

        let name: CategoryInput = serde_json::from_str("\"dress\"").unwrap();
        assert_eq!(name.resolve(), Some(Category::Dress));
    }

    #[test]
    fn test_category_input_from_form_text() {
        assert_eq!(CategoryInput::from_text("0"), CategoryInput::Index(0));
        assert_eq!(
            CategoryInput::from_text("upper"),
            CategoryInput::Name("upper".to_string())
        );
    }

    #[test]
    fn test_region_and_synth_names() {
        assert_eq!(Category::Upper.region(), "upper_body");
        assert_eq!(Category::Dress.region(), "dresses");
        assert_eq!(Category::Lower.synth_name(), "lowerbody");
    }

    #[test]
    fn test_error_kind_serialization() {
        let json = serde_json::to_string(&ErrorKind::Processing).unwrap();
        assert_eq!(json, "\"ProcessingError\"");
        assert_eq!(ErrorKind::Validation.status_code(), 400);
        assert_eq!(ErrorKind::Resource.status_code(), 503);
        assert_eq!(ErrorKind::Unclassified.status_code(), 500);
    }

    proptest::proptest! {
        #[test]
        fn prop_numeric_text_becomes_index(index in proptest::num::i64::ANY) {
            let input = CategoryInput::from_text(&format!(" {} ", index));
            proptest::prop_assert_eq!(&input, &CategoryInput::Index(index));
            proptest::prop_assert_eq!(input.resolve().is_some(), (0..=2).contains(&index));
        }
    }
}
