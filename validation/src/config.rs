//! Validation limits.

use serde::{Deserialize, Serialize};
use tryon_values::{MAX_SAMPLES_LIMIT, MAX_STEPS_LIMIT};

/// Read-only snapshot of the limits a request is checked against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Largest accepted upload in bytes.
    pub max_file_size: usize,
    /// Lowercase extensions including the dot.
    pub allowed_extensions: Vec<String>,
    pub min_dimension: u32,
    pub max_dimension: u32,
    pub default_samples: u32,
    pub max_samples: u32,
    pub default_steps: u32,
    pub max_steps: u32,
    pub default_scale: f64,
    pub min_scale: f64,
    pub max_scale: f64,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            max_file_size: 10 * 1024 * 1024,
            allowed_extensions: vec![
                ".jpg".to_string(),
                ".jpeg".to_string(),
                ".png".to_string(),
                ".bmp".to_string(),
            ],
            min_dimension: 64,
            max_dimension: 4096,
            default_samples: 1,
            max_samples: MAX_SAMPLES_LIMIT,
            default_steps: 20,
            max_steps: MAX_STEPS_LIMIT,
            default_scale: 2.0,
            min_scale: 1.0,
            max_scale: 5.0,
        }
    }
}

impl ValidationConfig {
    /// Checks the limits are coherent. Returns every problem found.
    pub fn check(&self) -> Result<(), Vec<String>> {
        let mut problems = Vec::new();

        if self.max_file_size == 0 {
            problems.push("max_file_size must be positive".to_string());
        }
        if self.allowed_extensions.is_empty() {
            problems.push("allowed_extensions must not be empty".to_string());
        }
        if self.min_dimension == 0 || self.min_dimension > self.max_dimension {
            problems.push(format!(
                "dimension bounds {}..{} are invalid",
                self.min_dimension, self.max_dimension
            ));
        }
        if self.max_samples == 0 || self.max_samples > MAX_SAMPLES_LIMIT {
            problems.push(format!("max_samples must be between 1 and {}", MAX_SAMPLES_LIMIT));
        }
        if !(1..=self.max_samples).contains(&self.default_samples) {
            problems.push("default_samples must be between 1 and max_samples".to_string());
        }
        if self.max_steps == 0 || self.max_steps > MAX_STEPS_LIMIT {
            problems.push(format!("max_steps must be between 1 and {}", MAX_STEPS_LIMIT));
        }
        if !(1..=self.max_steps).contains(&self.default_steps) {
            problems.push("default_steps must be between 1 and max_steps".to_string());
        }
        if !(self.min_scale.is_finite() && self.max_scale.is_finite())
            || self.min_scale <= 0.0
            || self.min_scale > self.max_scale
        {
            problems.push(format!(
                "scale bounds {}..{} are invalid",
                self.min_scale, self.max_scale
            ));
        } else if !(self.min_scale..=self.max_scale).contains(&self.default_scale) {
            problems.push("default_scale must lie within the scale bounds".to_string());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(problems)
        }
    }

    pub fn allows_extension(&self, extension: &str) -> bool {
        self.allowed_extensions
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(extension))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_coherent() {
        assert!(ValidationConfig::default().check().is_ok());
    }

    #[test]
    fn test_check_reports_every_problem() {
        let config = ValidationConfig {
            max_samples: 9,
            min_scale: 6.0,
            allowed_extensions: vec![],
            ..Default::default()
        };
        let problems = config.check().unwrap_err();
        assert!(problems.len() >= 3);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: ValidationConfig = toml::from_str("max_samples = 2").unwrap();
        assert_eq!(config.max_samples, 2);
        assert_eq!(config.max_steps, 40);
        assert!(config.allows_extension(".PNG"));
        assert!(!config.allows_extension(".gif"));
    }
}
