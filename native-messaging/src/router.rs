//! Routes jobs to the backend.

use std::path::Path;
use std::sync::Arc;

use common::AppStateProvider;
use serde::Deserialize;
use serde_json::Value;
use tryon_values::{
    CategoryInput, FieldError, ProcessRequest, ProcessSuccess, UploadedImage, Uploads,
};

use crate::config::NativeMessagingConfig;
use crate::error::{ErrorResponse, NativeMessagingError, NativeMessagingResult};
use crate::images;
use crate::protocol::{IncomingMessage, OutgoingMessage};

const FIELD_MODEL_IMAGE: &str = "modelImage";
const FIELD_CLOTH_IMAGE: &str = "clothImage";

/// Payload of a `process` job: the canonical request fields plus the two
/// images inline. Values stay untyped until [`ProcessPayload::into_parts`]
/// so one bad field does not hide the others.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProcessPayload {
    #[serde(default, alias = "model_type", alias = "modelType")]
    profile: Option<Value>,
    #[serde(default)]
    category: Option<Value>,
    #[serde(default)]
    samples: Option<Value>,
    #[serde(default)]
    steps: Option<Value>,
    #[serde(default)]
    scale: Option<Value>,
    #[serde(default)]
    seed: Option<Value>,
    #[serde(default, alias = "model_image", alias = "model_file")]
    model_image: Option<Value>,
    #[serde(default, alias = "cloth_image", alias = "cloth_file")]
    cloth_image: Option<Value>,
}

impl ProcessPayload {
    fn into_parts(self) -> (ProcessRequest, Uploads) {
        let mut problems = Vec::new();
        let mut request = ProcessRequest {
            profile: text("profile", self.profile, &mut problems),
            category: category(self.category, &mut problems),
            samples: number("samples", self.samples, Value::as_i64, &mut problems),
            steps: number("steps", self.steps, Value::as_i64, &mut problems),
            scale: number("scale", self.scale, Value::as_f64, &mut problems),
            seed: number("seed", self.seed, Value::as_i64, &mut problems),
            ..Default::default()
        };
        let uploads = Uploads {
            model_image: image(FIELD_MODEL_IMAGE, self.model_image, &mut problems),
            cloth_image: image(FIELD_CLOTH_IMAGE, self.cloth_image, &mut problems),
        };
        request.transport_errors = problems;
        (request, uploads)
    }
}

fn text(field: &str, value: Option<Value>, problems: &mut Vec<FieldError>) -> Option<String> {
    match value? {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => {
            problems.push(FieldError::new(field, format!("must be a string, got {}", other)));
            None
        }
    }
}

fn category(value: Option<Value>, problems: &mut Vec<FieldError>) -> Option<CategoryInput> {
    match value? {
        Value::Null => None,
        Value::String(s) => Some(CategoryInput::from_text(&s)),
        Value::Number(n) if n.is_i64() => n.as_i64().map(CategoryInput::Index),
        other => {
            problems.push(FieldError::new(
                "category",
                format!("must be an index or a name, got {}", other),
            ));
            None
        }
    }
}

/// Numbers may also arrive as strings. Blank strings mean "use the default".
fn number<T: std::str::FromStr>(
    field: &str,
    value: Option<Value>,
    from_json: fn(&Value) -> Option<T>,
    problems: &mut Vec<FieldError>,
) -> Option<T> {
    let value = value?;
    let parsed = match &value {
        Value::Null => return None,
        Value::String(s) if s.trim().is_empty() => return None,
        Value::String(s) => s.trim().parse().ok(),
        other => from_json(other),
    };
    if parsed.is_none() {
        problems.push(FieldError::new(field, format!("{} is not a valid number", value)));
    }
    parsed
}

fn image(field: &str, value: Option<Value>, problems: &mut Vec<FieldError>) -> Option<UploadedImage> {
    let encoded = text(field, value, problems)?;
    match images::decode_image(field, &encoded) {
        Ok(upload) => Some(upload),
        Err(NativeMessagingError::Validation { field, message }) => {
            problems.push(FieldError::new(field, message));
            None
        }
        Err(e) => {
            problems.push(FieldError::new(field, e.to_string()));
            None
        }
    }
}

/// Dispatches incoming jobs by route.
pub struct MessageRouter {
    state: Arc<dyn AppStateProvider>,
    config: NativeMessagingConfig,
}

impl MessageRouter {
    /// Create a router over `state`.
    pub fn new(state: Arc<dyn AppStateProvider>, config: NativeMessagingConfig) -> Self {
        Self { state, config }
    }

    /// Handles one job. Try-on failures come back as `Ok` with
    /// `success: false`; `Err` is reserved for malformed jobs.
    pub async fn dispatch(&self, message: IncomingMessage) -> NativeMessagingResult<OutgoingMessage> {
        match message.route.as_str() {
            "process" => self.process(message).await,
            "health" => {
                let health = self.state.health().await;
                Ok(OutgoingMessage::success(
                    message.request_id,
                    serde_json::to_value(health)?,
                ))
            }
            other => Err(NativeMessagingError::route_not_found(other)),
        }
    }

    async fn process(&self, message: IncomingMessage) -> NativeMessagingResult<OutgoingMessage> {
        let payload: ProcessPayload = if message.payload.is_null() {
            ProcessPayload::default()
        } else {
            serde_json::from_value(message.payload).map_err(|e| {
                NativeMessagingError::validation("payload", format!("invalid process payload: {}", e))
            })?
        };

        let (request, uploads) = payload.into_parts();

        match self.state.process(request, uploads).await {
            Ok(success) => {
                let data = self.success_data(&success)?;
                Ok(OutgoingMessage::success(message.request_id, data))
            }
            Err(failure) => {
                tracing::debug!(
                    request_id = %message.request_id,
                    kind = %failure.error_kind,
                    "Job failed"
                );
                Ok(OutgoingMessage::error(
                    message.request_id,
                    ErrorResponse::from(failure),
                ))
            }
        }
    }

    fn success_data(&self, success: &ProcessSuccess) -> NativeMessagingResult<serde_json::Value> {
        let mut data = serde_json::to_value(success)?;
        if self.config.include_result_images {
            let encoded = success
                .result_paths
                .iter()
                .map(|path| images::encode_file(Path::new(path)))
                .collect::<std::io::Result<Vec<_>>>()?;
            data["resultImages"] = serde_json::json!(encoded);
        }
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parts(payload: Value) -> (ProcessRequest, Uploads) {
        serde_json::from_value::<ProcessPayload>(payload).unwrap().into_parts()
    }

    #[test]
    fn test_numbers_accept_strings() {
        let (request, _) = parts(json!({ "samples": "2", "scale": 2, "seed": " ", "steps": 10 }));
        assert_eq!(request.samples, Some(2));
        assert_eq!(request.scale, Some(2.0));
        assert_eq!(request.seed, None);
        assert_eq!(request.steps, Some(10));
        assert!(request.transport_errors.is_empty());
    }

    #[test]
    fn test_every_bad_field_is_recorded() {
        let (request, uploads) = parts(json!({
            "model_type": 3,
            "category": [1],
            "samples": "many",
            "steps": 2.5,
            "modelImage": "%%%",
        }));
        let fields: Vec<&str> = request
            .transport_errors
            .iter()
            .map(|e| e.field.as_str())
            .collect();
        assert_eq!(fields, vec!["profile", "category", "samples", "steps", "modelImage"]);
        assert!(uploads.model_image.is_none());
        assert!(uploads.cloth_image.is_none());
    }

    #[test]
    fn test_category_forms() {
        let (request, _) = parts(json!({ "category": "2" }));
        assert_eq!(request.category, Some(CategoryInput::Index(2)));
        let (request, _) = parts(json!({ "category": "dress" }));
        assert_eq!(request.category, Some(CategoryInput::Name("dress".into())));
        let (request, _) = parts(json!({ "category": 1 }));
        assert_eq!(request.category, Some(CategoryInput::Index(1)));
    }
}
