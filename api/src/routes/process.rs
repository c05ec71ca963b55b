//! Try-on submission.
//!
//! Reads the multipart form into a [`ProcessRequest`] plus [`Uploads`] and
//! hands both to the backend. Field names follow the browser form
//! (`model_file`, `cloth_file`, `model_type`); the canonical JSON names are
//! accepted as well.

use axum::{
    extract::{
        multipart::{Field, MultipartError, MultipartRejection},
        Multipart, State,
    },
    Json,
};
use tryon_values::{
    CategoryInput, ErrorKind, FieldError, ProcessFailure, ProcessRequest, ProcessSuccess,
    UploadedImage, Uploads,
};
use utoipa::ToSchema;

use crate::error::ApiResult;
use crate::SharedState;

/// Multipart form accepted by `/process` and `/tryon`. Documentation only.
#[derive(ToSchema)]
#[allow(dead_code)]
pub struct ProcessForm {
    /// Photo of the person.
    #[schema(value_type = String, format = Binary)]
    model_file: Vec<u8>,
    /// Photo of the garment.
    #[schema(value_type = String, format = Binary)]
    cloth_file: Vec<u8>,
    /// `hd` (default) or `dc`.
    model_type: Option<String>,
    /// `0`/`upper`, `1`/`lower`, `2`/`dress`.
    category: Option<String>,
    samples: Option<i64>,
    steps: Option<i64>,
    scale: Option<f64>,
    /// `-1` picks a random seed.
    seed: Option<i64>,
}

/// Run one try-on request.
#[utoipa::path(
    post,
    path = "/process",
    request_body(content = ProcessForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Results persisted", body = ProcessSuccess),
        (status = 400, description = "Validation failed", body = ProcessFailure),
        (status = 500, description = "Processing failed", body = ProcessFailure),
        (status = 503, description = "Models or resources unavailable", body = ProcessFailure),
    ),
    tag = "Try-on"
)]
pub async fn process(
    State(state): State<SharedState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<ProcessSuccess>> {
    let multipart = multipart.map_err(|rejection| {
        ProcessFailure::new(ErrorKind::Validation, rejection.body_text())
    })?;
    let (request, uploads) = read_form(multipart).await?;

    tracing::debug!(
        profile = request.profile.as_deref().unwrap_or("default"),
        model_bytes = uploads.model_image.as_ref().map_or(0, UploadedImage::len),
        cloth_bytes = uploads.cloth_image.as_ref().map_or(0, UploadedImage::len),
        "Try-on request received"
    );

    let success = state.process(request, uploads).await?;
    Ok(Json(success))
}

async fn read_form(mut multipart: Multipart) -> Result<(ProcessRequest, Uploads), ProcessFailure> {
    let mut request = ProcessRequest::default();
    let mut uploads = Uploads::default();
    let mut problems = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(malformed)? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        match name.as_str() {
            "model_file" | "modelImage" => uploads.model_image = read_upload(field).await?,
            "cloth_file" | "clothImage" => uploads.cloth_image = read_upload(field).await?,
            "model_type" | "profile" => request.profile = Some(read_text(field).await?),
            "category" => {
                request.category = Some(CategoryInput::from_text(&read_text(field).await?))
            }
            "samples" => request.samples = parse_number(&name, &read_text(field).await?, &mut problems),
            "steps" => request.steps = parse_number(&name, &read_text(field).await?, &mut problems),
            "seed" => request.seed = parse_number(&name, &read_text(field).await?, &mut problems),
            "scale" => request.scale = parse_number(&name, &read_text(field).await?, &mut problems),
            other => tracing::debug!(field = other, "Ignoring unknown form field"),
        }
    }

    request.transport_errors = problems;
    Ok((request, uploads))
}

/// Browsers send an empty part when no file was chosen; that counts as
/// missing.
async fn read_upload(field: Field<'_>) -> Result<Option<UploadedImage>, ProcessFailure> {
    let filename = field.file_name().unwrap_or_default().to_string();
    let content_type = field.content_type().map(str::to_string);
    let bytes = field.bytes().await.map_err(malformed)?;
    if filename.is_empty() && bytes.is_empty() {
        return Ok(None);
    }
    Ok(Some(UploadedImage::new(filename, content_type, bytes.to_vec())))
}

async fn read_text(field: Field<'_>) -> Result<String, ProcessFailure> {
    field.text().await.map_err(malformed)
}

/// Blank means "use the default".
fn parse_number<T: std::str::FromStr>(
    field: &str,
    text: &str,
    problems: &mut Vec<FieldError>,
) -> Option<T> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    match text.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            problems.push(FieldError::new(field, format!("'{}' is not a number", text)));
            None
        }
    }
}

fn malformed(err: MultipartError) -> ProcessFailure {
    tracing::debug!(error = %err, status = %err.status(), "Malformed multipart body");
    ProcessFailure::new(ErrorKind::Validation, err.body_text())
}
