//! Image payload encoding.
//!
//! Jobs carry images either as bare base64 or as `data:` URLs. Bare base64
//! has no declared media type, so the format is sniffed from the bytes.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::ImageFormat;
use tryon_values::UploadedImage;

use crate::error::{NativeMessagingError, NativeMessagingResult};

/// Decodes one image field into an upload named after the field.
pub fn decode_image(field: &str, value: &str) -> NativeMessagingResult<UploadedImage> {
    let value = value.trim();
    let (declared, encoded) = match value.strip_prefix("data:") {
        Some(rest) => {
            let (header, data) = rest.split_once(',').ok_or_else(|| {
                NativeMessagingError::validation(field, "data URL has no payload")
            })?;
            let media_type = header.strip_suffix(";base64").ok_or_else(|| {
                NativeMessagingError::validation(field, "data URL must be base64 encoded")
            })?;
            (Some(media_type.to_ascii_lowercase()), data)
        }
        None => (None, value),
    };

    let bytes = STANDARD
        .decode(encoded)
        .map_err(|e| NativeMessagingError::validation(field, format!("invalid base64: {}", e)))?;

    let media_type = declared.or_else(|| {
        image::guess_format(&bytes)
            .ok()
            .map(|format| format.to_mime_type().to_string())
    });
    let filename = match media_type.as_deref().and_then(ImageFormat::from_mime_type) {
        Some(format) => match format.extensions_str().first() {
            Some(ext) => format!("{}.{}", field, ext),
            None => field.to_string(),
        },
        None => field.to_string(),
    };

    Ok(UploadedImage::new(filename, media_type, bytes))
}

/// Base64 of a persisted result file.
pub fn encode_file(path: &std::path::Path) -> std::io::Result<String> {
    Ok(STANDARD.encode(std::fs::read(path)?))
}
