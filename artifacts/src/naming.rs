//! Filename sanitizing and unique naming.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Longest filename written to disk, in bytes.
pub const MAX_FILENAME_BYTES: usize = 255;

const RESERVED: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];
const FALLBACK_STEM: &str = "upload";

/// Replaces reserved and control characters with `_`, strips leading and
/// trailing dots and spaces, and caps the result at [`MAX_FILENAME_BYTES`]
/// while keeping the extension.
pub fn sanitize_filename(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| if RESERVED.contains(&c) || c.is_control() { '_' } else { c })
        .collect();
    let trimmed = replaced.trim_matches(|c| c == '.' || c == ' ');
    if trimmed.is_empty() {
        return FALLBACK_STEM.to_string();
    }

    let (stem, ext) = split_extension(trimmed);
    let stem = if stem.is_empty() { FALLBACK_STEM } else { stem };
    let budget = MAX_FILENAME_BYTES.saturating_sub(ext.len());
    format!("{}{}", truncate_bytes(stem, budget), ext)
}

/// Sanitized name with a random eight-character suffix before the extension.
pub fn unique_filename(name: &str) -> String {
    let sanitized = sanitize_filename(name);
    let (stem, ext) = split_extension(&sanitized);
    let suffix = short_id(8);
    let budget = MAX_FILENAME_BYTES.saturating_sub(ext.len() + suffix.len() + 1);
    format!("{}_{}{}", truncate_bytes(stem, budget), suffix, ext)
}

/// First `len` hex characters of a fresh v4 UUID.
pub fn short_id(len: usize) -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(len.min(32));
    id
}

/// Splits `name` into stem and extension (with its dot). Names whose only
/// dot is the first character have no extension.
fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) if idx > 0 => (&name[..idx], &name[idx..]),
        _ => (name, ""),
    }
}

fn truncate_bytes(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Name of one persisted output:
/// `result_<UTC %Y%m%d_%H%M%S>_<request id>_<sample index>.png`.
///
/// The request id keeps two requests started in the same second apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputName {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
    pub index: usize,
}

impl OutputName {
    pub fn new(request_id: impl Into<String>, timestamp: DateTime<Utc>, index: usize) -> Self {
        Self {
            request_id: request_id.into(),
            timestamp,
            index,
        }
    }

    pub fn file_name(&self) -> String {
        let id = sanitize_filename(&self.request_id);
        format!(
            "result_{}_{}_{}.png",
            self.timestamp.format("%Y%m%d_%H%M%S"),
            id,
            self.index
        )
    }
}
