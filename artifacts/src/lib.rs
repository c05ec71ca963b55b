//! Ephemeral-artifact lifecycle.
//!
//! Uploads are materialized into a process-owned temp area under sanitized,
//! collision-resistant names and are removed when the request's
//! [`ArtifactScope`] drops. Outputs are persisted into the results area and
//! kept.

mod error;
mod naming;
mod store;

pub use error::{ArtifactError, Result};
pub use naming::{sanitize_filename, short_id, unique_filename, OutputName, MAX_FILENAME_BYTES};
pub use store::{ArtifactScope, ArtifactStore, PROCESSED_DIR, RESULTS_DIR, UPLOADS_DIR};
