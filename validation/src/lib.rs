//! Request validation.
//!
//! [`ValidationEngine::validate`] turns a raw [`tryon_values::ProcessRequest`]
//! plus its uploads into a [`tryon_values::CanonicalRequest`], or returns every
//! field that was rejected. It has no side effects; the only input besides
//! the request is an immutable [`ValidationConfig`] snapshot.

mod config;
mod engine;

pub use config::ValidationConfig;
pub use engine::{ValidationEngine, FIELD_CLOTH_IMAGE, FIELD_MODEL_IMAGE};
