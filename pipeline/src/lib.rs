//! TryOn Pipeline Crate
//!
//! Sequences one try-on request over the composed crates:
//! - **`validation`**: request and upload rules
//! - **`artifacts`**: upload materialization, output persistence, cleanup
//! - **`model-cache`**: per-profile stage handles
//!
//! This crate adds the stage wrapper ([`RunContext::run_stage`]), the
//! [`MaskCompositor`] and the [`PipelineOrchestrator`] that drives
//! `Validating -> Loading -> PoseEstimating -> Parsing -> Masking ->
//! Synthesizing -> Persisting`.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tryon_artifacts::ArtifactStore;
//! use tryon_model_cache::{DevicePolicy, ModelCache};
//! use tryon_pipeline::reference::{ReferenceModelFactory, ReferenceSegmenter};
//! use tryon_pipeline::{MaskCompositor, PipelineOrchestrator};
//! use tryon_validation::ValidationEngine;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(ArtifactStore::new("temp", "outputs")?);
//! let cache = Arc::new(ModelCache::new(
//!     Arc::new(ReferenceModelFactory),
//!     DevicePolicy::cpu_only(),
//! ));
//! let orchestrator = PipelineOrchestrator::new(
//!     ValidationEngine::default(),
//!     store,
//!     cache,
//!     MaskCompositor::new(Arc::new(ReferenceSegmenter)),
//! );
//! # let _ = orchestrator;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod mask;
pub mod orchestrator;
pub mod reference;
pub mod stage;

pub use error::{PipelineError, Result};
pub use mask::{MaskCompositor, MaskSegmenter};
pub use orchestrator::PipelineOrchestrator;
pub use stage::{RunContext, StageObserver, StageOutcome, TracingObserver};
