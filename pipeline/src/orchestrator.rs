//! Request sequencing.
//!
//! ```text
//! Validating -> Loading -> PoseEstimating -> Parsing -> Masking
//!            -> Synthesizing -> Persisting -> Done
//!        \__________________ any failure __________________/-> Errored
//! ```
//!
//! Every stage runs through [`RunContext::run_stage`]. Uploads are written to
//! disk only after validation passes and live in an [`ArtifactScope`] that
//! removes them however the run ends.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use common::{StageFailure, TryOnError};
use tryon_artifacts::{ArtifactScope, ArtifactStore, OutputName};
use tryon_model_cache::{ModelCache, ModelHandle, SynthesisInput};
use tryon_validation::ValidationEngine;
use tryon_values::{
    CanonicalRequest, ImageAsset, PipelineResult, ProcessRequest, Stage, UploadedImage, Uploads,
};

use crate::error::PipelineError;
use crate::mask::MaskCompositor;
use crate::stage::{RunContext, StageObserver, TracingObserver};

/// Decoded inputs after `Loading`.
struct LoadedInputs {
    model: ImageAsset,
    cloth: ImageAsset,
    model_working: ImageAsset,
    handle: Arc<ModelHandle>,
}

pub struct PipelineOrchestrator {
    validation: ValidationEngine,
    store: Arc<ArtifactStore>,
    cache: Arc<ModelCache>,
    compositor: MaskCompositor,
    observer: Arc<dyn StageObserver>,
}

impl PipelineOrchestrator {
    pub fn new(
        validation: ValidationEngine,
        store: Arc<ArtifactStore>,
        cache: Arc<ModelCache>,
        compositor: MaskCompositor,
    ) -> Self {
        Self {
            validation,
            store,
            cache,
            compositor,
            observer: Arc::new(TracingObserver),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn StageObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn store(&self) -> &Arc<ArtifactStore> {
        &self.store
    }

    pub fn cache(&self) -> &Arc<ModelCache> {
        &self.cache
    }

    /// Runs one request end to end. Blocking.
    pub fn run(
        &self,
        request_id: &str,
        request: &ProcessRequest,
        uploads: &Uploads,
    ) -> Result<PipelineResult, StageFailure> {
        let mut ctx = RunContext::new(request_id, self.observer.as_ref());

        let canonical = ctx.run_stage(Stage::Validating, || {
            self.validation
                .validate(request, uploads)
                .map_err(|errors| TryOnError::validation(errors).into())
        })?;

        let mut scope = self.store.scope();
        let inputs = ctx.run_stage(Stage::Loading, || {
            self.load(&canonical, uploads, &mut scope)
        })?;

        let keypoints = ctx.run_stage(Stage::PoseEstimating, || {
            inputs.handle.pose.estimate(&inputs.model_working)
        })?;

        let parse = ctx.run_stage(Stage::Parsing, || {
            inputs.handle.parser.parse(&inputs.model_working)
        })?;

        let (mask, masked) = ctx.run_stage(Stage::Masking, || {
            let mask = self.compositor.compute_mask(
                canonical.profile(),
                canonical.category(),
                &parse,
                &keypoints,
            )?;
            let masked = self.compositor.composite(&mask, &inputs.model)?;
            Ok((mask, masked))
        })?;

        let outputs = ctx.run_stage(Stage::Synthesizing, || {
            let input = SynthesisInput {
                profile: canonical.profile(),
                category: canonical.category(),
                garment: &inputs.cloth,
                masked: &masked,
                mask: &mask,
                original: &inputs.model,
                samples: canonical.samples(),
                steps: canonical.steps(),
                scale: canonical.scale(),
                seed: canonical.seed(),
            };
            let outputs = inputs.handle.synthesizer.synthesize(&input)?;
            if outputs.len() != canonical.samples() as usize {
                return Err(PipelineError::SampleCount {
                    expected: canonical.samples(),
                    actual: outputs.len(),
                }
                .into());
            }
            Ok(outputs)
        })?;

        let output_paths = ctx.run_stage(Stage::Persisting, || {
            self.persist_all(request_id, &outputs)
        })?;

        drop(scope);
        let (timings, elapsed) = ctx.finish();
        tracing::info!(
            request_id,
            profile = %canonical.profile(),
            category = %canonical.category(),
            outputs = output_paths.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Request completed"
        );

        Ok(PipelineResult {
            request_id: request_id.to_string(),
            request: canonical,
            output_paths,
            timings,
            elapsed,
        })
    }

    fn load(
        &self,
        request: &CanonicalRequest,
        uploads: &Uploads,
        scope: &mut ArtifactScope<'_>,
    ) -> anyhow::Result<LoadedInputs> {
        let model = load_upload(scope, uploads.model_image.as_ref(), "model image")?;
        let cloth = load_upload(scope, uploads.cloth_image.as_ref(), "cloth image")?;

        let model = model.to_canonical();
        let cloth = cloth.to_canonical();
        let model_working = model.to_working();

        let handle = self.cache.acquire(request.profile()).map_err(TryOnError::from)?;
        Ok(LoadedInputs {
            model,
            cloth,
            model_working,
            handle,
        })
    }

    /// Writes outputs in order. On failure removes whatever was already
    /// written so no partial result set survives.
    fn persist_all(&self, request_id: &str, outputs: &[ImageAsset]) -> anyhow::Result<Vec<PathBuf>> {
        let timestamp = Utc::now();
        let mut written = Vec::with_capacity(outputs.len());
        for (index, output) in outputs.iter().enumerate() {
            let name = OutputName::new(request_id, timestamp, index);
            match self.store.persist(output, &name) {
                Ok(path) => written.push(path),
                Err(err) => {
                    self.store.release(&written);
                    return Err(TryOnError::from(err).into());
                }
            }
        }
        Ok(written)
    }
}

/// Materializes one upload inside the scope and decodes it back from disk.
fn load_upload(
    scope: &mut ArtifactScope<'_>,
    upload: Option<&UploadedImage>,
    what: &str,
) -> anyhow::Result<ImageAsset> {
    let upload = upload.ok_or_else(|| anyhow::anyhow!("{what} missing after validation"))?;
    let path = scope
        .materialize(&mut upload.bytes.as_slice(), &upload.filename)
        .map_err(TryOnError::from)?;
    let asset = ImageAsset::open(&path)
        .map_err(|e| anyhow::anyhow!("failed to decode {what}: {e}"))?;
    Ok(asset)
}
