//! Call contracts for the opaque model stages.
//!
//! Implementations are blocking and are shared read-only across concurrent
//! requests once constructed, hence `Send + Sync` and `&self` receivers.

use tryon_values::{Category, ImageAsset, Keypoints, Mask, ParseMap, Profile};

/// Body keypoints from a working-resolution image.
pub trait PoseEstimator: Send + Sync {
    fn estimate(&self, image: &ImageAsset) -> anyhow::Result<Keypoints>;
}

/// Per-pixel semantic labels from a working-resolution image.
pub trait HumanParser: Send + Sync {
    fn parse(&self, image: &ImageAsset) -> anyhow::Result<ParseMap>;
}

/// Everything the generator sees for one request.
pub struct SynthesisInput<'a> {
    pub profile: Profile,
    pub category: Category,
    pub garment: &'a ImageAsset,
    pub masked: &'a ImageAsset,
    pub mask: &'a Mask,
    pub original: &'a ImageAsset,
    pub samples: u32,
    pub steps: u32,
    pub scale: f64,
    pub seed: i64,
}

impl SynthesisInput<'_> {
    /// Category label in the generator's vocabulary.
    pub fn category_name(&self) -> &'static str {
        self.category.synth_name()
    }
}

/// Generative synthesizer. Expected to return exactly `input.samples` images.
pub trait Synthesizer: Send + Sync {
    fn synthesize(&self, input: &SynthesisInput<'_>) -> anyhow::Result<Vec<ImageAsset>>;
}
