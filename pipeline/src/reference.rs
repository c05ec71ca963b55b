//! Reference stage backend.
//!
//! Lightweight deterministic stand-ins for the pose estimator, the human
//! parser, the segmenter and the synthesizer. They follow the real call
//! contracts (shapes, label vocabulary, sample counts) without any learned
//! weights, which makes them suitable for dry runs and tests. Real backends
//! plug in through [`ModelFactory`].

use image::{GrayImage, Luma, Rgb, RgbImage};
use tryon_model_cache::{
    BuildOptions, HumanParser, ModelFactory, ModelHandle, PoseEstimator, SynthesisInput,
    Synthesizer,
};
use tryon_values::{ImageAsset, Keypoint, Keypoints, Mask, ParseMap, Profile};

use crate::mask::MaskSegmenter;

/// Parse labels produced by [`ReferenceParser`].
pub mod labels {
    pub const BACKGROUND: u8 = 0;
    pub const HAIR: u8 = 2;
    pub const UPPER_CLOTHES: u8 = 4;
    pub const SKIRT: u8 = 5;
    pub const PANTS: u8 = 6;
    pub const DRESS: u8 = 7;
    pub const FACE: u8 = 11;
    pub const LEFT_LEG: u8 = 12;
    pub const RIGHT_LEG: u8 = 13;
    pub const LEFT_ARM: u8 = 14;
    pub const RIGHT_ARM: u8 = 15;
}

/// Fill used inside the mask.
pub const MASK_FILL: [u8; 3] = [127, 127, 127];

/// Relative body layout for an upright, centred subject. `(x, y)` as
/// fractions of the frame, OpenPose-18 order.
const BODY_LAYOUT: [(f32, f32); 18] = [
    (0.50, 0.10), // nose
    (0.50, 0.20), // neck
    (0.35, 0.21), // right shoulder
    (0.30, 0.36), // right elbow
    (0.28, 0.50), // right wrist
    (0.65, 0.21), // left shoulder
    (0.70, 0.36), // left elbow
    (0.72, 0.50), // left wrist
    (0.42, 0.52), // right hip
    (0.42, 0.71), // right knee
    (0.42, 0.90), // right ankle
    (0.58, 0.52), // left hip
    (0.58, 0.71), // left knee
    (0.58, 0.90), // left ankle
    (0.47, 0.08), // right eye
    (0.53, 0.08), // left eye
    (0.44, 0.09), // right ear
    (0.56, 0.09), // left ear
];

/// Places the 18 body keypoints of a centred upright subject.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReferencePoseEstimator;

impl PoseEstimator for ReferencePoseEstimator {
    fn estimate(&self, image: &ImageAsset) -> anyhow::Result<Keypoints> {
        let (w, h) = image.dimensions();
        anyhow::ensure!(w > 0 && h > 0, "cannot estimate pose on an empty image");
        let points = BODY_LAYOUT
            .iter()
            .map(|&(fx, fy)| Keypoint {
                x: fx * w as f32,
                y: fy * h as f32,
                confidence: 1.0,
            })
            .collect();
        Ok(Keypoints::new(points))
    }
}

/// Labels the frame by vertical band, treating near-white pixels as
/// background.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReferenceParser;

impl ReferenceParser {
    fn label(x: u32, y: u32, w: u32, h: u32, pixel: &Rgb<u8>) -> u8 {
        if pixel.0.iter().all(|&c| c >= 240) {
            return labels::BACKGROUND;
        }
        let fy = y as f32 / h as f32;
        let fx = x as f32 / w as f32;
        match fy {
            fy if fy < 0.05 => labels::HAIR,
            fy if fy < 0.18 => labels::FACE,
            fy if fy < 0.52 && !(0.30..0.70).contains(&fx) => {
                if fx < 0.5 {
                    labels::RIGHT_ARM
                } else {
                    labels::LEFT_ARM
                }
            }
            fy if fy < 0.52 => labels::UPPER_CLOTHES,
            fy if fy < 0.85 => labels::PANTS,
            _ if fx < 0.5 => labels::RIGHT_LEG,
            _ => labels::LEFT_LEG,
        }
    }
}

impl HumanParser for ReferenceParser {
    fn parse(&self, image: &ImageAsset) -> anyhow::Result<ParseMap> {
        let (w, h) = image.dimensions();
        anyhow::ensure!(w > 0 && h > 0, "cannot parse an empty image");
        let pixels = image.pixels();
        let labels = GrayImage::from_fn(w, h, |x, y| {
            Luma([Self::label(x, y, w, h, pixels.get_pixel(x, y))])
        });
        Ok(ParseMap::new(labels))
    }
}

/// Selects the parse labels belonging to the requested region.
///
/// `dc` also covers the arms for upper-body garments so sleeves can be
/// regenerated; `hd` keeps them.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReferenceSegmenter;

impl ReferenceSegmenter {
    fn region_labels(profile: Profile, region: &str) -> anyhow::Result<&'static [u8]> {
        use labels::*;
        let selected: &'static [u8] = match (profile, region) {
            (Profile::Hd, "upper_body") => &[UPPER_CLOTHES, DRESS],
            (Profile::Dc, "upper_body") => &[UPPER_CLOTHES, DRESS, LEFT_ARM, RIGHT_ARM],
            (_, "lower_body") => &[PANTS, SKIRT, LEFT_LEG, RIGHT_LEG],
            (_, "dresses") => &[UPPER_CLOTHES, PANTS, SKIRT, DRESS, LEFT_LEG, RIGHT_LEG],
            (_, other) => anyhow::bail!("unknown mask region '{other}'"),
        };
        Ok(selected)
    }
}

impl MaskSegmenter for ReferenceSegmenter {
    fn segment(
        &self,
        profile: Profile,
        region: &str,
        parse: &ParseMap,
        _keypoints: &Keypoints,
    ) -> anyhow::Result<Mask> {
        let selected = Self::region_labels(profile, region)?;
        let (w, h) = parse.dimensions();
        let mask = GrayImage::from_fn(w, h, |x, y| {
            Luma([if selected.contains(&parse.label_at(x, y)) { 255 } else { 0 }])
        });
        Ok(Mask::with_fill(mask, MASK_FILL))
    }
}

/// Paints the garment into the masked region.
///
/// Each sample gets a small seed-dependent tint so samples are
/// distinguishable; a seed of `-1` behaves like `0`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReferenceSynthesizer;

impl Synthesizer for ReferenceSynthesizer {
    fn synthesize(&self, input: &SynthesisInput<'_>) -> anyhow::Result<Vec<ImageAsset>> {
        let (w, h) = input.masked.dimensions();
        anyhow::ensure!(
            input.mask.dimensions() == (w, h) && input.garment.dimensions() == (w, h),
            "synthesis inputs must share one frame"
        );
        let base_seed = input.seed.max(0) as u64;

        let outputs = (0..input.samples)
            .map(|sample| {
                let tint = ((base_seed + sample as u64 * 37) % 24) as u8;
                let pixels = RgbImage::from_fn(w, h, |x, y| {
                    if input.mask.is_set(x, y) {
                        let Rgb([r, g, b]) = *input.garment.pixels().get_pixel(x, y);
                        Rgb([r.saturating_add(tint), g, b.saturating_sub(tint)])
                    } else {
                        *input.original.pixels().get_pixel(x, y)
                    }
                });
                ImageAsset::new(pixels)
            })
            .collect();
        Ok(outputs)
    }
}

/// Builds handles made of the reference stages.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReferenceModelFactory;

impl ModelFactory for ReferenceModelFactory {
    fn build(&self, profile: Profile, options: &BuildOptions) -> anyhow::Result<ModelHandle> {
        tracing::info!(
            profile = %profile,
            device = %options.device,
            "Building reference stage backend"
        );
        Ok(ModelHandle {
            profile,
            device: options.device,
            precision: options.precision,
            pose: Box::new(ReferencePoseEstimator),
            parser: Box::new(ReferenceParser),
            synthesizer: Box::new(ReferenceSynthesizer),
        })
    }
}
