//! Mask computation and compositing.
//!
//! The raw garment region comes from an external [`MaskSegmenter`] at the
//! working resolution. [`MaskCompositor`] lifts it to the canonical frame with
//! nearest-neighbour sampling so edges stay hard, and builds the masked
//! composite by per-pixel selection.

use std::sync::Arc;

use image::imageops::{self, FilterType};
use image::{GrayImage, RgbImage};
use tryon_values::{
    Category, ImageAsset, Keypoints, Mask, ParseMap, Profile, CANONICAL_HEIGHT, CANONICAL_WIDTH,
};

use crate::error::{PipelineError, Result};

/// Region lookup over a parse map and keypoints.
///
/// `region` is one of `upper_body`, `lower_body` or `dresses`. The returned
/// mask must have the parse map's dimensions.
pub trait MaskSegmenter: Send + Sync {
    fn segment(
        &self,
        profile: Profile,
        region: &str,
        parse: &ParseMap,
        keypoints: &Keypoints,
    ) -> anyhow::Result<Mask>;
}

#[derive(Clone)]
pub struct MaskCompositor {
    segmenter: Arc<dyn MaskSegmenter>,
}

impl MaskCompositor {
    pub fn new(segmenter: Arc<dyn MaskSegmenter>) -> Self {
        Self { segmenter }
    }

    /// Garment mask at canonical resolution. Same inputs, same mask.
    pub fn compute_mask(
        &self,
        profile: Profile,
        category: Category,
        parse: &ParseMap,
        keypoints: &Keypoints,
    ) -> anyhow::Result<Mask> {
        let raw = self
            .segmenter
            .segment(profile, category.region(), parse, keypoints)?;

        let (width, height) = parse.dimensions();
        if raw.dimensions() != (width, height) {
            let (actual_width, actual_height) = raw.dimensions();
            return Err(PipelineError::MaskDimensions {
                actual_width,
                actual_height,
                expected_width: width,
                expected_height: height,
            }
            .into());
        }

        let mask: GrayImage =
            imageops::resize(raw.mask(), CANONICAL_WIDTH, CANONICAL_HEIGHT, FilterType::Nearest);
        let gray: RgbImage =
            imageops::resize(raw.gray(), CANONICAL_WIDTH, CANONICAL_HEIGHT, FilterType::Nearest);
        Ok(Mask::new(mask, gray).map_err(PipelineError::from)?)
    }

    /// `gray` where the mask is set, `source` elsewhere. Never blends.
    pub fn composite(&self, mask: &Mask, source: &ImageAsset) -> Result<ImageAsset> {
        let (width, height) = source.dimensions();
        if mask.dimensions() != (width, height) {
            let (mask_width, mask_height) = mask.dimensions();
            return Err(PipelineError::CompositeDimensions {
                mask_width,
                mask_height,
                width,
                height,
            });
        }

        let pixels = RgbImage::from_fn(width, height, |x, y| {
            if mask.is_set(x, y) {
                *mask.gray().get_pixel(x, y)
            } else {
                *source.pixels().get_pixel(x, y)
            }
        });
        Ok(ImageAsset::new(pixels))
    }
}
