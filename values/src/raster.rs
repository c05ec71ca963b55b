//! Raster types passed between pipeline stages.
//!
//! Every transformation returns a new value; nothing here mutates an image
//! that another stage might still hold.

use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage};

use crate::error::{ValueError, ValueResult};

/// Canonical frame used for masking, compositing and synthesis.
pub const CANONICAL_WIDTH: u32 = 768;
pub const CANONICAL_HEIGHT: u32 = 1024;

/// Reduced frame used only for pose estimation and parsing.
pub const WORKING_WIDTH: u32 = 384;
pub const WORKING_HEIGHT: u32 = 512;

/// Decoded RGB raster.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageAsset {
    pixels: RgbImage,
}

impl ImageAsset {
    pub fn new(pixels: RgbImage) -> Self {
        Self { pixels }
    }

    pub fn from_dynamic(image: DynamicImage) -> Self {
        Self {
            pixels: image.to_rgb8(),
        }
    }

    pub fn open(path: &std::path::Path) -> ValueResult<Self> {
        Ok(Self::from_dynamic(image::open(path)?))
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    pub fn pixels(&self) -> &RgbImage {
        &self.pixels
    }

    /// Exact resize to `width`x`height`. Aspect ratio is not preserved.
    pub fn resized(&self, width: u32, height: u32, filter: FilterType) -> Self {
        Self {
            pixels: image::imageops::resize(&self.pixels, width, height, filter),
        }
    }

    pub fn to_canonical(&self) -> Self {
        self.resized(CANONICAL_WIDTH, CANONICAL_HEIGHT, FilterType::Lanczos3)
    }

    pub fn to_working(&self) -> Self {
        self.resized(WORKING_WIDTH, WORKING_HEIGHT, FilterType::Lanczos3)
    }
}

/// One body keypoint in working-resolution pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
    pub confidence: f32,
}

/// Pose estimator output.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Keypoints {
    pub points: Vec<Keypoint>,
}

impl Keypoints {
    pub fn new(points: Vec<Keypoint>) -> Self {
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Per-pixel semantic labels from the human parser at working resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseMap {
    labels: GrayImage,
}

impl ParseMap {
    pub fn new(labels: GrayImage) -> Self {
        Self { labels }
    }

    pub fn labels(&self) -> &GrayImage {
        &self.labels
    }

    pub fn label_at(&self, x: u32, y: u32) -> u8 {
        self.labels.get_pixel(x, y).0[0]
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.labels.dimensions()
    }
}

/// Binary garment mask plus the gray fill shown inside it.
///
/// `mask` holds 0 outside the region and 255 inside; `gray` carries the fill
/// colour at every masked pixel and black elsewhere.
#[derive(Debug, Clone, PartialEq)]
pub struct Mask {
    mask: GrayImage,
    gray: RgbImage,
}

impl Mask {
    pub fn new(mask: GrayImage, gray: RgbImage) -> ValueResult<Self> {
        if mask.dimensions() != gray.dimensions() {
            return Err(ValueError::DimensionMismatch {
                width: gray.width(),
                height: gray.height(),
                expected_width: mask.width(),
                expected_height: mask.height(),
            });
        }
        Ok(Self { mask, gray })
    }

    /// Builds the gray variant from a binary mask using a constant fill.
    pub fn with_fill(mask: GrayImage, fill: [u8; 3]) -> Self {
        let gray = RgbImage::from_fn(mask.width(), mask.height(), |x, y| {
            if mask.get_pixel(x, y).0[0] != 0 {
                Rgb(fill)
            } else {
                Rgb([0, 0, 0])
            }
        });
        Self { mask, gray }
    }

    pub fn mask(&self) -> &GrayImage {
        &self.mask
    }

    pub fn gray(&self) -> &RgbImage {
        &self.gray
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.mask.dimensions()
    }

    pub fn is_set(&self, x: u32, y: u32) -> bool {
        self.mask.get_pixel(x, y).0[0] != 0
    }

    pub fn covered_pixels(&self) -> usize {
        self.mask.pixels().filter(|p| **p != Luma([0])).count()
    }
}
