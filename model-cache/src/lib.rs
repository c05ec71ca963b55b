//! Model registry for the try-on pipeline.
//!
//! - [`ModelCache`]: one lazily constructed [`ModelHandle`] per profile
//! - [`DevicePolicy`]: accelerator placement with CPU fallback
//! - [`ModelFactory`]: seam where real or test backends are plugged in
//! - [`check_checkpoints`]: startup presence check for weight directories

pub mod cache;
pub mod checkpoints;
pub mod device;
pub mod error;
pub mod handle;
pub mod stages;

pub use cache::{ModelCache, ProfileState};
pub use checkpoints::{check_checkpoints, REQUIRED_CHECKPOINTS};
pub use device::{BuildOptions, Device, DevicePolicy, DeviceSetting, Precision};
pub use error::{ModelCacheError, Result};
pub use handle::{ModelFactory, ModelHandle};
pub use stages::{HumanParser, PoseEstimator, SynthesisInput, Synthesizer};
