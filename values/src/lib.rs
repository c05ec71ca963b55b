//! # TryOn Values
//!
//! Types shared by every crate in the workspace:
//! - **Enums**: [`Profile`], [`Category`], [`Stage`], [`ErrorKind`]
//! - **Requests**: raw [`ProcessRequest`] and validated [`CanonicalRequest`]
//! - **Rasters**: [`ImageAsset`], [`Keypoints`], [`ParseMap`], [`Mask`]
//! - **Responses**: success/failure bodies, health, error summaries
//!
//! The untyped category form ([`CategoryInput`]) exists only on
//! [`ProcessRequest`]; everything after validation sees [`Category`].

pub mod error;
pub mod raster;
pub mod request;
pub mod response;
pub mod types;

pub use error::{ValueError, ValueResult};
pub use raster::{
    ImageAsset, Keypoint, Keypoints, Mask, ParseMap, CANONICAL_HEIGHT, CANONICAL_WIDTH,
    WORKING_HEIGHT, WORKING_WIDTH,
};
pub use request::{
    CanonicalRequest, FieldError, ProcessRequest, UploadedImage, Uploads, MAX_SAMPLES_LIMIT,
    MAX_SEED, MAX_STEPS_LIMIT,
};
pub use response::{
    ErrorRecord, ErrorSummary, HealthResponse, HealthStatus, PipelineResult, ProcessFailure,
    ProcessSuccess, ProfileStatus, ServiceInfo, StageTiming,
};
pub use types::{Category, CategoryInput, ErrorKind, PipelineState, Profile, Stage};
