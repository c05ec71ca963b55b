use std::fmt;

use tryon_values::Profile;

use crate::device::{BuildOptions, Device, Precision};
use crate::stages::{HumanParser, PoseEstimator, Synthesizer};

/// The three models of one profile, bound to one device.
pub struct ModelHandle {
    pub profile: Profile,
    pub device: Device,
    pub precision: Precision,
    pub pose: Box<dyn PoseEstimator>,
    pub parser: Box<dyn HumanParser>,
    pub synthesizer: Box<dyn Synthesizer>,
}

impl fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelHandle")
            .field("profile", &self.profile)
            .field("device", &self.device)
            .field("precision", &self.precision)
            .finish_non_exhaustive()
    }
}

/// Builds a profile's models. Construction may take minutes; it is called
/// at most once per profile unless an earlier attempt failed.
pub trait ModelFactory: Send + Sync + 'static {
    fn build(&self, profile: Profile, options: &BuildOptions) -> anyhow::Result<ModelHandle>;
}
