//! Device placement.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use tryon_values::Profile;

use crate::error::ModelCacheError;

/// Where a profile's models run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Device {
    Cuda(u32),
    Cpu,
}

impl Device {
    pub fn is_accelerator(&self) -> bool {
        matches!(self, Self::Cuda(_))
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cuda(index) => write!(f, "cuda:{}", index),
            Self::Cpu => write!(f, "cpu"),
        }
    }
}

/// Device requested by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeviceSetting {
    /// First accelerator if any, CPU otherwise.
    #[default]
    Auto,
    /// Never use an accelerator.
    Cpu,
    /// Pin the primary profile to this ordinal.
    Cuda(u32),
}

impl FromStr for DeviceSetting {
    type Err = ModelCacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        match lower.as_str() {
            "" | "auto" => Ok(Self::Auto),
            "cpu" => Ok(Self::Cpu),
            "cuda" | "gpu" => Ok(Self::Cuda(0)),
            other => other
                .strip_prefix("cuda:")
                .and_then(|index| index.parse().ok())
                .map(Self::Cuda)
                .ok_or_else(|| ModelCacheError::InvalidDevice(s.to_string())),
        }
    }
}

impl fmt::Display for DeviceSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Cpu => write!(f, "cpu"),
            Self::Cuda(index) => write!(f, "cuda:{}", index),
        }
    }
}

/// Numeric precision for model weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    #[default]
    Float16,
    Float32,
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Float16 => write!(f, "float16"),
            Self::Float32 => write!(f, "float32"),
        }
    }
}

/// Placement handed to a [`crate::ModelFactory`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildOptions {
    pub device: Device,
    pub precision: Precision,
}

/// Decides which device each profile is built on.
///
/// `hd` takes the primary device. `dc` takes the next accelerator when one
/// exists and shares the primary otherwise. Without accelerators both build
/// on CPU in `float32`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DevicePolicy {
    setting: DeviceSetting,
    accelerator_count: u32,
    precision: Precision,
}

impl DevicePolicy {
    pub fn new(setting: DeviceSetting, accelerator_count: u32, precision: Precision) -> Self {
        Self {
            setting,
            accelerator_count,
            precision,
        }
    }

    pub fn cpu_only() -> Self {
        Self::new(DeviceSetting::Cpu, 0, Precision::Float32)
    }

    pub fn accelerator_count(&self) -> u32 {
        self.accelerator_count
    }

    fn primary(&self) -> Option<u32> {
        match self.setting {
            DeviceSetting::Cpu => None,
            _ if self.accelerator_count == 0 => None,
            DeviceSetting::Auto => Some(0),
            DeviceSetting::Cuda(index) if index < self.accelerator_count => Some(index),
            DeviceSetting::Cuda(index) => {
                tracing::warn!(
                    requested = index,
                    available = self.accelerator_count,
                    "Requested accelerator does not exist, using cuda:0"
                );
                Some(0)
            }
        }
    }

    pub fn device_for(&self, profile: Profile) -> Device {
        let Some(primary) = self.primary() else {
            return Device::Cpu;
        };
        match profile {
            Profile::Hd => Device::Cuda(primary),
            Profile::Dc if primary + 1 < self.accelerator_count => Device::Cuda(primary + 1),
            Profile::Dc => Device::Cuda(primary),
        }
    }

    pub fn options_for(&self, profile: Profile) -> BuildOptions {
        let device = self.device_for(profile);
        let precision = if device.is_accelerator() {
            self.precision
        } else {
            Precision::Float32
        };
        BuildOptions { device, precision }
    }
}
