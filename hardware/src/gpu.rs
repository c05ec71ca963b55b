/*!
GPU Detection

Enumerates CUDA-capable accelerators through `nvidia-smi` and falls back to
platform listings for display adapters that cannot run the pipeline.
*/

use serde::{Deserialize, Serialize};
use std::fmt;
use std::process::Command;

use crate::Result;

/// Environment variable that restricts which CUDA devices a process sees.
pub const CUDA_VISIBLE_DEVICES: &str = "CUDA_VISIBLE_DEVICES";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GpuVendor {
    Nvidia,
    Amd,
    Intel,
    Apple,
    Unknown,
}

impl fmt::Display for GpuVendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nvidia => write!(f, "NVIDIA"),
            Self::Amd => write!(f, "AMD"),
            Self::Intel => write!(f, "Intel"),
            Self::Apple => write!(f, "Apple"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpuInfo {
    /// CUDA ordinal for accelerators, `None` for adapters found by fallback.
    pub index: Option<u32>,
    pub vendor: GpuVendor,
    pub name: String,
    pub vram_mb: Option<u64>,
    pub driver_version: Option<String>,
}

impl GpuInfo {
    /// Whether the pipeline can place models on this device.
    pub fn is_accelerator(&self) -> bool {
        self.vendor == GpuVendor::Nvidia && self.index.is_some()
    }
}

/// Detect GPUs: CUDA devices first, platform listing if there are none.
pub fn detect_gpus() -> Result<Vec<GpuInfo>> {
    let visible = std::env::var(CUDA_VISIBLE_DEVICES).ok();
    let cuda = query_nvidia_smi()
        .map(|out| filter_visible(parse_nvidia_smi(&out), visible.as_deref()))
        .unwrap_or_default();
    if !cuda.is_empty() {
        return Ok(cuda);
    }

    #[cfg(target_os = "linux")]
    {
        crate::platform_linux::detect_display_adapters()
    }

    #[cfg(not(target_os = "linux"))]
    {
        Ok(Vec::new())
    }
}

/// Number of devices the pipeline can use.
pub fn accelerator_count(gpus: &[GpuInfo]) -> u32 {
    gpus.iter().filter(|g| g.is_accelerator()).count() as u32
}

fn query_nvidia_smi() -> Option<String> {
    let output = Command::new("nvidia-smi")
        .args([
            "--query-gpu=index,name,memory.total,driver_version",
            "--format=csv,noheader,nounits",
        ])
        .output()
        .ok()?;
    if !output.status.success() {
        tracing::debug!(status = %output.status, "nvidia-smi returned an error");
        return None;
    }
    Some(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Parses `index, name, memory.total, driver_version` CSV rows.
pub fn parse_nvidia_smi(stdout: &str) -> Vec<GpuInfo> {
    stdout
        .lines()
        .filter_map(|line| {
            let parts: Vec<&str> = line.split(',').map(|s| s.trim()).collect();
            if parts.len() < 4 {
                return None;
            }
            Some(GpuInfo {
                index: Some(parts[0].parse().ok()?),
                vendor: GpuVendor::Nvidia,
                name: parts[1].to_string(),
                vram_mb: parts[2].parse().ok(),
                driver_version: Some(parts[3].to_string()).filter(|v| !v.is_empty()),
            })
        })
        .collect()
}

/// Applies a `CUDA_VISIBLE_DEVICES` value and renumbers the survivors the way
/// the CUDA runtime does. An empty value or `-1` hides every device.
pub fn filter_visible(gpus: Vec<GpuInfo>, visible: Option<&str>) -> Vec<GpuInfo> {
    let Some(visible) = visible.map(str::trim) else {
        return gpus;
    };
    if visible.is_empty() || visible == "-1" {
        return Vec::new();
    }

    let mut selected = Vec::new();
    for token in visible.split(',').map(str::trim) {
        let Ok(wanted) = token.parse::<u32>() else {
            // CUDA stops at the first entry it cannot parse.
            break;
        };
        if let Some(gpu) = gpus.iter().find(|g| g.index == Some(wanted)) {
            selected.push(gpu.clone());
        }
    }
    for (ordinal, gpu) in selected.iter_mut().enumerate() {
        gpu.index = Some(ordinal as u32);
    }
    selected
}
