/*!
# TryOn Hardware Detection

Finds the accelerators models can be placed on and describes the host for
startup logs and health reports.

```rust,no_run
use tryon_hardware::detect_system;

let system = detect_system().expect("hardware detection");
println!("{} usable accelerator(s)", system.accelerator_count);
```
*/

use serde::{Deserialize, Serialize};
use sysinfo::System;
use thiserror::Error;

mod gpu;
mod memory;

#[cfg(target_os = "linux")]
mod platform_linux;

pub use gpu::{
    accelerator_count, detect_gpus, filter_visible, parse_nvidia_smi, GpuInfo, GpuVendor,
    CUDA_VISIBLE_DEVICES,
};
pub use memory::{detect_memory, total_vram_mb, MemoryInfo};

#[derive(Debug, Error)]
pub enum HardwareError {
    #[error("Failed to detect GPU: {0}")]
    GpuDetection(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HardwareError>;

/// Host hardware summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemInfo {
    pub gpus: Vec<GpuInfo>,
    pub memory: MemoryInfo,
    pub os: OsInfo,
    pub cpu_count: usize,
    pub accelerator_count: u32,
    pub total_vram_mb: u64,
}

impl SystemInfo {
    pub fn has_accelerator(&self) -> bool {
        self.accelerator_count > 0
    }
}

/// Operating system information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OsInfo {
    pub name: String,
    pub version: String,
    pub arch: String,
}

impl OsInfo {
    pub fn detect() -> Self {
        let version = System::long_os_version()
            .or_else(System::os_version)
            .unwrap_or_else(|| "unknown".to_string());

        Self {
            name: std::env::consts::OS.to_string(),
            version,
            arch: std::env::consts::ARCH.to_string(),
        }
    }
}

/// Detect GPUs, memory and OS.
pub fn detect_system() -> Result<SystemInfo> {
    let gpus = detect_gpus()?;
    let memory = detect_memory();
    let os = OsInfo::detect();
    let cpu_count = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);

    let info = SystemInfo {
        accelerator_count: accelerator_count(&gpus),
        total_vram_mb: total_vram_mb(&gpus),
        gpus,
        memory,
        os,
        cpu_count,
    };
    tracing::debug!(
        accelerators = info.accelerator_count,
        vram_mb = info.total_vram_mb,
        ram_mb = info.memory.total_ram_mb,
        "Hardware detected"
    );
    Ok(info)
}
