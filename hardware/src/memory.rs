/*!
Memory Detection
*/

use serde::{Deserialize, Serialize};
use sysinfo::System;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryInfo {
    /// Total system RAM in MB
    pub total_ram_mb: u64,

    /// Available system RAM in MB
    pub available_ram_mb: u64,
}

pub fn detect_memory() -> MemoryInfo {
    let mut sys = System::new();
    sys.refresh_memory();

    MemoryInfo {
        total_ram_mb: sys.total_memory() / 1024 / 1024,
        available_ram_mb: sys.available_memory() / 1024 / 1024,
    }
}

/// Total VRAM across the given GPUs, counting only those that report it.
pub fn total_vram_mb(gpus: &[crate::gpu::GpuInfo]) -> u64 {
    gpus.iter().filter_map(|gpu| gpu.vram_mb).sum()
}
