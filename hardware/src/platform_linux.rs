/*!
Linux display-adapter listing through `lspci`.
*/

use std::process::Command;

use crate::gpu::{GpuInfo, GpuVendor};
use crate::Result;

/// Lists VGA and 3D controllers. None of them carry a CUDA ordinal.
pub fn detect_display_adapters() -> Result<Vec<GpuInfo>> {
    let output = match Command::new("lspci").output() {
        Ok(output) if output.status.success() => output,
        Ok(_) | Err(_) => return Ok(Vec::new()),
    };
    Ok(parse_lspci(&String::from_utf8_lossy(&output.stdout)))
}

pub(crate) fn parse_lspci(stdout: &str) -> Vec<GpuInfo> {
    stdout
        .lines()
        .filter(|line| {
            let lower = line.to_lowercase();
            lower.contains("vga compatible") || lower.contains("3d controller")
        })
        .map(|line| {
            let lower = line.to_lowercase();
            let vendor = if lower.contains("nvidia") {
                GpuVendor::Nvidia
            } else if lower.contains("amd") || lower.contains("ati ") {
                GpuVendor::Amd
            } else if lower.contains("intel") {
                GpuVendor::Intel
            } else {
                GpuVendor::Unknown
            };
            let name = line
                .rsplit(':')
                .next()
                .unwrap_or("Unknown GPU")
                .trim()
                .to_string();
            GpuInfo {
                index: None,
                vendor,
                name,
                vram_mb: None,
                driver_version: None,
            }
        })
        .collect()
}
