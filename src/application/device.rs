// ============================================================
// Layer 2 — Compute Device Selection
// ============================================================
// "cpu"            → NdArray backend
// "gpu" / "gpu:N"  → Wgpu backend on discrete GPU N (default 0)
//
// The use cases match on this once and call the generic
// training / captioning code with the chosen backend.
//
// Reference: Burn Book §2 (Backends)

use anyhow::{bail, Result};
use std::{fmt, str::FromStr};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputeDevice {
    Cpu,
    Gpu(usize),
}

impl FromStr for ComputeDevice {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim().to_ascii_lowercase();
        match s.as_str() {
            "cpu" => Ok(ComputeDevice::Cpu),
            "gpu" => Ok(ComputeDevice::Gpu(0)),
            other => match other.strip_prefix("gpu:").map(str::parse::<usize>) {
                Some(Ok(n)) => Ok(ComputeDevice::Gpu(n)),
                _ => bail!("unknown device '{other}' (expected cpu, gpu or gpu:N)"),
            },
        }
    }
}

impl fmt::Display for ComputeDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComputeDevice::Cpu    => f.write_str("cpu"),
            ComputeDevice::Gpu(n) => write!(f, "gpu:{n}"),
        }
    }
}
