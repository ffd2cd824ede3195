// ============================================================
// Layer 5 — Compute Devices and Backends
// ============================================================
// `--device` picks the Burn backend a run executes on:
//
//   cpu  → NdArray
//   gpu  → Wgpu (f32), or Wgpu with f16 floats when a scaled
//          precision strategy is active
//
// Training wraps the chosen backend in Autodiff; evaluation and
// prediction use the plain backend.

use burn::backend::{
    ndarray::NdArrayDevice,
    wgpu::WgpuDevice,
    Autodiff, NdArray, Wgpu,
};
use serde::{Deserialize, Serialize};

pub type CpuBackend = NdArray;
pub type GpuBackend = Wgpu;
pub type HalfGpuBackend = Wgpu<burn::tensor::f16, i32>;

pub type CpuTrainBackend = Autodiff<CpuBackend>;
pub type GpuTrainBackend = Autodiff<GpuBackend>;
pub type HalfGpuTrainBackend = Autodiff<HalfGpuBackend>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComputeDevice {
    Cpu,
    Gpu,
}

impl ComputeDevice {
    pub fn cpu_device() -> NdArrayDevice {
        NdArrayDevice::Cpu
    }

    pub fn gpu_device() -> WgpuDevice {
        WgpuDevice::default()
    }
}
