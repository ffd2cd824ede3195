// ============================================================
// Layer 2 — Predict Use Case
// ============================================================
// Classifies one sentence with the best model of a run.

use anyhow::Result;
use burn::prelude::*;
use std::path::PathBuf;

use crate::application::saved_run::SavedRun;
use crate::ml::{
    device::{ComputeDevice, CpuBackend, GpuBackend},
    inferencer::{Inferencer, Prediction},
};

pub struct PredictUseCase {
    checkpoint_dir: PathBuf,
    device:         ComputeDevice,
}

impl PredictUseCase {
    pub fn new(checkpoint_dir: impl Into<PathBuf>, device: ComputeDevice) -> Self {
        Self { checkpoint_dir: checkpoint_dir.into(), device }
    }

    pub fn predict(&self, text: &str) -> Result<Prediction> {
        let run = SavedRun::open(&self.checkpoint_dir)?;
        match self.device {
            ComputeDevice::Cpu => predict_on::<CpuBackend>(run, ComputeDevice::cpu_device(), text),
            ComputeDevice::Gpu => predict_on::<GpuBackend>(run, ComputeDevice::gpu_device(), text),
        }
    }
}

fn predict_on<B: Backend>(run: SavedRun, device: B::Device, text: &str) -> Result<Prediction> {
    let model = run.load_model::<B>(&device)?;
    let labels = run.config.num_label;
    let inferencer = Inferencer::new(model, run.collator, run.tokenizer, labels, device);
    inferencer.predict(text)
}
