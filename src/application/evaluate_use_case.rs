// ============================================================
// Layer 2 — Evaluate Use Case
// ============================================================
// Scores the best model of a run on a labelled CSV, using the
// run's own label set, max length and eval batch size.

use anyhow::Result;
use burn::{data::dataloader::DataLoaderBuilder, prelude::*};
use std::path::PathBuf;

use crate::application::saved_run::SavedRun;
use crate::data::{
    batcher::ClassificationBatcher, dataset::ClassificationDataset, loader::CsvSampleLoader,
};
use crate::domain::traits::SampleSource;
use crate::infra::{run_log::RunLog, tokenizer_store::TokenizerStore};
use crate::ml::{
    device::{ComputeDevice, CpuBackend, GpuBackend},
    evaluator::{evaluate, EvalResult},
};

pub struct EvaluateUseCase {
    checkpoint_dir: PathBuf,
    data_path:      PathBuf,
    device:         ComputeDevice,
}

impl EvaluateUseCase {
    pub fn new(checkpoint_dir: impl Into<PathBuf>, data_path: impl Into<PathBuf>, device: ComputeDevice) -> Self {
        Self {
            checkpoint_dir: checkpoint_dir.into(),
            data_path:      data_path.into(),
            device,
        }
    }

    pub fn execute(&self) -> Result<EvalResult> {
        let run = SavedRun::open(&self.checkpoint_dir)?;
        let labels = run.config.num_label;

        let examples = CsvSampleLoader::new(&self.data_path).load_examples(labels)?;
        let dataset  = ClassificationDataset::new(TokenizerStore::encode_all(&run.tokenizer, examples)?);

        match self.device {
            ComputeDevice::Cpu => evaluate_on::<CpuBackend>(&run, dataset, ComputeDevice::cpu_device()),
            ComputeDevice::Gpu => evaluate_on::<GpuBackend>(&run, dataset, ComputeDevice::gpu_device()),
        }
    }
}

fn evaluate_on<B: Backend>(run: &SavedRun, dataset: ClassificationDataset, device: B::Device) -> Result<EvalResult> {
    let model = run.load_model::<B>(&device)?;
    let loader = DataLoaderBuilder::new(ClassificationBatcher::<B>::new(run.collator.clone(), device))
        .batch_size(run.config.eval_batch_size)
        .build(dataset);

    let log = RunLog::new(&run.run_name(), run.config.num_label);
    evaluate(&model, loader.as_ref(), &log)
}
