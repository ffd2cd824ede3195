// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Fine-tunes a pretrained encoder with a fresh classification
// head using Burn's DataLoader, GradientsAccumulator and Adam.
//
//   epoch ─► full micro-batch ─► forward + per-batch report
//                        └► backward on loss / G (× loss scale)
//         every G micro-batches (one window):
//             scheduler.step → unscale + clip → optimizer.step
//             (one step per parameter group under layer-wise decay)
//         epoch end: drop unfinished window, evaluate,
//             timeline row, checkpoint on strict improvement
//
// Backends:
//   - Training runs on an Autodiff backend chosen from the
//     device and precision (see device.rs)
//   - model.valid() returns the model on B::InnerBackend, so the
//     validation batcher is built on the inner backend too
//
// Loaders are single-threaded. Burn's worker pool batches each
// worker's slice of the dataset on its own, which changes batch
// composition and makes the order depend on thread timing.
// The training loader shuffles the whole set with the run seed
// and its short final batch is skipped (drop-last), so an epoch
// is exactly floor(N / batch_size) micro-batches.
//
// Reference: Burn Book §5, Kingma & Ba (2015) Adam

use anyhow::{Context, Result};
use std::{path::PathBuf, sync::Arc};
use burn::{
    data::dataloader::{DataLoader, DataLoaderBuilder},
    module::AutodiffModule,
    optim::{AdamConfig, GradientsAccumulator, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};

use crate::application::train_use_case::TrainConfig;
use crate::data::{
    batcher::{ClassificationBatch, ClassificationBatcher, Collator},
    dataset::ClassificationDataset,
};
use crate::domain::error::TrainError;
use crate::domain::report::ClassificationReport;
use crate::domain::traits::LearningRateSchedule;
use crate::infra::{
    checkpoint::CheckpointManager,
    metrics::{EpochRecord, MetricsTimeline},
    pretrained::PretrainedEncoder,
    run_log::RunLog,
};
use crate::ml::{
    device::{ComputeDevice, CpuTrainBackend, GpuTrainBackend, HalfGpuTrainBackend},
    evaluator::{argmax_rows, evaluate, to_labels},
    grads::split_layerwise,
    model::EmotionClassifier,
    precision::{ClipOutcome, Precision},
    schedule::WarmupLinearSchedule,
    state::{StepMetrics, TrainingState},
};

/// Outcome of a finished run.
#[derive(Debug, Clone)]
pub struct TrainSummary {
    pub global_steps:  usize,
    pub best_val_loss: f64,
    /// Accuracy at the best-loss epoch; `None` if no epoch improved
    pub best_val_acc:  Option<f64>,
    /// Epoch whose weights are in the checkpoint
    pub best_epoch:    Option<usize>,
    pub run_dir:       PathBuf,
}

/// Everything a training run consumes.
pub struct TrainingSession<'a> {
    pub config:      &'a TrainConfig,
    pub pretrained:  &'a PretrainedEncoder,
    pub checkpoints: &'a CheckpointManager,
    pub collator:    Collator,
    pub train_set:   ClassificationDataset,
    pub valid_set:   ClassificationDataset,
}

/// Pick the backend for the configured device and precision, then train.
pub fn run_training(session: TrainingSession<'_>, log: &mut RunLog) -> Result<TrainSummary> {
    let cfg = session.config;
    let precision = Precision::from_options(cfg.fp16, cfg.fp16_opt_level);

    match (cfg.device, precision.is_scaled()) {
        (ComputeDevice::Cpu, true) => Err(TrainError::MixedPrecisionUnavailable(
            "the CPU backend has no half-precision kernels".into(),
        )
        .into()),
        (ComputeDevice::Cpu, false) => {
            tracing::info!("Training on CPU (NdArray)");
            train_loop::<CpuTrainBackend>(session, precision, ComputeDevice::cpu_device(), log)
        }
        (ComputeDevice::Gpu, false) => {
            tracing::info!("Training on GPU (Wgpu, f32)");
            train_loop::<GpuTrainBackend>(session, precision, ComputeDevice::gpu_device(), log)
        }
        (ComputeDevice::Gpu, true) => {
            tracing::info!(
                "Training on GPU (Wgpu, f16) with loss scale {}",
                precision.loss_scale()
            );
            train_loop::<HalfGpuTrainBackend>(session, precision, ComputeDevice::gpu_device(), log)
        }
    }
}

fn train_loop<B: AutodiffBackend>(
    session:       TrainingSession<'_>,
    mut precision: Precision,
    device:        B::Device,
    log:           &mut RunLog,
) -> Result<TrainSummary> {
    let cfg = session.config;
    B::seed(cfg.seed);

    // ── Build model ───────────────────────────────────────────────────────────
    let labels = log.labels();
    let mut model: EmotionClassifier<B> =
        session.pretrained.load_classifier::<B>(labels.len(), &device)?;
    tracing::info!(
        "Model ready: {} encoder layers, {} labels ({})",
        model.encoder.num_layers(),
        labels.len(),
        labels.names().join(", "),
    );

    // ── Adam optimiser ────────────────────────────────────────────────────────
    // m = β1*m + (1-β1)*g        (mean)
    // v = β2*v + (1-β2)*g²       (variance)
    // θ = θ - lr * m / (√v + ε)  (update)
    let mut optim = AdamConfig::new()
        .with_epsilon(1e-8)
        .init::<B, EmotionClassifier<B>>();
    let layerwise_rate = cfg.layerwise_decay.then_some(cfg.layerwise_decay_rate);

    // ── Training data loader (AutodiffBackend) ────────────────────────────────
    let train_samples     = session.train_set.sample_count();
    let batches_per_epoch = full_batches(train_samples, cfg.train_batch_size);
    if batches_per_epoch == 0 {
        return Err(TrainError::InvalidConfig(format!(
            "train batch size {} exceeds the {} training samples",
            cfg.train_batch_size, train_samples
        ))
        .into());
    }
    tracing::info!(
        "Train label histogram: {:?}",
        session.train_set.label_histogram(labels.len())
    );
    let train_loader = build_train_loader::<B>(
        session.collator.clone(),
        device.clone(),
        cfg.train_batch_size,
        cfg.seed,
        session.train_set,
    );

    // ── Validation data loader (InnerBackend — no autodiff overhead) ──────────
    let val_batcher = ClassificationBatcher::<B::InnerBackend>::new(session.collator, device.clone());
    let val_loader  = DataLoaderBuilder::new(val_batcher)
        .batch_size(cfg.eval_batch_size)
        .build(session.valid_set);

    // ── Schedule and bookkeeping ──────────────────────────────────────────────
    let mut schedule = WarmupLinearSchedule::for_run(
        cfg.learning_rate,
        batches_per_epoch,
        cfg.gradient_accumulation_steps,
        cfg.epochs,
        cfg.warmup_percent,
    );
    log.set_total_steps(schedule.total_steps());
    tracing::info!(
        "{} batches per epoch ({} samples skipped), {} optimizer steps, {} warmup",
        batches_per_epoch,
        train_samples - batches_per_epoch * cfg.train_batch_size,
        log.total_steps(),
        schedule.warmup_steps(),
    );

    let timeline        = MetricsTimeline::new(session.checkpoints.dir())?;
    tracing::info!("Metrics timeline: '{}'", timeline.csv_path().display());
    let mut state       = TrainingState::new(cfg.gradient_accumulation_steps, cfg.logging_step);
    let mut accumulator = GradientsAccumulator::<EmotionClassifier<B>>::new();
    let mut best_epoch  = None;

    // ── Epoch loop ────────────────────────────────────────────────────────────
    for epoch in 1..=cfg.epochs {
        state.start_epoch();

        for batch in train_loader.iter() {
            if !is_full_batch(&batch, cfg.train_batch_size) {
                continue;
            }
            let truth = to_labels(batch.labels.clone());
            let output = model.forward(batch.input_ids, batch.attention_mask, Some(batch.labels));
            let logits = output.logits;
            let loss = output.loss.context("forward pass with labels returned no loss")?;

            let loss_value: f64 = loss.clone().into_scalar().elem::<f64>();
            if !loss_value.is_finite() {
                return Err(TrainError::NonFiniteLoss {
                    loss: loss_value,
                    epoch,
                    step: state.global_step(),
                }
                .into());
            }

            let predicted = to_labels(argmax_rows(logits));
            let report = ClassificationReport::compute(&truth, &predicted, labels.labels());
            let window_full = state.record_micro_batch(StepMetrics::new(
                loss_value,
                report.accuracy,
                report.macro_f1,
            ));

            // Backward pass; gradients sum across the window
            let scaled = precision.scale_loss(loss.div_scalar(state.loss_divisor()));
            let grads  = GradientsParams::from_grads(scaled.backward(), &model);
            accumulator.accumulate(&model, grads);

            if !window_full {
                continue;
            }

            // ── Optimizer update ──────────────────────────────────────────────
            let grads = accumulator.grads();
            let lr = schedule.step();
            match precision.unscale_and_clip(&model, grads, cfg.grad_clip_norm) {
                ClipOutcome::Apply { grads, norm } => {
                    tracing::debug!("step {}: grad norm {:.4}, lr {:.3e}", state.global_step() + 1, norm, lr);
                    model = apply_update(&mut optim, model, grads, lr, layerwise_rate);
                    precision.update(false);
                }
                ClipOutcome::Overflow => {
                    precision.update(true);
                    tracing::warn!(
                        "Gradient overflow at step {}; update skipped, loss scale now {}",
                        state.global_step() + 1,
                        precision.loss_scale(),
                    );
                }
            }

            if let Some(delta) = state.commit_step() {
                log.training_progress(state.global_step(), &delta, schedule.current_lr());
                log.class_breakdown(&report);
            }
        }

        // ── End of epoch ──────────────────────────────────────────────────────
        let dropped = state.discard_partial_window();
        if dropped > 0 {
            drop(accumulator.grads());
            tracing::info!(
                "Epoch {}: dropped {} micro-batches of an unfinished window",
                epoch,
                dropped
            );
        }

        let train_metrics = state.epoch_means().unwrap_or_else(|| {
            tracing::warn!("Epoch {} finished without an optimizer step", epoch);
            StepMetrics::new(f64::NAN, f64::NAN, f64::NAN)
        });

        // model.valid() → EmotionClassifier<B::InnerBackend>, dropout disabled
        let eval = evaluate(&model.valid(), val_loader.as_ref(), log)?;
        let val_metrics = eval.metrics();
        log.epoch_summary(epoch, state.global_step(), &train_metrics, &val_metrics);

        timeline.record(&EpochRecord::new(state.global_step(), epoch, &train_metrics, &val_metrics))?;

        if state.observe_validation(val_metrics.loss, val_metrics.accuracy) {
            session.checkpoints.save_best(&model)?;
            session.checkpoints.save_config(cfg)?;
            best_epoch = Some(epoch);
            tracing::info!(
                "Epoch {}: val loss improved to {:.4}, checkpoint saved",
                epoch,
                val_metrics.loss
            );
        }
    }

    tracing::info!("Training complete!");
    Ok(TrainSummary {
        global_steps:  state.global_step(),
        best_val_loss: state.best_val_loss(),
        best_val_acc:  state.best_val_acc(),
        best_epoch,
        run_dir:       session.checkpoints.dir().to_path_buf(),
    })
}

/// Micro-batches per epoch once the short final batch is dropped.
fn full_batches(samples: usize, batch_size: usize) -> usize {
    samples / batch_size.max(1)
}

fn is_full_batch<B: Backend>(batch: &ClassificationBatch<B>, batch_size: usize) -> bool {
    batch.labels.dims()[0] == batch_size
}

/// Shuffled training loader over the whole dataset, reseeded per run.
fn build_train_loader<B: Backend>(
    collator:   Collator,
    device:     B::Device,
    batch_size: usize,
    seed:       u64,
    dataset:    ClassificationDataset,
) -> Arc<dyn DataLoader<ClassificationBatch<B>>> {
    DataLoaderBuilder::new(ClassificationBatcher::<B>::new(collator, device))
        .batch_size(batch_size)
        .shuffle(seed)
        .build(dataset)
}

/// One optimizer update, split into parameter groups under
/// layer-wise decay. Adam only touches parameters present in the
/// gradients it is given, so stepping group by group gives each
/// group its own rate.
fn apply_update<B, O>(
    optim:          &mut O,
    model:          EmotionClassifier<B>,
    grads:          GradientsParams,
    lr:             f64,
    layerwise_rate: Option<f64>,
) -> EmotionClassifier<B>
where
    B: AutodiffBackend,
    O: Optimizer<EmotionClassifier<B>, B>,
{
    let Some(rate) = layerwise_rate else {
        return optim.step(lr, model, grads);
    };

    let groups = split_layerwise(&model, grads, rate);
    groups.into_iter().fold(model, |model, group| {
        if group.grads.is_empty() {
            return model;
        }
        tracing::trace!("{}: {} grads at lr {:.3e}", group.name, group.grads.len(), lr * group.lr_factor);
        optim.step(lr * group.lr_factor, model, group.grads)
    })
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::{
        backend::NdArray,
        record::{FullPrecisionSettings, NamedMpkFileRecorder, Recorder},
    };

    use crate::domain::labels::LabelSet;
    use crate::domain::sample::{Sample, SpecialTokens};
    use crate::ml::precision::OptLevel;

    const TINY_BERT: &str = r#"{
        "hidden_size": 8, "intermediate_size": 16, "max_position_embeddings": 16,
        "num_attention_heads": 2, "num_hidden_layers": 2, "vocab_size": 32
    }"#;

    struct Fixture {
        _tmp:        tempfile::TempDir,
        config:      TrainConfig,
        pretrained:  PretrainedEncoder,
        checkpoints: CheckpointManager,
    }

    fn fixture(configure: impl FnOnce(&mut TrainConfig)) -> Fixture {
        let tmp = tempfile::tempdir().unwrap();
        let model_dir = tmp.path().join("pretrained").join("tiny");
        std::fs::create_dir_all(&model_dir).unwrap();
        std::fs::write(model_dir.join("bert_config.json"), TINY_BERT).unwrap();

        let pretrained = PretrainedEncoder::open(tmp.path().join("pretrained"), "tiny").unwrap();
        let encoder = pretrained.encoder_config().init::<NdArray>(&Default::default());
        NamedMpkFileRecorder::<FullPrecisionSettings>::new()
            .record(encoder.into_record(), model_dir.join("model"))
            .unwrap();

        let mut config = TrainConfig {
            device:           ComputeDevice::Cpu,
            num_label:        LabelSet::TwoClass,
            train_batch_size: 2,
            eval_batch_size:  2,
            epochs:           2,
            logging_step:     1,
            max_len:          8,
            ..TrainConfig::default()
        };
        configure(&mut config);

        let checkpoints = CheckpointManager::create(tmp.path().join("run")).unwrap();
        Fixture { _tmp: tmp, config, pretrained, checkpoints }
    }

    fn samples(n: usize) -> ClassificationDataset {
        ClassificationDataset::new(
            (0..n)
                .map(|i| Sample::new(vec![4 + (i % 20) as u32, 5, 6], i % 2))
                .collect(),
        )
    }

    fn session(f: &Fixture) -> TrainingSession<'_> {
        TrainingSession {
            config:      &f.config,
            pretrained:  &f.pretrained,
            checkpoints: &f.checkpoints,
            collator:    Collator::new(f.config.max_len, SpecialTokens { pad: 0, cls: 2, sep: 3 }),
            train_set:   samples(6),
            valid_set:   samples(4),
        }
    }

    #[test]
    fn test_accumulation_drops_partial_window() {
        // 3 batches per epoch with G = 2 → one step per epoch
        let f = fixture(|c| c.gradient_accumulation_steps = 2);
        let mut log = RunLog::new("test", LabelSet::TwoClass);

        let summary = run_training(session(&f), &mut log).unwrap();
        assert_eq!(summary.global_steps, 2);
        assert_eq!(log.total_steps(), 2);
        assert!(summary.best_val_loss.is_finite());
        assert!(summary.best_val_acc.is_some());
        assert!(f.checkpoints.best_model_path().exists());
        assert!(f.checkpoints.dir().join("training_args.json").exists());

        let timeline = std::fs::read_to_string(f.checkpoints.dir().join("metrics.csv")).unwrap();
        assert_eq!(timeline.lines().count(), 3);
    }

    #[test]
    fn test_train_loader_feeds_every_scheduled_step() {
        // 25 samples in batches of 4: six full batches, the 1-sample tail is skipped
        let (n, batch_size, epochs) = (25, 4, 3);
        let special = SpecialTokens { pad: 0, cls: 2, sep: 3 };
        let loader = build_train_loader::<NdArray>(
            Collator::new(8, special),
            Default::default(),
            batch_size,
            7,
            samples(n),
        );
        let schedule = WarmupLinearSchedule::for_run(2e-5, full_batches(n, batch_size), 1, epochs, 0.1);

        let mut full = 0;
        for _ in 0..epochs {
            let sizes: Vec<usize> = loader.iter().map(|b| b.labels.dims()[0]).collect();
            assert_eq!(sizes.iter().sum::<usize>(), n);
            assert_eq!(sizes.iter().filter(|&&n| n < batch_size).count(), 1);
            full += sizes.iter().filter(|&&n| n == batch_size).count();
        }
        assert_eq!(full, schedule.total_steps());
    }

    #[test]
    fn test_train_loader_order_follows_seed() {
        let first_epoch = || -> Vec<i64> {
            let loader = build_train_loader::<NdArray>(
                Collator::new(8, SpecialTokens { pad: 0, cls: 2, sep: 3 }),
                Default::default(),
                4,
                11,
                samples(20),
            );
            loader
                .iter()
                .flat_map(|b| b.input_ids.into_data().iter::<i64>().collect::<Vec<_>>())
                .collect()
        };
        assert_eq!(first_epoch(), first_epoch());
    }

    #[test]
    fn test_batch_larger_than_dataset_is_rejected() {
        let f = fixture(|c| c.train_batch_size = 8);
        let mut log = RunLog::new("test", LabelSet::TwoClass);

        let err = run_training(session(&f), &mut log).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<TrainError>(),
            Some(TrainError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_checkpoint_untouched_without_improvement() {
        // lr 0 leaves the weights as loaded, so epochs 2 and 3 repeat
        // epoch 1's validation loss exactly
        let f = fixture(|c| {
            c.learning_rate = 0.0;
            c.epochs = 3;
        });
        let mut log = RunLog::new("test", LabelSet::TwoClass);

        let summary = run_training(session(&f), &mut log).unwrap();
        assert_eq!(summary.global_steps, 9);
        assert_eq!(summary.best_epoch, Some(1));

        // the timeline row of epoch 3 is written after the last possible save
        let modified = |name: &str| {
            std::fs::metadata(f.checkpoints.dir().join(name)).unwrap().modified().unwrap()
        };
        let timeline = std::fs::read_to_string(f.checkpoints.dir().join("metrics.csv")).unwrap();
        assert_eq!(timeline.lines().count(), 4);
        assert!(modified("best_model.mpk") <= modified("metrics.csv"));
    }

    #[test]
    fn test_layerwise_decay_run() {
        let f = fixture(|c| {
            c.layerwise_decay = true;
            c.epochs = 1;
        });
        let mut log = RunLog::new("test", LabelSet::TwoClass);

        let summary = run_training(session(&f), &mut log).unwrap();
        assert_eq!(summary.global_steps, 3);
        assert_eq!(summary.run_dir, f.checkpoints.dir());
    }

    #[test]
    fn test_mixed_precision_on_cpu_is_fatal() {
        let f = fixture(|c| {
            c.fp16 = true;
            c.fp16_opt_level = OptLevel::O1;
        });
        let mut log = RunLog::new("test", LabelSet::TwoClass);

        let err = run_training(session(&f), &mut log).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<TrainError>(),
            Some(TrainError::MixedPrecisionUnavailable(_))
        ));
    }
}
