// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates a fine-tuning run in order:
//
//   Step 1: Validate the configuration
//   Step 2: Open the pretrained encoder   (Layer 6 - infra)
//   Step 3: Load the tokenizer            (Layer 6 - infra)
//   Step 4: Read + tokenise the corpora   (Layer 4 - data)
//   Step 5: Prepare the run directory     (Layer 6 - infra)
//   Step 6: Run the training loop         (Layer 5 - ml)
//   Step 7: Append to the results table   (Layer 6 - infra)
//
// Reference: Rust Book §13 (Iterators and Closures)
//            Burn Book §5 (Training)

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Instant};

use crate::data::{batcher::Collator, dataset::ClassificationDataset, loader::CsvSampleLoader};
use crate::domain::{error::TrainError, labels::LabelSet, traits::SampleSource};
use crate::infra::{
    checkpoint::CheckpointManager,
    pretrained::PretrainedEncoder,
    results::ResultWriter,
    run_log::RunLog,
    tokenizer_store::TokenizerStore,
};
use crate::ml::{
    device::ComputeDevice,
    precision::OptLevel,
    trainer::{run_training, TrainSummary, TrainingSession},
};

const RESULTS_FILE: &str = "results.csv";

// ─── Training Configuration ──────────────────────────────────────────────────
// All hyperparameters for a training run.
// Serialisable so it is saved next to the best model and can
// be reloaded by `predict` and `eval`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainConfig {
    pub pretrained_type:             String,
    pub pretrained_dir:              PathBuf,
    pub train_batch_size:            usize,
    pub eval_batch_size:             usize,
    pub layerwise_decay:             bool,
    pub layerwise_decay_rate:        f64,
    pub learning_rate:               f64,
    pub epochs:                      usize,
    pub gradient_accumulation_steps: usize,
    pub warmup_percent:              f64,
    pub grad_clip_norm:              f64,
    pub logging_step:                usize,
    pub device:                      ComputeDevice,
    pub fp16:                        bool,
    pub fp16_opt_level:              OptLevel,
    pub seed:                        u64,
    pub train_data_path:             PathBuf,
    pub dev_data_path:               PathBuf,
    pub num_label:                   LabelSet,
    pub max_len:                     usize,
    pub dynamic_padding:             bool,
    pub output_dir:                  PathBuf,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            pretrained_type:             "skt".to_string(),
            pretrained_dir:              PathBuf::from("pretrained_model"),
            train_batch_size:            100,
            eval_batch_size:             100,
            layerwise_decay:             false,
            layerwise_decay_rate:        0.95,
            learning_rate:               2e-5,
            epochs:                      3,
            gradient_accumulation_steps: 1,
            warmup_percent:              0.01,
            grad_clip_norm:              1.0,
            logging_step:                100,
            device:                      ComputeDevice::Gpu,
            fp16:                        false,
            fp16_opt_level:              OptLevel::O1,
            seed:                        0,
            train_data_path:             PathBuf::from("data/korean_single_train.csv"),
            dev_data_path:               PathBuf::from("data/korean_single_dev.csv"),
            num_label:                   LabelSet::SevenClass,
            max_len:                     50,
            dynamic_padding:             false,
            output_dir:                  PathBuf::from("model_saved"),
        }
    }
}

impl TrainConfig {
    /// Reject values the training loop cannot run with.
    pub fn validate(&self) -> Result<(), TrainError> {
        let invalid = |msg: String| Err(TrainError::InvalidConfig(msg));

        if self.gradient_accumulation_steps < 1 {
            return invalid("gradient accumulation steps must be at least 1".into());
        }
        if self.logging_step < 1 {
            return invalid("logging step must be at least 1".into());
        }
        if self.max_len < 3 {
            return invalid(format!("max length {} leaves no room for a token", self.max_len));
        }
        if self.train_batch_size < 1 || self.eval_batch_size < 1 {
            return invalid("batch sizes must be at least 1".into());
        }
        if self.epochs < 1 {
            return invalid("epochs must be at least 1".into());
        }
        if !(0.0..=1.0).contains(&self.warmup_percent) {
            return invalid(format!("warmup percent {} is outside [0, 1]", self.warmup_percent));
        }
        if self.learning_rate.is_nan() || self.learning_rate <= 0.0 {
            return invalid(format!("learning rate {} must be positive", self.learning_rate));
        }
        if self.grad_clip_norm.is_nan() || self.grad_clip_norm <= 0.0 {
            return invalid(format!("grad clip norm {} must be positive", self.grad_clip_norm));
        }
        let rate = self.layerwise_decay_rate;
        if self.layerwise_decay && (rate.is_nan() || rate <= 0.0 || rate > 1.0) {
            return invalid(format!(
                "layer-wise decay rate {} is outside (0, 1]",
                self.layerwise_decay_rate
            ));
        }
        Ok(())
    }

    /// Directory name of a run, derived from its hyper-parameters.
    pub fn run_name(&self) -> String {
        format!(
            "lr{:e}_batch{}_warmup{}_accum{}_len{}_{}_epoch{}",
            self.learning_rate,
            self.train_batch_size,
            self.warmup_percent,
            self.gradient_accumulation_steps,
            self.max_len,
            self.pretrained_type,
            self.epochs,
        )
    }

    pub fn run_dir(&self) -> PathBuf {
        self.output_dir.join(self.run_name())
    }

    /// Configuration columns of the results table.
    pub fn as_record(&self) -> Vec<(&'static str, String)> {
        vec![
            ("pretrained_type",             self.pretrained_type.clone()),
            ("num_label",                   self.num_label.to_string()),
            ("train_batch_size",            self.train_batch_size.to_string()),
            ("eval_batch_size",             self.eval_batch_size.to_string()),
            ("learning_rate",               self.learning_rate.to_string()),
            ("epochs",                      self.epochs.to_string()),
            ("gradient_accumulation_steps", self.gradient_accumulation_steps.to_string()),
            ("warmup_percent",              self.warmup_percent.to_string()),
            ("grad_clip_norm",              self.grad_clip_norm.to_string()),
            ("layerwise_decay",             self.layerwise_decay.to_string()),
            ("layerwise_decay_rate",        self.layerwise_decay_rate.to_string()),
            ("max_len",                     self.max_len.to_string()),
            ("dynamic_padding",             self.dynamic_padding.to_string()),
            ("fp16",                        self.fp16.to_string()),
            ("seed",                        self.seed.to_string()),
        ]
    }
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    /// Execute the full training pipeline end to end
    pub fn execute(&self) -> Result<TrainSummary> {
        let cfg = &self.config;
        let started = Instant::now();

        // ── Step 1: Validate ──────────────────────────────────────────────────
        cfg.validate()?;
        let run_name = cfg.run_name();
        tracing::info!("Run '{}'", run_name);

        // ── Step 2: Pretrained encoder ────────────────────────────────────────
        let pretrained = PretrainedEncoder::open(&cfg.pretrained_dir, &cfg.pretrained_type)?;
        pretrained.check_max_len(cfg.max_len)?;

        // ── Step 3: Tokenizer ─────────────────────────────────────────────────
        let tokenizer = TokenizerStore::new(pretrained.dir()).load_or_build()?;
        let special   = TokenizerStore::special_tokens(&tokenizer)?;
        let vocab_size = pretrained.encoder_config().vocab_size;
        if tokenizer.get_vocab_size(true) > vocab_size {
            anyhow::bail!(
                "Tokenizer has {} tokens but the encoder embeds only {}",
                tokenizer.get_vocab_size(true),
                vocab_size
            );
        }
        tracing::info!(
            "Special tokens: pad={}, cls={}, sep={}",
            special.pad,
            special.cls,
            special.sep
        );

        // ── Step 4: Corpora ───────────────────────────────────────────────────
        let train_examples = CsvSampleLoader::new(&cfg.train_data_path).load_examples(cfg.num_label)?;
        let dev_examples   = CsvSampleLoader::new(&cfg.dev_data_path).load_examples(cfg.num_label)?;

        let train_set = ClassificationDataset::new(TokenizerStore::encode_all(&tokenizer, train_examples)?);
        let valid_set = ClassificationDataset::new(TokenizerStore::encode_all(&tokenizer, dev_examples)?);
        tracing::info!(
            "{} train / {} dev samples, longest train sequence {} tokens",
            train_set.sample_count(),
            valid_set.sample_count(),
            train_set.longest_sequence(),
        );

        // ── Step 5: Run directory ─────────────────────────────────────────────
        // The tokenizer and model shape are stored up front so the
        // directory is usable by `predict` as soon as a checkpoint lands.
        let checkpoints = CheckpointManager::create(cfg.run_dir())?;
        checkpoints.save_tokenizer(&tokenizer)?;
        checkpoints.save_model_config(&pretrained.classifier_config(cfg.num_label.len()))?;

        // ── Step 6: Train ─────────────────────────────────────────────────────
        let collator = Collator::new(cfg.max_len, special).with_dynamic_padding(cfg.dynamic_padding);
        let mut log = RunLog::new(&run_name, cfg.num_label);
        let summary = run_training(
            TrainingSession {
                config:      cfg,
                pretrained:  &pretrained,
                checkpoints: &checkpoints,
                collator,
                train_set,
                valid_set,
            },
            &mut log,
        )?;

        // ── Step 7: Results table ─────────────────────────────────────────────
        ResultWriter::new(cfg.output_dir.join(RESULTS_FILE)).update(
            &cfg.as_record(),
            summary.best_val_loss,
            summary.best_val_acc,
        )?;

        tracing::info!(
            "Finished in {:.1?}: {} steps, best val loss {:.4}, val acc {}",
            started.elapsed(),
            summary.global_steps,
            summary.best_val_loss,
            summary.best_val_acc.map_or_else(|| "n/a".to_string(), |a| format!("{a:.4}")),
        );
        Ok(summary)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(TrainConfig::default().validate().is_ok());
    }

    #[test]
    fn test_run_name_is_deterministic() {
        let cfg = TrainConfig::default();
        assert_eq!(cfg.run_name(), "lr2e-5_batch100_warmup0.01_accum1_len50_skt_epoch3");
        assert_eq!(cfg.run_name(), cfg.clone().run_name());
        assert!(cfg.run_dir().starts_with("model_saved"));
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let bad = [
            TrainConfig { gradient_accumulation_steps: 0, ..TrainConfig::default() },
            TrainConfig { logging_step: 0, ..TrainConfig::default() },
            TrainConfig { max_len: 2, ..TrainConfig::default() },
            TrainConfig { train_batch_size: 0, ..TrainConfig::default() },
            TrainConfig { warmup_percent: 1.5, ..TrainConfig::default() },
            TrainConfig { learning_rate: 0.0, ..TrainConfig::default() },
            TrainConfig { grad_clip_norm: f64::NAN, ..TrainConfig::default() },
        ];
        for cfg in bad {
            assert!(matches!(cfg.validate(), Err(TrainError::InvalidConfig(_))));
        }
    }

    #[test]
    fn test_config_serialises_to_json() {
        let cfg = TrainConfig { num_label: LabelSet::TwoClass, ..TrainConfig::default() };
        let json = serde_json::to_string(&cfg).unwrap();
        let back: TrainConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cfg);
    }

    #[test]
    fn test_record_columns() {
        let record = TrainConfig::default().as_record();
        assert_eq!(record[0], ("pretrained_type", "skt".to_string()));
        assert!(record.iter().any(|(k, v)| *k == "num_label" && v == "multi"));
    }

    #[test]
    fn test_missing_pretrained_dir_is_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = TrainConfig {
            pretrained_dir: tmp.path().join("nowhere"),
            output_dir:     tmp.path().join("out"),
            ..TrainConfig::default()
        };
        assert!(TrainUseCase::new(cfg).execute().is_err());
    }
}
