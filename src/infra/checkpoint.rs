// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Owns the run directory and everything written into it.
//
// What gets saved per run:
//   1. best_model.mpk   — weights of the best epoch so far
//   2. training_args.json  — the TrainConfig of the run
//   3. model_config.json   — encoder shape + label count
//   4. tokenizer.json      — the vocabulary the run was tokenised with
//
// Only ONE model file exists per run: it is overwritten each
// time validation loss strictly improves, and never otherwise.
// Items 2–4 make the directory self-contained so `predict` and
// `eval` can rebuild the exact model without the pretrained dir.
//
// Burn's CompactRecorder:
//   - Serialises model parameters to named MessagePack (.mpk)
//   - Stores floats at half precision, no compression
//   - Type-safe: loading fails if architecture doesn't match
//
// File naming convention:
//   model_saved/
//     lr2e-5_batch100_warmup0.01_accum1_len50_skt_epoch3/
//       best_model.mpk
//       training_args.json
//       model_config.json
//       tokenizer.json
//       metrics.csv
//     results.csv
//
// Reference: Burn Book §5 (Records and Checkpointing)

use anyhow::{Context, Result};
use std::{
    fs,
    path::{Path, PathBuf},
};
use burn::{
    prelude::*,
    record::{CompactRecorder, Recorder},
};
use tokenizers::Tokenizer;

use crate::application::train_use_case::TrainConfig;
use crate::ml::model::{EmotionClassifier, EmotionClassifierConfig};

const MODEL_FILE: &str = "best_model";
const MODEL_EXT: &str = "mpk";
const ARGS_FILE: &str = "training_args.json";
const MODEL_CONFIG_FILE: &str = "model_config.json";
const TOKENIZER_FILE: &str = "tokenizer.json";

/// Manages saving and loading of the files of one run directory.
pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    /// Open (and create if needed) a run directory.
    pub fn create(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create run directory '{}'", dir.display()))?;
        Ok(Self { dir })
    }

    /// Open an existing run directory written by `train`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        if !dir.is_dir() {
            anyhow::bail!(
                "Run directory '{}' does not exist. Have you run 'train' first?",
                dir.display()
            );
        }
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Overwrite the best-model record.
    pub fn save_best<B: Backend>(&self, model: &EmotionClassifier<B>) -> Result<()> {
        let path = self.dir.join(MODEL_FILE);
        CompactRecorder::new()
            .record(model.clone().into_record(), path.clone())
            .with_context(|| format!("Failed to save checkpoint to '{}'", path.display()))?;
        tracing::debug!("Saved best model to '{}'", self.best_model_path().display());
        Ok(())
    }

    /// Load the best-model record into `model`, which must have
    /// the architecture the record was saved from.
    pub fn load_best<B: Backend>(
        &self,
        model:  EmotionClassifier<B>,
        device: &B::Device,
    ) -> Result<EmotionClassifier<B>> {
        let path = self.dir.join(MODEL_FILE);
        let record = CompactRecorder::new()
            .load(path.clone(), device)
            .with_context(|| {
                format!(
                    "Cannot load checkpoint '{}'. Did any epoch improve validation loss?",
                    path.display()
                )
            })?;
        Ok(model.load_record(record))
    }

    /// Where `save_best` writes; the file exists once an epoch improved.
    pub fn best_model_path(&self) -> PathBuf {
        self.dir.join(format!("{MODEL_FILE}.{MODEL_EXT}"))
    }

    pub fn save_config(&self, cfg: &TrainConfig) -> Result<()> {
        let path = self.dir.join(ARGS_FILE);
        let json = serde_json::to_string_pretty(cfg)?;
        fs::write(&path, json)
            .with_context(|| format!("Cannot write config to '{}'", path.display()))?;
        tracing::debug!("Saved training config to '{}'", path.display());
        Ok(())
    }

    pub fn load_config(&self) -> Result<TrainConfig> {
        let path = self.dir.join(ARGS_FILE);
        let json = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read config from '{}'", path.display()))?;
        serde_json::from_str(&json)
            .with_context(|| format!("Malformed config in '{}'", path.display()))
    }

    pub fn save_model_config(&self, cfg: &EmotionClassifierConfig) -> Result<()> {
        let path = self.dir.join(MODEL_CONFIG_FILE);
        cfg.save(&path)
            .with_context(|| format!("Cannot write model config to '{}'", path.display()))
    }

    pub fn load_model_config(&self) -> Result<EmotionClassifierConfig> {
        let path = self.dir.join(MODEL_CONFIG_FILE);
        EmotionClassifierConfig::load(&path)
            .map_err(|e| anyhow::anyhow!("Cannot load model config '{}': {e}", path.display()))
    }

    pub fn save_tokenizer(&self, tokenizer: &Tokenizer) -> Result<()> {
        let path = self.dir.join(TOKENIZER_FILE);
        tokenizer
            .save(&path, false)
            .map_err(|e| anyhow::anyhow!("Cannot write tokenizer to '{}': {e}", path.display()))
    }

    pub fn tokenizer_path(&self) -> PathBuf {
        self.dir.join(TOKENIZER_FILE)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    use crate::ml::model::tests::tiny_config;

    #[test]
    fn test_open_missing_dir_fails() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(CheckpointManager::open(tmp.path().join("nope")).is_err());
    }

    #[test]
    fn test_config_roundtrip() {
        let tmp = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::create(tmp.path().join("run")).unwrap();

        let cfg = TrainConfig::default();
        ckpt.save_config(&cfg).unwrap();
        let loaded = ckpt.load_config().unwrap();
        assert_eq!(loaded.run_name(), cfg.run_name());

        ckpt.save_model_config(&tiny_config(7)).unwrap();
        let model_cfg = ckpt.load_model_config().unwrap();
        assert_eq!(model_cfg.num_labels, 7);
        assert_eq!(model_cfg.encoder.num_layers, 2);
    }

    #[test]
    fn test_best_model_roundtrip() {
        let tmp = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::create(tmp.path()).unwrap();
        let device = Default::default();

        let model = tiny_config(2).init::<NdArray>(&device);
        ckpt.save_best(&model).unwrap();
        assert!(tmp.path().join("best_model.mpk").exists());
        assert_eq!(ckpt.best_model_path(), tmp.path().join("best_model.mpk"));

        let fresh = tiny_config(2).init::<NdArray>(&device);
        assert!(ckpt.load_best(fresh, &device).is_ok());
    }
}
