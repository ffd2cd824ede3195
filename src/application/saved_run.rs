// ============================================================
// Layer 2 — Saved Run
// ============================================================
// Rebuilds what `predict` and `eval` need from a run directory
// written by `train`: configuration, tokenizer, collator and the
// best model, without touching the pretrained directory.

use anyhow::Result;
use std::path::Path;
use burn::prelude::*;
use tokenizers::Tokenizer;

use crate::application::train_use_case::TrainConfig;
use crate::data::batcher::Collator;
use crate::infra::{checkpoint::CheckpointManager, tokenizer_store::TokenizerStore};
use crate::ml::model::{EmotionClassifier, EmotionClassifierConfig};

pub struct SavedRun {
    pub config:    TrainConfig,
    pub tokenizer: Tokenizer,
    pub collator:  Collator,
    model_config:  EmotionClassifierConfig,
    checkpoints:   CheckpointManager,
}

impl SavedRun {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let checkpoints  = CheckpointManager::open(dir.as_ref())?;
        let config       = checkpoints.load_config()?;
        let model_config = checkpoints.load_model_config()?;
        let tokenizer    = TokenizerStore::load(&checkpoints.tokenizer_path())?;
        let special      = TokenizerStore::special_tokens(&tokenizer)?;

        if model_config.num_labels != config.num_label.len() {
            anyhow::bail!(
                "Model has {} outputs but the run used the '{}' label set",
                model_config.num_labels,
                config.num_label
            );
        }

        let collator = Collator::new(config.max_len, special).with_dynamic_padding(config.dynamic_padding);
        tracing::info!(
            "Opened run '{}' (max_len {}, pad id {})",
            checkpoints.dir().display(),
            collator.max_len(),
            collator.special_tokens().pad,
        );
        Ok(Self { config, tokenizer, collator, model_config, checkpoints })
    }

    pub fn run_name(&self) -> String {
        self.config.run_name()
    }

    /// The best model of the run on `device`.
    pub fn load_model<B: Backend>(&self, device: &B::Device) -> Result<EmotionClassifier<B>> {
        let model = self.model_config.init::<B>(device);
        self.checkpoints.load_best(model, device)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use burn::backend::NdArray;

    use crate::domain::labels::LabelSet;
    use crate::ml::model::tests::tiny_config;

    const VOCAB: &str = "[PAD]\n[UNK]\n[CLS]\n[SEP]\n좋다\n싫다\n정말\n";

    /// A run directory as `train` leaves it, with a tiny model.
    pub(crate) fn write_run(root: &Path) -> std::path::PathBuf {
        let vocab_dir = root.join("vocab");
        std::fs::create_dir_all(&vocab_dir).unwrap();
        std::fs::write(vocab_dir.join("vocab.txt"), VOCAB).unwrap();
        let tokenizer = TokenizerStore::new(&vocab_dir).load_or_build().unwrap();

        let config = TrainConfig {
            num_label: LabelSet::TwoClass,
            max_len:   8,
            ..TrainConfig::default()
        };
        let ckpt = CheckpointManager::create(root.join("run")).unwrap();
        ckpt.save_config(&config).unwrap();
        ckpt.save_model_config(&tiny_config(2)).unwrap();
        ckpt.save_tokenizer(&tokenizer).unwrap();
        ckpt.save_best(&tiny_config(2).init::<NdArray>(&Default::default())).unwrap();
        ckpt.dir().to_path_buf()
    }

    #[test]
    fn test_open_written_run() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = write_run(tmp.path());

        let run = SavedRun::open(&dir).unwrap();
        assert_eq!(run.config.num_label, LabelSet::TwoClass);
        assert_eq!(run.collator.max_len(), 8);
        assert_eq!(run.collator.special_tokens().cls, 2);
        assert!(run.load_model::<NdArray>(&Default::default()).is_ok());
    }

    #[test]
    fn test_label_count_mismatch_is_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = write_run(tmp.path());
        CheckpointManager::open(&dir).unwrap().save_model_config(&tiny_config(7)).unwrap();
        assert!(SavedRun::open(&dir).is_err());
    }
}
