// ============================================================
// Layer 6 — Pretrained Encoder Store
// ============================================================
// Loads a pretrained BERT encoder from
//
//   <pretrained_dir>/<pretrained_type>/
//     bert_config.json | config.json   — HuggingFace BERT config
//     model.mpk                        — Burn named MessagePack record, or
//     pytorch_model.bin                — PyTorch state dict
//     tokenizer.json | vocab.txt       — see tokenizer_store.rs
//
// Only the encoder is read from disk. The classification head
// never exists in a pretrained checkpoint, so it keeps its fresh
// initialisation, and checkpoint entries the encoder has no slot
// for (MLM / NSP heads) are left unread.
//
// PyTorch keys follow HuggingFace naming; they are renamed onto
// TextEncoder's field names by BERT_KEY_REMAPS below. Both the
// `bert.`-prefixed and the bare layout load.
//
// Reference: burn-import PyTorchFileRecorder documentation

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use burn::{
    prelude::*,
    record::{FullPrecisionSettings, NamedMpkFileRecorder, Recorder},
};
use burn_import::pytorch::{LoadArgs, PyTorchFileRecorder};
use serde::Deserialize;

use crate::domain::error::TrainError;
use crate::ml::model::{EmotionClassifier, EmotionClassifierConfig, EncoderConfig, TextEncoderRecord};

const CONFIG_FILES: [&str; 2] = ["bert_config.json", "config.json"];
const BURN_WEIGHTS: &str = "model.mpk";
const TORCH_WEIGHTS: &str = "pytorch_model.bin";

/// HuggingFace key → TextEncoder field, applied in order.
const BERT_KEY_REMAPS: &[(&str, &str)] = &[
    (r"^bert\.", ""),
    (r"\.gamma$", ".weight"),
    (r"\.beta$", ".bias"),
    (r"^embeddings\.word_embeddings", "embeddings.word"),
    (r"^embeddings\.position_embeddings", "embeddings.position"),
    (r"^embeddings\.token_type_embeddings", "embeddings.token_type"),
    (r"^embeddings\.LayerNorm", "embeddings.norm"),
    (r"^encoder\.layer\.([0-9]+)\.attention\.self\.(query|key|value)", "layers.${1}.attention.${2}"),
    (r"^encoder\.layer\.([0-9]+)\.attention\.output\.dense", "layers.${1}.attention.output"),
    (r"^encoder\.layer\.([0-9]+)\.attention\.output\.LayerNorm", "layers.${1}.attention_norm"),
    (r"^encoder\.layer\.([0-9]+)\.intermediate\.dense", "layers.${1}.intermediate"),
    (r"^encoder\.layer\.([0-9]+)\.output\.dense", "layers.${1}.output"),
    (r"^encoder\.layer\.([0-9]+)\.output\.LayerNorm", "layers.${1}.output_norm"),
    (r"^pooler\.dense", "pooler"),
];

/// The fields of a HuggingFace BERT config this crate reads.
#[derive(Debug, Clone, Deserialize)]
struct BertConfigFile {
    vocab_size:              usize,
    hidden_size:             usize,
    num_hidden_layers:       usize,
    num_attention_heads:     usize,
    intermediate_size:       usize,
    max_position_embeddings: usize,
    #[serde(default = "default_type_vocab")]
    type_vocab_size:         usize,
    #[serde(default = "default_dropout")]
    hidden_dropout_prob:     f64,
    #[serde(default = "default_layer_norm_eps")]
    layer_norm_eps:          f64,
}

fn default_type_vocab() -> usize { 2 }
fn default_dropout() -> f64 { 0.1 }
fn default_layer_norm_eps() -> f64 { 1e-12 }

pub struct PretrainedEncoder {
    dir:    PathBuf,
    config: EncoderConfig,
}

impl PretrainedEncoder {
    /// Read the config of `<root>/<kind>/`. Fails if the directory
    /// or its config file is missing.
    pub fn open(root: impl AsRef<Path>, kind: &str) -> Result<Self> {
        let dir = root.as_ref().join(kind);
        if !dir.is_dir() {
            anyhow::bail!("Pretrained model directory '{}' does not exist", dir.display());
        }

        let path = CONFIG_FILES
            .iter()
            .map(|name| dir.join(name))
            .find(|p| p.exists())
            .with_context(|| {
                format!("No bert_config.json or config.json in '{}'", dir.display())
            })?;

        let json = std::fs::read_to_string(&path)
            .with_context(|| format!("Cannot read '{}'", path.display()))?;
        let file: BertConfigFile = serde_json::from_str(&json)
            .with_context(|| format!("Malformed BERT config '{}'", path.display()))?;

        let config = EncoderConfig::new(
            file.vocab_size,
            file.hidden_size,
            file.num_hidden_layers,
            file.num_attention_heads,
            file.intermediate_size,
            file.max_position_embeddings,
        )
        .with_type_vocab_size(file.type_vocab_size)
        .with_dropout(file.hidden_dropout_prob)
        .with_layer_norm_eps(file.layer_norm_eps);

        tracing::info!(
            "Pretrained encoder '{}': {} layers, hidden={}, vocab={}",
            kind,
            config.num_layers,
            config.hidden_size,
            config.vocab_size,
        );
        Ok(Self { dir, config })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn encoder_config(&self) -> &EncoderConfig {
        &self.config
    }

    pub fn classifier_config(&self, num_labels: usize) -> EmotionClassifierConfig {
        EmotionClassifierConfig::new(self.config.clone(), num_labels)
    }

    /// The position table bounds the sequence length a run may use.
    pub fn check_max_len(&self, max_len: usize) -> Result<(), TrainError> {
        let max_positions = self.config.max_position_embeddings;
        if max_len > max_positions {
            return Err(TrainError::SequenceTooLong { max_len, max_positions });
        }
        Ok(())
    }

    /// Build a classifier with a fresh head on top of the pretrained encoder.
    pub fn load_classifier<B: Backend>(
        &self,
        num_labels: usize,
        device:     &B::Device,
    ) -> Result<EmotionClassifier<B>> {
        let model = self.classifier_config(num_labels).init::<B>(device);
        let encoder = self.config.init::<B>(device).load_record(self.load_encoder_record(device)?);
        Ok(model.with_encoder(encoder))
    }

    fn load_encoder_record<B: Backend>(&self, device: &B::Device) -> Result<TextEncoderRecord<B>> {
        let burn_path = self.dir.join(BURN_WEIGHTS);
        if burn_path.exists() {
            tracing::info!("Loading encoder weights from '{}'", burn_path.display());
            // the recorder appends the .mpk extension itself
            return NamedMpkFileRecorder::<FullPrecisionSettings>::new()
                .load(self.dir.join("model"), device)
                .with_context(|| format!("Incompatible weights in '{}'", burn_path.display()));
        }

        let torch_path = self.dir.join(TORCH_WEIGHTS);
        if torch_path.exists() {
            tracing::info!("Loading encoder weights from '{}'", torch_path.display());
            let mut load_args = LoadArgs::new(torch_path.clone());
            for (pattern, replacement) in BERT_KEY_REMAPS {
                load_args = load_args.with_key_remap(pattern, replacement);
            }
            return PyTorchFileRecorder::<FullPrecisionSettings>::default()
                .load(load_args, device)
                .with_context(|| format!("Incompatible weights in '{}'", torch_path.display()));
        }

        anyhow::bail!(
            "No {} or {} in '{}'",
            BURN_WEIGHTS,
            TORCH_WEIGHTS,
            self.dir.display()
        )
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    const HF_CONFIG: &str = r#"{
        "attention_probs_dropout_prob": 0.1,
        "hidden_act": "gelu",
        "hidden_dropout_prob": 0.1,
        "hidden_size": 8,
        "initializer_range": 0.02,
        "intermediate_size": 16,
        "max_position_embeddings": 16,
        "num_attention_heads": 2,
        "num_hidden_layers": 2,
        "type_vocab_size": 2,
        "vocab_size": 32
    }"#;

    fn pretrained_dir(files: &[(&str, &str)]) -> tempfile::TempDir {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("skt");
        std::fs::create_dir_all(&dir).unwrap();
        for (name, contents) in files {
            std::fs::write(dir.join(name), contents).unwrap();
        }
        tmp
    }

    #[test]
    fn test_reads_huggingface_config() {
        let tmp = pretrained_dir(&[("bert_config.json", HF_CONFIG)]);
        let pretrained = PretrainedEncoder::open(tmp.path(), "skt").unwrap();

        let cfg = pretrained.encoder_config();
        assert_eq!(cfg.num_layers, 2);
        assert_eq!(cfg.num_heads, 2);
        assert_eq!(cfg.layer_norm_eps, 1e-12);
        assert_eq!(pretrained.classifier_config(7).num_labels, 7);
    }

    #[test]
    fn test_missing_directory_is_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(PretrainedEncoder::open(tmp.path(), "etri").is_err());
    }

    #[test]
    fn test_max_len_bounded_by_positions() {
        let tmp = pretrained_dir(&[("config.json", HF_CONFIG)]);
        let pretrained = PretrainedEncoder::open(tmp.path(), "skt").unwrap();
        assert!(pretrained.check_max_len(16).is_ok());
        assert_eq!(
            pretrained.check_max_len(17),
            Err(TrainError::SequenceTooLong { max_len: 17, max_positions: 16 })
        );
    }

    #[test]
    fn test_missing_weights_are_fatal() {
        let tmp = pretrained_dir(&[("bert_config.json", HF_CONFIG)]);
        let pretrained = PretrainedEncoder::open(tmp.path(), "skt").unwrap();
        let device = Default::default();
        assert!(pretrained.load_classifier::<NdArray>(2, &device).is_err());
    }

    #[test]
    fn test_loads_burn_encoder_record() {
        let tmp = pretrained_dir(&[("bert_config.json", HF_CONFIG)]);
        let pretrained = PretrainedEncoder::open(tmp.path(), "skt").unwrap();
        let device = Default::default();

        let encoder = pretrained.encoder_config().init::<NdArray>(&device);
        NamedMpkFileRecorder::<FullPrecisionSettings>::new()
            .record(encoder.into_record(), pretrained.dir().join("model"))
            .unwrap();

        let model = pretrained.load_classifier::<NdArray>(7, &device).unwrap();
        assert_eq!(model.encoder.num_layers(), 2);
    }
}
