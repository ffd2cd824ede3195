// ============================================================
// Layer 5 — Inferencer
// ============================================================
// Classifies single sentences with the best model of a run.
// Text goes through the same cleaning, tokenisation and framing
// as training data, so a sentence is seen exactly as it would
// have been in the corpus.
use anyhow::{Context, Result};
use burn::{prelude::*, tensor::activation::softmax};
use tokenizers::Tokenizer;

use crate::data::{batcher::{ClassificationBatch, Collator}, preprocessor::Preprocessor};
use crate::domain::labels::LabelSet;
use crate::domain::sample::Sample;
use crate::ml::model::EmotionClassifier;

/// Predicted label with its softmax probability and the full distribution.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub label:        &'static str,
    pub probability:  f64,
    pub distribution: Vec<(&'static str, f64)>,
}

pub struct Inferencer<B: Backend> {
    model:        EmotionClassifier<B>,
    collator:     Collator,
    tokenizer:    Tokenizer,
    preprocessor: Preprocessor,
    labels:       LabelSet,
    device:       B::Device,
}

impl<B: Backend> Inferencer<B> {
    pub fn new(
        model:     EmotionClassifier<B>,
        collator:  Collator,
        tokenizer: Tokenizer,
        labels:    LabelSet,
        device:    B::Device,
    ) -> Self {
        Self { model, collator, tokenizer, preprocessor: Preprocessor::new(), labels, device }
    }

    pub fn predict(&self, text: &str) -> Result<Prediction> {
        let clean = self.preprocessor.clean(text);
        let enc = self.tokenizer
            .encode(clean.as_str(), false)
            .map_err(|e| anyhow::anyhow!("Tokenisation error: {e}"))?;

        // label is a placeholder; no loss is computed
        let sample = Sample::new(enc.get_ids().to_vec(), 0);
        let collated = self.collator.collate(std::slice::from_ref(&sample))?;
        let batch = ClassificationBatch::<B>::from_collated(&collated, &self.device);

        let output = self.model.forward(batch.input_ids, batch.attention_mask, None);
        let probs: Vec<f64> = softmax(output.logits, 1)
            .into_data()
            .iter::<f64>()
            .collect();

        let (best, probability) = probs
            .iter()
            .copied()
            .enumerate()
            .fold((0, f64::NEG_INFINITY), |best, cur| if cur.1 > best.1 { cur } else { best });
        let label = self
            .labels
            .name_of(best)
            .with_context(|| format!("Model predicted class {best} outside '{}'", self.labels))?;

        let distribution: Vec<(&'static str, f64)> = self
            .labels
            .labels()
            .iter()
            .copied()
            .zip(probs)
            .collect();

        tracing::debug!("Distribution: {:?}", distribution);
        Ok(Prediction { label, probability, distribution })
    }
}
