// ============================================================
// Layer 5 — Evaluation Loop
// ============================================================
// Scores a model on a held-out loader.
//
// Unlike the per-micro-batch numbers logged during training,
// accuracy and macro-F1 here come from ONE report over every
// prediction in the loader. Loss is the mean of batch losses.
//
// Call with `model.valid()` so the pass runs on the inner
// backend with dropout disabled.

use anyhow::Result;
use burn::{data::dataloader::DataLoader, prelude::*};

use crate::data::batcher::ClassificationBatch;
use crate::domain::error::TrainError;
use crate::domain::report::ClassificationReport;
use crate::infra::run_log::RunLog;
use crate::ml::model::EmotionClassifier;
use crate::ml::state::StepMetrics;

/// Corpus-level evaluation result.
#[derive(Debug, Clone)]
pub struct EvalResult {
    pub loss:     f64,
    pub accuracy: f64,
    pub macro_f1: f64,
    pub report:   ClassificationReport,
}

impl EvalResult {
    pub fn metrics(&self) -> StepMetrics {
        StepMetrics::new(self.loss, self.accuracy, self.macro_f1)
    }
}

pub fn evaluate<B: Backend>(
    model:  &EmotionClassifier<B>,
    loader: &dyn DataLoader<ClassificationBatch<B>>,
    log:    &RunLog,
) -> Result<EvalResult> {
    let mut loss_sum  = 0.0f64;
    let mut batches   = 0usize;
    let mut truth     = Vec::new();
    let mut predicted = Vec::new();

    for batch in loader.iter() {
        truth.extend(to_labels(batch.labels.clone()));

        let (loss, logits) = model.forward_loss(batch.input_ids, batch.attention_mask, batch.labels);
        loss_sum += loss.into_scalar().elem::<f64>();
        batches  += 1;

        predicted.extend(to_labels(argmax_rows(logits)));
    }

    if batches == 0 {
        return Err(TrainError::EmptyDataset("evaluation loader".into()).into());
    }

    let report = ClassificationReport::compute(&truth, &predicted, log.labels().labels());

    {
        let _enter = log.span().enter();
        tracing::info!("***** Evaluation Results *****");
    }
    log.class_breakdown(&report);

    Ok(EvalResult {
        loss:     loss_sum / batches as f64,
        accuracy: report.accuracy,
        macro_f1: report.macro_f1,
        report,
    })
}

/// Predicted class per row: [batch, classes] → [batch].
pub fn argmax_rows<B: Backend>(logits: Tensor<B, 2>) -> Tensor<B, 1, Int> {
    // argmax(1) returns shape [batch, 1]; flatten to [batch]
    logits.argmax(1).flatten::<1>(0, 1)
}

pub fn to_labels<B: Backend>(t: Tensor<B, 1, Int>) -> Vec<usize> {
    t.into_data().iter::<i64>().map(|v| v as usize).collect()
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::{
        backend::NdArray,
        data::dataloader::DataLoaderBuilder,
        tensor::TensorData,
    };

    use crate::data::batcher::{ClassificationBatcher, Collator};
    use crate::data::dataset::ClassificationDataset;
    use crate::domain::labels::LabelSet;
    use crate::domain::sample::{Sample, SpecialTokens};
    use crate::ml::model::tests::tiny_config;

    #[test]
    fn test_argmax_rows() {
        let device = Default::default();
        let logits = Tensor::<NdArray, 2>::from_data(
            TensorData::new(vec![0.1f32, 2.0, 3.0, -1.0, 0.5, 0.4], [3, 2]),
            &device,
        );
        assert_eq!(to_labels(argmax_rows(logits)), vec![1, 0, 0]);
    }

    #[test]
    fn test_evaluate_scores_every_sample() {
        let device = Default::default();
        let model = tiny_config(2).init::<NdArray>(&device);
        let special = SpecialTokens { pad: 0, cls: 1, sep: 2 };

        let samples: Vec<Sample> = (0..5)
            .map(|i| Sample::new(vec![3 + i as u32, 4, 5], i % 2))
            .collect();
        let loader = DataLoaderBuilder::new(ClassificationBatcher::<NdArray>::new(
            Collator::new(8, special),
            device,
        ))
        .batch_size(2)
        .build(ClassificationDataset::new(samples));

        let log = RunLog::new("test", LabelSet::TwoClass);
        let result = evaluate(&model, loader.as_ref(), &log).unwrap();

        assert_eq!(result.report.total, 5);
        assert!(result.loss.is_finite());
        assert!((0.0..=1.0).contains(&result.accuracy));
        assert_eq!(result.report.per_class.len(), 2);
    }
}
