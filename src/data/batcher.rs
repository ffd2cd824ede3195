// ============================================================
// Layer 4 — Classification Batcher
// ============================================================
// Turns a list of tokenised samples into three aligned tensors:
//
//   input_ids      [batch, len]  — framed and padded token ids
//   attention_mask [batch, len]  — 1 for real/marker tokens, 0 for pad
//   labels         [batch]       — label ids
//
// Framing, per sample:
//   [CLS] t1 t2 ... tn [SEP]
//
// then, against the effective length L of the batch:
//   shorter than L → right-pad with [PAD]
//   longer  than L → keep the LAST L tokens
//
// Tail truncation keeps [SEP] in the final slot; the price is
// that [CLS] and the earliest context fall off the front.
//
// L is the configured max length. With dynamic padding enabled
// it shrinks to the longest framed sample in the batch (never
// above the cap), so short batches don't pay for padding.
//
// The mask is read straight off the padded ids (id != pad), so
// it can never disagree with the padding.
//
// The pure `Collator` does the work and is unit-tested on plain
// vectors; `ClassificationBatcher` only uploads its output.
//
// Reference: Burn Book §4 (Batcher)

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
    tensor::TensorData,
};

use crate::domain::error::TrainError;
use crate::domain::sample::{Sample, SpecialTokens};

// ─── Collator ─────────────────────────────────────────────────────────────────
/// Frames, pads/truncates and masks a batch of samples.
#[derive(Debug, Clone)]
pub struct Collator {
    max_len:         usize,
    special:         SpecialTokens,
    dynamic_padding: bool,
}

/// Row-major output of the collator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollatedBatch {
    pub batch_size: usize,
    pub seq_len:    usize,
    /// `batch_size * seq_len` token ids
    pub tokens:     Vec<u32>,
    /// `batch_size * seq_len` mask values (0 or 1)
    pub mask:       Vec<u32>,
    pub labels:     Vec<usize>,
}

#[cfg(test)]
impl CollatedBatch {
    pub fn tokens_row(&self, i: usize) -> &[u32] {
        &self.tokens[i * self.seq_len..(i + 1) * self.seq_len]
    }

    pub fn mask_row(&self, i: usize) -> &[u32] {
        &self.mask[i * self.seq_len..(i + 1) * self.seq_len]
    }
}

impl Collator {
    pub fn new(max_len: usize, special: SpecialTokens) -> Self {
        Self { max_len, special, dynamic_padding: false }
    }

    /// Pad each batch only to its longest framed sample.
    pub fn with_dynamic_padding(mut self, enabled: bool) -> Self {
        self.dynamic_padding = enabled;
        self
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    pub fn special_tokens(&self) -> SpecialTokens {
        self.special
    }

    /// Length every row of this batch is padded/truncated to.
    pub fn effective_len(&self, samples: &[Sample]) -> usize {
        if !self.dynamic_padding {
            return self.max_len;
        }
        let longest = samples.iter().map(Sample::framed_len).max().unwrap_or(0);
        longest.min(self.max_len)
    }

    /// `[CLS] tokens [SEP]`, then right-pad or tail-truncate to `len`.
    pub fn frame(&self, tokens: &[u32], len: usize) -> Vec<u32> {
        let mut framed = Vec::with_capacity(tokens.len() + 2);
        framed.push(self.special.cls);
        framed.extend_from_slice(tokens);
        framed.push(self.special.sep);

        if framed.len() < len {
            framed.resize(len, self.special.pad);
            framed
        } else {
            framed.split_off(framed.len() - len)
        }
    }

    pub fn collate(&self, samples: &[Sample]) -> Result<CollatedBatch, TrainError> {
        if samples.is_empty() {
            return Err(TrainError::EmptyBatch);
        }

        let seq_len = self.effective_len(samples);
        let mut tokens = Vec::with_capacity(samples.len() * seq_len);
        for s in samples {
            tokens.extend(self.frame(&s.token_ids, seq_len));
        }

        let mask = tokens
            .iter()
            .map(|&t| u32::from(t != self.special.pad))
            .collect();

        Ok(CollatedBatch {
            batch_size: samples.len(),
            seq_len,
            tokens,
            mask,
            labels: samples.iter().map(|s| s.label).collect(),
        })
    }
}

// ─── ClassificationBatch ──────────────────────────────────────────────────────
/// A batch ready for the forward pass.
/// B is the Burn Backend, so the same batcher serves the
/// autodiff training loader and the inner-backend eval loader.
#[derive(Debug, Clone)]
pub struct ClassificationBatch<B: Backend> {
    /// [batch_size, seq_len]
    pub input_ids:      Tensor<B, 2, Int>,
    /// [batch_size, seq_len], 1 = attend, 0 = pad
    pub attention_mask: Tensor<B, 2, Int>,
    /// [batch_size]
    pub labels:         Tensor<B, 1, Int>,
}

impl<B: Backend> ClassificationBatch<B> {
    /// Upload a collated batch to `device`.
    pub fn from_collated(batch: &CollatedBatch, device: &B::Device) -> Self {
        let shape = [batch.batch_size, batch.seq_len];

        let ids: Vec<i64>    = batch.tokens.iter().map(|&t| t as i64).collect();
        let mask: Vec<i64>   = batch.mask.iter().map(|&m| m as i64).collect();
        let labels: Vec<i64> = batch.labels.iter().map(|&l| l as i64).collect();

        Self {
            input_ids:      Tensor::from_data(TensorData::new(ids, shape), device),
            attention_mask: Tensor::from_data(TensorData::new(mask, shape), device),
            labels:         Tensor::from_data(TensorData::new(labels, [batch.batch_size]), device),
        }
    }
}

// ─── ClassificationBatcher ────────────────────────────────────────────────────
#[derive(Clone, Debug)]
pub struct ClassificationBatcher<B: Backend> {
    collator: Collator,
    device:   B::Device,
}

impl<B: Backend> ClassificationBatcher<B> {
    pub fn new(collator: Collator, device: B::Device) -> Self {
        Self { collator, device }
    }
}

impl<B: Backend> Batcher<Sample, ClassificationBatch<B>> for ClassificationBatcher<B> {
    fn batch(&self, items: Vec<Sample>) -> ClassificationBatch<B> {
        // burn's loaders never hand an empty item list to a batcher
        match self.collator.collate(&items) {
            Ok(collated) => ClassificationBatch::from_collated(&collated, &self.device),
            Err(e) => panic!("batcher contract violated: {e}"),
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    const SPECIAL: SpecialTokens = SpecialTokens { pad: 0, cls: 1, sep: 2 };

    fn ints<const D: usize>(t: Tensor<NdArray, D, Int>) -> Vec<i64> {
        t.into_data().iter::<i64>().collect()
    }

    #[test]
    fn test_end_to_end_binary_scenario() {
        let collator = Collator::new(6, SPECIAL);
        let batch = collator
            .collate(&[Sample::new(vec![5, 6, 7], 0), Sample::new(vec![8, 9], 1)])
            .unwrap();

        assert_eq!(batch.tokens_row(0), &[1, 5, 6, 7, 2, 0]);
        assert_eq!(batch.tokens_row(1), &[1, 8, 9, 2, 0, 0]);
        assert_eq!(batch.mask_row(0), &[1, 1, 1, 1, 1, 0]);
        assert_eq!(batch.mask_row(1), &[1, 1, 1, 1, 0, 0]);
        assert_eq!(batch.labels, vec![0, 1]);
    }

    #[test]
    fn test_short_sequences_pad_to_effective_len() {
        let collator = Collator::new(12, SPECIAL);
        for n in 0..10 {
            let tokens: Vec<u32> = (10..10 + n as u32).collect();
            let batch = collator.collate(&[Sample::new(tokens, 0)]).unwrap();

            assert_eq!(batch.seq_len, 12);
            let mask = batch.mask_row(0);
            let ones = mask.iter().filter(|&&m| m == 1).count();
            assert_eq!(ones, n + 2);
            // ones first, then only zeros
            assert!(mask[..n + 2].iter().all(|&m| m == 1));
            assert!(mask[n + 2..].iter().all(|&m| m == 0));
        }
    }

    #[test]
    fn test_long_sequences_keep_tail_and_end_marker() {
        let collator = Collator::new(5, SPECIAL);
        let tokens: Vec<u32> = (10..30).collect();
        let batch = collator.collate(&[Sample::new(tokens, 1)]).unwrap();

        let row = batch.tokens_row(0);
        assert_eq!(row.len(), 5);
        assert_eq!(*row.last().unwrap(), SPECIAL.sep);
        assert_eq!(row, &[26, 27, 28, 29, 2]);
        assert!(batch.mask_row(0).iter().all(|&m| m == 1));
    }

    #[test]
    fn test_exact_fit_is_untouched() {
        let collator = Collator::new(5, SPECIAL);
        let batch = collator.collate(&[Sample::new(vec![7, 8, 9], 0)]).unwrap();
        assert_eq!(batch.tokens_row(0), &[1, 7, 8, 9, 2]);
    }

    #[test]
    fn test_collation_is_deterministic() {
        let collator = Collator::new(8, SPECIAL).with_dynamic_padding(true);
        let samples = vec![Sample::new(vec![4, 4, 4], 1), Sample::new(vec![3], 0)];
        assert_eq!(collator.collate(&samples).unwrap(), collator.collate(&samples).unwrap());
    }

    #[test]
    fn test_dynamic_padding_uses_longest_framed_sample() {
        let collator = Collator::new(10, SPECIAL).with_dynamic_padding(true);
        let batch = collator
            .collate(&[Sample::new(vec![5, 6, 7], 0), Sample::new(vec![8, 9], 1)])
            .unwrap();

        assert_eq!(batch.seq_len, 5);
        assert_eq!(batch.tokens_row(0), &[1, 5, 6, 7, 2]);
        assert_eq!(batch.tokens_row(1), &[1, 8, 9, 2, 0]);
    }

    #[test]
    fn test_dynamic_padding_is_capped() {
        let collator = Collator::new(4, SPECIAL).with_dynamic_padding(true);
        let batch = collator.collate(&[Sample::new(vec![5, 6, 7, 8, 9], 0)]).unwrap();
        assert_eq!(batch.seq_len, 4);
        assert_eq!(batch.tokens_row(0), &[7, 8, 9, 2]);
    }

    #[test]
    fn test_empty_batch_is_rejected() {
        let collator = Collator::new(6, SPECIAL);
        assert_eq!(collator.collate(&[]), Err(TrainError::EmptyBatch));
    }

    #[test]
    fn test_batcher_builds_aligned_tensors() {
        let device = Default::default();
        let batcher = ClassificationBatcher::<NdArray>::new(Collator::new(6, SPECIAL), device);
        let batch = batcher.batch(vec![Sample::new(vec![5, 6, 7], 0), Sample::new(vec![8, 9], 1)]);

        assert_eq!(batch.input_ids.dims(), [2, 6]);
        assert_eq!(batch.attention_mask.dims(), [2, 6]);
        assert_eq!(batch.labels.dims(), [2]);

        assert_eq!(ints(batch.input_ids), vec![1, 5, 6, 7, 2, 0, 1, 8, 9, 2, 0, 0]);
        assert_eq!(ints(batch.attention_mask), vec![1, 1, 1, 1, 1, 0, 1, 1, 1, 1, 0, 0]);
        assert_eq!(ints(batch.labels), vec![0, 1]);
    }
}
