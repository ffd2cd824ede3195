use burn::data::dataset::Dataset;

use crate::domain::sample::Sample;

/// In-memory tokenised corpus.
/// Sequences are stored without boundary markers or padding;
/// the batcher frames and pads them per batch.
pub struct ClassificationDataset {
    samples: Vec<Sample>,
}

impl ClassificationDataset {
    pub fn new(samples: Vec<Sample>) -> Self { Self { samples } }

    pub fn sample_count(&self) -> usize { self.samples.len() }

    /// Number of samples per label id, for the startup log.
    pub fn label_histogram(&self, num_labels: usize) -> Vec<usize> {
        let mut counts = vec![0usize; num_labels];
        for s in &self.samples {
            if let Some(c) = counts.get_mut(s.label) {
                *c += 1;
            }
        }
        counts
    }

    /// Longest raw sequence, before markers are added.
    pub fn longest_sequence(&self) -> usize {
        self.samples.iter().map(|s| s.token_ids.len()).max().unwrap_or(0)
    }
}

impl Dataset<Sample> for ClassificationDataset {
    fn get(&self, index: usize) -> Option<Sample> {
        self.samples.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}
