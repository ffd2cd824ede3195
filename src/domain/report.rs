// ============================================================
// Layer 3 — Classification Report
// ============================================================
// Scores a list of predictions against the true labels.
//
// Every quantity is a named field so callers never have to
// dig "accuracy" or "macro avg" out of an ordered map by
// position.
//
//   precision_c = TP_c / (TP_c + FP_c)
//   recall_c    = TP_c / (TP_c + FN_c)
//   f1_c        = 2 · P · R / (P + R)
//   accuracy    = #(pred == true) / N
//   macro_f1    = mean of f1_c over ALL configured classes
//
// A class that is never predicted and never present scores 0
// on every metric (zero-division → 0), and still counts in the
// macro mean. This keeps macro-F1 comparable between batches
// that happen to miss some classes.

use std::fmt;

/// Scores for one class.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassScores {
    pub label:     String,
    pub precision: f64,
    pub recall:    f64,
    pub f1:        f64,
    /// Number of true samples of this class
    pub support:   usize,
}

/// Square count matrix: rows are true classes, columns predictions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfusionMatrix {
    num_classes: usize,
    counts:      Vec<usize>,
}

impl ConfusionMatrix {
    pub fn new(num_classes: usize) -> Self {
        Self {
            num_classes,
            counts: vec![0; num_classes * num_classes],
        }
    }

    /// Record one prediction. Indices outside the class range are ignored.
    pub fn add(&mut self, truth: usize, predicted: usize) {
        if truth < self.num_classes && predicted < self.num_classes {
            self.counts[truth * self.num_classes + predicted] += 1;
        }
    }

    pub fn get(&self, truth: usize, predicted: usize) -> usize {
        self.counts[truth * self.num_classes + predicted]
    }

    fn row_sum(&self, truth: usize) -> usize {
        (0..self.num_classes).map(|p| self.get(truth, p)).sum()
    }

    fn col_sum(&self, predicted: usize) -> usize {
        (0..self.num_classes).map(|t| self.get(t, predicted)).sum()
    }
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .counts
            .iter()
            .map(|c| c.to_string().len())
            .max()
            .unwrap_or(1);

        for t in 0..self.num_classes {
            let row: Vec<String> = (0..self.num_classes)
                .map(|p| format!("{:>width$}", self.get(t, p)))
                .collect();
            writeln!(f, "[{}]", row.join(" "))?;
        }
        Ok(())
    }
}

/// Per-class and aggregate scores for one set of predictions.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationReport {
    pub per_class: Vec<ClassScores>,
    pub accuracy:  f64,
    pub macro_f1:  f64,
    pub confusion: ConfusionMatrix,
    /// Number of scored samples
    pub total:     usize,
}

impl ClassificationReport {
    /// Score `predicted` against `truth`, over exactly the classes in `labels`.
    pub fn compute<S: AsRef<str>>(truth: &[usize], predicted: &[usize], labels: &[S]) -> Self {
        let num_classes = labels.len();
        let mut confusion = ConfusionMatrix::new(num_classes);
        let mut correct = 0usize;

        for (&t, &p) in truth.iter().zip(predicted) {
            if t == p {
                correct += 1;
            }
            confusion.add(t, p);
        }

        let total = truth.len().min(predicted.len());
        let accuracy = if total > 0 { correct as f64 / total as f64 } else { 0.0 };

        let per_class: Vec<ClassScores> = labels
            .iter()
            .enumerate()
            .map(|(c, label)| {
                let tp = confusion.get(c, c) as f64;
                let support = confusion.row_sum(c);
                let predicted_as = confusion.col_sum(c);

                let precision = ratio(tp, predicted_as as f64);
                let recall = ratio(tp, support as f64);
                let f1 = ratio(2.0 * precision * recall, precision + recall);

                ClassScores {
                    label: label.as_ref().to_string(),
                    precision,
                    recall,
                    f1,
                    support,
                }
            })
            .collect();

        let macro_f1 = if num_classes > 0 {
            per_class.iter().map(|c| c.f1).sum::<f64>() / num_classes as f64
        } else {
            0.0
        };

        Self { per_class, accuracy, macro_f1, confusion, total }
    }

    /// "label : f1" lines, one per class, in label order.
    pub fn f1_breakdown(&self) -> String {
        self.per_class
            .iter()
            .map(|c| format!("{} : {:.4}", c.label, c.f1))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn ratio(num: f64, den: f64) -> f64 {
    if den > 0.0 { num / den } else { 0.0 }
}
