// ============================================================
// Layer 6 — Metrics Timeline
// ============================================================
// Records train and validation metrics to a CSV file after each
// epoch, keyed by global step, so learning curves can be plotted
// with any spreadsheet or plotting tool.
//
// Output file: <run dir>/metrics.csv
//
// Example CSV output:
//   step,epoch,train_loss,val_loss,train_acc,val_acc,train_macro_f1,val_macro_f1
//   120,1,1.412000,1.298000,0.455000,0.503000,0.391000,0.447000
//   240,2,1.103000,1.187000,0.588000,0.561000,0.532000,0.509000
//
// How to read the metrics:
//   - If val_loss increases while train_loss decreases → overfitting
//   - train_* are means of noisy per-batch scores; val_* are
//     computed over the whole validation set
//
// Re-running a configuration appends to the same file; the
// header is written only when the file is created.

use anyhow::{Context, Result};
use std::{
    fs::{self, OpenOptions},
    path::{Path, PathBuf},
};
use serde::{Deserialize, Serialize};

use crate::ml::state::StepMetrics;

/// One row of the timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochRecord {
    pub step:           usize,
    pub epoch:          usize,
    pub train_loss:     f64,
    pub val_loss:       f64,
    pub train_acc:      f64,
    pub val_acc:        f64,
    pub train_macro_f1: f64,
    pub val_macro_f1:   f64,
}

impl EpochRecord {
    pub fn new(step: usize, epoch: usize, train: &StepMetrics, val: &StepMetrics) -> Self {
        Self {
            step,
            epoch,
            train_loss:     train.loss,
            val_loss:       val.loss,
            train_acc:      train.accuracy,
            val_acc:        val.accuracy,
            train_macro_f1: train.macro_f1,
            val_macro_f1:   val.macro_f1,
        }
    }
}

/// Appends epoch records to `metrics.csv`.
pub struct MetricsTimeline {
    csv_path: PathBuf,
}

impl MetricsTimeline {
    pub fn new(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)?;
        Ok(Self { csv_path: dir.join("metrics.csv") })
    }

    pub fn record(&self, row: &EpochRecord) -> Result<()> {
        let is_new = fs::metadata(&self.csv_path).map(|m| m.len() == 0).unwrap_or(true);

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.csv_path)
            .with_context(|| format!("Cannot open '{}'", self.csv_path.display()))?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(is_new)
            .from_writer(file);
        writer.serialize(row)?;
        writer.flush()?;

        tracing::debug!(
            "Logged step {} metrics: train_loss={:.4}, val_loss={:.4}",
            row.step,
            row.train_loss,
            row.val_loss,
        );
        Ok(())
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn row(step: usize, val_loss: f64) -> EpochRecord {
        EpochRecord::new(
            step,
            step / 10,
            &StepMetrics::new(1.0, 0.5, 0.4),
            &StepMetrics::new(val_loss, 0.6, 0.5),
        )
    }

    #[test]
    fn test_timeline_writes_header_once() {
        let tmp = tempfile::tempdir().unwrap();
        let timeline = MetricsTimeline::new(tmp.path()).unwrap();
        timeline.record(&row(10, 1.2)).unwrap();
        timeline.record(&row(20, 1.1)).unwrap();

        let text = fs::read_to_string(timeline.csv_path()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[0],
            "step,epoch,train_loss,val_loss,train_acc,val_acc,train_macro_f1,val_macro_f1"
        );
        assert!(lines[2].starts_with("20,2,"));

        let mut reader = csv::Reader::from_path(timeline.csv_path()).unwrap();
        let rows: Vec<EpochRecord> = reader.deserialize().map(|r| r.unwrap()).collect();
        assert_eq!(rows[1], row(20, 1.1));
    }
}
