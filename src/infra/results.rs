// ============================================================
// Layer 6 — Result Recorder
// ============================================================
// Append-only results table shared by every run under one
// output directory (`<output_dir>/results.csv`): one row per
// completed run, holding its configuration columns followed by
// the best validation loss and the accuracy at that epoch.
//
// The header comes from the first row ever written. Later runs
// only append; a run with different columns still appends under
// the existing header.

use anyhow::{Context, Result};
use std::{
    fs::{self, OpenOptions},
    path::PathBuf,
};

pub struct ResultWriter {
    path: PathBuf,
}

impl ResultWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Append one run: `columns` then `val_loss`, `val_acc`.
    pub fn update(&self, columns: &[(&str, String)], val_loss: f64, val_acc: Option<f64>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let is_new = fs::metadata(&self.path).map(|m| m.len() == 0).unwrap_or(true);

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Cannot open results table '{}'", self.path.display()))?;
        let mut writer = csv::Writer::from_writer(file);

        if is_new {
            let header = columns
                .iter()
                .map(|(name, _)| *name)
                .chain(["val_loss", "val_acc"]);
            writer.write_record(header)?;
        }

        let val_acc = val_acc.map_or_else(|| f64::NAN.to_string(), |a| a.to_string());
        let row = columns
            .iter()
            .map(|(_, value)| value.clone())
            .chain([val_loss.to_string(), val_acc]);
        writer.write_record(row)?;
        writer.flush()?;

        tracing::info!("Results appended to '{}'", self.path.display());
        Ok(())
    }
}
