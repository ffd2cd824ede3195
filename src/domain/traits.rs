// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The training pipeline talks to its collaborators through
// these traits, so a different corpus format or a different
// learning-rate policy can be swapped in without touching
// the loops.

use anyhow::Result;

use crate::domain::labels::LabelSet;

// ─── RawExample ───────────────────────────────────────────────────────────────
/// A sentence with its class name, before tokenisation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawExample {
    pub text:  String,
    pub label: usize,
}

// ─── SampleSource ─────────────────────────────────────────────────────────────
/// Anything that can produce labelled sentences.
///
/// Implementations:
///   - CsvSampleLoader → reads a `Sentence,Emotion` CSV file
pub trait SampleSource {
    /// Load every example, mapping class names into `labels`.
    fn load_examples(&self, labels: LabelSet) -> Result<Vec<RawExample>>;
}

// ─── LearningRateSchedule ─────────────────────────────────────────────────────
/// A per-update learning-rate policy.
///
/// Implementations:
///   - WarmupLinearSchedule → linear warmup, then linear decay to zero
pub trait LearningRateSchedule {
    /// Advance by one optimizer update and return the rate to use for it.
    fn step(&mut self) -> f64;

    /// The rate at the current position, without advancing.
    fn current_lr(&self) -> f64;
}
