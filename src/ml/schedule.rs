// ============================================================
// Layer 5 — Warmup-Linear Learning-Rate Schedule
// ============================================================
// Ramps the learning rate linearly from 0 to its peak over the
// warmup steps, then decays it linearly to 0 at the last step:
//
//   lr(s) = peak · s / max(1, warmup)                       s < warmup
//   lr(s) = peak · max(0, (total − s) / max(1, total − warmup))  otherwise
//
// The schedule is advanced once per optimizer update, BEFORE
// the update is applied, so update n runs at lr(n + 1).
//
//   t_total = (batches_per_epoch / accumulation) · epochs
//   warmup  = floor(t_total · warmup_percent)

use crate::domain::traits::LearningRateSchedule;

#[derive(Debug, Clone)]
pub struct WarmupLinearSchedule {
    peak_lr:      f64,
    warmup_steps: usize,
    total_steps:  usize,
    step:         usize,
}

impl WarmupLinearSchedule {
    pub fn new(peak_lr: f64, warmup_steps: usize, total_steps: usize) -> Self {
        Self { peak_lr, warmup_steps, total_steps, step: 0 }
    }

    /// Derive step counts from the shape of a training run.
    pub fn for_run(
        peak_lr:           f64,
        batches_per_epoch: usize,
        accumulation:      usize,
        epochs:            usize,
        warmup_percent:    f64,
    ) -> Self {
        let total_steps  = batches_per_epoch / accumulation.max(1) * epochs;
        let warmup_steps = (total_steps as f64 * warmup_percent).floor() as usize;
        Self::new(peak_lr, warmup_steps, total_steps)
    }

    pub fn total_steps(&self) -> usize {
        self.total_steps
    }

    pub fn warmup_steps(&self) -> usize {
        self.warmup_steps
    }

    /// Fraction of the peak rate at step `s`.
    pub fn multiplier(&self, s: usize) -> f64 {
        if s < self.warmup_steps {
            return s as f64 / self.warmup_steps.max(1) as f64;
        }
        let remaining = self.total_steps.saturating_sub(s) as f64;
        let decay_len = self.total_steps.saturating_sub(self.warmup_steps).max(1) as f64;
        (remaining / decay_len).max(0.0)
    }

    pub fn lr_at(&self, s: usize) -> f64 {
        self.peak_lr * self.multiplier(s)
    }
}

impl LearningRateSchedule for WarmupLinearSchedule {
    fn step(&mut self) -> f64 {
        self.step += 1;
        self.lr_at(self.step)
    }

    fn current_lr(&self) -> f64 {
        self.lr_at(self.step)
    }
}
