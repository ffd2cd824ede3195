// ============================================================
// Layer 5 — Precision Strategy
// ============================================================
// The training loop talks to one of two strategies through the
// same three calls, without knowing which is active:
//
//   scale_loss(loss)         before backward
//   unscale_and_clip(grads)  before the optimizer step
//   update(overflow)         after the step (or the skipped step)
//
//   Full            loss untouched, grads only clipped
//   Scaled(scaler)  loss × S before backward, grads × 1/S after;
//                   dynamic scalers shrink S on overflow and grow
//                   it again after a run of clean steps
//
// Optimisation levels (as accepted by `--fp16-opt-level`):
//   O0       full precision even with --fp16
//   O1, O2   dynamic scaling, initial S = 2^16
//   O3       static S = 1
//
// Half-precision arithmetic itself comes from the backend the
// trainer picks (Wgpu with f16 floats); this module only owns
// the scale bookkeeping.

use burn::{
    module::AutodiffModule,
    optim::GradientsParams,
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use serde::{Deserialize, Serialize};

use crate::ml::grads;

const INITIAL_DYNAMIC_SCALE: f64 = 65536.0;
const GROWTH_INTERVAL: usize = 2000;
const GROWTH_FACTOR: f64 = 2.0;
const BACKOFF_FACTOR: f64 = 0.5;
const MIN_SCALE: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptLevel {
    O0,
    O1,
    O2,
    O3,
}

// ─── LossScaler ───────────────────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq)]
pub struct LossScaler {
    scale:       f64,
    dynamic:     bool,
    clean_steps: usize,
}

impl LossScaler {
    pub fn dynamic() -> Self {
        Self { scale: INITIAL_DYNAMIC_SCALE, dynamic: true, clean_steps: 0 }
    }

    pub fn fixed(scale: f64) -> Self {
        Self { scale, dynamic: false, clean_steps: 0 }
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Adjust the scale after a step; overflowed steps were skipped.
    pub fn update(&mut self, overflow: bool) {
        if !self.dynamic {
            return;
        }
        if overflow {
            self.scale = (self.scale * BACKOFF_FACTOR).max(MIN_SCALE);
            self.clean_steps = 0;
            return;
        }
        self.clean_steps += 1;
        if self.clean_steps == GROWTH_INTERVAL {
            self.scale *= GROWTH_FACTOR;
            self.clean_steps = 0;
        }
    }
}

// ─── Precision ────────────────────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq)]
pub enum Precision {
    Full,
    Scaled(LossScaler),
}

/// Result of preparing accumulated gradients for an update.
pub enum ClipOutcome {
    /// Gradients ready for the optimizer, with their pre-clip global norm.
    Apply { grads: GradientsParams, norm: f64 },
    /// Non-finite gradients; the update must be skipped.
    Overflow,
}

impl Precision {
    pub fn from_options(fp16: bool, level: OptLevel) -> Self {
        match (fp16, level) {
            (false, _) | (true, OptLevel::O0) => Precision::Full,
            (true, OptLevel::O1 | OptLevel::O2) => Precision::Scaled(LossScaler::dynamic()),
            (true, OptLevel::O3) => Precision::Scaled(LossScaler::fixed(1.0)),
        }
    }

    pub fn is_scaled(&self) -> bool {
        matches!(self, Precision::Scaled(_))
    }

    pub fn loss_scale(&self) -> f64 {
        match self {
            Precision::Full => 1.0,
            Precision::Scaled(scaler) => scaler.scale(),
        }
    }

    pub fn scale_loss<B: Backend>(&self, loss: Tensor<B, 1>) -> Tensor<B, 1> {
        match self {
            Precision::Full => loss,
            Precision::Scaled(scaler) => loss.mul_scalar(scaler.scale()),
        }
    }

    /// Undo the loss scale and clip to `max_norm` (global L2 norm).
    pub fn unscale_and_clip<B, M>(&self, module: &M, grads: GradientsParams, max_norm: f64) -> ClipOutcome
    where
        B: AutodiffBackend,
        M: AutodiffModule<B>,
    {
        let inv_scale = 1.0 / self.loss_scale();
        match grads::clip_global_norm(module, grads, inv_scale, max_norm) {
            Some((grads, norm)) => ClipOutcome::Apply { grads, norm },
            None => ClipOutcome::Overflow,
        }
    }

    pub fn update(&mut self, overflow: bool) {
        if let Precision::Scaled(scaler) = self {
            scaler.update(overflow);
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opt_level_selection() {
        assert_eq!(Precision::from_options(false, OptLevel::O1), Precision::Full);
        assert_eq!(Precision::from_options(true, OptLevel::O0), Precision::Full);
        assert_eq!(Precision::from_options(true, OptLevel::O2).loss_scale(), 65536.0);
        assert_eq!(
            Precision::from_options(true, OptLevel::O3),
            Precision::Scaled(LossScaler::fixed(1.0))
        );
    }

    #[test]
    fn test_dynamic_scale_backs_off_on_overflow() {
        let mut scaler = LossScaler::dynamic();
        scaler.update(true);
        assert_eq!(scaler.scale(), 32768.0);
        scaler.update(true);
        assert_eq!(scaler.scale(), 16384.0);
    }

    #[test]
    fn test_dynamic_scale_grows_after_clean_interval() {
        let mut scaler = LossScaler::dynamic();
        for _ in 0..GROWTH_INTERVAL - 1 {
            scaler.update(false);
        }
        assert_eq!(scaler.scale(), 65536.0);
        scaler.update(false);
        assert_eq!(scaler.scale(), 131072.0);
    }

    #[test]
    fn test_overflow_resets_growth_counter() {
        let mut scaler = LossScaler::dynamic();
        for _ in 0..GROWTH_INTERVAL - 1 {
            scaler.update(false);
        }
        scaler.update(true);
        scaler.update(false);
        assert_eq!(scaler.scale(), 32768.0);
    }

    #[test]
    fn test_static_scale_never_moves() {
        let mut p = Precision::from_options(true, OptLevel::O3);
        p.update(true);
        p.update(false);
        assert_eq!(p.loss_scale(), 1.0);
    }

    #[test]
    fn test_scale_floor() {
        let mut scaler = LossScaler::dynamic();
        for _ in 0..40 {
            scaler.update(true);
        }
        assert_eq!(scaler.scale(), 1.0);
    }
}
