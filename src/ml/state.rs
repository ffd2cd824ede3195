// ============================================================
// Layer 5 — Training State
// ============================================================
// Step accounting for the training loop, kept free of tensors
// so every counting rule can be unit-tested directly.
//
//   micro-batch ──► record_micro_batch()   (contribution / G)
//        ×G
//   window full ──► commit_step()          global_step += 1
//                                          every logging_step → delta
//   epoch end   ──► epoch_means()          totals / optimizer steps
//               ──► observe_validation()   strict improvement only
//
// Contributions of an unfinished window stay "pending" and are
// only folded into the running totals when its optimizer step
// happens, so a logged value always describes whole windows.

/// Loss / accuracy / macro-F1 triple used for all running sums.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StepMetrics {
    pub loss:     f64,
    pub accuracy: f64,
    pub macro_f1: f64,
}

impl StepMetrics {
    pub fn new(loss: f64, accuracy: f64, macro_f1: f64) -> Self {
        Self { loss, accuracy, macro_f1 }
    }

    fn add(&mut self, other: StepMetrics) {
        self.loss     += other.loss;
        self.accuracy += other.accuracy;
        self.macro_f1 += other.macro_f1;
    }

    fn minus(self, other: StepMetrics) -> StepMetrics {
        StepMetrics::new(
            self.loss - other.loss,
            self.accuracy - other.accuracy,
            self.macro_f1 - other.macro_f1,
        )
    }

    fn scaled(self, factor: f64) -> StepMetrics {
        StepMetrics::new(self.loss * factor, self.accuracy * factor, self.macro_f1 * factor)
    }
}

/// Counters and running sums of one training run.
#[derive(Debug, Clone)]
pub struct TrainingState {
    accumulation:    usize,
    logging_step:    usize,

    global_step:     usize,
    micro_in_window: usize,

    pending:         StepMetrics,
    run_totals:      StepMetrics,
    last_logged:     StepMetrics,

    epoch_totals:    StepMetrics,
    epoch_steps:     usize,

    best_val_loss:   f64,
    best_val_acc:    Option<f64>,
}

impl TrainingState {
    pub fn new(accumulation: usize, logging_step: usize) -> Self {
        Self {
            accumulation:    accumulation.max(1),
            logging_step:    logging_step.max(1),
            global_step:     0,
            micro_in_window: 0,
            pending:         StepMetrics::default(),
            run_totals:      StepMetrics::default(),
            last_logged:     StepMetrics::default(),
            epoch_totals:    StepMetrics::default(),
            epoch_steps:     0,
            best_val_loss:   f64::INFINITY,
            best_val_acc:    None,
        }
    }

    /// Value the loss tensor is divided by before backward.
    pub fn loss_divisor(&self) -> f64 {
        self.accumulation as f64
    }

    /// Record one micro-batch's raw loss/accuracy/macro-F1.
    /// Returns true when this micro-batch completes a window and
    /// the optimizer should step.
    pub fn record_micro_batch(&mut self, raw: StepMetrics) -> bool {
        self.pending.add(raw.scaled(1.0 / self.accumulation as f64));
        self.micro_in_window += 1;
        self.micro_in_window == self.accumulation
    }

    /// Account for one optimizer update. Returns the per-step
    /// average since the previous logging point when this step
    /// lands on a logging boundary.
    pub fn commit_step(&mut self) -> Option<StepMetrics> {
        self.run_totals.add(self.pending);
        self.epoch_totals.add(self.pending);
        self.pending = StepMetrics::default();
        self.micro_in_window = 0;

        self.global_step += 1;
        self.epoch_steps += 1;

        if self.global_step % self.logging_step != 0 {
            return None;
        }
        let delta = self
            .run_totals
            .minus(self.last_logged)
            .scaled(1.0 / self.logging_step as f64);
        self.last_logged = self.run_totals;
        Some(delta)
    }

    /// Reset per-epoch sums at the start of an epoch.
    pub fn start_epoch(&mut self) {
        self.epoch_totals = StepMetrics::default();
        self.epoch_steps = 0;
        self.discard_partial_window();
    }

    /// Drop the contributions of an unfinished window.
    /// Returns how many micro-batches were discarded.
    pub fn discard_partial_window(&mut self) -> usize {
        let dropped = self.micro_in_window;
        self.pending = StepMetrics::default();
        self.micro_in_window = 0;
        dropped
    }

    /// Epoch totals divided by the optimizer steps taken in the
    /// epoch; `None` when the epoch produced no step.
    pub fn epoch_means(&self) -> Option<StepMetrics> {
        if self.epoch_steps == 0 {
            return None;
        }
        Some(self.epoch_totals.scaled(1.0 / self.epoch_steps as f64))
    }

    /// Record an epoch's validation result. Returns true when the
    /// loss strictly improves on the best so far.
    pub fn observe_validation(&mut self, val_loss: f64, val_acc: f64) -> bool {
        if val_loss < self.best_val_loss {
            self.best_val_loss = val_loss;
            self.best_val_acc = Some(val_acc);
            true
        } else {
            false
        }
    }

    pub fn global_step(&self) -> usize {
        self.global_step
    }

    pub fn best_val_loss(&self) -> f64 {
        self.best_val_loss
    }

    pub fn best_val_acc(&self) -> Option<f64> {
        self.best_val_acc
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_accumulation_of_two_over_four_micro_batches() {
        let l = 0.8;
        let mut state = TrainingState::new(2, 1);
        state.start_epoch();

        let mut steps = 0;
        let mut micro_since_step = 0;
        let mut logged = Vec::new();

        for _ in 0..4 {
            micro_since_step += 1;
            if state.record_micro_batch(StepMetrics::new(l, 0.5, 0.4)) {
                assert_eq!(micro_since_step, 2);
                micro_since_step = 0;
                steps += 1;
                logged.extend(state.commit_step());
            }
        }

        assert_eq!(steps, 2);
        assert_eq!(state.global_step(), 2);
        assert_eq!(logged.len(), 2);
        for delta in logged {
            assert!(close(delta.loss, l));
            assert!(close(delta.accuracy, 0.5));
            assert!(close(delta.macro_f1, 0.4));
        }
    }

    #[test]
    fn test_logging_delta_averages_over_interval() {
        let mut state = TrainingState::new(1, 2);
        state.record_micro_batch(StepMetrics::new(1.0, 0.0, 0.0));
        assert_eq!(state.commit_step(), None);
        state.record_micro_batch(StepMetrics::new(3.0, 1.0, 1.0));
        let delta = state.commit_step().unwrap();
        assert!(close(delta.loss, 2.0));
        assert!(close(delta.accuracy, 0.5));

        // the next delta only covers steps 3 and 4
        state.record_micro_batch(StepMetrics::new(5.0, 1.0, 1.0));
        state.commit_step();
        state.record_micro_batch(StepMetrics::new(5.0, 1.0, 1.0));
        let delta = state.commit_step().unwrap();
        assert!(close(delta.loss, 5.0));
    }

    #[test]
    fn test_logging_spans_epoch_boundary() {
        let mut state = TrainingState::new(1, 3);
        state.start_epoch();
        for _ in 0..2 {
            state.record_micro_batch(StepMetrics::new(1.0, 1.0, 1.0));
            assert!(state.commit_step().is_none());
        }
        state.start_epoch();
        state.record_micro_batch(StepMetrics::new(4.0, 1.0, 1.0));
        let delta = state.commit_step().unwrap();
        assert!(close(delta.loss, 2.0));
    }

    #[test]
    fn test_epoch_means_divide_by_optimizer_steps() {
        let mut state = TrainingState::new(2, 100);
        state.start_epoch();
        for loss in [1.0, 3.0, 2.0, 2.0] {
            if state.record_micro_batch(StepMetrics::new(loss, 1.0, 0.5)) {
                state.commit_step();
            }
        }
        let means = state.epoch_means().unwrap();
        assert_eq!(state.global_step(), 2);
        assert!(close(means.loss, 2.0));
        assert!(close(means.accuracy, 1.0));
        assert!(close(means.macro_f1, 0.5));
    }

    #[test]
    fn test_partial_window_is_discarded() {
        let mut state = TrainingState::new(3, 1);
        state.start_epoch();
        state.record_micro_batch(StepMetrics::new(9.0, 1.0, 1.0));
        state.record_micro_batch(StepMetrics::new(9.0, 1.0, 1.0));
        assert_eq!(state.discard_partial_window(), 2);
        assert_eq!(state.epoch_means(), None);

        state.start_epoch();
        for _ in 0..3 {
            state.record_micro_batch(StepMetrics::new(3.0, 0.0, 0.0));
        }
        let delta = state.commit_step().unwrap();
        assert!(close(delta.loss, 3.0));
    }

    #[test]
    fn test_best_loss_is_monotone() {
        let mut state = TrainingState::new(1, 1);
        assert_eq!(state.best_val_acc(), None);

        let mut previous = state.best_val_loss();
        let mut saves = 0;
        for (loss, acc) in [(0.9, 0.5), (1.2, 0.9), (0.7, 0.6), (0.7, 0.8), (0.8, 0.7)] {
            if state.observe_validation(loss, acc) {
                saves += 1;
            }
            assert!(state.best_val_loss() <= previous);
            previous = state.best_val_loss();
        }

        assert_eq!(saves, 2);
        assert_eq!(state.best_val_loss(), 0.7);
        assert_eq!(state.best_val_acc(), Some(0.6));
    }
}
