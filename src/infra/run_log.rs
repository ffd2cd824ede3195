// ============================================================
// Layer 6 — Run Log
// ============================================================
// Logging context for one run. Built once by the use case and
// passed by reference into the training and evaluation loops,
// so every line they emit sits inside the run's span and can
// name labels and progress without global state.
//
// The tracing subscriber itself is installed once in main().

use tracing::Span;

use crate::domain::labels::LabelSet;
use crate::domain::report::ClassificationReport;
use crate::ml::state::StepMetrics;

pub struct RunLog {
    span:        Span,
    labels:      LabelSet,
    total_steps: usize,
}

impl RunLog {
    pub fn new(run_name: &str, labels: LabelSet) -> Self {
        Self {
            span: tracing::info_span!("run", name = %run_name),
            labels,
            total_steps: 0,
        }
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn labels(&self) -> LabelSet {
        self.labels
    }

    pub fn total_steps(&self) -> usize {
        self.total_steps
    }

    pub fn set_total_steps(&mut self, total_steps: usize) {
        self.total_steps = total_steps;
    }

    /// Periodic training line at a logging boundary.
    pub fn training_progress(&self, step: usize, delta: &StepMetrics, lr: f64) {
        let _enter = self.span.enter();
        tracing::info!(
            "[{}/{}] trn loss : {:.3}, trn acc : {:.3}, macro f1 : {:.3}, lr : {:.3e}",
            step,
            self.total_steps,
            delta.loss,
            delta.accuracy,
            delta.macro_f1,
            lr,
        );
    }

    /// Per-class F1 and confusion matrix of a report.
    pub fn class_breakdown(&self, report: &ClassificationReport) {
        let _enter = self.span.enter();
        tracing::info!(
            "\n***f1-score***\n{}\n***confusion matrix***\n{}",
            report.f1_breakdown(),
            report.confusion,
        );
    }

    /// Train and validation metrics side by side at the end of an epoch.
    pub fn epoch_summary(&self, epoch: usize, step: usize, train: &StepMetrics, val: &StepMetrics) {
        let _enter = self.span.enter();
        tracing::info!(
            "epoch {} [{}/{}] tr loss : {:.3}, tr acc : {:.3}, tr macro f1 : {:.3}",
            epoch, step, self.total_steps, train.loss, train.accuracy, train.macro_f1,
        );
        tracing::info!(
            "epoch {} [{}/{}] val loss : {:.3}, val acc : {:.3}, val macro f1 : {:.3}",
            epoch, step, self.total_steps, val.loss, val.accuracy, val.macro_f1,
        );
    }
}
