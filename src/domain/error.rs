use thiserror::Error;

/// Failure kinds raised by the training pipeline.
///
/// Everything is fatal for the run; callers wrap these in `anyhow`
/// with file or epoch context.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TrainError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("label '{label}' at row {row} is not part of the '{label_set}' label set")]
    UnknownLabel {
        label: String,
        row: usize,
        label_set: String,
    },

    #[error("cannot collate an empty batch")]
    EmptyBatch,

    #[error("dataset '{0}' contains no samples")]
    EmptyDataset(String),

    #[error(
        "mixed precision was requested but {0}; \
         run with `--device gpu` or drop `--fp16`"
    )]
    MixedPrecisionUnavailable(String),

    #[error("training loss became non-finite ({loss}) at epoch {epoch}, step {step}")]
    NonFiniteLoss { loss: f64, epoch: usize, step: usize },

    #[error("max length {max_len} exceeds the encoder's {max_positions} position embeddings")]
    SequenceTooLong { max_len: usize, max_positions: usize },
}
