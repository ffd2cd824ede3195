// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the three subcommands: `train`, `predict` and `eval`
// and all their configurable flags.
//
// clap's derive macros automatically generate:
//   - help text (--help)
//   - error messages for missing or unknown values
//   - type conversion (string → usize, f64, LabelSet, etc.)
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::application::train_use_case::TrainConfig;
use crate::domain::labels::LabelSet;
use crate::ml::{device::ComputeDevice, precision::OptLevel};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fine-tune a pretrained encoder on an emotion corpus
    Train(TrainArgs),

    /// Classify one sentence with a trained run
    Predict(PredictArgs),

    /// Score a trained run on a labelled CSV
    Eval(EvalArgs),
}

// ─── Value enums ──────────────────────────────────────────────────────────────
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeviceArg {
    Cpu,
    #[value(alias = "cuda")]
    Gpu,
}

impl From<DeviceArg> for ComputeDevice {
    fn from(d: DeviceArg) -> Self {
        match d {
            DeviceArg::Cpu => ComputeDevice::Cpu,
            DeviceArg::Gpu => ComputeDevice::Gpu,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OptLevelArg {
    #[value(name = "O0")]
    O0,
    #[value(name = "O1")]
    O1,
    #[value(name = "O2")]
    O2,
    #[value(name = "O3")]
    O3,
}

impl From<OptLevelArg> for OptLevel {
    fn from(o: OptLevelArg) -> Self {
        match o {
            OptLevelArg::O0 => OptLevel::O0,
            OptLevelArg::O1 => OptLevel::O1,
            OptLevelArg::O2 => OptLevel::O2,
            OptLevelArg::O3 => OptLevel::O3,
        }
    }
}

// ─── train ────────────────────────────────────────────────────────────────────
#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Pretrained model identifier (sub-directory of --pretrained-dir)
    #[arg(long, default_value = "skt")]
    pub pretrained_type: String,

    /// Root directory of pretrained models
    #[arg(long, default_value = "pretrained_model")]
    pub pretrained_dir: PathBuf,

    #[arg(long, default_value_t = 100)]
    pub train_batch_size: usize,

    #[arg(long, default_value_t = 100)]
    pub eval_batch_size: usize,

    /// Give earlier encoder layers smaller learning rates
    #[arg(long)]
    pub layerwise_decay: bool,

    /// Learning-rate factor per layer under --layerwise-decay
    #[arg(long, default_value_t = 0.95)]
    pub layerwise_decay_rate: f64,

    /// Peak learning rate, reached at the end of warmup
    #[arg(long, default_value_t = 2e-5)]
    pub learning_rate: f64,

    #[arg(long, default_value_t = 3)]
    pub epochs: usize,

    /// Micro-batches summed into one optimizer update
    #[arg(long, default_value_t = 1)]
    pub gradient_accumulation_steps: usize,

    /// Fraction of all optimizer steps spent warming up
    #[arg(long, default_value_t = 0.01)]
    pub warmup_percent: f64,

    /// Global L2 norm gradients are clipped to
    #[arg(long, default_value_t = 1.0)]
    pub grad_clip_norm: f64,

    /// Log training metrics every N optimizer steps
    #[arg(long, default_value_t = 100)]
    pub logging_step: usize,

    #[arg(long, value_enum, default_value_t = DeviceArg::Gpu)]
    pub device: DeviceArg,

    /// Mixed precision (GPU only)
    #[arg(long)]
    pub fp16: bool,

    #[arg(long, value_enum, default_value_t = OptLevelArg::O1)]
    pub fp16_opt_level: OptLevelArg,

    /// Seeds the backend RNG and the training shuffle
    #[arg(long, default_value_t = 0)]
    pub seed: u64,

    #[arg(long, default_value = "data/korean_single_train.csv")]
    pub train_data_path: PathBuf,

    #[arg(long, default_value = "data/korean_single_dev.csv")]
    pub dev_data_path: PathBuf,

    /// Label set: `multi` (7 emotions) or `binary` (positive/negative)
    #[arg(long, default_value = "multi")]
    pub num_label: LabelSet,

    /// Maximum sequence length including [CLS] and [SEP]
    #[arg(long, default_value_t = 50)]
    pub max_len: usize,

    /// Pad each batch only to its longest sentence
    #[arg(long)]
    pub dynamic_padding: bool,

    /// Root for run directories and results.csv
    #[arg(long, default_value = "model_saved")]
    pub output_dir: PathBuf,
}

/// Convert CLI TrainArgs into the application-layer TrainConfig.
/// The application layer never sees clap types.
impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            pretrained_type:             a.pretrained_type,
            pretrained_dir:              a.pretrained_dir,
            train_batch_size:            a.train_batch_size,
            eval_batch_size:             a.eval_batch_size,
            layerwise_decay:             a.layerwise_decay,
            layerwise_decay_rate:        a.layerwise_decay_rate,
            learning_rate:               a.learning_rate,
            epochs:                      a.epochs,
            gradient_accumulation_steps: a.gradient_accumulation_steps,
            warmup_percent:              a.warmup_percent,
            grad_clip_norm:              a.grad_clip_norm,
            logging_step:                a.logging_step,
            device:                      a.device.into(),
            fp16:                        a.fp16,
            fp16_opt_level:              a.fp16_opt_level.into(),
            seed:                        a.seed,
            train_data_path:             a.train_data_path,
            dev_data_path:               a.dev_data_path,
            num_label:                   a.num_label,
            max_len:                     a.max_len,
            dynamic_padding:             a.dynamic_padding,
            output_dir:                  a.output_dir,
        }
    }
}

// ─── predict / eval ───────────────────────────────────────────────────────────
#[derive(Args, Debug)]
pub struct PredictArgs {
    /// Run directory written by `train`
    #[arg(long)]
    pub checkpoint_dir: PathBuf,

    /// Sentence to classify
    #[arg(long)]
    pub text: String,

    #[arg(long, value_enum, default_value_t = DeviceArg::Cpu)]
    pub device: DeviceArg,
}

#[derive(Args, Debug)]
pub struct EvalArgs {
    /// Run directory written by `train`
    #[arg(long)]
    pub checkpoint_dir: PathBuf,

    /// Labelled `Sentence,Emotion` CSV
    #[arg(long)]
    pub data_path: PathBuf,

    #[arg(long, value_enum, default_value_t = DeviceArg::Cpu)]
    pub device: DeviceArg,
}
