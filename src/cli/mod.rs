// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Entry point for all user interaction, parsed with `clap`.
// All business logic is delegated to Layer 2 (application).
//
// Three commands are supported:
//   1. `train`   — fine-tunes a pretrained encoder
//   2. `predict` — classifies a sentence with a trained run
//   3. `eval`    — scores a trained run on a labelled CSV
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, EvalArgs, PredictArgs, TrainArgs};

#[derive(Parser, Debug)]
#[command(
    name = "emotion-classifier",
    version,
    about = "Fine-tune a pretrained BERT encoder for Korean emotion classification."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Route the subcommand to its use case. Only this layer prints.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args)   => run_train(args),
            Commands::Predict(args) => run_predict(args),
            Commands::Eval(args)    => run_eval(args),
        }
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    let summary = TrainUseCase::new(args.into()).execute()?;

    println!("Training complete after {} steps.", summary.global_steps);
    match (summary.best_val_acc, summary.best_epoch) {
        (Some(acc), Some(epoch)) => println!(
            "Best val loss {:.4} at epoch {} (val acc {:.4}), saved in {}",
            summary.best_val_loss,
            epoch,
            acc,
            summary.run_dir.display()
        ),
        _ => println!("No epoch improved validation loss; no checkpoint was saved."),
    }
    Ok(())
}

fn run_predict(args: PredictArgs) -> Result<()> {
    use crate::application::predict_use_case::PredictUseCase;

    let prediction = PredictUseCase::new(args.checkpoint_dir, args.device.into()).predict(&args.text)?;
    println!("{} ({:.3})", prediction.label, prediction.probability);
    Ok(())
}

fn run_eval(args: EvalArgs) -> Result<()> {
    use crate::application::evaluate_use_case::EvaluateUseCase;

    let result = EvaluateUseCase::new(args.checkpoint_dir, args.data_path, args.device.into()).execute()?;
    println!(
        "loss : {:.4}, acc : {:.4}, macro f1 : {:.4} ({} samples)",
        result.loss, result.accuracy, result.macro_f1, result.report.total
    );
    Ok(())
}
