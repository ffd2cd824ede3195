// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// Model, optimisation and evaluation code built on Burn.
//
// What's in this layer:
//
//   model.rs      — BERT-style encoder + classification head
//                   • word / position / token-type embeddings
//                   • post-norm self-attention blocks (GELU)
//                   • tanh pooler over the first position
//
//   trainer.rs    — The training loop
//                   Gradient accumulation, warmup-linear
//                   schedule, clipping, layer-wise decay,
//                   loss scaling, best-model checkpointing
//
//   evaluator.rs  — Corpus-level evaluation over a loader
//
//   inferencer.rs — Single-sentence prediction
//
//   state.rs, schedule.rs, precision.rs, grads.rs, device.rs
//                 — the loop's building blocks
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)
//            Devlin et al. (2019) BERT

/// Encoder + classification head
pub mod model;

/// Step counters and running metric sums
pub mod state;

/// Warmup-then-linear-decay learning rate
pub mod schedule;

/// Full / loss-scaled precision strategy
pub mod precision;

/// Gradient norm, clipping and parameter groups
pub mod grads;

/// Backend and device selection
pub mod device;

/// Full training loop with validation and checkpointing
pub mod trainer;

/// Validation-set evaluation
pub mod evaluator;

/// Inference engine — loads a run and predicts labels
pub mod inferencer;
