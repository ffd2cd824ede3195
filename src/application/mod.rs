// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// Workflow coordination only: each use case tells the data,
// ml and infra layers what to do, in order, and returns a
// result for the CLI to print.
//
// Rules for this layer:
//   - No ML math or model code here
//   - No printing here (that's Layer 1)
//
// Reference: Clean Architecture pattern
//            Rust Book §7 (Module System)

// The fine-tuning workflow and its configuration
pub mod train_use_case;

// Rebuilding a trained run from its directory
pub mod saved_run;

// Single-sentence prediction
pub mod predict_use_case;

// Scoring a run on a labelled CSV
pub mod evaluate_use_case;
