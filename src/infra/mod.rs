// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Everything that touches the filesystem or the log stream on
// behalf of the other layers:
//
//   pretrained.rs      — Pretrained encoder directory
//                        Reads the BERT config and loads encoder
//                        weights (Burn .mpk or PyTorch .bin).
//
//   tokenizer_store.rs — WordPiece tokenizer
//                        Loads tokenizer.json or builds it from
//                        vocab.txt; encodes raw examples.
//
//   checkpoint.rs      — Run directory
//                        Best-model record, training args, model
//                        config and tokenizer copy.
//
//   metrics.rs         — Per-epoch metrics timeline (metrics.csv)
//
//   results.rs         — Cross-run results table (results.csv)
//
//   run_log.rs         — Structured progress logging via tracing
//
// Reference: Rust Book §7 (Modules)
//            Burn Book §5 (Checkpointing)

/// Model checkpoint saving and loading
pub mod checkpoint;

/// Pretrained encoder config and weights
pub mod pretrained;

/// Tokenizer loading and sample encoding
pub mod tokenizer_store;

/// Per-epoch metrics CSV logger
pub mod metrics;

/// Append-only results table
pub mod results;

/// Training progress log lines
pub mod run_log;
