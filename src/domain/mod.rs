// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Pure Rust types that describe the classification problem:
// which labels exist, what a tokenised sample looks like,
// how predictions are scored, and what can go wrong.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O
//   - Only plain structs, enums, traits and the metric math
//
// Everything here is unit-testable without a device.

// The two supported label taxonomies
pub mod labels;

// Tokenised samples and the special token ids of a vocabulary
pub mod sample;

// Classification report: per-class scores, accuracy, macro-F1, confusion matrix
pub mod report;

// Typed failure kinds shared by the other layers
pub mod error;

// Core abstractions (traits) that other layers implement
pub mod traits;
