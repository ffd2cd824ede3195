// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything between a CSV file on disk and a tensor batch:
//
//   corpus .csv
//       │
//       ▼
//   CsvSampleLoader   → reads rows, maps emotion names to ids
//       │
//       ▼
//   Preprocessor      → normalises whitespace / invisible chars
//       │
//       ▼
//   Tokenizer         → sentence → token ids (infra layer)
//       │
//       ▼
//   ClassificationDataset → implements Burn's Dataset trait
//       │
//       ▼
//   ClassificationBatcher → frames, pads and masks each batch
//       │
//       ▼
//   DataLoader        → feeds batches to the training loop
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// Reads `Sentence,Emotion` CSV corpora
pub mod loader;

/// Cleans raw sentences before tokenisation
pub mod preprocessor;

/// Implements Burn's Dataset trait for tokenised samples
pub mod dataset;

/// Collator and Burn Batcher for classification batches
pub mod batcher;
