// ============================================================
// Layer 4 — Corpus Loader
// ============================================================
// Reads a labelled emotion corpus from CSV.
//
// Expected layout (header required, extra columns ignored):
//
//   Sentence,Emotion
//   언니 동생으로 부르는게 맞는 일인가요..??,공포
//   ...
//
// Every Emotion value must belong to the run's label set; a
// stray label aborts loading with the offending row, because a
// silently dropped class would skew every metric that follows.
//
// Reference: csv crate documentation (serde deserialisation)

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::data::preprocessor::Preprocessor;
use crate::domain::error::TrainError;
use crate::domain::labels::LabelSet;
use crate::domain::traits::{RawExample, SampleSource};

/// One CSV row as stored on disk.
#[derive(Debug, Deserialize)]
struct CorpusRow {
    #[serde(rename = "Sentence")]
    sentence: String,
    #[serde(rename = "Emotion")]
    emotion: String,
}

/// Loads `Sentence,Emotion` CSV files.
/// Implements the SampleSource trait from Layer 3.
pub struct CsvSampleLoader {
    path:         PathBuf,
    preprocessor: Preprocessor,
}

impl CsvSampleLoader {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path:         path.as_ref().to_path_buf(),
            preprocessor: Preprocessor::new(),
        }
    }
}

impl SampleSource for CsvSampleLoader {
    fn load_examples(&self, labels: LabelSet) -> Result<Vec<RawExample>> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_path(&self.path)
            .with_context(|| format!("Cannot open corpus '{}'", self.path.display()))?;

        let mut examples = Vec::new();
        let mut skipped  = 0usize;

        for (i, row) in reader.deserialize::<CorpusRow>().enumerate() {
            let row_number = i + 1;
            let row = row.with_context(|| {
                format!("Malformed row {} in '{}'", row_number, self.path.display())
            })?;

            let label = labels.index_of(&row.emotion).ok_or_else(|| TrainError::UnknownLabel {
                label:     row.emotion.clone(),
                row:       row_number,
                label_set: labels.to_string(),
            })?;

            let text = self.preprocessor.clean(&row.sentence);
            if text.is_empty() {
                skipped += 1;
                continue;
            }

            examples.push(RawExample { text, label });
        }

        if skipped > 0 {
            tracing::warn!(
                "Skipped {} empty sentences in '{}'",
                skipped,
                self.path.display()
            );
        }

        if examples.is_empty() {
            return Err(TrainError::EmptyDataset(self.path.display().to_string()).into());
        }

        tracing::info!(
            "Loaded {} examples from '{}'",
            examples.len(),
            self.path.display()
        );
        Ok(examples)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(contents: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        f
    }

    #[test]
    fn test_maps_labels_to_indices() {
        let f = write_csv("Sentence,Emotion\n좋아요,긍정\n싫어요,부정\n");
        let examples = CsvSampleLoader::new(f.path())
            .load_examples(LabelSet::TwoClass)
            .unwrap();

        assert_eq!(examples.len(), 2);
        assert_eq!(examples[0], RawExample { text: "좋아요".into(), label: 0 });
        assert_eq!(examples[1].label, 1);
    }

    #[test]
    fn test_extra_columns_are_ignored() {
        let f = write_csv("Sentence,Emotion,Id\n무서워,공포,7\n");
        let examples = CsvSampleLoader::new(f.path())
            .load_examples(LabelSet::SevenClass)
            .unwrap();
        assert_eq!(examples[0].label, 0);
    }

    #[test]
    fn test_unknown_label_is_an_error() {
        let f = write_csv("Sentence,Emotion\n무서워,공포\n");
        let err = CsvSampleLoader::new(f.path())
            .load_examples(LabelSet::TwoClass)
            .unwrap_err();
        let err = err.downcast::<TrainError>().unwrap();
        assert!(matches!(err, TrainError::UnknownLabel { row: 1, .. }));
    }

    #[test]
    fn test_empty_corpus_is_an_error() {
        let f = write_csv("Sentence,Emotion\n");
        let err = CsvSampleLoader::new(f.path())
            .load_examples(LabelSet::TwoClass)
            .unwrap_err();
        assert!(matches!(
            err.downcast::<TrainError>().unwrap(),
            TrainError::EmptyDataset(_)
        ));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let loader = CsvSampleLoader::new("does/not/exist.csv");
        assert!(loader.load_examples(LabelSet::TwoClass).is_err());
    }
}
