// ============================================================
// Layer 3 — Sample Domain Types
// ============================================================
// A Sample is what the dataset hands to the collator: the raw
// token ids of one sentence (no boundary markers yet) and the
// index of its emotion in the configured label list.

use serde::{Deserialize, Serialize};

/// One tokenised, labelled sentence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    /// Token ids without [CLS]/[SEP]; the collator adds those
    pub token_ids: Vec<u32>,

    /// Index into `LabelSet::labels()`
    pub label: usize,
}

impl Sample {
    pub fn new(token_ids: Vec<u32>, label: usize) -> Self {
        Self { token_ids, label }
    }

    /// Length once the two boundary markers are attached.
    pub fn framed_len(&self) -> usize {
        self.token_ids.len() + 2
    }
}

/// Special token ids of the vocabulary a run was tokenised with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecialTokens {
    pub pad: u32,
    /// Boundary-start marker ([CLS])
    pub cls: u32,
    /// Boundary-end marker ([SEP])
    pub sep: u32,
}

impl SpecialTokens {
    /// Vocabularies without [CLS]/[SEP] fall back to the pad id for both.
    pub fn new(pad: u32, cls: Option<u32>, sep: Option<u32>) -> Self {
        Self {
            pad,
            cls: cls.unwrap_or(pad),
            sep: sep.unwrap_or(pad),
        }
    }
}
