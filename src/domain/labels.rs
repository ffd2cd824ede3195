// ============================================================
// Layer 3 — Label Sets
// ============================================================
// The classifier is trained on one of two fixed taxonomies.
// The selector is an enum (not a free string) so an unknown
// value is rejected while parsing arguments, long before the
// label count could disagree with the model head.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

const SEVEN_CLASS: [&str; 7] = ["공포", "놀람", "분노", "슬픔", "중립", "행복", "혐오"];
const TWO_CLASS: [&str; 2] = ["긍정", "부정"];

/// Which label taxonomy a run uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LabelSet {
    /// Positive / negative
    TwoClass,

    /// Fear, surprise, anger, sadness, neutral, happiness, disgust
    SevenClass,
}

impl LabelSet {
    /// Ordered class names; the index of a name is its label id.
    pub fn labels(&self) -> &'static [&'static str] {
        match self {
            LabelSet::TwoClass => &TWO_CLASS,
            LabelSet::SevenClass => &SEVEN_CLASS,
        }
    }

    pub fn len(&self) -> usize {
        self.labels().len()
    }

    /// Label id for a class name, if it belongs to this set.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.labels().iter().position(|l| *l == name)
    }

    pub fn name_of(&self, index: usize) -> Option<&'static str> {
        self.labels().get(index).copied()
    }

    pub fn names(&self) -> Vec<String> {
        self.labels().iter().map(|l| l.to_string()).collect()
    }

    /// The selector string accepted on the command line.
    pub fn selector(&self) -> &'static str {
        match self {
            LabelSet::TwoClass => "binary",
            LabelSet::SevenClass => "multi",
        }
    }
}

// clap picks this up as the value parser for `--num-label`
impl FromStr for LabelSet {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "binary" => Ok(LabelSet::TwoClass),
            "multi" => Ok(LabelSet::SevenClass),
            other => Err(format!(
                "unknown label set '{other}' (expected 'binary' or 'multi')"
            )),
        }
    }
}

impl fmt::Display for LabelSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.selector())
    }
}
