// ============================================================
// Layer 4 — Sentence Preprocessor
// ============================================================
// Normalises a raw sentence from the corpus before it reaches
// the tokenizer. Corpus CSVs exported from spreadsheets carry
// non-breaking spaces, zero-width characters, stray tabs and
// line breaks inside quoted cells; left alone these become
// [UNK] tokens or split words in odd places.
//
// Cleaning steps:
//   1. Map Unicode whitespace variants and control chars to ' '
//   2. Collapse runs of whitespace into a single space
//   3. Trim both ends
//
// Hangul is left untouched (no lowercasing, no accent folding)
// so syllable blocks reach the WordPiece vocabulary intact.

pub struct Preprocessor;

impl Preprocessor {
    pub fn new() -> Self {
        Self
    }

    /// Clean one sentence. Returns an owned, single-line String.
    pub fn clean(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut last_space = true; // suppresses leading spaces

        for c in text.chars() {
            let c = match c {
                '\u{00A0}' | '\u{200B}' | '\u{FEFF}' | '\u{3000}' => ' ',
                c if c.is_control() || c.is_whitespace() => ' ',
                c => c,
            };

            if c == ' ' {
                if !last_space {
                    out.push(' ');
                }
                last_space = true;
            } else {
                out.push(c);
                last_space = false;
            }
        }

        if out.ends_with(' ') {
            out.pop();
        }
        out
    }
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::new()
    }
}
