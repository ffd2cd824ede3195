// ============================================================
// Layer 6 — Tokenizer Store
// ============================================================
// Loads the WordPiece tokenizer that ships with a pretrained
// encoder and turns raw examples into token-id samples.
//
// Pretrained directories come in two flavours:
//   tokenizer.json  — HuggingFace tokenizers format, loaded as is
//   vocab.txt       — one token per line (line number = id)
//
// For vocab.txt we write the tokenizer JSON by hand and load it
// back, which avoids the trainer/ModelWrapper type mismatch of
// tokenizers 0.15. Lowercasing and accent stripping stay off:
// they would decompose Hangul syllables the vocabulary expects
// to see whole.
//
// Special tokens: [PAD] is required; [CLS]/[SEP] fall back to the
// pad id when the vocabulary lacks them.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokenizers::Tokenizer;

use crate::domain::sample::{Sample, SpecialTokens};
use crate::domain::traits::RawExample;

const SPECIAL_TOKENS: [&str; 5] = ["[PAD]", "[UNK]", "[CLS]", "[SEP]", "[MASK]"];

pub struct TokenizerStore {
    dir: PathBuf,
}

impl TokenizerStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self { dir: dir.as_ref().to_path_buf() }
    }

    /// Load tokenizer.json, building it from vocab.txt if needed.
    pub fn load_or_build(&self) -> Result<Tokenizer> {
        let tok_path = self.dir.join("tokenizer.json");
        if tok_path.exists() {
            tracing::info!("Loading tokenizer from '{}'", tok_path.display());
            return Self::load(&tok_path);
        }

        let vocab_path = self.dir.join("vocab.txt");
        if vocab_path.exists() {
            tracing::info!("Building tokenizer from '{}'", vocab_path.display());
            return self.build_from_vocab(&vocab_path);
        }

        anyhow::bail!("No tokenizer.json or vocab.txt in '{}'", self.dir.display())
    }

    pub fn load(path: &Path) -> Result<Tokenizer> {
        Tokenizer::from_file(path)
            .map_err(|e| anyhow::anyhow!("Cannot load tokenizer from '{}': {}", path.display(), e))
    }

    /// Write a WordPiece tokenizer JSON for `vocab.txt` and load it.
    fn build_from_vocab(&self, vocab_path: &Path) -> Result<Tokenizer> {
        let text = std::fs::read_to_string(vocab_path)
            .with_context(|| format!("Cannot read '{}'", vocab_path.display()))?;

        // ── Step 1: vocabulary, id = line number ──────────────────────────────
        let mut vocab = serde_json::Map::new();
        for (id, token) in text.lines().enumerate() {
            let token = token.trim_end_matches('\r');
            if !token.is_empty() && !vocab.contains_key(token) {
                vocab.insert(token.to_string(), serde_json::json!(id));
            }
        }
        if !vocab.contains_key("[UNK]") {
            anyhow::bail!("'{}' has no [UNK] token", vocab_path.display());
        }

        let added_tokens: Vec<serde_json::Value> = SPECIAL_TOKENS
            .iter()
            .filter_map(|t| vocab.get(*t).map(|id| (t, id.clone())))
            .map(|(t, id)| serde_json::json!({
                "id": id, "content": t, "single_word": false, "lstrip": false,
                "rstrip": false, "normalized": false, "special": true
            }))
            .collect();

        // ── Step 2: tokenizer JSON in HuggingFace format ──────────────────────
        let tokenizer_json = serde_json::json!({
            "version": "1.0",
            "truncation": null,
            "padding": null,
            "added_tokens": added_tokens,
            "normalizer": {
                "type": "BertNormalizer",
                "clean_text": true,
                "handle_chinese_chars": true,
                "strip_accents": false,
                "lowercase": false
            },
            "pre_tokenizer": { "type": "BertPreTokenizer" },
            "post_processor": null,
            "decoder": { "type": "WordPiece", "prefix": "##", "cleanup": true },
            "model": {
                "type": "WordPiece",
                "unk_token": "[UNK]",
                "continuing_subword_prefix": "##",
                "max_input_chars_per_word": 100,
                "vocab": vocab
            }
        });

        let tok_path = self.dir.join("tokenizer.json");
        std::fs::write(&tok_path, serde_json::to_string_pretty(&tokenizer_json)?)
            .with_context(|| format!("Cannot write '{}'", tok_path.display()))?;
        tracing::info!("Tokenizer written to '{}'", tok_path.display());

        Self::load(&tok_path)
    }

    /// The pad / boundary ids of a loaded tokenizer.
    pub fn special_tokens(tokenizer: &Tokenizer) -> Result<SpecialTokens> {
        let pad = tokenizer
            .token_to_id("[PAD]")
            .context("Tokenizer vocabulary has no [PAD] token")?;
        Ok(SpecialTokens::new(
            pad,
            tokenizer.token_to_id("[CLS]"),
            tokenizer.token_to_id("[SEP]"),
        ))
    }

    /// Tokenise examples without special tokens; the collator adds those.
    pub fn encode_all(tokenizer: &Tokenizer, examples: Vec<RawExample>) -> Result<Vec<Sample>> {
        examples
            .into_iter()
            .map(|ex| {
                let enc = tokenizer
                    .encode(ex.text.as_str(), false)
                    .map_err(|e| anyhow::anyhow!("Tokenisation error: {e}"))?;
                Ok(Sample::new(enc.get_ids().to_vec(), ex.label))
            })
            .collect()
    }
}
