pub mod lexicon;
pub mod normalization;
pub mod tokenization;

use serde::Serialize;
use std::fmt;

pub use lexicon::{Lexicon, default_cache_dir};
pub use normalization::{Lemmatizer, Normalize, Normalizer, Stemmer};
pub use tokenization::{Tokenizer, TokenizerKind};

/// Sample sentence used when no text is given on the command line
pub const SAMPLE_TEXT: &str =
    "Đây là một đoạn văn bản mẫu để thử nghiệm các phương pháp tokenization.";

/// Token sequence produced by one strategy
#[derive(Debug, Clone, Serialize)]
pub struct TokenSequence {
    pub kind: TokenizerKind,
    pub tokens: Vec<String>,
}

/// Every token sequence for a text plus the normalized word-punct tokens
#[derive(Debug, Clone, Serialize)]
pub struct TextReport {
    pub text: String,
    pub sequences: Vec<TokenSequence>,
    pub stemmed: Vec<String>,
    pub lemmatized: Vec<String>,
}

impl TextReport {
    pub fn build(text: &str, tokenizer: &Tokenizer, normalizer: &Normalizer) -> Self {
        let sequences: Vec<TokenSequence> = TokenizerKind::ALL
            .iter()
            .map(|&kind| TokenSequence {
                kind,
                tokens: tokenizer.tokenize(text, kind),
            })
            .collect();

        let words = tokenizer.tokenize_word_punct(text);
        let stemmed = normalizer.stem(&words);
        let lemmatized = normalizer.lemmatize(&words);

        Self {
            text: text.to_string(),
            sequences,
            stemmed,
            lemmatized,
        }
    }

    pub fn tokens(&self, kind: TokenizerKind) -> Option<&[String]> {
        self.sequences
            .iter()
            .find(|s| s.kind == kind)
            .map(|s| s.tokens.as_slice())
    }
}

impl fmt::Display for TextReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for sequence in &self.sequences {
            writeln!(f, "Tokens ({}): {:?}", sequence.kind.title(), sequence.tokens)?;
        }
        writeln!(f, "Stemmed Tokens: {:?}", self.stemmed)?;
        write!(f, "Lemmatized Tokens: {:?}", self.lemmatized)
    }
}
