use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Segmentation strategy used to split text into tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenizerKind {
    Whitespace,
    WordPunct,
    Treebank,
}

impl TokenizerKind {
    pub const ALL: [TokenizerKind; 3] = [
        TokenizerKind::Whitespace,
        TokenizerKind::WordPunct,
        TokenizerKind::Treebank,
    ];

    /// Label used in console reports
    pub fn title(&self) -> &'static str {
        match self {
            TokenizerKind::Whitespace => "Whitespace",
            TokenizerKind::WordPunct => "WordPunct",
            TokenizerKind::Treebank => "Treebank",
        }
    }
}

impl fmt::Display for TokenizerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TokenizerKind::Whitespace => "whitespace",
            TokenizerKind::WordPunct => "wordpunct",
            TokenizerKind::Treebank => "treebank",
        };
        f.write_str(name)
    }
}

impl FromStr for TokenizerKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "whitespace" => Ok(TokenizerKind::Whitespace),
            "wordpunct" | "word_punct" | "word-punct" => Ok(TokenizerKind::WordPunct),
            "treebank" => Ok(TokenizerKind::Treebank),
            other => anyhow::bail!("Unknown tokenizer: {}", other),
        }
    }
}

/// A single rewrite rule: every match of `pattern` is replaced by `replacement`
struct Rewrite {
    pattern: Regex,
    replacement: &'static str,
}

impl Rewrite {
    fn new(pattern: &str, replacement: &'static str) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
            replacement,
        })
    }

    fn apply(&self, text: String) -> String {
        self.pattern.replace_all(&text, self.replacement).into_owned()
    }
}

/// Penn Treebank style rules, applied in order
struct TreebankRules {
    starting_quotes: Vec<Rewrite>,
    punctuation: Vec<Rewrite>,
    brackets_and_dashes: Vec<Rewrite>,
    ending_quotes: Vec<Rewrite>,
    contractions: Vec<Rewrite>,
}

impl TreebankRules {
    fn new() -> Result<Self, regex::Error> {
        let starting_quotes = vec![
            Rewrite::new(r#"^""#, "``")?,
            Rewrite::new(r"(``)", " ${1} ")?,
            Rewrite::new(r#"([ (\[{<])("|'')"#, "${1} `` ")?,
        ];

        let punctuation = vec![
            // Commas and colons, except inside numbers like 1,000 or 10:30
            Rewrite::new(r"([:,])([^\d])", " ${1} ${2}")?,
            Rewrite::new(r"([:,])$", " ${1} ")?,
            Rewrite::new(r"\.\.\.", " ... ")?,
            Rewrite::new(r"[;@#$%&]", " ${0} ")?,
            // Only the final period of the text is split off
            Rewrite::new(r#"([^.])(\.)([\])}>"']*)\s*$"#, "${1} ${2}${3} ")?,
            Rewrite::new(r"[?!]", " ${0} ")?,
            Rewrite::new(r"([^'])' ", "${1} ' ")?,
        ];

        let brackets_and_dashes = vec![
            Rewrite::new(r"[\]\[(){}<>]", " ${0} ")?,
            Rewrite::new(r"--", " -- ")?,
        ];

        let ending_quotes = vec![
            Rewrite::new(r"''", " '' ")?,
            Rewrite::new(r#"""#, " '' ")?,
            Rewrite::new(r"([^' ])('[sS]|'[mM]|'[dD]|') ", "${1} ${2} ")?,
            Rewrite::new(r"([^' ])('ll|'LL|'re|'RE|'ve|'VE|n't|N'T) ", "${1} ${2} ")?,
        ];

        let contractions = vec![
            Rewrite::new(r"(?i)\b(can)(not)\b", " ${1} ${2} ")?,
            Rewrite::new(r"(?i)\b(d)('ye)\b", " ${1} ${2} ")?,
            Rewrite::new(r"(?i)\b(gim)(me)\b", " ${1} ${2} ")?,
            Rewrite::new(r"(?i)\b(gon)(na)\b", " ${1} ${2} ")?,
            Rewrite::new(r"(?i)\b(got)(ta)\b", " ${1} ${2} ")?,
            Rewrite::new(r"(?i)\b(lem)(me)\b", " ${1} ${2} ")?,
            Rewrite::new(r"(?i)\b(more)('n)\b", " ${1} ${2} ")?,
            Rewrite::new(r"(?i)\b(wan)(na)(\s)", " ${1} ${2} ${3}")?,
            Rewrite::new(r"(?i) ('t)(is)\b", " ${1} ${2} ")?,
            Rewrite::new(r"(?i) ('t)(was)\b", " ${1} ${2} ")?,
        ];

        Ok(Self {
            starting_quotes,
            punctuation,
            brackets_and_dashes,
            ending_quotes,
            contractions,
        })
    }

    fn tokenize(&self, text: &str) -> Vec<String> {
        let mut text = text.to_string();

        for rule in self
            .starting_quotes
            .iter()
            .chain(&self.punctuation)
            .chain(&self.brackets_and_dashes)
        {
            text = rule.apply(text);
        }

        // Pad so the ending-quote rules can rely on a trailing space
        text = format!(" {} ", text);

        for rule in self.ending_quotes.iter().chain(&self.contractions) {
            text = rule.apply(text);
        }

        text.split_whitespace().map(str::to_string).collect()
    }
}

/// Splits text into tokens using one of three segmentation strategies.
///
/// Construct once and reuse: the rule tables are compiled in [`Tokenizer::new`].
pub struct Tokenizer {
    word_punct: Regex,
    treebank: TreebankRules,
}

impl Tokenizer {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            word_punct: Regex::new(r"\w+|[^\w\s]+")?,
            treebank: TreebankRules::new()?,
        })
    }

    /// Tokenize with the given strategy
    pub fn tokenize(&self, text: &str, kind: TokenizerKind) -> Vec<String> {
        match kind {
            TokenizerKind::Whitespace => self.tokenize_whitespace(text),
            TokenizerKind::WordPunct => self.tokenize_word_punct(text),
            TokenizerKind::Treebank => self.tokenize_treebank(text),
        }
    }

    /// Split on runs of whitespace; punctuation stays attached to words
    pub fn tokenize_whitespace(&self, text: &str) -> Vec<String> {
        text.split_whitespace().map(str::to_string).collect()
    }

    /// Separate alphanumeric runs from punctuation runs
    pub fn tokenize_word_punct(&self, text: &str) -> Vec<String> {
        self.word_punct
            .find_iter(text)
            .map(|m| m.as_str().to_string())
            .collect()
    }

    /// Penn Treebank conventions: contractions, quotes and final periods are split
    pub fn tokenize_treebank(&self, text: &str) -> Vec<String> {
        self.treebank.tokenize(text)
    }
}
