use rust_stemmers::{Algorithm, Stemmer as SnowballStemmer};

use super::lexicon::Lexicon;

/// Element-wise reduction of a token sequence.
///
/// Implementations must return exactly one output token per input token.
pub trait Normalize {
    fn normalize(&self, tokens: &[String]) -> Vec<String>;
}

/// Rule-based suffix stripping (Snowball English / Porter2)
pub struct Stemmer {
    inner: SnowballStemmer,
}

impl Stemmer {
    pub fn new() -> Self {
        Self {
            inner: SnowballStemmer::create(Algorithm::English),
        }
    }

    pub fn stem_token(&self, token: &str) -> String {
        self.inner.stem(&token.to_lowercase()).into_owned()
    }
}

impl Default for Stemmer {
    fn default() -> Self {
        Self::new()
    }
}

impl Normalize for Stemmer {
    fn normalize(&self, tokens: &[String]) -> Vec<String> {
        tokens.iter().map(|t| self.stem_token(t)).collect()
    }
}

/// Noun detachment rules: (suffix, replacement)
const NOUN_SUFFIXES: &[(&str, &str)] = &[
    ("s", ""),
    ("ses", "s"),
    ("ves", "f"),
    ("xes", "x"),
    ("zes", "z"),
    ("ches", "ch"),
    ("shes", "sh"),
    ("men", "man"),
    ("ies", "y"),
];

/// Dictionary-based reduction to the canonical (noun) form
pub struct Lemmatizer {
    lexicon: Lexicon,
}

impl Lemmatizer {
    pub fn new(lexicon: Lexicon) -> Self {
        Self { lexicon }
    }

    pub fn lexicon(&self) -> &Lexicon {
        &self.lexicon
    }

    /// Map one token to its lemma, or return it unchanged if the dictionary
    /// does not know it.
    ///
    /// Lookups are exact: a capitalized form only matches a capitalized entry.
    /// Among the forms found in the dictionary the shortest wins.
    pub fn lemmatize_token(&self, token: &str) -> String {
        let exceptions = self.lexicon.exceptions(token);
        if !exceptions.is_empty() {
            let forms = std::iter::once(token).chain(exceptions.iter().map(String::as_str));
            return self.shortest_known(forms).unwrap_or_else(|| token.to_string());
        }

        let mut forms = detach_suffixes(&[token.to_string()]);
        let direct = std::iter::once(token).chain(forms.iter().map(String::as_str));
        if let Some(lemma) = self.shortest_known(direct) {
            return lemma;
        }

        // Keep stripping until something matches or no rule applies
        while !forms.is_empty() {
            forms = detach_suffixes(&forms);
            if let Some(lemma) = self.shortest_known(forms.iter().map(String::as_str)) {
                return lemma;
            }
        }

        token.to_string()
    }

    fn shortest_known<'a>(&self, forms: impl Iterator<Item = &'a str>) -> Option<String> {
        forms
            .filter(|form| self.lexicon.contains(form))
            .min_by_key(|form| form.chars().count())
            .map(str::to_string)
    }
}

/// Every form reachable from `forms` by one detachment rule
fn detach_suffixes(forms: &[String]) -> Vec<String> {
    forms
        .iter()
        .flat_map(|form| {
            NOUN_SUFFIXES.iter().filter_map(move |(suffix, replacement)| {
                form.strip_suffix(suffix)
                    .map(|stem| format!("{}{}", stem, replacement))
            })
        })
        .collect()
}

impl Normalize for Lemmatizer {
    fn normalize(&self, tokens: &[String]) -> Vec<String> {
        tokens.iter().map(|t| self.lemmatize_token(t)).collect()
    }
}

/// Holds one stemmer and one lemmatizer, built once and reused
pub struct Normalizer {
    stemmer: Stemmer,
    lemmatizer: Lemmatizer,
}

impl Normalizer {
    pub fn new(lexicon: Lexicon) -> Self {
        Self {
            stemmer: Stemmer::new(),
            lemmatizer: Lemmatizer::new(lexicon),
        }
    }

    /// Reduce each token to its root form
    pub fn stem(&self, tokens: &[String]) -> Vec<String> {
        self.stemmer.normalize(tokens)
    }

    /// Reduce each token to its dictionary form; unknown tokens pass through
    pub fn lemmatize(&self, tokens: &[String]) -> Vec<String> {
        self.lemmatizer.normalize(tokens)
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(Lexicon::bundled())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lemmatizer() -> Lemmatizer {
        Lemmatizer::new(Lexicon::parse(
            "cat\nbox\nchurch\nwolf\ncity\nbus\nman\nmethod\nmice\tmouse\naxes\taxis\tax\n",
        ))
    }

    #[test]
    fn test_noun_rules() {
        let l = lemmatizer();
        assert_eq!(l.lemmatize_token("cats"), "cat");
        assert_eq!(l.lemmatize_token("boxes"), "box");
        assert_eq!(l.lemmatize_token("churches"), "church");
        assert_eq!(l.lemmatize_token("wolves"), "wolf");
        assert_eq!(l.lemmatize_token("cities"), "city");
        assert_eq!(l.lemmatize_token("buses"), "bus");
        assert_eq!(l.lemmatize_token("men"), "man");
    }

    #[test]
    fn test_rules_applied_repeatedly() {
        assert_eq!(lemmatizer().lemmatize_token("boxeses"), "box");
    }

    #[test]
    fn test_exceptions() {
        let l = lemmatizer();
        assert_eq!(l.lemmatize_token("mice"), "mouse");
        assert_eq!(l.lemmatize_token("axes"), "ax");
    }

    #[test]
    fn test_known_lemma_is_kept() {
        assert_eq!(lemmatizer().lemmatize_token("bus"), "bus");
    }

    #[test]
    fn test_lookup_is_case_sensitive() {
        let l = lemmatizer();
        assert_eq!(l.lemmatize_token("Methods"), "Methods");
        assert_eq!(l.lemmatize_token("Method"), "Method");
        assert_eq!(l.lemmatize_token("Mice"), "Mice");
        assert_eq!(l.lemmatize_token("methods"), "method");
    }

    #[test]
    fn test_unknown_passes_through_unchanged() {
        let l = lemmatizer();
        assert_eq!(l.lemmatize_token("Đây"), "Đây");
        assert_eq!(l.lemmatize_token("tokenization"), "tokenization");
        assert_eq!(l.lemmatize_token("s"), "s");
        assert_eq!(l.lemmatize_token("."), ".");
        assert_eq!(l.lemmatize_token(""), "");
    }

    #[test]
    fn test_stem_lowercases() {
        let stemmer = Stemmer::new();
        assert_eq!(stemmer.stem_token("Running"), "run");
        assert_eq!(stemmer.stem_token("connections"), "connect");
    }
}
