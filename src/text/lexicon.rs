use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Lemma table shipped with the crate, used when no cached copy is available
const BUNDLED_LEMMAS: &str = include_str!("../../data/lemmas.tsv");

/// File name of the lemma table inside the cache directory
pub const LEXICON_FILE: &str = "lemmas.tsv";

/// WordNet noun index: one lemma per line, first field
pub const WORDNET_NOUN_INDEX: &str = "index.noun";

/// WordNet noun exception list: `form lemma [lemma ...]`
pub const WORDNET_NOUN_EXCEPTIONS: &str = "noun.exc";

/// Dictionary backing the lemmatizer.
///
/// The table format is one entry per line: a single word declares a known lemma,
/// `form<TAB>lemma[<TAB>lemma ...]` declares an irregular form. `#` starts a
/// comment. Entries are matched exactly, case included.
#[derive(Debug, Clone, Default)]
pub struct Lexicon {
    lemmas: HashSet<String>,
    exceptions: HashMap<String, Vec<String>>,
}

impl Lexicon {
    /// Parse a lemma table. Malformed lines are skipped.
    pub fn parse(contents: &str) -> Self {
        let mut lexicon = Self::default();

        for (line_no, raw) in contents.lines().enumerate() {
            let line = match raw.split_once('#') {
                Some((before, _)) => before,
                None => raw,
            }
            .trim();

            if line.is_empty() {
                continue;
            }

            let mut fields = line.split('\t').map(str::trim).filter(|f| !f.is_empty());
            match fields.next() {
                Some(form) => lexicon.insert(form, fields),
                None => debug!("Skipping malformed lexicon line {}", line_no + 1),
            }
        }

        lexicon
    }

    /// Build from the WordNet database files NLTK downloads as `wordnet`
    /// (`index.noun` and `noun.exc` inside `dir`)
    pub fn from_wordnet_dir<P: AsRef<Path>>(dir: P) -> anyhow::Result<Self> {
        let dir = dir.as_ref();
        let mut lexicon = Self::default();

        let index = read_table(&dir.join(WORDNET_NOUN_INDEX))?;
        // The licence header lines are indented
        for line in index.lines().filter(|l| !l.starts_with(' ')) {
            if let Some(lemma) = line.split_whitespace().next() {
                lexicon.lemmas.insert(lemma.to_string());
            }
        }

        let exceptions = read_table(&dir.join(WORDNET_NOUN_EXCEPTIONS))?;
        for line in exceptions.lines() {
            let mut fields = line.split_whitespace();
            if let Some(form) = fields.next() {
                lexicon.insert(form, fields);
            }
        }

        info!(
            "Read {} lemmas and {} exceptions from {}",
            lexicon.lemmas.len(),
            lexicon.exceptions.len(),
            dir.display()
        );
        Ok(lexicon)
    }

    fn insert<'a>(&mut self, form: &str, lemmas: impl Iterator<Item = &'a str>) {
        let lemmas: Vec<String> = lemmas.map(str::to_string).collect();
        if lemmas.is_empty() {
            self.lemmas.insert(form.to_string());
            return;
        }
        self.lemmas.extend(lemmas.iter().cloned());
        self.exceptions.entry(form.to_string()).or_default().extend(lemmas);
    }

    /// The table compiled into the binary
    pub fn bundled() -> Self {
        Self::parse(BUNDLED_LEMMAS)
    }

    /// Load a lemma table from disk
    pub fn from_path<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        Ok(Self::parse(&read_table(path.as_ref())?))
    }

    /// Write the bundled table into `cache_dir` unless a copy is already there.
    ///
    /// Safe to call repeatedly; an existing file is never overwritten, so a
    /// user-edited or imported table survives. Returns the path of the cached table.
    pub fn ensure_cached<P: AsRef<Path>>(cache_dir: P) -> anyhow::Result<PathBuf> {
        let cache_dir = cache_dir.as_ref();
        let path = cache_dir.join(LEXICON_FILE);

        if path.exists() {
            debug!("Lexicon already cached at {}", path.display());
            return Ok(path);
        }

        fs::create_dir_all(cache_dir)?;
        fs::write(&path, BUNDLED_LEMMAS)?;
        info!("Lexicon written to {}", path.display());

        Ok(path)
    }

    /// Convert a WordNet database into the cached lemma table, replacing the
    /// cached copy. Importing the same database twice writes the same file.
    pub fn import_wordnet<P: AsRef<Path>, Q: AsRef<Path>>(
        wordnet_dir: P,
        cache_dir: Q,
    ) -> anyhow::Result<PathBuf> {
        let lexicon = Self::from_wordnet_dir(wordnet_dir)?;
        let cache_dir = cache_dir.as_ref();
        let path = cache_dir.join(LEXICON_FILE);

        fs::create_dir_all(cache_dir)?;
        fs::write(&path, lexicon.to_table())?;
        info!("WordNet lexicon written to {}", path.display());

        Ok(path)
    }

    /// Load the cached table, falling back to the bundled one.
    ///
    /// A missing or unreadable cache is not an error: the bundled table works
    /// offline and is always available.
    pub fn load(cache_dir: Option<&Path>) -> Self {
        let Some(cache_dir) = cache_dir else {
            return Self::bundled();
        };

        let path = cache_dir.join(LEXICON_FILE);
        if !path.exists() {
            debug!("No cached lexicon at {}, using bundled table", path.display());
            return Self::bundled();
        }

        match Self::from_path(&path) {
            Ok(lexicon) => {
                debug!("Loaded {} lemmas from {}", lexicon.len(), path.display());
                lexicon
            }
            Err(e) => {
                warn!("{}; using bundled table", e);
                Self::bundled()
            }
        }
    }

    /// Serialize in the table format `parse` reads, sorted for stable output
    pub fn to_table(&self) -> String {
        let exception_lemmas: BTreeSet<&str> =
            self.exceptions.values().flatten().map(String::as_str).collect();
        let exceptions: BTreeMap<&str, &Vec<String>> =
            self.exceptions.iter().map(|(k, v)| (k.as_str(), v)).collect();
        let mut lemmas: Vec<&str> = self
            .lemmas
            .iter()
            .map(String::as_str)
            .filter(|l| !exception_lemmas.contains(l))
            .collect();
        lemmas.sort_unstable();

        let mut table = String::new();
        for lemma in lemmas {
            let _ = writeln!(table, "{}", lemma);
        }
        for (form, targets) in exceptions {
            let _ = writeln!(table, "{}\t{}", form, targets.join("\t"));
        }
        table
    }

    pub fn contains(&self, lemma: &str) -> bool {
        self.lemmas.contains(lemma)
    }

    /// Irregular lemmas of `form`; empty when it is not an exception
    pub fn exceptions(&self, form: &str) -> &[String] {
        self.exceptions.get(form).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of known lemmas
    pub fn len(&self) -> usize {
        self.lemmas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lemmas.is_empty()
    }
}

fn read_table(path: &Path) -> anyhow::Result<String> {
    fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read lexicon {}: {}", path.display(), e))
}

/// Default cache location: `~/.cache/textvision`
pub fn default_cache_dir() -> anyhow::Result<PathBuf> {
    let home_dir = std::env::var("HOME").or_else(|_| std::env::var("USERPROFILE"))?;
    Ok(Path::new(&home_dir).join(".cache/textvision"))
}
