//! Text cleansing helpers for preparing Indonesian ad copy.
//!
//! Casefolding, whitespace tokenization and a root-dictionary affix stemmer.
//! None of this sits on the prediction path; the classifier was trained on
//! raw lowercased text.

use std::collections::HashSet;
use std::sync::{Arc, LazyLock};

/// Reduces a single lowercase word to its stem
pub trait Stemmer: Send + Sync {
    fn stem(&self, word: &str) -> String;
}

/// Lowercase, turn line breaks into spaces, collapse whitespace runs, trim
pub fn casefold(text: &str) -> String {
    text.to_lowercase()
        .replace(['\r', '\n'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace().map(str::to_string).collect()
}

pub fn stem(tokens: &[String], stemmer: &dyn Stemmer) -> String {
    tokens
        .iter()
        .map(|token| stemmer.stem(token))
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn cleanse(text: &str, stemmer: &dyn Stemmer) -> String {
    stem(&tokenize(&casefold(text)), stemmer)
}

const MIN_STEM_LEN: usize = 3;
/// Prefixes peeled per word, e.g. mem-per-main-kan
const MAX_PREFIXES: usize = 3;

const PARTICLES: [&str; 4] = ["lah", "kah", "tah", "pun"];
const POSSESSIVES: [&str; 3] = ["nya", "ku", "mu"];
const DERIVATIONAL_SUFFIXES: [&str; 3] = ["kan", "an", "i"];
const PLAIN_PREFIXES: [&str; 9] = ["di", "ke", "se", "ber", "ter", "per", "be", "bel", "te"];

static BUNDLED_ROOTS: LazyLock<Arc<HashSet<String>>> =
    LazyLock::new(|| Arc::new(parse_roots(include_str!("../assets/kata_dasar.txt"))));

/// One root per line; blank lines and `#` comments are skipped
pub fn parse_roots(list: &str) -> HashSet<String> {
    list.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_lowercase)
        .collect()
}

/// Dictionary-backed Indonesian affix stripper.
///
/// A word that is already a known root is returned as is. Otherwise
/// particles, possessive pronouns and derivational suffixes are removed,
/// then up to three derivational prefixes (with the me(N)-/pe(N)- nasal
/// recoding), and a candidate is only accepted when it is a known root.
/// Words with no root in reach, and words containing anything other than
/// ASCII letters, pass through unchanged.
#[derive(Clone)]
pub struct IndonesianStemmer {
    roots: Arc<HashSet<String>>,
}

impl Default for IndonesianStemmer {
    /// Uses the bundled root list
    fn default() -> Self {
        Self {
            roots: Arc::clone(&BUNDLED_ROOTS),
        }
    }
}

impl IndonesianStemmer {
    pub fn with_roots<I, S>(roots: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            roots: Arc::new(roots.into_iter().map(Into::into).collect()),
        }
    }

    pub fn is_root(&self, word: &str) -> bool {
        self.roots.contains(word)
    }

    fn strip_prefixes(&self, word: &str, depth: usize) -> Option<String> {
        let candidates = prefix_candidates(word);
        if let Some(root) = candidates.iter().find(|c| self.is_root(c)) {
            return Some(root.clone());
        }
        if depth <= 1 {
            return None;
        }
        candidates
            .iter()
            .find_map(|candidate| self.strip_prefixes(candidate, depth - 1))
    }
}

impl Stemmer for IndonesianStemmer {
    fn stem(&self, word: &str) -> String {
        if word.len() <= MIN_STEM_LEN
            || !word.bytes().all(|b| b.is_ascii_lowercase())
            || self.is_root(word)
        {
            return word.to_string();
        }

        let bases = suffix_bases(word);
        if let Some(root) = bases.iter().find(|base| self.is_root(base)) {
            return root.to_string();
        }

        bases
            .iter()
            .find_map(|base| self.strip_prefixes(base, MAX_PREFIXES))
            .unwrap_or_else(|| word.to_string())
    }
}

fn strip_suffix_any<'a>(word: &'a str, suffixes: &[&str]) -> &'a str {
    suffixes
        .iter()
        .find_map(|suffix| {
            word.strip_suffix(suffix)
                .filter(|rest| rest.len() >= MIN_STEM_LEN)
        })
        .unwrap_or(word)
}

/// Suffix-stripped forms of `word`, most stripped first, `word` itself last
fn suffix_bases(word: &str) -> Vec<&str> {
    let without_particle = strip_suffix_any(word, &PARTICLES);
    let without_possessive = strip_suffix_any(without_particle, &POSSESSIVES);

    let mut bases: Vec<&str> = DERIVATIONAL_SUFFIXES
        .iter()
        .filter_map(|suffix| without_possessive.strip_suffix(suffix))
        .filter(|rest| rest.len() >= MIN_STEM_LEN)
        .collect();
    for base in [without_possessive, without_particle, word] {
        if !bases.contains(&base) {
            bases.push(base);
        }
    }
    bases
}

fn is_vowel(c: u8) -> bool {
    matches!(c, b'a' | b'e' | b'i' | b'o' | b'u')
}

/// Every reading of `word` with one derivational prefix removed
fn prefix_candidates(word: &str) -> Vec<String> {
    let mut candidates: Vec<String> = PLAIN_PREFIXES
        .iter()
        .filter_map(|prefix| word.strip_prefix(prefix))
        .map(str::to_string)
        .collect();
    candidates.extend(recode_nasal(word));
    candidates.retain(|c| c.len() >= MIN_STEM_LEN);
    candidates
}

/// me(N)- and pe(N)- assimilate with the first sound of the root, so one
/// surface form can come from more than one root
fn recode_nasal(word: &str) -> Vec<String> {
    let Some(rest) = word.strip_prefix("me").or_else(|| word.strip_prefix("pe")) else {
        return Vec::new();
    };
    let bytes = rest.as_bytes();
    let tail = |from: usize| rest.get(from..).unwrap_or_default().to_string();

    match (bytes.first().copied(), bytes.get(1).copied()) {
        (Some(b'n'), Some(b'y')) => vec![format!("s{}", tail(2)), tail(0)],
        (Some(b'n'), Some(b'g')) => vec![tail(2), format!("k{}", tail(2))],
        (Some(b'm'), Some(c)) if is_vowel(c) => vec![format!("p{}", tail(1)), tail(0)],
        (Some(b'm'), Some(_)) => vec![tail(1)],
        (Some(b'n'), Some(c)) if is_vowel(c) => vec![format!("t{}", tail(1)), tail(0)],
        (Some(b'n'), Some(_)) => vec![tail(1)],
        (Some(_), _) => vec![tail(0)],
        (None, _) => Vec::new(),
    }
}
