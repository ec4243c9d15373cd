//! Word-index tokenizer compatible with Keras `Tokenizer.to_json()` exports.
//!
//! The vocabulary is built offline together with the classifier; this module
//! only reproduces `texts_to_sequences` so encoded ids line up with the ids
//! the model was trained on.

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Keras' default `filters` argument
pub const DEFAULT_FILTERS: &str = "!\"#$%&()*+,-./:;<=>?@[\\]^_`{|}~\t\n";

/// Maps raw text to vocabulary ids for a single sequence
pub trait Tokenizer: Send + Sync {
    fn encode(&self, text: &str) -> Vec<u32>;
}

#[derive(Debug, Deserialize)]
struct KerasTokenizerJson {
    config: KerasTokenizerConfig,
}

#[derive(Debug, Deserialize)]
struct KerasTokenizerConfig {
    #[serde(default)]
    num_words: Option<usize>,
    #[serde(default = "default_filters")]
    filters: Option<String>,
    #[serde(default = "default_lower")]
    lower: bool,
    #[serde(default = "default_split")]
    split: String,
    #[serde(default)]
    char_level: bool,
    #[serde(default)]
    oov_token: Option<String>,
    word_index: WordIndex,
}

/// Keras stores `word_index` as a JSON document inside a string
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WordIndex {
    Encoded(String),
    Map(HashMap<String, u32>),
}

fn default_filters() -> Option<String> {
    Some(DEFAULT_FILTERS.to_string())
}

fn default_lower() -> bool {
    true
}

fn default_split() -> String {
    " ".to_string()
}

pub struct VocabularyTokenizer {
    word_index: HashMap<String, u32>,
    oov_index: Option<u32>,
    num_words: Option<usize>,
    filters: HashSet<char>,
    lower: bool,
    split: String,
    char_level: bool,
}

impl VocabularyTokenizer {
    /// Tokenizer with Keras defaults over the given vocabulary
    pub fn new(word_index: HashMap<String, u32>, oov_token: Option<&str>) -> Self {
        let oov_index = oov_token.and_then(|token| word_index.get(token).copied());
        Self {
            word_index,
            oov_index,
            num_words: None,
            filters: DEFAULT_FILTERS.chars().collect(),
            lower: true,
            split: default_split(),
            char_level: false,
        }
    }

    pub fn with_num_words(mut self, num_words: usize) -> Self {
        self.num_words = Some(num_words);
        self
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read tokenizer {}", path.display()))?;
        Self::from_json(&json).with_context(|| format!("Invalid tokenizer {}", path.display()))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let parsed: KerasTokenizerJson = serde_json::from_str(json)?;
        let config = parsed.config;

        let word_index = match config.word_index {
            WordIndex::Encoded(raw) => serde_json::from_str(&raw).context("word_index is not a JSON map")?,
            WordIndex::Map(map) => map,
        };
        if word_index.is_empty() {
            bail!("word_index is empty");
        }
        if config.split.is_empty() && !config.char_level {
            bail!("split separator must not be empty");
        }

        let oov_index = match &config.oov_token {
            Some(token) => Some(
                word_index
                    .get(token)
                    .copied()
                    .with_context(|| format!("oov_token {:?} missing from word_index", token))?,
            ),
            None => None,
        };

        Ok(Self {
            word_index,
            oov_index,
            num_words: config.num_words.filter(|n| *n > 0),
            filters: config.filters.unwrap_or_default().chars().collect(),
            lower: config.lower,
            split: config.split,
            char_level: config.char_level,
        })
    }

    pub fn vocabulary_size(&self) -> usize {
        self.word_index.len()
    }

    fn words(&self, text: &str) -> Vec<String> {
        let text = if self.lower {
            text.to_lowercase()
        } else {
            text.to_string()
        };

        if self.char_level {
            return text.chars().map(String::from).collect();
        }

        let mut translated = String::with_capacity(text.len());
        for c in text.chars() {
            if self.filters.contains(&c) {
                translated.push_str(&self.split);
            } else {
                translated.push(c);
            }
        }

        translated
            .split(self.split.as_str())
            .filter(|word| !word.is_empty())
            .map(str::to_string)
            .collect()
    }

    fn index_of(&self, word: &str) -> Option<u32> {
        match self.word_index.get(word) {
            Some(&index) if self.num_words.is_some_and(|n| index as usize >= n) => self.oov_index,
            Some(&index) => Some(index),
            None => self.oov_index,
        }
    }
}

impl Tokenizer for VocabularyTokenizer {
    fn encode(&self, text: &str) -> Vec<u32> {
        self.words(text)
            .iter()
            .filter_map(|word| self.index_of(word))
            .collect()
    }
}
