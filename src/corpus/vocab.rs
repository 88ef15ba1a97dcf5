// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Frequency-ranked vocabulary.
//!
//! Codes are assigned by descending frequency; symbols with equal counts
//! keep the order in which they were first seen. The persisted form is just
//! the ordered list of keys, so a reload reproduces the same codes.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::hash::Hash;
use std::path::Path;

use anyhow::{Context, Result};

use crate::error::VocabError;

/// Something that can live in a vocabulary
pub trait Symbol: Clone + Eq + Hash + fmt::Debug {
    /// Stable string key used for persistence
    fn key(&self) -> String;

    /// Parse a key written by [`Symbol::key`]
    fn from_key(key: &str) -> Result<Self, VocabError>;

    /// Time taken by the symbol in semiquavers; `None` for symbols that
    /// carry no time
    fn duration(&self) -> Option<i32> {
        None
    }

    /// Whether the symbol separates words (used by boundary sampling)
    fn is_word_boundary(&self) -> bool {
        false
    }
}

impl Symbol for char {
    fn key(&self) -> String {
        self.to_string()
    }

    fn from_key(key: &str) -> Result<Self, VocabError> {
        let mut chars = key.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Ok(c),
            _ => Err(VocabError::BadKey(key.to_string())),
        }
    }

    fn is_word_boundary(&self) -> bool {
        *self == ' '
    }
}

/// Bijection between symbols and dense integer codes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vocabulary<S: Symbol> {
    symbols: Vec<S>,
    codes: HashMap<S, usize>,
}

impl<S: Symbol> Vocabulary<S> {
    /// Build from one or more symbol streams
    pub fn build<'a, I>(streams: I) -> Self
    where
        I: IntoIterator<Item = &'a [S]>,
        S: 'a,
    {
        let mut counts: Vec<(S, usize)> = Vec::new();
        let mut seen: HashMap<S, usize> = HashMap::new();

        for stream in streams {
            for symbol in stream {
                match seen.get(symbol) {
                    Some(&i) => counts[i].1 += 1,
                    None => {
                        seen.insert(symbol.clone(), counts.len());
                        counts.push((symbol.clone(), 1));
                    }
                }
            }
        }

        // sort_by is stable, so ties stay in first-seen order
        counts.sort_by(|a, b| b.1.cmp(&a.1));
        let symbols = counts.into_iter().map(|(s, _)| s).collect();
        Self::index(symbols)
    }

    /// Rebuild from an ordered symbol list
    pub fn from_symbols(symbols: Vec<S>) -> Result<Self, VocabError> {
        let vocab = Self::index(symbols);
        if vocab.codes.len() != vocab.symbols.len() {
            let mut seen = HashMap::new();
            for s in &vocab.symbols {
                if seen.insert(s, ()).is_some() {
                    return Err(VocabError::DuplicateSymbol(s.key()));
                }
            }
        }
        Ok(vocab)
    }

    fn index(symbols: Vec<S>) -> Self {
        let codes = symbols
            .iter()
            .enumerate()
            .map(|(i, s)| (s.clone(), i))
            .collect();
        Self { symbols, codes }
    }

    /// Number of distinct symbols
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// Whether the vocabulary is empty
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Symbols in code order
    pub fn symbols(&self) -> &[S] {
        &self.symbols
    }

    /// Look up the code of a symbol
    pub fn encode_event(&self, symbol: &S) -> Result<usize, VocabError> {
        self.codes
            .get(symbol)
            .copied()
            .ok_or_else(|| VocabError::UnknownSymbol(symbol.key()))
    }

    /// Look up the symbol for a code
    pub fn decode_code(&self, code: usize) -> Result<&S, VocabError> {
        self.symbols.get(code).ok_or(VocabError::CodeOutOfRange {
            code,
            size: self.symbols.len(),
        })
    }

    /// Encode a whole stream, failing on the first unknown symbol
    pub fn encode_all(&self, symbols: &[S]) -> Result<Vec<u32>, VocabError> {
        symbols
            .iter()
            .map(|s| self.encode_event(s).map(|c| c as u32))
            .collect()
    }

    /// Ordered list of keys (the persisted form)
    pub fn keys(&self) -> Vec<String> {
        self.symbols.iter().map(Symbol::key).collect()
    }

    /// Rebuild from persisted keys
    pub fn from_keys<K: AsRef<str>>(keys: &[K]) -> Result<Self, VocabError> {
        let symbols = keys
            .iter()
            .map(|k| S::from_key(k.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_symbols(symbols)
    }

    /// Save the ordered key list as JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string(&self.keys()).context("Failed to serialize vocabulary")?;
        fs::write(path.as_ref(), json)
            .with_context(|| format!("Failed to write vocabulary file: {:?}", path.as_ref()))
    }

    /// Load a vocabulary saved by [`Vocabulary::save`]
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read vocabulary file: {:?}", path.as_ref()))?;
        let keys: Vec<String> =
            serde_json::from_str(&contents).context("Failed to parse vocabulary JSON")?;
        Ok(Self::from_keys(&keys)?)
    }
}
