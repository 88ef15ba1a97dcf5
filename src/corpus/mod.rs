// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Training corpora.
//!
//! This module reads the chorale corpus produced by the extraction scripts,
//! builds vocabularies over it, and prepares integer tensors for batching.

pub mod loader;
pub mod vocab;

pub use loader::{CorpusMode, DataLoader, LoaderSummary, VocabTable};
pub use vocab::{Symbol, Vocabulary};

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::CodecError;
use crate::music::{self, Event, Note};
use crate::timing::MetricClock;

/// Root of the corpus JSON document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CorpusFile {
    pub corpus: Corpus,
}

impl CorpusFile {
    /// Load a corpus from a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read corpus file: {:?}", path.as_ref()))?;
        Self::from_json(&contents)
    }

    /// Parse a corpus from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse corpus JSON")
    }
}

/// Train/validation split of the corpus
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Corpus {
    #[serde(default)]
    pub train: Vec<Piece>,
    #[serde(default)]
    pub validate: Vec<Piece>,
}

/// One chorale melody
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Piece {
    /// Notes as `[pitch, offset, duration]` triples
    pub notes: Vec<Note>,
    /// Bar length in semiquavers
    #[serde(alias = "time_sig_semis")]
    pub time_sig_amt: u32,
    /// Catalogue title, when the extractor provides one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl Piece {
    /// Encode this piece into events and clock ticks
    pub fn encode(&self, clock: &MetricClock) -> Result<(Vec<Event>, Vec<u32>), CodecError> {
        music::encode(&self.notes, clock, self.time_sig_amt)
    }
}

/// Encode a run of pieces into one flat event stream and its clock
pub fn encode_pieces(
    pieces: &[Piece],
    clock: &MetricClock,
) -> Result<(Vec<Event>, Vec<u32>), CodecError> {
    let mut events = Vec::new();
    let mut ticks = Vec::new();
    for piece in pieces {
        let (e, t) = piece.encode(clock)?;
        events.extend(e);
        ticks.extend(t);
    }
    Ok((events, ticks))
}

/// Value domains present in a corpus
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CorpusSummary {
    pub pieces: usize,
    pub notes: usize,
    pub pitches: BTreeSet<i32>,
    pub durations: BTreeSet<i32>,
    pub bar_lengths: BTreeSet<u32>,
}

impl CorpusSummary {
    /// Summarise every piece in the corpus
    pub fn of(corpus: &Corpus) -> Self {
        let mut summary = Self::default();
        for piece in corpus.train.iter().chain(&corpus.validate) {
            summary.pieces += 1;
            summary.notes += piece.notes.len();
            summary.bar_lengths.insert(piece.time_sig_amt);
            for note in &piece.notes {
                summary.pitches.insert(note.pitch);
                summary.durations.insert(note.duration);
            }
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CORPUS: &str = r#"{
        "metadata": {"pitch_domain": [60, 62]},
        "corpus": {
            "train": [
                {"title": "Test", "notes": [[60, 0, 4], [62, 4, 4]], "time_sig_amt": 16}
            ],
            "validate": [
                {"notes": [[62, 2, 2]], "time_sig_semis": 12}
            ]
        }
    }"#;

    #[test]
    fn test_parse_corpus() {
        let file = CorpusFile::from_json(CORPUS).unwrap();
        assert_eq!(file.corpus.train.len(), 1);
        assert_eq!(file.corpus.validate.len(), 1);
        assert_eq!(file.corpus.train[0].title.as_deref(), Some("Test"));
        assert_eq!(file.corpus.validate[0].time_sig_amt, 12);
        assert_eq!(file.corpus.train[0].notes[1], Note::new(62, 4, 4));
    }

    #[test]
    fn test_encode_pieces_concatenates() {
        let file = CorpusFile::from_json(CORPUS).unwrap();
        let clock = MetricClock::default();
        let (events, ticks) = encode_pieces(&file.corpus.validate, &clock).unwrap();
        assert_eq!(events, vec![Event::Divider, Event::rest(2), Event::note(62, 2)]);
        assert_eq!(ticks, vec![0, 1, 3]);

        let (all, all_ticks) = encode_pieces(
            &[file.corpus.train[0].clone(), file.corpus.validate[0].clone()],
            &clock,
        )
        .unwrap();
        assert_eq!(all.len(), 6);
        assert_eq!(all_ticks, vec![0, 1, 5, 0, 1, 3]);
    }

    #[test]
    fn test_summary() {
        let file = CorpusFile::from_json(CORPUS).unwrap();
        let summary = CorpusSummary::of(&file.corpus);
        assert_eq!(summary.pieces, 2);
        assert_eq!(summary.notes, 3);
        assert_eq!(summary.pitches.into_iter().collect::<Vec<_>>(), vec![60, 62]);
        assert_eq!(summary.durations.into_iter().collect::<Vec<_>>(), vec![2, 4]);
        assert_eq!(summary.bar_lengths.into_iter().collect::<Vec<_>>(), vec![12, 16]);
    }

    #[test]
    fn test_missing_bar_length_is_an_error() {
        let json = r#"{"corpus": {"train": [{"notes": []}]}}"#;
        assert!(CorpusFile::from_json(json).is_err());
    }
}
