// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Symbolic musical events.
//!
//! Events are the alphabet the RNN reads and writes. Each has a compact
//! string key (`|`, `n60d4`, `r2`) used when the vocabulary is persisted.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::corpus::vocab::Symbol;
use crate::error::{CodecError, VocabError};

/// Key of the piece divider
pub const DIVIDER_KEY: &str = "|";

/// A note as produced by the corpus extractor: `[pitch, offset, duration]`
/// in MIDI note numbers and semiquavers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "[i32; 3]", into = "[i32; 3]")]
pub struct Note {
    pub pitch: i32,
    pub offset: i32,
    pub duration: i32,
}

impl Note {
    /// Create a new note
    pub fn new(pitch: i32, offset: i32, duration: i32) -> Self {
        Self {
            pitch,
            offset,
            duration,
        }
    }

    /// Offset at which the note stops sounding
    pub fn end(&self) -> i32 {
        self.offset + self.duration
    }
}

impl From<[i32; 3]> for Note {
    fn from(triple: [i32; 3]) -> Self {
        Self::new(triple[0], triple[1], triple[2])
    }
}

impl From<Note> for [i32; 3] {
    fn from(note: Note) -> Self {
        [note.pitch, note.offset, note.duration]
    }
}

/// One symbol of the event stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Event {
    /// Boundary between pieces
    Divider,
    /// A sounding pitch held for `duration` semiquavers
    Note { pitch: i32, duration: i32 },
    /// Silence for `duration` semiquavers
    Rest { duration: i32 },
}

impl Event {
    /// Create a note event
    pub fn note(pitch: i32, duration: i32) -> Self {
        Event::Note { pitch, duration }
    }

    /// Create a rest event
    pub fn rest(duration: i32) -> Self {
        Event::Rest { duration }
    }

    /// Duration in semiquavers (`None` for the divider)
    pub fn duration(&self) -> Option<i32> {
        match self {
            Event::Divider => None,
            Event::Note { duration, .. } | Event::Rest { duration } => Some(*duration),
        }
    }

    /// Pitch, if this is a note
    pub fn pitch(&self) -> Option<i32> {
        match self {
            Event::Note { pitch, .. } => Some(*pitch),
            _ => None,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::Divider => write!(f, "{}", DIVIDER_KEY),
            Event::Note { pitch, duration } => write!(f, "n{}d{}", pitch, duration),
            Event::Rest { duration } => write!(f, "r{}", duration),
        }
    }
}

impl FromStr for Event {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || CodecError::BadEventKey(s.to_string());

        if s == DIVIDER_KEY {
            return Ok(Event::Divider);
        }
        if let Some(rest) = s.strip_prefix('r') {
            let duration = rest.parse().map_err(|_| bad())?;
            return Ok(Event::Rest { duration });
        }
        if let Some(note) = s.strip_prefix('n') {
            let (pitch, duration) = note.split_once('d').ok_or_else(bad)?;
            return Ok(Event::Note {
                pitch: pitch.parse().map_err(|_| bad())?,
                duration: duration.parse().map_err(|_| bad())?,
            });
        }
        Err(bad())
    }
}

impl Symbol for Event {
    fn key(&self) -> String {
        self.to_string()
    }

    fn from_key(key: &str) -> Result<Self, VocabError> {
        key.parse().map_err(|_| VocabError::BadKey(key.to_string()))
    }

    fn duration(&self) -> Option<i32> {
        Event::duration(self)
    }
}
