// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Error types shared across the crate.
//!
//! Each subsystem has its own error enum so callers can match on the
//! failure they care about; [`Error`] wraps all of them for code that just
//! wants to propagate.

use thiserror::Error;

/// Failures while converting notes to events and back
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("bar length {bar_length} exceeds the configured maximum of {max}")]
    BarTooLong { bar_length: u32, max: u32 },

    #[error("note {index} has non-positive duration {duration}")]
    NonPositiveDuration { index: usize, duration: i32 },

    #[error("quantization must be positive")]
    ZeroQuantization,

    #[error("cannot parse event from {0:?}")]
    BadEventKey(String),
}

/// Vocabulary lookups and persistence
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VocabError {
    #[error("symbol {0:?} is not in the vocabulary")]
    UnknownSymbol(String),

    #[error("code {code} is out of range for a vocabulary of {size}")]
    CodeOutOfRange { code: usize, size: usize },

    #[error("vocabulary contains duplicate symbol {0:?}")]
    DuplicateSymbol(String),

    #[error("cannot parse symbol from {0:?}")]
    BadKey(String),
}

/// Batch preparation and iteration
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BatchError {
    #[error(
        "insufficient data: {len} codes cannot fill a single batch of \
         {batch_size} x {seq_length}; make seq_length and/or batch_size smaller"
    )]
    InsufficientData {
        len: usize,
        batch_size: usize,
        seq_length: usize,
    },

    #[error("clock tensor has {clock} entries but the event tensor has {events}")]
    ClockLengthMismatch { events: usize, clock: usize },

    #[error("batch size and sequence length must be positive")]
    ZeroShape,

    #[error("batch cursor {cursor} is past the last of {num_batches} batches")]
    Exhausted { cursor: usize, num_batches: usize },

    #[error("no clock data was prepared for this scheduler")]
    NoClock,
}

/// Sequence model construction and stepping
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ModelError {
    #[error("shape mismatch: {what} is {actual:?}, expected {expected:?}")]
    ShapeMismatch {
        what: &'static str,
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("code {code} is out of range for a vocabulary of {vocab_size}")]
    CodeOutOfRange { code: usize, vocab_size: usize },

    #[error("clock tick {tick} is out of range for a clock of width {width}")]
    TickOutOfRange { tick: usize, width: usize },

    #[error("clock width {clock_width} leaves no room in hidden size {hidden_size}")]
    ClockTooWide {
        clock_width: usize,
        hidden_size: usize,
    },

    #[error("unsupported sampling method {0}")]
    UnsupportedSampling(u8),

    #[error("sampling needs at least one priming symbol")]
    EmptyPrime,

    #[error("train_step called on a model built for {0:?} mode")]
    NotTraining(crate::model::RnnMode),

    #[error(transparent)]
    Vocab(#[from] VocabError),
}

/// Saved model configuration and parameters
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("saved model has {field} = {saved}, but {requested} was requested")]
    Incompatible {
        field: &'static str,
        saved: String,
        requested: String,
    },

    #[error("data and saved model vocabularies differ")]
    VocabMismatch,

    #[error("checkpoint parameters do not match the model shape: {0}")]
    ParameterShape(String),

    #[error("checkpoint I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("checkpoint JSON is malformed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("checkpoint config is malformed: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("checkpoint config could not be written: {0}")]
    TomlSer(#[from] toml::ser::Error),
}

/// Umbrella error for callers that only propagate
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Vocab(#[from] VocabError),
    #[error(transparent)]
    Batch(#[from] BatchError),
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
