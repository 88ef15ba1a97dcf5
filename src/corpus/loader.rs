// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Corpus preprocessing and loading.
//!
//! The first run over a data directory encodes the corpus, builds the
//! vocabulary and writes integer tensors next to the source file. Later
//! runs find those files and skip straight to batching.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::batch::{prepare_eval, Batch, BatchScheduler};
use crate::music::{metadata_tsv, Event};
use crate::timing::MetricClock;

use super::vocab::{Symbol, Vocabulary};
use super::{encode_pieces, CorpusFile, CorpusSummary};

pub const MUSIC_INPUT_FILE: &str = "corpus.json";
pub const TEXT_INPUT_FILE: &str = "input.txt";
pub const VOCAB_FILE: &str = "vocab.json";
pub const TRAIN_TENSOR_FILE: &str = "train.json";
pub const TEST_TENSOR_FILE: &str = "test.json";
pub const TRAIN_CLOCK_FILE: &str = "train_clock.json";
pub const TEST_CLOCK_FILE: &str = "test_clock.json";
pub const METADATA_FILE: &str = "event_metadata.tsv";

/// What kind of corpus the loader reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CorpusMode {
    /// Plain text, one symbol per character
    Text,
    /// Chorale JSON corpus, one symbol per event
    Music,
}

impl fmt::Display for CorpusMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CorpusMode::Text => write!(f, "text"),
            CorpusMode::Music => write!(f, "music"),
        }
    }
}

/// The vocabulary of whichever symbol type the corpus uses
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VocabTable {
    Music(Vocabulary<Event>),
    Text(Vocabulary<char>),
}

impl VocabTable {
    /// Number of symbols
    pub fn len(&self) -> usize {
        match self {
            VocabTable::Music(v) => v.len(),
            VocabTable::Text(v) => v.len(),
        }
    }

    /// Whether the vocabulary is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ordered persisted keys
    pub fn keys(&self) -> Vec<String> {
        match self {
            VocabTable::Music(v) => v.keys(),
            VocabTable::Text(v) => v.keys(),
        }
    }

    /// Key of the symbol with the given code
    pub fn key_of(&self, code: usize) -> Result<String> {
        Ok(match self {
            VocabTable::Music(v) => v.decode_code(code)?.key(),
            VocabTable::Text(v) => v.decode_code(code)?.key(),
        })
    }

    /// Save the ordered key list
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        match self {
            VocabTable::Music(v) => v.save(path),
            VocabTable::Text(v) => v.save(path),
        }
    }

    /// Load a vocabulary of the given mode
    pub fn load<P: AsRef<Path>>(mode: CorpusMode, path: P) -> Result<Self> {
        Ok(match mode {
            CorpusMode::Music => VocabTable::Music(Vocabulary::load(path)?),
            CorpusMode::Text => VocabTable::Text(Vocabulary::load(path)?),
        })
    }

    /// Rebuild from an ordered key list, such as the one saved with a
    /// checkpoint
    pub fn from_keys<K: AsRef<str>>(mode: CorpusMode, keys: &[K]) -> Result<Self> {
        Ok(match mode {
            CorpusMode::Music => VocabTable::Music(Vocabulary::from_keys(keys)?),
            CorpusMode::Text => VocabTable::Text(Vocabulary::from_keys(keys)?),
        })
    }
}

/// Settings the loader needs
#[derive(Debug, Clone)]
pub struct LoaderOptions {
    pub mode: CorpusMode,
    pub data_dir: PathBuf,
    pub batch_size: usize,
    pub seq_length: usize,
    pub clock: MetricClock,
    /// Share of a text corpus held out for evaluation
    pub validation_fraction: f64,
}

/// The part of the loader state a saved model has to agree with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoaderSummary {
    pub mode: CorpusMode,
    pub batch_size: usize,
    pub seq_length: usize,
    pub vocab_size: usize,
    pub clock_width: usize,
}

struct Tensors {
    train: Vec<u32>,
    test: Vec<u32>,
    train_clock: Option<Vec<u32>>,
    test_clock: Option<Vec<u32>>,
}

/// Preprocessed corpus plus its batch scheduler and held-out batch
#[derive(Debug)]
pub struct DataLoader {
    options: LoaderOptions,
    vocab: VocabTable,
    train: Vec<u32>,
    test: Vec<u32>,
    train_clock: Option<Vec<u32>>,
    test_clock: Option<Vec<u32>>,
    scheduler: BatchScheduler,
    test_batch: Batch,
}

impl DataLoader {
    /// Load (preprocessing first if needed) and batch a corpus
    pub fn new(options: LoaderOptions) -> Result<Self> {
        let dir = &options.data_dir;
        let mut needed = vec![VOCAB_FILE, TRAIN_TENSOR_FILE, TEST_TENSOR_FILE];
        if options.mode == CorpusMode::Music {
            needed.extend([TRAIN_CLOCK_FILE, TEST_CLOCK_FILE]);
        }
        let need_to_preprocess = needed.iter().any(|f| !dir.join(f).exists());

        let (vocab, tensors) = if need_to_preprocess {
            info!(dir = ?dir, mode = %options.mode, "loading corpus from source file");
            match options.mode {
                CorpusMode::Music => preprocess_music(&options)?,
                CorpusMode::Text => preprocess_text(&options)?,
            }
        } else {
            info!(dir = ?dir, "loading preprocessed files");
            load_preprocessed(&options)?
        };

        info!(
            vocab_size = vocab.len(),
            train = tensors.train.len(),
            test = tensors.test.len(),
            "corpus ready"
        );

        let scheduler = BatchScheduler::prepare(
            &tensors.train,
            tensors.train_clock.as_deref(),
            options.batch_size,
            options.seq_length,
        )?;
        let test_batch = prepare_eval(
            &tensors.test,
            tensors.test_clock.as_deref(),
            options.seq_length,
        )?;
        info!(
            num_batches = scheduler.num_batches(),
            test_examples = test_batch.shape().0,
            "working with batches"
        );

        Ok(Self {
            options,
            vocab,
            train: tensors.train,
            test: tensors.test,
            train_clock: tensors.train_clock,
            test_clock: tensors.test_clock,
            scheduler,
            test_batch,
        })
    }

    /// Corpus mode
    pub fn mode(&self) -> CorpusMode {
        self.options.mode
    }

    /// The vocabulary
    pub fn vocab(&self) -> &VocabTable {
        &self.vocab
    }

    /// Number of distinct symbols
    pub fn vocab_size(&self) -> usize {
        self.vocab.len()
    }

    /// Width of the clock input; zero when the corpus has no clock
    pub fn clock_width(&self) -> usize {
        match self.options.mode {
            CorpusMode::Music => self.options.clock.width(),
            CorpusMode::Text => 0,
        }
    }

    /// Metrical clock settings
    pub fn clock(&self) -> &MetricClock {
        &self.options.clock
    }

    /// Training codes
    pub fn train_tensor(&self) -> &[u32] {
        &self.train
    }

    /// Held-out codes
    pub fn test_tensor(&self) -> &[u32] {
        &self.test
    }

    /// Training clock ticks
    pub fn train_clock(&self) -> Option<&[u32]> {
        self.train_clock.as_deref()
    }

    /// Held-out clock ticks
    pub fn test_clock(&self) -> Option<&[u32]> {
        self.test_clock.as_deref()
    }

    /// Training batches
    pub fn scheduler(&self) -> &BatchScheduler {
        &self.scheduler
    }

    /// Training batches, for iteration
    pub fn scheduler_mut(&mut self) -> &mut BatchScheduler {
        &mut self.scheduler
    }

    /// The single held-out batch
    pub fn test_batch(&self) -> &Batch {
        &self.test_batch
    }

    /// Summary stored alongside a model checkpoint
    pub fn summary(&self) -> LoaderSummary {
        LoaderSummary {
            mode: self.options.mode,
            batch_size: self.options.batch_size,
            seq_length: self.options.seq_length,
            vocab_size: self.vocab.len(),
            clock_width: self.clock_width(),
        }
    }

    /// Render the first `n` batches back into symbol keys, one string per
    /// stream, and rewind the cursor afterwards
    pub fn inspect_batches(&mut self, n: usize) -> Result<Vec<String>> {
        // Music keys are space separated, the form an event prime is read in
        let separator = match self.mode() {
            CorpusMode::Music => " ",
            CorpusMode::Text => "",
        };
        let mut rendered = Vec::new();
        self.scheduler.reset_batch_pointer();
        for batch_num in 0..n.min(self.scheduler.num_batches()) {
            let (xs, _) = self.scheduler.next_batch()?;
            for (idx, row) in xs.rows().into_iter().enumerate() {
                let keys = row
                    .iter()
                    .map(|&code| self.vocab.key_of(code as usize))
                    .collect::<Result<Vec<_>>>()?;
                let line = format!("=== batch[{}], seq[{}] === {}", batch_num, idx, keys.join(separator));
                debug!("{}", line);
                rendered.push(line);
            }
        }
        self.scheduler.reset_batch_pointer();
        Ok(rendered)
    }
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string(value)
        .with_context(|| format!("Failed to serialize {:?}", path))?;
    fs::write(path, json).with_context(|| format!("Failed to write {:?}", path))
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
    serde_json::from_str(&contents).with_context(|| format!("Failed to parse {:?}", path))
}

fn preprocess_music(options: &LoaderOptions) -> Result<(VocabTable, Tensors)> {
    let dir = &options.data_dir;
    let corpus = CorpusFile::load(dir.join(MUSIC_INPUT_FILE))?.corpus;

    let summary = CorpusSummary::of(&corpus);
    info!(
        pieces = summary.pieces,
        notes = summary.notes,
        pitches = ?summary.pitches,
        durations = ?summary.durations,
        bar_lengths = ?summary.bar_lengths,
        "corpus domains"
    );

    let (train_events, train_clock) = encode_pieces(&corpus.train, &options.clock)
        .context("Failed to encode training pieces")?;
    let (test_events, test_clock) = encode_pieces(&corpus.validate, &options.clock)
        .context("Failed to encode validation pieces")?;
    info!(
        events = train_events.len() + test_events.len(),
        "total events in the corpus"
    );

    let vocab = Vocabulary::build([train_events.as_slice(), test_events.as_slice()]);
    info!(distinct = vocab.len(), "distinct events in the corpus");

    let tensors = Tensors {
        train: vocab.encode_all(&train_events)?,
        test: vocab.encode_all(&test_events)?,
        train_clock: Some(train_clock),
        test_clock: Some(test_clock),
    };

    fs::write(dir.join(METADATA_FILE), metadata_tsv(vocab.symbols()))
        .context("Failed to write event metadata")?;
    let vocab = VocabTable::Music(vocab);
    save_preprocessed(dir, &vocab, &tensors)?;
    Ok((vocab, tensors))
}

fn preprocess_text(options: &LoaderOptions) -> Result<(VocabTable, Tensors)> {
    let dir = &options.data_dir;
    let path = dir.join(TEXT_INPUT_FILE);
    let text = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read text corpus: {:?}", path))?;
    let chars: Vec<char> = text.chars().collect();

    if !(0.0..1.0).contains(&options.validation_fraction) {
        bail!(
            "validation fraction must be in [0, 1), got {}",
            options.validation_fraction
        );
    }
    let held_out = (chars.len() as f64 * options.validation_fraction).round() as usize;
    let (train_chars, test_chars) = chars.split_at(chars.len() - held_out);
    info!(chars = chars.len(), held_out, "read text corpus");

    let vocab = Vocabulary::build([train_chars, test_chars]);
    let tensors = Tensors {
        train: vocab.encode_all(train_chars)?,
        test: vocab.encode_all(test_chars)?,
        train_clock: None,
        test_clock: None,
    };

    fs::write(dir.join(METADATA_FILE), vocab.keys().join("\n"))
        .context("Failed to write character metadata")?;
    let vocab = VocabTable::Text(vocab);
    save_preprocessed(dir, &vocab, &tensors)?;
    Ok((vocab, tensors))
}

fn save_preprocessed(dir: &Path, vocab: &VocabTable, tensors: &Tensors) -> Result<()> {
    vocab.save(dir.join(VOCAB_FILE))?;
    write_json(&dir.join(TRAIN_TENSOR_FILE), &tensors.train)?;
    write_json(&dir.join(TEST_TENSOR_FILE), &tensors.test)?;
    if let Some(clock) = &tensors.train_clock {
        write_json(&dir.join(TRAIN_CLOCK_FILE), clock)?;
    }
    if let Some(clock) = &tensors.test_clock {
        write_json(&dir.join(TEST_CLOCK_FILE), clock)?;
    }
    Ok(())
}

fn load_preprocessed(options: &LoaderOptions) -> Result<(VocabTable, Tensors)> {
    let dir = &options.data_dir;
    let vocab = VocabTable::load(options.mode, dir.join(VOCAB_FILE))?;
    let (train_clock, test_clock) = match options.mode {
        CorpusMode::Music => (
            Some(read_json(&dir.join(TRAIN_CLOCK_FILE))?),
            Some(read_json(&dir.join(TEST_CLOCK_FILE))?),
        ),
        CorpusMode::Text => (None, None),
    };
    let tensors = Tensors {
        train: read_json(&dir.join(TRAIN_TENSOR_FILE))?,
        test: read_json(&dir.join(TEST_TENSOR_FILE))?,
        train_clock,
        test_clock,
    };

    let size = vocab.len() as u32;
    if let Some(bad) = tensors.train.iter().chain(&tensors.test).find(|&&c| c >= size) {
        bail!(
            "preprocessed tensor contains code {} but the vocabulary has {} entries",
            bad,
            size
        );
    }
    Ok((vocab, tensors))
}
