// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Run configuration.
//!
//! A run is described by a YAML file whose fields all have defaults, so a
//! minimal file only names what differs from the reference setup. Command
//! line flags are applied on top.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::corpus::loader::LoaderOptions;
use crate::corpus::CorpusMode;
use crate::timing::{MetricClock, DEFAULT_MAX_BAR_LENGTH};

/// Everything a training, evaluation or sampling run needs
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunConfig {
    /// Corpus type
    #[serde(default = "default_mode")]
    pub mode: CorpusMode,
    /// Directory holding the corpus and preprocessed tensors
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Directory for checkpoints
    #[serde(default = "default_save_dir")]
    pub save_dir: PathBuf,
    /// Directory for the training log
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    /// Parallel streams per batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Unrolled window length
    #[serde(default = "default_seq_length")]
    pub seq_length: usize,
    /// Width of each LSTM layer
    #[serde(default = "default_hidden_size")]
    pub hidden_size: usize,
    /// Number of stacked LSTM layers
    #[serde(default = "default_num_layers")]
    pub num_layers: usize,
    /// Passes over the training data
    #[serde(default = "default_num_epochs")]
    pub num_epochs: usize,
    /// Initial learning rate
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f32,
    /// Per-epoch learning rate multiplier
    #[serde(default = "default_lr_decay")]
    pub lr_decay: f32,
    /// Global gradient norm bound
    #[serde(default = "default_max_grad_norm")]
    pub max_grad_norm: f32,
    /// Dropout keep probability while training (1.0 disables dropout)
    #[serde(default = "default_keep_prob")]
    pub keep_prob: f32,
    /// Half-width of the uniform weight initialisation
    #[serde(default = "default_init_scale")]
    pub init_scale: f32,
    /// Checkpoint every this many training steps
    #[serde(default = "default_save_every")]
    pub save_every: usize,
    /// Clock grid in semiquavers
    #[serde(default = "default_quantization")]
    pub quantization: u32,
    /// Longest bar the clock represents, in semiquavers
    #[serde(default = "default_max_bar_length")]
    pub max_bar_length: u32,
    /// Share of a text corpus held out for evaluation
    #[serde(default = "default_validation_fraction")]
    pub validation_fraction: f64,
    /// RNG seed; entropy-seeded when absent
    #[serde(default)]
    pub seed: Option<u64>,
    /// Continue from the checkpoint in `save_dir`
    #[serde(default)]
    pub resume: bool,
}

fn default_mode() -> CorpusMode {
    CorpusMode::Music
}
fn default_data_dir() -> PathBuf {
    PathBuf::from("data/chorales")
}
fn default_save_dir() -> PathBuf {
    PathBuf::from("save")
}
fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}
fn default_batch_size() -> usize {
    50
}
fn default_seq_length() -> usize {
    50
}
fn default_hidden_size() -> usize {
    128
}
fn default_num_layers() -> usize {
    2
}
fn default_num_epochs() -> usize {
    20
}
fn default_learning_rate() -> f32 {
    1.0
}
fn default_lr_decay() -> f32 {
    0.8
}
fn default_max_grad_norm() -> f32 {
    5.0
}
fn default_keep_prob() -> f32 {
    0.5
}
fn default_init_scale() -> f32 {
    0.1
}
fn default_save_every() -> usize {
    1000
}
fn default_quantization() -> u32 {
    1
}
fn default_max_bar_length() -> u32 {
    DEFAULT_MAX_BAR_LENGTH
}
fn default_validation_fraction() -> f64 {
    0.1
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            data_dir: default_data_dir(),
            save_dir: default_save_dir(),
            log_dir: default_log_dir(),
            batch_size: default_batch_size(),
            seq_length: default_seq_length(),
            hidden_size: default_hidden_size(),
            num_layers: default_num_layers(),
            num_epochs: default_num_epochs(),
            learning_rate: default_learning_rate(),
            lr_decay: default_lr_decay(),
            max_grad_norm: default_max_grad_norm(),
            keep_prob: default_keep_prob(),
            init_scale: default_init_scale(),
            save_every: default_save_every(),
            quantization: default_quantization(),
            max_bar_length: default_max_bar_length(),
            validation_fraction: default_validation_fraction(),
            seed: None,
            resume: false,
        }
    }
}

impl RunConfig {
    /// Load a run configuration from a YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;
        Self::from_yaml(&contents)
    }

    /// Parse a run configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml).context("Failed to parse YAML configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to a YAML string
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Failed to serialize configuration to YAML")
    }

    /// Reject settings no run could use
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 || self.seq_length == 0 {
            bail!("batch_size and seq_length must be positive");
        }
        if self.hidden_size == 0 || self.num_layers == 0 {
            bail!("hidden_size and num_layers must be positive");
        }
        if !(self.keep_prob > 0.0 && self.keep_prob <= 1.0) {
            bail!("keep_prob must be in (0, 1], got {}", self.keep_prob);
        }
        if self.save_every == 0 {
            bail!("save_every must be positive");
        }
        if !(self.validation_fraction > 0.0 && self.validation_fraction < 1.0) {
            bail!(
                "validation_fraction must be in (0, 1), got {}",
                self.validation_fraction
            );
        }
        let clock = self.clock()?;
        if self.mode == CorpusMode::Music && clock.width() >= self.hidden_size {
            bail!(
                "clock width {} leaves no room for the event embedding in hidden size {}",
                clock.width(),
                self.hidden_size
            );
        }
        Ok(())
    }

    /// Metrical clock described by this config
    pub fn clock(&self) -> Result<MetricClock> {
        Ok(MetricClock::new(self.quantization, self.max_bar_length)?)
    }

    /// Options for the corpus loader
    pub fn loader_options(&self) -> Result<LoaderOptions> {
        Ok(LoaderOptions {
            mode: self.mode,
            data_dir: self.data_dir.clone(),
            batch_size: self.batch_size,
            seq_length: self.seq_length,
            clock: self.clock()?,
            validation_fraction: self.validation_fraction,
        })
    }
}
