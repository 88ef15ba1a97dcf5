// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Sequence model: configuration, run mode, stepping, sampling and
//! checkpoints.

pub mod checkpoint;
pub mod config;
pub mod driver;
pub mod entropy;
pub mod sampling;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::nn::NetworkShape;

pub use checkpoint::{Checkpoint, CheckpointState};
pub use config::ModelConfig;
pub use driver::SequenceModel;
pub use entropy::{cross_entropy, distribution_entropy, EntropyTrace};
pub use sampling::SamplingMethod;

/// What a model instance is built to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RnnMode {
    Train,
    Test,
    Sample,
}

impl fmt::Display for RnnMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RnnMode::Train => write!(f, "train"),
            RnnMode::Test => write!(f, "test"),
            RnnMode::Sample => write!(f, "sample"),
        }
    }
}

/// Shapes and switches fixed when the model is built
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelDescriptor {
    pub mode: RnnMode,
    pub batch_size: usize,
    pub seq_length: usize,
    /// 1.0 outside training
    pub keep_prob: f32,
    pub shape: NetworkShape,
}

impl ModelDescriptor {
    /// Resolve a saved configuration for one mode.
    ///
    /// Sampling always runs one stream one step at a time.
    pub fn resolve(config: &ModelConfig, mode: RnnMode) -> Result<Self, ModelError> {
        let shape = config.network_shape();
        if shape.clock_width >= shape.hidden_size {
            return Err(ModelError::ClockTooWide {
                clock_width: shape.clock_width,
                hidden_size: shape.hidden_size,
            });
        }

        let (batch_size, seq_length) = match mode {
            RnnMode::Sample => (1, 1),
            RnnMode::Train | RnnMode::Test => (config.loader.batch_size, config.loader.seq_length),
        };
        let keep_prob = match mode {
            RnnMode::Train => config.keep_prob,
            RnnMode::Test | RnnMode::Sample => 1.0,
        };

        Ok(Self {
            mode,
            batch_size,
            seq_length,
            keep_prob,
            shape,
        })
    }

    /// Whether training steps apply dropout
    pub fn uses_dropout(&self) -> bool {
        self.mode == RnnMode::Train && self.keep_prob < 1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::{CorpusMode, LoaderSummary};

    fn config() -> ModelConfig {
        ModelConfig {
            hidden_size: 32,
            num_layers: 2,
            keep_prob: 0.5,
            ..ModelConfig::for_loader(LoaderSummary {
                mode: CorpusMode::Music,
                batch_size: 10,
                seq_length: 20,
                vocab_size: 40,
                clock_width: 16,
            })
        }
    }

    #[test]
    fn test_sample_mode_is_single_step() {
        let desc = ModelDescriptor::resolve(&config(), RnnMode::Sample).unwrap();
        assert_eq!((desc.batch_size, desc.seq_length), (1, 1));
        assert_eq!(desc.keep_prob, 1.0);
        assert!(!desc.uses_dropout());
        assert_eq!(desc.shape.embed_size(), 16);
    }

    #[test]
    fn test_dropout_only_in_training() {
        let train = ModelDescriptor::resolve(&config(), RnnMode::Train).unwrap();
        assert_eq!((train.batch_size, train.seq_length), (10, 20));
        assert!(train.uses_dropout());

        let test = ModelDescriptor::resolve(&config(), RnnMode::Test).unwrap();
        assert!(!test.uses_dropout());
    }

    #[test]
    fn test_clock_wider_than_hidden() {
        let mut config = config();
        config.hidden_size = 16;
        assert!(matches!(
            ModelDescriptor::resolve(&config, RnnMode::Train),
            Err(ModelError::ClockTooWide { .. })
        ));
    }
}
