// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Checkpoint directory layout.
//!
//! ```text
//! save/
//!   config.toml         model configuration and loader summary
//!   events_vocab.json   ordered vocabulary keys
//!   model-<step>.json   weights after <step> training steps
//!   checkpoint.json     which weights file is the latest
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::CheckpointError;
use crate::nn::{Network, NetworkShape};

use super::config::ModelConfig;
use super::driver::SequenceModel;
use super::RnnMode;

pub const CONFIG_FILE: &str = "config.toml";
pub const VOCAB_FILE: &str = "events_vocab.json";
pub const CHECKPOINT_FILE: &str = "checkpoint.json";

/// Pointer to the most recent weights
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointState {
    /// Weights file name, relative to the checkpoint directory
    pub model_checkpoint_path: String,
    pub global_step: usize,
    /// Epochs completed when the weights were written
    pub epoch: usize,
    pub learning_rate: f32,
}

/// Everything restored from a checkpoint directory
#[derive(Debug, Clone)]
pub struct Checkpoint {
    pub config: ModelConfig,
    pub state: CheckpointState,
    pub params: Network,
    pub vocab_keys: Vec<String>,
}

/// Name of the weights file for a step
pub fn params_file_name(step: usize) -> String {
    format!("model-{}.json", step)
}

/// Write config, vocabulary and weights, then point `checkpoint.json` at
/// them. Returns the path of the weights file.
pub fn save(
    dir: &Path,
    config: &ModelConfig,
    params: &Network,
    vocab_keys: &[String],
    state: &CheckpointState,
) -> Result<PathBuf, CheckpointError> {
    fs::create_dir_all(dir)?;
    config.save(dir.join(CONFIG_FILE))?;
    fs::write(dir.join(VOCAB_FILE), serde_json::to_string(vocab_keys)?)?;

    let params_path = dir.join(&state.model_checkpoint_path);
    fs::write(&params_path, serde_json::to_string(params)?)?;
    fs::write(dir.join(CHECKPOINT_FILE), serde_json::to_string_pretty(state)?)?;

    info!(path = ?params_path, step = state.global_step, "model saved");
    Ok(params_path)
}

/// Load the latest checkpoint in `dir`.
///
/// A directory without `checkpoint.json` holds no checkpoint and gives
/// `Ok(None)`. Anything missing or malformed once that file exists is an
/// error.
pub fn latest(dir: &Path) -> Result<Option<Checkpoint>, CheckpointError> {
    let pointer = dir.join(CHECKPOINT_FILE);
    if !pointer.exists() {
        debug!(dir = ?dir, "no checkpoint found");
        return Ok(None);
    }

    let state: CheckpointState = serde_json::from_str(&fs::read_to_string(&pointer)?)?;
    let config = ModelConfig::load(dir.join(CONFIG_FILE))?;
    let vocab_keys: Vec<String> = serde_json::from_str(&fs::read_to_string(dir.join(VOCAB_FILE))?)?;
    let params: Network =
        serde_json::from_str(&fs::read_to_string(dir.join(&state.model_checkpoint_path))?)?;

    check_params(&params, config.network_shape())?;
    if vocab_keys.len() != config.loader.vocab_size {
        return Err(CheckpointError::VocabMismatch);
    }

    info!(
        path = ?dir.join(&state.model_checkpoint_path),
        step = state.global_step,
        "checkpoint loaded"
    );
    Ok(Some(Checkpoint {
        config,
        state,
        params,
        vocab_keys,
    }))
}

fn check_params(params: &Network, shape: NetworkShape) -> Result<(), CheckpointError> {
    let hidden = shape.hidden_size;
    let mismatch = |what: &str,
                    expected: (usize, usize),
                    actual: (usize, usize)|
     -> Result<(), CheckpointError> {
        Err(CheckpointError::ParameterShape(format!(
            "{} is {:?}, expected {:?}",
            what, actual, expected
        )))
    };

    if params.embedding.dim() != (shape.vocab_size, shape.embed_size()) {
        return mismatch("embedding", (shape.vocab_size, shape.embed_size()), params.embedding.dim());
    }
    if params.clock_table.dim() != (shape.clock_width + 1, shape.clock_width) {
        return mismatch(
            "clock table",
            (shape.clock_width + 1, shape.clock_width),
            params.clock_table.dim(),
        );
    }
    if params.layers.len() != shape.num_layers {
        return mismatch("layers", (shape.num_layers, hidden), (params.layers.len(), hidden));
    }
    for layer in &params.layers {
        if layer.w.dim() != (2 * hidden, 4 * hidden) || layer.b.len() != 4 * hidden {
            return mismatch("lstm weights", (2 * hidden, 4 * hidden), layer.w.dim());
        }
    }
    if params.softmax_w.dim() != (hidden, shape.vocab_size) || params.softmax_b.len() != shape.vocab_size {
        return mismatch("softmax weights", (hidden, shape.vocab_size), params.softmax_w.dim());
    }
    Ok(())
}

impl Checkpoint {
    /// Fail unless the data's vocabulary is the one the model was trained on
    pub fn check_vocab(&self, keys: &[String]) -> Result<(), CheckpointError> {
        if self.vocab_keys.as_slice() == keys {
            Ok(())
        } else {
            Err(CheckpointError::VocabMismatch)
        }
    }

    /// Build a model in `mode` around the restored weights, at the saved
    /// learning rate
    pub fn into_model(self, mode: RnnMode, seed: Option<u64>) -> crate::error::Result<SequenceModel> {
        let mut model = SequenceModel::from_params(&self.config, mode, self.params, seed)?;
        model.assign_lr(self.state.learning_rate);
        Ok(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::{CorpusMode, LoaderSummary};
    use tempfile::tempdir;

    fn config() -> ModelConfig {
        ModelConfig {
            hidden_size: 12,
            num_layers: 1,
            ..ModelConfig::for_loader(LoaderSummary {
                mode: CorpusMode::Music,
                batch_size: 2,
                seq_length: 4,
                vocab_size: 3,
                clock_width: 4,
            })
        }
    }

    fn keys() -> Vec<String> {
        vec!["|".to_string(), "n60d4".to_string(), "r2".to_string()]
    }

    fn state(step: usize) -> CheckpointState {
        CheckpointState {
            model_checkpoint_path: params_file_name(step),
            global_step: step,
            epoch: 1,
            learning_rate: 0.8,
        }
    }

    #[test]
    fn test_missing_checkpoint_is_none() {
        let dir = tempdir().unwrap();
        assert!(latest(dir.path()).unwrap().is_none());
    }

    #[test]
    fn test_save_and_restore() {
        let dir = tempdir().unwrap();
        let model = SequenceModel::new(&config(), RnnMode::Train, Some(4)).unwrap();
        let path = save(dir.path(), &config(), model.params(), &keys(), &state(10)).unwrap();
        assert!(path.ends_with("model-10.json"));

        let ckpt = latest(dir.path()).unwrap().unwrap();
        assert_eq!(ckpt.config, config());
        assert_eq!(ckpt.state, state(10));
        assert_eq!(&ckpt.params, model.params());
        assert!(ckpt.check_vocab(&keys()).is_ok());

        let restored = ckpt.into_model(RnnMode::Sample, None).unwrap();
        assert_eq!(restored.learning_rate(), 0.8);
        assert_eq!(restored.descriptor().batch_size, 1);
    }

    #[test]
    fn test_latest_follows_pointer() {
        let dir = tempdir().unwrap();
        let mut model = SequenceModel::new(&config(), RnnMode::Train, Some(4)).unwrap();
        save(dir.path(), &config(), model.params(), &keys(), &state(1)).unwrap();
        model = SequenceModel::new(&config(), RnnMode::Train, Some(5)).unwrap();
        save(dir.path(), &config(), model.params(), &keys(), &state(2)).unwrap();

        let ckpt = latest(dir.path()).unwrap().unwrap();
        assert_eq!(ckpt.state.global_step, 2);
        assert_eq!(&ckpt.params, model.params());
    }

    #[test]
    fn test_vocab_mismatch() {
        let dir = tempdir().unwrap();
        let model = SequenceModel::new(&config(), RnnMode::Train, Some(4)).unwrap();
        save(dir.path(), &config(), model.params(), &keys(), &state(1)).unwrap();
        let ckpt = latest(dir.path()).unwrap().unwrap();

        let mut other = keys();
        other.swap(1, 2);
        assert!(matches!(ckpt.check_vocab(&other), Err(CheckpointError::VocabMismatch)));
    }

    #[test]
    fn test_corrupt_checkpoint_is_error() {
        let dir = tempdir().unwrap();
        let model = SequenceModel::new(&config(), RnnMode::Train, Some(4)).unwrap();
        save(dir.path(), &config(), model.params(), &keys(), &state(1)).unwrap();
        fs::remove_file(dir.path().join(params_file_name(1))).unwrap();
        assert!(matches!(latest(dir.path()), Err(CheckpointError::Io(_))));
    }

    #[test]
    fn test_wrong_parameter_shape() {
        let dir = tempdir().unwrap();
        let model = SequenceModel::new(&config(), RnnMode::Train, Some(4)).unwrap();
        let mut bigger = config();
        bigger.num_layers = 2;
        save(dir.path(), &config(), model.params(), &keys(), &state(1)).unwrap();
        bigger.save(dir.path().join(CONFIG_FILE)).unwrap();
        assert!(matches!(latest(dir.path()), Err(CheckpointError::ParameterShape(_))));
    }
}
