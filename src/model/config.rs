// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Hyperparameters saved with every checkpoint.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::RunConfig;
use crate::corpus::LoaderSummary;
use crate::error::CheckpointError;
use crate::nn::NetworkShape;

/// Model hyperparameters plus the loader settings they were trained with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub hidden_size: usize,
    pub num_layers: usize,
    pub init_scale: f32,
    pub keep_prob: f32,
    pub learning_rate: f32,
    pub lr_decay: f32,
    pub max_grad_norm: f32,
    pub num_epochs: usize,
    pub save_every: usize,
    pub loader: LoaderSummary,
}

impl ModelConfig {
    /// Reference hyperparameters for a loaded corpus
    pub fn for_loader(loader: LoaderSummary) -> Self {
        Self::from_run(&RunConfig::default(), loader)
    }

    /// Hyperparameters from a run configuration
    pub fn from_run(run: &RunConfig, loader: LoaderSummary) -> Self {
        Self {
            hidden_size: run.hidden_size,
            num_layers: run.num_layers,
            init_scale: run.init_scale,
            keep_prob: run.keep_prob,
            learning_rate: run.learning_rate,
            lr_decay: run.lr_decay,
            max_grad_norm: run.max_grad_norm,
            num_epochs: run.num_epochs,
            save_every: run.save_every,
            loader,
        }
    }

    /// Weight shapes implied by this configuration
    pub fn network_shape(&self) -> NetworkShape {
        NetworkShape {
            vocab_size: self.loader.vocab_size,
            hidden_size: self.hidden_size,
            num_layers: self.num_layers,
            clock_width: self.loader.clock_width,
        }
    }

    /// Learning rate for a zero-based epoch
    pub fn learning_rate_at(&self, epoch: usize) -> f32 {
        self.learning_rate * self.lr_decay.powi(epoch as i32)
    }

    pub fn to_toml(&self) -> Result<String, CheckpointError> {
        Ok(toml::to_string(self)?)
    }

    pub fn from_toml(contents: &str) -> Result<Self, CheckpointError> {
        Ok(toml::from_str(contents)?)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), CheckpointError> {
        fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, CheckpointError> {
        Self::from_toml(&fs::read_to_string(path)?)
    }

    /// Check that `requested` describes the same model as this saved one
    pub fn check_compatible(&self, requested: &ModelConfig) -> Result<(), CheckpointError> {
        fn differ<T: ToString + PartialEq>(
            field: &'static str,
            saved: T,
            requested: T,
        ) -> Result<(), CheckpointError> {
            if saved == requested {
                Ok(())
            } else {
                Err(CheckpointError::Incompatible {
                    field,
                    saved: saved.to_string(),
                    requested: requested.to_string(),
                })
            }
        }

        differ("mode", self.loader.mode, requested.loader.mode)?;
        differ("hidden_size", self.hidden_size, requested.hidden_size)?;
        differ("num_layers", self.num_layers, requested.num_layers)?;
        differ("seq_length", self.loader.seq_length, requested.loader.seq_length)?;
        differ("vocab_size", self.loader.vocab_size, requested.loader.vocab_size)?;
        differ("clock_width", self.loader.clock_width, requested.loader.clock_width)
    }
}
