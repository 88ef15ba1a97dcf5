// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Epoch loop: decayed learning rate, per-step updates, per-epoch
//! evaluation and periodic checkpoints.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::RunConfig;
use crate::corpus::DataLoader;
use crate::model::checkpoint::{self, params_file_name, CheckpointState};
use crate::model::{ModelConfig, RnnMode, SequenceModel};

/// Name of the JSON-lines training log inside the log directory
pub const TRAIN_LOG_FILE: &str = "train_log.jsonl";

/// One line of the training log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum LogRecord {
    Train {
        epoch: usize,
        step: usize,
        loss: f32,
        learning_rate: f32,
        seconds: f64,
    },
    Eval {
        epoch: usize,
        step: usize,
        loss: f32,
    },
}

/// What a finished run reports
#[derive(Debug, Clone, PartialEq)]
pub struct TrainReport {
    pub global_step: usize,
    pub epochs_completed: usize,
    pub last_train_loss: Option<f32>,
    /// One entry per epoch run
    pub eval_losses: Vec<f32>,
    pub checkpoint: Option<PathBuf>,
}

struct TrainLog {
    file: File,
}

impl TrainLog {
    fn open(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create log directory: {:?}", dir))?;
        let path = dir.join(TRAIN_LOG_FILE);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open training log: {:?}", path))?;
        Ok(Self { file })
    }

    fn write(&mut self, record: &LogRecord) -> Result<()> {
        let line = serde_json::to_string(record).context("Failed to serialize log record")?;
        writeln!(self.file, "{}", line).context("Failed to write training log")
    }
}

/// Drives a [`SequenceModel`] over the batches of a [`DataLoader`]
pub struct Trainer<'a> {
    run: &'a RunConfig,
    loader: &'a mut DataLoader,
    config: ModelConfig,
    vocab_keys: Vec<String>,
    model: SequenceModel,
    start_epoch: usize,
    global_step: usize,
}

impl<'a> Trainer<'a> {
    /// Build a trainer, resuming from `run.save_dir` when `run.resume` is
    /// set and a checkpoint exists there
    pub fn new(run: &'a RunConfig, loader: &'a mut DataLoader) -> Result<Self> {
        let config = ModelConfig::from_run(run, loader.summary());
        let vocab_keys = loader.vocab().keys();

        let resumed = if run.resume {
            checkpoint::latest(&run.save_dir)?
        } else {
            None
        };

        let (model, start_epoch, global_step) = match resumed {
            Some(ckpt) => {
                ckpt.config.check_compatible(&config)?;
                ckpt.check_vocab(&vocab_keys)?;
                // A periodic save lands mid-epoch, and that epoch restarts
                // from its first batch.
                let epoch = ckpt.state.epoch;
                let step = epoch * loader.scheduler().num_batches();
                info!(
                    saved_step = ckpt.state.global_step,
                    step,
                    epoch,
                    "resuming from checkpoint"
                );
                let model = SequenceModel::from_params(&config, RnnMode::Train, ckpt.params, run.seed)?;
                (model, epoch, step)
            }
            None => {
                if run.resume {
                    warn!(dir = ?run.save_dir, "no checkpoint to resume from, starting fresh");
                }
                (SequenceModel::new(&config, RnnMode::Train, run.seed)?, 0, 0)
            }
        };

        Ok(Self {
            run,
            loader,
            config,
            vocab_keys,
            model,
            start_epoch,
            global_step,
        })
    }

    pub fn model(&self) -> &SequenceModel {
        &self.model
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Save the current weights as of `epoch` completed epochs
    fn save(&self, epoch: usize) -> Result<PathBuf> {
        let state = CheckpointState {
            model_checkpoint_path: params_file_name(self.global_step),
            global_step: self.global_step,
            epoch,
            learning_rate: self.model.learning_rate(),
        };
        let path = checkpoint::save(
            &self.run.save_dir,
            &self.config,
            self.model.params(),
            &self.vocab_keys,
            &state,
        )?;
        Ok(path)
    }

    /// Loss on the held-out batch
    pub fn evaluate(&self) -> Result<f32> {
        let batch = self.loader.test_batch();
        Ok(self
            .model
            .eval_step(&batch.x, &batch.y, batch.clock.as_ref())?)
    }

    /// Run the remaining epochs
    pub fn run(mut self) -> Result<TrainReport> {
        let mut log = TrainLog::open(&self.run.log_dir)?;
        let num_epochs = self.config.num_epochs;
        let num_batches = self.loader.scheduler().num_batches();
        let save_every = self.config.save_every;

        let mut last_train_loss = None;
        let mut eval_losses = Vec::new();

        info!(
            epochs = num_epochs,
            batches = num_batches,
            start_epoch = self.start_epoch,
            "starting training"
        );

        for epoch in self.start_epoch..num_epochs {
            let learning_rate = self.config.learning_rate_at(epoch);
            self.model.assign_lr(learning_rate);
            debug!(epoch, learning_rate, "new learning rate");

            self.loader.scheduler_mut().reset_batch_pointer();
            let mut state = self.model.zero_state();

            for b in 0..num_batches {
                let start = Instant::now();
                let batch = self.loader.scheduler_mut().next()?;
                let (next_state, loss) =
                    self.model
                        .train_step(&batch.x, &batch.y, batch.clock.as_ref(), &state)?;
                state = next_state;
                self.global_step += 1;
                last_train_loss = Some(loss);

                let seconds = start.elapsed().as_secs_f64();
                info!(
                    "{}/{} (epoch {}), train_loss = {:.3}, time/batch = {:.3}",
                    epoch * num_batches + b + 1,
                    num_epochs * num_batches,
                    epoch,
                    loss,
                    seconds
                );
                log.write(&LogRecord::Train {
                    epoch,
                    step: self.global_step,
                    loss,
                    learning_rate,
                    seconds,
                })?;

                if self.global_step % save_every == 0 {
                    self.save(epoch)?;
                }
            }

            let eval_loss = self.evaluate()?;
            info!(epoch, eval_loss, "epoch finished");
            log.write(&LogRecord::Eval {
                epoch,
                step: self.global_step,
                loss: eval_loss,
            })?;
            eval_losses.push(eval_loss);
        }

        let epochs_completed = num_epochs.max(self.start_epoch);
        let checkpoint = Some(self.save(epochs_completed)?);

        Ok(TrainReport {
            global_step: self.global_step,
            epochs_completed,
            last_train_loss,
            eval_losses,
            checkpoint,
        })
    }
}

/// Train with a fresh [`Trainer`]
pub fn train(run: &RunConfig, loader: &mut DataLoader) -> Result<TrainReport> {
    Trainer::new(run, loader)?.run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::loader::MUSIC_INPUT_FILE;
    use crate::corpus::CorpusMode;
    use tempfile::{tempdir, TempDir};

    const CORPUS: &str = r#"{"corpus": {
        "train": [
            {"notes": [[60, 0, 4], [62, 4, 4], [64, 8, 4], [65, 12, 4], [67, 16, 8], [65, 24, 8]], "time_sig_amt": 16},
            {"notes": [[67, 0, 4], [65, 4, 2], [64, 8, 4], [62, 12, 4], [60, 16, 8]], "time_sig_amt": 16}
        ],
        "validate": [
            {"notes": [[60, 0, 4], [62, 4, 4], [64, 8, 8], [62, 16, 4], [60, 20, 4]], "time_sig_amt": 16}
        ]
    }}"#;

    fn setup() -> (TempDir, RunConfig) {
        let dir = tempdir().unwrap();
        let data = dir.path().join("data");
        fs::create_dir_all(&data).unwrap();
        fs::write(data.join(MUSIC_INPUT_FILE), CORPUS).unwrap();
        let run = RunConfig {
            mode: CorpusMode::Music,
            data_dir: data,
            save_dir: dir.path().join("save"),
            log_dir: dir.path().join("logs"),
            batch_size: 2,
            seq_length: 3,
            hidden_size: 24,
            num_layers: 1,
            num_epochs: 2,
            keep_prob: 1.0,
            save_every: 2,
            seed: Some(1),
            ..RunConfig::default()
        };
        (dir, run)
    }

    #[test]
    fn test_training_run_writes_checkpoint_and_log() {
        let (_dir, run) = setup();
        let mut loader = DataLoader::new(run.loader_options().unwrap()).unwrap();
        let num_batches = loader.scheduler().num_batches();
        let report = train(&run, &mut loader).unwrap();

        assert_eq!(report.global_step, 2 * num_batches);
        assert_eq!(report.eval_losses.len(), 2);
        assert!(report.last_train_loss.unwrap().is_finite());

        let ckpt = checkpoint::latest(&run.save_dir).unwrap().unwrap();
        assert_eq!(ckpt.state.global_step, report.global_step);
        assert_eq!(ckpt.state.epoch, 2);
        assert!((ckpt.state.learning_rate - 0.8).abs() < 1e-6);

        let log = fs::read_to_string(run.log_dir.join(TRAIN_LOG_FILE)).unwrap();
        let records: Vec<LogRecord> = log
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(records.len(), 2 * num_batches + 2);
        assert!(matches!(records.last(), Some(LogRecord::Eval { epoch: 1, .. })));
    }

    #[test]
    fn test_resume_continues_step_count() {
        let (_dir, mut run) = setup();
        let mut loader = DataLoader::new(run.loader_options().unwrap()).unwrap();
        let first = train(&run, &mut loader).unwrap();

        run.resume = true;
        run.num_epochs = 3;
        let second = train(&run, &mut loader).unwrap();
        assert_eq!(second.eval_losses.len(), 1);
        assert_eq!(
            second.global_step,
            first.global_step + loader.scheduler().num_batches()
        );
    }

    #[test]
    fn test_resume_from_mid_epoch_save() {
        let (_dir, mut run) = setup();
        run.num_epochs = 1;
        let mut loader = DataLoader::new(run.loader_options().unwrap()).unwrap();
        let num_batches = loader.scheduler().num_batches();
        assert!(num_batches >= 2);
        train(&run, &mut loader).unwrap();

        // Rewrite the pointer as left by a periodic save after the first batch
        let ckpt = checkpoint::latest(&run.save_dir).unwrap().unwrap();
        let state = CheckpointState {
            model_checkpoint_path: params_file_name(1),
            global_step: 1,
            epoch: 0,
            learning_rate: ckpt.state.learning_rate,
        };
        checkpoint::save(&run.save_dir, &ckpt.config, &ckpt.params, &ckpt.vocab_keys, &state).unwrap();

        run.resume = true;
        run.save_every = 100;
        fs::remove_file(run.log_dir.join(TRAIN_LOG_FILE)).unwrap();
        let report = train(&run, &mut loader).unwrap();
        assert_eq!(report.global_step, num_batches);
        assert_eq!(report.eval_losses.len(), 1);

        let log = fs::read_to_string(run.log_dir.join(TRAIN_LOG_FILE)).unwrap();
        let steps: Vec<usize> = log
            .lines()
            .filter_map(|l| match serde_json::from_str(l).unwrap() {
                LogRecord::Train { step, .. } => Some(step),
                LogRecord::Eval { .. } => None,
            })
            .collect();
        assert_eq!(steps, (1..=num_batches).collect::<Vec<_>>());

        let latest = checkpoint::latest(&run.save_dir).unwrap().unwrap();
        assert_eq!(latest.state.model_checkpoint_path, params_file_name(num_batches));
        assert_eq!(report.checkpoint, Some(run.save_dir.join(params_file_name(num_batches))));
    }

    #[test]
    fn test_resume_rejects_incompatible_model() {
        let (_dir, mut run) = setup();
        let mut loader = DataLoader::new(run.loader_options().unwrap()).unwrap();
        train(&run, &mut loader).unwrap();

        run.resume = true;
        run.hidden_size = 32;
        let err = Trainer::new(&run, &mut loader).err().unwrap();
        assert!(err.to_string().contains("hidden_size"));
    }
}
