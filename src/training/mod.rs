// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Running a model: training loop, generation and profiling.

pub mod generate;
pub mod output;
pub mod profile;
pub mod trainer;

pub use generate::{parse_event_prime, sample_music, sample_text};
pub use output::GeneratedOutput;
pub use profile::{evaluate_stepwise, pathological_notes, profile_events, PATHOLOGICAL_BAR_LENGTH};
pub use trainer::{train, LogRecord, TrainReport, Trainer, TRAIN_LOG_FILE};
