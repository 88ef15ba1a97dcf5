// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Event-level LSTM for chorale melodies and plain text.
//!
//! Notes are encoded into an event stream with a parallel metrical clock,
//! ranked into a vocabulary, cut into truncated-BPTT batches and fed to a
//! clock-conditioned LSTM that can be trained, evaluated, sampled and
//! profiled.

pub mod batch;
pub mod config;
pub mod corpus;
pub mod error;
pub mod model;
pub mod music;
pub mod nn;
pub mod timing;
pub mod training;

pub use error::{Error, Result};
