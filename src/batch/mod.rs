// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Batching for truncated BPTT.

pub mod scheduler;

pub use scheduler::{prepare_eval, shift_with_wraparound, Batch, BatchScheduler};
