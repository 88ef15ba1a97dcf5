// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Timing module.
//!
//! This module provides the metrical clock used to condition the model on
//! position within the bar.

pub mod clock;

pub use clock::{ClockTracker, MetricClock, DEFAULT_MAX_BAR_LENGTH, PAD_TICK};
