// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Metrical clock.
//!
//! Quantizes a semiquaver offset into a tick describing where in the bar an
//! event falls. Ticks start at 1; tick 0 is reserved for padding and for the
//! piece divider.

use serde::{Deserialize, Serialize};

use crate::error::CodecError;

/// Semiquavers per bar of 4/4, the longest bar in the chorale corpus
pub const DEFAULT_MAX_BAR_LENGTH: u32 = 16;

/// Tick reserved for padding and piece boundaries
pub const PAD_TICK: u32 = 0;

/// Clock configuration shared by the codec and the model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricClock {
    /// Grid size in semiquavers
    quantization: u32,
    /// Longest bar (in semiquavers) the clock can represent
    max_bar_length: u32,
}

impl MetricClock {
    /// Create a clock for the given grid and maximum bar length
    pub fn new(quantization: u32, max_bar_length: u32) -> Result<Self, CodecError> {
        if quantization == 0 {
            return Err(CodecError::ZeroQuantization);
        }
        Ok(Self {
            quantization,
            max_bar_length,
        })
    }

    /// Get the quantization grid
    pub fn quantization(&self) -> u32 {
        self.quantization
    }

    /// Get the maximum bar length
    pub fn max_bar_length(&self) -> u32 {
        self.max_bar_length
    }

    /// Number of distinct non-padding ticks, i.e. the width of the one-hot
    /// clock input
    pub fn width(&self) -> usize {
        self.max_bar_length.div_ceil(self.quantization) as usize
    }

    /// Check that a bar fits on this clock
    pub fn check_bar(&self, bar_length: u32) -> Result<(), CodecError> {
        if bar_length > self.max_bar_length {
            return Err(CodecError::BarTooLong {
                bar_length,
                max: self.max_bar_length,
            });
        }
        Ok(())
    }

    /// Tick for an offset within a bar of `bar_length` semiquavers
    pub fn tick(&self, offset: i32, bar_length: u32) -> u32 {
        let bar = bar_length.max(1) as i32;
        (offset.rem_euclid(bar) as u32 / self.quantization) + 1
    }

    /// Start tracking positions through a stream of durations
    pub fn tracker(&self, bar_length: u32) -> ClockTracker {
        ClockTracker {
            clock: *self,
            bar_length,
            offset: 0,
        }
    }
}

impl Default for MetricClock {
    fn default() -> Self {
        Self {
            quantization: 1,
            max_bar_length: DEFAULT_MAX_BAR_LENGTH,
        }
    }
}

/// Follows the running offset of a generated stream so ticks can be
/// assigned to events as they are produced
#[derive(Debug, Clone)]
pub struct ClockTracker {
    clock: MetricClock,
    bar_length: u32,
    offset: i32,
}

impl ClockTracker {
    /// Tick for the next event, then advance by its duration.
    ///
    /// A boundary (`None` duration) resets the offset and gets the pad tick.
    pub fn advance(&mut self, duration: Option<i32>) -> u32 {
        match duration {
            None => {
                self.offset = 0;
                PAD_TICK
            }
            Some(d) => {
                let tick = self.clock.tick(self.offset, self.bar_length);
                self.offset += d;
                tick
            }
        }
    }

    /// Current offset in semiquavers
    pub fn offset(&self) -> i32 {
        self.offset
    }
}
