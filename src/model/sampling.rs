// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Picking the next symbol from a predicted distribution.

use std::fmt;

use ndarray::ArrayView1;
use rand::Rng;

use crate::error::ModelError;

/// How `sample` chooses each generated symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplingMethod {
    /// Draw from the distribution
    Weighted,
    /// Always take the most likely symbol
    Argmax,
    /// Draw after a word boundary, argmax elsewhere
    WordBoundary,
}

impl SamplingMethod {
    /// Decode the numeric method code used on the command line
    pub fn from_code(code: u8) -> Result<Self, ModelError> {
        match code {
            0 => Ok(SamplingMethod::Weighted),
            1 => Ok(SamplingMethod::Argmax),
            2 => Ok(SamplingMethod::WordBoundary),
            other => Err(ModelError::UnsupportedSampling(other)),
        }
    }

    pub fn code(self) -> u8 {
        match self {
            SamplingMethod::Weighted => 0,
            SamplingMethod::Argmax => 1,
            SamplingMethod::WordBoundary => 2,
        }
    }

    /// Choose a code given the distribution and whether the symbol just
    /// fed in was a word boundary
    pub fn pick<R: Rng>(self, dist: ArrayView1<f32>, after_boundary: bool, rng: &mut R) -> usize {
        match self {
            SamplingMethod::Weighted => weighted_pick(dist, rng),
            SamplingMethod::Argmax => argmax(dist),
            SamplingMethod::WordBoundary if after_boundary => weighted_pick(dist, rng),
            SamplingMethod::WordBoundary => argmax(dist),
        }
    }
}

impl fmt::Display for SamplingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SamplingMethod::Weighted => write!(f, "weighted"),
            SamplingMethod::Argmax => write!(f, "argmax"),
            SamplingMethod::WordBoundary => write!(f, "word-boundary"),
        }
    }
}

/// Inverse-CDF draw. The uniform variate is scaled by the total weight, so
/// the weights need not sum to exactly one.
pub fn weighted_pick<R: Rng>(weights: ArrayView1<f32>, rng: &mut R) -> usize {
    let total: f64 = weights.iter().map(|&w| w as f64).sum();
    let target = rng.gen::<f64>() * total;

    let mut cumulative = 0.0;
    for (i, &w) in weights.iter().enumerate() {
        cumulative += w as f64;
        if cumulative > target {
            return i;
        }
    }
    // Rounding can leave target at the very top of the range
    weights
        .iter()
        .rposition(|&w| w > 0.0)
        .unwrap_or(weights.len().saturating_sub(1))
}

/// Index of the largest weight; the first one wins ties
pub fn argmax(weights: ArrayView1<f32>) -> usize {
    let mut best = 0;
    for (i, &w) in weights.iter().enumerate() {
        if w > weights[best] {
            best = i;
        }
    }
    best
}
