// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Per-step information measures, in bits.
//!
//! Nothing is clamped: a zero probability on the realised code gives an
//! infinite cross-entropy. Note that `serde_json` writes non-finite values
//! as `null`.

use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};

/// `-log2 dist[code]`
pub fn cross_entropy(dist: ArrayView1<f32>, code: usize) -> f64 {
    -(dist[code] as f64).log2()
}

/// Shannon entropy of `dist`; zero-probability terms contribute nothing
pub fn distribution_entropy(dist: ArrayView1<f32>) -> f64 {
    -dist
        .iter()
        .filter(|&&p| p > 0.0)
        .map(|&p| {
            let p = p as f64;
            p * p.log2()
        })
        .sum::<f64>()
}

/// Both entropy series of a sampled or profiled sequence
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntropyTrace {
    pub cross_entropies: Vec<f64>,
    pub dist_entropies: Vec<f64>,
}

impl EntropyTrace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, cross_entropy: f64, dist_entropy: f64) {
        self.cross_entropies.push(cross_entropy);
        self.dist_entropies.push(dist_entropy);
    }

    /// Score `code` against `dist` and append both measures
    pub fn record(&mut self, dist: ArrayView1<f32>, code: usize) {
        self.push(cross_entropy(dist, code), distribution_entropy(dist));
    }

    pub fn len(&self) -> usize {
        self.cross_entropies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cross_entropies.is_empty()
    }

    /// Mean cross-entropy, `None` for an empty trace
    pub fn mean_cross_entropy(&self) -> Option<f64> {
        mean(&self.cross_entropies)
    }

    /// Mean distribution entropy, `None` for an empty trace
    pub fn mean_dist_entropy(&self) -> Option<f64> {
        mean(&self.dist_entropies)
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr1, Array1};

    #[test]
    fn test_uniform_entropy_is_log2_size() {
        for size in [2usize, 7, 64] {
            let dist = Array1::from_elem(size, 1.0 / size as f32);
            let h = distribution_entropy(dist.view());
            assert!((h - (size as f64).log2()).abs() < 1e-5, "size {}: {}", size, h);
        }
    }

    #[test]
    fn test_degenerate_distribution() {
        let dist = arr1(&[0.0f32, 1.0, 0.0]);
        assert_eq!(distribution_entropy(dist.view()), 0.0);
        assert_eq!(cross_entropy(dist.view(), 1), 0.0);
        assert_eq!(cross_entropy(dist.view(), 0), f64::INFINITY);
    }

    #[test]
    fn test_cross_entropy_half() {
        let dist = arr1(&[0.5f32, 0.25, 0.25]);
        assert!((cross_entropy(dist.view(), 0) - 1.0).abs() < 1e-9);
        assert!((cross_entropy(dist.view(), 2) - 2.0).abs() < 1e-9);
        assert!((distribution_entropy(dist.view()) - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_trace_serialization() {
        let mut trace = EntropyTrace::new();
        trace.push(1.0, 2.0);
        trace.record(arr1(&[0.5f32, 0.5]).view(), 1);
        assert_eq!(trace.len(), 2);
        assert_eq!(trace.mean_cross_entropy(), Some(1.0));
        assert_eq!(trace.mean_dist_entropy(), Some(1.5));

        let json = serde_json::to_string(&trace).unwrap();
        assert_eq!(json, r#"{"cross_entropies":[1.0,1.0],"dist_entropies":[2.0,1.0]}"#);
        assert_eq!(EntropyTrace::new().mean_cross_entropy(), None);
    }
}
