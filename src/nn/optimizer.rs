// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Plain gradient descent with global norm clipping.

use super::network::Network;

/// Rescale `grads` so their global L2 norm is at most `max_norm`.
/// Returns the norm before clipping.
pub fn clip_by_global_norm(grads: &mut Network, max_norm: f32) -> f32 {
    let norm = grads.sum_squares().sqrt();
    if norm > max_norm && norm > 0.0 {
        grads.scale(max_norm / norm);
    }
    norm
}

/// Stochastic gradient descent
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sgd {
    pub learning_rate: f32,
    pub max_grad_norm: f32,
}

impl Sgd {
    pub fn new(learning_rate: f32, max_grad_norm: f32) -> Self {
        Self {
            learning_rate,
            max_grad_norm,
        }
    }

    /// Clip and apply one update. Returns the unclipped gradient norm.
    pub fn apply(&self, params: &mut Network, mut grads: Network) -> f32 {
        let norm = clip_by_global_norm(&mut grads, self.max_grad_norm);
        params.scaled_add(-self.learning_rate, &grads);
        norm
    }
}
