// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! LSTM layer with a forward cache and backpropagation through time.
//!
//! Gate layout follows the classic basic LSTM cell: the pre-activation is
//! split into input gate, candidate, forget gate and output gate, in that
//! order, and the forget gate gets a constant bias of 1.

use ndarray::{s, Array1, Array2, ArrayView2, Axis};
use rand::Rng;
use rand_distr::{Distribution, Uniform};
use serde::{Deserialize, Serialize};

/// Added to the forget gate pre-activation so fresh cells remember
pub const FORGET_BIAS: f32 = 1.0;

fn sigmoid(v: f32) -> f32 {
    1.0 / (1.0 + (-v).exp())
}

/// Cell and hidden state of one layer, one row per stream
#[derive(Debug, Clone, PartialEq)]
pub struct LayerState {
    pub c: Array2<f32>,
    pub h: Array2<f32>,
}

impl LayerState {
    /// Zero state for `batch` streams
    pub fn zeros(batch: usize, hidden: usize) -> Self {
        Self {
            c: Array2::zeros((batch, hidden)),
            h: Array2::zeros((batch, hidden)),
        }
    }
}

/// Activations from one time step, kept for the backward pass
#[derive(Debug, Clone)]
pub struct StepCache {
    concat: Array2<f32>,
    i: Array2<f32>,
    g: Array2<f32>,
    f: Array2<f32>,
    o: Array2<f32>,
    c_prev: Array2<f32>,
    tanh_c: Array2<f32>,
}

/// Weights of one LSTM layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LstmLayer {
    /// `[input + hidden, 4 * hidden]`
    pub w: Array2<f32>,
    /// `[4 * hidden]`
    pub b: Array1<f32>,
}

impl LstmLayer {
    /// Uniformly initialised layer
    pub fn new<R: Rng>(input_size: usize, hidden_size: usize, init_scale: f32, rng: &mut R) -> Self {
        let dist = Uniform::new_inclusive(-init_scale, init_scale);
        Self {
            w: Array2::from_shape_fn((input_size + hidden_size, 4 * hidden_size), |_| {
                dist.sample(rng)
            }),
            b: Array1::zeros(4 * hidden_size),
        }
    }

    /// Same shape, all zeros (gradient accumulator)
    pub fn zeros_like(&self) -> Self {
        Self {
            w: Array2::zeros(self.w.raw_dim()),
            b: Array1::zeros(self.b.raw_dim()),
        }
    }

    /// Width of the hidden state
    pub fn hidden_size(&self) -> usize {
        self.b.len() / 4
    }

    /// Width of the layer input
    pub fn input_size(&self) -> usize {
        self.w.nrows() - self.hidden_size()
    }

    /// Advance one time step
    pub fn step(&self, x: ArrayView2<f32>, state: &LayerState) -> (LayerState, StepCache) {
        let hidden = self.hidden_size();
        let input = self.input_size();

        let mut concat = Array2::zeros((x.nrows(), input + hidden));
        concat.slice_mut(s![.., ..input]).assign(&x);
        concat.slice_mut(s![.., input..]).assign(&state.h);

        let z = concat.dot(&self.w) + &self.b;
        let i = z.slice(s![.., 0..hidden]).mapv(sigmoid);
        let g = z.slice(s![.., hidden..2 * hidden]).mapv(f32::tanh);
        let f = z
            .slice(s![.., 2 * hidden..3 * hidden])
            .mapv(|v| sigmoid(v + FORGET_BIAS));
        let o = z.slice(s![.., 3 * hidden..]).mapv(sigmoid);

        let c = &f * &state.c + &i * &g;
        let tanh_c = c.mapv(f32::tanh);
        let h = &o * &tanh_c;

        let cache = StepCache {
            concat,
            i,
            g,
            f,
            o,
            c_prev: state.c.clone(),
            tanh_c,
        };
        (LayerState { c, h }, cache)
    }

    /// Backpropagate through a whole unrolled window.
    ///
    /// `d_h[t]` is the loss gradient with respect to this layer's output at
    /// step `t`. Returns the weight gradients and the gradient with respect
    /// to each step's input. Gradient into the initial state is dropped,
    /// which is what truncates the backpropagation.
    pub fn backward(&self, caches: &[StepCache], d_h: &[Array2<f32>]) -> (Self, Vec<Array2<f32>>) {
        let hidden = self.hidden_size();
        let input = self.input_size();
        let mut grad = self.zeros_like();
        let mut d_inputs = vec![Array2::zeros((0, 0)); caches.len()];

        let Some(first) = caches.first() else {
            return (grad, d_inputs);
        };
        let batch = first.concat.nrows();
        let mut dh_next = Array2::<f32>::zeros((batch, hidden));
        let mut dc_next = Array2::<f32>::zeros((batch, hidden));

        for t in (0..caches.len()).rev() {
            let cache = &caches[t];
            let dh = &d_h[t] + &dh_next;

            let d_o = &dh * &cache.tanh_c;
            let dc = &dc_next + &(&dh * &cache.o * &cache.tanh_c.mapv(|v| 1.0 - v * v));
            let d_i = &dc * &cache.g;
            let d_g = &dc * &cache.i;
            let d_f = &dc * &cache.c_prev;
            dc_next = &dc * &cache.f;

            let mut dz = Array2::<f32>::zeros((batch, 4 * hidden));
            dz.slice_mut(s![.., 0..hidden])
                .assign(&(&d_i * &cache.i.mapv(|v| v * (1.0 - v))));
            dz.slice_mut(s![.., hidden..2 * hidden])
                .assign(&(&d_g * &cache.g.mapv(|v| 1.0 - v * v)));
            dz.slice_mut(s![.., 2 * hidden..3 * hidden])
                .assign(&(&d_f * &cache.f.mapv(|v| v * (1.0 - v))));
            dz.slice_mut(s![.., 3 * hidden..])
                .assign(&(&d_o * &cache.o.mapv(|v| v * (1.0 - v))));

            grad.w += &cache.concat.t().dot(&dz);
            grad.b += &dz.sum_axis(Axis(0));

            let d_concat = dz.dot(&self.w.t());
            d_inputs[t] = d_concat.slice(s![.., ..input]).to_owned();
            dh_next = d_concat.slice(s![.., input..]).to_owned();
        }

        (grad, d_inputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn layer() -> LstmLayer {
        let mut rng = StdRng::seed_from_u64(7);
        LstmLayer::new(3, 4, 0.5, &mut rng)
    }

    #[test]
    fn test_shapes() {
        let layer = layer();
        assert_eq!(layer.input_size(), 3);
        assert_eq!(layer.hidden_size(), 4);
        assert_eq!(layer.w.dim(), (7, 16));

        let x = Array2::from_elem((2, 3), 0.5);
        let (state, _) = layer.step(x.view(), &LayerState::zeros(2, 4));
        assert_eq!(state.h.dim(), (2, 4));
        assert_eq!(state.c.dim(), (2, 4));
        assert!(state.h.iter().all(|v| v.abs() < 1.0));
    }

    #[test]
    fn test_zero_weights_give_forget_bias_behaviour() {
        let mut layer = layer();
        layer.w.fill(0.0);
        let state = LayerState {
            c: Array2::from_elem((1, 4), 2.0),
            h: Array2::zeros((1, 4)),
        };
        let (next, _) = layer.step(Array2::zeros((1, 3)).view(), &state);
        // i = 0.5, g = 0, f = sigmoid(1)
        let expected = 2.0 * sigmoid(1.0);
        assert!(next.c.iter().all(|&c| (c - expected).abs() < 1e-6));
    }

    // Finite-difference check on a scalar loss: sum of all outputs
    #[test]
    fn test_gradient_matches_finite_difference() {
        let layer = layer();
        let inputs: Vec<Array2<f32>> = (0..3)
            .map(|t| Array2::from_shape_fn((2, 3), |(r, c)| 0.1 * (t + r + c) as f32 - 0.2))
            .collect();

        let run = |layer: &LstmLayer| -> (f32, Vec<StepCache>) {
            let mut state = LayerState::zeros(2, 4);
            let mut caches = Vec::new();
            let mut total = 0.0;
            for x in &inputs {
                let (next, cache) = layer.step(x.view(), &state);
                total += next.h.sum();
                caches.push(cache);
                state = next;
            }
            (total, caches)
        };

        let (_, caches) = run(&layer);
        let d_h = vec![Array2::ones((2, 4)); 3];
        let (grad, d_inputs) = layer.backward(&caches, &d_h);
        assert_eq!(d_inputs.len(), 3);
        assert_eq!(d_inputs[0].dim(), (2, 3));

        let eps = 1e-2;
        for &(r, c) in &[(0, 0), (2, 5), (4, 10), (6, 15)] {
            let mut plus = layer.clone();
            plus.w[[r, c]] += eps;
            let mut minus = layer.clone();
            minus.w[[r, c]] -= eps;
            let numeric = (run(&plus).0 - run(&minus).0) / (2.0 * eps);
            assert!(
                (numeric - grad.w[[r, c]]).abs() < 1e-2,
                "w[{}, {}]: numeric {} vs analytic {}",
                r,
                c,
                numeric,
                grad.w[[r, c]]
            );
        }
    }
}
