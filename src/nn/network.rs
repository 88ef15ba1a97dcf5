// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Embedding, LSTM stack and softmax projection as one differentiable
//! network.
//!
//! The forward pass keeps everything the backward pass needs in a
//! [`ForwardPass`]; nothing here owns recurrent state between calls.

use ndarray::{s, Array1, Array2, Axis, Dimension};
use rand::Rng;
use rand_distr::{Distribution, Uniform};
use serde::{Deserialize, Serialize};

use super::layers::{clock_table, dropout_mask, embedding_backward, embedding_lookup, softmax_rows};
use super::lstm::{LayerState, LstmLayer, StepCache};

/// Sizes that determine every weight shape
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkShape {
    pub vocab_size: usize,
    pub hidden_size: usize,
    pub num_layers: usize,
    /// Zero disables clock conditioning
    pub clock_width: usize,
}

impl NetworkShape {
    /// Width of the learned event embedding
    pub fn embed_size(&self) -> usize {
        self.hidden_size - self.clock_width
    }
}

/// Recurrent state of the whole stack, one entry per layer
#[derive(Debug, Clone, PartialEq)]
pub struct CellState(pub Vec<LayerState>);

impl CellState {
    /// Number of parallel streams
    pub fn batch_size(&self) -> usize {
        self.0.first().map(|l| l.h.nrows()).unwrap_or(0)
    }
}

/// Everything a forward pass produced
#[derive(Debug, Clone)]
pub struct ForwardPass {
    /// Softmax output per step, `[batch, vocab]`
    pub probs: Vec<Array2<f32>>,
    /// State after the last step
    pub final_state: CellState,
    codes: Array2<u32>,
    caches: Vec<Vec<StepCache>>,
    masks: Option<Vec<Vec<Array2<f32>>>>,
    tops: Vec<Array2<f32>>,
}

/// Network weights
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Network {
    /// `[vocab, hidden - clock_width]`
    pub embedding: Array2<f32>,
    /// Fixed clock one-hot table, never updated
    pub clock_table: Array2<f32>,
    pub layers: Vec<LstmLayer>,
    /// `[hidden, vocab]`
    pub softmax_w: Array2<f32>,
    pub softmax_b: Array1<f32>,
}

fn sum_squares<D: Dimension>(a: &ndarray::Array<f32, D>) -> f32 {
    a.iter().map(|v| v * v).sum()
}

impl Network {
    /// Randomly initialised network
    pub fn new<R: Rng>(shape: NetworkShape, init_scale: f32, rng: &mut R) -> Self {
        let dist = Uniform::new_inclusive(-init_scale, init_scale);
        let embedding =
            Array2::from_shape_fn((shape.vocab_size, shape.embed_size()), |_| dist.sample(rng));
        let layers = (0..shape.num_layers)
            .map(|_| LstmLayer::new(shape.hidden_size, shape.hidden_size, init_scale, rng))
            .collect();
        let softmax_w =
            Array2::from_shape_fn((shape.hidden_size, shape.vocab_size), |_| dist.sample(rng));

        Self {
            embedding,
            clock_table: clock_table(shape.clock_width),
            layers,
            softmax_w,
            softmax_b: Array1::zeros(shape.vocab_size),
        }
    }

    /// Shape of this network
    pub fn shape(&self) -> NetworkShape {
        NetworkShape {
            vocab_size: self.embedding.nrows(),
            hidden_size: self.softmax_w.nrows(),
            num_layers: self.layers.len(),
            clock_width: self.clock_table.ncols(),
        }
    }

    /// Whether the input is conditioned on the clock
    pub fn is_clocked(&self) -> bool {
        self.clock_table.ncols() > 0
    }

    /// Same shape, trainable weights all zero (gradient accumulator)
    pub fn zeros_like(&self) -> Self {
        Self {
            embedding: Array2::zeros(self.embedding.raw_dim()),
            clock_table: self.clock_table.clone(),
            layers: self.layers.iter().map(LstmLayer::zeros_like).collect(),
            softmax_w: Array2::zeros(self.softmax_w.raw_dim()),
            softmax_b: Array1::zeros(self.softmax_b.raw_dim()),
        }
    }

    /// Zero recurrent state for `batch` streams
    pub fn zero_state(&self, batch: usize) -> CellState {
        let hidden = self.softmax_w.nrows();
        CellState(
            self.layers
                .iter()
                .map(|_| LayerState::zeros(batch, hidden))
                .collect(),
        )
    }

    /// Sum of squares over all trainable weights
    pub fn sum_squares(&self) -> f32 {
        let mut total = sum_squares(&self.embedding)
            + sum_squares(&self.softmax_w)
            + sum_squares(&self.softmax_b);
        for layer in &self.layers {
            total += sum_squares(&layer.w) + sum_squares(&layer.b);
        }
        total
    }

    /// Multiply all trainable weights by `factor`
    pub fn scale(&mut self, factor: f32) {
        self.embedding *= factor;
        self.softmax_w *= factor;
        self.softmax_b *= factor;
        for layer in &mut self.layers {
            layer.w *= factor;
            layer.b *= factor;
        }
    }

    /// `self += alpha * other` over the trainable weights
    pub fn scaled_add(&mut self, alpha: f32, other: &Network) {
        self.embedding.scaled_add(alpha, &other.embedding);
        self.softmax_w.scaled_add(alpha, &other.softmax_w);
        self.softmax_b.scaled_add(alpha, &other.softmax_b);
        for (layer, g) in self.layers.iter_mut().zip(&other.layers) {
            layer.w.scaled_add(alpha, &g.w);
            layer.b.scaled_add(alpha, &g.b);
        }
    }

    /// Build the `[batch, hidden]` input for one step
    fn embed(&self, codes: ndarray::ArrayView1<u32>, ticks: Option<ndarray::ArrayView1<u32>>) -> Array2<f32> {
        let events = embedding_lookup(&self.embedding, codes);
        match ticks {
            Some(ticks) if self.is_clocked() => {
                let clock = embedding_lookup(&self.clock_table, ticks);
                let mut input = Array2::zeros((codes.len(), self.softmax_w.nrows()));
                input.slice_mut(s![.., ..events.ncols()]).assign(&events);
                input.slice_mut(s![.., events.ncols()..]).assign(&clock);
                input
            }
            _ => events,
        }
    }

    /// Run `codes` (`[batch, steps]`) through the network starting from
    /// `state`. With `dropout = Some((keep_prob, rng))` every layer output
    /// is masked.
    ///
    /// Callers check that codes, ticks and state agree in shape.
    pub fn forward<R: Rng>(
        &self,
        codes: &Array2<u32>,
        ticks: Option<&Array2<u32>>,
        state: &CellState,
        mut dropout: Option<(f32, &mut R)>,
    ) -> ForwardPass {
        let (batch, steps) = codes.dim();
        let num_layers = self.layers.len();

        let mut layer_states = state.0.clone();
        let mut caches: Vec<Vec<StepCache>> = vec![Vec::with_capacity(steps); num_layers];
        let mut masks: Option<Vec<Vec<Array2<f32>>>> =
            dropout.as_ref().map(|_| vec![Vec::with_capacity(steps); num_layers]);
        let mut tops = Vec::with_capacity(steps);
        let mut probs = Vec::with_capacity(steps);

        for t in 0..steps {
            let mut x = self.embed(
                codes.column(t),
                ticks.map(|ticks| ticks.column(t)),
            );

            for (l, layer) in self.layers.iter().enumerate() {
                let (next, cache) = layer.step(x.view(), &layer_states[l]);
                caches[l].push(cache);
                x = next.h.clone();
                layer_states[l] = next;

                if let (Some((keep_prob, rng)), Some(masks)) = (dropout.as_mut(), masks.as_mut()) {
                    let mask = dropout_mask((batch, x.ncols()), *keep_prob, &mut **rng);
                    x *= &mask;
                    masks[l].push(mask);
                }
            }

            let logits = x.dot(&self.softmax_w) + &self.softmax_b;
            probs.push(softmax_rows(&logits));
            tops.push(x);
        }

        ForwardPass {
            probs,
            final_state: CellState(layer_states),
            codes: codes.clone(),
            caches,
            masks,
            tops,
        }
    }

    /// Mean negative log-likelihood (natural log) of `targets` under a
    /// forward pass
    pub fn loss(pass: &ForwardPass, targets: &Array2<u32>) -> f32 {
        let (batch, steps) = targets.dim();
        let mut total = 0.0f64;
        for (t, probs) in pass.probs.iter().enumerate() {
            for (r, &target) in targets.column(t).iter().enumerate() {
                total -= (probs[[r, target as usize]] as f64).ln();
            }
        }
        (total / (batch * steps) as f64) as f32
    }

    /// Gradients of [`Network::loss`] with respect to every trainable
    /// weight
    pub fn backward(&self, pass: &ForwardPass, targets: &Array2<u32>) -> Network {
        let (batch, steps) = targets.dim();
        let norm = 1.0 / (batch * steps) as f32;
        let mut grad = self.zeros_like();
        let num_layers = self.layers.len();

        // Gradient flowing into each step's top-layer output
        let mut d_out: Vec<Array2<f32>> = Vec::with_capacity(steps);
        for t in 0..steps {
            let mut d_logits = pass.probs[t].clone();
            for (r, &target) in targets.column(t).iter().enumerate() {
                d_logits[[r, target as usize]] -= 1.0;
            }
            d_logits *= norm;

            grad.softmax_w += &pass.tops[t].t().dot(&d_logits);
            grad.softmax_b += &d_logits.sum_axis(Axis(0));
            d_out.push(d_logits.dot(&self.softmax_w.t()));
        }

        for l in (0..num_layers).rev() {
            if let Some(masks) = &pass.masks {
                for (d, mask) in d_out.iter_mut().zip(&masks[l]) {
                    *d *= mask;
                }
            }
            let (layer_grad, d_inputs) = self.layers[l].backward(&pass.caches[l], &d_out);
            grad.layers[l] = layer_grad;
            d_out = d_inputs;
        }

        let embed_size = self.embedding.ncols();
        for (t, d_input) in d_out.iter().enumerate() {
            embedding_backward(
                &mut grad.embedding,
                pass.codes.column(t),
                d_input.slice(s![.., ..embed_size]),
            );
        }

        grad
    }
}
