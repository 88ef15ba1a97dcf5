// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! The stateful sequence model.
//!
//! [`SequenceModel`] owns the weights, learning rate and random source.
//! Recurrent state never lives here: every step takes the state to start
//! from and hands back the state it ended in, so callers decide when a
//! sequence starts over.

use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::trace;

use crate::corpus::{Symbol, Vocabulary};
use crate::error::ModelError;
use crate::nn::{CellState, Network, Sgd};
use crate::timing::{ClockTracker, PAD_TICK};

use super::config::ModelConfig;
use super::entropy::{cross_entropy, distribution_entropy, EntropyTrace};
use super::sampling::SamplingMethod;
use super::{ModelDescriptor, RnnMode};

/// Embedding, LSTM stack and softmax, driven in one of three modes
#[derive(Debug, Clone)]
pub struct SequenceModel {
    descriptor: ModelDescriptor,
    params: Network,
    optimizer: Sgd,
    rng: StdRng,
}

fn rng_from(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

impl SequenceModel {
    /// Freshly initialised model
    pub fn new(config: &ModelConfig, mode: RnnMode, seed: Option<u64>) -> Result<Self, ModelError> {
        let descriptor = ModelDescriptor::resolve(config, mode)?;
        let mut rng = rng_from(seed);
        let params = Network::new(descriptor.shape, config.init_scale, &mut rng);
        Ok(Self {
            descriptor,
            params,
            optimizer: Sgd::new(config.learning_rate, config.max_grad_norm),
            rng,
        })
    }

    /// Model around existing weights
    pub fn from_params(
        config: &ModelConfig,
        mode: RnnMode,
        params: Network,
        seed: Option<u64>,
    ) -> Result<Self, ModelError> {
        let descriptor = ModelDescriptor::resolve(config, mode)?;
        let expected = descriptor.shape;
        let actual = params.shape();
        if expected != actual {
            return Err(ModelError::ShapeMismatch {
                what: "parameters (vocab, hidden)",
                expected: (expected.vocab_size, expected.hidden_size),
                actual: (actual.vocab_size, actual.hidden_size),
            });
        }
        Ok(Self {
            descriptor,
            params,
            optimizer: Sgd::new(config.learning_rate, config.max_grad_norm),
            rng: rng_from(seed),
        })
    }

    pub fn descriptor(&self) -> &ModelDescriptor {
        &self.descriptor
    }

    pub fn mode(&self) -> RnnMode {
        self.descriptor.mode
    }

    pub fn params(&self) -> &Network {
        &self.params
    }

    pub fn learning_rate(&self) -> f32 {
        self.optimizer.learning_rate
    }

    /// Override the learning rate used by subsequent training steps
    pub fn assign_lr(&mut self, learning_rate: f32) {
        self.optimizer.learning_rate = learning_rate;
    }

    /// Zero state for this model's batch size
    pub fn zero_state(&self) -> CellState {
        self.params.zero_state(self.descriptor.batch_size)
    }

    fn check_codes(&self, codes: &Array2<u32>) -> Result<(), ModelError> {
        let vocab_size = self.descriptor.shape.vocab_size;
        match codes.iter().find(|&&c| c as usize >= vocab_size) {
            Some(&code) => Err(ModelError::CodeOutOfRange {
                code: code as usize,
                vocab_size,
            }),
            None => Ok(()),
        }
    }

    fn check_ticks(&self, ticks: &Array2<u32>) -> Result<(), ModelError> {
        let width = self.descriptor.shape.clock_width;
        match ticks.iter().find(|&&t| t as usize > width) {
            Some(&tick) => Err(ModelError::TickOutOfRange {
                tick: tick as usize,
                width,
            }),
            None => Ok(()),
        }
    }

    /// Validate a batch against an expected shape
    fn check_batch(
        &self,
        expected: (usize, usize),
        x: &Array2<u32>,
        y: &Array2<u32>,
        c: Option<&Array2<u32>>,
    ) -> Result<(), ModelError> {
        let check = |what, actual: (usize, usize)| {
            if actual == expected {
                Ok(())
            } else {
                Err(ModelError::ShapeMismatch {
                    what,
                    expected,
                    actual,
                })
            }
        };
        check("X", x.dim())?;
        check("Y", y.dim())?;
        self.check_codes(x)?;
        self.check_codes(y)?;
        match c {
            Some(c) => {
                check("C", c.dim())?;
                self.check_ticks(c)
            }
            None if self.params.is_clocked() => Err(ModelError::ShapeMismatch {
                what: "C",
                expected,
                actual: (0, 0),
            }),
            None => Ok(()),
        }
    }

    fn check_state(&self, state: &CellState, batch: usize) -> Result<(), ModelError> {
        let hidden = self.descriptor.shape.hidden_size;
        let layers = self.descriptor.shape.num_layers;
        if state.0.len() != layers {
            return Err(ModelError::ShapeMismatch {
                what: "state (layers, hidden)",
                expected: (layers, hidden),
                actual: (state.0.len(), hidden),
            });
        }
        match state
            .0
            .iter()
            .find(|l| l.h.dim() != (batch, hidden) || l.c.dim() != (batch, hidden))
        {
            Some(bad) => Err(ModelError::ShapeMismatch {
                what: "state",
                expected: (batch, hidden),
                actual: bad.h.dim(),
            }),
            None => Ok(()),
        }
    }

    /// One truncated-BPTT update from `state`.
    ///
    /// Returns the state after the window and the mean cross-entropy
    /// (natural log) over every position in the batch.
    pub fn train_step(
        &mut self,
        x: &Array2<u32>,
        y: &Array2<u32>,
        c: Option<&Array2<u32>>,
        state: &CellState,
    ) -> Result<(CellState, f32), ModelError> {
        if self.descriptor.mode != RnnMode::Train {
            return Err(ModelError::NotTraining(self.descriptor.mode));
        }
        let expected = (self.descriptor.batch_size, self.descriptor.seq_length);
        self.check_batch(expected, x, y, c)?;
        self.check_state(state, expected.0)?;

        let dropout = if self.descriptor.uses_dropout() {
            Some((self.descriptor.keep_prob, &mut self.rng))
        } else {
            None
        };
        let pass = self.params.forward(x, c, state, dropout);
        let loss = Network::loss(&pass, y);
        let grads = self.params.backward(&pass, y);
        let norm = self.optimizer.apply(&mut self.params, grads);
        trace!(loss, grad_norm = norm, "train step");

        Ok((pass.final_state, loss))
    }

    /// Loss over a batch from zero state, without dropout or updates.
    ///
    /// Any number of rows is accepted, so the whole held-out batch can be
    /// scored at once.
    pub fn eval_step(
        &self,
        x: &Array2<u32>,
        y: &Array2<u32>,
        c: Option<&Array2<u32>>,
    ) -> Result<f32, ModelError> {
        let expected = (x.nrows(), self.descriptor.seq_length);
        self.check_batch(expected, x, y, c)?;
        let pass = self
            .params
            .forward::<StdRng>(x, c, &self.params.zero_state(x.nrows()), None);
        Ok(Network::loss(&pass, y))
    }

    /// Feed one symbol and return the distribution over the next one.
    ///
    /// A missing state means a fresh single-stream sequence.
    pub fn clocked_dist_iter(
        &self,
        code: usize,
        tick: u32,
        state: Option<&CellState>,
    ) -> Result<(CellState, Array1<f32>), ModelError> {
        let x = Array2::from_elem((1, 1), code as u32);
        let c = Array2::from_elem((1, 1), tick);
        self.check_codes(&x)?;
        let ticks = if self.params.is_clocked() {
            self.check_ticks(&c)?;
            Some(&c)
        } else {
            None
        };

        let zero;
        let state = match state {
            Some(state) => {
                self.check_state(state, 1)?;
                state
            }
            None => {
                zero = self.params.zero_state(1);
                &zero
            }
        };

        let pass = self.params.forward::<StdRng>(&x, ticks, state, None);
        let dist = pass.probs[0].row(0).to_owned();
        Ok((pass.final_state, dist))
    }

    /// Feed one symbol, draw the next one by weighted selection and score
    /// the draw.
    ///
    /// Returns the new state, the cross-entropy of the drawn code, the
    /// entropy of the distribution and the drawn code.
    pub fn clocked_sample_iter(
        &mut self,
        code: usize,
        tick: u32,
        state: Option<&CellState>,
    ) -> Result<(CellState, f64, f64, usize), ModelError> {
        let (state, dist) = self.clocked_dist_iter(code, tick, state)?;
        let sampled = SamplingMethod::Weighted.pick(dist.view(), false, &mut self.rng);
        Ok((
            state,
            cross_entropy(dist.view(), sampled),
            distribution_entropy(dist.view()),
            sampled,
        ))
    }

    /// Generate `count` symbols after priming with `prime`.
    ///
    /// Every prime symbol but the last only advances the state; the last
    /// one is the first input of the generation loop. The result starts
    /// with the prime. When `clock` is given, ticks follow the running
    /// offset of the stream, otherwise every tick is the pad tick.
    pub fn sample<S: Symbol>(
        &mut self,
        vocab: &Vocabulary<S>,
        count: usize,
        prime: &[S],
        method: SamplingMethod,
        mut clock: Option<&mut ClockTracker>,
    ) -> Result<(Vec<S>, EntropyTrace), ModelError> {
        let (last, warmup) = prime.split_last().ok_or(ModelError::EmptyPrime)?;
        let mut next_tick = |symbol: &S| match clock.as_mut() {
            Some(tracker) => tracker.advance(symbol.duration()),
            None => PAD_TICK,
        };

        let mut state = None;
        for symbol in warmup {
            let code = vocab.encode_event(symbol)?;
            let (next, _) = self.clocked_dist_iter(code, next_tick(symbol), state.as_ref())?;
            state = Some(next);
        }

        let mut output = prime.to_vec();
        let mut trace = EntropyTrace::new();
        let mut current = last.clone();
        for _ in 0..count {
            let code = vocab.encode_event(&current)?;
            let (next, dist) = self.clocked_dist_iter(code, next_tick(&current), state.as_ref())?;
            state = Some(next);

            let picked = method.pick(dist.view(), current.is_word_boundary(), &mut self.rng);
            trace.record(dist.view(), picked);
            current = vocab.decode_code(picked)?.clone();
            output.push(current.clone());
        }

        Ok((output, trace))
    }
}
