// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Numeric core: LSTM layers, the full network and the optimizer.

pub mod layers;
pub mod lstm;
pub mod network;
pub mod optimizer;

pub use lstm::{LayerState, LstmLayer, FORGET_BIAS};
pub use network::{CellState, ForwardPass, Network, NetworkShape};
pub use optimizer::{clip_by_global_norm, Sgd};
