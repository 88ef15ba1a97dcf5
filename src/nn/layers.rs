// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Small stateless building blocks: lookups, softmax and dropout.

use ndarray::{Array2, ArrayView1, ArrayView2, Axis};
use rand::Rng;

/// Rows of `table` selected by `codes`
pub fn embedding_lookup(table: &Array2<f32>, codes: ArrayView1<u32>) -> Array2<f32> {
    let indices: Vec<usize> = codes.iter().map(|&c| c as usize).collect();
    table.select(Axis(0), &indices)
}

/// Accumulate gradient rows back into the rows they were looked up from
pub fn embedding_backward(grad: &mut Array2<f32>, codes: ArrayView1<u32>, d_rows: ArrayView2<f32>) {
    for (k, &code) in codes.iter().enumerate() {
        grad.row_mut(code as usize).scaled_add(1.0, &d_rows.row(k));
    }
}

/// Fixed clock input table: row 0 (padding) is all zeros, row `k` is
/// one-hot at column `k - 1`
pub fn clock_table(width: usize) -> Array2<f32> {
    let mut table = Array2::zeros((width + 1, width));
    for k in 1..=width {
        table[[k, k - 1]] = 1.0;
    }
    table
}

/// Row-wise softmax
pub fn softmax_rows(logits: &Array2<f32>) -> Array2<f32> {
    let mut probs = logits.clone();
    for mut row in probs.rows_mut() {
        let max = row.fold(f32::NEG_INFINITY, |m, &v| m.max(v));
        row.mapv_inplace(|v| (v - max).exp());
        let sum = row.sum();
        row.mapv_inplace(|v| v / sum);
    }
    probs
}

/// Inverted dropout mask: each entry is `0` with probability
/// `1 - keep_prob`, otherwise `1 / keep_prob`
pub fn dropout_mask<R: Rng>(shape: (usize, usize), keep_prob: f32, rng: &mut R) -> Array2<f32> {
    let scale = 1.0 / keep_prob;
    Array2::from_shape_fn(shape, |_| {
        if rng.gen::<f32>() < keep_prob {
            scale
        } else {
            0.0
        }
    })
}
