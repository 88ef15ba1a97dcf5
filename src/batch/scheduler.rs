// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Batch scheduler for truncated backpropagation through time.
//!
//! The flat code tensor is clipped to a whole number of batches, laid out as
//! `batch_size` contiguous streams, and cut into `seq_length`-wide windows.
//! Batch `i + 1` continues each stream exactly where batch `i` stopped, so
//! the recurrent state from one batch is the right initial state for the
//! next.

use ndarray::{s, Array2};
use tracing::debug;

use crate::error::BatchError;

/// Input, target and optional clock windows of one batch
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub x: Array2<u32>,
    pub y: Array2<u32>,
    pub clock: Option<Array2<u32>>,
}

impl Batch {
    /// Shape shared by every array in the batch
    pub fn shape(&self) -> (usize, usize) {
        self.x.dim()
    }
}

/// Targets for next-step prediction: `y[i] = x[i + 1]`, and the final
/// target wraps round to the very first input.
///
/// The wrapped target is a spurious training pair; it is kept so that every
/// position has a target.
pub fn shift_with_wraparound(x: &[u32]) -> Vec<u32> {
    let mut y = Vec::with_capacity(x.len());
    if let Some((first, rest)) = x.split_first() {
        y.extend_from_slice(rest);
        y.push(*first);
    }
    y
}

fn rows(data: Vec<u32>, num_rows: usize) -> Array2<u32> {
    let cols = data.len() / num_rows;
    // Length is always an exact multiple of num_rows here
    Array2::from_shape_vec((num_rows, cols), data)
        .unwrap_or_else(|_| Array2::zeros((num_rows, cols)))
}

fn split_columns(matrix: &Array2<u32>, num_batches: usize, seq_length: usize) -> Vec<Array2<u32>> {
    (0..num_batches)
        .map(|i| {
            matrix
                .slice(s![.., i * seq_length..(i + 1) * seq_length])
                .to_owned()
        })
        .collect()
}

fn check_clock(tensor: &[u32], clock: Option<&[u32]>) -> Result<(), BatchError> {
    match clock {
        Some(c) if c.len() != tensor.len() => Err(BatchError::ClockLengthMismatch {
            events: tensor.len(),
            clock: c.len(),
        }),
        _ => Ok(()),
    }
}

/// Sequential batch source for one training epoch at a time
#[derive(Debug, Clone)]
pub struct BatchScheduler {
    batch_size: usize,
    seq_length: usize,
    num_batches: usize,
    x_batches: Vec<Array2<u32>>,
    y_batches: Vec<Array2<u32>>,
    clock_batches: Option<Vec<Array2<u32>>>,
    pointer: usize,
    clock_pointer: usize,
}

impl BatchScheduler {
    /// Cut a code tensor (and its parallel clock, if any) into batches
    pub fn prepare(
        tensor: &[u32],
        clock: Option<&[u32]>,
        batch_size: usize,
        seq_length: usize,
    ) -> Result<Self, BatchError> {
        if batch_size == 0 || seq_length == 0 {
            return Err(BatchError::ZeroShape);
        }
        check_clock(tensor, clock)?;

        let num_batches = tensor.len() / (batch_size * seq_length);
        if num_batches == 0 {
            return Err(BatchError::InsufficientData {
                len: tensor.len(),
                batch_size,
                seq_length,
            });
        }

        // Clip so the data divides exactly among the batches
        let used = num_batches * batch_size * seq_length;
        let xdata = &tensor[..used];
        let ydata = shift_with_wraparound(xdata);

        let x_rows = rows(xdata.to_vec(), batch_size);
        let y_rows = rows(ydata, batch_size);
        let x_batches = split_columns(&x_rows, num_batches, seq_length);
        let y_batches = split_columns(&y_rows, num_batches, seq_length);

        let clock_batches = clock.map(|c| {
            let c_rows = rows(c[..used].to_vec(), batch_size);
            split_columns(&c_rows, num_batches, seq_length)
        });

        debug!(
            num_batches,
            batch_size,
            seq_length,
            dropped = tensor.len() - used,
            "prepared training batches"
        );

        Ok(Self {
            batch_size,
            seq_length,
            num_batches,
            x_batches,
            y_batches,
            clock_batches,
            pointer: 0,
            clock_pointer: 0,
        })
    }

    /// Number of batches per epoch
    pub fn num_batches(&self) -> usize {
        self.num_batches
    }

    /// Number of parallel streams
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Window width of each batch
    pub fn seq_length(&self) -> usize {
        self.seq_length
    }

    /// Whether clock batches were prepared
    pub fn has_clock(&self) -> bool {
        self.clock_batches.is_some()
    }

    /// Current cursor position
    pub fn pointer(&self) -> usize {
        self.pointer
    }

    /// All input batches in order
    pub fn x_batches(&self) -> &[Array2<u32>] {
        &self.x_batches
    }

    /// All target batches in order
    pub fn y_batches(&self) -> &[Array2<u32>] {
        &self.y_batches
    }

    /// All clock batches in order, if prepared
    pub fn clock_batches(&self) -> Option<&[Array2<u32>]> {
        self.clock_batches.as_deref()
    }

    /// Return the input/target pair at the cursor and advance
    pub fn next_batch(&mut self) -> Result<(Array2<u32>, Array2<u32>), BatchError> {
        if self.pointer >= self.num_batches {
            return Err(BatchError::Exhausted {
                cursor: self.pointer,
                num_batches: self.num_batches,
            });
        }
        let pair = (
            self.x_batches[self.pointer].clone(),
            self.y_batches[self.pointer].clone(),
        );
        self.pointer += 1;
        Ok(pair)
    }

    /// Return the clock window at the clock cursor and advance it
    pub fn next_clock_batch(&mut self) -> Result<Array2<u32>, BatchError> {
        let batches = self.clock_batches.as_ref().ok_or(BatchError::NoClock)?;
        let batch = batches
            .get(self.clock_pointer)
            .cloned()
            .ok_or(BatchError::Exhausted {
                cursor: self.clock_pointer,
                num_batches: self.num_batches,
            })?;
        self.clock_pointer += 1;
        Ok(batch)
    }

    /// Return the whole batch (inputs, targets and clock) and advance both
    /// cursors
    pub fn next(&mut self) -> Result<Batch, BatchError> {
        let (x, y) = self.next_batch()?;
        let clock = if self.has_clock() {
            Some(self.next_clock_batch()?)
        } else {
            None
        };
        Ok(Batch { x, y, clock })
    }

    /// Rewind to the first batch for a new epoch
    pub fn reset_batch_pointer(&mut self) {
        self.pointer = 0;
        self.clock_pointer = 0;
    }
}

/// Build the single held-out batch: the whole validation tensor as
/// `len / seq_length` rows of `seq_length`
pub fn prepare_eval(
    tensor: &[u32],
    clock: Option<&[u32]>,
    seq_length: usize,
) -> Result<Batch, BatchError> {
    if seq_length == 0 {
        return Err(BatchError::ZeroShape);
    }
    check_clock(tensor, clock)?;

    let num_examples = tensor.len() / seq_length;
    if num_examples == 0 {
        return Err(BatchError::InsufficientData {
            len: tensor.len(),
            batch_size: 1,
            seq_length,
        });
    }

    let used = num_examples * seq_length;
    let xdata = &tensor[..used];
    let ydata = shift_with_wraparound(xdata);

    Ok(Batch {
        x: rows(xdata.to_vec(), num_examples),
        y: rows(ydata, num_examples),
        clock: clock.map(|c| rows(c[..used].to_vec(), num_examples)),
    })
}
