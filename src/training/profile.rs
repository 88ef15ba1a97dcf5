// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Scoring real sequences one event at a time.

use crate::batch::Batch;
use crate::corpus::Vocabulary;
use crate::error::ModelError;
use crate::model::{EntropyTrace, SequenceModel};
use crate::music::{Event, Note};
use crate::nn::CellState;

use super::output::GeneratedOutput;

/// Bar length of the pathological probe (4/4)
pub const PATHOLOGICAL_BAR_LENGTH: u32 = 16;

/// Thirty repeated G4 crotchets
pub fn pathological_notes() -> Vec<Note> {
    (0..30).map(|i| Note::new(67, 4 * i, 4)).collect()
}

/// Feed `events` through the model and score each real next event.
///
/// Step `t` feeds event `t` with its tick and records the cross-entropy of
/// event `t + 1` under the predicted distribution, so the output covers
/// every event but the last.
pub fn profile_events(
    model: &SequenceModel,
    vocab: &Vocabulary<Event>,
    events: &[Event],
    ticks: &[u32],
) -> Result<GeneratedOutput, ModelError> {
    let mut state: Option<CellState> = None;
    let mut trace = EntropyTrace::new();
    let mut processed = Vec::with_capacity(events.len());

    for (pair, &tick) in events.windows(2).zip(ticks) {
        let (current, next) = (&pair[0], &pair[1]);
        processed.push(*current);
        let code = vocab.encode_event(current)?;
        let (next_state, dist) = model.clocked_dist_iter(code, tick, state.as_ref())?;
        trace.record(dist.view(), vocab.encode_event(next)?);
        state = Some(next_state);
    }

    Ok(GeneratedOutput::from_events(&processed, trace))
}

/// Mean loss (natural log) over a batch, fed one symbol at a time with a
/// fresh state per row
pub fn evaluate_stepwise(model: &SequenceModel, batch: &Batch) -> Result<f32, ModelError> {
    let (rows, cols) = batch.shape();
    let mut total = 0.0f64;

    for r in 0..rows {
        let mut state: Option<CellState> = None;
        for c in 0..cols {
            let tick = batch.clock.as_ref().map(|clock| clock[[r, c]]).unwrap_or(0);
            let (next, dist) =
                model.clocked_dist_iter(batch.x[[r, c]] as usize, tick, state.as_ref())?;
            total -= (dist[batch.y[[r, c]] as usize] as f64).ln();
            state = Some(next);
        }
    }

    Ok((total / (rows * cols).max(1) as f64) as f32)
}
