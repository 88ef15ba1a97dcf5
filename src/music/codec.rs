// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Conversion between note lists and the event stream.
//!
//! Encoding inserts a rest for every gap between notes and tags each event
//! with a metrical clock tick. Decoding only needs the events: offsets are
//! rebuilt by summing durations.

use crate::error::CodecError;
use crate::timing::{MetricClock, PAD_TICK};

use super::event::{Event, Note};

/// Encode one piece into events and their clock ticks.
///
/// The returned vectors always have the same length and start with a
/// divider on tick 0.
pub fn encode(
    notes: &[Note],
    clock: &MetricClock,
    bar_length: u32,
) -> Result<(Vec<Event>, Vec<u32>), CodecError> {
    clock.check_bar(bar_length)?;

    let mut events = Vec::with_capacity(notes.len() * 2 + 1);
    let mut ticks = Vec::with_capacity(notes.len() * 2 + 1);
    events.push(Event::Divider);
    ticks.push(PAD_TICK);

    let mut prev_end = 0;
    for (index, note) in notes.iter().enumerate() {
        if note.duration <= 0 {
            return Err(CodecError::NonPositiveDuration {
                index,
                duration: note.duration,
            });
        }

        let gap = note.offset - prev_end;
        if gap > 0 {
            events.push(Event::rest(gap));
            ticks.push(clock.tick(prev_end, bar_length));
        }
        events.push(Event::note(note.pitch, note.duration));
        ticks.push(clock.tick(note.offset, bar_length));
        prev_end = note.end();
    }

    Ok((events, ticks))
}

/// Decode events back into notes, skipping dividers
pub fn decode(events: &[Event]) -> Vec<Note> {
    let mut offset = 0;
    let mut notes = Vec::new();
    for event in events {
        match *event {
            Event::Divider => {}
            Event::Note { pitch, duration } => {
                notes.push(Note::new(pitch, offset, duration));
                offset += duration;
            }
            Event::Rest { duration } => offset += duration,
        }
    }
    notes
}
