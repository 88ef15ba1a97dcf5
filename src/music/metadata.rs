// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Human-readable event descriptions.
//!
//! Used to label the embedding table when it is inspected in an external
//! projector: one TSV row per vocabulary entry, in code order.

use super::event::Event;

const PITCH_NAMES: [&str; 12] = [
    "C", "C#", "D", "Eb", "E", "F", "F#", "G", "G#", "A", "Bb", "B",
];

/// Name of a MIDI pitch with its octave, e.g. `60 -> "C4"`
pub fn readable_pitch(pitch: i32) -> String {
    let octave = pitch.div_euclid(12) - 1;
    format!("{}{}", PITCH_NAMES[pitch.rem_euclid(12) as usize], octave)
}

/// Name of a duration in semiquavers
pub fn readable_duration(duration: i32) -> String {
    let name = match duration {
        1 => "Semiquaver",
        2 => "Quaver",
        3 => "Dotted quaver",
        4 => "Crotchet",
        6 => "Dotted crotchet",
        8 => "Minim",
        12 => "Dotted minim",
        14 => "Double dotted minim",
        16 => "Semibreve",
        20 => "Semibreve+Crotchet",
        24 => "Dotted semibreve",
        28 => "Double dotted semibreve",
        32 => "Breve",
        56 => "Double dotted breve",
        64 => "Longa",
        other => return format!("{} semiquavers", other),
    };
    name.to_string()
}

/// Pitch column, duration column and description for one event
pub fn describe(event: &Event) -> (String, String, String) {
    match *event {
        Event::Divider => ("EOF".to_string(), "0".to_string(), "EOF".to_string()),
        Event::Note { pitch, duration } => {
            let pitch_name = readable_pitch(pitch);
            let description = format!("{} {}", readable_duration(duration), pitch_name);
            (pitch_name, duration.to_string(), description)
        }
        Event::Rest { duration } => (
            "Rest".to_string(),
            duration.to_string(),
            format!("{} rest", readable_duration(duration)),
        ),
    }
}

/// Render the metadata TSV for a vocabulary in code order
pub fn metadata_tsv<'a>(events: impl IntoIterator<Item = &'a Event>) -> String {
    let mut tsv = String::from("Pitch\tDuration\tDescription\n");
    for event in events {
        let (pitch, duration, description) = describe(event);
        tsv.push_str(&format!("{}\t{}\t{}\n", pitch, duration, description));
    }
    tsv
}
