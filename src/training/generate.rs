// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Generation from a restored model, for either corpus type.

use anyhow::{bail, Result};

use crate::corpus::Vocabulary;
use crate::model::{EntropyTrace, SamplingMethod, SequenceModel};
use crate::music::Event;
use crate::timing::MetricClock;

use super::output::GeneratedOutput;

/// Parse a whitespace separated list of event keys, such as `"| n60d4 r2"`.
/// An empty prime starts from a divider.
pub fn parse_event_prime(prime: &str) -> Result<Vec<Event>> {
    let events = prime
        .split_whitespace()
        .map(|key| key.parse::<Event>())
        .collect::<Result<Vec<_>, _>>()?;
    if events.is_empty() {
        Ok(vec![Event::Divider])
    } else {
        Ok(events)
    }
}

/// Generate `count` events after `prime`, feeding clock ticks that follow
/// the running offset in a bar of `bar_length` semiquavers
pub fn sample_music(
    model: &mut SequenceModel,
    vocab: &Vocabulary<Event>,
    count: usize,
    prime: &[Event],
    method: SamplingMethod,
    clock: &MetricClock,
    bar_length: u32,
) -> Result<GeneratedOutput> {
    clock.check_bar(bar_length)?;
    let width = model.descriptor().shape.clock_width;
    if width != clock.width() {
        bail!(
            "model was trained with a clock of width {}, but the configured clock has width {}",
            width,
            clock.width()
        );
    }

    let mut tracker = clock.tracker(bar_length);
    let (events, trace) = model.sample(vocab, count, prime, method, Some(&mut tracker))?;
    Ok(GeneratedOutput::from_events(&events, trace))
}

/// Generate `count` characters after `prime`
pub fn sample_text(
    model: &mut SequenceModel,
    vocab: &Vocabulary<char>,
    count: usize,
    prime: &str,
    method: SamplingMethod,
) -> Result<(String, EntropyTrace)> {
    let prime: Vec<char> = prime.chars().collect();
    let (chars, trace) = model.sample(vocab, count, &prime, method, None)?;
    Ok((chars.into_iter().collect(), trace))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::{CorpusMode, LoaderSummary};
    use crate::model::{ModelConfig, RnnMode};

    fn model(mode: CorpusMode, clock_width: usize, vocab_size: usize) -> SequenceModel {
        let config = ModelConfig {
            hidden_size: 24,
            num_layers: 1,
            ..ModelConfig::for_loader(LoaderSummary {
                mode,
                batch_size: 1,
                seq_length: 5,
                vocab_size,
                clock_width,
            })
        };
        SequenceModel::new(&config, RnnMode::Sample, Some(21)).unwrap()
    }

    #[test]
    fn test_parse_event_prime() {
        assert_eq!(parse_event_prime("").unwrap(), vec![Event::Divider]);
        assert_eq!(
            parse_event_prime("| n60d4  r2").unwrap(),
            vec![Event::Divider, Event::note(60, 4), Event::rest(2)]
        );
        assert!(parse_event_prime("x60").is_err());
    }

    #[test]
    fn test_sample_music() {
        let vocab =
            Vocabulary::from_symbols(vec![Event::Divider, Event::note(60, 4), Event::rest(2)]).unwrap();
        let clock = MetricClock::default();
        let mut model = model(CorpusMode::Music, clock.width(), 3);
        let output = sample_music(
            &mut model,
            &vocab,
            20,
            &[Event::Divider],
            SamplingMethod::Weighted,
            &clock,
            16,
        )
        .unwrap();
        assert_eq!(output.entropies.len(), 20);
        assert!(output.notes.iter().all(|n| n.pitch == 60 && n.duration == 4));
    }

    #[test]
    fn test_sample_music_clock_mismatch() {
        let vocab = Vocabulary::from_symbols(vec![Event::Divider, Event::note(60, 4)]).unwrap();
        let mut model = model(CorpusMode::Music, 16, 2);
        let coarse = MetricClock::new(4, 16).unwrap();
        assert!(sample_music(&mut model, &vocab, 5, &[Event::Divider], SamplingMethod::Argmax, &coarse, 16).is_err());
        let clock = MetricClock::default();
        assert!(sample_music(&mut model, &vocab, 5, &[Event::Divider], SamplingMethod::Argmax, &clock, 24).is_err());
    }

    #[test]
    fn test_sample_text() {
        let vocab = Vocabulary::from_symbols(vec!['H', 'a', 'r', 'y', ' ']).unwrap();
        let mut model = model(CorpusMode::Text, 0, 5);
        let (text, trace) =
            sample_text(&mut model, &vocab, 10, "Harry ", SamplingMethod::WordBoundary).unwrap();
        assert!(text.starts_with("Harry "));
        assert_eq!(text.chars().count(), 16);
        assert_eq!(trace.len(), 10);
    }
}
