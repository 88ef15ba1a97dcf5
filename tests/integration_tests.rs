// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Integration tests for chorale-rnn
//!
//! These tests drive the public API end to end: corpus on disk, loader,
//! training, checkpoints, sampling and profiling.

use std::fs;
use std::path::Path;

use chorale_rnn::batch::BatchScheduler;
use chorale_rnn::config::RunConfig;
use chorale_rnn::corpus::loader::{MUSIC_INPUT_FILE, TEXT_INPUT_FILE};
use chorale_rnn::corpus::{CorpusMode, DataLoader, Symbol, VocabTable, Vocabulary};
use chorale_rnn::error::{BatchError, CheckpointError};
use chorale_rnn::model::checkpoint;
use chorale_rnn::model::{distribution_entropy, ModelConfig, RnnMode, SamplingMethod};
use chorale_rnn::music::{decode, encode, Event, Note};
use chorale_rnn::timing::MetricClock;
use chorale_rnn::training::{
    profile_events, sample_music, sample_text, train, GeneratedOutput, PATHOLOGICAL_BAR_LENGTH,
};
use ndarray::Array1;
use tempfile::tempdir;

const CORPUS: &str = r#"{"corpus": {
    "train": [
        {"notes": [[60, 0, 4], [62, 4, 4], [64, 8, 4], [65, 12, 4], [67, 16, 8], [65, 24, 8]], "time_sig_amt": 16},
        {"notes": [[67, 0, 4], [65, 4, 2], [64, 8, 4], [62, 12, 4], [60, 16, 8]], "time_sig_amt": 16, "title": "bwv1.6"},
        {"notes": [[60, 0, 4], [64, 4, 4], [67, 8, 4], [64, 12, 4], [60, 16, 16]], "time_sig_semis": 16}
    ],
    "validate": [
        {"notes": [[60, 0, 4], [62, 4, 4], [64, 8, 8], [62, 16, 4], [60, 20, 4]], "time_sig_amt": 16}
    ]
}}"#;

fn music_run(root: &Path) -> RunConfig {
    let data = root.join("data");
    fs::create_dir_all(&data).unwrap();
    fs::write(data.join(MUSIC_INPUT_FILE), CORPUS).unwrap();
    RunConfig {
        mode: CorpusMode::Music,
        data_dir: data,
        save_dir: root.join("save"),
        log_dir: root.join("logs"),
        batch_size: 2,
        seq_length: 4,
        hidden_size: 32,
        num_layers: 2,
        num_epochs: 3,
        keep_prob: 0.9,
        save_every: 100,
        seed: Some(7),
        ..RunConfig::default()
    }
}

/// Worked examples from the codec documentation
#[test]
fn test_codec_examples() {
    let clock = MetricClock::default();

    let (events, ticks) = encode(&[Note::new(60, 0, 4), Note::new(64, 4, 4)], &clock, 16).unwrap();
    let keys: Vec<String> = events.iter().map(|e| e.key()).collect();
    assert_eq!(keys, vec!["|", "n60d4", "n64d4"]);
    assert_eq!(ticks, vec![0, 1, 5]);

    let notes = vec![Note::new(60, 0, 2), Note::new(64, 6, 4)];
    let (events, ticks) = encode(&notes, &clock, 16).unwrap();
    let keys: Vec<String> = events.iter().map(|e| e.key()).collect();
    assert_eq!(keys, vec!["|", "n60d2", "r4", "n64d4"]);
    assert_eq!(ticks, vec![0, 1, 3, 7]);
    assert_eq!(decode(&events), notes);
}

#[test]
fn test_insufficient_data_before_any_batch() {
    let codes: Vec<u32> = (0..10).collect();
    assert!(matches!(
        BatchScheduler::prepare(&codes, None, 3, 4),
        Err(BatchError::InsufficientData { len: 10, .. })
    ));
}

#[test]
fn test_end_to_end_music() {
    let dir = tempdir().unwrap();
    let run = music_run(dir.path());

    let mut loader = DataLoader::new(run.loader_options().unwrap()).unwrap();
    // 3 pieces: 7 + 7 + 6 events
    assert_eq!(loader.train_tensor().len(), 20);
    assert_eq!(loader.scheduler().num_batches(), 2);
    assert!(dir.path().join("data").join("event_metadata.tsv").exists());

    let report = train(&run, &mut loader).unwrap();
    assert_eq!(report.global_step, 6);
    assert_eq!(report.eval_losses.len(), 3);
    assert!(report.eval_losses.iter().all(|l| l.is_finite()));

    // Restore and sample with the saved vocabulary
    let ckpt = checkpoint::latest(&run.save_dir).unwrap().unwrap();
    ckpt.check_vocab(&loader.vocab().keys()).unwrap();
    let vocab = match VocabTable::from_keys(CorpusMode::Music, &ckpt.vocab_keys).unwrap() {
        VocabTable::Music(vocab) => vocab,
        VocabTable::Text(_) => panic!("expected a music vocabulary"),
    };
    let mut model = ckpt.into_model(RnnMode::Sample, Some(3)).unwrap();

    let output = sample_music(
        &mut model,
        &vocab,
        30,
        &[Event::Divider],
        SamplingMethod::Weighted,
        &run.clock().unwrap(),
        16,
    )
    .unwrap();
    assert_eq!(output.entropies.len(), 30);

    let out_file = dir.path().join("out").join("sample.json");
    output.save(&out_file).unwrap();
    assert_eq!(GeneratedOutput::load(&out_file).unwrap(), output);

    // Profile the validation piece
    let piece = [
        Note::new(60, 0, 4),
        Note::new(62, 4, 4),
        Note::new(64, 8, 8),
        Note::new(62, 16, 4),
        Note::new(60, 20, 4),
    ];
    let (events, ticks) = encode(&piece, &run.clock().unwrap(), PATHOLOGICAL_BAR_LENGTH).unwrap();
    let profile = profile_events(&model, &vocab, &events, &ticks).unwrap();
    assert_eq!(profile.entropies.len(), events.len() - 1);
    assert_eq!(profile.notes, piece[..4].to_vec());
}

#[test]
fn test_training_lowers_held_out_loss() {
    let dir = tempdir().unwrap();
    let mut run = music_run(dir.path());
    run.num_epochs = 15;
    run.keep_prob = 1.0;
    run.learning_rate = 0.5;
    run.lr_decay = 1.0;

    let mut loader = DataLoader::new(run.loader_options().unwrap()).unwrap();
    let report = train(&run, &mut loader).unwrap();
    let first = report.eval_losses[0];
    let last = *report.eval_losses.last().unwrap();
    assert!(last < first, "eval loss went from {} to {}", first, last);
}

#[test]
fn test_end_to_end_text() {
    let dir = tempdir().unwrap();
    let data = dir.path().join("data");
    fs::create_dir_all(&data).unwrap();
    fs::write(
        data.join(TEXT_INPUT_FILE),
        "the cat sat on the mat and the rat sat on the hat ".repeat(4),
    )
    .unwrap();
    let run = RunConfig {
        mode: CorpusMode::Text,
        data_dir: data,
        save_dir: dir.path().join("save"),
        log_dir: dir.path().join("logs"),
        batch_size: 4,
        seq_length: 8,
        hidden_size: 16,
        num_layers: 1,
        num_epochs: 2,
        keep_prob: 1.0,
        seed: Some(11),
        ..RunConfig::default()
    };

    let mut loader = DataLoader::new(run.loader_options().unwrap()).unwrap();
    assert_eq!(loader.clock_width(), 0);
    train(&run, &mut loader).unwrap();

    let ckpt = checkpoint::latest(&run.save_dir).unwrap().unwrap();
    let vocab = match VocabTable::from_keys(CorpusMode::Text, &ckpt.vocab_keys).unwrap() {
        VocabTable::Text(vocab) => vocab,
        VocabTable::Music(_) => panic!("expected a text vocabulary"),
    };
    let mut model = ckpt.into_model(RnnMode::Sample, Some(2)).unwrap();
    let (text, trace) = sample_text(&mut model, &vocab, 40, "the ", SamplingMethod::WordBoundary).unwrap();
    assert!(text.starts_with("the "));
    assert_eq!(text.chars().count(), 44);
    assert_eq!(trace.len(), 40);
}

#[test]
fn test_argmax_sampling_is_deterministic_across_seeds() {
    let dir = tempdir().unwrap();
    let run = music_run(dir.path());
    let mut loader = DataLoader::new(run.loader_options().unwrap()).unwrap();
    train(&run, &mut loader).unwrap();

    let vocab = match loader.vocab() {
        VocabTable::Music(vocab) => vocab.clone(),
        VocabTable::Text(_) => panic!("expected a music vocabulary"),
    };
    let clock = run.clock().unwrap();
    let mut outputs = Vec::new();
    for seed in [1, 2, 3] {
        let ckpt = checkpoint::latest(&run.save_dir).unwrap().unwrap();
        let mut model = ckpt.into_model(RnnMode::Sample, Some(seed)).unwrap();
        let output = sample_music(
            &mut model,
            &vocab,
            25,
            &[Event::Divider, Event::note(60, 4)],
            SamplingMethod::Argmax,
            &clock,
            16,
        )
        .unwrap();
        outputs.push(output);
    }
    assert_eq!(outputs[0], outputs[1]);
    assert_eq!(outputs[1], outputs[2]);
}

#[test]
fn test_resume_with_changed_vocabulary_fails() {
    let dir = tempdir().unwrap();
    let mut run = music_run(dir.path());
    run.num_epochs = 1;
    let mut loader = DataLoader::new(run.loader_options().unwrap()).unwrap();
    train(&run, &mut loader).unwrap();

    let ckpt = checkpoint::latest(&run.save_dir).unwrap().unwrap();
    let mut keys = loader.vocab().keys();
    keys.reverse();
    assert!(matches!(
        ckpt.check_vocab(&keys),
        Err(CheckpointError::VocabMismatch)
    ));

    let mut requested = ModelConfig::from_run(&run, loader.summary());
    requested.loader.seq_length = 8;
    assert!(matches!(
        ckpt.config.check_compatible(&requested),
        Err(CheckpointError::Incompatible { field: "seq_length", .. })
    ));
}

#[test]
fn test_vocabulary_bijection_over_corpus() {
    let dir = tempdir().unwrap();
    let run = music_run(dir.path());
    let loader = DataLoader::new(run.loader_options().unwrap()).unwrap();

    let vocab: &Vocabulary<Event> = match loader.vocab() {
        VocabTable::Music(vocab) => vocab,
        VocabTable::Text(_) => panic!("expected a music vocabulary"),
    };
    for (code, symbol) in vocab.symbols().iter().enumerate() {
        assert_eq!(vocab.encode_event(symbol).unwrap(), code);
        assert_eq!(vocab.decode_code(code).unwrap(), symbol);
    }
    let saved = Vocabulary::<Event>::load(run.data_dir.join("vocab.json")).unwrap();
    assert_eq!(&saved, vocab);
}

#[test]
fn test_uniform_entropy() {
    let dist = Array1::from_elem(50, 1.0f32 / 50.0);
    assert!((distribution_entropy(dist.view()) - 50f64.log2()).abs() < 1e-5);
}
