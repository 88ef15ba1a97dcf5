// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

use anyhow::{anyhow, bail, Context, Result};
use chorale_rnn::config::RunConfig;
use chorale_rnn::corpus::{CorpusFile, CorpusMode, DataLoader, VocabTable};
use chorale_rnn::model::checkpoint::{self, Checkpoint};
use chorale_rnn::model::{ModelConfig, RnnMode, SamplingMethod};
use chorale_rnn::music;
use chorale_rnn::training::{
    self, evaluate_stepwise, parse_event_prime, pathological_notes, profile_events, sample_music,
    sample_text, PATHOLOGICAL_BAR_LENGTH,
};
use std::env;
use std::path::PathBuf;
use tracing::{info, Level};

fn print_usage() {
    println!("chorale-rnn - event-level LSTM for chorales and text");
    println!();
    println!("Usage: chorale-rnn <COMMAND> [OPTIONS]");
    println!();
    println!("Commands:");
    println!("  train                   Train a model (or resume with --resume)");
    println!("  test                    Report the held-out loss of the saved model");
    println!("  sample                  Generate from the saved model");
    println!("  profile                 Score a held-out piece event by event");
    println!("  inspect                 Print the first batches as symbols");
    println!();
    println!("Options:");
    println!("  --config <FILE>         YAML run configuration");
    println!("  --mode <music|text>     Corpus type");
    println!("  --data-dir <DIR>        Directory with corpus.json or input.txt");
    println!("  --save-dir <DIR>        Checkpoint directory");
    println!("  --log-dir <DIR>         Training log directory");
    println!("  --batch-size <N>        Parallel streams per batch");
    println!("  --seq-length <N>        Unrolled window length");
    println!("  --num-epochs <N>        Passes over the training data");
    println!("  --save-every <N>        Checkpoint interval in steps");
    println!("  --resume                Continue from the checkpoint in --save-dir");
    println!("  --seed <N>              RNG seed");
    println!("  -n <N>                  Symbols to sample (default 500)");
    println!("  --sample <N>            0: weighted, 1: argmax, 2: weighted on word boundaries");
    println!("  --prime <TEXT>          Priming text, or event keys such as \"| n60d4\"");
    println!("  --bar-length <N>        Bar length in semiquavers for sampling (default 16)");
    println!("  --output-file <FILE>    Where sample/profile write JSON (default out/rnn_evald.json)");
    println!("  --corpus-path <FILE>    Corpus to take the profiled piece from");
    println!("  --target-idx <N>        Index of the validation piece to profile (default 0)");
    println!("  --path                  Profile the pathological repeated-note example");
    println!("  --stepwise              Also evaluate one event at a time (test)");
    println!("  --batches <N>           Batches to print (inspect, default 1)");
    println!("  --verbose               Debug logging");
    println!("  --help                  Show this help message");
}

/// Options that only apply to some commands
struct CommandOptions {
    count: usize,
    method: u8,
    prime: String,
    bar_length: u32,
    output_file: PathBuf,
    corpus_path: Option<PathBuf>,
    target_idx: usize,
    pathological: bool,
    stepwise: bool,
    batches: usize,
    verbose: bool,
}

impl Default for CommandOptions {
    fn default() -> Self {
        Self {
            count: 500,
            method: 0,
            prime: String::new(),
            bar_length: PATHOLOGICAL_BAR_LENGTH,
            output_file: PathBuf::from("out/rnn_evald.json"),
            corpus_path: None,
            target_idx: 0,
            pathological: false,
            stepwise: false,
            batches: 1,
            verbose: false,
        }
    }
}

fn parse_number<T: std::str::FromStr>(flag: &str, value: Option<&String>) -> Result<T> {
    let value = value.ok_or_else(|| anyhow!("{} requires a value", flag))?;
    value
        .parse()
        .map_err(|_| anyhow!("Invalid value for {}: {}", flag, value))
}

fn parse_value(flag: &str, value: Option<&String>) -> Result<String> {
    value
        .cloned()
        .ok_or_else(|| anyhow!("{} requires a value", flag))
}

/// Read the YAML config first, then apply flags on top
fn parse_args(args: &[String]) -> Result<(RunConfig, CommandOptions)> {
    let mut run = match args.iter().position(|a| a == "--config") {
        Some(i) => {
            let path = parse_value("--config", args.get(i + 1))?;
            RunConfig::load(&path)?
        }
        None => RunConfig::default(),
    };
    let mut opts = CommandOptions::default();

    let mut iter = args.iter();
    while let Some(flag) = iter.next() {
        match flag.as_str() {
            "--config" => {
                iter.next();
            }
            "--mode" => {
                run.mode = match parse_value(flag, iter.next())?.as_str() {
                    "music" => CorpusMode::Music,
                    "text" => CorpusMode::Text,
                    other => bail!("Unknown mode: {}", other),
                }
            }
            "--data-dir" => run.data_dir = parse_value(flag, iter.next())?.into(),
            "--save-dir" => run.save_dir = parse_value(flag, iter.next())?.into(),
            "--log-dir" => run.log_dir = parse_value(flag, iter.next())?.into(),
            "--batch-size" => run.batch_size = parse_number(flag, iter.next())?,
            "--seq-length" => run.seq_length = parse_number(flag, iter.next())?,
            "--num-epochs" => run.num_epochs = parse_number(flag, iter.next())?,
            "--save-every" => run.save_every = parse_number(flag, iter.next())?,
            "--seed" => run.seed = Some(parse_number(flag, iter.next())?),
            "--resume" => run.resume = true,
            "-n" => opts.count = parse_number(flag, iter.next())?,
            "--sample" => opts.method = parse_number(flag, iter.next())?,
            "--prime" => opts.prime = parse_value(flag, iter.next())?,
            "--bar-length" => opts.bar_length = parse_number(flag, iter.next())?,
            "--output-file" => opts.output_file = parse_value(flag, iter.next())?.into(),
            "--corpus-path" => opts.corpus_path = Some(parse_value(flag, iter.next())?.into()),
            "--target-idx" => opts.target_idx = parse_number(flag, iter.next())?,
            "--path" => opts.pathological = true,
            "--stepwise" => opts.stepwise = true,
            "--batches" => opts.batches = parse_number(flag, iter.next())?,
            "--verbose" | "-v" => opts.verbose = true,
            other => bail!("Unknown option: {}", other),
        }
    }

    run.validate()?;
    Ok((run, opts))
}

fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .init();
}

fn require_checkpoint(run: &RunConfig) -> Result<Checkpoint> {
    checkpoint::latest(&run.save_dir)?
        .ok_or_else(|| anyhow!("No checkpoint found in {:?}", run.save_dir))
}

fn run_train(run: &RunConfig) -> Result<()> {
    let mut loader = DataLoader::new(run.loader_options()?)?;
    let report = training::train(run, &mut loader)?;
    println!(
        "Trained {} steps over {} epochs; final eval loss {:?}",
        report.global_step,
        report.epochs_completed,
        report.eval_losses.last()
    );
    if let Some(path) = report.checkpoint {
        println!("Model saved to {}", path.display());
    }
    Ok(())
}

fn run_test(run: &RunConfig, opts: &CommandOptions) -> Result<()> {
    let loader = DataLoader::new(run.loader_options()?)?;
    let ckpt = require_checkpoint(run)?;
    ckpt.config
        .check_compatible(&ModelConfig::from_run(run, loader.summary()))?;
    ckpt.check_vocab(&loader.vocab().keys())?;

    let model = ckpt.into_model(RnnMode::Test, run.seed)?;
    let batch = loader.test_batch();
    let loss = model.eval_step(&batch.x, &batch.y, batch.clock.as_ref())?;
    println!("test loss: {:.4}", loss);

    if opts.stepwise {
        let stepwise = evaluate_stepwise(&model, batch)?;
        println!("test loss (one event at a time): {:.4}", stepwise);
    }
    Ok(())
}

fn run_sample(run: &RunConfig, opts: &CommandOptions) -> Result<()> {
    let ckpt = require_checkpoint(run)?;
    let mode = ckpt.config.loader.mode;
    let vocab = VocabTable::from_keys(mode, &ckpt.vocab_keys)?;
    let method = SamplingMethod::from_code(opts.method)?;
    let mut model = ckpt.into_model(RnnMode::Sample, run.seed)?;
    info!(method = %method, count = opts.count, "sampling");

    match vocab {
        VocabTable::Music(vocab) => {
            let prime = parse_event_prime(&opts.prime)?;
            let output = sample_music(
                &mut model,
                &vocab,
                opts.count,
                &prime,
                method,
                &run.clock()?,
                opts.bar_length,
            )?;
            output.save(&opts.output_file)?;
            println!(
                "Wrote {} notes to {}",
                output.notes.len(),
                opts.output_file.display()
            );
        }
        VocabTable::Text(vocab) => {
            let prime = if opts.prime.is_empty() { "Harry " } else { opts.prime.as_str() };
            let (text, _) = sample_text(&mut model, &vocab, opts.count, prime, method)?;
            println!("{}", text);
        }
    }
    Ok(())
}

fn run_profile(run: &RunConfig, opts: &CommandOptions) -> Result<()> {
    let ckpt = require_checkpoint(run)?;
    let vocab = match VocabTable::from_keys(ckpt.config.loader.mode, &ckpt.vocab_keys)? {
        VocabTable::Music(vocab) => vocab,
        VocabTable::Text(_) => bail!("profile needs a model trained on a music corpus"),
    };
    let clock = run.clock()?;

    let (events, ticks) = if opts.pathological {
        music::encode(&pathological_notes(), &clock, PATHOLOGICAL_BAR_LENGTH)?
    } else {
        let path = opts
            .corpus_path
            .clone()
            .unwrap_or_else(|| run.data_dir.join("corpus.json"));
        let corpus = CorpusFile::load(&path)?.corpus;
        let piece = corpus.validate.get(opts.target_idx).with_context(|| {
            format!(
                "Validation set has {} pieces, no index {}",
                corpus.validate.len(),
                opts.target_idx
            )
        })?;
        piece.encode(&clock)?
    };

    let model = ckpt.into_model(RnnMode::Sample, run.seed)?;
    if model.descriptor().shape.clock_width != clock.width() {
        bail!(
            "model clock width {} differs from the configured clock width {}",
            model.descriptor().shape.clock_width,
            clock.width()
        );
    }

    info!(events = events.len(), "starting prediction");
    let output = profile_events(&model, &vocab, &events, &ticks)?;
    if let Some(mean) = output.entropies.mean_cross_entropy() {
        println!("Mean xent: {}", mean);
    }
    output.save(&opts.output_file)?;
    println!("Wrote profile to {}", opts.output_file.display());
    Ok(())
}

fn run_inspect(run: &RunConfig, opts: &CommandOptions) -> Result<()> {
    let mut loader = DataLoader::new(run.loader_options()?)?;
    for line in loader.inspect_batches(opts.batches)? {
        println!("{}", line);
    }
    Ok(())
}

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        println!("chorale-rnn - event-level LSTM for chorales and text");
        println!("Run with --help for usage information");
        return Ok(());
    }

    let command = args[1].as_str();
    if matches!(command, "--help" | "-h") {
        print_usage();
        return Ok(());
    }

    let (run, opts) = parse_args(&args[2..])?;
    init_logging(opts.verbose);

    match command {
        "train" => run_train(&run)?,
        "test" => run_test(&run, &opts)?,
        "sample" => run_sample(&run, &opts)?,
        "profile" => run_profile(&run, &opts)?,
        "inspect" => run_inspect(&run, &opts)?,
        _ => {
            eprintln!("Unknown command: {}", command);
            print_usage();
            std::process::exit(1);
        }
    }

    Ok(())
}
