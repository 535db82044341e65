use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use clap::Parser;

use fevolver::generation::{self, GenerationLoopConfig, ScoreFilter};
use fevolver::evaluator::EvaluatorConfig;
use fevolver::state::{AudioFormat, State};
use fevolver::{audio_io, midi_io};

/// Evolutionary search for FS1R-class synthesizer patches matching a
/// target recording.
#[derive(Parser, Clone)]
#[command(name = "fevolver")]
#[command(about = "Evolve synthesizer patches toward a target recording")]
#[command(version)]
struct Args {
    /// List available MIDI and audio devices, then exit.
    #[arg(short = 'l', long = "list")]
    list: bool,

    /// Output MIDI device index.
    #[arg(short = 'o', long = "midi-out")]
    midi_out: Option<usize>,

    /// Audio input device index.
    #[arg(short = 'a', long = "audio-in")]
    audio_in: Option<usize>,

    /// Stereo reference audio file.
    #[arg(short = 'f', long = "source")]
    source: Option<PathBuf>,

    /// MIDI note to trigger.
    #[arg(long = "mn", default_value_t = 64)]
    note: u8,

    /// MIDI velocity.
    #[arg(long = "velo", default_value_t = 127)]
    velocity: u8,

    /// Population size.
    #[arg(short = 'p', long = "population", default_value_t = 20)]
    population: usize,

    /// Number of top-ranked individuals kept unchanged each generation.
    #[arg(short = 'e', long = "elitism", default_value_t = 2)]
    elitism: usize,

    /// Per-field mutation probability.
    #[arg(short = 'm', long = "mutation", default_value_t = 0.1)]
    mutation: f64,

    /// Score threshold for completion.
    #[arg(short = 't', long = "threshold", default_value_t = 1000.0)]
    threshold: f64,

    /// Maximum number of generations; `<= 0` means unbounded.
    #[arg(long = "mg", default_value_t = -1)]
    max_generations: i64,

    /// Checkpoint file.
    #[arg(short = 's', long = "state", default_value = "state.bin")]
    statefile: PathBuf,

    /// Optional directory to persist a WAV recording per individual.
    #[arg(long = "tmpdir")]
    tmpdir: Option<PathBuf>,
}

fn list_devices() -> Result<()> {
    println!("Output MIDI devices:");
    for dev in midi_io::list_output_devices()? {
        println!("{}.) {}", dev.index, dev.name);
    }
    println!("Audio devices:");
    for dev in audio_io::list_input_devices()? {
        println!("{}.) {} - {} channels", dev.index, dev.name, dev.channels);
    }
    Ok(())
}

/// Reads a stereo reference file, converting any sample format to
/// `f32` in `[-1, 1]`. Non-stereo input is rejected.
fn read_reference(path: &std::path::Path) -> Result<(Vec<f32>, AudioFormat)> {
    let mut reader = hound::WavReader::open(path)?;
    let spec = reader.spec();
    if spec.channels != 2 {
        bail!("wrong # of channels in source! 2 != {}", spec.channels);
    }

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader.samples::<f32>().collect::<Result<_, _>>()?,
        hound::SampleFormat::Int => {
            let max = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max))
                .collect::<Result<_, _>>()?
        }
    };

    Ok((samples, AudioFormat { sample_rate: spec.sample_rate, channels: spec.channels }))
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    if args.list {
        return list_devices();
    }

    let midi_out = args.midi_out.ok_or_else(|| anyhow!("-o, -a, and -f are required"))?;
    let audio_in = args.audio_in.ok_or_else(|| anyhow!("-o, -a, and -f are required"))?;
    let source = args.source.ok_or_else(|| anyhow!("-o, -a, and -f are required"))?;

    let mut state = State::load(&args.statefile);

    // The checkpoint's stored reference audio takes precedence over
    // `-f` on a resumed run.
    let format = if state.source_audio.is_empty() {
        let (samples, format) = read_reference(&source)?;
        log::info!("read {} samples of source audio", samples.len());
        state.source_audio = samples;
        state.format = Some(format);
        format
    } else {
        state.format.ok_or_else(|| anyhow!("checkpoint has source audio but no format"))?
    };

    let loop_cfg = GenerationLoopConfig {
        population: args.population,
        elitism: args.elitism,
        mutation_rate: args.mutation,
        threshold: args.threshold,
        max_generations: args.max_generations,
        filter: ScoreFilter::PassThrough,
    };
    let evaluator_cfg = EvaluatorConfig {
        midi_device: midi_out,
        audio_device: audio_in,
        note: args.note,
        velocity: args.velocity,
        settle: Duration::from_secs(10),
        tmpdir: args.tmpdir,
    };

    let mut rng = rand::thread_rng();
    generation::run(&mut state, &loop_cfg, &evaluator_cfg, format, &args.statefile, &mut rng)?;

    if let Some(last) = state.last_generation() {
        if let Some(best) = last.patches.first() {
            println!("best score in generation {}: {}", last.number, best.score);
        }
    }

    Ok(())
}
