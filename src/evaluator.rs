//! Per-individual orchestration: transmit a patch, let the hardware
//! settle, fire a note while recording its output, then score the
//! capture against the reference.

use std::path::PathBuf;
use std::sync::Barrier;
use std::time::Duration;

use anyhow::Result;

use crate::audio_io::Capture;
use crate::midi_io::MidiOut;
use crate::scoring::score_recording;
use crate::state::{AudioFormat, Generation};

/// Fixed parameters for evaluating a generation, matching the CLI flags.
pub struct EvaluatorConfig {
    pub midi_device: usize,
    pub audio_device: usize,
    pub note: u8,
    pub velocity: u8,
    /// Wait after a SysEx dump before triggering a note — the target
    /// device is slow to ingest large dumps.
    pub settle: Duration,
    pub tmpdir: Option<PathBuf>,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            midi_device: 0,
            audio_device: 0,
            note: 64,
            velocity: 127,
            settle: Duration::from_secs(10),
            tmpdir: None,
        }
    }
}

/// Note-on/note-off and audio capture rendezvous: both tasks wait at a
/// two-party barrier before starting, so the note and the capture start
/// as close together as the host can arrange. The capture runs on the
/// calling thread — only the MIDI side needs its own thread — so no
/// audio stream handle has to cross a thread boundary.
fn run_trial(midi_out: &mut MidiOut, capture: Capture, note: u8, velocity: u8, rec_time: Duration) -> Result<Vec<f32>> {
    let barrier = Barrier::new(2);
    std::thread::scope(|scope| -> Result<Vec<f32>> {
        let midi_handle = scope.spawn(|| -> Result<()> {
            barrier.wait();
            midi_out.note_on(note, velocity)?;
            std::thread::sleep(rec_time);
            midi_out.note_off(note, velocity)
        });

        barrier.wait();
        let captured = capture.record(rec_time)?;

        midi_handle.join().expect("MIDI trial thread panicked")?;
        Ok(captured)
    })
}

/// Evaluates every individual in `gen` in place: sends its SysEx dump,
/// records the hardware's response, scores it against `reference`, and
/// (if configured) persists the recording as a WAV file.
pub fn evaluate_generation(
    gen: &mut Generation,
    reference: &[f32],
    format: AudioFormat,
    cfg: &EvaluatorConfig,
) -> Result<()> {
    let mut midi_out = MidiOut::open(cfg.midi_device)?;
    let rec_time = Duration::from_secs_f64(
        (reference.len() as f64 / format.channels as f64) / format.sample_rate as f64,
    );

    for (i, individual) in gen.patches.iter_mut().enumerate() {
        for message in individual.patch.encode_messages() {
            midi_out.send_sysex(&message)?;
        }
        log::debug!("sent patch {}, settling for {:?}", i, cfg.settle);
        std::thread::sleep(cfg.settle);

        let capture = Capture::open(cfg.audio_device, format.sample_rate)?;
        let captured = run_trial(&mut midi_out, capture, cfg.note, cfg.velocity, rec_time)?;

        let (score, filtered) = score_recording(reference, &captured, format.sample_rate);
        individual.score = score;
        individual.filtered = filtered;
        log::info!("gen {} individual {} score {} filtered {}", gen.number, i, score, filtered);

        if let Some(tmpdir) = &cfg.tmpdir {
            if let Err(e) = crate::wav_out::write_individual(tmpdir, gen.number, i, &captured, format.sample_rate, format.channels) {
                log::warn!("couldn't write recording for individual {}: {:#}", i, e);
            }
            individual.audio = captured;
        }
    }
    Ok(())
}
