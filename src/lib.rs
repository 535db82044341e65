//! Evolutionary search for FS1R-class synthesizer patches that resemble
//! a target stereo recording: a bit-exact SysEx patch codec, a
//! schema-driven genetic operator layer, MFCC+DTW scoring, and a
//! resumable MIDI+audio evaluation loop.

pub mod audio_io;
pub mod codec;
pub mod evaluator;
pub mod generation;
pub mod genetics;
pub mod midi_io;
pub mod patch;
pub mod scoring;
pub mod state;
pub mod wav_out;

pub use generation::{GenerationLoopConfig, ScoreFilter};
pub use evaluator::EvaluatorConfig;
pub use patch::Patch;
pub use state::{AudioFormat, Generation, ScoredPatch, State};
