//! Persisted run state: the reference recording, its format, and the
//! full history of generations, serialized with `bincode` so a run
//! survives a restart.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::io::{BufReader, BufWriter};
use std::path::Path;

use crate::patch::Patch;

/// Sample-rate / channel-count description of the reference recording.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

/// A patch plus the outcome of evaluating it: score, whether the score
/// is usable, and (if `-tmpdir` was set) the captured recording.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ScoredPatch {
    pub patch: Patch,
    pub score: f64,
    pub filtered: bool,
    pub audio: Vec<f32>,
}

/// One generation: its number and the population evaluated in it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Generation {
    pub number: i64,
    pub patches: Vec<ScoredPatch>,
}

impl Generation {
    /// Sorts patches descending by score.
    pub fn sort_by_score_desc(&mut self) {
        self.patches
            .sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    }
}

/// The entire run: reference audio, its format, and every generation
/// produced so far.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct State {
    pub generations: Vec<Generation>,
    pub source_audio: Vec<f32>,
    pub format: Option<AudioFormat>,
}

impl State {
    /// Loads state from `path`, if it exists and parses; an absent or
    /// corrupt checkpoint is treated as "start fresh".
    pub fn load(path: &Path) -> Self {
        match std::fs::File::open(path) {
            Ok(f) => match bincode::deserialize_from(BufReader::new(f)) {
                Ok(state) => state,
                Err(e) => {
                    log::warn!("couldn't read state file {}: {}", path.display(), e);
                    State::default()
                }
            },
            Err(_) => State::default(),
        }
    }

    /// Serializes and writes state to `path`. Failure is logged and
    /// non-fatal: the generation just produced still counts in memory.
    pub fn save(&self, path: &Path) {
        let result: Result<()> = (|| {
            let f = std::fs::File::create(path).with_context(|| format!("creating {}", path.display()))?;
            bincode::serialize_into(BufWriter::new(f), self).context("serializing state")?;
            Ok(())
        })();
        if let Err(e) = result {
            log::warn!("couldn't save state: {:#}", e);
        }
    }

    /// The most recently completed generation, if any.
    pub fn last_generation(&self) -> Option<&Generation> {
        self.generations.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_round_trips_through_bincode() {
        let mut state = State {
            source_audio: vec![0.1, -0.2, 0.3],
            format: Some(AudioFormat { sample_rate: 44100, channels: 2 }),
            ..Default::default()
        };
        state.generations.push(Generation {
            number: 0,
            patches: vec![ScoredPatch { score: 0.5, ..Default::default() }],
        });

        let bytes = bincode::serialize(&state).unwrap();
        let decoded: State = bincode::deserialize(&bytes).unwrap();
        assert_eq!(decoded.source_audio, state.source_audio);
        assert_eq!(decoded.generations.len(), 1);
        assert_eq!(decoded.generations[0].patches[0].score, 0.5);
    }

    #[test]
    fn sort_by_score_desc_orders_descending() {
        let mut gen = Generation {
            number: 0,
            patches: vec![
                ScoredPatch { score: 0.2, ..Default::default() },
                ScoredPatch { score: 0.9, ..Default::default() },
                ScoredPatch { score: 0.5, ..Default::default() },
            ],
        };
        gen.sort_by_score_desc();
        let scores: Vec<f64> = gen.patches.iter().map(|p| p.score).collect();
        assert_eq!(scores, vec![0.9, 0.5, 0.2]);
    }

    #[test]
    fn missing_state_file_loads_default() {
        let state = State::load(Path::new("/nonexistent/path/state.bin"));
        assert!(state.generations.is_empty());
    }
}
