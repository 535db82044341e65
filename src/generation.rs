//! The resumable generation loop: elitism, pairing, backfill,
//! mutation, renaming, evaluation, checkpointing, and termination.

use std::path::Path;

use anyhow::Result;
use rand::Rng;

use crate::evaluator::{evaluate_generation, EvaluatorConfig};
use crate::genetics::{crossover, mutate, random_patch};
use crate::state::{AudioFormat, Generation, ScoredPatch, State};

/// Scores every individual in `gen` in place; the production path plugs
/// in [`evaluate_generation`], tests plug in a hardware-free stand-in.
pub trait Evaluator {
    fn evaluate(&mut self, gen: &mut Generation, reference: &[f32], format: AudioFormat) -> Result<()>;
}

impl<F> Evaluator for F
where
    F: FnMut(&mut Generation, &[f32], AudioFormat) -> Result<()>,
{
    fn evaluate(&mut self, gen: &mut Generation, reference: &[f32], format: AudioFormat) -> Result<()> {
        self(gen, reference, format)
    }
}

/// Which individuals survive to seed the next generation's mating
/// pool, beyond the mandatory exclusion of `filtered` scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScoreFilter {
    /// Admits every unfiltered score.
    #[default]
    PassThrough,
    /// Additionally requires a strictly positive score.
    RejectZero,
}

impl ScoreFilter {
    fn admits(self, score: f64) -> bool {
        match self {
            ScoreFilter::PassThrough => true,
            ScoreFilter::RejectZero => score > 0.0,
        }
    }
}

/// Population-level parameters for the loop, matching the `-p -e -m -t
/// -mg` CLI flags.
pub struct GenerationLoopConfig {
    pub population: usize,
    pub elitism: usize,
    pub mutation_rate: f64,
    pub threshold: f64,
    /// `<= 0` means unbounded: stop only on `threshold`.
    pub max_generations: i64,
    pub filter: ScoreFilter,
}

fn seed_generation(state: &State, cfg: &GenerationLoopConfig) -> Generation {
    match state.last_generation() {
        Some(last) => {
            let mut gen = last.clone();
            gen.patches.retain(|p| !p.filtered && cfg.filter.admits(p.score));
            gen.sort_by_score_desc();
            gen
        }
        None => Generation { number: -1, patches: Vec::new() },
    }
}

fn rename(gen: &mut Generation) {
    for (idx, individual) in gen.patches.iter_mut().enumerate() {
        individual.patch.perf_common.name = format!("G{}P{}", gen.number, idx);
        for (v, voice) in individual.patch.voices.iter_mut().enumerate() {
            voice.common.name = format!("G{}P{}V{}", gen.number, idx, v + 1);
        }
        individual.patch.fseq.header.name = format!("G{}P{}", gen.number, idx);
    }
}

fn reproduce(last_gen: &Generation, cfg: &GenerationLoopConfig, rng: &mut impl Rng) -> Vec<ScoredPatch> {
    let elite_count = cfg.elitism.min(last_gen.patches.len());
    let mut patches: Vec<ScoredPatch> = last_gen.patches[..elite_count].to_vec();

    let dating_pool = &last_gen.patches[elite_count..];
    let mut i = 0;
    while i + 1 < dating_pool.len() {
        let (child1, child2) = crossover(&dating_pool[i].patch, &dating_pool[i + 1].patch, rng);
        if child1.is_none() && child2.is_none() {
            log::warn!("crossover produced no valid children for pair {}", i / 2);
        }
        for child in [child1, child2].into_iter().flatten() {
            patches.push(ScoredPatch { patch: child, ..Default::default() });
        }
        i += 2;
    }

    while patches.len() < cfg.population {
        patches.push(ScoredPatch { patch: random_patch(rng), ..Default::default() });
    }
    patches
}

/// Runs generations until a score exceeds `cfg.threshold` or
/// `cfg.max_generations` is reached, checkpointing `state` to
/// `statefile` after each one. Resumes from `state`'s last generation
/// if it has one. Scoring is delegated to `evaluator` so the loop body
/// itself never touches MIDI or audio hardware directly.
pub fn run_with(
    state: &mut State,
    cfg: &GenerationLoopConfig,
    format: AudioFormat,
    statefile: &Path,
    rng: &mut impl Rng,
    mut evaluator: impl Evaluator,
) -> Result<()> {
    let mut current = seed_generation(state, cfg);

    loop {
        if !(cfg.max_generations <= 0 || current.number < cfg.max_generations) {
            break;
        }
        let last_gen = current;
        let mut gen = Generation {
            number: last_gen.number + 1,
            patches: reproduce(&last_gen, cfg, rng),
        };

        log::info!("running generation {}", gen.number);
        for individual in &mut gen.patches {
            individual.patch = mutate(&individual.patch, cfg.mutation_rate, rng);
        }
        rename(&mut gen);

        evaluator.evaluate(&mut gen, &state.source_audio, format)?;

        debug_assert_eq!(gen.patches.len(), cfg.population, "generation invariant |Patches| == P");

        state.generations.push(gen.clone());
        state.save(statefile);

        let threshold_met = gen.patches.iter().any(|p| p.score > cfg.threshold);

        let mut survivors = gen;
        survivors.patches.retain(|p| !p.filtered && cfg.filter.admits(p.score));
        survivors.sort_by_score_desc();
        current = survivors;

        if threshold_met {
            break;
        }
    }
    Ok(())
}

/// Runs the loop against real MIDI/audio hardware via
/// [`evaluate_generation`] and `evaluator_cfg`.
pub fn run(
    state: &mut State,
    cfg: &GenerationLoopConfig,
    evaluator_cfg: &EvaluatorConfig,
    format: AudioFormat,
    statefile: &Path,
    rng: &mut impl Rng,
) -> Result<()> {
    run_with(state, cfg, format, statefile, rng, |gen: &mut Generation, reference: &[f32], format: AudioFormat| {
        evaluate_generation(gen, reference, format, evaluator_cfg)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::Patch;
    use rand::SeedableRng;

    fn scored(score: f64, filtered: bool) -> ScoredPatch {
        ScoredPatch { patch: Patch::default(), score, filtered, audio: Vec::new() }
    }

    #[test]
    fn score_filter_admits() {
        assert!(ScoreFilter::PassThrough.admits(0.0));
        assert!(!ScoreFilter::RejectZero.admits(0.0));
        assert!(ScoreFilter::RejectZero.admits(0.1));
    }

    #[test]
    fn seed_generation_starts_at_minus_one_when_empty() {
        let state = State::default();
        let cfg = GenerationLoopConfig {
            population: 4,
            elitism: 1,
            mutation_rate: 0.1,
            threshold: 1.0,
            max_generations: -1,
            filter: ScoreFilter::PassThrough,
        };
        let gen = seed_generation(&state, &cfg);
        assert_eq!(gen.number, -1);
        assert!(gen.patches.is_empty());
    }

    #[test]
    fn seed_generation_drops_filtered_and_sorts() {
        let mut state = State::default();
        state.generations.push(Generation {
            number: 0,
            patches: vec![scored(0.3, false), scored(0.9, true), scored(0.6, false)],
        });
        let cfg = GenerationLoopConfig {
            population: 4,
            elitism: 1,
            mutation_rate: 0.1,
            threshold: 1.0,
            max_generations: -1,
            filter: ScoreFilter::PassThrough,
        };
        let gen = seed_generation(&state, &cfg);
        assert_eq!(gen.patches.len(), 2);
        assert_eq!(gen.patches[0].score, 0.6);
    }

    #[test]
    fn reproduce_backfills_to_population_size() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(42);
        let last_gen = Generation { number: 0, patches: Vec::new() };
        let cfg = GenerationLoopConfig {
            population: 6,
            elitism: 2,
            mutation_rate: 0.1,
            threshold: 1.0,
            max_generations: -1,
            filter: ScoreFilter::PassThrough,
        };
        let patches = reproduce(&last_gen, &cfg, &mut rng);
        assert_eq!(patches.len(), 6);
    }

    #[test]
    fn rename_assigns_structured_names() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(1);
        let mut gen = Generation {
            number: 3,
            patches: vec![ScoredPatch { patch: Patch::random(&mut rng), ..Default::default() }],
        };
        rename(&mut gen);
        assert_eq!(gen.patches[0].patch.perf_common.name, "G3P0");
        assert_eq!(gen.patches[0].patch.voices[0].common.name, "G3P0V1");
        assert_eq!(gen.patches[0].patch.fseq.header.name, "G3P0");
    }
}
