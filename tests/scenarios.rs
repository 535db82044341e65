//! End-to-end scenarios exercising the codec, genetics, and scoring
//! modules together through the public API.

use fevolver::generation::{run_with, GenerationLoopConfig, ScoreFilter};
use fevolver::genetics::{crossover, random_patch};
use fevolver::scoring::score_recording;
use fevolver::state::{AudioFormat, Generation, State};
use fevolver::Patch;
use rand::SeedableRng;

/// S1: a seeded random patch, with its names overwritten, survives an
/// encode/decode round trip unchanged.
#[test]
fn s1_round_trip_random_patch() {
    let mut rng = rand::rngs::StdRng::seed_from_u64(0);
    let mut patch = Patch::random(&mut rng);
    patch.perf_common.name = "TESTPATCH".to_string();
    patch.fseq.header.name = "TESTFSEQ".to_string();
    for (i, voice) in patch.voices.iter_mut().enumerate() {
        voice.common.name = format!("TESTVOICE{}", i + 1);
    }

    let sysex = patch.to_sysex();
    let decoded = Patch::decode_messages(&sysex).expect("decode");
    assert_eq!(decoded.to_sysex(), sysex);
}

/// S2: every envelope in the encoded stream reduces to a zero checksum
/// and the stream contains 5 or 6 envelopes.
#[test]
fn s2_envelope_checksum() {
    let mut rng = rand::rngs::StdRng::seed_from_u64(0);
    let patch = Patch::random(&mut rng);
    let messages = patch.encode_messages();
    assert!(messages.len() == 5 || messages.len() == 6);

    for message in &messages {
        // size bytes through checksum byte: skip the 4-byte magic and
        // the trailing F7 terminator.
        let body = &message[4..message.len() - 1];
        let sum: u32 = body.iter().map(|&b| b as u32 & 0x7f).sum();
        assert_eq!(sum % 128, 0, "checksum does not reduce sum to 0 mod 128");
    }
}

/// S3: crossing over a no-FSEQ parent with a 128-frame FSEQ parent
/// yields children that are each internally consistent, one with and
/// one without an FSEQ block.
#[test]
fn s3_crossover_length_mismatch() {
    let mut rng = rand::rngs::StdRng::seed_from_u64(5);
    let mut a = random_patch(&mut rng);
    a.perf_common.fseq_part = 0;

    let mut b = random_patch(&mut rng);
    b.perf_common.fseq_part = 1;
    b.fseq.header.frame_data_format = 0;
    b.fseq.frames.resize(128, Default::default());

    let (c1, c2) = crossover(&a, &b, &mut rng);
    for child in [c1, c2].into_iter().flatten() {
        let sysex = child.to_sysex();
        let redecoded = Patch::decode_messages(&sysex).expect("child redecodes");
        assert_eq!(redecoded.to_sysex(), sysex);
        if child.perf_common.fseq_part != 0 {
            assert_eq!(child.fseq.frames.len(), (child.fseq.header.frame_data_format as usize + 1) * 128);
        }
    }
}

/// S4: mutating the zero patch at probability 1 keeps every field
/// within its declared domain.
#[test]
fn s4_mutation_bounds() {
    let mut rng = rand::rngs::StdRng::seed_from_u64(9);
    let patch = Patch::default().mutate(1.0, &mut rng);
    assert!(patch.perf_common.category <= 0x16);
    assert!(patch.fseq.header.frame_data_format <= 3);
    for (i, part) in patch.perf_common.parts.iter().enumerate() {
        assert_eq!(part.program_number, i as u8);
    }
}

/// S5: scoring identical non-silent recordings against each other
/// yields a perfect similarity score.
#[test]
fn s5_scoring_identity() {
    let sample_rate = 8000;
    let n = sample_rate as usize * 2;
    let mut stereo = Vec::with_capacity(n * 2);
    for i in 0..n {
        let s = ((i as f32) * 0.03).sin() * 0.7 + ((i as f32) * 0.11).cos() * 0.2;
        stereo.push(s);
        stereo.push(s * 0.9);
    }
    let (score, filtered) = score_recording(&stereo, &stereo, sample_rate);
    assert!(!filtered);
    assert!((score - 1.0).abs() < 1e-9);
}

/// Blanks the fields that `rename` overwrites every generation, so two
/// patches separated by a resume boundary can be compared on substance.
fn strip_generation_names(mut patch: Patch) -> Patch {
    patch.perf_common.name.clear();
    patch.fseq.header.name.clear();
    for voice in patch.voices.iter_mut() {
        voice.common.name.clear();
    }
    patch
}

/// S6: running the loop for two generations, checkpointing, then
/// resuming from that checkpoint continues generation numbering from
/// where it left off and keeps the pre-restart top scorer at position 0.
#[test]
fn s6_resume() {
    let format = AudioFormat { sample_rate: 8000, channels: 2 };
    let statefile =
        std::env::temp_dir().join(format!("fevolver-s6-resume-test-{}.bin", std::process::id()));
    let _ = std::fs::remove_file(&statefile);

    let mut rng = rand::rngs::StdRng::seed_from_u64(6);
    let mut state = State::default();
    state.format = Some(format);

    // Rank strictly by position: whichever individual already occupies
    // index 0 (the elite, once there is one) always scores highest, so
    // it is never displaced by crossover/backfill siblings. Mutation
    // rate 0 keeps every non-name field bit-identical across
    // generations, so the elite's substance can be tracked past rename.
    let score_by_position = |gen: &mut Generation, _reference: &[f32], _format: AudioFormat| -> anyhow::Result<()> {
        let n = gen.patches.len();
        for (i, individual) in gen.patches.iter_mut().enumerate() {
            individual.score = (n - i) as f64;
        }
        Ok(())
    };

    let cfg_first = GenerationLoopConfig {
        population: 4,
        elitism: 1,
        mutation_rate: 0.0,
        threshold: f64::INFINITY,
        max_generations: 1,
        filter: ScoreFilter::PassThrough,
    };
    run_with(&mut state, &cfg_first, format, &statefile, &mut rng, score_by_position).expect("first run");

    assert_eq!(state.generations.len(), 2, "max_generations=1 should complete generations 0 and 1");
    let pre_restart = state.last_generation().expect("a last generation exists");
    assert_eq!(pre_restart.number, 1);
    let pre_restart_elite = strip_generation_names(pre_restart.patches[0].patch.clone());

    let mut resumed_state = State::load(&statefile);
    let cfg_resume = GenerationLoopConfig { max_generations: 2, ..cfg_first };
    run_with(&mut resumed_state, &cfg_resume, format, &statefile, &mut rng, score_by_position).expect("resumed run");

    assert_eq!(resumed_state.generations.len(), 3, "resuming should add exactly one more generation");
    let resumed = resumed_state.last_generation().expect("a last generation exists");
    assert_eq!(resumed.number, 2, "generation numbering continues from 2");

    let resumed_elite = strip_generation_names(resumed.patches[0].patch.clone());
    assert_eq!(resumed_elite, pre_restart_elite, "the pre-restart elite is visible at position 0 after resume");

    let _ = std::fs::remove_file(&statefile);
}
