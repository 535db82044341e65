//! The genetic operator layer: field-level mutation (delegated to the
//! patch types themselves) and byte-level crossover with structural
//! repair.

use anyhow::Result;
use rand::Rng;

use crate::codec::{FSEQ_HEADER_LEN, FSEQ_FRAME_LEN, PERF_COMMON_LEN, VOICE_LEN};
use crate::patch::Patch;

/// Offset of `PerfCommon::fseq_part` within the concatenated, envelope-free
/// patch body: 12 (name) + 2 (reserved) + 1 (category) + 1 (reserved) + 1
/// (perf_vol) + 1 (perf_pan) + 1 (perf_note_shift) + 2 (reserved) = 21.
const FSEQ_PART_OFFSET: usize = 0x15;

/// Offset of the FSEQ header's `FrameDataFormat` byte within the
/// concatenated body, once a PerfCommon and all four voices precede it.
const FSEQ_CROSSOVER_POINT: usize = PERF_COMMON_LEN + VOICE_LEN * 4 + 27;

const NO_FSEQ_LEN: usize = PERF_COMMON_LEN + VOICE_LEN * 4;

/// Draws a uniformly random patch — `Patch::mutate` applied to the
/// zero-valued patch at probability 1.
pub fn random_patch(rng: &mut impl Rng) -> Patch {
    Patch::random(rng)
}

/// Applies the mutation operator to every leaf field of `patch`.
pub fn mutate(patch: &Patch, pm: f64, rng: &mut impl Rng) -> Patch {
    patch.mutate(pm, rng)
}

/// Splices two parents at a single byte offset drawn uniformly from
/// `[0, min(|a|, |b|))` and repairs the FSEQ presence/length mismatch that
/// results when the parents disagree on whether a formant sequence is
/// active. Returns `None` for a child whose spliced bytes fail to decode
/// back into a valid patch — crossover must never hand the evaluator
/// corrupt data.
pub fn crossover(a: &Patch, b: &Patch, rng: &mut impl Rng) -> (Option<Patch>, Option<Patch>) {
    let bytes_a = a.encode_body();
    let bytes_b = b.encode_body();
    let num_parts_a = if a.perf_common.fseq_part != 0 { 6 } else { 5 };
    let num_parts_b = if b.perf_common.fseq_part != 0 { 6 } else { 5 };

    let shortest = bytes_a.len().min(bytes_b.len());
    let longest = bytes_a.len().max(bytes_b.len());
    let point = if shortest == 0 { 0 } else { rng.gen_range(0..shortest) };

    let mut child1 = Vec::with_capacity(longest);
    let mut child2 = Vec::with_capacity(longest);
    for i in 0..longest {
        if i < point {
            if let Some(&byte) = bytes_a.get(i) {
                child1.push(byte);
            }
            if let Some(&byte) = bytes_b.get(i) {
                child2.push(byte);
            }
        } else {
            if let Some(&byte) = bytes_b.get(i) {
                child1.push(byte);
            }
            if let Some(&byte) = bytes_a.get(i) {
                child2.push(byte);
            }
        }
    }

    if bytes_a.len() != bytes_b.len() {
        adjust_internals(num_parts_b, &mut child1, rng);
        adjust_internals(num_parts_a, &mut child2, rng);
    }

    (decode_child(&child1).ok(), decode_child(&child2).ok())
}

fn decode_child(body: &[u8]) -> Result<Patch> {
    let mut messages = Vec::new();
    let pc_end = PERF_COMMON_LEN.min(body.len());
    messages.extend(crate::codec::envelope(crate::codec::PERF_COMMON_ADDR, &body[..pc_end]));

    let mut offset = pc_end;
    for addr in crate::codec::VOICE_ADDR {
        let start = offset.min(body.len());
        let end = (start + VOICE_LEN).min(body.len());
        messages.extend(crate::codec::envelope(addr, &body[start..end]));
        offset = start + VOICE_LEN;
    }

    let fseq_start = offset.min(body.len());
    if fseq_start < body.len() {
        messages.extend(crate::codec::envelope(crate::codec::FSEQ_ADDR, &body[fseq_start..]));
    }
    Patch::decode_messages(&messages)
}

/// Reconciles a spliced buffer's declared part count with its actual
/// length: when the target has no FSEQ, the buffer is truncated and
/// `fseq_part` zeroed; when it does,
/// a fresh nonzero `fseq_part` is chosen and the FSEQ header's
/// `FrameDataFormat` byte is recomputed from the surviving frame bytes.
fn adjust_internals(num_parts: usize, buf: &mut Vec<u8>, rng: &mut impl Rng) {
    debug_assert!(num_parts >= 5, "not enough parts for a full performance");

    let no_fseq = num_parts == 5 || buf.len() == NO_FSEQ_LEN || buf.get(FSEQ_PART_OFFSET) == Some(&0);
    if no_fseq {
        if let Some(slot) = buf.get_mut(FSEQ_PART_OFFSET) {
            *slot = 0;
        }
        buf.truncate(NO_FSEQ_LEN);
        return;
    }

    if num_parts == 6 {
        if buf.get(FSEQ_PART_OFFSET) != Some(&0) {
            if let Some(slot) = buf.get_mut(FSEQ_PART_OFFSET) {
                *slot = rng.gen_range(0..5);
            }
        }
        if buf.len() < NO_FSEQ_LEN {
            buf.resize(NO_FSEQ_LEN, 0);
        }
        let tail = buf.len() - NO_FSEQ_LEN;
        let fseq_bytes = tail.saturating_sub(FSEQ_HEADER_LEN);
        let frame_count = fseq_bytes / FSEQ_FRAME_LEN;
        let frame_data_format = (frame_count / 128).saturating_sub(1);
        if let Some(slot) = buf.get_mut(FSEQ_CROSSOVER_POINT) {
            *slot = frame_data_format as u8;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn crossover_never_panics_and_drops_corrupt_children() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);
        let a = Patch::random(&mut rng);
        let b = Patch::random(&mut rng);
        let (c1, c2) = crossover(&a, &b, &mut rng);
        // Whatever survives must be internally consistent: re-encoding and
        // re-decoding it must reproduce the same bytes.
        for child in [c1, c2].into_iter().flatten() {
            let sysex = child.to_sysex();
            let redecoded = Patch::decode_messages(&sysex).expect("decoded child re-decodes");
            assert_eq!(redecoded.to_sysex(), sysex);
        }
    }

    #[test]
    fn crossover_with_matching_fseq_presence_preserves_length() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(11);
        let mut a = Patch::random(&mut rng);
        let mut b = Patch::random(&mut rng);
        a.perf_common.fseq_part = 0;
        b.perf_common.fseq_part = 0;
        let (c1, c2) = crossover(&a, &b, &mut rng);
        assert!(c1.is_some());
        assert!(c2.is_some());
    }
}
