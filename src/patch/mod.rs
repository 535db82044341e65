//! The patch schema: a performance-common block, four voices, and an
//! optional formant sequence, plus the codec glue that turns a [`Patch`]
//! into a SysEx message stream and back.

pub mod fields;
pub mod fseq;
pub mod perf_common;
pub mod voice;

use anyhow::{anyhow, Result};
use rand::Rng;

use crate::codec::{self, envelope, split_one, BitReader, BitWriter};

pub use fseq::{Fseq, FseqFrame, FseqHeader};
pub use perf_common::{PerfCommon, PerfPart};
pub use voice::{FControlDest, UnvoicedOp, Voice, VoicedOp, VoiceCommon};

/// One complete patch: the receiving performance plus its four voices and
/// (optionally active) formant sequence.
#[derive(Debug, Clone, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub struct Patch {
    pub perf_common: PerfCommon,
    pub voices: [Voice; 4],
    pub fseq: Fseq,
}

impl Patch {
    /// The raw bytes of every block in declaration order, with envelopes
    /// stripped — what the genetic crossover operator splices.
    pub fn encode_body(&self) -> Vec<u8> {
        let mut w = BitWriter::new();
        self.perf_common.encode(&mut w);
        let mut body = w.into_bytes();
        for voice in &self.voices {
            let mut vw = BitWriter::new();
            voice.encode(&mut vw);
            body.extend(vw.into_bytes());
        }
        if self.perf_common.fseq_part != 0 {
            let mut fw = BitWriter::new();
            self.fseq.encode(&mut fw);
            body.extend(fw.into_bytes());
        }
        body
    }

    /// One SysEx envelope per block: PerfCommon, the four voices, and the
    /// FSEQ block if and only if `fseq_part != 0`.
    pub fn encode_messages(&self) -> Vec<Vec<u8>> {
        let mut out = Vec::with_capacity(6);
        let mut w = BitWriter::new();
        self.perf_common.encode(&mut w);
        out.push(envelope(codec::PERF_COMMON_ADDR, &w.into_bytes()));
        for (i, voice) in self.voices.iter().enumerate() {
            let mut vw = BitWriter::new();
            voice.encode(&mut vw);
            out.push(envelope(codec::VOICE_ADDR[i], &vw.into_bytes()));
        }
        if self.perf_common.fseq_part != 0 {
            let mut fw = BitWriter::new();
            self.fseq.encode(&mut fw);
            out.push(envelope(codec::FSEQ_ADDR, &fw.into_bytes()));
        }
        out
    }

    /// Concatenates [`encode_messages`](Self::encode_messages) into one
    /// transmittable SysEx byte stream.
    pub fn to_sysex(&self) -> Vec<u8> {
        self.encode_messages().into_iter().flatten().collect()
    }

    /// Parses a concatenated stream of SysEx envelopes back into a patch.
    /// Requires a PerfCommon block and all four voice blocks; the FSEQ
    /// block is optional and absent whenever `fseq_part == 0`.
    pub fn decode_messages(mut buf: &[u8]) -> Result<Self> {
        let mut perf_common = None;
        let mut voices: [Option<Voice>; 4] = [None, None, None, None];
        let mut fseq = Fseq::default();

        while !buf.is_empty() {
            let (env, rest) = split_one(buf)?;
            buf = rest;
            if env.addr == codec::PERF_COMMON_ADDR {
                let mut r = BitReader::new(&env.data);
                let pc = PerfCommon::decode(&mut r)?;
                r.finish()?;
                perf_common = Some(pc);
            } else if let Some(idx) = codec::VOICE_ADDR.iter().position(|&a| a == env.addr) {
                let mut r = BitReader::new(&env.data);
                let v = Voice::decode(&mut r)?;
                r.finish()?;
                voices[idx] = Some(v);
            } else if env.addr == codec::FSEQ_ADDR {
                let mut r = BitReader::new(&env.data);
                fseq = Fseq::decode(&mut r)?;
                r.finish()?;
            } else {
                return Err(anyhow!("unknown block address {:06x}", env.addr));
            }
        }

        let perf_common = perf_common.ok_or_else(|| anyhow!("missing PerfCommon block"))?;
        let mut resolved = Vec::with_capacity(4);
        for (i, v) in voices.into_iter().enumerate() {
            resolved.push(v.ok_or_else(|| anyhow!("missing voice {} block", i + 1))?);
        }
        let voices: [Voice; 4] = resolved
            .try_into()
            .map_err(|_| anyhow!("internal error: expected exactly 4 voices"))?;

        Ok(Self {
            perf_common,
            voices,
            fseq,
        })
    }

    /// Applies the field-level mutation operator to every leaf field. Each
    /// Part's `ProgramNumber` is re-pinned to its own index after
    /// mutation, and the FSEQ block is only re-mutated (rather than reset)
    /// when the mutated performance still routes through it.
    pub fn mutate(&self, pm: f64, rng: &mut impl Rng) -> Self {
        let perf_common = self.perf_common.mutate(pm, rng);
        let voices = [
            self.voices[0].mutate(pm, rng),
            self.voices[1].mutate(pm, rng),
            self.voices[2].mutate(pm, rng),
            self.voices[3].mutate(pm, rng),
        ];
        let fseq = if perf_common.fseq_part != 0 {
            self.fseq.mutate(pm, rng)
        } else {
            Fseq::default()
        };
        Self {
            perf_common,
            voices,
            fseq,
        }
    }

    /// A uniformly random patch: the all-zero patch mutated at probability 1.
    pub fn random(rng: &mut impl Rng) -> Self {
        Self::default().mutate(1.0, rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn random_patch_round_trips_through_sysex() {
        // Names are blanked (then space-padded) by mutation, so compare the
        // wire bytes rather than the structs: decoding and re-encoding must
        // reach a fixed point.
        let mut rng = rand::rngs::StdRng::seed_from_u64(0);
        let patch = Patch::random(&mut rng);
        let sysex = patch.to_sysex();
        let decoded = Patch::decode_messages(&sysex).expect("decode");
        assert_eq!(decoded.to_sysex(), sysex);
    }

    #[test]
    fn zero_fseq_part_omits_fseq_block() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(1);
        let mut patch = Patch::random(&mut rng);
        patch.perf_common.fseq_part = 0;
        let messages = patch.encode_messages();
        assert_eq!(messages.len(), 5, "PerfCommon + 4 voices, no FSEQ");
    }

    #[test]
    fn program_numbers_match_part_index_after_mutation() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(2);
        let patch = Patch::random(&mut rng);
        for (i, part) in patch.perf_common.parts.iter().enumerate() {
            assert_eq!(part.program_number, i as u8);
        }
    }
}
