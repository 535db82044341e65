//! The optional formant-sequence block: a 32-byte header followed by
//! `(FrameDataFormat + 1) * 128` 50-byte frames.

use anyhow::Result;
use rand::Rng;

use crate::codec::{BitReader, BitWriter};
use crate::patch::fields::{mutate_i14, mutate_u8};

#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct FseqHeader {
    pub name: String,
    pub start_step_loop_point: i16,
    pub end_step_loop_point: i16,
    pub loop_mode: u8,
    pub speed_adjust: u8,
    pub tempo_velocity_sens: u8,
    pub formant_pitch_mode: u8,
    pub formant_note_assign: u8,
    pub formant_pitch_tuning: u8,
    pub formant_sequence_delay: u8,
    pub frame_data_format: u8,
    pub end_step_valid_data: i16,
}

impl FseqHeader {
    pub fn encode(&self, w: &mut BitWriter) {
        w.write_str(&self.name, 8);
        w.write_reserved(8);
        w.write_i14(self.start_step_loop_point);
        w.write_i14(self.end_step_loop_point);
        w.write_u8(self.loop_mode);
        w.write_u8(self.speed_adjust);
        w.write_u8(self.tempo_velocity_sens);
        w.write_u8(self.formant_pitch_mode);
        w.write_u8(self.formant_note_assign);
        w.write_u8(self.formant_pitch_tuning);
        w.write_u8(self.formant_sequence_delay);
        w.write_u8(self.frame_data_format);
        w.write_reserved(2);
        w.write_i14(self.end_step_valid_data);
    }

    pub fn decode(r: &mut BitReader) -> Result<Self> {
        let name = r.read_str(8)?;
        r.read_reserved(8)?;
        let start_step_loop_point = r.read_i14()?;
        let end_step_loop_point = r.read_i14()?;
        let loop_mode = r.read_u8()?;
        let speed_adjust = r.read_u8()?;
        let tempo_velocity_sens = r.read_u8()?;
        let formant_pitch_mode = r.read_u8()?;
        let formant_note_assign = r.read_u8()?;
        let formant_pitch_tuning = r.read_u8()?;
        let formant_sequence_delay = r.read_u8()?;
        let frame_data_format = r.read_u8()?;
        r.read_reserved(2)?;
        let end_step_valid_data = r.read_i14()?;
        Ok(Self {
            name,
            start_step_loop_point,
            end_step_loop_point,
            loop_mode,
            speed_adjust,
            tempo_velocity_sens,
            formant_pitch_mode,
            formant_note_assign,
            formant_pitch_tuning,
            formant_sequence_delay,
            frame_data_format,
            end_step_valid_data,
        })
    }

    pub fn mutate(&self, pm: f64, rng: &mut impl Rng) -> Self {
        Self {
            name: String::new(),
            start_step_loop_point: mutate_i14(rng, pm, self.start_step_loop_point),
            end_step_loop_point: mutate_i14(rng, pm, self.end_step_loop_point),
            loop_mode: mutate_u8(rng, pm, self.loop_mode, 0, 1),
            speed_adjust: mutate_u8(rng, pm, self.speed_adjust, 0, 0x7f),
            tempo_velocity_sens: mutate_u8(rng, pm, self.tempo_velocity_sens, 0, 7),
            formant_pitch_mode: mutate_u8(rng, pm, self.formant_pitch_mode, 0, 1),
            formant_note_assign: mutate_u8(rng, pm, self.formant_note_assign, 0, 0x7f),
            formant_pitch_tuning: mutate_u8(rng, pm, self.formant_pitch_tuning, 0, 0x7e),
            formant_sequence_delay: mutate_u8(rng, pm, self.formant_sequence_delay, 0, 0x63),
            frame_data_format: mutate_u8(rng, pm, self.frame_data_format, 0, 3),
            end_step_valid_data: mutate_i14(rng, pm, self.end_step_valid_data),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct FseqFrame {
    pub fundamental_hi: u8,
    pub fundamental_lo: u8,
    pub voiced_formant_freq_hi: [u8; 8],
    pub voiced_formant_freq_lo: [u8; 8],
    pub voiced_formant_lvl: [u8; 8],
    pub unvoiced_formant_freq_hi: [u8; 8],
    pub unvoiced_formant_freq_lo: [u8; 8],
    pub unvoiced_formant_lvl: [u8; 8],
}

impl FseqFrame {
    pub fn encode(&self, w: &mut BitWriter) {
        w.write_u8(self.fundamental_hi);
        w.write_u8(self.fundamental_lo);
        for v in self.voiced_formant_freq_hi {
            w.write_u8(v);
        }
        for v in self.voiced_formant_freq_lo {
            w.write_u8(v);
        }
        for v in self.voiced_formant_lvl {
            w.write_u8(v);
        }
        for v in self.unvoiced_formant_freq_hi {
            w.write_u8(v);
        }
        for v in self.unvoiced_formant_freq_lo {
            w.write_u8(v);
        }
        for v in self.unvoiced_formant_lvl {
            w.write_u8(v);
        }
    }

    pub fn decode(r: &mut BitReader) -> Result<Self> {
        let fundamental_hi = r.read_u8()?;
        let fundamental_lo = r.read_u8()?;
        let mut read8 = |r: &mut BitReader| -> Result<[u8; 8]> {
            let mut out = [0u8; 8];
            for o in out.iter_mut() {
                *o = r.read_u8()?;
            }
            Ok(out)
        };
        let voiced_formant_freq_hi = read8(r)?;
        let voiced_formant_freq_lo = read8(r)?;
        let voiced_formant_lvl = read8(r)?;
        let unvoiced_formant_freq_hi = read8(r)?;
        let unvoiced_formant_freq_lo = read8(r)?;
        let unvoiced_formant_lvl = read8(r)?;
        Ok(Self {
            fundamental_hi,
            fundamental_lo,
            voiced_formant_freq_hi,
            voiced_formant_freq_lo,
            voiced_formant_lvl,
            unvoiced_formant_freq_hi,
            unvoiced_formant_freq_lo,
            unvoiced_formant_lvl,
        })
    }

    pub fn mutate(&self, pm: f64, rng: &mut impl Rng) -> Self {
        fn arr8(rng: &mut impl Rng, pm: f64, cur: [u8; 8]) -> [u8; 8] {
            let mut out = cur;
            for v in out.iter_mut() {
                *v = mutate_u8(rng, pm, *v, 0, 0x7f);
            }
            out
        }
        Self {
            fundamental_hi: mutate_u8(rng, pm, self.fundamental_hi, 0, 0x7f),
            fundamental_lo: mutate_u8(rng, pm, self.fundamental_lo, 0, 0x7f),
            voiced_formant_freq_hi: arr8(rng, pm, self.voiced_formant_freq_hi),
            voiced_formant_freq_lo: arr8(rng, pm, self.voiced_formant_freq_lo),
            voiced_formant_lvl: arr8(rng, pm, self.voiced_formant_lvl),
            unvoiced_formant_freq_hi: arr8(rng, pm, self.unvoiced_formant_freq_hi),
            unvoiced_formant_freq_lo: arr8(rng, pm, self.unvoiced_formant_freq_lo),
            unvoiced_formant_lvl: arr8(rng, pm, self.unvoiced_formant_lvl),
        }
    }
}

/// The formant sequence block. Always present in memory; whether it is
/// ever emitted as a SysEx envelope is governed by
/// `PerfCommon::fseq_part`.
#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct Fseq {
    pub header: FseqHeader,
    pub frames: Vec<FseqFrame>,
}

impl Fseq {
    pub fn encode(&self, w: &mut BitWriter) {
        self.header.encode(w);
        for frame in &self.frames {
            frame.encode(w);
        }
    }

    pub fn decode(r: &mut BitReader) -> Result<Self> {
        let header = FseqHeader::decode(r)?;
        let frame_count = (header.frame_data_format as usize + 1) * 128;
        let mut frames = Vec::with_capacity(frame_count);
        for _ in 0..frame_count {
            frames.push(FseqFrame::decode(r)?);
        }
        Ok(Self { header, frames })
    }

    /// `(FrameDataFormat + 1) * 128` frames, reusing old frames modulo the
    /// old length when the format changes (or zero-valued seeds if there
    /// were none).
    pub fn mutate(&self, pm: f64, rng: &mut impl Rng) -> Self {
        let header = self.header.mutate(pm, rng);
        let frame_count = (header.frame_data_format as usize + 1) * 128;
        let mut frames = Vec::with_capacity(frame_count);
        for i in 0..frame_count {
            let seed = if self.frames.is_empty() {
                FseqFrame::default()
            } else {
                self.frames[i % self.frames.len()]
            };
            frames.push(seed.mutate(pm, rng));
        }
        Self { header, frames }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn header_round_trips() {
        let header = FseqHeader {
            name: "FSEQNAME".to_string(),
            start_step_loop_point: 12,
            end_step_loop_point: 34,
            loop_mode: 1,
            speed_adjust: 0x7f,
            tempo_velocity_sens: 7,
            formant_pitch_mode: 1,
            formant_note_assign: 0x7f,
            formant_pitch_tuning: 0x7e,
            formant_sequence_delay: 0x63,
            frame_data_format: 2,
            end_step_valid_data: 56,
        };
        let mut w = BitWriter::new();
        header.encode(&mut w);
        let bytes = w.into_bytes();
        let mut r = BitReader::new(&bytes);
        assert_eq!(FseqHeader::decode(&mut r).unwrap(), header);
    }

    #[test]
    fn header_mutate_bounds() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(0);
        for _ in 0..200 {
            let header = FseqHeader::default().mutate(1.0, &mut rng);
            assert!(header.loop_mode <= 1);
            assert!(header.frame_data_format <= 3);
            assert!(header.tempo_velocity_sens <= 7);
        }
    }

    #[test]
    fn frame_round_trips() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(1);
        let frame = FseqFrame::default().mutate(1.0, &mut rng);
        let mut w = BitWriter::new();
        frame.encode(&mut w);
        let bytes = w.into_bytes();
        let mut r = BitReader::new(&bytes);
        assert_eq!(FseqFrame::decode(&mut r).unwrap(), frame);
    }

    #[test]
    fn frame_mutate_bounds() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(2);
        for _ in 0..50 {
            let frame = FseqFrame::default().mutate(1.0, &mut rng);
            for v in frame.voiced_formant_freq_hi.iter().chain(frame.unvoiced_formant_lvl.iter()) {
                assert!(*v <= 0x7f);
            }
        }
    }

    #[test]
    fn fseq_frame_count_matches_frame_data_format() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(3);
        let fseq = Fseq::default().mutate(1.0, &mut rng);
        assert_eq!(fseq.frames.len(), (fseq.header.frame_data_format as usize + 1) * 128);

        let mut w = BitWriter::new();
        fseq.encode(&mut w);
        let bytes = w.into_bytes();
        let mut r = BitReader::new(&bytes);
        assert_eq!(Fseq::decode(&mut r).unwrap(), fseq);
    }
}
