//! The 400-byte performance-common block: EQ, effects routing, the four
//! `PerfPart`s, and the controller-source-switch bitmap.

use anyhow::Result;
use rand::Rng;

use crate::codec::{BitReader, BitWriter};
use crate::patch::fields::{mutate_bitmaps, mutate_i14, mutate_u8, Bitmaps};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct PerfPart {
    pub note_reserve: u8,
    pub voice_bank_number: u8,
    pub program_number: u8,
    pub rcv_channel_max: u8,
    pub rcv_channel: u8,
    pub mono_poly: u8,
    pub mono_priority: u8,
    pub filter_sw: u8,
    pub note_shift: u8,
    pub detune: u8,
    pub voiced_unvoiced_balance: u8,
    pub volume: u8,
    pub velocity_sense_depth: u8,
    pub velocity_sense_offset: u8,
    pub pan: u8,
    pub note_limit_low: u8,
    pub note_limit_high: u8,
    pub dry_level: u8,
    pub variation_send: u8,
    pub reverb_send: u8,
    pub insertion_switch: u8,
    pub lfo1_rate: u8,
    pub lfo1_pitch_mod_depth: u8,
    pub lfo1_delay: u8,
    pub filter_cutoff_freq: u8,
    pub filter_resonance: u8,
    pub eg_attack: u8,
    pub eg_decay: u8,
    pub eg_release: u8,
    pub format: u8,
    pub fm: u8,
    pub filter_eg_depth: u8,
    pub pitch_eg_init: u8,
    pub pitch_eg_attack: u8,
    pub pitch_eg_release_level: u8,
    pub pitch_eg_release_time: u8,
    pub portamento: u8,
    pub portamento_time: u8,
    pub pitch_bend_range_low: u8,
    pub pitch_bend_range_high: u8,
    pub pan_scaling: u8,
    pub pan_lfo_depth: u8,
    pub velo_limit_low: u8,
    pub velo_limit_high: u8,
    pub expression_low_limit: u8,
    pub sustain_rcv_sw: u8,
    pub lfo2_rate: u8,
    pub lfo2_mod_depth: u8,
}

impl PerfPart {
    pub fn encode(&self, w: &mut BitWriter) {
        w.write_u8(self.note_reserve);
        w.write_u8(self.voice_bank_number);
        w.write_u8(self.program_number);
        w.write_u8(self.rcv_channel_max);
        w.write_u8(self.rcv_channel);
        w.write_u8(self.mono_poly);
        w.write_u8(self.mono_priority);
        w.write_u8(self.filter_sw);
        w.write_u8(self.note_shift);
        w.write_u8(self.detune);
        w.write_u8(self.voiced_unvoiced_balance);
        w.write_u8(self.volume);
        w.write_u8(self.velocity_sense_depth);
        w.write_u8(self.velocity_sense_offset);
        w.write_u8(self.pan);
        w.write_u8(self.note_limit_low);
        w.write_u8(self.note_limit_high);
        w.write_u8(self.dry_level);
        w.write_u8(self.variation_send);
        w.write_u8(self.reverb_send);
        w.write_u8(self.insertion_switch);
        w.write_u8(self.lfo1_rate);
        w.write_u8(self.lfo1_pitch_mod_depth);
        w.write_u8(self.lfo1_delay);
        w.write_u8(self.filter_cutoff_freq);
        w.write_u8(self.filter_resonance);
        w.write_u8(self.eg_attack);
        w.write_u8(self.eg_decay);
        w.write_u8(self.eg_release);
        w.write_u8(self.format);
        w.write_u8(self.fm);
        w.write_u8(self.filter_eg_depth);
        w.write_u8(self.pitch_eg_init);
        w.write_u8(self.pitch_eg_attack);
        w.write_u8(self.pitch_eg_release_level);
        w.write_u8(self.pitch_eg_release_time);
        w.write_u8(self.portamento);
        w.write_u8(self.portamento_time);
        w.write_u8(self.pitch_bend_range_low);
        w.write_u8(self.pitch_bend_range_high);
        w.write_u8(self.pan_scaling);
        w.write_u8(self.pan_lfo_depth);
        w.write_u8(self.velo_limit_low);
        w.write_u8(self.velo_limit_high);
        w.write_u8(self.expression_low_limit);
        w.write_u8(self.sustain_rcv_sw);
        w.write_u8(self.lfo2_rate);
        w.write_u8(self.lfo2_mod_depth);
        w.write_reserved(4);
    }

    pub fn decode(r: &mut BitReader) -> Result<Self> {
        Ok(Self {
            note_reserve: r.read_u8()?,
            voice_bank_number: r.read_u8()?,
            program_number: r.read_u8()?,
            rcv_channel_max: r.read_u8()?,
            rcv_channel: r.read_u8()?,
            mono_poly: r.read_u8()?,
            mono_priority: r.read_u8()?,
            filter_sw: r.read_u8()?,
            note_shift: r.read_u8()?,
            detune: r.read_u8()?,
            voiced_unvoiced_balance: r.read_u8()?,
            volume: r.read_u8()?,
            velocity_sense_depth: r.read_u8()?,
            velocity_sense_offset: r.read_u8()?,
            pan: r.read_u8()?,
            note_limit_low: r.read_u8()?,
            note_limit_high: r.read_u8()?,
            dry_level: r.read_u8()?,
            variation_send: r.read_u8()?,
            reverb_send: r.read_u8()?,
            insertion_switch: r.read_u8()?,
            lfo1_rate: r.read_u8()?,
            lfo1_pitch_mod_depth: r.read_u8()?,
            lfo1_delay: r.read_u8()?,
            filter_cutoff_freq: r.read_u8()?,
            filter_resonance: r.read_u8()?,
            eg_attack: r.read_u8()?,
            eg_decay: r.read_u8()?,
            eg_release: r.read_u8()?,
            format: r.read_u8()?,
            fm: r.read_u8()?,
            filter_eg_depth: r.read_u8()?,
            pitch_eg_init: r.read_u8()?,
            pitch_eg_attack: r.read_u8()?,
            pitch_eg_release_level: r.read_u8()?,
            pitch_eg_release_time: r.read_u8()?,
            portamento: r.read_u8()?,
            portamento_time: r.read_u8()?,
            pitch_bend_range_low: r.read_u8()?,
            pitch_bend_range_high: r.read_u8()?,
            pan_scaling: r.read_u8()?,
            pan_lfo_depth: r.read_u8()?,
            velo_limit_low: r.read_u8()?,
            velo_limit_high: r.read_u8()?,
            expression_low_limit: r.read_u8()?,
            sustain_rcv_sw: r.read_u8()?,
            lfo2_rate: r.read_u8()?,
            lfo2_mod_depth: {
                let v = r.read_u8()?;
                r.read_reserved(4)?;
                v
            },
        })
    }

    pub fn mutate(&self, pm: f64, rng: &mut impl Rng) -> Self {
        Self {
            note_reserve: mutate_u8(rng, pm, self.note_reserve, 0, 0x20),
            voice_bank_number: mutate_u8(rng, pm, self.voice_bank_number, 1, 1),
            program_number: mutate_u8(rng, pm, self.program_number, 0, 0x7f),
            rcv_channel_max: mutate_u8(rng, pm, self.rcv_channel_max, 0x7f, 0x7f),
            rcv_channel: mutate_u8(rng, pm, self.rcv_channel, 0x10, 0x10),
            mono_poly: mutate_u8(rng, pm, self.mono_poly, 1, 1),
            mono_priority: mutate_u8(rng, pm, self.mono_priority, 0, 0x3),
            filter_sw: mutate_u8(rng, pm, self.filter_sw, 0, 0x1),
            note_shift: mutate_u8(rng, pm, self.note_shift, 0, 0x30),
            detune: mutate_u8(rng, pm, self.detune, 0, 0x7f),
            voiced_unvoiced_balance: mutate_u8(rng, pm, self.voiced_unvoiced_balance, 0, 0x7f),
            volume: mutate_u8(rng, pm, self.volume, 0, 0x7f),
            velocity_sense_depth: mutate_u8(rng, pm, self.velocity_sense_depth, 0, 0x7f),
            velocity_sense_offset: mutate_u8(rng, pm, self.velocity_sense_offset, 0, 0x7f),
            pan: mutate_u8(rng, pm, self.pan, 0, 0x7f),
            note_limit_low: mutate_u8(rng, pm, self.note_limit_low, 0, 0),
            note_limit_high: mutate_u8(rng, pm, self.note_limit_high, 0x7f, 0x7f),
            dry_level: mutate_u8(rng, pm, self.dry_level, 0, 0x7f),
            variation_send: mutate_u8(rng, pm, self.variation_send, 0, 0x7f),
            reverb_send: mutate_u8(rng, pm, self.reverb_send, 0, 0x7f),
            insertion_switch: mutate_u8(rng, pm, self.insertion_switch, 0, 0x1),
            lfo1_rate: mutate_u8(rng, pm, self.lfo1_rate, 0, 0x7f),
            lfo1_pitch_mod_depth: mutate_u8(rng, pm, self.lfo1_pitch_mod_depth, 0, 0x7f),
            lfo1_delay: mutate_u8(rng, pm, self.lfo1_delay, 0, 0x7f),
            filter_cutoff_freq: mutate_u8(rng, pm, self.filter_cutoff_freq, 0, 0x7f),
            filter_resonance: mutate_u8(rng, pm, self.filter_resonance, 0, 0x7f),
            eg_attack: mutate_u8(rng, pm, self.eg_attack, 0, 0x7f),
            eg_decay: mutate_u8(rng, pm, self.eg_decay, 0, 0x7f),
            eg_release: mutate_u8(rng, pm, self.eg_release, 0, 0x7f),
            format: mutate_u8(rng, pm, self.format, 0, 0x7f),
            fm: mutate_u8(rng, pm, self.fm, 0, 0x7f),
            filter_eg_depth: mutate_u8(rng, pm, self.filter_eg_depth, 0, 0x7f),
            pitch_eg_init: mutate_u8(rng, pm, self.pitch_eg_init, 0, 0x7f),
            pitch_eg_attack: mutate_u8(rng, pm, self.pitch_eg_attack, 0, 0x7f),
            pitch_eg_release_level: mutate_u8(rng, pm, self.pitch_eg_release_level, 0, 0x7f),
            pitch_eg_release_time: mutate_u8(rng, pm, self.pitch_eg_release_time, 0, 0x7f),
            portamento: mutate_u8(rng, pm, self.portamento, 0, 0x3),
            portamento_time: mutate_u8(rng, pm, self.portamento_time, 0, 0x7f),
            pitch_bend_range_low: mutate_u8(rng, pm, self.pitch_bend_range_low, 0x10, 0x58),
            pitch_bend_range_high: mutate_u8(rng, pm, self.pitch_bend_range_high, 0x10, 0x58),
            pan_scaling: mutate_u8(rng, pm, self.pan_scaling, 0, 0x64),
            pan_lfo_depth: mutate_u8(rng, pm, self.pan_lfo_depth, 0, 0x63),
            velo_limit_low: mutate_u8(rng, pm, self.velo_limit_low, 0x1, 0x7f),
            velo_limit_high: mutate_u8(rng, pm, self.velo_limit_high, 0x1, 0x7f),
            expression_low_limit: mutate_u8(rng, pm, self.expression_low_limit, 0, 0x7f),
            sustain_rcv_sw: mutate_u8(rng, pm, self.sustain_rcv_sw, 0, 0x1),
            lfo2_rate: mutate_u8(rng, pm, self.lfo2_rate, 0, 0x7f),
            lfo2_mod_depth: mutate_u8(rng, pm, self.lfo2_mod_depth, 0, 0x7f),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct PerfCommon {
    pub name: String,
    pub category: u8,
    pub perf_vol: u8,
    pub perf_pan: u8,
    pub perf_note_shift: u8,
    pub fseq_part: u8,
    pub fseq_bank: u8,
    pub fseq_speed_ratio: i16,
    pub fseq_start_step_offset: [u8; 2],
    pub fseq_start_step_loop_point: [u8; 2],
    pub fseq_end_step_loop_point: [u8; 2],
    pub fseq_loop_mode: u8,
    pub fseq_play_mode: u8,
    pub fseq_velocity_sensitivity: u8,
    pub fseq_formant_pitch_mode: u8,
    pub fseq_key_on_trigger: u8,
    pub fseq_formant_sequence_delay: u8,
    pub fseq_level_velocity_sensitivity: u8,
    pub controller_part_switches: [u8; 8],
    pub controller_source_switch_bitmaps: Bitmaps,
    pub controller_destinations: [u8; 8],
    pub controller_depths: [u8; 8],
    pub reverb_parameters: [u8; 24],
    pub variation_parameters: [u8; 32],
    pub insertion_parameters: [u8; 32],
    pub reverb_type: u8,
    pub reverb_pan: u8,
    pub reverb_return: u8,
    pub variation_type: u8,
    pub variation_pan: u8,
    pub variation_return: u8,
    pub variation_send_reverb: u8,
    pub insertion_type: u8,
    pub insertion_pan: u8,
    pub insertion_send_reverb: u8,
    pub insertion_send_variation: u8,
    pub insertion_level: u8,
    pub eq_low_gain: u8,
    pub eq_low_freq: u8,
    pub eq_low_q: u8,
    pub eq_low_shape: u8,
    pub eq_mid_gain: u8,
    pub eq_mid_freq: u8,
    pub eq_mid_q: u8,
    pub eq_high_gain: u8,
    pub eq_high_freq: u8,
    pub eq_high_q: u8,
    pub eq_high_shape: u8,
    pub parts: [PerfPart; 4],
}

impl PerfCommon {
    pub fn encode(&self, w: &mut BitWriter) {
        w.write_str(&self.name, 12);
        w.write_reserved(2);
        w.write_u8(self.category);
        w.write_reserved(1);
        w.write_u8(self.perf_vol);
        w.write_u8(self.perf_pan);
        w.write_u8(self.perf_note_shift);
        w.write_reserved(2);
        w.write_u8(self.fseq_part);
        w.write_u8(self.fseq_bank);
        w.write_reserved(1);
        w.write_i14(self.fseq_speed_ratio);
        for v in self.fseq_start_step_offset {
            w.write_u8(v);
        }
        for v in self.fseq_start_step_loop_point {
            w.write_u8(v);
        }
        for v in self.fseq_end_step_loop_point {
            w.write_u8(v);
        }
        w.write_u8(self.fseq_loop_mode);
        w.write_u8(self.fseq_play_mode);
        w.write_u8(self.fseq_velocity_sensitivity);
        w.write_u8(self.fseq_formant_pitch_mode);
        w.write_u8(self.fseq_key_on_trigger);
        w.write_reserved(1);
        w.write_u8(self.fseq_formant_sequence_delay);
        w.write_u8(self.fseq_level_velocity_sensitivity);
        for v in self.controller_part_switches {
            w.write_u8(v);
        }
        for row in self.controller_source_switch_bitmaps {
            for cell in row {
                w.write_u8(cell);
            }
        }
        for v in self.controller_destinations {
            w.write_u8(v);
        }
        for v in self.controller_depths {
            w.write_u8(v);
        }
        for v in self.reverb_parameters {
            w.write_u8(v);
        }
        for v in self.variation_parameters {
            w.write_u8(v);
        }
        for v in self.insertion_parameters {
            w.write_u8(v);
        }
        w.write_u8(self.reverb_type);
        w.write_u8(self.reverb_pan);
        w.write_u8(self.reverb_return);
        w.write_u8(self.variation_type);
        w.write_u8(self.variation_pan);
        w.write_u8(self.variation_return);
        w.write_u8(self.variation_send_reverb);
        w.write_u8(self.insertion_type);
        w.write_u8(self.insertion_pan);
        w.write_u8(self.insertion_send_reverb);
        w.write_u8(self.insertion_send_variation);
        w.write_u8(self.insertion_level);
        w.write_u8(self.eq_low_gain);
        w.write_u8(self.eq_low_freq);
        w.write_u8(self.eq_low_q);
        w.write_u8(self.eq_low_shape);
        w.write_u8(self.eq_mid_gain);
        w.write_u8(self.eq_mid_freq);
        w.write_u8(self.eq_mid_q);
        w.write_u8(self.eq_high_gain);
        w.write_u8(self.eq_high_freq);
        w.write_u8(self.eq_high_q);
        w.write_u8(self.eq_high_shape);
        w.write_reserved(1);
        for part in &self.parts {
            part.encode(w);
        }
    }

    pub fn decode(r: &mut BitReader) -> Result<Self> {
        let name = r.read_str(12)?;
        r.read_reserved(2)?;
        let category = r.read_u8()?;
        r.read_reserved(1)?;
        let perf_vol = r.read_u8()?;
        let perf_pan = r.read_u8()?;
        let perf_note_shift = r.read_u8()?;
        r.read_reserved(2)?;
        let fseq_part = r.read_u8()?;
        let fseq_bank = r.read_u8()?;
        r.read_reserved(1)?;
        let fseq_speed_ratio = r.read_i14()?;
        let mut fseq_start_step_offset = [0u8; 2];
        for v in fseq_start_step_offset.iter_mut() {
            *v = r.read_u8()?;
        }
        let mut fseq_start_step_loop_point = [0u8; 2];
        for v in fseq_start_step_loop_point.iter_mut() {
            *v = r.read_u8()?;
        }
        let mut fseq_end_step_loop_point = [0u8; 2];
        for v in fseq_end_step_loop_point.iter_mut() {
            *v = r.read_u8()?;
        }
        let fseq_loop_mode = r.read_u8()?;
        let fseq_play_mode = r.read_u8()?;
        let fseq_velocity_sensitivity = r.read_u8()?;
        let fseq_formant_pitch_mode = r.read_u8()?;
        let fseq_key_on_trigger = r.read_u8()?;
        r.read_reserved(1)?;
        let fseq_formant_sequence_delay = r.read_u8()?;
        let fseq_level_velocity_sensitivity = r.read_u8()?;
        let mut controller_part_switches = [0u8; 8];
        for v in controller_part_switches.iter_mut() {
            *v = r.read_u8()?;
        }
        let mut controller_source_switch_bitmaps: Bitmaps = Default::default();
        for row in controller_source_switch_bitmaps.iter_mut() {
            for cell in row.iter_mut() {
                *cell = r.read_u8()?;
            }
        }
        let mut controller_destinations = [0u8; 8];
        for v in controller_destinations.iter_mut() {
            *v = r.read_u8()?;
        }
        let mut controller_depths = [0u8; 8];
        for v in controller_depths.iter_mut() {
            *v = r.read_u8()?;
        }
        let mut reverb_parameters = [0u8; 24];
        for v in reverb_parameters.iter_mut() {
            *v = r.read_u8()?;
        }
        let mut variation_parameters = [0u8; 32];
        for v in variation_parameters.iter_mut() {
            *v = r.read_u8()?;
        }
        let mut insertion_parameters = [0u8; 32];
        for v in insertion_parameters.iter_mut() {
            *v = r.read_u8()?;
        }
        let reverb_type = r.read_u8()?;
        let reverb_pan = r.read_u8()?;
        let reverb_return = r.read_u8()?;
        let variation_type = r.read_u8()?;
        let variation_pan = r.read_u8()?;
        let variation_return = r.read_u8()?;
        let variation_send_reverb = r.read_u8()?;
        let insertion_type = r.read_u8()?;
        let insertion_pan = r.read_u8()?;
        let insertion_send_reverb = r.read_u8()?;
        let insertion_send_variation = r.read_u8()?;
        let insertion_level = r.read_u8()?;
        let eq_low_gain = r.read_u8()?;
        let eq_low_freq = r.read_u8()?;
        let eq_low_q = r.read_u8()?;
        let eq_low_shape = r.read_u8()?;
        let eq_mid_gain = r.read_u8()?;
        let eq_mid_freq = r.read_u8()?;
        let eq_mid_q = r.read_u8()?;
        let eq_high_gain = r.read_u8()?;
        let eq_high_freq = r.read_u8()?;
        let eq_high_q = r.read_u8()?;
        let eq_high_shape = r.read_u8()?;
        r.read_reserved(1)?;
        let mut parts: [PerfPart; 4] = Default::default();
        for part in parts.iter_mut() {
            *part = PerfPart::decode(r)?;
        }
        Ok(Self {
            name,
            category,
            perf_vol,
            perf_pan,
            perf_note_shift,
            fseq_part,
            fseq_bank,
            fseq_speed_ratio,
            fseq_start_step_offset,
            fseq_start_step_loop_point,
            fseq_end_step_loop_point,
            fseq_loop_mode,
            fseq_play_mode,
            fseq_velocity_sensitivity,
            fseq_formant_pitch_mode,
            fseq_key_on_trigger,
            fseq_formant_sequence_delay,
            fseq_level_velocity_sensitivity,
            controller_part_switches,
            controller_source_switch_bitmaps,
            controller_destinations,
            controller_depths,
            reverb_parameters,
            variation_parameters,
            insertion_parameters,
            reverb_type,
            reverb_pan,
            reverb_return,
            variation_type,
            variation_pan,
            variation_return,
            variation_send_reverb,
            insertion_type,
            insertion_pan,
            insertion_send_reverb,
            insertion_send_variation,
            insertion_level,
            eq_low_gain,
            eq_low_freq,
            eq_low_q,
            eq_low_shape,
            eq_mid_gain,
            eq_mid_freq,
            eq_mid_q,
            eq_high_gain,
            eq_high_freq,
            eq_high_q,
            eq_high_shape,
            parts,
        })
    }

    pub fn mutate(&self, pm: f64, rng: &mut impl Rng) -> Self {
        let mut parts = self.parts;
        for (i, part) in parts.iter_mut().enumerate() {
            *part = part.mutate(pm, rng);
            part.program_number = i as u8;
        }
        Self {
            name: String::new(),
            category: mutate_u8(rng, pm, self.category, 0, 0x16),
            perf_vol: mutate_u8(rng, pm, self.perf_vol, 0x7f, 0x7f),
            perf_pan: mutate_u8(rng, pm, self.perf_pan, 0x1, 0x7f),
            perf_note_shift: mutate_u8(rng, pm, self.perf_note_shift, 0, 0x30),
            fseq_part: mutate_u8(rng, pm, self.fseq_part, 0, 0x4),
            fseq_bank: mutate_u8(rng, pm, self.fseq_bank, 0, 0),
            fseq_speed_ratio: mutate_i14(rng, pm, self.fseq_speed_ratio),
            fseq_start_step_offset: {
                let mut out = self.fseq_start_step_offset;
                for v in out.iter_mut() {
                    *v = mutate_u8(rng, pm, *v, 0, 0x7f);
                }
                out
            },
            fseq_start_step_loop_point: {
                let mut out = self.fseq_start_step_loop_point;
                for v in out.iter_mut() {
                    *v = mutate_u8(rng, pm, *v, 0, 0x7f);
                }
                out
            },
            fseq_end_step_loop_point: {
                let mut out = self.fseq_end_step_loop_point;
                for v in out.iter_mut() {
                    *v = mutate_u8(rng, pm, *v, 0, 0x7f);
                }
                out
            },
            fseq_loop_mode: mutate_u8(rng, pm, self.fseq_loop_mode, 0, 0x1),
            fseq_play_mode: mutate_u8(rng, pm, self.fseq_play_mode, 0x1, 0x2),
            fseq_velocity_sensitivity: mutate_u8(rng, pm, self.fseq_velocity_sensitivity, 0, 0x7),
            fseq_formant_pitch_mode: mutate_u8(rng, pm, self.fseq_formant_pitch_mode, 0, 0x1),
            fseq_key_on_trigger: mutate_u8(rng, pm, self.fseq_key_on_trigger, 0, 0x1),
            fseq_formant_sequence_delay: mutate_u8(rng, pm, self.fseq_formant_sequence_delay, 0, 0x63),
            fseq_level_velocity_sensitivity: mutate_u8(rng, pm, self.fseq_level_velocity_sensitivity, 0, 0x7f),
            controller_part_switches: {
                let mut out = self.controller_part_switches;
                for v in out.iter_mut() {
                    *v = mutate_u8(rng, pm, *v, 0, 0xf);
                }
                out
            },
            controller_source_switch_bitmaps: mutate_bitmaps(rng, pm, self.controller_source_switch_bitmaps),
            controller_destinations: {
                let mut out = self.controller_destinations;
                for v in out.iter_mut() {
                    *v = mutate_u8(rng, pm, *v, 0, 0x2f);
                }
                out
            },
            controller_depths: {
                let mut out = self.controller_depths;
                for v in out.iter_mut() {
                    *v = mutate_u8(rng, pm, *v, 0, 0x7f);
                }
                out
            },
            reverb_parameters: {
                let mut out = self.reverb_parameters;
                for v in out.iter_mut() {
                    *v = mutate_u8(rng, pm, *v, 0, 0x7f);
                }
                out
            },
            variation_parameters: {
                let mut out = self.variation_parameters;
                for v in out.iter_mut() {
                    *v = mutate_u8(rng, pm, *v, 0, 0x7f);
                }
                out
            },
            insertion_parameters: {
                let mut out = self.insertion_parameters;
                for v in out.iter_mut() {
                    *v = mutate_u8(rng, pm, *v, 0, 0x7f);
                }
                out
            },
            reverb_type: mutate_u8(rng, pm, self.reverb_type, 0, 0x10),
            reverb_pan: mutate_u8(rng, pm, self.reverb_pan, 0x1, 0x7f),
            reverb_return: mutate_u8(rng, pm, self.reverb_return, 0, 0x7f),
            variation_type: mutate_u8(rng, pm, self.variation_type, 0, 0x1c),
            variation_pan: mutate_u8(rng, pm, self.variation_pan, 0x1, 0x7f),
            variation_return: mutate_u8(rng, pm, self.variation_return, 0, 0x7f),
            variation_send_reverb: mutate_u8(rng, pm, self.variation_send_reverb, 0, 0x7f),
            insertion_type: mutate_u8(rng, pm, self.insertion_type, 0, 0x1c),
            insertion_pan: mutate_u8(rng, pm, self.insertion_pan, 0x1, 0x7f),
            insertion_send_reverb: mutate_u8(rng, pm, self.insertion_send_reverb, 0, 0x7f),
            insertion_send_variation: mutate_u8(rng, pm, self.insertion_send_variation, 0, 0x7f),
            insertion_level: mutate_u8(rng, pm, self.insertion_level, 0, 0x7f),
            eq_low_gain: mutate_u8(rng, pm, self.eq_low_gain, 0x34, 0x4c),
            eq_low_freq: mutate_u8(rng, pm, self.eq_low_freq, 0x04, 0x28),
            eq_low_q: mutate_u8(rng, pm, self.eq_low_q, 0x01, 0x78),
            eq_low_shape: mutate_u8(rng, pm, self.eq_low_shape, 0, 0x1),
            eq_mid_gain: mutate_u8(rng, pm, self.eq_mid_gain, 0x34, 0x4c),
            eq_mid_freq: mutate_u8(rng, pm, self.eq_mid_freq, 0xe, 0x36),
            eq_mid_q: mutate_u8(rng, pm, self.eq_mid_q, 0x01, 0x78),
            eq_high_gain: mutate_u8(rng, pm, self.eq_high_gain, 0x34, 0x4c),
            eq_high_freq: mutate_u8(rng, pm, self.eq_high_freq, 0x1c, 0x3a),
            eq_high_q: mutate_u8(rng, pm, self.eq_high_q, 0x01, 0x78),
            eq_high_shape: mutate_u8(rng, pm, self.eq_high_shape, 0, 0x1),
            parts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn perf_part_round_trips() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(0);
        let part = PerfPart::default().mutate(1.0, &mut rng);
        let mut w = BitWriter::new();
        part.encode(&mut w);
        let bytes = w.into_bytes();
        let mut r = BitReader::new(&bytes);
        assert_eq!(PerfPart::decode(&mut r).unwrap(), part);
    }

    #[test]
    fn perf_part_mutate_bounds() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(1);
        for _ in 0..200 {
            let part = PerfPart::default().mutate(1.0, &mut rng);
            assert!(part.mono_priority <= 0x3);
            assert!(part.program_number <= 0x7f);
            assert_eq!(part.voice_bank_number, 1);
            assert_eq!(part.rcv_channel_max, 0x7f);
        }
    }

    #[test]
    fn perf_common_round_trips() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(2);
        let common = PerfCommon::default().mutate(1.0, &mut rng);
        let mut w = BitWriter::new();
        common.encode(&mut w);
        let bytes = w.into_bytes();
        let mut r = BitReader::new(&bytes);
        assert_eq!(PerfCommon::decode(&mut r).unwrap(), common);
    }

    #[test]
    fn perf_common_mutate_bounds() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(3);
        for _ in 0..200 {
            let common = PerfCommon::default().mutate(1.0, &mut rng);
            assert!(common.category <= 0x16);
            assert!(common.fseq_part <= 0x4);
            for row in common.controller_source_switch_bitmaps.iter() {
                for cell in row.iter() {
                    assert!(*cell <= 0x7f);
                }
            }
        }
    }

    #[test]
    fn perf_common_mutate_repins_part_program_numbers() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(4);
        let common = PerfCommon::default().mutate(1.0, &mut rng);
        for (i, part) in common.parts.iter().enumerate() {
            assert_eq!(part.program_number, i as u8);
        }
    }
}
