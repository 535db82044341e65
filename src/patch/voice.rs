//! The four voice parameter blocks (`VoiceCommon` + 8 voiced + 8 unvoiced
//! operators each), addressed individually.

use anyhow::Result;
use rand::Rng;

use crate::codec::{BitReader, BitWriter};
use crate::patch::fields::mutate_u8;

/// One controller-routing slot: a 4-bit destination, a 1-bit operator-type
/// flag, and a 3-bit operator index, packed into a single byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct FControlDest {
    pub dest: u8,
    pub op_type: u8,
    pub op: u8,
}

impl FControlDest {
    pub fn encode(&self, w: &mut BitWriter) {
        w.write_bits(self.dest, 4);
        w.write_bits(self.op_type, 1);
        w.write_bits(self.op, 3);
    }

    pub fn decode(r: &mut BitReader) -> Result<Self> {
        let dest = r.read_bits(4)?;
        let op_type = r.read_bits(1)?;
        let op = r.read_bits(3)?;
        Ok(Self { dest, op_type, op })
    }

    pub fn mutate(&self, pm: f64, rng: &mut impl Rng) -> Self {
        Self {
            dest: mutate_u8(rng, pm, self.dest, 0, 0x3),
            op_type: mutate_u8(rng, pm, self.op_type, 0, 0x1),
            op: mutate_u8(rng, pm, self.op, 0, 0x7),
        }
    }
}

macro_rules! arr_encode {
    ($w:expr, $arr:expr) => {
        for v in $arr.iter() {
            v.encode($w);
        }
    };
}

macro_rules! arr_decode {
    ($r:expr, $n:expr, $t:ty) => {{
        let mut out: [$t; $n] = Default::default();
        for slot in out.iter_mut() {
            *slot = <$t>::decode($r)?;
        }
        out
    }};
}

macro_rules! arr_mutate {
    ($rng:expr, $pm:expr, $arr:expr) => {{
        let mut out = $arr;
        for v in out.iter_mut() {
            *v = v.mutate($pm, $rng);
        }
        out
    }};
}

#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct VoiceCommon {
    pub name: String,
    pub category: u8,
    pub lfo1_waveform: u8,
    pub lfo1_speed: u8,
    pub lfo1_delay: u8,
    pub lfo1_key_sync: u8,
    pub lfo1_pitch_mod_depth: u8,
    pub lfo1_amp_mod_depth: u8,
    pub lfo1_freq_mod_depth: u8,
    pub lfo2_waveform: u8,
    pub lfo2_speed: u8,
    pub lfo2_phase: u8,
    pub lfo2_key_sync: u8,
    pub note_shift: u8,
    pub pitch_eg_level1: u8,
    pub pitch_eg_level2: u8,
    pub pitch_eg_level3: u8,
    pub pitch_eg_level4: u8,
    pub pitch_eg_time1: u8,
    pub pitch_eg_time2: u8,
    pub pitch_eg_time3: u8,
    pub pitch_eg_time4: u8,
    pub pitch_eg_tvelo_sensitivity: u8,
    pub fseq_voiced_op_switch_hi: u8,
    pub fseq_voiced_op_switch_lo: u8,
    pub fseq_unvoiced_op_switch_hi: u8,
    pub fseq_unvoiced_op_switch_lo: u8,
    pub algo_preset: u8,
    pub voiced_op_carrier_level_correction: [u8; 8],
    pub pitch_eg_range: u8,
    pub pitch_eg_time_scale_depth: u8,
    pub voiced_feedback_lvl: u8,
    pub pitch_eg_lvl3: u8,
    pub formant_control_destination: [FControlDest; 5],
    pub formant_control_depth: [u8; 5],
    pub fm_control_destination: [FControlDest; 5],
    pub fm_control_depth: [u8; 5],
    pub filter_type: u8,
    pub filter_rez: u8,
    pub filter_rez_velo_sens: u8,
    pub filter_cutoff_freq: u8,
    pub filter_eg_depth_vel_sens: u8,
    pub filter_cutoff_freq_lfo1_depth: u8,
    pub filter_cutoff_freq_lfo2_depth: u8,
    pub filter_cutoff_freq_key_scale_depth: u8,
    pub filter_cutoff_freq_key_scale_point: u8,
    pub filter_input_gain: u8,
    pub filter_eg_depth: u8,
    pub filter_eg_lvl4: u8,
    pub filter_eg_lvl1: u8,
    pub filter_eg_lvl2: u8,
    pub filter_eg_lvl3: u8,
    pub filter_eg_time1: u8,
    pub filter_eg_time2: u8,
    pub filter_eg_time3: u8,
    pub filter_eg_time4: u8,
    pub filter_eg_attack_time_vel_time_scale: u8,
}

impl VoiceCommon {
    pub fn encode(&self, w: &mut BitWriter) {
        w.write_str(&self.name, 10);
        w.write_reserved(4);
        w.write_u8(self.category);
        w.write_reserved(1);
        w.write_u8(self.lfo1_waveform);
        w.write_u8(self.lfo1_speed);
        w.write_u8(self.lfo1_delay);
        w.write_u8(self.lfo1_key_sync);
        w.write_reserved(1);
        w.write_u8(self.lfo1_pitch_mod_depth);
        w.write_u8(self.lfo1_amp_mod_depth);
        w.write_u8(self.lfo1_freq_mod_depth);
        w.write_u8(self.lfo2_waveform);
        w.write_u8(self.lfo2_speed);
        w.write_reserved(2);
        w.write_u8(self.lfo2_phase);
        w.write_u8(self.lfo2_key_sync);
        w.write_u8(self.note_shift);
        w.write_u8(self.pitch_eg_level1);
        w.write_u8(self.pitch_eg_level2);
        w.write_u8(self.pitch_eg_level3);
        w.write_u8(self.pitch_eg_level4);
        w.write_u8(self.pitch_eg_time1);
        w.write_u8(self.pitch_eg_time2);
        w.write_u8(self.pitch_eg_time3);
        w.write_u8(self.pitch_eg_time4);
        w.write_u8(self.pitch_eg_tvelo_sensitivity);
        w.write_u8(self.fseq_voiced_op_switch_hi);
        w.write_u8(self.fseq_voiced_op_switch_lo);
        w.write_u8(self.fseq_unvoiced_op_switch_hi);
        w.write_u8(self.fseq_unvoiced_op_switch_lo);
        w.write_u8(self.algo_preset);
        for v in self.voiced_op_carrier_level_correction {
            w.write_u8(v);
        }
        w.write_reserved(6);
        w.write_u8(self.pitch_eg_range);
        w.write_u8(self.pitch_eg_time_scale_depth);
        w.write_u8(self.voiced_feedback_lvl);
        w.write_u8(self.pitch_eg_lvl3);
        w.write_reserved(1);
        arr_encode!(w, self.formant_control_destination);
        for v in self.formant_control_depth {
            w.write_u8(v);
        }
        arr_encode!(w, self.fm_control_destination);
        for v in self.fm_control_depth {
            w.write_u8(v);
        }
        w.write_u8(self.filter_type);
        w.write_u8(self.filter_rez);
        w.write_u8(self.filter_rez_velo_sens);
        w.write_u8(self.filter_cutoff_freq);
        w.write_u8(self.filter_eg_depth_vel_sens);
        w.write_u8(self.filter_cutoff_freq_lfo1_depth);
        w.write_u8(self.filter_cutoff_freq_lfo2_depth);
        w.write_u8(self.filter_cutoff_freq_key_scale_depth);
        w.write_u8(self.filter_cutoff_freq_key_scale_point);
        w.write_u8(self.filter_input_gain);
        w.write_reserved(6);
        w.write_u8(self.filter_eg_depth);
        w.write_u8(self.filter_eg_lvl4);
        w.write_u8(self.filter_eg_lvl1);
        w.write_u8(self.filter_eg_lvl2);
        w.write_u8(self.filter_eg_lvl3);
        w.write_u8(self.filter_eg_time1);
        w.write_u8(self.filter_eg_time2);
        w.write_u8(self.filter_eg_time3);
        w.write_u8(self.filter_eg_time4);
        w.write_reserved(1);
        w.write_u8(self.filter_eg_attack_time_vel_time_scale);
        w.write_reserved(1);
    }

    pub fn decode(r: &mut BitReader) -> Result<Self> {
        let name = r.read_str(10)?;
        r.read_reserved(4)?;
        let category = r.read_u8()?;
        r.read_reserved(1)?;
        let lfo1_waveform = r.read_u8()?;
        let lfo1_speed = r.read_u8()?;
        let lfo1_delay = r.read_u8()?;
        let lfo1_key_sync = r.read_u8()?;
        r.read_reserved(1)?;
        let lfo1_pitch_mod_depth = r.read_u8()?;
        let lfo1_amp_mod_depth = r.read_u8()?;
        let lfo1_freq_mod_depth = r.read_u8()?;
        let lfo2_waveform = r.read_u8()?;
        let lfo2_speed = r.read_u8()?;
        r.read_reserved(2)?;
        let lfo2_phase = r.read_u8()?;
        let lfo2_key_sync = r.read_u8()?;
        let note_shift = r.read_u8()?;
        let pitch_eg_level1 = r.read_u8()?;
        let pitch_eg_level2 = r.read_u8()?;
        let pitch_eg_level3 = r.read_u8()?;
        let pitch_eg_level4 = r.read_u8()?;
        let pitch_eg_time1 = r.read_u8()?;
        let pitch_eg_time2 = r.read_u8()?;
        let pitch_eg_time3 = r.read_u8()?;
        let pitch_eg_time4 = r.read_u8()?;
        let pitch_eg_tvelo_sensitivity = r.read_u8()?;
        let fseq_voiced_op_switch_hi = r.read_u8()?;
        let fseq_voiced_op_switch_lo = r.read_u8()?;
        let fseq_unvoiced_op_switch_hi = r.read_u8()?;
        let fseq_unvoiced_op_switch_lo = r.read_u8()?;
        let algo_preset = r.read_u8()?;
        let mut voiced_op_carrier_level_correction = [0u8; 8];
        for v in voiced_op_carrier_level_correction.iter_mut() {
            *v = r.read_u8()?;
        }
        r.read_reserved(6)?;
        let pitch_eg_range = r.read_u8()?;
        let pitch_eg_time_scale_depth = r.read_u8()?;
        let voiced_feedback_lvl = r.read_u8()?;
        let pitch_eg_lvl3 = r.read_u8()?;
        r.read_reserved(1)?;
        let formant_control_destination = arr_decode!(r, 5, FControlDest);
        let mut formant_control_depth = [0u8; 5];
        for v in formant_control_depth.iter_mut() {
            *v = r.read_u8()?;
        }
        let fm_control_destination = arr_decode!(r, 5, FControlDest);
        let mut fm_control_depth = [0u8; 5];
        for v in fm_control_depth.iter_mut() {
            *v = r.read_u8()?;
        }
        let filter_type = r.read_u8()?;
        let filter_rez = r.read_u8()?;
        let filter_rez_velo_sens = r.read_u8()?;
        let filter_cutoff_freq = r.read_u8()?;
        let filter_eg_depth_vel_sens = r.read_u8()?;
        let filter_cutoff_freq_lfo1_depth = r.read_u8()?;
        let filter_cutoff_freq_lfo2_depth = r.read_u8()?;
        let filter_cutoff_freq_key_scale_depth = r.read_u8()?;
        let filter_cutoff_freq_key_scale_point = r.read_u8()?;
        let filter_input_gain = r.read_u8()?;
        r.read_reserved(6)?;
        let filter_eg_depth = r.read_u8()?;
        let filter_eg_lvl4 = r.read_u8()?;
        let filter_eg_lvl1 = r.read_u8()?;
        let filter_eg_lvl2 = r.read_u8()?;
        let filter_eg_lvl3 = r.read_u8()?;
        let filter_eg_time1 = r.read_u8()?;
        let filter_eg_time2 = r.read_u8()?;
        let filter_eg_time3 = r.read_u8()?;
        let filter_eg_time4 = r.read_u8()?;
        r.read_reserved(1)?;
        let filter_eg_attack_time_vel_time_scale = r.read_u8()?;
        r.read_reserved(1)?;
        Ok(Self {
            name,
            category,
            lfo1_waveform,
            lfo1_speed,
            lfo1_delay,
            lfo1_key_sync,
            lfo1_pitch_mod_depth,
            lfo1_amp_mod_depth,
            lfo1_freq_mod_depth,
            lfo2_waveform,
            lfo2_speed,
            lfo2_phase,
            lfo2_key_sync,
            note_shift,
            pitch_eg_level1,
            pitch_eg_level2,
            pitch_eg_level3,
            pitch_eg_level4,
            pitch_eg_time1,
            pitch_eg_time2,
            pitch_eg_time3,
            pitch_eg_time4,
            pitch_eg_tvelo_sensitivity,
            fseq_voiced_op_switch_hi,
            fseq_voiced_op_switch_lo,
            fseq_unvoiced_op_switch_hi,
            fseq_unvoiced_op_switch_lo,
            algo_preset,
            voiced_op_carrier_level_correction,
            pitch_eg_range,
            pitch_eg_time_scale_depth,
            voiced_feedback_lvl,
            pitch_eg_lvl3,
            formant_control_destination,
            formant_control_depth,
            fm_control_destination,
            fm_control_depth,
            filter_type,
            filter_rez,
            filter_rez_velo_sens,
            filter_cutoff_freq,
            filter_eg_depth_vel_sens,
            filter_cutoff_freq_lfo1_depth,
            filter_cutoff_freq_lfo2_depth,
            filter_cutoff_freq_key_scale_depth,
            filter_cutoff_freq_key_scale_point,
            filter_input_gain,
            filter_eg_depth,
            filter_eg_lvl4,
            filter_eg_lvl1,
            filter_eg_lvl2,
            filter_eg_lvl3,
            filter_eg_time1,
            filter_eg_time2,
            filter_eg_time3,
            filter_eg_time4,
            filter_eg_attack_time_vel_time_scale,
        })
    }

    pub fn mutate(&self, pm: f64, rng: &mut impl Rng) -> Self {
        Self {
            name: String::new(),
            category: mutate_u8(rng, pm, self.category, 0, 0x16),
            lfo1_waveform: mutate_u8(rng, pm, self.lfo1_waveform, 0, 0x5),
            lfo1_speed: mutate_u8(rng, pm, self.lfo1_speed, 0, 0x63),
            lfo1_delay: mutate_u8(rng, pm, self.lfo1_delay, 0, 0x63),
            lfo1_key_sync: mutate_u8(rng, pm, self.lfo1_key_sync, 0, 0x1),
            lfo1_pitch_mod_depth: mutate_u8(rng, pm, self.lfo1_pitch_mod_depth, 0, 0x63),
            lfo1_amp_mod_depth: mutate_u8(rng, pm, self.lfo1_amp_mod_depth, 0, 0x63),
            lfo1_freq_mod_depth: mutate_u8(rng, pm, self.lfo1_freq_mod_depth, 0, 0x63),
            lfo2_waveform: mutate_u8(rng, pm, self.lfo2_waveform, 0, 0x5),
            lfo2_speed: mutate_u8(rng, pm, self.lfo2_speed, 0, 0x63),
            lfo2_phase: mutate_u8(rng, pm, self.lfo2_phase, 0, 0x3),
            lfo2_key_sync: mutate_u8(rng, pm, self.lfo2_key_sync, 0, 0x1),
            note_shift: mutate_u8(rng, pm, self.note_shift, 0, 0x30),
            pitch_eg_level1: mutate_u8(rng, pm, self.pitch_eg_level1, 0, 0x64),
            pitch_eg_level2: mutate_u8(rng, pm, self.pitch_eg_level2, 0, 0x64),
            pitch_eg_level3: mutate_u8(rng, pm, self.pitch_eg_level3, 0, 0x64),
            pitch_eg_level4: mutate_u8(rng, pm, self.pitch_eg_level4, 0, 0x64),
            pitch_eg_time1: mutate_u8(rng, pm, self.pitch_eg_time1, 0, 0x64),
            pitch_eg_time2: mutate_u8(rng, pm, self.pitch_eg_time2, 0, 0x64),
            pitch_eg_time3: mutate_u8(rng, pm, self.pitch_eg_time3, 0, 0x64),
            pitch_eg_time4: mutate_u8(rng, pm, self.pitch_eg_time4, 0, 0x64),
            pitch_eg_tvelo_sensitivity: mutate_u8(rng, pm, self.pitch_eg_tvelo_sensitivity, 0, 0x7),
            fseq_voiced_op_switch_hi: mutate_u8(rng, pm, self.fseq_voiced_op_switch_hi, 0, 0x1),
            fseq_voiced_op_switch_lo: mutate_u8(rng, pm, self.fseq_voiced_op_switch_lo, 0, 0x7f),
            fseq_unvoiced_op_switch_hi: mutate_u8(rng, pm, self.fseq_unvoiced_op_switch_hi, 0, 0x1),
            fseq_unvoiced_op_switch_lo: mutate_u8(rng, pm, self.fseq_unvoiced_op_switch_lo, 0, 0x7f),
            algo_preset: mutate_u8(rng, pm, self.algo_preset, 0, 0x57),
            voiced_op_carrier_level_correction: {
                let mut out = self.voiced_op_carrier_level_correction;
                for v in out.iter_mut() {
                    *v = mutate_u8(rng, pm, *v, 0, 0xf);
                }
                out
            },
            pitch_eg_range: mutate_u8(rng, pm, self.pitch_eg_range, 0, 0x3),
            pitch_eg_time_scale_depth: mutate_u8(rng, pm, self.pitch_eg_time_scale_depth, 0, 0x7),
            voiced_feedback_lvl: mutate_u8(rng, pm, self.voiced_feedback_lvl, 0, 0x7),
            pitch_eg_lvl3: mutate_u8(rng, pm, self.pitch_eg_lvl3, 0, 0x64),
            formant_control_destination: arr_mutate!(rng, pm, self.formant_control_destination),
            formant_control_depth: {
                let mut out = self.formant_control_depth;
                for v in out.iter_mut() {
                    *v = mutate_u8(rng, pm, *v, 0, 0x7f);
                }
                out
            },
            fm_control_destination: arr_mutate!(rng, pm, self.fm_control_destination),
            fm_control_depth: {
                let mut out = self.fm_control_depth;
                for v in out.iter_mut() {
                    *v = mutate_u8(rng, pm, *v, 0, 0x7f);
                }
                out
            },
            filter_type: mutate_u8(rng, pm, self.filter_type, 0, 0x5),
            filter_rez: mutate_u8(rng, pm, self.filter_rez, 0, 0x74),
            filter_rez_velo_sens: mutate_u8(rng, pm, self.filter_rez_velo_sens, 0, 0xe),
            filter_cutoff_freq: mutate_u8(rng, pm, self.filter_cutoff_freq, 0, 0x7f),
            filter_eg_depth_vel_sens: mutate_u8(rng, pm, self.filter_eg_depth_vel_sens, 0, 0x7f),
            filter_cutoff_freq_lfo1_depth: mutate_u8(rng, pm, self.filter_cutoff_freq_lfo1_depth, 0, 0x63),
            filter_cutoff_freq_lfo2_depth: mutate_u8(rng, pm, self.filter_cutoff_freq_lfo2_depth, 0, 0x63),
            filter_cutoff_freq_key_scale_depth: mutate_u8(rng, pm, self.filter_cutoff_freq_key_scale_depth, 0, 0x7f),
            filter_cutoff_freq_key_scale_point: mutate_u8(rng, pm, self.filter_cutoff_freq_key_scale_point, 0, 0x7f),
            filter_input_gain: mutate_u8(rng, pm, self.filter_input_gain, 0, 0x18),
            filter_eg_depth: mutate_u8(rng, pm, self.filter_eg_depth, 0, 0x7f),
            filter_eg_lvl4: mutate_u8(rng, pm, self.filter_eg_lvl4, 0, 0x64),
            filter_eg_lvl1: mutate_u8(rng, pm, self.filter_eg_lvl1, 0, 0x64),
            filter_eg_lvl2: mutate_u8(rng, pm, self.filter_eg_lvl2, 0, 0x64),
            filter_eg_lvl3: mutate_u8(rng, pm, self.filter_eg_lvl3, 0, 0x64),
            filter_eg_time1: mutate_u8(rng, pm, self.filter_eg_time1, 0, 0x64),
            filter_eg_time2: mutate_u8(rng, pm, self.filter_eg_time2, 0, 0x64),
            filter_eg_time3: mutate_u8(rng, pm, self.filter_eg_time3, 0, 0x64),
            filter_eg_time4: mutate_u8(rng, pm, self.filter_eg_time4, 0, 0x64),
            filter_eg_attack_time_vel_time_scale: mutate_u8(
                rng,
                pm,
                self.filter_eg_attack_time_vel_time_scale,
                0,
                0x3f,
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct VoicedOp {
    pub osc_key_sync: u8,
    pub osc_transpose: u8,
    pub osc_freq_coarse: u8,
    pub osc_freq_fine: u8,
    pub osc_freq_note_scaling: u8,
    pub osc_bw_bias_sense: u8,
    pub osc_spectral_form: u8,
    pub osc_mode: u8,
    pub spectral_skirt: u8,
    pub fseq_track_num: u8,
    pub osc_freq_ratio_band_spectrum: u8,
    pub osc_freq_detune: u8,
    pub osc_freq_eg_init: u8,
    pub osc_freq_eg_attack_val: u8,
    pub osc_freq_eg_attack_time: u8,
    pub osc_freq_eg_decay_time: u8,
    pub eg_lvl: [u8; 4],
    pub eg_time: [u8; 4],
    pub eg_hold_time: u8,
    pub eg_time_scaling: u8,
    pub lvl_scaling_total: u8,
    pub lvl_scaling_break_point: u8,
    pub lvl_scaling_left_depth: u8,
    pub lvl_scaling_right_depth: u8,
    pub lvl_scaling_left_curve: u8,
    pub lvl_scaling_right_curve: u8,
    pub freq_bias_sense: u8,
    pub pitch_mod_sense: u8,
    pub freq_mod_sense: u8,
    pub freq_velo_sense: u8,
    pub amp_mod_sense: u8,
    pub amp_velo_sense: u8,
    pub eg_bias_sense: u8,
}

impl VoicedOp {
    pub fn encode(&self, w: &mut BitWriter) {
        w.write_bits(self.osc_key_sync, 2);
        w.write_bits(self.osc_transpose, 6);
        w.write_u8(self.osc_freq_coarse);
        w.write_u8(self.osc_freq_fine);
        w.write_u8(self.osc_freq_note_scaling);
        w.write_bits(self.osc_bw_bias_sense, 5);
        w.write_bits(self.osc_spectral_form, 3);
        w.write_bits(self.osc_mode, 2);
        w.write_bits(self.spectral_skirt, 3);
        w.write_bits(self.fseq_track_num, 3);
        w.write_u8(self.osc_freq_ratio_band_spectrum);
        w.write_u8(self.osc_freq_detune);
        w.write_u8(self.osc_freq_eg_init);
        w.write_u8(self.osc_freq_eg_attack_val);
        w.write_u8(self.osc_freq_eg_attack_time);
        w.write_u8(self.osc_freq_eg_decay_time);
        for v in self.eg_lvl {
            w.write_u8(v);
        }
        for v in self.eg_time {
            w.write_u8(v);
        }
        w.write_u8(self.eg_hold_time);
        w.write_u8(self.eg_time_scaling);
        w.write_u8(self.lvl_scaling_total);
        w.write_u8(self.lvl_scaling_break_point);
        w.write_u8(self.lvl_scaling_left_depth);
        w.write_u8(self.lvl_scaling_right_depth);
        w.write_u8(self.lvl_scaling_left_curve);
        w.write_u8(self.lvl_scaling_right_curve);
        w.write_reserved(3);
        w.write_bits(self.freq_bias_sense, 5);
        w.write_bits(self.pitch_mod_sense, 3);
        w.write_bits(self.freq_mod_sense, 4);
        w.write_bits(self.freq_velo_sense, 4);
        w.write_bits(self.amp_mod_sense, 4);
        w.write_bits(self.amp_velo_sense, 4);
        w.write_u8(self.eg_bias_sense);
    }

    pub fn decode(r: &mut BitReader) -> Result<Self> {
        let osc_key_sync = r.read_bits(2)?;
        let osc_transpose = r.read_bits(6)?;
        let osc_freq_coarse = r.read_u8()?;
        let osc_freq_fine = r.read_u8()?;
        let osc_freq_note_scaling = r.read_u8()?;
        let osc_bw_bias_sense = r.read_bits(5)?;
        let osc_spectral_form = r.read_bits(3)?;
        let osc_mode = r.read_bits(2)?;
        let spectral_skirt = r.read_bits(3)?;
        let fseq_track_num = r.read_bits(3)?;
        let osc_freq_ratio_band_spectrum = r.read_u8()?;
        let osc_freq_detune = r.read_u8()?;
        let osc_freq_eg_init = r.read_u8()?;
        let osc_freq_eg_attack_val = r.read_u8()?;
        let osc_freq_eg_attack_time = r.read_u8()?;
        let osc_freq_eg_decay_time = r.read_u8()?;
        let mut eg_lvl = [0u8; 4];
        for v in eg_lvl.iter_mut() {
            *v = r.read_u8()?;
        }
        let mut eg_time = [0u8; 4];
        for v in eg_time.iter_mut() {
            *v = r.read_u8()?;
        }
        let eg_hold_time = r.read_u8()?;
        let eg_time_scaling = r.read_u8()?;
        let lvl_scaling_total = r.read_u8()?;
        let lvl_scaling_break_point = r.read_u8()?;
        let lvl_scaling_left_depth = r.read_u8()?;
        let lvl_scaling_right_depth = r.read_u8()?;
        let lvl_scaling_left_curve = r.read_u8()?;
        let lvl_scaling_right_curve = r.read_u8()?;
        r.read_reserved(3)?;
        let freq_bias_sense = r.read_bits(5)?;
        let pitch_mod_sense = r.read_bits(3)?;
        let freq_mod_sense = r.read_bits(4)?;
        let freq_velo_sense = r.read_bits(4)?;
        let amp_mod_sense = r.read_bits(4)?;
        let amp_velo_sense = r.read_bits(4)?;
        let eg_bias_sense = r.read_u8()?;
        Ok(Self {
            osc_key_sync,
            osc_transpose,
            osc_freq_coarse,
            osc_freq_fine,
            osc_freq_note_scaling,
            osc_bw_bias_sense,
            osc_spectral_form,
            osc_mode,
            spectral_skirt,
            fseq_track_num,
            osc_freq_ratio_band_spectrum,
            osc_freq_detune,
            osc_freq_eg_init,
            osc_freq_eg_attack_val,
            osc_freq_eg_attack_time,
            osc_freq_eg_decay_time,
            eg_lvl,
            eg_time,
            eg_hold_time,
            eg_time_scaling,
            lvl_scaling_total,
            lvl_scaling_break_point,
            lvl_scaling_left_depth,
            lvl_scaling_right_depth,
            lvl_scaling_left_curve,
            lvl_scaling_right_curve,
            freq_bias_sense,
            pitch_mod_sense,
            freq_mod_sense,
            freq_velo_sense,
            amp_mod_sense,
            amp_velo_sense,
            eg_bias_sense,
        })
    }

    pub fn mutate(&self, pm: f64, rng: &mut impl Rng) -> Self {
        let eg_lvl = {
            let mut out = self.eg_lvl;
            for v in out.iter_mut() {
                *v = mutate_u8(rng, pm, *v, 0, 0x63);
            }
            out
        };
        let eg_time = {
            let mut out = self.eg_time;
            for v in out.iter_mut() {
                *v = mutate_u8(rng, pm, *v, 0, 0x63);
            }
            out
        };
        Self {
            osc_key_sync: mutate_u8(rng, pm, self.osc_key_sync, 0, 0x1),
            osc_transpose: mutate_u8(rng, pm, self.osc_transpose, 0, 0x30),
            osc_freq_coarse: mutate_u8(rng, pm, self.osc_freq_coarse, 0, 0x1f),
            osc_freq_fine: mutate_u8(rng, pm, self.osc_freq_fine, 0, 0x7f),
            osc_freq_note_scaling: mutate_u8(rng, pm, self.osc_freq_note_scaling, 0, 0x63),
            osc_bw_bias_sense: mutate_u8(rng, pm, self.osc_bw_bias_sense, 0, 0xe),
            osc_spectral_form: mutate_u8(rng, pm, self.osc_spectral_form, 0, 0x7),
            osc_mode: mutate_u8(rng, pm, self.osc_mode, 0, 0x1),
            spectral_skirt: mutate_u8(rng, pm, self.spectral_skirt, 0, 0x7),
            fseq_track_num: mutate_u8(rng, pm, self.fseq_track_num, 0, 0x7),
            osc_freq_ratio_band_spectrum: mutate_u8(rng, pm, self.osc_freq_ratio_band_spectrum, 0, 0x63),
            osc_freq_detune: mutate_u8(rng, pm, self.osc_freq_detune, 0, 0x1e),
            osc_freq_eg_init: mutate_u8(rng, pm, self.osc_freq_eg_init, 0, 0x64),
            osc_freq_eg_attack_val: mutate_u8(rng, pm, self.osc_freq_eg_attack_val, 0, 0x64),
            osc_freq_eg_attack_time: mutate_u8(rng, pm, self.osc_freq_eg_attack_time, 0, 0x63),
            osc_freq_eg_decay_time: mutate_u8(rng, pm, self.osc_freq_eg_decay_time, 0, 0x63),
            eg_lvl,
            eg_time,
            eg_hold_time: mutate_u8(rng, pm, self.eg_hold_time, 0, 0x63),
            eg_time_scaling: mutate_u8(rng, pm, self.eg_time_scaling, 0, 0x7),
            lvl_scaling_total: mutate_u8(rng, pm, self.lvl_scaling_total, 0, 0x63),
            lvl_scaling_break_point: mutate_u8(rng, pm, self.lvl_scaling_break_point, 0, 0x63),
            lvl_scaling_left_depth: mutate_u8(rng, pm, self.lvl_scaling_left_depth, 0, 0x63),
            lvl_scaling_right_depth: mutate_u8(rng, pm, self.lvl_scaling_right_depth, 0, 0x63),
            lvl_scaling_left_curve: mutate_u8(rng, pm, self.lvl_scaling_left_curve, 0, 0x3),
            lvl_scaling_right_curve: mutate_u8(rng, pm, self.lvl_scaling_right_curve, 0, 0x3),
            freq_bias_sense: mutate_u8(rng, pm, self.freq_bias_sense, 0, 0xe),
            pitch_mod_sense: mutate_u8(rng, pm, self.pitch_mod_sense, 0, 0x7),
            freq_mod_sense: mutate_u8(rng, pm, self.freq_mod_sense, 0, 0x7),
            freq_velo_sense: mutate_u8(rng, pm, self.freq_velo_sense, 0, 0xe),
            amp_mod_sense: mutate_u8(rng, pm, self.amp_mod_sense, 0, 0x7),
            amp_velo_sense: mutate_u8(rng, pm, self.amp_velo_sense, 0, 0xe),
            eg_bias_sense: mutate_u8(rng, pm, self.eg_bias_sense, 0, 0xe),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct UnvoicedOp {
    pub formant_pitch_transpose: u8,
    pub formant_pitch_mode: u8,
    pub formant_pitch_coarse: u8,
    pub formant_pitch_fine: u8,
    pub formant_pitch_note_scaling: u8,
    pub formant_shape_bandwidth: u8,
    pub formant_shape_bw_bias_sense: u8,
    pub formant_reso: u8,
    pub formant_skirt: u8,
    pub osc_freq_eg_init: u8,
    pub osc_freq_eg_attack_val: u8,
    pub osc_freq_eg_attack_time: u8,
    pub osc_freq_eg_decay_time: u8,
    pub lvl: u8,
    pub lvl_key_scaling: u8,
    pub eg_lvl: [u8; 4],
    pub eg_time: [u8; 4],
    pub eg_hold_time: u8,
    pub eg_time_scaling: u8,
    pub freq_bias_sense: u8,
    pub freq_mod_sense: u8,
    pub freq_velo_sense: u8,
    pub amp_mod_sense: u8,
    pub amp_velo_sense: u8,
    pub eg_bias_sense: u8,
}

impl UnvoicedOp {
    pub fn encode(&self, w: &mut BitWriter) {
        w.write_u8(self.formant_pitch_transpose);
        w.write_bits(self.formant_pitch_mode, 3);
        w.write_bits(self.formant_pitch_coarse, 5);
        w.write_u8(self.formant_pitch_fine);
        w.write_u8(self.formant_pitch_note_scaling);
        w.write_u8(self.formant_shape_bandwidth);
        w.write_u8(self.formant_shape_bw_bias_sense);
        w.write_bits(self.formant_reso, 5);
        w.write_bits(self.formant_skirt, 3);
        w.write_u8(self.osc_freq_eg_init);
        w.write_u8(self.osc_freq_eg_attack_val);
        w.write_u8(self.osc_freq_eg_attack_time);
        w.write_u8(self.osc_freq_eg_decay_time);
        w.write_u8(self.lvl);
        w.write_u8(self.lvl_key_scaling);
        for v in self.eg_lvl {
            w.write_u8(v);
        }
        for v in self.eg_time {
            w.write_u8(v);
        }
        w.write_u8(self.eg_hold_time);
        w.write_u8(self.eg_time_scaling);
        w.write_u8(self.freq_bias_sense);
        w.write_bits(self.freq_mod_sense, 4);
        w.write_bits(self.freq_velo_sense, 4);
        w.write_bits(self.amp_mod_sense, 4);
        w.write_bits(self.amp_velo_sense, 4);
        w.write_u8(self.eg_bias_sense);
    }

    pub fn decode(r: &mut BitReader) -> Result<Self> {
        let formant_pitch_transpose = r.read_u8()?;
        let formant_pitch_mode = r.read_bits(3)?;
        let formant_pitch_coarse = r.read_bits(5)?;
        let formant_pitch_fine = r.read_u8()?;
        let formant_pitch_note_scaling = r.read_u8()?;
        let formant_shape_bandwidth = r.read_u8()?;
        let formant_shape_bw_bias_sense = r.read_u8()?;
        let formant_reso = r.read_bits(5)?;
        let formant_skirt = r.read_bits(3)?;
        let osc_freq_eg_init = r.read_u8()?;
        let osc_freq_eg_attack_val = r.read_u8()?;
        let osc_freq_eg_attack_time = r.read_u8()?;
        let osc_freq_eg_decay_time = r.read_u8()?;
        let lvl = r.read_u8()?;
        let lvl_key_scaling = r.read_u8()?;
        let mut eg_lvl = [0u8; 4];
        for v in eg_lvl.iter_mut() {
            *v = r.read_u8()?;
        }
        let mut eg_time = [0u8; 4];
        for v in eg_time.iter_mut() {
            *v = r.read_u8()?;
        }
        let eg_hold_time = r.read_u8()?;
        let eg_time_scaling = r.read_u8()?;
        let freq_bias_sense = r.read_u8()?;
        let freq_mod_sense = r.read_bits(4)?;
        let freq_velo_sense = r.read_bits(4)?;
        let amp_mod_sense = r.read_bits(4)?;
        let amp_velo_sense = r.read_bits(4)?;
        let eg_bias_sense = r.read_u8()?;
        Ok(Self {
            formant_pitch_transpose,
            formant_pitch_mode,
            formant_pitch_coarse,
            formant_pitch_fine,
            formant_pitch_note_scaling,
            formant_shape_bandwidth,
            formant_shape_bw_bias_sense,
            formant_reso,
            formant_skirt,
            osc_freq_eg_init,
            osc_freq_eg_attack_val,
            osc_freq_eg_attack_time,
            osc_freq_eg_decay_time,
            lvl,
            lvl_key_scaling,
            eg_lvl,
            eg_time,
            eg_hold_time,
            eg_time_scaling,
            freq_bias_sense,
            freq_mod_sense,
            freq_velo_sense,
            amp_mod_sense,
            amp_velo_sense,
            eg_bias_sense,
        })
    }

    pub fn mutate(&self, pm: f64, rng: &mut impl Rng) -> Self {
        let eg_lvl = {
            let mut out = self.eg_lvl;
            for v in out.iter_mut() {
                *v = mutate_u8(rng, pm, *v, 0, 0x63);
            }
            out
        };
        let eg_time = {
            let mut out = self.eg_time;
            for v in out.iter_mut() {
                *v = mutate_u8(rng, pm, *v, 0, 0x63);
            }
            out
        };
        Self {
            formant_pitch_transpose: mutate_u8(rng, pm, self.formant_pitch_transpose, 0, 0x30),
            formant_pitch_mode: mutate_u8(rng, pm, self.formant_pitch_mode, 0, 0x2),
            formant_pitch_coarse: mutate_u8(rng, pm, self.formant_pitch_coarse, 0, 0x15),
            formant_pitch_fine: mutate_u8(rng, pm, self.formant_pitch_fine, 0, 0x7f),
            formant_pitch_note_scaling: mutate_u8(rng, pm, self.formant_pitch_note_scaling, 0, 0x63),
            formant_shape_bandwidth: mutate_u8(rng, pm, self.formant_shape_bandwidth, 0, 0x63),
            formant_shape_bw_bias_sense: mutate_u8(rng, pm, self.formant_shape_bw_bias_sense, 0, 0xe),
            formant_reso: mutate_u8(rng, pm, self.formant_reso, 0, 0x7),
            formant_skirt: mutate_u8(rng, pm, self.formant_skirt, 0, 0x7),
            osc_freq_eg_init: mutate_u8(rng, pm, self.osc_freq_eg_init, 0, 0x64),
            osc_freq_eg_attack_val: mutate_u8(rng, pm, self.osc_freq_eg_attack_val, 0, 0x64),
            osc_freq_eg_attack_time: mutate_u8(rng, pm, self.osc_freq_eg_attack_time, 0, 0x63),
            osc_freq_eg_decay_time: mutate_u8(rng, pm, self.osc_freq_eg_decay_time, 0, 0x63),
            lvl: mutate_u8(rng, pm, self.lvl, 0, 0x63),
            lvl_key_scaling: mutate_u8(rng, pm, self.lvl_key_scaling, 0, 0xe),
            eg_lvl,
            eg_time,
            eg_hold_time: mutate_u8(rng, pm, self.eg_hold_time, 0, 0x63),
            eg_time_scaling: mutate_u8(rng, pm, self.eg_time_scaling, 0, 0x7),
            freq_bias_sense: mutate_u8(rng, pm, self.freq_bias_sense, 0, 0xe),
            freq_mod_sense: mutate_u8(rng, pm, self.freq_mod_sense, 0, 0x7),
            freq_velo_sense: mutate_u8(rng, pm, self.freq_velo_sense, 0, 0xe),
            amp_mod_sense: mutate_u8(rng, pm, self.amp_mod_sense, 0, 0x7),
            amp_velo_sense: mutate_u8(rng, pm, self.amp_velo_sense, 0, 0xe),
            eg_bias_sense: mutate_u8(rng, pm, self.eg_bias_sense, 0, 0xe),
        }
    }
}

/// One full voice: shared parameters plus eight voiced and eight unvoiced
/// operators, addressed as one 608-byte SysEx block.
#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct Voice {
    pub common: VoiceCommon,
    pub voiced: [VoicedOp; 8],
    pub unvoiced: [UnvoicedOp; 8],
}

impl Voice {
    pub fn encode(&self, w: &mut BitWriter) {
        self.common.encode(w);
        arr_encode!(w, self.voiced);
        arr_encode!(w, self.unvoiced);
    }

    pub fn decode(r: &mut BitReader) -> Result<Self> {
        let common = VoiceCommon::decode(r)?;
        let voiced = arr_decode!(r, 8, VoicedOp);
        let unvoiced = arr_decode!(r, 8, UnvoicedOp);
        Ok(Self { common, voiced, unvoiced })
    }

    pub fn mutate(&self, pm: f64, rng: &mut impl Rng) -> Self {
        Self {
            common: self.common.mutate(pm, rng),
            voiced: arr_mutate!(rng, pm, self.voiced),
            unvoiced: arr_mutate!(rng, pm, self.unvoiced),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn f_control_dest_round_trips() {
        let dest = FControlDest { dest: 0x3, op_type: 1, op: 0x7 };
        let mut w = BitWriter::new();
        dest.encode(&mut w);
        let bytes = w.into_bytes();
        let mut r = BitReader::new(&bytes);
        assert_eq!(FControlDest::decode(&mut r).unwrap(), dest);
    }

    #[test]
    fn f_control_dest_mutate_bounds() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(0);
        for _ in 0..200 {
            let dest = FControlDest::default().mutate(1.0, &mut rng);
            assert!(dest.dest <= 0x3);
            assert!(dest.op_type <= 0x1);
            assert!(dest.op <= 0x7);
        }
    }

    #[test]
    fn voice_common_round_trips() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(1);
        let common = VoiceCommon::default().mutate(1.0, &mut rng);
        let mut w = BitWriter::new();
        common.encode(&mut w);
        let bytes = w.into_bytes();
        let mut r = BitReader::new(&bytes);
        assert_eq!(VoiceCommon::decode(&mut r).unwrap(), common);
    }

    #[test]
    fn voice_common_mutate_bounds() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(2);
        for _ in 0..200 {
            let common = VoiceCommon::default().mutate(1.0, &mut rng);
            assert!(common.category <= 0x16);
            assert!(common.lfo1_waveform <= 0x5);
            assert!(common.filter_rez_velo_sens <= 0xe);
        }
    }

    #[test]
    fn voiced_op_round_trips() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(3);
        let op = VoicedOp::default().mutate(1.0, &mut rng);
        let mut w = BitWriter::new();
        op.encode(&mut w);
        let bytes = w.into_bytes();
        let mut r = BitReader::new(&bytes);
        assert_eq!(VoicedOp::decode(&mut r).unwrap(), op);
    }

    #[test]
    fn voiced_op_mutate_bounds() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(4);
        for _ in 0..200 {
            let op = VoicedOp::default().mutate(1.0, &mut rng);
            assert!((0..=0xe).contains(&op.freq_bias_sense));
            assert!(op.osc_transpose <= 0x30);
            assert!(op.amp_velo_sense <= 0xe);
        }
    }

    #[test]
    fn unvoiced_op_round_trips() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(5);
        let op = UnvoicedOp::default().mutate(1.0, &mut rng);
        let mut w = BitWriter::new();
        op.encode(&mut w);
        let bytes = w.into_bytes();
        let mut r = BitReader::new(&bytes);
        assert_eq!(UnvoicedOp::decode(&mut r).unwrap(), op);
    }

    #[test]
    fn unvoiced_op_mutate_bounds() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(6);
        for _ in 0..200 {
            let op = UnvoicedOp::default().mutate(1.0, &mut rng);
            assert!((0..=0xe).contains(&op.freq_bias_sense));
            assert!(op.formant_pitch_mode <= 0x2);
        }
    }

    #[test]
    fn voice_round_trips() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);
        let voice = Voice::default().mutate(1.0, &mut rng);
        let mut w = BitWriter::new();
        voice.encode(&mut w);
        let bytes = w.into_bytes();
        let mut r = BitReader::new(&bytes);
        assert_eq!(Voice::decode(&mut r).unwrap(), voice);
    }
}
