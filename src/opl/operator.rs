//! FM operator: phase generator, waveform, level and envelope

use super::constants::{
    attenuation_to_gain, KSL_ROM, KSL_SHIFT, MAX_ATTENUATION_DB, MULTIPLIERS,
    TOTAL_LEVEL_STEP_DB,
};
use super::envelope::Envelope;
use super::registers::OperatorFlags;
use std::f32::consts::TAU;

/// Per-sample LFO state shared by all operators of the chip
#[derive(Debug, Clone, Copy, Default)]
pub struct LfoState {
    /// Current tremolo attenuation in dB
    pub tremolo_db: f32,
    /// Current vibrato pitch factor (1.0 = no shift)
    pub vibrato_factor: f32,
}

/// One of the eight OPL3 waveforms evaluated at `phase` (in cycles)
pub fn waveform(select: u8, phase: f32) -> f32 {
    let p = phase.rem_euclid(1.0);
    let first_half = p < 0.5;
    match select & 0x07 {
        // Sine
        0 => (TAU * p).sin(),
        // Half sine
        1 => {
            if first_half {
                (TAU * p).sin()
            } else {
                0.0
            }
        }
        // Absolute sine
        2 => (TAU * p).sin().abs(),
        // Quarter sine pulses
        3 => {
            if p.rem_euclid(0.5) < 0.25 {
                (TAU * p).sin().abs()
            } else {
                0.0
            }
        }
        // Alternating sine (double speed, first half only)
        4 => {
            if first_half {
                (2.0 * TAU * p).sin()
            } else {
                0.0
            }
        }
        // Camel sine
        5 => {
            if first_half {
                (2.0 * TAU * p).sin().abs()
            } else {
                0.0
            }
        }
        // Square
        6 => {
            if first_half {
                1.0
            } else {
                -1.0
            }
        }
        // Derived square
        _ => {
            let x = p.rem_euclid(0.5) * 2.0;
            if first_half {
                (-12.0 * x).exp2()
            } else {
                -(-12.0 * (1.0 - x)).exp2()
            }
        }
    }
}

/// FM operator
#[derive(Debug, Clone)]
pub struct Operator {
    flags: OperatorFlags,
    multiplier: u8,
    key_scale_level: u8,
    total_level: u8,
    waveform: u8,
    envelope: Envelope,
    /// Phase in cycles, kept in [0, 1)
    phase: f32,
    ksl_db: f32,
    sample_rate: f32,
}

impl Operator {
    /// Create a silent operator
    pub fn new(sample_rate: u32) -> Self {
        Operator {
            flags: OperatorFlags::empty(),
            multiplier: 0,
            key_scale_level: 0,
            total_level: 0,
            waveform: 0,
            envelope: Envelope::new(sample_rate),
            phase: 0.0,
            ksl_db: 0.0,
            sample_rate: sample_rate.max(1) as f32,
        }
    }

    /// Whether the operator currently produces output
    pub fn is_active(&self) -> bool {
        self.envelope.is_active()
    }

    /// `0x20` group: tremolo / vibrato / sustain / KSR / multiplier
    pub fn write_flags_multiplier(&mut self, value: u8) {
        self.flags = OperatorFlags::from_bits_truncate(value);
        self.multiplier = value & 0x0F;
        self.envelope.set_flags(
            self.flags.contains(OperatorFlags::SUSTAIN),
            self.flags.contains(OperatorFlags::KSR),
        );
    }

    /// `0x40` group: key scale level / total level
    pub fn write_ksl_total_level(&mut self, value: u8) {
        self.key_scale_level = value >> 6;
        self.total_level = value & 0x3F;
    }

    /// `0x60` group: attack rate / decay rate
    pub fn write_attack_decay(&mut self, value: u8) {
        self.envelope.set_attack_decay(value >> 4, value & 0x0F);
    }

    /// `0x80` group: sustain level / release rate
    pub fn write_sustain_release(&mut self, value: u8) {
        self.envelope.set_sustain_release(value >> 4, value & 0x0F);
    }

    /// `0xE0` group: waveform select
    pub fn write_waveform(&mut self, value: u8) {
        self.waveform = value & 0x07;
    }

    /// Recompute pitch dependent scaling after an f-number/block change
    pub fn set_pitch(&mut self, fnum: u16, block: u8, note_select: bool) {
        let ksl_units =
            KSL_ROM[((fnum >> 6) & 0x0F) as usize] as f32 - 8.0 * (7 - block.min(7)) as f32;
        self.ksl_db = ksl_units.max(0.0)
            * TOTAL_LEVEL_STEP_DB
            * KSL_SHIFT[(self.key_scale_level & 0x03) as usize];

        let note_bit = if note_select {
            (fnum >> 8) & 0x01
        } else {
            (fnum >> 9) & 0x01
        };
        self.envelope
            .set_rate_key((block.min(7) << 1) | note_bit as u8);
    }

    /// Key-on edge
    pub fn key_on(&mut self) {
        self.phase = 0.0;
        self.envelope.key_on();
    }

    /// Key-off edge
    pub fn key_off(&mut self) {
        self.envelope.key_off();
    }

    /// Produce one sample in [-1.0, 1.0] and advance phase and envelope
    ///
    /// * `base_hz` - channel frequency from f-number and block
    /// * `modulation` - phase offset in cycles
    pub fn output(&mut self, base_hz: f32, modulation: f32, lfo: LfoState) -> f32 {
        let mut level_db = self.envelope.attenuation()
            + self.total_level as f32 * TOTAL_LEVEL_STEP_DB
            + self.ksl_db;
        if self.flags.contains(OperatorFlags::TREMOLO) {
            level_db += lfo.tremolo_db;
        }

        let value = if level_db >= MAX_ATTENUATION_DB {
            0.0
        } else {
            waveform(self.waveform, self.phase + modulation) * attenuation_to_gain(level_db)
        };

        let mut freq = base_hz * MULTIPLIERS[self.multiplier as usize];
        if self.flags.contains(OperatorFlags::VIBRATO) {
            freq *= lfo.vibrato_factor;
        }
        self.phase = (self.phase + freq / self.sample_rate).fract();
        self.envelope.clock();

        value
    }
}
