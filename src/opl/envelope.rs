//! OPL Envelope Generator
//!
//! Four-phase envelope (attack, decay, sustain, release) expressed as an
//! attenuation in dB. Rates are the 4-bit register values; the effective rate
//! is `rate * 4 + key_scale_offset`, and every four steps of effective rate
//! halve the phase duration.
//!
//! The attack phase follows the chip's exponential approach towards 0 dB.
//! Decay and release move linearly in dB. With the sustain flag clear the
//! envelope is percussive: once it reaches the sustain level it keeps falling
//! at the release rate even while the key is held.

use super::constants::{ATTACK_TIME_MS, DECAY_TIME_MS, FASTEST_RATE, MAX_ATTENUATION_DB};

/// Offset that keeps the exponential attack curve from stalling near 0 dB
const ATTACK_CURVE_OFFSET_DB: f32 = 3.0;

/// Envelope phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopePhase {
    /// Rising towards 0 dB
    Attack,
    /// Falling towards the sustain level
    Decay,
    /// Holding (or, when percussive, releasing) at the sustain level
    Sustain,
    /// Falling towards silence after key-off
    Release,
    /// Silent
    Off,
}

/// Envelope generator for one operator
#[derive(Debug, Clone)]
pub struct Envelope {
    phase: EnvelopePhase,
    attenuation: f32,
    attack_rate: u8,
    decay_rate: u8,
    sustain_level: u8,
    release_rate: u8,
    sustain: bool,
    key_scale_rate: bool,
    /// Key scale rate index (0-15) derived from block and f-number
    rate_key: u8,
    sample_rate: f32,
}

impl Envelope {
    /// Create a silent envelope
    pub fn new(sample_rate: u32) -> Self {
        Envelope {
            phase: EnvelopePhase::Off,
            attenuation: MAX_ATTENUATION_DB,
            attack_rate: 0,
            decay_rate: 0,
            sustain_level: 0,
            release_rate: 0,
            sustain: false,
            key_scale_rate: false,
            rate_key: 0,
            sample_rate: sample_rate.max(1) as f32,
        }
    }

    /// Current phase
    pub fn phase(&self) -> EnvelopePhase {
        self.phase
    }

    /// Current attenuation in dB (0 = full level, 96 = silent)
    pub fn attenuation(&self) -> f32 {
        self.attenuation
    }

    /// Whether the envelope is producing output
    pub fn is_active(&self) -> bool {
        self.phase != EnvelopePhase::Off
    }

    /// Set attack and decay rates (0-15)
    pub fn set_attack_decay(&mut self, attack: u8, decay: u8) {
        self.attack_rate = attack & 0x0F;
        self.decay_rate = decay & 0x0F;
    }

    /// Set sustain level (0-15) and release rate (0-15)
    pub fn set_sustain_release(&mut self, sustain_level: u8, release: u8) {
        self.sustain_level = sustain_level & 0x0F;
        self.release_rate = release & 0x0F;
    }

    /// Set the sustain (EG type) and key-scale-rate flags
    pub fn set_flags(&mut self, sustain: bool, key_scale_rate: bool) {
        self.sustain = sustain;
        self.key_scale_rate = key_scale_rate;
    }

    /// Update the key scale rate index from the channel pitch
    pub fn set_rate_key(&mut self, rate_key: u8) {
        self.rate_key = rate_key & 0x0F;
    }

    /// Start the attack phase from the current attenuation
    pub fn key_on(&mut self) {
        self.phase = EnvelopePhase::Attack;
        if self.effective_rate(self.attack_rate) >= FASTEST_RATE {
            self.attenuation = 0.0;
            self.phase = EnvelopePhase::Decay;
        }
    }

    /// Enter the release phase
    pub fn key_off(&mut self) {
        if self.phase != EnvelopePhase::Off {
            self.phase = EnvelopePhase::Release;
        }
    }

    /// Sustain level in dB
    pub fn sustain_level_db(&self) -> f32 {
        if self.sustain_level == 15 {
            93.0
        } else {
            self.sustain_level as f32 * 3.0
        }
    }

    fn effective_rate(&self, rate: u8) -> u8 {
        if rate == 0 {
            return 0;
        }
        let offset = if self.key_scale_rate {
            self.rate_key
        } else {
            self.rate_key >> 2
        };
        (rate * 4 + offset).min(63)
    }

    /// Phase duration scaled for an effective rate
    fn scaled_time_ms(base_ms: f32, effective_rate: u8) -> f32 {
        let steps = effective_rate.min(FASTEST_RATE) as f32 - 4.0;
        base_ms / 2f32.powf(steps / 4.0)
    }

    fn linear_step(&self, rate: u8) -> f32 {
        let effective = self.effective_rate(rate);
        if effective == 0 {
            return 0.0;
        }
        let time_ms = Self::scaled_time_ms(DECAY_TIME_MS, effective);
        MAX_ATTENUATION_DB / (time_ms * 0.001 * self.sample_rate)
    }

    fn attack_factor(&self) -> Option<f32> {
        let effective = self.effective_rate(self.attack_rate);
        if effective == 0 {
            return None;
        }
        let time_ms = Self::scaled_time_ms(ATTACK_TIME_MS, effective);
        let span = ((MAX_ATTENUATION_DB + ATTACK_CURVE_OFFSET_DB) / ATTACK_CURVE_OFFSET_DB).ln();
        Some((-span / (time_ms * 0.001 * self.sample_rate)).exp())
    }

    /// Advance the envelope by one output sample
    pub fn clock(&mut self) {
        match self.phase {
            EnvelopePhase::Attack => {
                if self.effective_rate(self.attack_rate) >= FASTEST_RATE {
                    self.attenuation = 0.0;
                } else if let Some(factor) = self.attack_factor() {
                    self.attenuation = (self.attenuation + ATTACK_CURVE_OFFSET_DB) * factor
                        - ATTACK_CURVE_OFFSET_DB;
                }
                if self.attenuation <= 0.0 {
                    self.attenuation = 0.0;
                    self.phase = EnvelopePhase::Decay;
                }
            }
            EnvelopePhase::Decay => {
                let target = self.sustain_level_db();
                if self.attenuation >= target {
                    self.phase = EnvelopePhase::Sustain;
                } else {
                    self.attenuation = (self.attenuation + self.linear_step(self.decay_rate))
                        .min(target);
                    if self.attenuation >= target {
                        self.phase = EnvelopePhase::Sustain;
                    }
                }
            }
            EnvelopePhase::Sustain => {
                if !self.sustain {
                    self.fall(self.release_rate);
                }
            }
            EnvelopePhase::Release => {
                self.fall(self.release_rate);
            }
            EnvelopePhase::Off => {}
        }
    }

    fn fall(&mut self, rate: u8) {
        self.attenuation += self.linear_step(rate);
        if self.attenuation >= MAX_ATTENUATION_DB {
            self.attenuation = MAX_ATTENUATION_DB;
            self.phase = EnvelopePhase::Off;
        }
    }
}
