//! Two-operator voice patch
//!
//! A patch holds the operator parameters written once at start-up. The default
//! patch is a plucked FM tone: an alternating-sine modulator at three times
//! the pitch driving a half-pitch sine carrier, both with a slow attack and a
//! long percussive fall.

use crate::keyboard::Algorithm;
use crate::opl::registers::{
    channel_address, operator_address, ChannelRegister, OperatorFlags, OperatorRegister,
    CHANNEL_COUNT,
};
use crate::{OplError, Result};
use serde::{Deserialize, Deserializer, Serialize};

/// Left and right output enables of the `0xC0` group
pub const STEREO_OUTPUT: u8 = 0x30;

/// Parameters of one operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OperatorPatch {
    /// Amplitude modulation
    pub tremolo: bool,
    /// Frequency modulation
    pub vibrato: bool,
    /// Hold at the sustain level while the key is down
    pub sustain: bool,
    /// Key scale rate
    pub ksr: bool,
    /// Frequency multiplier index (0-15)
    pub multiplier: u8,
    /// Key scale level (0-3)
    pub key_scale_level: u8,
    /// Attenuation in 0.75 dB steps (0-63)
    pub output_level: u8,
    /// Attack rate (0-15)
    pub attack: u8,
    /// Decay rate (0-15)
    pub decay: u8,
    /// Sustain level in 3 dB steps (0-15)
    pub sustain_level: u8,
    /// Release rate (0-15)
    pub release: u8,
    /// Waveform select (0-7)
    pub waveform: u8,
}

impl Default for OperatorPatch {
    fn default() -> Self {
        OperatorPatch {
            tremolo: false,
            vibrato: false,
            sustain: false,
            ksr: false,
            multiplier: 0,
            key_scale_level: 0,
            output_level: 0,
            attack: 5,
            decay: 0,
            sustain_level: 0,
            release: 3,
            waveform: 0,
        }
    }
}

impl OperatorPatch {
    /// Default modulator: multiplier 3, -11.25 dB, waveform 4
    pub fn modulator() -> Self {
        OperatorPatch {
            multiplier: 3,
            output_level: 0x0F,
            waveform: 4,
            ..Default::default()
        }
    }

    /// Default carrier: multiplier 0.5, full level, sine
    pub fn carrier() -> Self {
        OperatorPatch::default()
    }

    /// `0x20` group value
    pub fn flags_multiplier(&self) -> u8 {
        let mut flags = OperatorFlags::empty();
        flags.set(OperatorFlags::TREMOLO, self.tremolo);
        flags.set(OperatorFlags::VIBRATO, self.vibrato);
        flags.set(OperatorFlags::SUSTAIN, self.sustain);
        flags.set(OperatorFlags::KSR, self.ksr);
        flags.bits() | (self.multiplier & 0x0F)
    }

    /// `0x40` group value
    pub fn ksl_total_level(&self) -> u8 {
        ((self.key_scale_level & 0x03) << 6) | (self.output_level & 0x3F)
    }

    /// `0x60` group value
    pub fn attack_decay(&self) -> u8 {
        ((self.attack & 0x0F) << 4) | (self.decay & 0x0F)
    }

    /// `0x80` group value
    pub fn sustain_release(&self) -> u8 {
        ((self.sustain_level & 0x0F) << 4) | (self.release & 0x0F)
    }

    /// `0xE0` group value
    pub fn waveform_select(&self) -> u8 {
        self.waveform & 0x07
    }

    /// Check every field fits its register bits
    pub fn validate(&self, name: &str) -> Result<()> {
        let fields = [
            ("multiplier", self.multiplier, 15),
            ("key_scale_level", self.key_scale_level, 3),
            ("output_level", self.output_level, 63),
            ("attack", self.attack, 15),
            ("decay", self.decay, 15),
            ("sustain_level", self.sustain_level, 15),
            ("release", self.release, 15),
            ("waveform", self.waveform, 7),
        ];
        for (field, value, max) in fields {
            if value > max {
                return Err(OplError::ConfigError(format!(
                    "{name}.{field} = {value} is out of range (0-{max})"
                )));
            }
        }
        Ok(())
    }

    fn push_writes(&self, channel: usize, operator: usize, writes: &mut Vec<(u16, u8)>) {
        let groups = [
            (OperatorRegister::FlagsMultiplier, self.flags_multiplier()),
            (OperatorRegister::KslTotalLevel, self.ksl_total_level()),
            (OperatorRegister::AttackDecay, self.attack_decay()),
            (OperatorRegister::SustainRelease, self.sustain_release()),
            (OperatorRegister::Waveform, self.waveform_select()),
        ];
        for (group, value) in groups {
            writes.push((operator_address(group, channel, operator), value));
        }
    }
}

/// Modulator/carrier pair plus channel settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoicePatch {
    /// Operator 1
    #[serde(deserialize_with = "modulator_over_defaults")]
    pub modulator: OperatorPatch,
    /// Operator 2
    #[serde(deserialize_with = "carrier_over_defaults")]
    pub carrier: OperatorPatch,
    /// Modulator self-feedback (0-7)
    pub feedback: u8,
    /// Algorithm selected at start-up
    pub algorithm: Algorithm,
}

impl Default for VoicePatch {
    fn default() -> Self {
        VoicePatch {
            modulator: OperatorPatch::modulator(),
            carrier: OperatorPatch::carrier(),
            feedback: 0,
            algorithm: Algorithm::Fm,
        }
    }
}

impl VoicePatch {
    /// `0xC0` value: both outputs, feedback and the connection bit
    pub fn control_value(&self, algorithm: Algorithm) -> u8 {
        STEREO_OUTPUT | ((self.feedback & 0x07) << 1) | algorithm.connection_bit()
    }

    /// Register writes configuring `channel` (0-17) with this patch
    ///
    /// Modulator registers come first, then the carrier, then `0xC0`.
    pub fn register_writes(&self, channel: usize) -> Vec<(u16, u8)> {
        let mut writes = Vec::with_capacity(11);
        self.modulator.push_writes(channel, 0, &mut writes);
        self.carrier.push_writes(channel, 1, &mut writes);
        writes.push((
            channel_address(ChannelRegister::Control, channel),
            self.control_value(self.algorithm),
        ));
        writes
    }

    /// Check the patch fits the register map
    pub fn validate(&self) -> Result<()> {
        self.modulator.validate("modulator")?;
        self.carrier.validate("carrier")?;
        if self.feedback > 7 {
            return Err(OplError::ConfigError(format!(
                "feedback = {} is out of range (0-7)",
                self.feedback
            )));
        }
        Ok(())
    }
}

/// Operator fields present in a config file
#[derive(Debug, Deserialize)]
struct OperatorOverrides {
    tremolo: Option<bool>,
    vibrato: Option<bool>,
    sustain: Option<bool>,
    ksr: Option<bool>,
    multiplier: Option<u8>,
    key_scale_level: Option<u8>,
    output_level: Option<u8>,
    attack: Option<u8>,
    decay: Option<u8>,
    sustain_level: Option<u8>,
    release: Option<u8>,
    waveform: Option<u8>,
}

impl OperatorOverrides {
    fn apply(self, base: OperatorPatch) -> OperatorPatch {
        OperatorPatch {
            tremolo: self.tremolo.unwrap_or(base.tremolo),
            vibrato: self.vibrato.unwrap_or(base.vibrato),
            sustain: self.sustain.unwrap_or(base.sustain),
            ksr: self.ksr.unwrap_or(base.ksr),
            multiplier: self.multiplier.unwrap_or(base.multiplier),
            key_scale_level: self.key_scale_level.unwrap_or(base.key_scale_level),
            output_level: self.output_level.unwrap_or(base.output_level),
            attack: self.attack.unwrap_or(base.attack),
            decay: self.decay.unwrap_or(base.decay),
            sustain_level: self.sustain_level.unwrap_or(base.sustain_level),
            release: self.release.unwrap_or(base.release),
            waveform: self.waveform.unwrap_or(base.waveform),
        }
    }
}

fn modulator_over_defaults<'de, D>(d: D) -> std::result::Result<OperatorPatch, D::Error>
where
    D: Deserializer<'de>,
{
    OperatorOverrides::deserialize(d).map(|o| o.apply(OperatorPatch::modulator()))
}

fn carrier_over_defaults<'de, D>(d: D) -> std::result::Result<OperatorPatch, D::Error>
where
    D: Deserializer<'de>,
{
    OperatorOverrides::deserialize(d).map(|o| o.apply(OperatorPatch::carrier()))
}

/// Check a channel index is addressable
pub(crate) fn check_channel(channel: usize) -> Result<()> {
    if channel >= CHANNEL_COUNT {
        return Err(OplError::ConfigError(format!(
            "channel {channel} is out of range (0-{})",
            CHANNEL_COUNT - 1
        )));
    }
    Ok(())
}
