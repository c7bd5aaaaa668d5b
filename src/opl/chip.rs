//! OPL3-style FM chip
//!
//! Register-compatible, non-bit-accurate model of the OPL3 in two-operator
//! mode. Each of the 18 channels renders a modulator and a carrier in floating
//! point directly at the host sample rate; the result is mixed to 16-bit
//! stereo with saturation. Rhythm mode and four-operator connections are
//! accepted as register writes but not rendered.

use super::constants::{
    CHANNEL_GAIN, CHIP_RATE_HZ, DEFAULT_SAMPLE_RATE, MODULATION_DEPTH, TREMOLO_DEPTH_DB,
    TREMOLO_HZ, VIBRATO_DEPTH_CENTS, VIBRATO_HZ,
};
use super::operator::{LfoState, Operator};
use super::registers::{
    slot_location, ChannelOutput, ChannelRegister, OperatorRegister, RegisterBank,
    RegisterTarget, CHANNEL_COUNT, DEPTH_RHYTHM, KEY_ON_BIT, NOTE_SELECT,
};
use crate::backend::OplBackend;
use std::f32::consts::TAU;

/// Tremolo and vibrato oscillators
#[derive(Debug, Clone)]
struct Lfo {
    tremolo_phase: f32,
    vibrato_phase: f32,
    deep_tremolo: bool,
    deep_vibrato: bool,
    sample_rate: f32,
}

impl Lfo {
    fn new(sample_rate: u32) -> Self {
        Lfo {
            tremolo_phase: 0.0,
            vibrato_phase: 0.0,
            deep_tremolo: false,
            deep_vibrato: false,
            sample_rate: sample_rate.max(1) as f32,
        }
    }

    fn state(&self) -> LfoState {
        // Triangle between 0 dB and the configured depth
        let tri = 1.0 - (2.0 * self.tremolo_phase - 1.0).abs();
        let cents =
            VIBRATO_DEPTH_CENTS[self.deep_vibrato as usize] * (TAU * self.vibrato_phase).sin();
        LfoState {
            tremolo_db: tri * TREMOLO_DEPTH_DB[self.deep_tremolo as usize],
            vibrato_factor: (cents / 1200.0).exp2(),
        }
    }

    fn advance(&mut self) {
        self.tremolo_phase = (self.tremolo_phase + TREMOLO_HZ / self.sample_rate).fract();
        self.vibrato_phase = (self.vibrato_phase + VIBRATO_HZ / self.sample_rate).fract();
    }
}

/// Two-operator channel
#[derive(Debug, Clone)]
struct Channel {
    operators: [Operator; 2],
    fnum: u16,
    block: u8,
    key_on: bool,
    feedback: u8,
    additive: bool,
    output: ChannelOutput,
    /// Last two modulator outputs for self-feedback
    history: [f32; 2],
}

impl Channel {
    fn new(sample_rate: u32) -> Self {
        Channel {
            operators: [Operator::new(sample_rate), Operator::new(sample_rate)],
            fnum: 0,
            block: 0,
            key_on: false,
            feedback: 0,
            additive: false,
            output: ChannelOutput::empty(),
            history: [0.0; 2],
        }
    }

    fn frequency_hz(&self) -> f32 {
        self.fnum as f32 * CHIP_RATE_HZ * 2f32.powi(self.block as i32 - 20)
    }

    fn update_pitch(&mut self, note_select: bool) {
        for op in &mut self.operators {
            op.set_pitch(self.fnum, self.block, note_select);
        }
    }

    fn set_key(&mut self, on: bool) {
        if on && !self.key_on {
            self.history = [0.0; 2];
            for op in &mut self.operators {
                op.key_on();
            }
        } else if !on && self.key_on {
            for op in &mut self.operators {
                op.key_off();
            }
        }
        self.key_on = on;
    }

    fn is_silent(&self) -> bool {
        !self.operators[0].is_active() && !self.operators[1].is_active()
    }

    fn render(&mut self, lfo: LfoState) -> f32 {
        let freq = self.frequency_hz();

        let feedback = if self.feedback == 0 {
            0.0
        } else {
            // pi/16 .. 4pi radians, expressed in cycles
            let index = 2f32.powi(self.feedback as i32 - 1) / 32.0;
            (self.history[0] + self.history[1]) * 0.5 * index
        };
        let modulator = self.operators[0].output(freq, feedback, lfo);
        self.history = [self.history[1], modulator];

        if self.additive {
            modulator + self.operators[1].output(freq, 0.0, lfo)
        } else {
            self.operators[1].output(freq, modulator * MODULATION_DEPTH, lfo)
        }
    }
}

/// OPL3-style FM synthesizer chip
#[derive(Debug, Clone)]
pub struct Opl3 {
    sample_rate: u32,
    registers: RegisterBank,
    channels: Vec<Channel>,
    lfo: Lfo,
    note_select: bool,
    user_mute: [bool; CHANNEL_COUNT],
}

impl Opl3 {
    /// Create a new chip rendering at 44.1 kHz
    pub fn new() -> Self {
        Self::with_sample_rate(DEFAULT_SAMPLE_RATE)
    }

    /// Create a new chip rendering at a custom sample rate
    pub fn with_sample_rate(sample_rate: u32) -> Self {
        let sample_rate = sample_rate.max(1);
        Opl3 {
            sample_rate,
            registers: RegisterBank::new(),
            channels: (0..CHANNEL_COUNT).map(|_| Channel::new(sample_rate)).collect(),
            lfo: Lfo::new(sample_rate),
            note_select: false,
            user_mute: [false; CHANNEL_COUNT],
        }
    }

    /// Reset the chip to its power-on state
    pub fn reset(&mut self) {
        self.registers.clear();
        for channel in &mut self.channels {
            *channel = Channel::new(self.sample_rate);
        }
        self.lfo = Lfo::new(self.sample_rate);
        self.note_select = false;
    }

    /// Write to a register (the chip port)
    pub fn write(&mut self, addr: u16, value: u8) {
        let Some(target) = RegisterTarget::decode(addr) else {
            return;
        };
        self.registers.write(addr, value);

        match target {
            RegisterTarget::Operator { group, slot } => {
                let (ch, op) = slot_location(slot);
                let channel = &mut self.channels[ch];
                let operator = &mut channel.operators[op];
                match group {
                    OperatorRegister::FlagsMultiplier => operator.write_flags_multiplier(value),
                    OperatorRegister::KslTotalLevel => {
                        operator.write_ksl_total_level(value);
                        operator.set_pitch(channel.fnum, channel.block, self.note_select);
                    }
                    OperatorRegister::AttackDecay => operator.write_attack_decay(value),
                    OperatorRegister::SustainRelease => operator.write_sustain_release(value),
                    OperatorRegister::Waveform => operator.write_waveform(value),
                }
            }
            RegisterTarget::Channel { group, channel } => {
                let note_select = self.note_select;
                let ch = &mut self.channels[channel];
                match group {
                    ChannelRegister::FnumLow => {
                        ch.fnum = (ch.fnum & 0x300) | value as u16;
                        ch.update_pitch(note_select);
                    }
                    ChannelRegister::KeyOnBlock => {
                        ch.fnum = (ch.fnum & 0x0FF) | (((value & 0x03) as u16) << 8);
                        ch.block = (value >> 2) & 0x07;
                        ch.update_pitch(note_select);
                        ch.set_key(value & KEY_ON_BIT != 0);
                    }
                    ChannelRegister::Control => {
                        ch.additive = value & 0x01 != 0;
                        ch.feedback = (value >> 1) & 0x07;
                        ch.output = ChannelOutput::from_bits_truncate(value);
                    }
                }
            }
            RegisterTarget::Global(addr) => match addr {
                NOTE_SELECT => {
                    self.note_select = value & 0x40 != 0;
                    for ch in &mut self.channels {
                        ch.update_pitch(self.note_select);
                    }
                }
                DEPTH_RHYTHM => {
                    self.lfo.deep_tremolo = value & 0x80 != 0;
                    self.lfo.deep_vibrato = value & 0x40 != 0;
                }
                _ => {}
            },
        }
    }

    /// Last value written to a register
    pub fn read(&self, addr: u16) -> u8 {
        self.registers.read(addr)
    }

    /// Whether a channel's key-on bit is set
    pub fn is_key_on(&self, channel: usize) -> bool {
        self.channels.get(channel).is_some_and(|ch| ch.key_on)
    }

    /// Whether a channel still produces output (attack through release)
    pub fn is_channel_active(&self, channel: usize) -> bool {
        self.channels.get(channel).is_some_and(|ch| !ch.is_silent())
    }

    /// Current frequency of a channel in Hz
    pub fn channel_frequency(&self, channel: usize) -> Option<f32> {
        self.channels.get(channel).map(Channel::frequency_hz)
    }

    /// Render the next stereo frame
    pub fn generate(&mut self) -> (i16, i16) {
        let lfo = self.lfo.state();
        let mut left = 0.0f32;
        let mut right = 0.0f32;

        for (index, channel) in self.channels.iter_mut().enumerate() {
            if channel.is_silent() {
                continue;
            }
            let value = channel.render(lfo);
            if self.user_mute[index] {
                continue;
            }
            if channel.output.contains(ChannelOutput::LEFT) {
                left += value;
            }
            if channel.output.contains(ChannelOutput::RIGHT) {
                right += value;
            }
        }
        self.lfo.advance();

        (to_i16(left), to_i16(right))
    }
}

impl Default for Opl3 {
    fn default() -> Self {
        Self::new()
    }
}

#[inline]
fn to_i16(value: f32) -> i16 {
    (value * CHANNEL_GAIN)
        .round()
        .clamp(i16::MIN as f32, i16::MAX as f32) as i16
}

impl OplBackend for Opl3 {
    fn new() -> Self {
        Opl3::new()
    }

    fn with_sample_rate(sample_rate: u32) -> Self {
        Opl3::with_sample_rate(sample_rate)
    }

    fn reset(&mut self) {
        Opl3::reset(self);
    }

    fn write_register(&mut self, addr: u16, value: u8) {
        self.write(addr, value);
    }

    fn read_register(&self, addr: u16) -> u8 {
        self.read(addr)
    }

    fn sample(&mut self) -> (i16, i16) {
        self.generate()
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn set_channel_mute(&mut self, channel: usize, mute: bool) {
        if channel < CHANNEL_COUNT {
            self.user_mute[channel] = mute;
        }
    }

    fn is_channel_muted(&self, channel: usize) -> bool {
        channel < CHANNEL_COUNT && self.user_mute[channel]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Channel 0 with an instant, sustained sine carrier and silent modulator
    fn sine_voice(chip: &mut Opl3, control: u8) {
        chip.write(0x20, 0x21);
        chip.write(0x40, 0x3F);
        chip.write(0x60, 0xF0);
        chip.write(0x80, 0x0F);
        chip.write(0x23, 0x21);
        chip.write(0x43, 0x00);
        chip.write(0x63, 0xF0);
        chip.write(0x83, 0x0F);
        chip.write(0xC0, control);
    }

    fn peak(chip: &mut Opl3, frames: usize) -> (i16, i16) {
        let mut peak = (0i16, 0i16);
        for _ in 0..frames {
            let (l, r) = chip.generate();
            peak.0 = peak.0.max(l.saturating_abs());
            peak.1 = peak.1.max(r.saturating_abs());
        }
        peak
    }

    #[test]
    fn test_reset_chip_is_silent() {
        let mut chip = Opl3::new();
        assert_eq!(peak(&mut chip, 1_000), (0, 0));
    }

    #[test]
    fn test_key_on_produces_sound_and_key_off_releases() {
        let mut chip = Opl3::new();
        sine_voice(&mut chip, 0x30);
        chip.write(0xA0, 0x58);
        chip.write(0xB0, 0x31);
        assert!(chip.is_key_on(0));

        let (l, r) = peak(&mut chip, 2_000);
        assert!(l > 4_000 && r > 4_000, "peak ({l}, {r})");

        chip.write(0xB0, 0x11);
        assert!(!chip.is_key_on(0));
        // Release rate 15 is a few milliseconds
        peak(&mut chip, 2_000);
        assert!(!chip.is_channel_active(0));
        assert_eq!(peak(&mut chip, 100), (0, 0));
    }

    #[test]
    fn test_output_enables_route_channels() {
        let mut chip = Opl3::new();
        sine_voice(&mut chip, 0x10);
        chip.write(0xA0, 0x58);
        chip.write(0xB0, 0x31);
        let (l, r) = peak(&mut chip, 2_000);
        assert!(l > 0);
        assert_eq!(r, 0);
    }

    #[test]
    fn test_frequency_from_fnum_and_block() {
        let mut chip = Opl3::new();
        chip.write(0xA0, 0x56);
        chip.write(0xB0, 0x15);
        let expected = 342.0 * 49_716.0 / 2f32.powi(15);
        assert_relative_eq!(chip.channel_frequency(0).unwrap(), expected, epsilon = 1e-3);
    }

    #[test]
    fn test_additive_mode_sums_operators() {
        let mut fm = Opl3::new();
        let mut additive = Opl3::new();
        for (chip, control) in [(&mut fm, 0x30u8), (&mut additive, 0x31u8)] {
            sine_voice(chip, control);
            // Audible modulator
            chip.write(0x40, 0x00);
            chip.write(0xA0, 0x58);
            chip.write(0xB0, 0x31);
        }
        let fm_frames: Vec<_> = (0..500).map(|_| fm.generate()).collect();
        let add_frames: Vec<_> = (0..500).map(|_| additive.generate()).collect();
        assert_ne!(fm_frames, add_frames);
        let add_peak = add_frames.iter().map(|f| f.0.saturating_abs()).max().unwrap();
        assert!(add_peak > 9_000, "additive peak {add_peak}");
    }

    #[test]
    fn test_channel_mute() {
        let mut chip = Opl3::new();
        sine_voice(&mut chip, 0x30);
        chip.set_channel_mute(0, true);
        assert!(chip.is_channel_muted(0));
        chip.write(0xA0, 0x58);
        chip.write(0xB0, 0x31);
        assert_eq!(peak(&mut chip, 500), (0, 0));
        chip.set_channel_mute(0, false);
        assert!(peak(&mut chip, 500).0 > 0);
    }

    #[test]
    fn test_second_bank_channel() {
        let mut chip = Opl3::new();
        chip.write(0x123, 0x21);
        chip.write(0x163, 0xF0);
        chip.write(0x1C0, 0x30);
        chip.write(0x1A0, 0x58);
        chip.write(0x1B0, 0x31);
        assert!(chip.is_key_on(9));
        assert!(!chip.is_key_on(0));
        assert!(peak(&mut chip, 1_000).0 > 0);
    }

    #[test]
    fn test_register_readback_and_reset() {
        let mut chip = Opl3::new();
        chip.write(0xBD, 0xC0);
        chip.write(0x105, 0x01);
        chip.write(0x2FF, 0x12);
        assert_eq!(chip.read(0xBD), 0xC0);
        assert_eq!(chip.read(0x105), 0x01);
        assert_eq!(chip.read(0x2FF), 0x00);
        chip.reset();
        assert_eq!(chip.read(0xBD), 0x00);
    }
}
