//! OPL3 Register Definitions
//!
//! The chip exposes two banks of 256 registers. Operator parameters live in
//! five groups of 22 addresses (18 usable slots per bank), channel parameters
//! in three groups of 9 addresses, and a handful of global registers control
//! note-select, LFO depth and OPL3 mode.

use bitflags::bitflags;
use std::fmt;

/// Total addressable registers (two banks of 256)
pub const REGISTER_COUNT: usize = 0x200;

/// Two-operator channels per bank
pub const CHANNELS_PER_BANK: usize = 9;

/// Two-operator channels across both banks
pub const CHANNEL_COUNT: usize = CHANNELS_PER_BANK * 2;

/// Operator slots per bank
pub const SLOTS_PER_BANK: usize = 18;

/// CSM / note-select - 0x08
pub const NOTE_SELECT: u16 = 0x08;
/// Tremolo depth, vibrato depth, rhythm mode - 0xBD
pub const DEPTH_RHYTHM: u16 = 0xBD;

/// Key-on bit inside the `0xB0` group
pub const KEY_ON_BIT: u8 = 0x20;

bitflags! {
    /// Upper nibble of the `0x20` operator group
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct OperatorFlags: u8 {
        /// Amplitude modulation (tremolo)
        const TREMOLO = 0x80;
        /// Frequency modulation (vibrato)
        const VIBRATO = 0x40;
        /// Hold at sustain level while the key is down
        const SUSTAIN = 0x20;
        /// Key scale rate
        const KSR = 0x10;
    }
}

bitflags! {
    /// Output enables in the `0xC0` channel group
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ChannelOutput: u8 {
        /// Output A (left)
        const LEFT = 0x10;
        /// Output B (right)
        const RIGHT = 0x20;
        /// Output C (not mixed)
        const REAR_LEFT = 0x40;
        /// Output D (not mixed)
        const REAR_RIGHT = 0x80;
    }
}

/// Operator register groups (one address per operator slot)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperatorRegister {
    /// Tremolo / vibrato / sustain / KSR / multiplier - 0x20
    FlagsMultiplier = 0x20,
    /// Key scale level / total level - 0x40
    KslTotalLevel = 0x40,
    /// Attack rate / decay rate - 0x60
    AttackDecay = 0x60,
    /// Sustain level / release rate - 0x80
    SustainRelease = 0x80,
    /// Waveform select - 0xE0
    Waveform = 0xE0,
}

impl OperatorRegister {
    /// Group base address
    pub fn base(&self) -> u8 {
        *self as u8
    }

    fn from_base(base: u8) -> Option<Self> {
        match base {
            0x20 => Some(OperatorRegister::FlagsMultiplier),
            0x40 => Some(OperatorRegister::KslTotalLevel),
            0x60 => Some(OperatorRegister::AttackDecay),
            0x80 => Some(OperatorRegister::SustainRelease),
            0xE0 => Some(OperatorRegister::Waveform),
            _ => None,
        }
    }
}

/// Channel register groups (one address per channel)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelRegister {
    /// F-number low 8 bits - 0xA0
    FnumLow = 0xA0,
    /// Key-on / block / F-number high 2 bits - 0xB0
    KeyOnBlock = 0xB0,
    /// Output enables / feedback / connection - 0xC0
    Control = 0xC0,
}

impl ChannelRegister {
    /// Group base address
    pub fn base(&self) -> u8 {
        *self as u8
    }
}

/// What a register address controls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterTarget {
    /// Per-operator parameter (slot 0-35)
    Operator {
        /// Register group
        group: OperatorRegister,
        /// Operator slot across both banks
        slot: usize,
    },
    /// Per-channel parameter (channel 0-17)
    Channel {
        /// Register group
        group: ChannelRegister,
        /// Channel across both banks
        channel: usize,
    },
    /// Global register (no per-voice decoding)
    Global(u16),
}

impl RegisterTarget {
    /// Decode a register address, `None` for addresses above `0x1FF`
    pub fn decode(addr: u16) -> Option<Self> {
        if addr as usize >= REGISTER_COUNT {
            return None;
        }
        let bank = (addr >> 8) as usize;
        let low = (addr & 0xFF) as u8;

        let target = match low {
            0x20..=0x35 | 0x40..=0x55 | 0x60..=0x75 | 0x80..=0x95 | 0xE0..=0xF5 => {
                let group = OperatorRegister::from_base(low & 0xE0);
                match (group, slot_from_offset(low & 0x1F)) {
                    (Some(group), Some(slot)) => RegisterTarget::Operator {
                        group,
                        slot: bank * SLOTS_PER_BANK + slot,
                    },
                    _ => RegisterTarget::Global(addr),
                }
            }
            0xA0..=0xA8 => RegisterTarget::Channel {
                group: ChannelRegister::FnumLow,
                channel: bank * CHANNELS_PER_BANK + (low & 0x0F) as usize,
            },
            0xB0..=0xB8 => RegisterTarget::Channel {
                group: ChannelRegister::KeyOnBlock,
                channel: bank * CHANNELS_PER_BANK + (low & 0x0F) as usize,
            },
            0xC0..=0xC8 => RegisterTarget::Channel {
                group: ChannelRegister::Control,
                channel: bank * CHANNELS_PER_BANK + (low & 0x0F) as usize,
            },
            _ => RegisterTarget::Global(addr),
        };
        Some(target)
    }
}

/// Slot index (0-17) for an operator offset inside a group, `None` for the holes
pub fn slot_from_offset(offset: u8) -> Option<usize> {
    if offset > 0x15 || (offset & 0x07) >= 6 {
        return None;
    }
    Some((offset as usize / 8) * 6 + (offset as usize % 8))
}

/// Channel (0-17) and operator (0 = modulator, 1 = carrier) driven by a slot (0-35)
pub fn slot_location(slot: usize) -> (usize, usize) {
    let bank = slot / SLOTS_PER_BANK;
    let s = slot % SLOTS_PER_BANK;
    let channel = (s / 6) * 3 + s % 3;
    let operator = (s % 6) / 3;
    (bank * CHANNELS_PER_BANK + channel, operator)
}

/// Full address of an operator register for `channel` (0-17) and `operator` (0-1)
pub fn operator_address(group: OperatorRegister, channel: usize, operator: usize) -> u16 {
    let bank = (channel / CHANNELS_PER_BANK) as u16;
    let ch = channel % CHANNELS_PER_BANK;
    let offset = (ch / 3) * 8 + ch % 3 + (operator & 1) * 3;
    (bank << 8) | (group.base() as u16 + offset as u16)
}

/// Full address of a channel register for `channel` (0-17)
pub fn channel_address(group: ChannelRegister, channel: usize) -> u16 {
    let bank = (channel / CHANNELS_PER_BANK) as u16;
    (bank << 8) | (group.base() as u16 + (channel % CHANNELS_PER_BANK) as u16)
}

/// Raw register bank (512 bytes)
#[derive(Clone)]
pub struct RegisterBank {
    registers: [u8; REGISTER_COUNT],
}

impl RegisterBank {
    /// Create a new register bank with all values set to 0
    pub fn new() -> Self {
        RegisterBank {
            registers: [0; REGISTER_COUNT],
        }
    }

    /// Read a register value (0 outside the map)
    pub fn read(&self, addr: u16) -> u8 {
        self.registers.get(addr as usize).copied().unwrap_or(0)
    }

    /// Write a register value (ignored outside the map)
    pub fn write(&mut self, addr: u16, value: u8) {
        if let Some(slot) = self.registers.get_mut(addr as usize) {
            *slot = value;
        }
    }

    /// Clear every register
    pub fn clear(&mut self) {
        self.registers.fill(0);
    }
}

impl Default for RegisterBank {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RegisterBank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let used = self.registers.iter().filter(|&&v| v != 0).count();
        f.debug_struct("RegisterBank")
            .field("non_zero", &used)
            .finish()
    }
}
