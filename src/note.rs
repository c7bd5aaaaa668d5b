//! Note to f-number/block encoding
//!
//! The chip pitch is a 10-bit f-number scaled by a 3-bit block (octave):
//! `freq = fnum * 49716 / 2^(20 - block)`. Notes are looked up in a 12-entry
//! f-number table indexed by semitone, and the block is taken from the note's
//! octave.

use crate::opl::constants::CHIP_RATE_HZ;
use crate::opl::registers::KEY_ON_BIT;

/// F-numbers for the twelve semitones of an octave, starting at C
pub const F_NUMBERS: [u16; 12] = [342, 363, 385, 408, 432, 458, 485, 514, 544, 577, 611, 647];

/// Highest block value (3 bits)
pub const MAX_BLOCK: u8 = 7;

/// Highest note with its own block; notes above reuse block 7
pub const TOP_NOTE: u8 = MAX_BLOCK * 12 + 11;

/// Block and f-number for a note
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoteRegisters {
    /// Octave (0-7)
    pub block: u8,
    /// 10-bit f-number
    pub fnum: u16,
}

impl NoteRegisters {
    /// Encode a MIDI note number
    ///
    /// `block = note / 12` (clamped to 7) and `fnum = F_NUMBERS[note % 12]`.
    pub fn from_midi(note: u8) -> Self {
        NoteRegisters {
            block: (note / 12).min(MAX_BLOCK),
            fnum: F_NUMBERS[(note % 12) as usize],
        }
    }

    /// Value for the `0xA0` group (f-number low byte)
    pub fn a0_value(&self) -> u8 {
        (self.fnum & 0xFF) as u8
    }

    /// Value for the `0xB0` group (key-on, block, f-number high bits)
    pub fn b0_value(&self, key_on: bool) -> u8 {
        let key = if key_on { KEY_ON_BIT } else { 0 };
        key | ((self.block & 0x07) << 2) | ((self.fnum >> 8) & 0x03) as u8
    }

    /// Frequency the chip produces for this block/f-number
    pub fn frequency(&self) -> f32 {
        fnum_to_freq(self.fnum, self.block)
    }
}

/// Equal-tempered frequency of a MIDI note (A4 = note 69 = 440 Hz)
pub fn note_to_freq(note: u8) -> f32 {
    (440.0 / 32.0) * 2f32.powf((note as f32 - 9.0) / 12.0)
}

/// Chip output frequency for an f-number and block
pub fn fnum_to_freq(fnum: u16, block: u8) -> f32 {
    fnum as f32 * CHIP_RATE_HZ * 2f32.powi(block as i32 - 20)
}

/// Render a register value as eight binary digits
pub fn format_bits(value: u8) -> String {
    format!("{value:08b}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_middle_c_encoding() {
        let regs = NoteRegisters::from_midi(60);
        assert_eq!(regs, NoteRegisters { block: 5, fnum: 342 });
        assert_eq!(regs.a0_value(), 0x56);
        assert_eq!(regs.b0_value(true), 0x35);
        assert_eq!(regs.b0_value(false), 0x15);
    }

    #[test]
    fn test_lookup_covers_every_note() {
        for note in 0..=127u8 {
            let regs = NoteRegisters::from_midi(note);
            assert_eq!(regs.fnum, F_NUMBERS[(note % 12) as usize]);
            assert!(regs.block <= MAX_BLOCK);
            assert!(regs.fnum < 0x400);
        }
        assert_eq!(NoteRegisters::from_midi(127).block, 7);
        assert_eq!(NoteRegisters::from_midi(11).block, 0);
    }

    #[test]
    fn test_high_fnum_bits_go_to_b0() {
        // F-number 514 = 0x202
        let regs = NoteRegisters::from_midi(67);
        assert_eq!(regs.fnum, 514);
        assert_eq!(regs.a0_value(), 0x02);
        assert_eq!(regs.b0_value(true), 0x20 | (5 << 2) | 0x02);
    }

    #[test]
    fn test_table_tracks_semitones() {
        for pair in F_NUMBERS.windows(2) {
            let ratio = pair[1] as f32 / pair[0] as f32;
            assert_relative_eq!(ratio, 2f32.powf(1.0 / 12.0), epsilon = 0.005);
        }
    }

    #[test]
    fn test_frequencies() {
        assert_relative_eq!(note_to_freq(69), 440.0, epsilon = 1e-3);
        assert_relative_eq!(note_to_freq(57), 220.0, epsilon = 1e-3);
        // Block 4 puts the table on middle C
        assert_relative_eq!(fnum_to_freq(342, 4), 259.44, epsilon = 0.01);
        assert_relative_eq!(
            NoteRegisters::from_midi(60).frequency(),
            2.0 * fnum_to_freq(342, 4),
            epsilon = 1e-3
        );
    }

    #[test]
    fn test_format_bits() {
        assert_eq!(format_bits(0x35), "00110101");
        assert_eq!(format_bits(0), "00000000");
    }
}
