//! Keyboard session
//!
//! `Session` is the context the key handler works on: the shared chip, the
//! channel being played, the selected algorithm, the octave shift and the
//! currently held key. Nothing here is global, so several sessions can drive
//! different channels of one chip.

use crate::backend::OplBackend;
use crate::config::SynthConfig;
use crate::keyboard::{Algorithm, KeyAction, KeyLayout, NOTE_KEYS};
use crate::note::{format_bits, NoteRegisters, TOP_NOTE};
use crate::opl::registers::{channel_address, ChannelRegister};
use crate::patch::VoicePatch;
use crate::{Result, SharedChip};
use std::fmt;

/// Highest octave shift in either direction
pub const MAX_OCTAVE_SHIFT: i8 = 4;

/// A note started by a key press
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoteOn {
    /// Key that triggered the note
    pub key: char,
    /// MIDI note number
    pub note: u8,
    /// Encoded block and f-number
    pub registers: NoteRegisters,
    /// Algorithm in effect
    pub algorithm: Algorithm,
}

impl fmt::Display for NoteOn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PLAY {} block[{}] fnum:{} ({})",
            self.note, self.registers.block, self.registers.fnum, self.algorithm
        )
    }
}

/// Keyboard-to-chip context
pub struct Session {
    chip: SharedChip,
    channel: usize,
    layout: KeyLayout,
    base_note: u8,
    octave_shift: i8,
    algorithm: Algorithm,
    patch: VoicePatch,
    held: Option<(char, NoteRegisters)>,
}

impl Session {
    /// Create a session for the channel named in `config`
    ///
    /// Nothing is written to the chip until [`Session::configure`].
    pub fn new(chip: SharedChip, config: &SynthConfig) -> Result<Self> {
        config.validate()?;
        Ok(Session {
            chip,
            channel: config.channel,
            layout: config.layout.clone(),
            base_note: config.base_note,
            octave_shift: 0,
            algorithm: config.patch.algorithm,
            patch: config.patch,
            held: None,
        })
    }

    /// Write the voice patch to the chip
    pub fn configure(&mut self) {
        let writes = self.patch.register_writes(self.channel);
        log::debug!(
            "configuring channel {} ({} register writes)",
            self.channel,
            writes.len()
        );
        let mut chip = self.chip.lock();
        for (addr, value) in writes {
            write_register(&mut **chip, addr, value);
        }
    }

    /// Handle a key press
    ///
    /// Returns the note started, if the key is a note key. Algorithm and octave
    /// keys update the session and return `None`, as do unmapped keys.
    pub fn key_down(&mut self, key: char) -> Option<NoteOn> {
        let key = key.to_ascii_lowercase();
        match self.layout.action(key)? {
            KeyAction::Note(semitone) => self.play(key, semitone),
            KeyAction::SelectAlgorithm(algorithm) => {
                self.set_algorithm(algorithm);
                None
            }
            KeyAction::OctaveDown => {
                self.shift_octave(-1);
                None
            }
            KeyAction::OctaveUp => {
                self.shift_octave(1);
                None
            }
        }
    }

    /// Handle a key release
    ///
    /// Only releasing the key of the sounding note keys it off; the block and
    /// f-number stay in place so the release keeps its pitch.
    pub fn key_up(&mut self, key: char) {
        let key = key.to_ascii_lowercase();
        if matches!(self.held, Some((held, _)) if held == key) {
            self.release();
        }
    }

    /// Key off the sounding note, if any
    pub fn all_notes_off(&mut self) {
        if self.held.is_some() {
            self.release();
        }
    }

    /// Select the algorithm and rewrite the channel's `0xC0` register
    pub fn set_algorithm(&mut self, algorithm: Algorithm) {
        self.algorithm = algorithm;
        log::info!("ALGORITHM: {} ({})", algorithm.connection_bit(), algorithm);
        let mut chip = self.chip.lock();
        write_register(&mut **chip, self.control_address(), self.control_value());
    }

    /// Move the note row by `delta` octaves, returning the new shift
    ///
    /// The shift is clamped so every layout key keeps a pitch of its own: no
    /// key goes below note 0 or above the top of block 7.
    pub fn shift_octave(&mut self, delta: i8) -> i8 {
        let lowest = -((self.base_note / 12) as i8).min(MAX_OCTAVE_SHIFT);
        let top_key = self.base_note as i16 + NOTE_KEYS as i16 - 1;
        let room_above = ((TOP_NOTE as i16 - top_key) / 12).max(0);
        let highest = (room_above as i8).min(MAX_OCTAVE_SHIFT);
        let shift = self.octave_shift.saturating_add(delta).clamp(lowest, highest);
        if shift != self.octave_shift {
            self.octave_shift = shift;
            log::info!("octave shift {shift:+}");
        }
        self.octave_shift
    }

    /// Selected algorithm
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Current octave shift
    pub fn octave_shift(&self) -> i8 {
        self.octave_shift
    }

    /// Channel the session plays
    pub fn channel(&self) -> usize {
        self.channel
    }

    /// Key layout in use
    pub fn layout(&self) -> &KeyLayout {
        &self.layout
    }

    /// Registers of the sounding note
    pub fn held_note(&self) -> Option<NoteRegisters> {
        self.held.map(|(_, regs)| regs)
    }

    /// Shared chip handle
    pub fn chip(&self) -> &SharedChip {
        &self.chip
    }

    fn note_for(&self, semitone: u8) -> u8 {
        let note = self.base_note as i16 + semitone as i16 + 12 * self.octave_shift as i16;
        note.clamp(0, 127) as u8
    }

    fn control_address(&self) -> u16 {
        channel_address(ChannelRegister::Control, self.channel)
    }

    fn control_value(&self) -> u8 {
        self.patch.control_value(self.algorithm)
    }

    fn play(&mut self, key: char, semitone: u8) -> Option<NoteOn> {
        let note = self.note_for(semitone);
        let registers = NoteRegisters::from_midi(note);
        let key_on_addr = channel_address(ChannelRegister::KeyOnBlock, self.channel);

        {
            let mut guard = self.chip.lock();
            let chip: &mut dyn OplBackend = &mut **guard;
            if let Some((_, previous)) = self.held {
                // Retrigger: the envelope only restarts on a key-on edge
                write_register(chip, key_on_addr, previous.b0_value(false));
            }
            write_register(chip, self.control_address(), self.control_value());
            write_register(
                chip,
                channel_address(ChannelRegister::FnumLow, self.channel),
                registers.a0_value(),
            );
            write_register(chip, key_on_addr, registers.b0_value(true));
        }
        self.held = Some((key, registers));

        let note_on = NoteOn {
            key,
            note,
            registers,
            algorithm: self.algorithm,
        };
        log::info!("{note_on}");
        Some(note_on)
    }

    fn release(&mut self) {
        if let Some((_, registers)) = self.held.take() {
            let mut chip = self.chip.lock();
            write_register(
                &mut **chip,
                channel_address(ChannelRegister::KeyOnBlock, self.channel),
                registers.b0_value(false),
            );
            log::info!("STOP NOTE");
        }
    }
}

fn write_register(chip: &mut dyn OplBackend, addr: u16, value: u8) {
    log::trace!("reg {addr:#05X} <- {value:#04X} [{}]", format_bits(value));
    chip.write_register(addr, value);
}
