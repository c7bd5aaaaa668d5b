//! Computer keyboard to note/algorithm mapping

use crate::{OplError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of note keys in a layout (one octave)
pub const NOTE_KEYS: usize = 12;

/// Default note row: `a` is the base note, `\` the eleventh semitone above it
pub const DEFAULT_NOTE_KEYS: &str = "asdfghjkl;'\\";

/// Key selecting FM synthesis
pub const ALGORITHM_FM_KEY: char = '0';
/// Key selecting additive synthesis
pub const ALGORITHM_ADDITIVE_KEY: char = '1';
/// Key shifting the note row one octave down
pub const OCTAVE_DOWN_KEY: char = 'z';
/// Key shifting the note row one octave up
pub const OCTAVE_UP_KEY: char = 'x';

const RESERVED_KEYS: [char; 4] = [
    ALGORITHM_FM_KEY,
    ALGORITHM_ADDITIVE_KEY,
    OCTAVE_DOWN_KEY,
    OCTAVE_UP_KEY,
];

/// Two-operator connection (bit 0 of the `0xC0` group)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    /// Modulator drives the carrier's phase
    #[default]
    Fm = 0,
    /// Both operators are summed
    Additive = 1,
}

impl Algorithm {
    /// Connection bit written to `0xC0`
    pub fn connection_bit(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Algorithm::Fm => f.write_str("FM"),
            Algorithm::Additive => f.write_str("additive"),
        }
    }
}

/// What a key does when pressed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    /// Play the note this many semitones above the base note
    Note(u8),
    /// Switch the synthesis algorithm
    SelectAlgorithm(Algorithm),
    /// Shift the note row one octave down
    OctaveDown,
    /// Shift the note row one octave up
    OctaveUp,
}

/// Mapping of twelve keys to the semitones of one octave
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct KeyLayout {
    keys: [char; NOTE_KEYS],
}

impl KeyLayout {
    /// Build a layout from a string of exactly twelve distinct keys
    ///
    /// Letters are matched case-insensitively, so they are stored lowercase.
    /// The algorithm and octave keys (`0`, `1`, `z`, `x`) cannot be used.
    pub fn new(keys: &str) -> Result<Self> {
        let chars: Vec<char> = keys.chars().map(|c| c.to_ascii_lowercase()).collect();
        if chars.len() != NOTE_KEYS {
            return Err(OplError::ConfigError(format!(
                "key layout needs {NOTE_KEYS} keys, got {} in {keys:?}",
                chars.len()
            )));
        }
        for (i, &c) in chars.iter().enumerate() {
            if c.is_control() || c.is_whitespace() {
                return Err(OplError::ConfigError(format!(
                    "key layout contains unusable key {c:?}"
                )));
            }
            if RESERVED_KEYS.contains(&c) {
                return Err(OplError::ConfigError(format!(
                    "key {c:?} is reserved for algorithm/octave selection"
                )));
            }
            if chars[..i].contains(&c) {
                return Err(OplError::ConfigError(format!(
                    "key {c:?} appears twice in the layout"
                )));
            }
        }

        let mut layout = [' '; NOTE_KEYS];
        layout.copy_from_slice(&chars);
        Ok(KeyLayout { keys: layout })
    }

    /// Semitone offset for a note key
    pub fn semitone(&self, key: char) -> Option<u8> {
        let key = key.to_ascii_lowercase();
        self.keys.iter().position(|&c| c == key).map(|i| i as u8)
    }

    /// Action bound to a key, `None` for unmapped keys
    pub fn action(&self, key: char) -> Option<KeyAction> {
        match key.to_ascii_lowercase() {
            ALGORITHM_FM_KEY => Some(KeyAction::SelectAlgorithm(Algorithm::Fm)),
            ALGORITHM_ADDITIVE_KEY => Some(KeyAction::SelectAlgorithm(Algorithm::Additive)),
            OCTAVE_DOWN_KEY => Some(KeyAction::OctaveDown),
            OCTAVE_UP_KEY => Some(KeyAction::OctaveUp),
            other => self.semitone(other).map(KeyAction::Note),
        }
    }

    /// Note keys in semitone order
    pub fn keys(&self) -> &[char] {
        &self.keys
    }
}

impl Default for KeyLayout {
    fn default() -> Self {
        let mut keys = [' '; NOTE_KEYS];
        for (slot, c) in keys.iter_mut().zip(DEFAULT_NOTE_KEYS.chars()) {
            *slot = c;
        }
        KeyLayout { keys }
    }
}

impl fmt::Display for KeyLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.keys.iter().try_for_each(|c| write!(f, "{c}"))
    }
}

impl TryFrom<String> for KeyLayout {
    type Error = OplError;

    fn try_from(value: String) -> Result<Self> {
        KeyLayout::new(&value)
    }
}

impl From<KeyLayout> for String {
    fn from(layout: KeyLayout) -> Self {
        layout.to_string()
    }
}
