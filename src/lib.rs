//! Keyboard-driven OPL3-style FM synthesizer
//!
//! A small harness that configures a two-operator FM voice on an OPL3-style
//! sound chip, maps a row of computer keys to notes, and streams the chip's
//! interleaved stereo output to the default audio device.
//!
//! # Features
//! - Register-compatible, non-bit-accurate OPL3 FM backend (`opl`)
//! - Backend trait so other chip implementations can be plugged in
//! - Note to f-number/block encoding with the classic 12-entry table
//! - Explicit `Session` context holding the chip, algorithm and octave state
//! - JSON configuration for the voice patch and key layout
//! - Offline rendering of key scripts to WAV
//!
//! # Crate feature flags
//! - `streaming` (default): Real-time audio output via rodio (`streaming`)
//! - `export-wav` (default): Offline rendering to WAV files via hound (`export`)
//!
//! # Quick start
//! ## Core chip only
//! ```no_run
//! use opl_keys::{Opl3, OplBackend};
//! let mut chip = Opl3::new();
//! chip.write_register(0x23, 0x01); // Carrier multiplier
//! chip.write_register(0x63, 0xF0); // Carrier attack rate 15
//! chip.write_register(0xC0, 0x30); // Left + right, FM
//! chip.write_register(0xA0, 0x58); // F-number low
//! chip.write_register(0xB0, 0x31); // Key on, block 4
//! let (left, right) = chip.sample();
//! ```
//!
//! ## Keyboard session
//! ```no_run
//! use opl_keys::{Opl3, OplBackend, Session, SynthConfig, shared_chip};
//! let config = SynthConfig::default();
//! let chip = shared_chip(Opl3::with_sample_rate(config.sample_rate));
//! let mut session = Session::new(chip, &config).unwrap();
//! session.configure();
//! session.key_down('a');
//! session.key_up('a');
//! ```

#![warn(missing_docs)]

pub mod backend; // Backend trait abstraction
pub mod config; // Runtime configuration
#[cfg(feature = "export-wav")]
pub mod export; // Offline rendering
pub mod input; // Terminal key events
pub mod keyboard; // Key layout
pub mod note; // Note / f-number encoding
pub mod opl; // OPL3-style FM chip (core)
pub mod patch; // Voice patch registers
pub mod session; // Keyboard session context
#[cfg(feature = "streaming")]
pub mod streaming; // Audio Output & Streaming

use parking_lot::Mutex;
use std::sync::Arc;

/// Error types for synthesizer operations
#[derive(thiserror::Error, Debug)]
pub enum OplError {
    /// IO error from filesystem or terminal
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Audio device error
    #[error("Audio device error: {0}")]
    AudioDeviceError(String),

    /// Error writing audio file
    #[error("Audio file write error: {0}")]
    AudioFileError(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// Malformed JSON configuration
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<String> for OplError {
    /// Converts a String into `OplError::Other`.
    ///
    /// Prefer the specific variants (`ConfigError`, `AudioDeviceError`, ...)
    /// where the failure has a clear category.
    fn from(msg: String) -> Self {
        OplError::Other(msg)
    }
}

impl From<&str> for OplError {
    /// Converts a string slice into `OplError::Other`.
    fn from(msg: &str) -> Self {
        OplError::Other(msg.to_string())
    }
}

/// Result type for synthesizer operations
pub type Result<T> = std::result::Result<T, OplError>;

/// Chip handle shared between the input thread and the audio callback
pub type SharedChip = Arc<Mutex<Box<dyn OplBackend>>>;

/// Wrap a backend into a [`SharedChip`]
pub fn shared_chip<B: OplBackend + 'static>(chip: B) -> SharedChip {
    Arc::new(Mutex::new(Box::new(chip)))
}

// Public API exports
pub use backend::OplBackend;
pub use config::SynthConfig;
pub use keyboard::{Algorithm, KeyAction, KeyLayout};
pub use note::{NoteRegisters, F_NUMBERS};
pub use opl::Opl3;
pub use patch::{OperatorPatch, VoicePatch};
pub use session::{NoteOn, Session};

#[cfg(feature = "streaming")]
pub use streaming::{AudioDevice, ChipSource, StreamConfig};
