//! OPL3-style FM synthesis chip
//!
//! - `registers`: register map, slot decoding and the raw register bank
//! - `constants`: lookup tables and envelope/LFO timing
//! - `envelope`: attack/decay/sustain/release generator
//! - `operator`: phase generator, waveforms and output level
//! - `chip`: the 18-channel two-operator chip (`Opl3`)

pub mod chip;
pub mod constants;
pub mod envelope;
pub mod operator;
pub mod registers;

pub use chip::Opl3;
pub use registers::{ChannelOutput, OperatorFlags, RegisterBank};
