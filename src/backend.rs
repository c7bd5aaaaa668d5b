//! Backend trait abstraction for OPL chip implementations
//!
//! This module defines the interface the keyboard session and the audio
//! callback talk to, whether the chip behind it is the bundled FM softsynth
//! or another emulator.

/// Common interface for OPL chip backends
///
/// Register addresses follow the OPL3 layout: `0x000-0x0FF` address the first
/// register bank and `0x100-0x1FF` the second one.
///
/// # Example
///
/// ```
/// use opl_keys::{Opl3, OplBackend};
///
/// fn key_on<B: OplBackend>(chip: &mut B) {
///     chip.write_register(0xA0, 0x56); // F-number low
///     chip.write_register(0xB0, 0x35); // Key on, block 5, F-number high
///
///     let (left, right) = chip.sample();
/// }
/// ```
pub trait OplBackend: Send {
    /// Create a new backend instance at 44,100 Hz
    fn new() -> Self
    where
        Self: Sized;

    /// Create a backend rendering at a custom sample rate
    fn with_sample_rate(sample_rate: u32) -> Self
    where
        Self: Sized;

    /// Reset the backend to its power-on state
    ///
    /// Clears all registers and silences every channel.
    fn reset(&mut self);

    /// Write to a chip register
    ///
    /// Addresses above `0x1FF` are ignored.
    fn write_register(&mut self, addr: u16, value: u8);

    /// Read back the last value written to a register
    ///
    /// Returns `0x00` for addresses above `0x1FF`.
    fn read_register(&self, addr: u16) -> u8;

    /// Produce the next stereo output frame
    fn sample(&mut self) -> (i16, i16);

    /// Fill an interleaved `L, R, L, R, ...` buffer
    ///
    /// A trailing odd element is left untouched.
    fn fill_interleaved(&mut self, buffer: &mut [i16]) {
        for frame in buffer.chunks_exact_mut(2) {
            let (left, right) = self.sample();
            frame[0] = left;
            frame[1] = right;
        }
    }

    /// Output sample rate in Hz
    fn sample_rate(&self) -> u32;

    /// Mute or unmute a channel (0-17)
    fn set_channel_mute(&mut self, channel: usize, mute: bool);

    /// Check if a channel is muted
    fn is_channel_muted(&self, channel: usize) -> bool;
}
