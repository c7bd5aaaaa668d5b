//! Audio Output & Streaming
//!
//! The chip is rendered on demand from the audio thread: `ChipSource` is a
//! rodio source that refills a small interleaved buffer from the shared chip
//! whenever the previous one has been consumed. The key handler only holds the
//! chip lock for a few register writes, so the two never wait on each other
//! for longer than one buffer fill.

pub mod audio_device;

pub use audio_device::{AudioDevice, ChipSource};

use crate::backend::OplBackend;
use crate::config::SynthConfig;

/// Stereo output
pub const DEFAULT_CHANNELS: u16 = 2;

/// Configuration for streaming playback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamConfig {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of interleaved channels
    pub channels: u16,
    /// Frames rendered per buffer fill
    pub buffer_frames: usize,
}

impl StreamConfig {
    /// Stream settings for a synthesizer configuration
    pub fn from_config(config: &SynthConfig) -> Self {
        StreamConfig {
            sample_rate: config.sample_rate,
            channels: DEFAULT_CHANNELS,
            buffer_frames: config.buffer_frames,
        }
    }

    /// Interleaved samples per buffer
    pub fn buffer_len(&self) -> usize {
        self.buffer_frames * self.channels as usize
    }

    /// Buffer latency in milliseconds
    pub fn latency_ms(&self) -> f32 {
        self.buffer_frames as f32 / self.sample_rate as f32 * 1000.0
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        StreamConfig::from_config(&SynthConfig::default())
    }
}

/// Fill an interleaved stereo buffer from the chip
///
/// The buffer is zeroed first, then `len / 2` frames are rendered into it, so
/// a trailing odd sample stays silent.
pub fn fill_buffer(chip: &mut dyn OplBackend, buffer: &mut [i16]) {
    buffer.fill(0);
    chip.fill_interleaved(buffer);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opl::Opl3;
    use approx::assert_relative_eq;

    #[test]
    fn test_default_stream_config() {
        let config = StreamConfig::default();
        assert_eq!(config.sample_rate, 44_100);
        assert_eq!(config.channels, 2);
        assert_eq!(config.buffer_frames, 512);
        assert_eq!(config.buffer_len(), 1024);
        assert_relative_eq!(config.latency_ms(), 11.61, epsilon = 0.01);
    }

    #[test]
    fn test_fill_buffer_silent_chip_zeroes() {
        let mut chip = Opl3::new();
        let mut buffer = vec![123i16; 64];
        fill_buffer(&mut chip, &mut buffer);
        assert!(buffer.iter().all(|&v| v == 0));
    }

    #[test]
    fn test_fill_buffer_odd_tail_is_zero() {
        let mut chip = Opl3::new();
        chip.write(0x23, 0x01);
        chip.write(0x63, 0xF0);
        chip.write(0x83, 0x0F);
        chip.write(0xC0, 0x30);
        chip.write(0xA0, 0x58);
        chip.write(0xB0, 0x31);
        let mut buffer = vec![-1i16; 201];
        fill_buffer(&mut chip, &mut buffer);
        assert_eq!(buffer[200], 0);
        assert!(buffer[..200].iter().any(|&v| v != 0));
        // Both outputs enabled: left and right carry the same signal
        for frame in buffer[..200].chunks_exact(2) {
            assert_eq!(frame[0], frame[1]);
        }
    }
}
