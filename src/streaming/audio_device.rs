//! Audio device integration using rodio
//!
//! Plays the chip output on the system's default output device.

use super::{fill_buffer, StreamConfig};
use crate::{OplError, Result, SharedChip};
use rodio::{OutputStream, Sink, Source};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Audio source that renders the chip one buffer at a time
pub struct ChipSource {
    chip: SharedChip,
    sample_rate: u32,
    channels: u16,
    finished: Arc<AtomicBool>,
    /// Interleaved samples from the last fill
    buffer: Vec<i16>,
    /// Current position in `buffer`
    buffer_pos: usize,
}

impl ChipSource {
    /// Create a source drawing `config.buffer_frames` frames per fill
    pub fn new(chip: SharedChip, config: StreamConfig, finished: Arc<AtomicBool>) -> Self {
        let len = config.buffer_len().max(config.channels as usize);
        ChipSource {
            chip,
            sample_rate: config.sample_rate,
            channels: config.channels,
            finished,
            buffer: vec![0; len],
            buffer_pos: len, // Render on first read
        }
    }

    fn refill(&mut self) {
        let mut chip = self.chip.lock();
        fill_buffer(&mut **chip, &mut self.buffer);
        self.buffer_pos = 0;
    }
}

impl Source for ChipSource {
    fn current_frame_len(&self) -> Option<usize> {
        let remaining = self.buffer.len().saturating_sub(self.buffer_pos);
        if remaining == 0 {
            Some(self.buffer.len())
        } else {
            Some(remaining)
        }
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        None
    }
}

impl Iterator for ChipSource {
    type Item = i16;

    fn next(&mut self) -> Option<i16> {
        if self.finished.load(Ordering::Relaxed) {
            return None;
        }
        if self.buffer_pos >= self.buffer.len() {
            self.refill();
        }
        let sample = self.buffer[self.buffer_pos];
        self.buffer_pos += 1;
        Some(sample)
    }
}

/// Audio playback device using rodio
pub struct AudioDevice {
    _stream: OutputStream,
    sink: Sink,
    finished: Arc<AtomicBool>,
}

impl AudioDevice {
    /// Open the default output device and start streaming the chip
    pub fn new(config: StreamConfig, chip: SharedChip) -> Result<Self> {
        let (stream, stream_handle) = OutputStream::try_default().map_err(|e| {
            OplError::AudioDeviceError(format!("Failed to create audio stream: {}", e))
        })?;

        let sink = Sink::try_new(&stream_handle).map_err(|e| {
            OplError::AudioDeviceError(format!("Failed to create audio sink: {}", e))
        })?;

        let finished = Arc::new(AtomicBool::new(false));
        sink.append(ChipSource::new(chip, config, Arc::clone(&finished)));

        log::debug!(
            "audio stream open: {} Hz, {} channels, {} frames ({:.1} ms)",
            config.sample_rate,
            config.channels,
            config.buffer_frames,
            config.latency_ms()
        );

        Ok(AudioDevice {
            _stream: stream,
            sink,
            finished,
        })
    }

    /// Pause playback
    pub fn pause(&self) {
        self.sink.pause();
    }

    /// Resume playback
    pub fn play(&self) {
        self.sink.play();
    }

    /// End the stream instead of rendering forever
    pub fn finish(&self) {
        self.finished.store(true, Ordering::Relaxed);
    }

    /// Whether [`AudioDevice::finish`] has been called
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Relaxed)
    }
}

impl Drop for AudioDevice {
    fn drop(&mut self) {
        self.finish();
        self.pause();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opl::Opl3;
    use crate::shared_chip;

    fn try_audio_device() -> Option<AudioDevice> {
        match AudioDevice::new(StreamConfig::default(), shared_chip(Opl3::new())) {
            Ok(device) => Some(device),
            Err(err) => {
                eprintln!(
                    "Skipping streaming::audio_device test (audio backend unavailable): {}",
                    err
                );
                None
            }
        }
    }

    fn voiced_chip() -> SharedChip {
        let chip = shared_chip(Opl3::new());
        {
            let mut chip = chip.lock();
            for (addr, value) in [
                (0x23, 0x01),
                (0x63, 0xF0),
                (0x83, 0x0F),
                (0xC0, 0x30),
                (0xA0, 0x58),
                (0xB0, 0x31),
            ] {
                chip.write_register(addr, value);
            }
        }
        chip
    }

    #[test]
    fn test_audio_device_creation() {
        let Some(device) = try_audio_device() else {
            return;
        };
        assert!(!device.is_finished());
        device.pause();
        device.play();
        device.finish();
        assert!(device.is_finished());
    }

    #[test]
    fn test_source_format() {
        let config = StreamConfig::default();
        let source = ChipSource::new(
            shared_chip(Opl3::new()),
            config,
            Arc::new(AtomicBool::new(false)),
        );
        assert_eq!(source.sample_rate(), 44_100);
        assert_eq!(source.channels(), 2);
        assert_eq!(source.total_duration(), None);
        assert_eq!(source.current_frame_len(), Some(1024));
    }

    #[test]
    fn test_source_silence_from_idle_chip() {
        let mut source = ChipSource::new(
            shared_chip(Opl3::new()),
            StreamConfig::default(),
            Arc::new(AtomicBool::new(false)),
        );
        assert!(source.by_ref().take(3000).all(|s| s == 0));
    }

    #[test]
    fn test_source_renders_across_refills() {
        let config = StreamConfig {
            buffer_frames: 16,
            ..Default::default()
        };
        let mut source = ChipSource::new(voiced_chip(), config, Arc::new(AtomicBool::new(false)));
        let samples: Vec<i16> = source.by_ref().take(1000).collect();
        assert_eq!(samples.len(), 1000);
        assert!(samples.iter().any(|&s| s != 0));
        assert_eq!(source.current_frame_len(), Some(32 - 1000 % 32));
    }

    #[test]
    fn test_source_finished_signal() {
        let finished = Arc::new(AtomicBool::new(false));
        let mut source = ChipSource::new(
            shared_chip(Opl3::new()),
            StreamConfig::default(),
            Arc::clone(&finished),
        );
        assert!(source.next().is_some());
        finished.store(true, Ordering::Relaxed);
        assert_eq!(source.next(), None);
    }
}
