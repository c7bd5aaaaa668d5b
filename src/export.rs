//! Offline rendering of key scripts to WAV files
//!
//! A script is a string of keys played one after another: every note key is
//! held for `note_ms` and followed by `gap_ms` of release, `.` rests for the
//! same time, and algorithm/octave keys take effect immediately. Whitespace is
//! ignored, so scripts can be grouped into bars.

use crate::session::Session;
use crate::{OplError, Result};
use std::path::Path;

/// Rest marker in scripts
pub const REST: char = '.';

/// Timing of a rendered script
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptTiming {
    /// How long each note key is held
    pub note_ms: u64,
    /// Silence after each key release
    pub gap_ms: u64,
    /// Extra time rendered after the last step for the release tail
    pub tail_ms: u64,
}

impl Default for ScriptTiming {
    fn default() -> Self {
        ScriptTiming {
            note_ms: 250,
            gap_ms: 50,
            tail_ms: 500,
        }
    }
}

/// Number of frames covering `ms` milliseconds
pub fn frames_for(ms: u64, sample_rate: u32) -> usize {
    (ms * sample_rate as u64 / 1000) as usize
}

/// Play `script` through the session and return interleaved stereo samples
pub fn render_script(session: &mut Session, script: &str, timing: ScriptTiming) -> Vec<i16> {
    let sample_rate = session.chip().lock().sample_rate();
    let note_frames = frames_for(timing.note_ms, sample_rate);
    let gap_frames = frames_for(timing.gap_ms, sample_rate);
    let mut samples = Vec::new();

    for key in script.chars() {
        if key.is_whitespace() {
            continue;
        }
        if key == REST {
            render(session, note_frames + gap_frames, &mut samples);
            continue;
        }
        if session.key_down(key).is_some() {
            render(session, note_frames, &mut samples);
            session.key_up(key);
            render(session, gap_frames, &mut samples);
        }
    }

    session.all_notes_off();
    render(session, frames_for(timing.tail_ms, sample_rate), &mut samples);
    log::debug!(
        "rendered {} frames ({:.2}s)",
        samples.len() / 2,
        samples.len() as f32 / 2.0 / sample_rate as f32
    );
    samples
}

fn render(session: &Session, frames: usize, out: &mut Vec<i16>) {
    let start = out.len();
    out.resize(start + frames * 2, 0);
    session.chip().lock().fill_interleaved(&mut out[start..]);
}

/// Write interleaved 16-bit stereo samples to a WAV file
pub fn write_wav<P: AsRef<Path>>(path: P, samples: &[i16], sample_rate: u32) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 2,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path.as_ref(), spec).map_err(|e| {
        OplError::AudioFileError(format!("Failed to create WAV file: {}", e))
    })?;

    for &sample in samples {
        writer
            .write_sample(sample)
            .map_err(|e| OplError::AudioFileError(format!("Failed to write sample: {}", e)))?;
    }

    writer
        .finalize()
        .map_err(|e| OplError::AudioFileError(format!("Failed to finalize WAV file: {}", e)))?;

    log::info!("wrote {}", path.as_ref().display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SynthConfig;
    use crate::opl::Opl3;
    use crate::shared_chip;

    fn session() -> Session {
        let config = SynthConfig::default();
        let mut session = Session::new(shared_chip(Opl3::new()), &config).unwrap();
        session.configure();
        session
    }

    #[test]
    fn test_frames_for() {
        assert_eq!(frames_for(1000, 44_100), 44_100);
        assert_eq!(frames_for(10, 44_100), 441);
        assert_eq!(frames_for(0, 48_000), 0);
    }

    #[test]
    fn test_script_length() {
        let timing = ScriptTiming {
            note_ms: 100,
            gap_ms: 10,
            tail_ms: 20,
        };
        // Two notes, one rest, one algorithm switch, one unmapped key
        let samples = render_script(&mut session(), "a1 .sq", timing);
        let frames = 3 * frames_for(110, 44_100) + frames_for(20, 44_100);
        assert_eq!(samples.len(), frames * 2);
    }

    #[test]
    fn test_script_leaves_note_released() {
        let mut s = session();
        let samples = render_script(&mut s, "asd", ScriptTiming::default());
        assert!(samples.iter().any(|&v| v != 0));
        assert!(s.held_note().is_none());
        assert_eq!(s.chip().lock().read_register(0xB0) & 0x20, 0);
    }

    #[test]
    fn test_empty_script_is_tail_only() {
        let samples = render_script(&mut session(), "", ScriptTiming::default());
        assert_eq!(samples.len(), frames_for(500, 44_100) * 2);
        assert!(samples.iter().all(|&v| v == 0));
    }
}
