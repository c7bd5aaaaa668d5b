//! Runtime configuration
//!
//! Loaded from a JSON file. Every field is optional; missing fields take the
//! defaults below, which reproduce the stock keyboard demo.

use crate::keyboard::{KeyLayout, NOTE_KEYS};
use crate::opl::constants::DEFAULT_SAMPLE_RATE;
use crate::patch::{check_channel, VoicePatch};
use crate::{OplError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default frames per audio callback buffer
pub const DEFAULT_BUFFER_FRAMES: usize = 512;
/// Default note of the first layout key (middle C)
pub const DEFAULT_BASE_NOTE: u8 = 60;
/// Default auto-release delay when key releases are not reported
pub const DEFAULT_GATE_MS: u64 = 400;

/// Synthesizer configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthConfig {
    /// Output sample rate in Hz
    pub sample_rate: u32,
    /// Stereo frames rendered per buffer fill
    pub buffer_frames: usize,
    /// Chip channel the keyboard plays (0-17)
    pub channel: usize,
    /// MIDI note of the first layout key
    pub base_note: u8,
    /// Note keys, lowest first
    pub layout: KeyLayout,
    /// Note length when the terminal cannot report key releases
    pub gate_ms: u64,
    /// Voice written at start-up
    pub patch: VoicePatch,
}

impl Default for SynthConfig {
    fn default() -> Self {
        SynthConfig {
            sample_rate: DEFAULT_SAMPLE_RATE,
            buffer_frames: DEFAULT_BUFFER_FRAMES,
            channel: 0,
            base_note: DEFAULT_BASE_NOTE,
            layout: KeyLayout::default(),
            gate_ms: DEFAULT_GATE_MS,
            patch: VoicePatch::default(),
        }
    }
}

impl SynthConfig {
    /// Parse and validate a JSON document
    pub fn from_json(json: &str) -> Result<Self> {
        let config: SynthConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&contents)
    }

    /// Load a JSON file, falling back to defaults when it is unreadable or invalid
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(config) => {
                log::debug!(target: "config", "loaded {}", path.display());
                config
            }
            Err(e) => {
                log::warn!(target: "config", "ignoring config {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Serialize as pretty-printed JSON
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check every value is usable
    pub fn validate(&self) -> Result<()> {
        if !(8_000..=192_000).contains(&self.sample_rate) {
            return Err(OplError::ConfigError(format!(
                "sample_rate {} is out of range (8000-192000)",
                self.sample_rate
            )));
        }
        if self.buffer_frames == 0 || self.buffer_frames > 16_384 {
            return Err(OplError::ConfigError(format!(
                "buffer_frames {} is out of range (1-16384)",
                self.buffer_frames
            )));
        }
        check_channel(self.channel)?;
        if self.base_note as usize + NOTE_KEYS > 128 {
            return Err(OplError::ConfigError(format!(
                "base_note {} leaves no room for the top key",
                self.base_note
            )));
        }
        if self.gate_ms == 0 {
            return Err(OplError::ConfigError("gate_ms must be positive".into()));
        }
        self.patch.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyboard::Algorithm;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = SynthConfig::default();
        assert_eq!(config.sample_rate, 44_100);
        assert_eq!(config.buffer_frames, 512);
        assert_eq!(config.channel, 0);
        assert_eq!(config.base_note, 60);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_document_is_default() {
        assert_eq!(SynthConfig::from_json("{}").unwrap(), SynthConfig::default());
    }

    #[test]
    fn test_partial_document() {
        let config = SynthConfig::from_json(
            r#"{ "channel": 3, "layout": "qwertyuiop[]", "patch": { "algorithm": "additive" } }"#,
        )
        .unwrap();
        assert_eq!(config.channel, 3);
        assert_eq!(config.layout.keys()[0], 'q');
        assert_eq!(config.patch.algorithm, Algorithm::Additive);
        assert_eq!(config.sample_rate, 44_100);
    }

    #[test]
    fn test_json_round_trip() {
        let config = SynthConfig {
            base_note: 48,
            gate_ms: 250,
            ..Default::default()
        };
        let json = config.to_json_pretty().unwrap();
        assert_eq!(SynthConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            SynthConfig::from_json(r#"{ "channel": 18 }"#),
            Err(OplError::ConfigError(_))
        ));
        assert!(SynthConfig::from_json(r#"{ "sample_rate": 100 }"#).is_err());
        assert!(SynthConfig::from_json(r#"{ "buffer_frames": 0 }"#).is_err());
        assert!(SynthConfig::from_json(r#"{ "base_note": 120 }"#).is_err());
        assert!(SynthConfig::from_json(r#"{ "gate_ms": 0 }"#).is_err());
        assert!(matches!(
            SynthConfig::from_json("{ not json"),
            Err(OplError::Json(_))
        ));
        assert!(SynthConfig::from_json(r#"{ "layout": "abc" }"#).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "base_note": 72 }}"#).unwrap();
        let config = SynthConfig::load(file.path()).unwrap();
        assert_eq!(config.base_note, 72);
    }

    #[test]
    fn test_load_or_default_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.json");
        assert!(matches!(SynthConfig::load(&missing), Err(OplError::Io(_))));
        assert_eq!(SynthConfig::load_or_default(&missing), SynthConfig::default());

        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, r#"{ "channel": 99 }"#).unwrap();
        assert_eq!(SynthConfig::load_or_default(&bad), SynthConfig::default());
    }
}
