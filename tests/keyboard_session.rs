use std::sync::Arc;

use opl_keys::{
    shared_chip, Algorithm, NoteRegisters, Opl3, OplBackend, Session, SharedChip, SynthConfig,
    F_NUMBERS,
};
use parking_lot::Mutex;

/// Backend that records every register write
struct Recorder {
    writes: Arc<Mutex<Vec<(u16, u8)>>>,
    registers: [u8; 0x200],
}

impl Recorder {
    fn with_log(writes: Arc<Mutex<Vec<(u16, u8)>>>) -> Self {
        Recorder {
            writes,
            registers: [0; 0x200],
        }
    }
}

impl OplBackend for Recorder {
    fn new() -> Self {
        Recorder::with_log(Arc::default())
    }

    fn with_sample_rate(_sample_rate: u32) -> Self {
        Recorder::new()
    }

    fn reset(&mut self) {
        self.registers = [0; 0x200];
    }

    fn write_register(&mut self, addr: u16, value: u8) {
        self.writes.lock().push((addr, value));
        if let Some(reg) = self.registers.get_mut(addr as usize) {
            *reg = value;
        }
    }

    fn read_register(&self, addr: u16) -> u8 {
        self.registers.get(addr as usize).copied().unwrap_or(0)
    }

    fn sample(&mut self) -> (i16, i16) {
        (0, 0)
    }

    fn sample_rate(&self) -> u32 {
        44_100
    }

    fn set_channel_mute(&mut self, _channel: usize, _mute: bool) {}

    fn is_channel_muted(&self, _channel: usize) -> bool {
        false
    }
}

fn recording_session() -> (Session, Arc<Mutex<Vec<(u16, u8)>>>) {
    let writes = Arc::new(Mutex::new(Vec::new()));
    let chip: SharedChip = shared_chip(Recorder::with_log(Arc::clone(&writes)));
    let session = Session::new(chip, &SynthConfig::default()).unwrap();
    (session, writes)
}

#[test]
fn start_up_writes_the_voice_patch_once() {
    let (mut session, writes) = recording_session();
    session.configure();
    let writes = writes.lock().clone();
    assert_eq!(
        writes,
        vec![
            (0x20, 0x03),
            (0x40, 0x0F),
            (0x60, 0x50),
            (0x80, 0x03),
            (0xE0, 0x04),
            (0x23, 0x00),
            (0x43, 0x00),
            (0x63, 0x50),
            (0x83, 0x03),
            (0xE3, 0x00),
            (0xC0, 0x30),
        ]
    );
}

#[test]
fn note_key_writes_mode_pitch_and_key_on_in_order() {
    let (mut session, writes) = recording_session();
    session.key_down('a');
    assert_eq!(
        writes.lock().clone(),
        vec![(0xC0, 0x30), (0xA0, 0x56), (0xB0, 0x35)]
    );
}

#[test]
fn home_row_keys_play_notes_60_to_68() {
    let (mut session, _writes) = recording_session();
    for (offset, key) in "asdfghjkl".chars().enumerate() {
        let note = 60 + offset as u8;
        let played = session.key_down(key).unwrap();
        assert_eq!(played.note, note);
        assert_eq!(played.registers.block, note / 12);
        assert_eq!(played.registers.fnum, F_NUMBERS[(note % 12) as usize]);
        session.key_up(key);
    }
}

#[test]
fn retrigger_keys_off_before_the_new_note() {
    let (mut session, writes) = recording_session();
    session.key_down('a');
    writes.lock().clear();
    session.key_down('g');
    let g = NoteRegisters::from_midi(64);
    assert_eq!(
        writes.lock().clone(),
        vec![
            (0xB0, 0x15),
            (0xC0, 0x30),
            (0xA0, g.a0_value()),
            (0xB0, g.b0_value(true)),
        ]
    );
}

#[test]
fn algorithm_key_only_rewrites_channel_mode() {
    let (mut session, writes) = recording_session();
    assert!(session.key_down('1').is_none());
    assert_eq!(session.algorithm(), Algorithm::Additive);
    assert_eq!(writes.lock().clone(), vec![(0xC0, 0x31)]);
}

#[test]
fn key_up_without_a_held_note_writes_nothing() {
    let (mut session, writes) = recording_session();
    session.key_up('a');
    session.key_up('q');
    assert!(writes.lock().is_empty());
}

#[test]
fn opl3_session_sounds_and_releases() {
    let config = SynthConfig::default();
    let chip = shared_chip(Opl3::with_sample_rate(config.sample_rate));
    let mut session = Session::new(Arc::clone(&chip), &config).unwrap();
    session.configure();

    let mut buffer = vec![0i16; 8192];
    chip.lock().fill_interleaved(&mut buffer);
    assert!(buffer.iter().all(|&s| s == 0), "idle chip must be silent");

    session.key_down('a');
    chip.lock().fill_interleaved(&mut buffer);
    assert!(buffer.iter().any(|&s| s != 0));

    session.key_up('a');
    // Release rate 3 takes several seconds to fall silent
    for _ in 0..120 {
        chip.lock().fill_interleaved(&mut buffer);
    }
    assert!(buffer.iter().all(|&s| s == 0));
}
