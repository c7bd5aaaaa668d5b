//! Terminal key events
//!
//! Converts crossterm events into key-down/key-up events for the session.
//! Terminals that implement the kitty keyboard protocol report releases; the
//! others only send presses (and auto-repeat presses while a key is held), so
//! a [`ReleaseGate`] ends those notes after a fixed time instead.

use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use std::time::{Duration, Instant};

/// Keyboard event relevant to the synthesizer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    /// Key pressed
    KeyDown(char),
    /// Key released
    KeyUp(char),
    /// Leave the program (Esc or Ctrl-C)
    Quit,
}

/// Translate a terminal event, `None` for anything the synthesizer ignores
///
/// Auto-repeat events are dropped.
pub fn translate(event: &Event) -> Option<InputEvent> {
    match event {
        Event::Key(key) => translate_key(key),
        _ => None,
    }
}

fn translate_key(key: &KeyEvent) -> Option<InputEvent> {
    match key.kind {
        KeyEventKind::Repeat => None,
        KeyEventKind::Press => match key.code {
            KeyCode::Esc => Some(InputEvent::Quit),
            KeyCode::Char('c') | KeyCode::Char('C')
                if key.modifiers.contains(KeyModifiers::CONTROL) =>
            {
                Some(InputEvent::Quit)
            }
            KeyCode::Char(c) => Some(InputEvent::KeyDown(c)),
            _ => None,
        },
        KeyEventKind::Release => match key.code {
            KeyCode::Char(c) => Some(InputEvent::KeyUp(c)),
            _ => None,
        },
    }
}

/// Automatic note release for terminals without key-release events
#[derive(Debug, Clone)]
pub struct ReleaseGate {
    gate: Duration,
    pending: Option<(char, Instant)>,
}

impl ReleaseGate {
    /// Release notes `gate` after their last press
    pub fn new(gate: Duration) -> Self {
        ReleaseGate {
            gate,
            pending: None,
        }
    }

    /// Record a press of a note key
    ///
    /// Returns `false` when the key is already sounding; the terminal's
    /// auto-repeat then only extends the note instead of retriggering it.
    pub fn press(&mut self, key: char, now: Instant) -> bool {
        let key = key.to_ascii_lowercase();
        let repeat = matches!(self.pending, Some((held, _)) if held == key);
        self.pending = Some((key, now + self.gate));
        !repeat
    }

    /// Key whose gate has elapsed, clearing it
    pub fn poll(&mut self, now: Instant) -> Option<char> {
        match self.pending {
            Some((key, deadline)) if now >= deadline => {
                self.pending = None;
                Some(key)
            }
            _ => None,
        }
    }

    /// Time until the pending release, if any
    pub fn time_left(&self, now: Instant) -> Option<Duration> {
        self.pending
            .map(|(_, deadline)| deadline.saturating_duration_since(now))
    }

    /// Forget the pending release
    pub fn clear(&mut self) {
        self.pending = None;
    }
}
