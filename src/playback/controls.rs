use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use std::time::Duration;
use tracing::debug;

use super::clock::PlaybackClock;
use super::Exit;
use crate::audio::AudioSink;
use crate::notify::NotificationOverlay;

/// Distance of one seek step
pub const SEEK_STEP_MS: i64 = 5000;
/// Volume change per key press, in percent
pub const VOLUME_STEP: f32 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    SeekBack,
    SeekForward,
    VolumeUp,
    VolumeDown,
    Quit,
    Interrupt,
}

/// Translate a key press into a player command.
///
/// Held keys act once: releases and autorepeats are ignored. Terminals
/// without the keyboard enhancement flags report repeats as plain presses,
/// so there a held key still repeats.
pub fn map_key(key: KeyEvent) -> Option<Command> {
    if matches!(key.kind, KeyEventKind::Release | KeyEventKind::Repeat) {
        return None;
    }
    match key {
        KeyEvent {
            code: KeyCode::Char('c'),
            modifiers,
            ..
        } if modifiers.contains(KeyModifiers::CONTROL) => Some(Command::Interrupt),
        KeyEvent {
            code: KeyCode::Char('q') | KeyCode::Esc,
            ..
        } => Some(Command::Quit),
        KeyEvent {
            code: KeyCode::Left,
            ..
        } => Some(Command::SeekBack),
        KeyEvent {
            code: KeyCode::Right,
            ..
        } => Some(Command::SeekForward),
        KeyEvent {
            code: KeyCode::Up, ..
        } => Some(Command::VolumeUp),
        KeyEvent {
            code: KeyCode::Down,
            ..
        } => Some(Command::VolumeDown),
        _ => None,
    }
}

/// Applies player commands to the clock, the audio sink and the overlay.
#[derive(Debug, Clone)]
pub struct Controller {
    volume: f32,
}

impl Controller {
    pub fn new(volume: f32) -> Self {
        Self {
            volume: volume.clamp(0.0, 100.0),
        }
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    /// Carry out `command`. Returns how playback should end, if it should.
    ///
    /// Seeks move the clock and are forwarded to `audio` right away so both
    /// streams jump together. Volume keys do nothing without audio.
    pub fn apply(
        &mut self,
        command: Command,
        clock: &mut PlaybackClock,
        elapsed: Duration,
        audio: Option<&mut (dyn AudioSink + Send + 'static)>,
        overlay: &mut NotificationOverlay,
    ) -> Option<Exit> {
        match command {
            Command::Quit => return Some(Exit::Quit),
            Command::Interrupt => return Some(Exit::Interrupted),
            Command::SeekBack | Command::SeekForward => {
                let (delta, direction) = if command == Command::SeekBack {
                    (-SEEK_STEP_MS, "back")
                } else {
                    (SEEK_STEP_MS, "forward")
                };
                let timestamp = clock.seek(delta, elapsed);
                debug!("Seek {} to {}ms", direction, timestamp);
                if let Some(audio) = audio {
                    audio.set_offset(timestamp);
                }
                overlay.post(format!(
                    "Skipped {} seconds {}",
                    SEEK_STEP_MS / 1000,
                    direction
                ));
            }
            Command::VolumeUp | Command::VolumeDown => {
                let Some(audio) = audio else {
                    return None;
                };
                let (delta, verb) = if command == Command::VolumeUp {
                    (VOLUME_STEP, "raised")
                } else {
                    (-VOLUME_STEP, "lowered")
                };
                self.volume = (self.volume + delta).clamp(0.0, 100.0);
                audio.set_volume(self.volume);
                overlay.post(format!("Volume {} to {}%", verb, self.volume.round() as i32));
            }
        }
        None
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Records every call made to it.
    #[derive(Debug, Default)]
    pub(crate) struct RecordingSink {
        pub offsets: Vec<u64>,
        pub volumes: Vec<f32>,
        pub playing: bool,
    }

    impl AudioSink for RecordingSink {
        fn set_offset(&mut self, ms: u64) {
            self.offsets.push(ms);
        }

        fn set_volume(&mut self, percent: f32) {
            self.volumes.push(percent);
        }

        fn play(&mut self) {
            self.playing = true;
        }

        fn stop(&mut self) {
            self.playing = false;
        }
    }

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn maps_keys() {
        assert_eq!(map_key(press(KeyCode::Left)), Some(Command::SeekBack));
        assert_eq!(map_key(press(KeyCode::Right)), Some(Command::SeekForward));
        assert_eq!(map_key(press(KeyCode::Up)), Some(Command::VolumeUp));
        assert_eq!(map_key(press(KeyCode::Down)), Some(Command::VolumeDown));
        assert_eq!(map_key(press(KeyCode::Char('q'))), Some(Command::Quit));
        assert_eq!(
            map_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            Some(Command::Interrupt)
        );
        assert_eq!(map_key(press(KeyCode::Char('c'))), None);
    }

    #[test]
    fn ignores_key_release() {
        let mut key = press(KeyCode::Right);
        key.kind = KeyEventKind::Release;
        assert_eq!(map_key(key), None);
    }

    #[test]
    fn held_key_acts_once() {
        let mut key = press(KeyCode::Left);
        assert_eq!(map_key(key), Some(Command::SeekBack));
        key.kind = KeyEventKind::Repeat;
        assert_eq!(map_key(key), None);
    }

    #[test]
    fn seeking_forward_twice_moves_audio_with_it() {
        let mut controller = Controller::new(100.0);
        let mut clock = PlaybackClock::new(0);
        let mut sink = RecordingSink::default();
        let mut overlay = NotificationOverlay::new();

        for _ in 0..2 {
            let exit = controller.apply(
                Command::SeekForward,
                &mut clock,
                Duration::ZERO,
                Some(&mut sink),
                &mut overlay,
            );
            assert_eq!(exit, None);
        }

        assert_eq!(clock.timestamp_ms(Duration::ZERO), 10000);
        assert_eq!(sink.offsets, vec![5000, 10000]);
        assert_eq!(overlay.len(), 2);
        assert_eq!(
            overlay.iter().next().map(|n| n.text.as_str()),
            Some("Skipped 5 seconds forward")
        );
    }

    #[test]
    fn seeking_back_past_start_clamps() {
        let mut controller = Controller::new(100.0);
        let mut clock = PlaybackClock::new(0);
        let mut sink = RecordingSink::default();
        let mut overlay = NotificationOverlay::new();
        controller.apply(
            Command::SeekBack,
            &mut clock,
            Duration::from_millis(2000),
            Some(&mut sink),
            &mut overlay,
        );
        assert_eq!(sink.offsets, vec![0]);
        assert_eq!(
            overlay.iter().next().map(|n| n.text.as_str()),
            Some("Skipped 5 seconds back")
        );
    }

    #[test]
    fn volume_is_clamped() {
        let mut controller = Controller::new(95.0);
        let mut clock = PlaybackClock::new(0);
        let mut sink = RecordingSink::default();
        let mut overlay = NotificationOverlay::new();

        controller.apply(Command::VolumeUp, &mut clock, Duration::ZERO, Some(&mut sink), &mut overlay);
        assert_eq!(controller.volume(), 100.0);
        assert_eq!(
            overlay.iter().last().map(|n| n.text.as_str()),
            Some("Volume raised to 100%")
        );

        for _ in 0..12 {
            controller.apply(Command::VolumeDown, &mut clock, Duration::ZERO, Some(&mut sink), &mut overlay);
        }
        assert_eq!(controller.volume(), 0.0);
        assert_eq!(sink.volumes.last(), Some(&0.0));
        assert_eq!(
            overlay.iter().last().map(|n| n.text.as_str()),
            Some("Volume lowered to 0%")
        );
    }

    #[test]
    fn volume_keys_need_audio() {
        let mut controller = Controller::new(50.0);
        let mut clock = PlaybackClock::new(0);
        let mut overlay = NotificationOverlay::new();
        controller.apply(Command::VolumeUp, &mut clock, Duration::ZERO, None, &mut overlay);
        assert_eq!(controller.volume(), 50.0);
        assert!(overlay.is_empty());
    }

    #[test]
    fn quit_and_interrupt_end_playback() {
        let mut controller = Controller::new(50.0);
        let mut clock = PlaybackClock::new(0);
        let mut overlay = NotificationOverlay::new();
        assert_eq!(
            controller.apply(Command::Quit, &mut clock, Duration::ZERO, None, &mut overlay),
            Some(Exit::Quit)
        );
        assert_eq!(
            controller.apply(Command::Interrupt, &mut clock, Duration::ZERO, None, &mut overlay),
            Some(Exit::Interrupted)
        );
    }
}
