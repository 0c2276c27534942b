//! The frame loop tying video, audio, rendering and input together.

pub mod clock;
pub mod controls;

use anyhow::{Context, Result};
use crossterm::event::{self, Event};
use std::io::Write;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::audio::AudioSink;
use crate::lifecycle::Lifecycle;
use crate::notify::NotificationOverlay;
use crate::render::RenderSession;
use crate::video::VideoSource;
use clock::{FramePacer, PlaybackClock};
use controls::{map_key, Controller};

/// How a playback run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    EndOfStream,
    Quit,
    Interrupted,
}

impl Exit {
    /// Process exit status for this outcome.
    pub fn code(self) -> i32 {
        match self {
            Exit::EndOfStream | Exit::Quit => 0,
            Exit::Interrupted => 130,
        }
    }
}

/// Pending terminal events, read without blocking.
pub trait InputSource {
    fn poll(&mut self) -> Result<Vec<Event>>;
}

/// Reads keyboard and resize events from the terminal.
pub struct TerminalInput;

impl InputSource for TerminalInput {
    fn poll(&mut self) -> Result<Vec<Event>> {
        let mut events = Vec::new();
        while event::poll(Duration::ZERO)? {
            events.push(event::read()?);
        }
        Ok(events)
    }
}

/// Ignores the keyboard entirely.
pub struct NoInput;

impl InputSource for NoInput {
    fn poll(&mut self) -> Result<Vec<Event>> {
        Ok(Vec::new())
    }
}

pub struct Player<V> {
    pub video: V,
    pub audio: Option<Box<dyn AudioSink + Send>>,
    pub session: RenderSession,
    pub overlay: NotificationOverlay,
    pub clock: PlaybackClock,
    pub pacer: FramePacer,
    pub controller: Controller,
    pub lifecycle: Arc<Lifecycle>,
    /// Re-fit the grid when the terminal is resized
    pub follow_resize: bool,
}

impl<V: VideoSource> Player<V> {
    /// Play until the stream ends, the user quits, or teardown starts elsewhere.
    pub fn run(&mut self, input: &mut impl InputSource, out: &mut impl Write) -> Result<Exit> {
        let result = self.play_frames(input, out);
        if let Some(audio) = self.audio.as_deref_mut() {
            audio.stop();
        }
        result
    }

    fn play_frames(&mut self, input: &mut impl InputSource, out: &mut impl Write) -> Result<Exit> {
        let started = Instant::now();
        let colorful = self.session.mode().is_colorful();
        let mut buf = String::new();
        let mut frames: u64 = 0;
        let (cols, rows) = self.session.geometry();
        self.overlay.fit(cols, rows);

        info!(
            "Playing in {} mode at {:?} per frame",
            self.session.mode().name(),
            self.pacer.interval()
        );

        loop {
            let frame_start = Instant::now();
            if self.lifecycle.is_torn_down() {
                return Ok(Exit::Interrupted);
            }

            for ev in input.poll()? {
                match ev {
                    Event::Key(key) => {
                        let Some(command) = map_key(key) else {
                            continue;
                        };
                        let audio = self.audio.as_deref_mut();
                        if let Some(exit) = self.controller.apply(
                            command,
                            &mut self.clock,
                            started.elapsed(),
                            audio,
                            &mut self.overlay,
                        ) {
                            return Ok(exit);
                        }
                    }
                    Event::Resize(cols, rows) if self.follow_resize => {
                        debug!("Terminal resized to {}x{}", cols, rows);
                        self.session.resize(cols, rows);
                        self.overlay.fit(cols, rows);
                        self.video.resize(cols, rows)?;
                    }
                    Event::Resize(..) => self.session.invalidate(),
                    _ => {}
                }
            }

            let timestamp = self.clock.timestamp_ms(started.elapsed());
            let Some(frame) = self
                .video
                .seek_and_decode(timestamp)
                .with_context(|| format!("Failed to decode frame at {}ms", timestamp))?
            else {
                info!("End of stream after {} frames", frames);
                return Ok(Exit::EndOfStream);
            };

            buf.clear();
            self.session.render(frame, &self.overlay, &mut buf);
            if !self.overlay.is_empty() {
                self.overlay.draw(colorful, &mut buf);
            }
            self.overlay.advance(self.pacer.interval());

            out.write_all(buf.as_bytes())?;
            out.flush()?;
            frames += 1;

            self.pacer.wait(frame_start);
        }
    }
}
