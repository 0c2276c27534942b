use std::time::{Duration, Instant};

/// Maps elapsed wall-clock time to a media timestamp.
///
/// The media position is `elapsed + offset`, where the offset starts at the
/// requested start position and moves with every seek.
#[derive(Debug, Clone)]
pub struct PlaybackClock {
    offset_ms: i64,
}

impl PlaybackClock {
    pub fn new(start_offset_ms: i64) -> Self {
        Self {
            offset_ms: start_offset_ms,
        }
    }

    pub fn offset_ms(&self) -> i64 {
        self.offset_ms
    }

    /// Media timestamp for the given elapsed time, never negative.
    pub fn timestamp_ms(&self, elapsed: Duration) -> u64 {
        (elapsed.as_millis() as i64 + self.offset_ms).max(0) as u64
    }

    /// Move the playback position by `delta_ms`.
    ///
    /// Seeking before the start of the media clamps to zero. Returns the new
    /// media timestamp.
    pub fn seek(&mut self, delta_ms: i64, elapsed: Duration) -> u64 {
        let elapsed_ms = elapsed.as_millis() as i64;
        self.offset_ms += delta_ms;
        if elapsed_ms + self.offset_ms < 0 {
            self.offset_ms = -elapsed_ms;
        }
        self.timestamp_ms(elapsed)
    }
}

/// Holds each frame to a fixed duration measured from the frame's start.
#[derive(Debug, Clone)]
pub struct FramePacer {
    interval: Duration,
}

impl FramePacer {
    /// Pacer for `fps` frames per second, in whole milliseconds per frame.
    pub fn new(fps: u32) -> Self {
        Self {
            interval: Duration::from_millis(1000 / fps.max(1) as u64),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn deadline(&self, frame_start: Instant) -> Instant {
        frame_start + self.interval
    }

    /// Spin until the frame that began at `frame_start` has used its slot.
    pub fn wait(&self, frame_start: Instant) {
        let deadline = self.deadline(frame_start);
        while Instant::now() < deadline {
            std::hint::spin_loop();
        }
    }
}
