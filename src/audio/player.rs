use anyhow::{anyhow, Context, Result};
use libpulse_binding as pulse;
use libpulse_simple_binding as psimple;
use pulse::def::BufferAttr;
use pulse::sample::{Format, Spec};
use pulse::stream::Direction;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{AudioSink, CHANNELS, FRAME_BYTES, SAMPLE_RATE};

/// Frames handed to PulseAudio per write (~23ms)
const CHUNK_FRAMES: usize = 1024;

/// Server-side buffer target, kept short so seeks and volume changes are heard quickly
const TARGET_LATENCY: Duration = Duration::from_millis(100);

struct Shared {
    /// Next frame to be written
    position: AtomicUsize,
    /// Linear gain stored as f32 bits
    gain: AtomicU32,
    playing: AtomicBool,
    flush: AtomicBool,
    stop: AtomicBool,
}

/// Streams a raw f32le stereo track from disk to a PulseAudio stream.
pub struct PulsePlayer {
    // Keep the thread handle to ensure it stays alive
    _playback_thread: thread::JoinHandle<()>,
    shared: Arc<Shared>,
    total_frames: usize,
}

/// Stops a [`PulsePlayer`] from another thread.
#[derive(Clone)]
pub struct StopHandle(Arc<Shared>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.playing.store(false, Ordering::Relaxed);
        self.0.stop.store(true, Ordering::Relaxed);
    }
}

impl Drop for PulsePlayer {
    fn drop(&mut self) {
        self.shared.stop.store(true, Ordering::Relaxed);
    }
}

impl PulsePlayer {
    /// Open the extracted track at `track` and start the (paused) playback thread.
    pub fn new(track: &Path) -> Result<Self> {
        let file = File::open(track)
            .with_context(|| format!("Failed to open extracted audio at {}", track.display()))?;
        let total_frames = file
            .metadata()
            .context("Failed to stat extracted audio")?
            .len() as usize
            / FRAME_BYTES;

        let spec = Spec {
            format: Format::F32le,
            channels: CHANNELS,
            rate: SAMPLE_RATE,
        };

        if !spec.is_valid() {
            return Err(anyhow!("Invalid PulseAudio sample spec"));
        }

        let target = spec.usec_to_bytes(pulse::time::MicroSeconds(TARGET_LATENCY.as_micros() as u64)) as u32;
        let attr = BufferAttr {
            maxlength: u32::MAX,
            tlength: target,
            prebuf: u32::MAX,
            minreq: u32::MAX,
            fragsize: u32::MAX,
        };

        let pulse = psimple::Simple::new(
            None,
            "termvideo",
            Direction::Playback,
            None,
            "video-soundtrack",
            &spec,
            None,
            Some(&attr),
        )
        .map_err(|e| anyhow!("Failed to connect to PulseAudio: {:?}", e))?;

        info!("Connected to PulseAudio for playback");

        let shared = Arc::new(Shared {
            position: AtomicUsize::new(0),
            gain: AtomicU32::new(1.0f32.to_bits()),
            playing: AtomicBool::new(false),
            flush: AtomicBool::new(false),
            stop: AtomicBool::new(false),
        });
        let shared_clone = shared.clone();

        let playback_thread = thread::spawn(move || {
            Self::playback_loop(pulse, file, total_frames, shared_clone);
        });

        Ok(Self {
            _playback_thread: playback_thread,
            shared,
            total_frames,
        })
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle(self.shared.clone())
    }

    /// Length of the track in sample frames.
    pub fn total_frames(&self) -> usize {
        self.total_frames
    }

    fn playback_loop(pulse: psimple::Simple, mut track: File, total_frames: usize, shared: Arc<Shared>) {
        let mut bytes = Vec::with_capacity(CHUNK_FRAMES * FRAME_BYTES);

        loop {
            if shared.stop.load(Ordering::Relaxed) {
                debug!("Stop flag set, ending playback loop");
                break;
            }
            if shared.flush.swap(false, Ordering::AcqRel) {
                if let Err(e) = pulse.flush() {
                    warn!("PulseAudio flush error: {:?}", e);
                }
            }

            let start = shared.position.load(Ordering::Acquire);
            if !shared.playing.load(Ordering::Relaxed) || start >= total_frames {
                thread::sleep(Duration::from_millis(10));
                continue;
            }

            let end = (start + CHUNK_FRAMES).min(total_frames);
            if let Err(e) = read_chunk(&mut track, start, end - start, &mut bytes) {
                warn!("Failed to read audio at frame {}: {}", start, e);
                shared.playing.store(false, Ordering::Relaxed);
                continue;
            }
            apply_gain(&mut bytes, f32::from_bits(shared.gain.load(Ordering::Relaxed)));

            if let Err(e) = pulse.write(&bytes) {
                warn!("PulseAudio write error: {:?}", e);
                thread::sleep(Duration::from_millis(10));
                continue;
            }

            // A seek that landed while writing wins over our advance
            let _ = shared
                .position
                .compare_exchange(start, end, Ordering::AcqRel, Ordering::Acquire);
        }

        if let Err(e) = pulse.flush() {
            debug!("PulseAudio flush on exit failed: {:?}", e);
        }
    }
}

impl AudioSink for PulsePlayer {
    fn set_offset(&mut self, ms: u64) {
        let frame = offset_to_frame(ms).min(self.total_frames);
        self.shared.position.store(frame, Ordering::Release);
        self.shared.flush.store(true, Ordering::Release);
    }

    fn set_volume(&mut self, percent: f32) {
        let gain = percent.clamp(0.0, 100.0) / 100.0;
        self.shared.gain.store(gain.to_bits(), Ordering::Relaxed);
    }

    fn play(&mut self) {
        self.shared.playing.store(true, Ordering::Relaxed);
    }

    fn stop(&mut self) {
        self.shared.playing.store(false, Ordering::Relaxed);
        self.shared.flush.store(true, Ordering::Release);
    }
}

fn offset_to_frame(ms: u64) -> usize {
    (ms * SAMPLE_RATE as u64 / 1000) as usize
}

/// Read `frames` sample frames starting at frame `start` into `out`.
fn read_chunk(track: &mut (impl Read + Seek), start: usize, frames: usize, out: &mut Vec<u8>) -> io::Result<()> {
    track.seek(SeekFrom::Start((start * FRAME_BYTES) as u64))?;
    out.resize(frames * FRAME_BYTES, 0);
    track.read_exact(out)
}

/// Scale f32le samples in place.
fn apply_gain(bytes: &mut [u8], gain: f32) {
    if gain == 1.0 {
        return;
    }
    for sample in bytes.chunks_exact_mut(4) {
        let value = f32::from_le_bytes([sample[0], sample[1], sample[2], sample[3]]) * gain;
        sample.copy_from_slice(&value.to_le_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn offsets_map_to_frames() {
        assert_eq!(offset_to_frame(0), 0);
        assert_eq!(offset_to_frame(1000), 44100);
        assert_eq!(offset_to_frame(5000), 220500);
    }

    fn samples(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect()
    }

    #[test]
    fn chunk_is_scaled_by_gain() {
        let mut bytes: Vec<u8> = [1.0f32, -0.5].iter().flat_map(|s| s.to_le_bytes()).collect();
        apply_gain(&mut bytes, 0.5);
        assert_eq!(samples(&bytes), vec![0.5, -0.25]);
    }

    #[test]
    fn chunks_are_read_from_the_seeked_frame() {
        // Four stereo frames: (0, 0.5), (1, 1.5), (2, 2.5), (3, 3.5)
        let track: Vec<u8> = (0..4)
            .flat_map(|i| [i as f32, i as f32 + 0.5])
            .flat_map(|s| s.to_le_bytes())
            .collect();
        let mut file = tempfile::tempfile().unwrap();
        file.write_all(&track).unwrap();

        let mut out = Vec::new();
        read_chunk(&mut file, 2, 2, &mut out).unwrap();
        assert_eq!(samples(&out), vec![2.0, 2.5, 3.0, 3.5]);

        // Seeking back after reading ahead
        read_chunk(&mut file, 0, 1, &mut out).unwrap();
        assert_eq!(samples(&out), vec![0.0, 0.5]);

        assert!(read_chunk(&mut file, 3, 2, &mut out).is_err());
    }
}
