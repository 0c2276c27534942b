mod extract;
mod player;

pub use extract::{extract_pcm, temp_pcm_path};
pub use player::PulsePlayer;

use std::path::Path;

use anyhow::Result;
use tracing::info;

/// Sample rate of the extracted audio track
pub const SAMPLE_RATE: u32 = 44100;
/// Interleaved channel count of the extracted audio track
pub const CHANNELS: u8 = 2;

/// Something that plays the soundtrack alongside the video.
pub trait AudioSink {
    /// Jump to `ms` milliseconds from the start of the track.
    fn set_offset(&mut self, ms: u64);
    /// Volume in percent; values outside `0..=100` are clamped.
    fn set_volume(&mut self, percent: f32);
    fn play(&mut self);
    fn stop(&mut self);
}

/// Bytes per interleaved sample frame in the extracted track
pub const FRAME_BYTES: usize = CHANNELS as usize * std::mem::size_of::<f32>();

/// Extract the soundtrack of `video` to [`temp_pcm_path`] and start playing it
/// at `offset_ms`.
///
/// The extracted file stays on disk while the player streams it.
pub fn create_audio_pipeline(video: &Path, offset_ms: u64, volume: f32) -> Result<PulsePlayer> {
    let temp = temp_pcm_path();
    extract_pcm(video, &temp)?;

    let mut player = PulsePlayer::new(&temp)?;
    info!(
        "Extracted {:.1}s of audio",
        player.total_frames() as f32 / SAMPLE_RATE as f32
    );
    player.set_offset(offset_ms);
    player.set_volume(volume);
    player.play();
    Ok(player)
}
