use anyhow::{anyhow, bail, Result};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::debug;

use super::{CHANNELS, SAMPLE_RATE};

/// Scratch file the soundtrack is extracted into.
pub fn temp_pcm_path() -> PathBuf {
    std::env::temp_dir().join(format!("termvideo-{}.pcm", std::process::id()))
}

/// Decode the audio track of `video` into `scratch` as interleaved
/// little-endian f32 samples.
///
/// The file is left in place for the player to stream from; removing it is
/// up to the caller.
pub fn extract_pcm(video: &Path, scratch: &Path) -> Result<()> {
    let mut cmd = Command::new("ffmpeg");
    cmd.args(["-v", "error", "-i"])
        .arg(video)
        .args(["-vn", "-f", "f32le", "-ac"])
        .arg(CHANNELS.to_string())
        .arg("-ar")
        .arg(SAMPLE_RATE.to_string())
        .arg("-y")
        .arg(scratch);
    debug!("Running {:?}", cmd);

    let output = cmd
        .stdin(Stdio::null())
        .output()
        .map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                anyhow!("ffmpeg executable not found; install ffmpeg or run with --no-audio")
            } else {
                anyhow!("Failed to run ffmpeg: {}", e)
            }
        })?;

    if !output.status.success() {
        let _ = std::fs::remove_file(scratch);
        bail!(
            "ffmpeg could not extract audio ({}): {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scratch_file_lives_in_temp_dir() {
        let path = temp_pcm_path();
        assert!(path.starts_with(std::env::temp_dir()));
        assert!(path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with("termvideo-")));
    }
}
