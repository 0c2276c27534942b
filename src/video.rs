use anyhow::{anyhow, bail, Context, Result};
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStderr, ChildStdout, Command, Stdio};
use tracing::{debug, info, warn};

use crate::render::Frame;

/// Source pixels per terminal cell, horizontally
pub const CELL_WIDTH: u32 = 4;
/// Source pixels per terminal cell, vertically
pub const CELL_HEIGHT: u32 = 8;

/// Forward jumps larger than this restart the decoder instead of reading through.
const RESTART_THRESHOLD_MS: u64 = 2000;

/// Supplies the frame to show at a given media timestamp.
pub trait VideoSource {
    /// Native frame rate of the stream
    fn frame_rate(&self) -> f64;

    /// Frame covering `timestamp_ms`, or `None` once the stream has ended.
    fn seek_and_decode(&mut self, timestamp_ms: u64) -> Result<Option<&Frame>>;

    /// Change the output grid; subsequent frames are scaled to fit it.
    fn resize(&mut self, cols: u16, rows: u16) -> Result<()>;
}

/// Stream properties reported by ffprobe.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoInfo {
    pub width: u32,
    pub height: u32,
    pub frame_rate: f64,
    pub duration_ms: Option<u64>,
}

/// Query width, height, frame rate and duration of the first video stream.
pub fn probe(path: &Path) -> Result<VideoInfo> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=width,height,r_frame_rate:format=duration",
            "-of",
            "default=noprint_wrappers=1",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .output()
        .map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                anyhow!("ffprobe executable not found; install ffmpeg")
            } else {
                anyhow!("Failed to run ffprobe: {}", e)
            }
        })?;

    if !output.status.success() {
        bail!(
            "ffprobe failed on {}: {}",
            path.display(),
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    parse_probe(&String::from_utf8_lossy(&output.stdout))
        .with_context(|| format!("Unexpected ffprobe output for {}", path.display()))
}

fn parse_probe(text: &str) -> Result<VideoInfo> {
    let mut width = None;
    let mut height = None;
    let mut frame_rate = None;
    let mut duration_ms = None;

    for line in text.lines() {
        let Some((key, value)) = line.trim().split_once('=') else {
            continue;
        };
        match key {
            "width" => width = value.parse::<u32>().ok(),
            "height" => height = value.parse::<u32>().ok(),
            "r_frame_rate" => frame_rate = parse_rational(value),
            "duration" => {
                duration_ms = value
                    .parse::<f64>()
                    .ok()
                    .filter(|d| d.is_finite() && *d >= 0.0)
                    .map(|d| (d * 1000.0) as u64)
            }
            _ => {}
        }
    }

    let width = width.ok_or_else(|| anyhow!("no video stream width"))?;
    let height = height.ok_or_else(|| anyhow!("no video stream height"))?;
    let frame_rate = frame_rate
        .filter(|r| *r > 0.0)
        .ok_or_else(|| anyhow!("no usable frame rate"))?;

    Ok(VideoInfo {
        width,
        height,
        frame_rate,
        duration_ms,
    })
}

/// Parse `30000/1001` or `25` style rates.
fn parse_rational(value: &str) -> Option<f64> {
    match value.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.parse().ok()?;
            let den: f64 = den.parse().ok()?;
            (den != 0.0).then(|| num / den)
        }
        None => value.parse().ok(),
    }
}

/// Sequential reader of packed rgb24 frames starting at a known timestamp.
struct RawStream<R> {
    reader: R,
    width: usize,
    height: usize,
    start_ms: u64,
    frame_rate: f64,
    frames_read: u64,
    current: Option<Frame>,
}

impl<R: Read> RawStream<R> {
    fn new(reader: R, width: usize, height: usize, start_ms: u64, frame_rate: f64) -> Self {
        Self {
            reader,
            width,
            height,
            start_ms,
            frame_rate,
            frames_read: 0,
            current: None,
        }
    }

    /// Presentation time of the `index`th frame of this stream.
    fn frame_time_ms(&self, index: u64) -> u64 {
        self.start_ms + (index as f64 * 1000.0 / self.frame_rate) as u64
    }

    /// Whether `timestamp_ms` can be reached by reading forward.
    fn can_serve(&self, timestamp_ms: u64) -> bool {
        if timestamp_ms < self.start_ms {
            return false;
        }
        if self.frames_read > 0 && timestamp_ms < self.frame_time_ms(self.frames_read - 1) {
            return false;
        }
        timestamp_ms <= self.frame_time_ms(self.frames_read) + RESTART_THRESHOLD_MS
    }

    /// Read forward until the current frame covers `timestamp_ms`.
    ///
    /// Returns `false` when the stream ends first.
    fn advance_to(&mut self, timestamp_ms: u64) -> Result<bool> {
        while self.frames_read == 0 || self.frame_time_ms(self.frames_read) <= timestamp_ms {
            if !self.read_frame()? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn read_frame(&mut self) -> Result<bool> {
        let len = self.width * self.height * 3;
        let mut data = self.current.take().map(Frame::into_data).unwrap_or_default();
        data.resize(len, 0);

        match self.reader.read_exact(&mut data) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(false),
            Err(e) => return Err(e).context("Failed to read decoded frame"),
        }

        self.current = Frame::from_rgb24(self.width, self.height, data);
        if self.current.is_none() {
            bail!("Decoder produced an empty frame");
        }
        self.frames_read += 1;
        Ok(true)
    }
}

/// Frames decoded by an `ffmpeg` child process, scaled to the terminal grid.
pub struct FfmpegVideo {
    path: PathBuf,
    info: VideoInfo,
    out_width: u32,
    out_height: u32,
    child: Option<Child>,
    stream: Option<RawStream<ChildStdout>>,
}

impl FfmpegVideo {
    /// Probe `path` and prepare to decode it for a `cols`×`rows` grid.
    pub fn open(path: &Path, cols: u16, rows: u16) -> Result<Self> {
        let info = probe(path)?;
        info!(
            "Opened {} ({}x{} @ {:.3} fps)",
            path.display(),
            info.width,
            info.height,
            info.frame_rate
        );

        Ok(Self {
            path: path.to_path_buf(),
            info,
            out_width: cols.max(1) as u32 * CELL_WIDTH,
            out_height: rows.max(1) as u32 * CELL_HEIGHT,
            child: None,
            stream: None,
        })
    }

    pub fn info(&self) -> &VideoInfo {
        &self.info
    }

    fn spawn(&mut self, timestamp_ms: u64) -> Result<()> {
        self.kill();

        let start = format!("{}.{:03}", timestamp_ms / 1000, timestamp_ms % 1000);
        let scale = format!("scale={}:{}", self.out_width, self.out_height);
        let mut cmd = Command::new("ffmpeg");
        cmd.args(["-v", "error", "-nostdin", "-ss", start.as_str(), "-i"])
            .arg(&self.path)
            .args(["-an", "-vf", scale.as_str(), "-f", "rawvideo", "-pix_fmt", "rgb24", "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        debug!("Running {:?}", cmd);

        let mut child = cmd.spawn().map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                anyhow!("ffmpeg executable not found; install ffmpeg")
            } else {
                anyhow!("Failed to start ffmpeg: {}", e)
            }
        })?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow!("ffmpeg stdout was not captured"))?;

        self.stream = Some(RawStream::new(
            stdout,
            self.out_width as usize,
            self.out_height as usize,
            timestamp_ms,
            self.info.frame_rate,
        ));
        self.child = Some(child);
        Ok(())
    }

    /// Reap a decoder whose output ran dry, failing if it did not exit cleanly.
    fn finish(&mut self) -> Result<()> {
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        let mut stderr = child.stderr.take();
        let status = child.wait().context("Failed waiting for ffmpeg")?;
        let stderr_tail = read_stderr_tail(&mut stderr)?;
        if !status.success() {
            bail!("ffmpeg failed with status {}: {}", status, stderr_tail);
        }
        debug!("ffmpeg exited cleanly");
        Ok(())
    }

    fn kill(&mut self) {
        self.stream = None;
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.kill() {
                debug!("ffmpeg already exited: {}", e);
            }
            if let Err(e) = child.wait() {
                warn!("Failed to reap ffmpeg: {}", e);
            }
        }
    }
}

impl VideoSource for FfmpegVideo {
    fn frame_rate(&self) -> f64 {
        self.info.frame_rate
    }

    fn seek_and_decode(&mut self, timestamp_ms: u64) -> Result<Option<&Frame>> {
        let reusable = self
            .stream
            .as_ref()
            .is_some_and(|s| s.can_serve(timestamp_ms));
        if !reusable {
            debug!("Restarting decoder at {}ms", timestamp_ms);
            self.spawn(timestamp_ms)?;
        }

        let Some(stream) = self.stream.as_mut() else {
            return Ok(None);
        };
        if !stream.advance_to(timestamp_ms)? {
            self.finish()?;
            return Ok(None);
        }
        Ok(self.stream.as_ref().and_then(|s| s.current.as_ref()))
    }

    fn resize(&mut self, cols: u16, rows: u16) -> Result<()> {
        let resume_at = self
            .stream
            .as_ref()
            .map(|s| s.frame_time_ms(s.frames_read.saturating_sub(1)))
            .unwrap_or(0);
        self.out_width = cols.max(1) as u32 * CELL_WIDTH;
        self.out_height = rows.max(1) as u32 * CELL_HEIGHT;
        self.spawn(resume_at)
    }
}

fn read_stderr_tail(stderr: &mut Option<ChildStderr>) -> Result<String> {
    let Some(mut pipe) = stderr.take() else {
        return Ok(String::new());
    };
    let mut buf = Vec::new();
    pipe.read_to_end(&mut buf)
        .context("Failed reading ffmpeg stderr")?;
    let text = String::from_utf8_lossy(&buf);
    let text = text.trim();
    // Keep the last 500 chars
    let skip = text.chars().count().saturating_sub(500);
    Ok(text.chars().skip(skip).collect())
}

impl Drop for FfmpegVideo {
    fn drop(&mut self) {
        self.kill();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn stream_of(frames: u8, start_ms: u64, fps: f64) -> RawStream<Cursor<Vec<u8>>> {
        // 2x1 frames, every byte set to the frame index
        let data: Vec<u8> = (0..frames).flat_map(|i| [i; 6]).collect();
        RawStream::new(Cursor::new(data), 2, 1, start_ms, fps)
    }

    #[test]
    fn parses_ffprobe_output() {
        let info = parse_probe("width=1280\nheight=720\nr_frame_rate=30000/1001\nduration=12.500000\n")
            .unwrap();
        assert_eq!(info.width, 1280);
        assert_eq!(info.height, 720);
        assert!((info.frame_rate - 29.97).abs() < 0.01);
        assert_eq!(info.duration_ms, Some(12500));
    }

    #[test]
    fn probe_tolerates_missing_duration() {
        let info = parse_probe("width=2\nheight=2\nr_frame_rate=25/1\nduration=N/A\n").unwrap();
        assert_eq!(info.frame_rate, 25.0);
        assert_eq!(info.duration_ms, None);
    }

    #[test]
    fn probe_rejects_zero_rate() {
        assert!(parse_probe("width=2\nheight=2\nr_frame_rate=0/0\n").is_err());
        assert!(parse_probe("r_frame_rate=25/1\n").is_err());
    }

    #[test]
    fn reads_forward_to_timestamp() {
        let mut stream = stream_of(5, 0, 10.0);
        assert!(stream.advance_to(0).unwrap());
        assert_eq!(stream.current.as_ref().unwrap().pixel(0, 0).red, 0);
        assert!(stream.advance_to(250).unwrap());
        assert_eq!(stream.current.as_ref().unwrap().pixel(0, 0).red, 2);
        assert_eq!(stream.frames_read, 3);
    }

    #[test]
    fn same_timestamp_keeps_current_frame() {
        let mut stream = stream_of(5, 0, 10.0);
        assert!(stream.advance_to(120).unwrap());
        assert!(stream.advance_to(150).unwrap());
        assert_eq!(stream.frames_read, 2);
    }

    #[test]
    fn reports_end_of_stream() {
        let mut stream = stream_of(2, 0, 10.0);
        assert!(!stream.advance_to(500).unwrap());
    }

    #[test]
    fn backward_and_far_seeks_need_restart() {
        let mut stream = stream_of(5, 1000, 10.0);
        assert!(!stream.can_serve(500));
        assert!(stream.can_serve(1000));
        stream.advance_to(1200).unwrap();
        assert!(!stream.can_serve(1100));
        assert!(stream.can_serve(1250));
        assert!(!stream.can_serve(1300 + RESTART_THRESHOLD_MS + 1));
    }

    /// Decoder wired to a shell child standing in for ffmpeg.
    #[cfg(unix)]
    fn video_from_shell(script: &str) -> FfmpegVideo {
        let mut child = Command::new("sh")
            .args(["-c", script])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .unwrap();
        let stdout = child.stdout.take().unwrap();
        FfmpegVideo {
            path: PathBuf::from("movie.mp4"),
            info: VideoInfo {
                width: 8,
                height: 8,
                frame_rate: 25.0,
                duration_ms: None,
            },
            out_width: 2,
            out_height: 1,
            child: Some(child),
            stream: Some(RawStream::new(stdout, 2, 1, 0, 25.0)),
        }
    }

    #[cfg(unix)]
    #[test]
    fn failing_decoder_is_an_error_not_end_of_stream() {
        let mut video =
            video_from_shell("echo 'Invalid data found when processing input' >&2; exit 1");
        let err = video.seek_and_decode(0).unwrap_err();
        let message = format!("{:#}", err);
        assert!(message.contains("Invalid data found"), "{message}");
    }

    #[cfg(unix)]
    #[test]
    fn clean_exit_is_end_of_stream() {
        let mut video = video_from_shell("printf 'abcdef'");
        assert!(video.seek_and_decode(0).unwrap().is_some());
        assert!(video.seek_and_decode(40).unwrap().is_none());
        assert!(video.seek_and_decode(40).unwrap().is_none());
    }

    #[test]
    fn rational_rates() {
        assert_eq!(parse_rational("25"), Some(25.0));
        assert_eq!(parse_rational("50/2"), Some(25.0));
        assert_eq!(parse_rational("1/0"), None);
    }
}
