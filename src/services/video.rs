//! Sequential video frame decoding through ffmpeg.
//!
//! ffprobe reports the stream dimensions, then ffmpeg decodes to raw rgb24 on
//! a pipe so frames are read one at a time and never touch the disk.

use anyhow::{Context, Result, anyhow, bail};
use image::RgbImage;
use std::io::{self, Read};
use std::path::Path;
use std::process::{Child, ChildStdout, Command, Stdio};
use std::thread::{self, JoinHandle};

/// A stream of decoded frames in presentation order
pub trait FrameStream: Send {
    /// `Ok(None)` at end of stream
    fn next_frame(&mut self) -> io::Result<Option<RgbImage>>;
}

/// Opens a video file as a frame stream of at most `frame_limit` frames
pub trait FrameDecoder: Send + Sync {
    fn open(&self, path: &Path, frame_limit: usize) -> Result<Box<dyn FrameStream>>;
}

pub struct FfmpegDecoder {
    ffmpeg: String,
    ffprobe: String,
}

impl FfmpegDecoder {
    pub fn new(ffmpeg: impl Into<String>, ffprobe: impl Into<String>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }

    pub fn ensure_available(&self) -> Result<()> {
        for binary in [&self.ffmpeg, &self.ffprobe] {
            let status = Command::new(binary)
                .arg("-version")
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .with_context(|| format!("Failed to spawn {}", binary))?;
            if !status.success() {
                bail!("{} -version exited with {}", binary, status);
            }
        }
        Ok(())
    }

    fn read_dimensions(&self, path: &Path) -> Result<(u32, u32)> {
        let output = Command::new(&self.ffprobe)
            .args(["-v", "error"])
            .args(["-select_streams", "v:0"])
            .args(["-show_entries", "stream=width,height"])
            .args(["-of", "csv=s=x:p=0"])
            .arg(path)
            .stdin(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .with_context(|| format!("Failed to spawn {}", self.ffprobe))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("ffprobe failed: {}", stderr.trim());
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_dimensions(&stdout).ok_or_else(|| anyhow!("no video stream found ({:?})", stdout.trim()))
    }
}

impl FrameDecoder for FfmpegDecoder {
    fn open(&self, path: &Path, frame_limit: usize) -> Result<Box<dyn FrameStream>> {
        let (width, height) = self.read_dimensions(path)?;

        // -noautorotate keeps the decoded size equal to what ffprobe reported
        let mut child = Command::new(&self.ffmpeg)
            .args(["-hide_banner", "-loglevel", "error", "-nostdin", "-noautorotate"])
            .arg("-i")
            .arg(path)
            .args(["-an", "-sn"])
            .args(["-frames:v", &frame_limit.to_string()])
            .args(["-f", "rawvideo", "-pix_fmt", "rgb24", "pipe:1"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("Failed to spawn {}", self.ffmpeg))?;

        let (stdout, stderr) = match (child.stdout.take(), child.stderr.take()) {
            (Some(stdout), Some(stderr)) => (stdout, stderr),
            _ => {
                let _ = child.kill();
                let _ = child.wait();
                bail!("ffmpeg pipes unavailable");
            }
        };

        // Drained on its own thread so a chatty ffmpeg never blocks on a full pipe
        let stderr = thread::spawn(move || {
            let mut stderr = stderr;
            let mut log = String::new();
            let _ = stderr.read_to_string(&mut log);
            log
        });

        tracing::debug!("[video] Decoding {}x{} frames from {:?}", width, height, path);

        Ok(Box::new(FfmpegFrameStream {
            child,
            stdout,
            stderr: Some(stderr),
            width,
            height,
            frame_len: width as usize * height as usize * 3,
            finished: false,
        }))
    }
}

struct FfmpegFrameStream {
    child: Child,
    stdout: ChildStdout,
    stderr: Option<JoinHandle<String>>,
    width: u32,
    height: u32,
    frame_len: usize,
    finished: bool,
}

impl FfmpegFrameStream {
    /// The pipe closed: a clean exit ends the stream, anything else is a decode failure.
    /// A truncated trailing frame after a clean exit is dropped.
    fn finish(&mut self) -> io::Result<Option<RgbImage>> {
        self.finished = true;
        let status = self.child.wait()?;
        let log = self
            .stderr
            .take()
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();

        if status.success() {
            return Ok(None);
        }

        let detail = log.trim();
        Err(io::Error::other(if detail.is_empty() {
            format!("ffmpeg exited with {}", status)
        } else {
            format!("ffmpeg exited with {}: {}", status, detail)
        }))
    }
}

impl FrameStream for FfmpegFrameStream {
    fn next_frame(&mut self) -> io::Result<Option<RgbImage>> {
        if self.finished {
            return Ok(None);
        }

        let mut buf = vec![0u8; self.frame_len];
        match self.stdout.read_exact(&mut buf) {
            Ok(()) => frame_from_raw(self.width, self.height, buf).map(Some),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => self.finish(),
            Err(e) => Err(e),
        }
    }
}

impl Drop for FfmpegFrameStream {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        // Early exit leaves ffmpeg mid-stream
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn frame_from_raw(width: u32, height: u32, buf: Vec<u8>) -> io::Result<RgbImage> {
    RgbImage::from_raw(width, height, buf)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "frame size mismatch"))
}

/// Parse ffprobe's `WIDTHxHEIGHT` output
pub fn parse_dimensions(output: &str) -> Option<(u32, u32)> {
    let line = output.lines().map(str::trim).find(|line| !line.is_empty())?;
    let (width, height) = line.split_once('x')?;
    let width: u32 = width.trim().parse().ok()?;
    let height: u32 = height.trim().trim_end_matches('x').parse().ok()?;
    (width > 0 && height > 0).then_some((width, height))
}

/// Temp file extension for an uploaded video, by content type
pub fn extension_for(content_type: Option<&str>) -> &'static str {
    match content_type {
        Some("video/webm") => "webm",
        Some("video/quicktime") => "mov",
        Some("video/x-matroska") => "mkv",
        Some("video/x-msvideo") => "avi",
        _ => "mp4",
    }
}
