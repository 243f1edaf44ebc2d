//! Frame extraction backends.
//!
//! A [`FrameSource`] opens a resource and hands out a [`FrameDecoder`].
//! Decoders hold native resources (a subprocess, a file) and must be
//! released on every path, which [`extract_frame`] guarantees.

use std::io::Read;
use std::ops::{Deref, DerefMut};
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use image::DynamicImage;
use tracing::{debug, trace};
use tvbackground::{BackgroundError, Result};

pub trait FrameDecoder: Send {
    /// Frame at `offset`, or the closest sync frame before it. Still
    /// images ignore the offset.
    fn frame_at(&mut self, offset: Duration) -> Result<DynamicImage>;

    /// Frees the underlying resource. Safe to call more than once.
    fn release(&mut self);
}

pub trait FrameSource: Send + Sync {
    fn open(&self, locator: &str) -> Result<Box<dyn FrameDecoder>>;
}

/// Releases the wrapped decoder when dropped.
pub struct DecoderGuard {
    decoder: Box<dyn FrameDecoder>,
}

impl DecoderGuard {
    pub fn new(decoder: Box<dyn FrameDecoder>) -> Self {
        Self { decoder }
    }
}

impl Deref for DecoderGuard {
    type Target = dyn FrameDecoder;

    fn deref(&self) -> &Self::Target {
        &*self.decoder
    }
}

impl DerefMut for DecoderGuard {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut *self.decoder
    }
}

impl Drop for DecoderGuard {
    fn drop(&mut self) {
        self.decoder.release();
    }
}

/// Opens `locator` with `source` and decodes one frame. Blocking.
pub fn extract_frame(
    source: &dyn FrameSource,
    locator: &str,
    offset: Duration,
) -> Result<DynamicImage> {
    let mut decoder = DecoderGuard::new(source.open(locator)?);
    decoder.frame_at(offset)
}

fn local_path(locator: &str) -> &str {
    locator.strip_prefix("file://").unwrap_or(locator)
}

// ============================================================================
// Still images
// ============================================================================

/// Decodes still images with the `image` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct StillImageSource;

struct StillImageDecoder {
    path: String,
}

impl FrameSource for StillImageSource {
    fn open(&self, locator: &str) -> Result<Box<dyn FrameDecoder>> {
        Ok(Box::new(StillImageDecoder {
            path: local_path(locator).to_string(),
        }))
    }
}

impl FrameDecoder for StillImageDecoder {
    fn frame_at(&mut self, _offset: Duration) -> Result<DynamicImage> {
        image::open(&self.path)
            .map_err(|e| BackgroundError::decode(format!("{}: {}", self.path, e)))
    }

    fn release(&mut self) {}
}

// ============================================================================
// ffmpeg
// ============================================================================

/// Extracts video frames by piping one PNG out of an `ffmpeg` subprocess.
///
/// The seek happens on the input without accurate seeking, so the frame
/// returned is the keyframe at or before the offset.
#[derive(Debug, Clone)]
pub struct FfmpegFrameSource {
    command: String,
}

impl Default for FfmpegFrameSource {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl FfmpegFrameSource {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }
}

impl FrameSource for FfmpegFrameSource {
    fn open(&self, locator: &str) -> Result<Box<dyn FrameDecoder>> {
        Ok(Box::new(FfmpegDecoder {
            command: self.command.clone(),
            input: local_path(locator).to_string(),
            child: None,
        }))
    }
}

struct FfmpegDecoder {
    command: String,
    input: String,
    child: Option<Child>,
}

impl FrameDecoder for FfmpegDecoder {
    fn frame_at(&mut self, offset: Duration) -> Result<DynamicImage> {
        let seek = format!("{:.3}", offset.as_secs_f64());
        trace!(input = %self.input, seek = %seek, "Spawning frame extractor");

        let mut child = Command::new(&self.command)
            .args(["-v", "error", "-noaccurate_seek", "-ss", &seek, "-i"])
            .arg(&self.input)
            .args(["-frames:v", "1", "-f", "image2pipe", "-vcodec", "png", "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| BackgroundError::decode(format!("cannot start {}: {}", self.command, e)))?;

        let stdout = child.stdout.take();
        self.child = Some(child);
        let mut stdout =
            stdout.ok_or_else(|| BackgroundError::decode("frame extractor has no output pipe"))?;

        let mut png = Vec::new();
        stdout
            .read_to_end(&mut png)
            .map_err(|e| BackgroundError::decode(format!("reading frame failed: {}", e)))?;

        if let Some(mut child) = self.child.take() {
            let status = child
                .wait()
                .map_err(|e| BackgroundError::decode(format!("frame extractor lost: {}", e)))?;
            if !status.success() {
                return Err(BackgroundError::decode(format!(
                    "{} exited with {} for {}",
                    self.command, status, self.input
                )));
            }
        }

        if png.is_empty() {
            return Err(BackgroundError::decode(format!(
                "no frame at {}s in {}",
                seek, self.input
            )));
        }

        image::load_from_memory(&png)
            .map_err(|e| BackgroundError::decode(format!("invalid frame: {}", e)))
    }

    fn release(&mut self) {
        if let Some(mut child) = self.child.take() {
            debug!(input = %self.input, "Stopping frame extractor");
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}
