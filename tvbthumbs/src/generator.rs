use std::sync::Arc;
use std::time::Duration;

use image::DynamicImage;
use tracing::{debug, warn};
use tvbackground::{BackgroundType, resolver};
use tvbconfig::Config;

use crate::frame::{FfmpegFrameSource, FrameSource, StillImageSource, extract_frame};
use crate::square::ensure_square;

pub const DEFAULT_OFFSET: Duration = Duration::from_secs(5);
pub const DEFAULT_SIZE: u32 = 320;

/// Preview images for the background picker.
///
/// Videos are sampled at a fixed offset; still images are decoded as is.
/// Every failure degrades to "no thumbnail".
#[derive(Clone)]
pub struct ThumbnailGenerator {
    images: Arc<dyn FrameSource>,
    videos: Arc<dyn FrameSource>,
    offset: Duration,
    size: u32,
}

impl std::fmt::Debug for ThumbnailGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThumbnailGenerator")
            .field("offset", &self.offset)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

impl Default for ThumbnailGenerator {
    fn default() -> Self {
        Self::new(
            Arc::new(StillImageSource),
            Arc::new(FfmpegFrameSource::default()),
        )
    }
}

impl ThumbnailGenerator {
    pub fn new(images: Arc<dyn FrameSource>, videos: Arc<dyn FrameSource>) -> Self {
        Self {
            images,
            videos,
            offset: DEFAULT_OFFSET,
            size: DEFAULT_SIZE,
        }
    }

    /// Size, offset and ffmpeg command from `backgrounds.thumbnails`.
    pub fn from_config(config: &Config) -> Self {
        let size = config
            .get_thumbnail_size()
            .ok()
            .and_then(|s| u32::try_from(s).ok())
            .unwrap_or(DEFAULT_SIZE);
        let offset = config
            .get_thumbnail_offset_secs()
            .map(|s| Duration::from_secs(s as u64))
            .unwrap_or(DEFAULT_OFFSET);

        Self::new(
            Arc::new(StillImageSource),
            Arc::new(FfmpegFrameSource::new(config.get_ffmpeg_command())),
        )
        .with_offset(offset)
        .with_size(size)
    }

    pub fn with_offset(mut self, offset: Duration) -> Self {
        self.offset = offset;
        self
    }

    /// Side of the square preview, in pixels.
    pub fn with_size(mut self, size: u32) -> Self {
        self.size = size.max(1);
        self
    }

    pub fn offset(&self) -> Duration {
        self.offset
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    /// Square preview of the resource at `path`.
    ///
    /// Sharing links return `None` straight away: their preview comes from
    /// the sharing service, see [`resolver::resolve_thumbnail`].
    pub async fn generate(&self, path: &str) -> Option<DynamicImage> {
        if resolver::is_sharing_link(path) {
            debug!(path, "Sharing link, no local thumbnail");
            return None;
        }

        let source = match BackgroundType::from_locator(path) {
            Some(BackgroundType::Image) => self.images.clone(),
            _ => self.videos.clone(),
        };
        let locator = path.to_string();
        let offset = self.offset;
        let size = self.size;

        let result = tokio::task::spawn_blocking(move || {
            extract_frame(source.as_ref(), &locator, offset).map(|frame| ensure_square(&frame, size))
        })
        .await;

        match result {
            Ok(Ok(thumbnail)) => Some(thumbnail),
            Ok(Err(e)) => {
                warn!(path, error = %e, "Thumbnail generation failed");
                None
            }
            Err(e) => {
                warn!(path, error = %e, "Thumbnail task failed");
                None
            }
        }
    }
}
