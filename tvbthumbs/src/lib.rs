//! # tvbthumbs - Background previews for TVBackdrop
//!
//! Square thumbnails for the background picker: a frame taken a few seconds
//! into videos, the picture itself for still images.
//!
//! ```rust,no_run
//! use tvbthumbs::{ThumbnailCache, ThumbnailGenerator};
//!
//! # async fn run() {
//! let config = tvbconfig::get_config();
//! let cache = ThumbnailCache::new(ThumbnailGenerator::from_config(&config));
//! if let Some(thumb) = cache.get("/data/backgrounds/waves.mp4").await {
//!     println!("{}x{}", thumb.width(), thumb.height());
//! }
//! # }
//! ```

pub mod cache;
pub mod frame;
pub mod generator;
pub mod square;

pub use cache::ThumbnailCache;
pub use frame::{
    DecoderGuard, FfmpegFrameSource, FrameDecoder, FrameSource, StillImageSource, extract_frame,
};
pub use generator::ThumbnailGenerator;
pub use square::ensure_square;
