//! Device media index queries.
//!
//! The scanner never asks for read permission: the host grants it before
//! a scan is triggered.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use tvbconfig::Config;
use walkdir::WalkDir;

use crate::errors::{BackgroundError, Result};
use crate::model::{BackgroundType, MediaItemDescriptor};

/// Media kinds known to an index. Only images and videos can become
/// backgrounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexMediaType {
    Image,
    Video,
    Audio,
    Other,
}

impl IndexMediaType {
    pub fn background_type(&self) -> Option<BackgroundType> {
        match self {
            IndexMediaType::Image => Some(BackgroundType::Image),
            IndexMediaType::Video => Some(BackgroundType::Video),
            IndexMediaType::Audio | IndexMediaType::Other => None,
        }
    }

    fn from_extension(ext: &str) -> Self {
        const AUDIO_EXTENSIONS: &[&str] = &["mp3", "flac", "ogg", "opus", "wav", "m4a", "aac"];

        match BackgroundType::from_extension(ext) {
            Some(BackgroundType::Image) => IndexMediaType::Image,
            Some(BackgroundType::Video) => IndexMediaType::Video,
            None if AUDIO_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()) => {
                IndexMediaType::Audio
            }
            None => IndexMediaType::Other,
        }
    }
}

/// One row of the media index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub id: String,
    pub media_type: IndexMediaType,
    /// Locator understood by the content resolver
    pub locator: String,
    pub path: String,
    pub added_at: DateTime<Utc>,
}

/// Read-only view of the shared media index.
#[async_trait]
pub trait MediaIndex: Send + Sync {
    /// Entries whose type is one of `kinds`.
    async fn query(&self, kinds: &[IndexMediaType]) -> Result<Vec<IndexEntry>>;
}

const SCANNED_KINDS: [IndexMediaType; 2] = [IndexMediaType::Image, IndexMediaType::Video];

/// Lists importable images and videos, newest first.
#[derive(Clone)]
pub struct MediaStoreScanner {
    index: Arc<dyn MediaIndex>,
}

impl std::fmt::Debug for MediaStoreScanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaStoreScanner").finish_non_exhaustive()
    }
}

impl MediaStoreScanner {
    pub fn new(index: Arc<dyn MediaIndex>) -> Self {
        Self { index }
    }

    pub async fn scan(&self) -> Result<Vec<MediaItemDescriptor>> {
        let mut entries = self.index.query(&SCANNED_KINDS).await?;

        // Indexes are not trusted to honour the filter nor the order
        entries.retain(|e| SCANNED_KINDS.contains(&e.media_type));
        entries.sort_by(|a, b| b.added_at.cmp(&a.added_at));

        let items: Vec<MediaItemDescriptor> = entries
            .into_iter()
            .filter_map(|entry| {
                let kind = entry.media_type.background_type()?;
                Some(MediaItemDescriptor {
                    locator: entry.locator,
                    kind,
                    path: entry.path,
                })
            })
            .collect();

        debug!(count = items.len(), "Media index scanned");
        Ok(items)
    }
}

/// [`MediaIndex`] over a set of directories, walked recursively.
///
/// The file modification time stands in for the addition time.
#[derive(Debug, Clone)]
pub struct DirectoryMediaIndex {
    roots: Vec<PathBuf>,
}

impl DirectoryMediaIndex {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self { roots }
    }

    /// Index over `backgrounds.media_roots`.
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.get_media_roots().into_iter().map(PathBuf::from).collect())
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    fn walk(roots: &[PathBuf], kinds: &[IndexMediaType]) -> Vec<IndexEntry> {
        let mut entries = Vec::new();

        for root in roots {
            if !root.is_dir() {
                warn!(root = %root.display(), "Media root is not a directory, skipping");
                continue;
            }

            for entry in WalkDir::new(root)
                .follow_links(true)
                .into_iter()
                .filter_map(|e| e.ok())
            {
                if !entry.file_type().is_file() || is_hidden(entry.path()) {
                    continue;
                }
                let Some(ext) = entry.path().extension() else {
                    continue;
                };
                let media_type = IndexMediaType::from_extension(&ext.to_string_lossy());
                if !kinds.contains(&media_type) {
                    continue;
                }

                let added_at = entry
                    .metadata()
                    .ok()
                    .and_then(|m| m.modified().ok())
                    .map(DateTime::<Utc>::from)
                    .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
                let path = entry.path().to_string_lossy().to_string();

                entries.push(IndexEntry {
                    id: path.clone(),
                    media_type,
                    locator: path.clone(),
                    path,
                    added_at,
                });
            }
        }

        entries.sort_by(|a, b| b.added_at.cmp(&a.added_at));
        entries
    }
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .map(|n| n.to_string_lossy().starts_with('.'))
        .unwrap_or(false)
}

#[async_trait]
impl MediaIndex for DirectoryMediaIndex {
    async fn query(&self, kinds: &[IndexMediaType]) -> Result<Vec<IndexEntry>> {
        let roots = self.roots.clone();
        let kinds = kinds.to_vec();
        tokio::task::spawn_blocking(move || Self::walk(&roots, &kinds))
            .await
            .map_err(|e| BackgroundError::scan(format!("Task join error: {}", e)))
    }
}
