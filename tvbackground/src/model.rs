//! Value types shared by every background component.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::BackgroundError;
use crate::resolver;

/// What kind of media renders behind the home screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BackgroundType {
    Image,
    Video,
}

impl BackgroundType {
    /// Persisted representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            BackgroundType::Image => "IMAGE",
            BackgroundType::Video => "VIDEO",
        }
    }

    /// Guesses the media kind from a file extension (case-insensitive).
    pub fn from_extension(ext: &str) -> Option<Self> {
        const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif", "bmp"];
        const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mkv", "webm", "mov", "m4v", "avi", "3gp"];

        let ext = ext.to_ascii_lowercase();
        if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            Some(BackgroundType::Image)
        } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            Some(BackgroundType::Video)
        } else {
            None
        }
    }

    /// Guesses the media kind from the extension of a path or URL.
    pub fn from_locator(locator: &str) -> Option<Self> {
        let trimmed = locator.split(['?', '#']).next().unwrap_or(locator);
        let file_name = trimmed.rsplit('/').next().unwrap_or(trimmed);
        let (_, ext) = file_name.rsplit_once('.')?;
        Self::from_extension(ext)
    }

    /// Extension used when an imported file has no usable name.
    pub fn default_extension(&self) -> &'static str {
        match self {
            BackgroundType::Image => "jpg",
            BackgroundType::Video => "mp4",
        }
    }
}

impl fmt::Display for BackgroundType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackgroundType {
    type Err = BackgroundError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "IMAGE" => Ok(BackgroundType::Image),
            "VIDEO" => Ok(BackgroundType::Video),
            other => Err(BackgroundError::persistence(format!(
                "unknown background type '{other}'"
            ))),
        }
    }
}

/// Where the resource path points to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BackgroundSourceType {
    Local,
    Url,
}

impl BackgroundSourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackgroundSourceType::Local => "LOCAL",
            BackgroundSourceType::Url => "URL",
        }
    }
}

impl fmt::Display for BackgroundSourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackgroundSourceType {
    type Err = BackgroundError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LOCAL" => Ok(BackgroundSourceType::Local),
            "URL" => Ok(BackgroundSourceType::Url),
            other => Err(BackgroundError::persistence(format!(
                "unknown background source type '{other}'"
            ))),
        }
    }
}

/// The persisted background descriptor.
///
/// Immutable once built; `resource_path` is never empty. Structural
/// equality compares all four fields, while selection highlighting should
/// use [`BackgroundSetting::is_same_resource`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct BackgroundSetting {
    #[serde(rename = "type")]
    background_type: BackgroundType,
    source_type: BackgroundSourceType,
    resource_path: String,
    name: String,
}

impl BackgroundSetting {
    pub fn new(
        background_type: BackgroundType,
        source_type: BackgroundSourceType,
        resource_path: impl Into<String>,
        name: impl Into<String>,
    ) -> Result<Self, BackgroundError> {
        let resource_path = resource_path.into();
        if resource_path.trim().is_empty() {
            return Err(BackgroundError::InvalidSetting(
                "resource path must not be empty".to_string(),
            ));
        }
        Ok(Self {
            background_type,
            source_type,
            resource_path,
            name: name.into(),
        })
    }

    /// Built-in entries whose path is a non-empty literal.
    pub(crate) fn builtin(
        background_type: BackgroundType,
        resource_path: &'static str,
        name: &'static str,
    ) -> Self {
        debug_assert!(!resource_path.is_empty());
        Self {
            background_type,
            source_type: BackgroundSourceType::Local,
            resource_path: resource_path.to_string(),
            name: name.to_string(),
        }
    }

    pub fn background_type(&self) -> BackgroundType {
        self.background_type
    }

    pub fn source_type(&self) -> BackgroundSourceType {
        self.source_type
    }

    pub fn resource_path(&self) -> &str {
        &self.resource_path
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_video(&self) -> bool {
        self.background_type == BackgroundType::Video
    }

    /// Renderable locator for this background, see [`resolver::resolve`].
    pub fn direct_url(&self) -> String {
        resolver::resolve(self)
    }

    /// Selection highlighting compares by resource path only.
    pub fn is_same_resource(&self, other: &BackgroundSetting) -> bool {
        self.resource_path == other.resource_path
    }
}

/// An item found in the device media index. Transient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MediaItemDescriptor {
    /// Opaque locator accepted by the content resolver
    pub locator: String,
    pub kind: BackgroundType,
    /// Human-oriented path, used for display and as a naming hint
    pub path: String,
}

/// State consumed by the background picker.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum BackgroundSettingsState {
    #[default]
    Initial,
    Loading,
    Loaded {
        available: Vec<BackgroundSetting>,
        current: BackgroundSetting,
    },
    Error {
        message: String,
    },
}

impl BackgroundSettingsState {
    /// Current selection when the state is `Loaded`.
    pub fn current(&self) -> Option<&BackgroundSetting> {
        match self {
            BackgroundSettingsState::Loaded { current, .. } => Some(current),
            _ => None,
        }
    }
}

/// State of the optional, user-triggered media scan.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum MediaStoreFetchState {
    #[default]
    Idle,
    Loading,
    Success {
        items: Vec<MediaItemDescriptor>,
    },
    Empty,
    Error {
        message: String,
    },
}

/// Host lifecycle signals driving playback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// The home screen became visible again
    Resumed,
    /// The home screen went to the background (transient)
    Paused,
    /// The process is going away
    Destroyed,
}
