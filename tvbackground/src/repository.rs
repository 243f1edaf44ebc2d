//! Persistence of the selected background and enumeration of candidates.
//!
//! The selection lives in four string fields of a key-value store. Reads
//! fall back field by field to the seed default (first bundled video), so
//! a partially written or empty store still yields a usable background.

use std::collections::HashMap;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use parking_lot::Mutex;
use tracing::{debug, info, warn};
use tvbconfig::Config;
use url::Url;
use uuid::Uuid;

use crate::errors::{BackgroundError, Result};
use crate::model::{BackgroundSetting, BackgroundSourceType, BackgroundType};

/// Namespace of the persisted selection
pub const PREFS_NAMESPACE: &str = "background_prefs";
pub const KEY_TYPE: &str = "backgroundType";
pub const KEY_SOURCE_TYPE: &str = "backgroundSourceType";
pub const KEY_PATH: &str = "backgroundPath";
pub const KEY_NAME: &str = "backgroundName";

const SEED_NAME: &str = "Ocean Waves";
const SEED_PATH: &str = "asset://backgrounds/ocean_waves.mp4";

const IMPORT_STAGING_PREFIX: &str = ".import-";
const MAX_NAME_ATTEMPTS: usize = 1000;

// ============================================================================
// Key-value persistence
// ============================================================================

/// String key-value persistence used for the current selection.
pub trait KeyValueStore: Send + Sync {
    /// `Ok(None)` when the key is absent.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Writes `entries` in the given order.
    fn set_all(&self, entries: &[(&str, &str)]) -> Result<()>;
}

/// [`KeyValueStore`] backed by the TVBackdrop configuration file.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    config: Arc<Config>,
    namespace: String,
}

impl ConfigStore {
    pub fn new(config: Arc<Config>) -> Self {
        Self::with_namespace(config, PREFS_NAMESPACE)
    }

    pub fn with_namespace(config: Arc<Config>, namespace: &str) -> Self {
        Self {
            config,
            namespace: namespace.to_string(),
        }
    }
}

impl KeyValueStore for ConfigStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        self.config
            .get_pref(&self.namespace, key)
            .map_err(BackgroundError::persistence)
    }

    fn set_all(&self, entries: &[(&str, &str)]) -> Result<()> {
        self.config
            .set_prefs(&self.namespace, entries)
            .map_err(BackgroundError::persistence)
    }
}

/// In-memory [`KeyValueStore`], remembers the order keys were written in.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
    write_log: Mutex<Vec<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keys in the order they were written, oldest first.
    pub fn write_log(&self) -> Vec<String> {
        self.write_log.lock().clone()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.lock().get(key).cloned())
    }

    fn set_all(&self, entries: &[(&str, &str)]) -> Result<()> {
        let mut values = self.values.lock();
        let mut log = self.write_log.lock();
        for (key, value) in entries {
            values.insert((*key).to_string(), (*value).to_string());
            log.push((*key).to_string());
        }
        Ok(())
    }
}

// ============================================================================
// Content access
// ============================================================================

/// Resolves an opaque source locator to bytes and a display name.
pub trait ContentResolver: Send + Sync {
    fn open(&self, locator: &str) -> io::Result<Box<dyn Read + Send>>;

    /// Name suitable for deriving a file name, if the source has one.
    fn display_name(&self, locator: &str) -> Option<String>;
}

/// Plain filesystem paths and `file://` URLs.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileContentResolver;

impl FileContentResolver {
    fn to_path(locator: &str) -> PathBuf {
        if locator.starts_with("file://") {
            if let Some(path) = Url::parse(locator).ok().and_then(|u| u.to_file_path().ok()) {
                return path;
            }
        }
        PathBuf::from(locator)
    }
}

impl ContentResolver for FileContentResolver {
    fn open(&self, locator: &str) -> io::Result<Box<dyn Read + Send>> {
        let file = fs::File::open(Self::to_path(locator))?;
        Ok(Box::new(file))
    }

    fn display_name(&self, locator: &str) -> Option<String> {
        Self::to_path(locator)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
    }
}

// ============================================================================
// Bundled catalog
// ============================================================================

/// Backgrounds shipped with the application.
#[derive(Debug, Clone, Default)]
pub struct BundledCatalog {
    images: Vec<BackgroundSetting>,
    videos: Vec<BackgroundSetting>,
}

impl BundledCatalog {
    pub fn new(images: Vec<BackgroundSetting>, videos: Vec<BackgroundSetting>) -> Self {
        Self { images, videos }
    }

    /// Reads `backgrounds.bundled.images` and `backgrounds.bundled.videos`.
    pub fn from_config(config: &Config) -> Self {
        let build = |kind: &str, background_type: BackgroundType| {
            config
                .get_bundled_backgrounds(kind)
                .into_iter()
                .filter_map(|entry| {
                    BackgroundSetting::new(
                        background_type,
                        BackgroundSourceType::Local,
                        entry.path,
                        entry.name,
                    )
                    .ok()
                })
                .collect::<Vec<_>>()
        };

        Self {
            images: build("images", BackgroundType::Image),
            videos: build("videos", BackgroundType::Video),
        }
    }

    pub fn images(&self) -> &[BackgroundSetting] {
        &self.images
    }

    pub fn videos(&self) -> &[BackgroundSetting] {
        &self.videos
    }

    /// First bundled video, or the built-in one when none is configured.
    pub fn seed_default(&self) -> BackgroundSetting {
        self.videos.first().cloned().unwrap_or_else(|| {
            BackgroundSetting::builtin(BackgroundType::Video, SEED_PATH, SEED_NAME)
        })
    }
}

// ============================================================================
// Repository
// ============================================================================

/// Reads and writes the selected background, lists candidates and imports
/// local files into the app-private directory.
///
/// Every method runs its I/O on the blocking pool.
#[derive(Clone)]
pub struct BackgroundRepository {
    store: Arc<dyn KeyValueStore>,
    content: Arc<dyn ContentResolver>,
    catalog: BundledCatalog,
    import_dir: PathBuf,
}

impl std::fmt::Debug for BackgroundRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundRepository")
            .field("catalog", &self.catalog)
            .field("import_dir", &self.import_dir)
            .finish()
    }
}

impl BackgroundRepository {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        content: Arc<dyn ContentResolver>,
        catalog: BundledCatalog,
        import_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            store,
            content,
            catalog,
            import_dir: import_dir.into(),
        }
    }

    /// Repository persisting into `config`, importing into its managed
    /// import directory and reading local files.
    pub fn from_config(config: Arc<Config>) -> Result<Self> {
        let import_dir = config
            .get_import_dir()
            .map_err(BackgroundError::persistence)?;
        let catalog = BundledCatalog::from_config(&config);
        Ok(Self::new(
            Arc::new(ConfigStore::new(config)),
            Arc::new(FileContentResolver),
            catalog,
            import_dir,
        ))
    }

    pub fn catalog(&self) -> &BundledCatalog {
        &self.catalog
    }

    pub fn import_dir(&self) -> &Path {
        &self.import_dir
    }

    pub fn seed_default(&self) -> BackgroundSetting {
        self.catalog.seed_default()
    }

    /// Currently selected background; missing fields come from the seed.
    pub async fn get_current(&self) -> Result<BackgroundSetting> {
        let store = self.store.clone();
        let seed = self.seed_default();
        run_blocking(move || read_current(store.as_ref(), &seed), BackgroundError::persistence)
            .await
    }

    /// Persists `setting`, path first and type last.
    pub async fn set_current(&self, setting: &BackgroundSetting) -> Result<()> {
        let store = self.store.clone();
        let setting = setting.clone();
        run_blocking(
            move || write_current(store.as_ref(), &setting),
            BackgroundError::persistence,
        )
        .await
    }

    /// Bundled images, then bundled videos, then imported items.
    pub async fn list_available(&self) -> Result<Vec<BackgroundSetting>> {
        let import_dir = self.import_dir.clone();
        let imported =
            run_blocking(move || list_imported(&import_dir), BackgroundError::persistence).await?;

        let mut available = Vec::with_capacity(
            self.catalog.images.len() + self.catalog.videos.len() + imported.len(),
        );
        available.extend(self.catalog.images.iter().cloned());
        available.extend(self.catalog.videos.iter().cloned());
        available.extend(imported);
        Ok(available)
    }

    /// Copies `source_locator` into the import directory and returns the
    /// new path once every byte has been written.
    pub async fn import_local(
        &self,
        source_locator: &str,
        background_type: BackgroundType,
    ) -> Result<PathBuf> {
        let content = self.content.clone();
        let import_dir = self.import_dir.clone();
        let locator = source_locator.to_string();
        run_blocking(
            move || copy_into(&import_dir, content.as_ref(), &locator, background_type),
            BackgroundError::import,
        )
        .await
    }
}

async fn run_blocking<T, F>(f: F, on_join_error: fn(String) -> BackgroundError) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| on_join_error(format!("Task join error: {}", e)))?
}

fn read_field(store: &dyn KeyValueStore, key: &str) -> Result<Option<String>> {
    Ok(store.get(key)?.filter(|v| !v.trim().is_empty()))
}

fn read_current(store: &dyn KeyValueStore, seed: &BackgroundSetting) -> Result<BackgroundSetting> {
    let background_type = match read_field(store, KEY_TYPE)? {
        Some(v) => v.parse::<BackgroundType>()?,
        None => seed.background_type(),
    };
    let source_type = match read_field(store, KEY_SOURCE_TYPE)? {
        Some(v) => v.parse::<BackgroundSourceType>()?,
        None => seed.source_type(),
    };
    let resource_path =
        read_field(store, KEY_PATH)?.unwrap_or_else(|| seed.resource_path().to_string());
    let name = store
        .get(KEY_NAME)?
        .unwrap_or_else(|| seed.name().to_string());

    BackgroundSetting::new(background_type, source_type, resource_path, name)
}

fn write_current(store: &dyn KeyValueStore, setting: &BackgroundSetting) -> Result<()> {
    store.set_all(&[
        (KEY_PATH, setting.resource_path()),
        (KEY_NAME, setting.name()),
        (KEY_SOURCE_TYPE, setting.source_type().as_str()),
        (KEY_TYPE, setting.background_type().as_str()),
    ])?;
    debug!(
        path = setting.resource_path(),
        kind = %setting.background_type(),
        "Background selection persisted"
    );
    Ok(())
}

fn list_imported(import_dir: &Path) -> Result<Vec<BackgroundSetting>> {
    let entries = match fs::read_dir(import_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(BackgroundError::persistence(format!(
                "cannot list {}: {}",
                import_dir.display(),
                e
            )));
        }
    };

    let mut imported: Vec<(SystemTime, BackgroundSetting)> = Vec::new();
    for entry in entries.filter_map(|e| e.ok()) {
        let path = entry.path();
        let file_name = entry.file_name().to_string_lossy().to_string();
        if file_name.starts_with('.') || !path.is_file() {
            continue;
        }
        let Some(kind) = path
            .extension()
            .and_then(|e| BackgroundType::from_extension(&e.to_string_lossy()))
        else {
            continue;
        };
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| file_name.clone());
        let modified = entry
            .metadata()
            .and_then(|m| m.modified())
            .unwrap_or(SystemTime::UNIX_EPOCH);

        if let Ok(setting) = BackgroundSetting::new(
            kind,
            BackgroundSourceType::Local,
            path.to_string_lossy().to_string(),
            name,
        ) {
            imported.push((modified, setting));
        }
    }

    // Newest first, name as tie-breaker for a stable order
    imported.sort_by(|a, b| {
        b.0.cmp(&a.0)
            .then_with(|| a.1.resource_path().cmp(b.1.resource_path()))
    });
    Ok(imported.into_iter().map(|(_, s)| s).collect())
}

fn copy_into(
    import_dir: &Path,
    content: &dyn ContentResolver,
    locator: &str,
    background_type: BackgroundType,
) -> Result<PathBuf> {
    fs::create_dir_all(import_dir).map_err(|e| {
        BackgroundError::import(format!("cannot create {}: {}", import_dir.display(), e))
    })?;

    let file_name = target_file_name(content.display_name(locator), background_type);

    let mut reader = content
        .open(locator)
        .map_err(|e| BackgroundError::import(format!("cannot open {}: {}", locator, e)))?;

    // Staged next to the target so the final rename stays on one filesystem
    let mut staging = tempfile::Builder::new()
        .prefix(IMPORT_STAGING_PREFIX)
        .tempfile_in(import_dir)
        .map_err(|e| BackgroundError::import(format!("cannot create staging file: {}", e)))?;

    let copied = io::copy(&mut reader, staging.as_file_mut())
        .map_err(|e| BackgroundError::import(format!("copy of {} failed: {}", locator, e)))?;
    staging
        .as_file()
        .sync_all()
        .map_err(|e| BackgroundError::import(format!("cannot flush imported file: {}", e)))?;

    for attempt in 0..MAX_NAME_ATTEMPTS {
        let target = import_dir.join(numbered_name(&file_name, attempt));
        match staging.persist_noclobber(&target) {
            Ok(_) => {
                info!(source = locator, target = %target.display(), bytes = copied, "Background imported");
                return Ok(target);
            }
            Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => {
                staging = e.file;
            }
            Err(e) => {
                return Err(BackgroundError::import(format!(
                    "cannot move imported file to {}: {}",
                    target.display(),
                    e.error
                )));
            }
        }
    }

    warn!(name = %file_name, "No free file name left for import");
    Err(BackgroundError::import(format!(
        "no free file name for {}",
        file_name
    )))
}

/// Sanitized file name derived from the source display name. Extensions
/// that do not denote `background_type` are replaced by its default one.
fn target_file_name(display_name: Option<String>, background_type: BackgroundType) -> String {
    let base: String = display_name
        .as_deref()
        .map(|name| name.rsplit(['/', '\\']).next().unwrap_or(name))
        .unwrap_or("")
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '.' | '-' | '_' | ' ') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let base = base.trim();

    let (stem, ext) = match base.rsplit_once('.') {
        Some((stem, ext)) => (stem, Some(ext.trim())),
        None => (base, None),
    };
    let stem = stem.trim().trim_start_matches('.').trim();
    if stem.is_empty() {
        return format!(
            "background-{}.{}",
            Uuid::new_v4().simple(),
            background_type.default_extension()
        );
    }

    // The listing infers the kind from the extension, so it must agree
    let ext = ext
        .filter(|e| BackgroundType::from_extension(e) == Some(background_type))
        .unwrap_or(background_type.default_extension());
    format!("{}.{}", stem, ext)
}

fn numbered_name(file_name: &str, attempt: usize) -> String {
    if attempt == 0 {
        return file_name.to_string();
    }
    match file_name.rsplit_once('.') {
        Some((stem, ext)) => format!("{}-{}.{}", stem, attempt, ext),
        None => format!("{}-{}", file_name, attempt),
    }
}
