//! Single owner of the background picker state.
//!
//! Transitions run one at a time behind an async lock. Every state they
//! publish, intermediate `Loading` included, reaches subscribers in order.
//! The playback controller is brought in line with the selection before the
//! new state is published: a video selection binds the player to its direct
//! URL, anything else releases it.

use std::sync::Arc;

use crossbeam_channel::Receiver;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::errors::{BackgroundError, Result};
use crate::events::StateCell;
use crate::model::{
    BackgroundSetting, BackgroundSettingsState, BackgroundSourceType, BackgroundType,
    LifecycleEvent, MediaItemDescriptor, MediaStoreFetchState,
};
use crate::playback::PlaybackController;
use crate::repository::BackgroundRepository;
use crate::resolver;
use crate::scanner::MediaStoreScanner;

pub struct BackgroundStateMachine {
    repository: BackgroundRepository,
    scanner: MediaStoreScanner,
    playback: Arc<PlaybackController>,
    settings: StateCell<BackgroundSettingsState>,
    scan: StateCell<MediaStoreFetchState>,
    transition: Mutex<()>,
    scan_transition: Mutex<()>,
}

impl std::fmt::Debug for BackgroundStateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundStateMachine")
            .field("state", &self.settings.get())
            .field("scan_state", &self.scan.get())
            .finish_non_exhaustive()
    }
}

impl BackgroundStateMachine {
    pub fn new(
        repository: BackgroundRepository,
        scanner: MediaStoreScanner,
        playback: Arc<PlaybackController>,
    ) -> Self {
        Self {
            repository,
            scanner,
            playback,
            settings: StateCell::new(BackgroundSettingsState::Initial),
            scan: StateCell::new(MediaStoreFetchState::Idle),
            transition: Mutex::new(()),
            scan_transition: Mutex::new(()),
        }
    }

    pub fn state(&self) -> BackgroundSettingsState {
        self.settings.get()
    }

    pub fn scan_state(&self) -> MediaStoreFetchState {
        self.scan.get()
    }

    pub fn subscribe(&self) -> Receiver<BackgroundSettingsState> {
        self.settings.subscribe()
    }

    pub fn subscribe_scan(&self) -> Receiver<MediaStoreFetchState> {
        self.scan.subscribe()
    }

    pub fn playback(&self) -> &Arc<PlaybackController> {
        &self.playback
    }

    pub fn repository(&self) -> &BackgroundRepository {
        &self.repository
    }

    /// `Loading`, then `Loaded` with the persisted selection or `Error`.
    pub async fn load(&self) {
        let _guard = self.transition.lock().await;
        self.settings.set(BackgroundSettingsState::Loading);

        match self.read_loaded().await {
            Ok((available, current)) => self.publish_loaded(available, current),
            Err(e) => self.publish_error("load", e),
        }
    }

    /// Persists `setting` as the new selection.
    ///
    /// The published state is re-read from the repository, so it always
    /// reflects what was actually stored.
    pub async fn select(&self, setting: BackgroundSetting) {
        let _guard = self.transition.lock().await;
        self.select_locked(setting).await;
    }

    /// Imports a local file, then selects the imported copy.
    pub async fn select_local(&self, source_locator: &str, background_type: BackgroundType) {
        let _guard = self.transition.lock().await;

        let imported = match self.repository.import_local(source_locator, background_type).await {
            Ok(path) => path,
            Err(e) => return self.publish_error("import", e),
        };

        let name = imported
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let setting = BackgroundSetting::new(
            background_type,
            BackgroundSourceType::Local,
            imported.to_string_lossy().to_string(),
            name,
        );
        match setting {
            Ok(setting) => self.select_locked(setting).await,
            Err(e) => self.publish_error("import", e),
        }
    }

    /// Imports an item found by [`BackgroundStateMachine::scan`].
    pub async fn select_media_item(&self, item: &MediaItemDescriptor) {
        self.select_local(&item.locator, item.kind).await;
    }

    /// Queries the media index: `Loading`, then `Success`, `Empty` or `Error`.
    pub async fn scan(&self) {
        let _guard = self.scan_transition.lock().await;
        self.scan.set(MediaStoreFetchState::Loading);

        let next = match self.scanner.scan().await {
            Ok(items) if items.is_empty() => MediaStoreFetchState::Empty,
            Ok(items) => {
                debug!(count = items.len(), "Media scan succeeded");
                MediaStoreFetchState::Success { items }
            }
            Err(e) => {
                warn!(error = %e, "Media scan failed");
                MediaStoreFetchState::Error {
                    message: e.to_string(),
                }
            }
        };
        self.scan.set(next);
    }

    pub fn handle_lifecycle(&self, event: LifecycleEvent) {
        self.playback.handle_lifecycle(event);
    }

    async fn select_locked(&self, setting: BackgroundSetting) {
        info!(
            name = setting.name(),
            path = setting.resource_path(),
            kind = %setting.background_type(),
            "Selecting background"
        );

        if let Err(e) = self.repository.set_current(&setting).await {
            return self.publish_error("select", e);
        }

        match self.read_loaded().await {
            Ok((available, current)) => self.publish_loaded(available, current),
            Err(e) => self.publish_error("select", e),
        }
    }

    async fn read_loaded(&self) -> Result<(Vec<BackgroundSetting>, BackgroundSetting)> {
        let current = self.repository.get_current().await?;
        let available = self.repository.list_available().await?;
        Ok((available, current))
    }

    fn publish_loaded(&self, available: Vec<BackgroundSetting>, current: BackgroundSetting) {
        self.apply_playback(&current);
        debug!(
            available = available.len(),
            current = current.resource_path(),
            "Background state loaded"
        );
        self.settings
            .set(BackgroundSettingsState::Loaded { available, current });
    }

    fn apply_playback(&self, current: &BackgroundSetting) {
        if current.is_video() {
            self.playback.initialize(&resolver::resolve(current));
        } else {
            self.playback.release();
        }
    }

    fn publish_error(&self, operation: &str, error: BackgroundError) {
        warn!(operation, error = %error, "Background transition failed");
        self.settings.set(BackgroundSettingsState::Error {
            message: error.to_string(),
        });
    }
}
