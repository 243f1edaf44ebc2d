#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use crossbeam_channel::{Receiver, Sender, bounded};
use parking_lot::Mutex;
use tvbackground::{
    BackgroundError, BackgroundRepository, BackgroundSetting, BackgroundSourceType,
    BackgroundType, BundledCatalog, FileContentResolver, IndexEntry, IndexMediaType,
    KeyValueStore, MediaIndex, MediaSourceSpec, MemoryStore, PlayerEvent, PlayerFactory,
    PlayerHandle, PlayerObserver, Result,
};

pub const SEED_URL: &str = "asset://backgrounds/ocean_waves.mp4";

pub fn setting(
    background_type: BackgroundType,
    source_type: BackgroundSourceType,
    path: &str,
    name: &str,
) -> BackgroundSetting {
    BackgroundSetting::new(background_type, source_type, path, name).unwrap()
}

/// Catalogue réduit : une image et une vidéo embarquées
pub fn test_catalog() -> BundledCatalog {
    BundledCatalog::new(
        vec![setting(
            BackgroundType::Image,
            BackgroundSourceType::Local,
            "asset://backgrounds/aurora.jpg",
            "Aurora",
        )],
        vec![setting(
            BackgroundType::Video,
            BackgroundSourceType::Local,
            SEED_URL,
            "Ocean Waves",
        )],
    )
}

pub fn memory_repository(import_dir: &Path) -> (Arc<MemoryStore>, BackgroundRepository) {
    let store = Arc::new(MemoryStore::new());
    let repository = BackgroundRepository::new(
        store.clone(),
        Arc::new(FileContentResolver),
        test_catalog(),
        import_dir,
    );
    (store, repository)
}

// ============================================================================
// Player
// ============================================================================

/// What the controller did to one player.
pub struct FakePlayer {
    pub source: MediaSourceSpec,
    observer: PlayerObserver,
    pub prepared: AtomicBool,
    pub released: AtomicBool,
    pub play_when_ready: AtomicBool,
    pub usable: AtomicBool,
    volume: Mutex<Option<f32>>,
}

impl FakePlayer {
    pub fn url(&self) -> &str {
        &self.source.url
    }

    pub fn volume(&self) -> Option<f32> {
        *self.volume.lock()
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    pub fn is_playing(&self) -> bool {
        self.play_when_ready.load(Ordering::SeqCst)
    }

    /// Simulates a backend notification.
    pub fn emit(&self, event: PlayerEvent) {
        (self.observer)(event)
    }
}

struct FakeHandle(Arc<FakePlayer>);

impl PlayerHandle for FakeHandle {
    fn prepare(&mut self) -> Result<()> {
        self.0.prepared.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn set_play_when_ready(&mut self, play_when_ready: bool) {
        assert!(!self.0.is_released(), "operation on a released player");
        self.0.play_when_ready.store(play_when_ready, Ordering::SeqCst);
    }

    fn set_volume(&mut self, volume: f32) {
        assert!(!self.0.is_released(), "operation on a released player");
        *self.0.volume.lock() = Some(volume);
    }

    fn release(&mut self) {
        let already = self.0.released.swap(true, Ordering::SeqCst);
        assert!(!already, "player released twice");
    }

    fn is_usable(&self) -> bool {
        self.0.usable.load(Ordering::SeqCst)
    }
}

struct FailingPrepareHandle(FakeHandle);

impl PlayerHandle for FailingPrepareHandle {
    fn prepare(&mut self) -> Result<()> {
        Err(BackgroundError::playback("no decoder for this stream"))
    }

    fn set_play_when_ready(&mut self, play_when_ready: bool) {
        self.0.set_play_when_ready(play_when_ready)
    }

    fn set_volume(&mut self, volume: f32) {
        self.0.set_volume(volume)
    }

    fn release(&mut self) {
        self.0.release()
    }
}

/// Porte bloquant `create` pour une URL donnée, tant que le test ne l'ouvre pas
struct Gate {
    url: String,
    entered: Sender<()>,
    open: Receiver<()>,
}

/// Records every player it builds.
#[derive(Default)]
pub struct FakePlayerFactory {
    players: Mutex<Vec<Arc<FakePlayer>>>,
    pub fail_create: AtomicBool,
    pub fail_prepare: AtomicBool,
    gate: Mutex<Option<Gate>>,
}

impl FakePlayerFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn created(&self) -> usize {
        self.players.lock().len()
    }

    pub fn players(&self) -> Vec<Arc<FakePlayer>> {
        self.players.lock().clone()
    }

    pub fn created_urls(&self) -> Vec<String> {
        self.players
            .lock()
            .iter()
            .map(|p| p.url().to_string())
            .collect()
    }

    /// Players built and not released yet.
    pub fn live(&self) -> Vec<Arc<FakePlayer>> {
        self.players
            .lock()
            .iter()
            .filter(|p| !p.is_released())
            .cloned()
            .collect()
    }

    pub fn last(&self) -> Arc<FakePlayer> {
        self.players.lock().last().cloned().expect("no player created")
    }

    /// Makes `create` for `url` block until the returned sender fires.
    /// The first receiver fires once `create` has been entered.
    pub fn hold(&self, url: &str) -> (Receiver<()>, Sender<()>) {
        let (entered_tx, entered_rx) = bounded(1);
        let (open_tx, open_rx) = bounded(1);
        *self.gate.lock() = Some(Gate {
            url: url.to_string(),
            entered: entered_tx,
            open: open_rx,
        });
        (entered_rx, open_tx)
    }
}

impl PlayerFactory for FakePlayerFactory {
    fn create(
        &self,
        source: &MediaSourceSpec,
        observer: PlayerObserver,
    ) -> Result<Box<dyn PlayerHandle>> {
        let gate = {
            let mut gate = self.gate.lock();
            if gate.as_ref().is_some_and(|g| g.url == source.url) {
                gate.take()
            } else {
                None
            }
        };
        if let Some(gate) = gate {
            gate.entered.send(()).unwrap();
            gate.open.recv().unwrap();
        }

        if self.fail_create.load(Ordering::SeqCst) {
            return Err(BackgroundError::playback("cannot create player"));
        }

        let player = Arc::new(FakePlayer {
            source: source.clone(),
            observer,
            prepared: AtomicBool::new(false),
            released: AtomicBool::new(false),
            play_when_ready: AtomicBool::new(false),
            usable: AtomicBool::new(true),
            volume: Mutex::new(None),
        });
        self.players.lock().push(player.clone());

        let handle = FakeHandle(player);
        if self.fail_prepare.load(Ordering::SeqCst) {
            Ok(Box::new(FailingPrepareHandle(handle)))
        } else {
            Ok(Box::new(handle))
        }
    }
}

// ============================================================================
// Media index
// ============================================================================

pub fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).unwrap()
}

pub fn index_entry(id: &str, media_type: IndexMediaType, added_secs: i64) -> IndexEntry {
    IndexEntry {
        id: id.to_string(),
        media_type,
        locator: format!("content://media/{id}"),
        path: format!("/storage/{id}"),
        added_at: at(added_secs),
    }
}

#[derive(Default)]
pub struct FakeMediaIndex {
    entries: Vec<IndexEntry>,
    fail: bool,
    queries: Mutex<Vec<Vec<IndexMediaType>>>,
}

impl FakeMediaIndex {
    pub fn new(entries: Vec<IndexEntry>) -> Arc<Self> {
        Arc::new(Self {
            entries,
            ..Default::default()
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            ..Default::default()
        })
    }

    pub fn queries(&self) -> Vec<Vec<IndexMediaType>> {
        self.queries.lock().clone()
    }
}

#[async_trait]
impl MediaIndex for FakeMediaIndex {
    async fn query(&self, kinds: &[IndexMediaType]) -> Result<Vec<IndexEntry>> {
        self.queries.lock().push(kinds.to_vec());
        if self.fail {
            return Err(BackgroundError::scan("media index unavailable"));
        }
        Ok(self.entries.clone())
    }
}

// ============================================================================
// Stores
// ============================================================================

/// Store whose reads work and whose writes always fail.
#[derive(Default)]
pub struct ReadOnlyStore {
    inner: MemoryStore,
}

impl KeyValueStore for ReadOnlyStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        self.inner.get(key)
    }

    fn set_all(&self, _entries: &[(&str, &str)]) -> Result<()> {
        Err(BackgroundError::persistence("disk full"))
    }
}
