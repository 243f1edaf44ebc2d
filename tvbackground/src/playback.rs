//! Ownership of the single video playback resource.
//!
//! The controller holds at most one live player. A paused player keeps its
//! last decoded frame on screen; a released one has nothing left and must
//! be rebuilt before anything shows again. Host backgrounding therefore
//! pauses, and only a non-video selection or teardown releases.
//!
//! ## Concurrency
//!
//! Every mutating call goes through one mutex. `initialize` and `release`
//! also take a request ticket before locking: an `initialize` that finds a
//! newer ticket once it holds the lock gives up without constructing, so
//! the last initiated request always wins and a superseded construction
//! never replaces a newer player.
//!
//! ## Failures
//!
//! Construction and preparation errors never leave `initialize`. They are
//! reported through the observer attached to each player, which marks the
//! player stale (its bound URL disappears) so that the next `initialize`
//! rebuilds it instead of reusing it.

use std::mem;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crossbeam_channel::Receiver;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::errors::Result;
use crate::events::EventBus;
use crate::model::LifecycleEvent;

/// Loop policy of the media source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepeatMode {
    Off,
    Infinite,
}

/// What a player is asked to render.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaSourceSpec {
    pub url: String,
    pub repeat: RepeatMode,
    pub play_when_ready: bool,
    /// Output volume in `0.0..=1.0`
    pub volume: f32,
}

impl MediaSourceSpec {
    /// Single looping source, silent, starting as soon as it is ready.
    pub fn background_loop(url: &str) -> Self {
        Self {
            url: url.to_string(),
            repeat: RepeatMode::Infinite,
            play_when_ready: true,
            volume: 0.0,
        }
    }
}

/// Notifications a player backend sends to its observer, from any thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerEvent {
    /// First frame available
    Ready,
    /// Terminal failure; the player cannot be reused
    Error(String),
}

pub type PlayerObserver = Arc<dyn Fn(PlayerEvent) + Send + Sync>;

/// Capability surface of a concrete player.
pub trait PlayerHandle: Send {
    /// Starts preparation without waiting for it to complete. Errors found
    /// later are reported through the observer.
    fn prepare(&mut self) -> Result<()>;

    fn set_play_when_ready(&mut self, play_when_ready: bool);

    /// `0.0` is silent.
    fn set_volume(&mut self, volume: f32);

    /// Stops and frees the resource. Called at most once per handle.
    fn release(&mut self);

    fn is_usable(&self) -> bool {
        true
    }
}

/// Builds players for a media source.
///
/// `create` is called with the controller lock held and must not wait for
/// the media to load.
pub trait PlayerFactory: Send + Sync {
    fn create(
        &self,
        source: &MediaSourceSpec,
        observer: PlayerObserver,
    ) -> Result<Box<dyn PlayerHandle>>;
}

/// Controller-level notifications, for UIs showing a loading affordance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackEvent {
    Constructed { url: String },
    Ready { url: String },
    Failed { url: String, message: String },
    Released { url: String },
}

struct LivePlayer {
    player: Box<dyn PlayerHandle>,
    url: String,
    stale: Arc<AtomicBool>,
    play_when_ready: bool,
}

impl LivePlayer {
    fn bound_url(&self) -> Option<&str> {
        if self.stale.load(Ordering::SeqCst) {
            None
        } else {
            Some(&self.url)
        }
    }

    fn is_reusable_for(&self, url: &str) -> bool {
        self.bound_url() == Some(url) && self.player.is_usable()
    }

    fn set_play_when_ready(&mut self, play_when_ready: bool) {
        self.player.set_play_when_ready(play_when_ready);
        self.play_when_ready = play_when_ready;
    }

    /// Consumes the live player: nothing can touch it afterwards.
    fn release(mut self) -> String {
        // Errors raised while tearing down are not failures of the session
        self.stale.store(true, Ordering::SeqCst);
        self.player.release();
        self.url
    }
}

enum PlayerSession {
    Live(LivePlayer),
    Released,
}

impl PlayerSession {
    fn take(&mut self) -> PlayerSession {
        mem::replace(self, PlayerSession::Released)
    }
}

/// Owner of the process-wide background player.
pub struct PlaybackController {
    factory: Arc<dyn PlayerFactory>,
    session: Mutex<PlayerSession>,
    latest_request: AtomicU64,
    events: EventBus<PlaybackEvent>,
}

impl std::fmt::Debug for PlaybackController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackController")
            .field("bound_url", &self.bound_url())
            .field("is_live", &self.is_live())
            .finish()
    }
}

impl PlaybackController {
    pub fn new(factory: Arc<dyn PlayerFactory>) -> Self {
        Self {
            factory,
            session: Mutex::new(PlayerSession::Released),
            latest_request: AtomicU64::new(0),
            events: EventBus::new(),
        }
    }

    /// Binds the player to `url`, reusing the live one when it already
    /// plays that URL and is still usable.
    pub fn initialize(&self, url: &str) {
        let ticket = self.next_ticket();
        let mut session = self.session.lock();

        if self.latest_request.load(Ordering::SeqCst) != ticket {
            debug!(url, "Playback request superseded before it started");
            return;
        }

        if let PlayerSession::Live(live) = &mut *session {
            if live.is_reusable_for(url) {
                debug!(url, "Reusing live player");
                live.set_play_when_ready(true);
                return;
            }
        }

        if let PlayerSession::Live(live) = session.take() {
            let old_url = live.release();
            debug!(old_url = %old_url, new_url = url, "Released player before rebinding");
            self.events.broadcast(PlaybackEvent::Released { url: old_url });
        }

        if let Some(live) = self.construct(url) {
            *session = PlayerSession::Live(live);
        }
    }

    /// Stops and frees the live player, if any.
    pub fn release(&self) {
        self.next_ticket();
        let mut session = self.session.lock();
        if let PlayerSession::Live(live) = session.take() {
            let url = live.release();
            info!(url = %url, "Background player released");
            self.events.broadcast(PlaybackEvent::Released { url });
        }
    }

    pub fn play(&self) {
        self.with_live("play", |live| live.set_play_when_ready(true));
    }

    /// Keeps the player and its last frame.
    pub fn pause(&self) {
        self.with_live("pause", |live| live.set_play_when_ready(false));
    }

    /// Background media must never be heard.
    pub fn mute(&self) {
        self.with_live("mute", |live| live.player.set_volume(0.0));
    }

    pub fn handle_lifecycle(&self, event: LifecycleEvent) {
        debug!(?event, "Lifecycle event");
        match event {
            LifecycleEvent::Resumed => self.play(),
            LifecycleEvent::Paused => self.pause(),
            LifecycleEvent::Destroyed => self.release(),
        }
    }

    /// URL of the live, non-stale player.
    pub fn bound_url(&self) -> Option<String> {
        match &*self.session.lock() {
            PlayerSession::Live(live) => live.bound_url().map(str::to_string),
            PlayerSession::Released => None,
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(&*self.session.lock(), PlayerSession::Live(_))
    }

    /// `Some(play_when_ready)` while a player is live.
    pub fn play_when_ready(&self) -> Option<bool> {
        match &*self.session.lock() {
            PlayerSession::Live(live) => Some(live.play_when_ready),
            PlayerSession::Released => None,
        }
    }

    pub fn subscribe(&self) -> Receiver<PlaybackEvent> {
        self.events.subscribe()
    }

    fn next_ticket(&self) -> u64 {
        self.latest_request.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn with_live(&self, operation: &str, f: impl FnOnce(&mut LivePlayer)) {
        match &mut *self.session.lock() {
            PlayerSession::Live(live) => f(live),
            PlayerSession::Released => debug!(operation, "No live player, ignoring"),
        }
    }

    fn construct(&self, url: &str) -> Option<LivePlayer> {
        let stale = Arc::new(AtomicBool::new(false));
        let observer = self.observer_for(url, stale.clone());
        let source = MediaSourceSpec::background_loop(url);

        let mut player = match self.factory.create(&source, observer.clone()) {
            Ok(player) => player,
            Err(e) => {
                observer(PlayerEvent::Error(e.to_string()));
                return None;
            }
        };

        player.set_volume(source.volume);
        player.set_play_when_ready(source.play_when_ready);
        if let Err(e) = player.prepare() {
            // Kept live but stale: the next initialize rebuilds it
            observer(PlayerEvent::Error(e.to_string()));
        }

        info!(url, "Background player constructed");
        self.events.broadcast(PlaybackEvent::Constructed {
            url: url.to_string(),
        });

        Some(LivePlayer {
            player,
            url: url.to_string(),
            stale,
            play_when_ready: source.play_when_ready,
        })
    }

    fn observer_for(&self, url: &str, stale: Arc<AtomicBool>) -> PlayerObserver {
        let events = self.events.clone();
        let url = url.to_string();
        Arc::new(move |event: PlayerEvent| match event {
            PlayerEvent::Ready => {
                if !stale.load(Ordering::SeqCst) {
                    debug!(url = %url, "Background player ready");
                    events.broadcast(PlaybackEvent::Ready { url: url.clone() });
                }
            }
            PlayerEvent::Error(message) => {
                if !stale.swap(true, Ordering::SeqCst) {
                    warn!(url = %url, error = %message, "Background playback failed");
                    events.broadcast(PlaybackEvent::Failed {
                        url: url.clone(),
                        message,
                    });
                }
            }
        })
    }
}

impl Drop for PlaybackController {
    fn drop(&mut self) {
        if let PlayerSession::Live(live) = self.session.get_mut().take() {
            let url = live.release();
            debug!(url = %url, "Background player released on teardown");
        }
    }
}
