//! # tvbackground - Dynamic home-screen backgrounds for TVBackdrop
//!
//! Selection, persistence and rendering support for the image or looping
//! video shown behind the TV home screen.
//!
//! ## Components
//!
//! - [`resolver`]: turns a background descriptor into a renderable locator,
//!   rewriting file-sharing links to their direct-view form
//! - [`repository`]: persisted selection, bundled catalog, local imports
//! - [`scanner`]: device media index queries
//! - [`playback`]: owner of the single video player
//! - [`state_machine`]: the observable picker state tying it all together
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tvbackground::{
//!     BackgroundRepository, BackgroundStateMachine, DirectoryMediaIndex, MediaStoreScanner,
//!     PlaybackController, PlayerFactory,
//! };
//!
//! async fn start(factory: Arc<dyn PlayerFactory>) -> tvbackground::Result<()> {
//!     let config = tvbconfig::get_config();
//!     let repository = BackgroundRepository::from_config(config.clone())?;
//!     let scanner = MediaStoreScanner::new(Arc::new(DirectoryMediaIndex::from_config(&config)));
//!     let playback = Arc::new(PlaybackController::new(factory));
//!
//!     let machine = BackgroundStateMachine::new(repository, scanner, playback);
//!     machine.load().await;
//!     println!("{:?}", machine.state());
//!     Ok(())
//! }
//! ```

pub mod errors;
pub mod events;
pub mod model;
pub mod playback;
pub mod repository;
pub mod resolver;
pub mod scanner;
pub mod state_machine;

pub use errors::{BackgroundError, Result};
pub use events::{EventBus, StateCell};
pub use model::{
    BackgroundSetting, BackgroundSettingsState, BackgroundSourceType, BackgroundType,
    LifecycleEvent, MediaItemDescriptor, MediaStoreFetchState,
};
pub use playback::{
    MediaSourceSpec, PlaybackController, PlaybackEvent, PlayerEvent, PlayerFactory, PlayerHandle,
    PlayerObserver, RepeatMode,
};
pub use repository::{
    BackgroundRepository, BundledCatalog, ConfigStore, ContentResolver, FileContentResolver,
    KeyValueStore, MemoryStore,
};
pub use resolver::LinkVariant;
pub use scanner::{DirectoryMediaIndex, IndexEntry, IndexMediaType, MediaIndex, MediaStoreScanner};
pub use state_machine::BackgroundStateMachine;
