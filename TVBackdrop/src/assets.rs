//! Bundled backgrounds are named `asset://<relative path>` and shipped as
//! files under the configured assets directory.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use tracing::debug;
use tvbackground::{MediaSourceSpec, PlayerFactory, PlayerHandle, PlayerObserver, Result};

const ASSET_SCHEME: &str = "asset://";

/// File path behind an asset locator. Other locators, and asset paths
/// trying to leave the assets directory, are returned unchanged.
pub fn locate(assets_dir: &Path, locator: &str) -> String {
    let Some(relative) = locator.strip_prefix(ASSET_SCHEME) else {
        return locator.to_string();
    };
    let relative = Path::new(relative.trim_start_matches('/'));
    if relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_)))
    {
        return locator.to_string();
    }
    assets_dir.join(relative).to_string_lossy().into_owned()
}

/// Wraps a factory so players receive file paths instead of asset locators.
pub struct AssetFactory {
    inner: Arc<dyn PlayerFactory>,
    assets_dir: PathBuf,
}

impl AssetFactory {
    pub fn new(inner: Arc<dyn PlayerFactory>, assets_dir: impl Into<PathBuf>) -> Self {
        Self {
            inner,
            assets_dir: assets_dir.into(),
        }
    }
}

impl PlayerFactory for AssetFactory {
    fn create(
        &self,
        source: &MediaSourceSpec,
        observer: PlayerObserver,
    ) -> Result<Box<dyn PlayerHandle>> {
        let url = locate(&self.assets_dir, &source.url);
        if url == source.url {
            return self.inner.create(source, observer);
        }
        debug!(asset = %source.url, path = %url, "Asset located");
        let mut source = source.clone();
        source.url = url;
        self.inner.create(&source, observer)
    }
}
