use std::collections::HashMap;
use std::sync::Arc;

use image::DynamicImage;
use parking_lot::Mutex;
use tokio::sync::OnceCell;
use tracing::trace;

use crate::generator::ThumbnailGenerator;

type Slot = Arc<OnceCell<Option<Arc<DynamicImage>>>>;

/// In-memory thumbnails keyed by resource path.
///
/// Requests for distinct paths run concurrently; requests for the same
/// path share a single generation. Failures are cached too.
#[derive(Debug)]
pub struct ThumbnailCache {
    generator: ThumbnailGenerator,
    slots: Mutex<HashMap<String, Slot>>,
}

impl ThumbnailCache {
    pub fn new(generator: ThumbnailGenerator) -> Self {
        Self {
            generator,
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub async fn get(&self, resource_path: &str) -> Option<Arc<DynamicImage>> {
        let slot = self
            .slots
            .lock()
            .entry(resource_path.to_string())
            .or_default()
            .clone();

        slot.get_or_init(|| async {
            trace!(path = resource_path, "Thumbnail cache miss");
            self.generator.generate(resource_path).await.map(Arc::new)
        })
        .await
        .clone()
    }

    /// Forgets `resource_path`; the next `get` generates again.
    pub fn invalidate(&self, resource_path: &str) {
        self.slots.lock().remove(resource_path);
    }

    pub fn clear(&self) {
        self.slots.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
