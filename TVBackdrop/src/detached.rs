use tracing::debug;
use tvbackground::{
    MediaSourceSpec, PlayerEvent, PlayerFactory, PlayerHandle, PlayerObserver, Result,
};

/// Player for one-shot commands: records the binding, renders nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct DetachedFactory;

struct DetachedPlayer {
    url: String,
    observer: PlayerObserver,
}

impl PlayerFactory for DetachedFactory {
    fn create(
        &self,
        source: &MediaSourceSpec,
        observer: PlayerObserver,
    ) -> Result<Box<dyn PlayerHandle>> {
        Ok(Box::new(DetachedPlayer {
            url: source.url.clone(),
            observer,
        }))
    }
}

impl PlayerHandle for DetachedPlayer {
    fn prepare(&mut self) -> Result<()> {
        debug!(url = %self.url, "Detached player bound");
        (self.observer)(PlayerEvent::Ready);
        Ok(())
    }

    fn set_play_when_ready(&mut self, _play_when_ready: bool) {}

    fn set_volume(&mut self, _volume: f32) {}

    fn release(&mut self) {
        debug!(url = %self.url, "Detached player released");
    }
}
