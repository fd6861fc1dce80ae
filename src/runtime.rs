//! Async driver around [`Browser`].
//!
//! Frame ticks and host events are fed to the controller; network effects are
//! spawned as tasks whose results come back as messages. Everything else is
//! handed to the [`Host`] for presentation.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info};

use crate::browser::{Browser, Effect, Message};
use crate::feed::source::{FavoritesApi, GallerySource};
use crate::view::geometry::FrameSnapshot;

/// The presentation side: reports geometry and applies effects
pub trait Host {
    /// Called once by [`BrowserRuntime::new`] so the host can feed events back
    fn attach(&mut self, _handle: RuntimeHandle) {}

    fn snapshot(&mut self) -> FrameSnapshot;

    fn present(&mut self, effect: Effect);
}

/// Cloneable sender into a running [`BrowserRuntime`]
#[derive(Debug, Clone)]
pub struct RuntimeHandle {
    tx: mpsc::UnboundedSender<Message>,
}

impl RuntimeHandle {
    /// Returns false once the runtime is gone
    pub fn send(&self, message: Message) -> bool {
        self.tx.send(message).is_ok()
    }
}

pub struct BrowserRuntime<H> {
    browser: Browser,
    gallery: Arc<dyn GallerySource>,
    favorites: Arc<dyn FavoritesApi>,
    host: H,
    tx: mpsc::UnboundedSender<Message>,
    rx: mpsc::UnboundedReceiver<Message>,
}

impl<H: Host> BrowserRuntime<H> {
    pub fn new(
        browser: Browser,
        gallery: Arc<dyn GallerySource>,
        favorites: Arc<dyn FavoritesApi>,
        mut host: H,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        host.attach(RuntimeHandle { tx: tx.clone() });

        Self { browser, gallery, favorites, host, tx, rx }
    }

    pub fn handle(&self) -> RuntimeHandle {
        RuntimeHandle { tx: self.tx.clone() }
    }

    pub fn browser(&self) -> &Browser {
        &self.browser
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// Run until the controller emits [`Effect::Stop`]
    pub async fn run(mut self) -> Self {
        let mut ticker = time::interval(self.browser.frame_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            let message = tokio::select! {
                _ = ticker.tick() => Message::Frame(self.host.snapshot()),
                Some(message) = self.rx.recv() => message,
            };

            if self.dispatch(message) {
                break;
            }
        }

        info!(items = self.browser.items().len(), "browser runtime stopped");
        self
    }

    /// Apply one message; true when the runtime should stop
    fn dispatch(&mut self, message: Message) -> bool {
        let now = time::Instant::now().into_std();
        let mut stop = false;

        for effect in self.browser.update(now, message) {
            match effect {
                Effect::FetchPage { epoch, request } => {
                    debug!(epoch, cursor = ?request.cursor, "spawning page fetch");
                    let gallery = Arc::clone(&self.gallery);
                    let tx = self.tx.clone();
                    tokio::spawn(async move {
                        let result = gallery.list(&request).await;
                        let _ = tx.send(Message::PageFetched { epoch, result });
                    });
                }
                Effect::LoadFavorites { epoch } => {
                    let favorites = Arc::clone(&self.favorites);
                    let tx = self.tx.clone();
                    tokio::spawn(async move {
                        let result = favorites.all_favorites().await;
                        let _ = tx.send(Message::FavoritesLoaded { epoch, result });
                    });
                }
                Effect::ToggleFavorite(item) => {
                    let favorites = Arc::clone(&self.favorites);
                    let tx = self.tx.clone();
                    tokio::spawn(async move {
                        let result = favorites.toggle(&item).await;
                        let _ = tx.send(Message::FavoriteToggled { item, result });
                    });
                }
                Effect::Stop => {
                    stop = true;
                    self.host.present(Effect::Stop);
                }
                other => self.host.present(other),
            }
        }

        stop
    }
}
