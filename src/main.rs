use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use discovery_browser::browser::{Browser, Effect, Message};
use discovery_browser::config::BrowserConfig;
use discovery_browser::error::BrowserError;
use discovery_browser::feed::hydration::{HydrationStep, MediaEvent};
use discovery_browser::feed::http::HttpGallery;
use discovery_browser::runtime::{BrowserRuntime, Host, RuntimeHandle};
use discovery_browser::state::data::{ItemKey, MediaKind};
use discovery_browser::state::durable::{DurableStore, SqliteStore};
use discovery_browser::state::filters::{self, NsfwLevel, Period, SortOrder};
use discovery_browser::state::persistence::{PersistedState, SharedProperties, StateScope};
use discovery_browser::view::geometry::{self, FrameSnapshot, Rect, ScrollMetrics};

const CARD_HEIGHT: u32 = 320;
const VIEWPORT_WIDTH: f64 = 1280.0;
const VIEWPORT_HEIGHT: u32 = 800;

/// Headless gallery browser: pages through the feed and prints what it loads
#[derive(Parser, Debug)]
#[command(name = "discovery-browser", version)]
struct Cli {
    /// Config file (defaults to $DISCOVERY_BROWSER_CONFIG, then the user config dir)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Identifies this surface in the state store
    #[arg(long, default_value = "default")]
    instance: String,

    #[arg(long)]
    favorites_only: bool,

    #[arg(long)]
    videos_only: bool,

    #[arg(long)]
    hide_no_prompt: bool,

    #[arg(long)]
    username: Option<String>,

    /// Content rating ceiling: None, Soft, Mature or X
    #[arg(long)]
    nsfw: Option<String>,

    /// Newest, "Most Reactions" or "Most Comments"
    #[arg(long)]
    sort: Option<String>,

    /// AllTime, Year, Month, Week or Day
    #[arg(long)]
    period: Option<String>,

    /// Comma-separated base model names
    #[arg(long, value_delimiter = ',')]
    base_models: Vec<String>,

    /// Tag id
    #[arg(long)]
    tag: Option<String>,

    /// Page size: 24, 50, 100 or 150; other values are clamped to the supported range
    #[arg(long)]
    batch: Option<String>,

    /// Pixels to scroll per frame; 0 leaves the viewport where it is
    #[arg(long, default_value_t = 0)]
    scroll_step: u32,

    /// Stop after this many seconds
    #[arg(long, default_value_t = 10)]
    seconds: u64,
}

/// A single-column layout with fixed card heights, printed to stdout
struct ConsoleHost {
    handle: Option<RuntimeHandle>,
    page_url_base: String,
    cards: Vec<ItemKey>,
    /// Watched videos and their margin
    observed: HashMap<ItemKey, u32>,
    scroll_top: u32,
    scroll_step: u32,
}

impl ConsoleHost {
    fn new(page_url_base: String, scroll_step: u32) -> Self {
        Self {
            handle: None,
            page_url_base,
            cards: Vec::new(),
            observed: HashMap::new(),
            scroll_top: 0,
            scroll_step,
        }
    }

    fn send(&self, message: Message) {
        if let Some(handle) = &self.handle {
            handle.send(message);
        }
    }

    fn metrics(&self) -> ScrollMetrics {
        let scroll_height = self.cards.len() as u32 * CARD_HEIGHT;
        ScrollMetrics::new(self.scroll_top, scroll_height, VIEWPORT_HEIGHT)
    }

    fn max_scroll_top(&self) -> u32 {
        let metrics = self.metrics();
        metrics.scroll_height.saturating_sub(metrics.client_height)
    }

    fn viewport(&self) -> Rect {
        Rect::new(0.0, self.scroll_top as f64, VIEWPORT_WIDTH, VIEWPORT_HEIGHT as f64)
    }

    fn card_rect(index: usize) -> Rect {
        Rect::new(0.0, (index as u32 * CARD_HEIGHT) as f64, VIEWPORT_WIDTH, CARD_HEIGHT as f64)
    }

    fn report_near_visible(&mut self) {
        let viewport = self.viewport();
        let near: Vec<ItemKey> = self
            .cards
            .iter()
            .enumerate()
            .filter_map(|(index, key)| {
                let margin = *self.observed.get(key)?;
                geometry::near_visible(&viewport, &Self::card_rect(index), margin as f64)
                    .then(|| key.clone())
            })
            .collect();

        for key in near {
            self.observed.remove(&key);
            self.send(Message::MediaNearVisible(key));
        }
    }
}

impl Host for ConsoleHost {
    fn attach(&mut self, handle: RuntimeHandle) {
        self.handle = Some(handle);
    }

    fn snapshot(&mut self) -> FrameSnapshot {
        if self.scroll_step > 0 {
            let target = (self.scroll_top + self.scroll_step).min(self.max_scroll_top());
            if target != self.scroll_top {
                self.scroll_top = target;
                self.send(Message::Scrolled(self.metrics()));
            }
        }
        self.report_near_visible();

        let surface = Rect::new(0.0, 0.0, VIEWPORT_WIDTH, VIEWPORT_HEIGHT as f64);
        FrameSnapshot { surface, visible_region: Some(surface), scroll: self.metrics() }
    }

    fn present(&mut self, effect: Effect) {
        match effect {
            Effect::ClearItems => {
                self.cards.clear();
                self.observed.clear();
            }
            Effect::AppendItems(cards) => {
                for card in cards {
                    let icon = match card.item.kind {
                        MediaKind::Video => "🎞️",
                        MediaKind::Image => "🖼️",
                    };
                    let star = if card.favorite { " ★" } else { "" };
                    println!(
                        "{icon} {}{star}  [{}]  {}",
                        card.item.key,
                        card.item.rating.label(),
                        card.item.page_url(&self.page_url_base)
                    );
                    self.cards.push(card.item.key);
                }
            }
            Effect::Observe { key, margin_px } => {
                self.observed.insert(key, margin_px);
            }
            Effect::ReleaseObservers => self.observed.clear(),
            Effect::Hydrate { key, step } => match step {
                // No decoder here, so report the media as ready straight away
                HydrationStep::Load { src, preload } => {
                    debug!(%key, %src, ?preload, "hydrating");
                    self.send(Message::Media { key: key.clone(), event: MediaEvent::LoadedMetadata { duration: None } });
                    self.send(Message::Media { key, event: MediaEvent::LoadedData });
                }
                HydrationStep::SeekPreview { at_secs } => {
                    debug!(%key, at_secs, "seeking preview frame");
                    self.send(Message::Media { key, event: MediaEvent::Seeked });
                }
                HydrationStep::Freeze => debug!(%key, "preview frozen"),
            },
            Effect::SetScrollTop(top) => self.scroll_top = top.min(self.max_scroll_top()),
            Effect::SetStatus(status) if !status.is_empty() => info!(%status),
            Effect::SetFavoriteMark { key, favorite } => {
                println!("{} {key}", if favorite { "★" } else { "☆" });
            }
            other => debug!(effect = ?other, "unhandled effect"),
        }
    }
}

fn parse_choice<T>(raw: Option<&str>, lookup: fn(&str) -> Option<T>, what: &str) -> Result<Option<T>, BrowserError> {
    match raw {
        None => Ok(None),
        Some(name) => lookup(name)
            .map(Some)
            .ok_or_else(|| BrowserError::Config(format!("unknown {what} '{name}'"))),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), BrowserError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = BrowserConfig::load(cli.config.as_deref())?;

    let store: Arc<dyn DurableStore> = Arc::new(match &config.database_path {
        Some(path) => SqliteStore::open(path)?,
        None => SqliteStore::open_default()?,
    });
    let scope = StateScope::new(config.namespace.clone(), cli.instance.clone());
    let persisted = PersistedState::new(scope, SharedProperties::default(), store);

    let gallery = Arc::new(HttpGallery::new(config.endpoint.clone())?);
    let host = ConsoleHost::new(config.page_url_base.clone(), cli.scroll_step);
    let browser = Browser::new(config, persisted);

    let mut wanted = browser.filters().clone();
    if let Some(rating) = parse_choice(cli.nsfw.as_deref(), NsfwLevel::from_name, "rating")? {
        wanted.rating = rating;
    }
    if let Some(sort) = parse_choice(cli.sort.as_deref(), SortOrder::from_name, "sort order")? {
        wanted.sort = sort;
    }
    if let Some(period) = parse_choice(cli.period.as_deref(), Period::from_name, "period")? {
        wanted.period = period;
    }
    if let Some(username) = cli.username {
        wanted.username = username;
    }
    if !cli.base_models.is_empty() {
        wanted.base_models = filters::normalize_base_models(&serde_json::json!(cli.base_models));
    }
    if let Some(tag) = cli.tag {
        if filters::find_tag(&tag).is_none() {
            warn!(%tag, "tag id not in the known list, sending it anyway");
        }
        wanted.tag = Some(tag);
    }
    if let Some(batch) = cli.batch.as_deref() {
        wanted.batch_size = filters::parse_batch_size(batch);
        if !filters::BATCH_CHOICES.contains(&wanted.batch_size) {
            warn!(batch_size = wanted.batch_size, choices = ?filters::BATCH_CHOICES, "batch size is not one of the offered sizes");
        }
    }
    wanted.videos_only = cli.videos_only;
    wanted.hide_no_prompt = cli.hide_no_prompt;

    // Configured before attach, so the stored scroll offset is restored rather than reset
    let browser = browser.with_filters(wanted).with_favorites_only(cli.favorites_only);
    let runtime = BrowserRuntime::new(browser, gallery.clone(), gallery, host);
    let handle = runtime.handle();

    handle.send(Message::Attach);

    let seconds = cli.seconds;
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(seconds)).await;
        handle.send(Message::Teardown);
    });

    let runtime = runtime.run().await;
    let browser = runtime.browser();
    println!(
        "📊 {} items loaded, {}",
        browser.items().len(),
        if browser.has_more() { "more available" } else { "end reached" }
    );

    Ok(())
}
