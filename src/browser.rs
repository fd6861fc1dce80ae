//! The browser controller.
//!
//! One `Browser` owns all mutable state for a surface. The host and the
//! runtime feed it [`Message`]s; it answers with [`Effect`]s describing
//! network requests to start and presentation changes to apply. Nothing in
//! here performs I/O or reads the clock; `now` is passed in with each message.

use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::BrowserConfig;
use crate::error::BrowserError;
use crate::feed::autofill::{Autofill, AutofillDecision, AutofillGate};
use crate::feed::favorites::FavoritesCache;
use crate::feed::hydration::{HydrationStep, MediaEvent, MediaHydrator};
use crate::feed::pagination::{CursorState, PaginationController, PaginationMode};
use crate::feed::render_list::RenderList;
use crate::feed::source::{ListRequest, ToggleOutcome};
use crate::selection::{coerce_slot_value, SelectionPayload};
use crate::state::data::{Item, ItemKey, Page};
use crate::state::filters::Filters;
use crate::state::persistence::PersistedState;
use crate::view::geometry::{FrameSnapshot, ScrollMetrics};
use crate::view::visibility::{VisibilityChange, VisibilityMonitor};

#[cfg(test)]
mod tests;

pub const STATUS_LOADING: &str = "Loading…";
pub const STATUS_LOADING_FAVORITES: &str = "Loading favorites…";

/// Input to the controller
#[derive(Debug)]
pub enum Message {
    /// The surface was created or re-created
    Attach,
    /// Per-frame geometry report
    Frame(FrameSnapshot),
    /// The scroll container moved
    Scrolled(ScrollMetrics),
    /// Wheel or pointer activity inside the scroll container
    UserInput,
    Resized(ScrollMetrics),
    SetRenderEnabled(bool),
    ApplyFilters(Filters),
    SetFavoritesOnly(bool),
    /// Reload from the top with the current filters
    Refresh,
    LoadMore,
    PageFetched { epoch: u64, result: Result<Page, BrowserError> },
    FavoritesLoaded { epoch: u64, result: Result<Vec<Item>, BrowserError> },
    ToggleFavorite(ItemKey),
    FavoriteToggled { item: Item, result: Result<ToggleOutcome, BrowserError> },
    /// A watched video came within the hydration margin
    MediaNearVisible(ItemKey),
    Media { key: ItemKey, event: MediaEvent },
    Select { key: ItemKey, image_output_connected: bool },
    /// The host changed the selection slot directly
    SelectionEdited(Value),
    Teardown,
}

/// A rendered card: the item plus its favorite mark
#[derive(Debug, Clone, PartialEq)]
pub struct Card {
    pub item: Item,
    pub favorite: bool,
}

/// Output of the controller
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    FetchPage { epoch: u64, request: ListRequest },
    LoadFavorites { epoch: u64 },
    ToggleFavorite(Item),
    /// Drop every rendered card
    ClearItems,
    AppendItems(Vec<Card>),
    /// Report when this item comes within `margin_px` of the viewport
    Observe { key: ItemKey, margin_px: u32 },
    Hydrate { key: ItemKey, step: HydrationStep },
    /// Stop all outstanding observations
    ReleaseObservers,
    PauseMedia,
    SetScrollTop(u32),
    SetStatus(String),
    SetFavoriteMark { key: ItemKey, favorite: bool },
    SetRenderIndicator(bool),
    MarkSelected(ItemKey),
    /// New contents for the selection slot
    WriteSelection(String),
    /// The surface is gone; the driver should stop
    Stop,
}

#[derive(Debug, Clone, Copy)]
struct Restore {
    offset: u32,
    settle_at: Instant,
}

#[derive(Debug)]
pub struct Browser {
    config: BrowserConfig,
    filters: Filters,
    favorites_only: bool,
    pagination: PaginationController,
    favorites: FavoritesCache,
    items: RenderList,
    hydrator: MediaHydrator,
    autofill: Autofill,
    visibility: VisibilityMonitor,
    persisted: PersistedState,
    render_enabled: bool,
    fetch_in_flight: bool,
    /// Bumped on every reload; responses carry the epoch they were requested in
    epoch: u64,
    deferred_reload: bool,
    user_touched: bool,
    last_scroll_top: u32,
    restoring: Option<Restore>,
    metrics: ScrollMetrics,
    selected: Option<ItemKey>,
    status: String,
    attached: bool,
    torn_down: bool,
}

impl Browser {
    pub fn new(config: BrowserConfig, persisted: PersistedState) -> Self {
        let filters = Filters {
            batch_size: config.default_batch_size,
            base_models: persisted.base_models(),
            ..Filters::default()
        };

        Self {
            pagination: PaginationController::new(PaginationMode::Remote, config.timing.videos_time_budget_ms),
            hydrator: MediaHydrator::new(config.timing.hydration_fallback(), config.timing.preview_kick()),
            autofill: Autofill::new(config.autofill_budget),
            last_scroll_top: persisted.scroll_offset(),
            selected: None,
            filters,
            favorites_only: false,
            favorites: FavoritesCache::new(),
            items: RenderList::new(),
            visibility: VisibilityMonitor::new(),
            persisted,
            render_enabled: false,
            fetch_in_flight: false,
            epoch: 0,
            deferred_reload: false,
            user_touched: false,
            restoring: None,
            metrics: ScrollMetrics::default(),
            status: String::new(),
            attached: false,
            torn_down: false,
            config,
        }
    }

    /// Start from these filters; the first load happens on attach
    pub fn with_filters(mut self, filters: Filters) -> Self {
        self.persisted.set_base_models(filters.base_models.clone());
        self.filters = filters;
        self
    }

    /// Start in favorites-only mode; the first load happens on attach
    pub fn with_favorites_only(mut self, on: bool) -> Self {
        self.favorites_only = on;
        self
    }

    /// Handle one message and return the effects it produced
    pub fn update(&mut self, now: Instant, message: Message) -> Vec<Effect> {
        let mut effects = Vec::new();
        if self.torn_down {
            return effects;
        }

        match message {
            Message::Attach => self.attach(now, &mut effects),
            Message::Frame(snapshot) => self.frame(now, snapshot, &mut effects),
            Message::Scrolled(metrics) => self.scrolled(metrics, &mut effects),
            Message::UserInput => {
                if self.restoring.is_none() {
                    self.user_touched = true;
                }
            }
            Message::Resized(metrics) => {
                self.metrics = metrics;
                self.autofill.arm();
                self.autofill.schedule();
            }
            Message::SetRenderEnabled(on) => {
                if on != self.render_enabled {
                    self.apply_render_state(now, on, &mut effects);
                }
            }
            Message::ApplyFilters(filters) => {
                self.persisted.set_base_models(filters.base_models.clone());
                self.filters = filters;
                self.reload(now, true, &mut effects);
            }
            Message::SetFavoritesOnly(on) => {
                self.favorites_only = on;
                self.reload(now, true, &mut effects);
            }
            Message::Refresh => self.reload(now, true, &mut effects),
            Message::LoadMore => self.load_more(&mut effects),
            Message::PageFetched { epoch, result } => self.page_fetched(epoch, result, &mut effects),
            Message::FavoritesLoaded { epoch, result } => self.favorites_loaded(epoch, result, &mut effects),
            Message::ToggleFavorite(key) => {
                if let Some(item) = self.items.get(&key) {
                    effects.push(Effect::ToggleFavorite(item.clone()));
                }
            }
            Message::FavoriteToggled { item, result } => self.favorite_toggled(now, item, result, &mut effects),
            Message::MediaNearVisible(key) => {
                if self.render_enabled && self.visibility.is_visible() {
                    if let Some(step) = self.hydrator.near_visible(&key, now) {
                        effects.push(Effect::Hydrate { key, step });
                    }
                }
            }
            Message::Media { key, event } => {
                if let Some(step) = self.hydrator.on_event(&key, event) {
                    effects.push(Effect::Hydrate { key, step });
                }
            }
            Message::Select { key, image_output_connected } => self.select(key, image_output_connected, &mut effects),
            Message::SelectionEdited(value) => {
                let slot = coerce_slot_value(&value);
                self.persisted.set_selection(slot.clone());
                effects.push(Effect::WriteSelection(slot));
            }
            Message::Teardown => self.teardown(&mut effects),
        }

        effects
    }

    fn attach(&mut self, now: Instant, effects: &mut Vec<Effect>) {
        if self.attached {
            return;
        }
        self.attached = true;

        let on = self.persisted.render_enabled();
        info!(
            namespace = %self.persisted.scope().namespace,
            instance = %self.persisted.scope().instance,
            render_enabled = on,
            "surface attached"
        );
        self.set_status(String::new(), effects);
        self.apply_render_state(now, on, effects);
    }

    fn apply_render_state(&mut self, now: Instant, on: bool, effects: &mut Vec<Effect>) {
        self.render_enabled = on;
        self.persisted.set_render_enabled(on);
        effects.push(Effect::SetRenderIndicator(on));

        if !on {
            self.persisted.save_scroll_offset_now(self.last_scroll_top);
            self.hydrator.release_all();
            self.autofill.disarm();
            effects.push(Effect::ReleaseObservers);
            effects.push(Effect::PauseMedia);
            self.set_status(String::new(), effects);
            return;
        }

        if self.items.is_empty() && !self.fetch_in_flight {
            let reset_to_top = !self.persisted.has_loaded_once();
            self.persisted.mark_loaded_once();
            self.reload(now, reset_to_top, effects);
            return;
        }

        self.restore_scroll(now, effects);
        let unhydrated: Vec<Item> = self.items.iter().cloned().collect();
        for item in &unhydrated {
            self.watch(item, effects);
        }
        self.autofill.arm();
        self.autofill.schedule();
    }

    fn frame(&mut self, now: Instant, snapshot: FrameSnapshot, effects: &mut Vec<Effect>) {
        self.metrics = snapshot.scroll;

        match self.visibility.tick(&snapshot.surface, snapshot.visible_region.as_ref()) {
            Some(VisibilityChange::Hidden) => {
                debug!("surface hidden");
                self.persisted.save_scroll_offset_now(self.last_scroll_top);
            }
            Some(VisibilityChange::Shown) => {
                debug!("surface shown");
                self.user_touched = false;
                self.restore_scroll(now, effects);
                if self.render_enabled && self.items.is_empty() {
                    self.resume_after_hidden(effects);
                }
                self.autofill.schedule();
            }
            None => {}
        }

        self.persisted.flush_frame();

        if let Some(restore) = self.restoring {
            if now >= restore.settle_at {
                self.restoring = None;
                if !self.user_touched {
                    effects.push(Effect::SetScrollTop(restore.offset));
                }
            }
        }

        if self.render_enabled {
            for (key, step) in self.hydrator.poll(now) {
                effects.push(Effect::Hydrate { key, step });
            }
        }

        if self.autofill.take_scheduled() {
            self.run_autofill(effects);
        }
    }

    /// A reload that ran while hidden reset the list without fetching
    fn resume_after_hidden(&mut self, effects: &mut Vec<Effect>) {
        if self.fetch_in_flight {
            return;
        }
        if self.favorites.is_loaded() {
            self.load_more(effects);
        } else {
            self.start_reload_fetch(effects);
        }
    }

    fn scrolled(&mut self, metrics: ScrollMetrics, effects: &mut Vec<Effect>) {
        self.metrics = metrics;
        if self.restoring.is_some() {
            return;
        }

        self.user_touched = true;
        self.last_scroll_top = metrics.scroll_top;
        self.persisted.set_scroll_offset(metrics.scroll_top);
        self.autofill.arm();
        self.autofill.schedule();

        if metrics.near_bottom(self.config.layout.near_bottom_margin_px) {
            self.load_more(effects);
        }
    }

    fn restore_scroll(&mut self, now: Instant, effects: &mut Vec<Effect>) {
        let offset = self.persisted.scroll_offset();
        self.last_scroll_top = offset;
        self.restoring = Some(Restore { offset, settle_at: now + self.config.timing.restore_settle() });
        effects.push(Effect::SetScrollTop(offset));
    }

    /// Reset the list and both cursors, then start loading from the top of the source
    fn reload(&mut self, now: Instant, reset_to_top: bool, effects: &mut Vec<Effect>) {
        self.autofill.arm();
        self.user_touched = true;

        self.epoch += 1;
        let mode = if self.favorites_only { PaginationMode::Local } else { PaginationMode::Remote };
        self.pagination.reset(mode);
        self.favorites.invalidate();
        self.items.clear();
        self.hydrator.clear();
        effects.push(Effect::ClearItems);
        info!(epoch = self.epoch, ?mode, reset_to_top, "reloading");

        if reset_to_top {
            self.last_scroll_top = 0;
            self.restoring = None;
            self.persisted.save_scroll_offset_now(0);
            effects.push(Effect::SetScrollTop(0));
        } else {
            self.restore_scroll(now, effects);
        }

        self.set_status(STATUS_LOADING.to_string(), effects);

        if self.fetch_in_flight {
            // The outstanding response lands first, then this reload's fetch starts
            self.deferred_reload = true;
            return;
        }
        self.start_reload_fetch(effects);
    }

    fn start_reload_fetch(&mut self, effects: &mut Vec<Effect>) {
        if !self.render_enabled || !self.visibility.is_visible() {
            return;
        }
        self.fetch_in_flight = true;
        effects.push(Effect::LoadFavorites { epoch: self.epoch });
    }

    fn load_more(&mut self, effects: &mut Vec<Effect>) {
        if !self.render_enabled || !self.visibility.is_visible() || self.fetch_in_flight || !self.pagination.has_more() {
            return;
        }

        match self.pagination.mode() {
            PaginationMode::Remote => {
                let Some(request) = self.pagination.remote_request(&self.filters) else {
                    return;
                };
                self.fetch_in_flight = true;
                self.set_status(STATUS_LOADING.to_string(), effects);
                effects.push(Effect::FetchPage { epoch: self.epoch, request });
            }
            PaginationMode::Local => {
                self.set_status(STATUS_LOADING_FAVORITES.to_string(), effects);
                if !self.favorites.is_loaded() {
                    self.fetch_in_flight = true;
                    effects.push(Effect::LoadFavorites { epoch: self.epoch });
                    return;
                }
                self.take_local_page(effects);
            }
        }
    }

    fn take_local_page(&mut self, effects: &mut Vec<Effect>) {
        let Some(slice) = self.pagination.next_local_page(&mut self.favorites, &self.filters) else {
            return;
        };

        let shown = slice.items.len();
        self.append_page(slice.items, effects);

        let status = if self.pagination.has_more() {
            format!("Loaded {shown} • {} more", slice.remaining)
        } else {
            format!("Loaded {shown} • end reached")
        };
        self.set_status(status, effects);
        self.autofill.schedule();
    }

    fn favorites_loaded(&mut self, epoch: u64, result: Result<Vec<Item>, BrowserError>, effects: &mut Vec<Effect>) {
        if epoch != self.epoch {
            debug!(epoch, current = self.epoch, "dropping stale favorites response");
            self.fetch_in_flight = false;
            self.resume_deferred(effects);
            return;
        }
        self.fetch_in_flight = false;

        match result {
            Ok(items) => {
                debug!(count = items.len(), "favorites loaded");
                self.favorites.replace(items);
            }
            Err(err) if self.pagination.mode() == PaginationMode::Local => {
                warn!(error = %err, "favorites request failed");
                self.pagination.fail();
                self.set_status(format!("Error: {err}"), effects);
                self.autofill.schedule();
                return;
            }
            Err(err) => {
                // Favorite marks are cosmetic in remote mode
                warn!(error = %err, "favorites request failed, continuing without marks");
                self.favorites.replace(Vec::new());
            }
        }

        self.load_more(effects);
        self.autofill.schedule();
    }

    fn page_fetched(&mut self, epoch: u64, result: Result<Page, BrowserError>, effects: &mut Vec<Effect>) {
        if epoch != self.epoch {
            self.fetch_in_flight = false;
            if let Ok(page) = result {
                // Lands in the new list but never moves the new cursor
                debug!(epoch, current = self.epoch, count = page.items.len(), "appending stale page");
                self.append_page(page.items, effects);
            }
            self.resume_deferred(effects);
            self.autofill.schedule();
            return;
        }
        self.fetch_in_flight = false;

        match result {
            Ok(page) => {
                let elapsed = page.elapsed_ms.map_or_else(|| "?".to_string(), |ms| ms.to_string());
                let items = self.pagination.complete_remote(page, &self.filters);
                let shown = items.len();
                self.append_page(items, effects);

                let status = if self.pagination.has_more() {
                    format!("Loaded {shown} • more available (≈{elapsed}ms)")
                } else {
                    format!("Loaded {shown} • end reached (≈{elapsed}ms)")
                };
                self.set_status(status, effects);
            }
            Err(err) => {
                warn!(error = %err, "page request failed");
                self.pagination.fail();
                self.set_status(format!("Error: {err}"), effects);
            }
        }

        self.autofill.schedule();
    }

    fn resume_deferred(&mut self, effects: &mut Vec<Effect>) {
        if std::mem::take(&mut self.deferred_reload) {
            self.start_reload_fetch(effects);
        }
    }

    fn append_page(&mut self, items: Vec<Item>, effects: &mut Vec<Effect>) {
        let added = self.items.append(items);
        if added == 0 {
            return;
        }

        let fresh: Vec<Item> = self.items.tail(added).to_vec();
        for item in &fresh {
            self.watch(item, effects);
        }

        let cards = fresh
            .into_iter()
            .map(|item| Card { favorite: self.favorites.contains(&item.key), item })
            .collect();
        effects.push(Effect::AppendItems(cards));
    }

    fn watch(&mut self, item: &Item, effects: &mut Vec<Effect>) {
        if self.render_enabled && self.hydrator.watch(item) {
            effects.push(Effect::Observe {
                key: item.key.clone(),
                margin_px: self.config.layout.hydration_margin_px,
            });
        }
    }

    fn run_autofill(&mut self, effects: &mut Vec<Effect>) {
        let gate = AutofillGate {
            render_enabled: self.render_enabled,
            visible: self.visibility.is_visible(),
            fetch_in_flight: self.fetch_in_flight,
            has_more: self.pagination.has_more(),
            under_filled: self.metrics.near_bottom(self.config.layout.near_bottom_margin_px),
        };

        if self.autofill.decide(gate) == AutofillDecision::Fetch {
            self.load_more(effects);
        }
    }

    fn favorite_toggled(
        &mut self,
        now: Instant,
        item: Item,
        result: Result<ToggleOutcome, BrowserError>,
        effects: &mut Vec<Effect>,
    ) {
        let key = item.key.clone();
        let favorite = match result {
            Ok(ToggleOutcome::Added) => {
                self.favorites.insert(item);
                true
            }
            Ok(ToggleOutcome::Removed) => {
                self.favorites.remove(&key);
                false
            }
            Err(err) => {
                warn!(key = %key, error = %err, "favorite toggle failed");
                return;
            }
        };

        effects.push(Effect::SetFavoriteMark { key, favorite });
        if self.favorites_only {
            self.reload(now, true, effects);
        }
    }

    fn select(&mut self, key: ItemKey, image_output_connected: bool, effects: &mut Vec<Effect>) {
        let Some(item) = self.items.get(&key) else {
            return;
        };

        let slot = SelectionPayload::new(item, image_output_connected).to_slot_string();
        self.persisted.set_selection(slot.clone());
        self.selected = Some(key.clone());
        effects.push(Effect::MarkSelected(key));
        effects.push(Effect::WriteSelection(slot));
    }

    fn teardown(&mut self, effects: &mut Vec<Effect>) {
        info!(instance = %self.persisted.scope().instance, "surface torn down");
        self.persisted.save_scroll_offset_now(self.last_scroll_top);
        self.persisted.cancel_pending();
        self.visibility.cancel();
        self.hydrator.release_all();
        self.autofill.disarm();
        self.restoring = None;
        self.torn_down = true;
        effects.push(Effect::ReleaseObservers);
        effects.push(Effect::Stop);
    }

    fn set_status(&mut self, status: String, effects: &mut Vec<Effect>) {
        if status != self.status {
            self.status = status.clone();
            effects.push(Effect::SetStatus(status));
        }
    }

    pub fn items(&self) -> &RenderList {
        &self.items
    }

    pub fn filters(&self) -> &Filters {
        &self.filters
    }

    pub fn favorites_only(&self) -> bool {
        self.favorites_only
    }

    pub fn has_more(&self) -> bool {
        self.pagination.has_more()
    }

    pub fn cursor(&self) -> &CursorState {
        self.pagination.cursor()
    }

    pub fn is_fetching(&self) -> bool {
        self.fetch_in_flight
    }

    pub fn render_enabled(&self) -> bool {
        self.render_enabled
    }

    pub fn is_visible(&self) -> bool {
        self.visibility.is_visible()
    }

    pub fn is_favorite(&self, key: &ItemKey) -> bool {
        self.favorites.contains(key)
    }

    pub fn autofill_armed(&self) -> bool {
        self.autofill.is_armed()
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn selected(&self) -> Option<&ItemKey> {
        self.selected.as_ref()
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    pub fn persisted(&self) -> &PersistedState {
        &self.persisted
    }

    pub fn config(&self) -> &BrowserConfig {
        &self.config
    }

    /// Frame tick interval the driver should use
    pub fn frame_interval(&self) -> Duration {
        self.config.timing.frame_interval()
    }
}
