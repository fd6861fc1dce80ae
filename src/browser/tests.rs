use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::{json, Value};

use super::*;
use crate::feed::hydration::Preload;
use crate::selection::decode_selection;
use crate::state::durable::{DurableStore, MemoryStore};
use crate::state::persistence::{LogicalKey, SharedProperties, StateScope};
use crate::view::geometry::Rect;

const SURFACE: Rect = Rect::new(0.0, 0.0, 400.0, 600.0);
const ON_SCREEN: Rect = Rect::new(-100.0, -100.0, 1600.0, 1200.0);
const OFF_SCREEN: Rect = Rect::new(5000.0, 5000.0, 1600.0, 1200.0);

struct Harness {
    browser: Browser,
    store: Arc<MemoryStore>,
    properties: SharedProperties,
    start: Instant,
}

impl Harness {
    fn new() -> Self {
        Self::with(Arc::new(MemoryStore::new()), SharedProperties::default())
    }

    fn with(store: Arc<MemoryStore>, properties: SharedProperties) -> Self {
        Self::configured(store, properties, |browser| browser)
    }

    fn configured(
        store: Arc<MemoryStore>,
        properties: SharedProperties,
        configure: impl FnOnce(Browser) -> Browser,
    ) -> Self {
        let persisted = PersistedState::new(StateScope::new("test", "node-1"), properties.clone(), store.clone());
        Self {
            browser: configure(Browser::new(BrowserConfig::default(), persisted)),
            store,
            properties,
            start: Instant::now(),
        }
    }

    fn at(&mut self, millis: u64, message: Message) -> Vec<Effect> {
        self.browser.update(self.start + Duration::from_millis(millis), message)
    }

    fn send(&mut self, message: Message) -> Vec<Effect> {
        self.at(0, message)
    }

    fn stored(&self, logical: LogicalKey) -> Option<String> {
        self.store.read(&StateScope::new("test", "node-1").key(logical)).unwrap()
    }

    /// Attach, answer the favorites load, answer the first page
    fn load_first_page(&mut self, page: Page) -> Vec<Effect> {
        self.send(Message::Attach);
        let effects = self.send(Message::FavoritesLoaded { epoch: 1, result: Ok(Vec::new()) });
        assert!(fetch_epoch(&effects).is_some());
        self.send(Message::PageFetched { epoch: 1, result: Ok(page) })
    }
}

fn image(id: u32) -> Item {
    Item::from_value(json!({ "id": id, "url": format!("https://cdn/{id}.jpeg"), "meta": { "prompt": "p" } })).unwrap()
}

fn video(id: u32) -> Item {
    Item::from_value(json!({ "id": id, "url": format!("https://cdn/{id}.mp4") })).unwrap()
}

fn page(ids: std::ops::Range<u32>, cursor: Option<&str>) -> Page {
    Page {
        items: ids.map(image).collect(),
        continuation: cursor.map(str::to_string),
        ..Page::default()
    }
}

fn frame(region: Rect, scroll_top: u32, scroll_height: u32) -> Message {
    Message::Frame(FrameSnapshot {
        surface: SURFACE,
        visible_region: Some(region),
        scroll: ScrollMetrics::new(scroll_top, scroll_height, 800),
    })
}

fn fetch_epoch(effects: &[Effect]) -> Option<u64> {
    effects.iter().find_map(|effect| match effect {
        Effect::FetchPage { epoch, .. } => Some(*epoch),
        _ => None,
    })
}

fn loads_favorites(effects: &[Effect]) -> bool {
    effects.iter().any(|effect| matches!(effect, Effect::LoadFavorites { .. }))
}

fn keys(browser: &Browser) -> Vec<String> {
    browser.items().iter().map(|item| item.key.to_string()).collect()
}

#[test]
fn test_attach_loads_first_page_from_top() {
    let mut h = Harness::new();

    let effects = h.send(Message::Attach);
    assert!(effects.contains(&Effect::SetRenderIndicator(true)));
    assert!(effects.contains(&Effect::ClearItems));
    assert!(effects.contains(&Effect::SetScrollTop(0)));
    assert!(effects.contains(&Effect::SetStatus(STATUS_LOADING.into())));
    assert!(effects.contains(&Effect::LoadFavorites { epoch: 1 }));
    assert!(h.browser.is_fetching());
    assert!(h.properties.lock().has_loaded_once);

    let effects = h.send(Message::FavoritesLoaded { epoch: 1, result: Ok(vec![image(3)]) });
    let request = effects
        .iter()
        .find_map(|effect| match effect {
            Effect::FetchPage { request, .. } => Some(request.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(request.cursor, None);
    assert_eq!(request.filters.batch_size, 24);

    let effects = h.send(Message::PageFetched { epoch: 1, result: Ok(page(0..24, Some("c1"))) });
    let Some(Effect::AppendItems(cards)) = effects.iter().find(|e| matches!(e, Effect::AppendItems(_))) else {
        panic!("expected appended cards");
    };
    assert_eq!(cards.len(), 24);
    assert!(cards[3].favorite);
    assert!(!cards[4].favorite);
    assert!(h.browser.has_more());
    assert!(!h.browser.is_fetching());
    assert_eq!(h.browser.status(), "Loaded 24 • more available (≈?ms)");

    // A filled viewport disarms the loop without fetching
    let effects = h.at(16, frame(ON_SCREEN, 0, 6000));
    assert_eq!(fetch_epoch(&effects), None);
    assert!(!h.browser.autofill_armed());
}

#[test]
fn test_status_reports_server_time_and_end() {
    let mut h = Harness::new();
    let mut last = page(0..5, None);
    last.elapsed_ms = Some(812);
    h.load_first_page(last);

    assert!(!h.browser.has_more());
    assert_eq!(h.browser.status(), "Loaded 5 • end reached (≈812ms)");
}

#[test]
fn test_scroll_offset_survives_hide_and_show() {
    let mut h = Harness::new();
    h.load_first_page(page(0..24, Some("c1")));
    h.at(16, frame(ON_SCREEN, 0, 6000));

    h.at(20, Message::Scrolled(ScrollMetrics::new(500, 6000, 800)));
    // Debounced until the next frame
    assert_eq!(h.stored(LogicalKey::ScrollOffset).as_deref(), Some("0"));

    h.at(32, frame(OFF_SCREEN, 500, 6000));
    assert_eq!(h.stored(LogicalKey::ScrollOffset).as_deref(), Some("500"));
    assert!(!h.browser.is_visible());

    let effects = h.at(48, frame(ON_SCREEN, 0, 6000));
    assert!(effects.contains(&Effect::SetScrollTop(500)));

    // Scroll events caused by the restore are not user scrolls
    h.at(50, Message::Scrolled(ScrollMetrics::new(0, 6000, 800)));
    let effects = h.at(120, frame(ON_SCREEN, 0, 6000));
    assert!(effects.contains(&Effect::SetScrollTop(500)));
    assert_eq!(h.stored(LogicalKey::ScrollOffset).as_deref(), Some("500"));
}

#[test]
fn test_recreated_surface_restores_durable_offset() {
    let store = Arc::new(MemoryStore::new());
    {
        let mut h = Harness::with(store.clone(), SharedProperties::default());
        h.load_first_page(page(0..24, Some("c1")));
        h.at(20, Message::Scrolled(ScrollMetrics::new(500, 6000, 800)));
        h.at(40, Message::Teardown);
    }

    let properties = SharedProperties::default();
    properties.lock().has_loaded_once = true;
    let mut h = Harness::with(store, properties);

    let effects = h.send(Message::Attach);
    assert!(effects.contains(&Effect::SetScrollTop(500)));
    assert!(!effects.contains(&Effect::SetScrollTop(0)));
    assert!(effects.contains(&Effect::LoadFavorites { epoch: 1 }));
}

#[test]
fn test_restart_with_fresh_properties_restores_durable_offset() {
    let store = Arc::new(MemoryStore::new());
    {
        let mut h = Harness::with(store.clone(), SharedProperties::default());
        h.load_first_page(page(0..24, Some("c1")));
        h.at(20, Message::Scrolled(ScrollMetrics::new(500, 6000, 800)));
        h.at(40, Message::Teardown);
        assert_eq!(h.stored(LogicalKey::ScrollOffset).as_deref(), Some("500"));
        assert_eq!(h.stored(LogicalKey::LoadedOnce).as_deref(), Some("1"));
    }

    // A new process: nothing in memory, only the durable store survives
    let mut h = Harness::with(store, SharedProperties::default());
    let effects = h.send(Message::Attach);

    assert!(effects.contains(&Effect::SetScrollTop(500)));
    assert!(!effects.contains(&Effect::SetScrollTop(0)));
    assert_eq!(h.stored(LogicalKey::ScrollOffset).as_deref(), Some("500"));
    assert!(effects.contains(&Effect::LoadFavorites { epoch: 1 }));
}

#[test]
fn test_configured_mode_keeps_restored_offset() {
    let store = Arc::new(MemoryStore::new());
    {
        let mut h = Harness::with(store.clone(), SharedProperties::default());
        h.load_first_page(page(0..24, Some("c1")));
        h.at(20, Message::Scrolled(ScrollMetrics::new(640, 6000, 800)));
        h.at(40, Message::Teardown);
    }

    let mut h = Harness::configured(store, SharedProperties::default(), |browser| {
        let filters = Filters { batch_size: 12, ..browser.filters().clone() };
        browser.with_filters(filters).with_favorites_only(true)
    });

    let effects = h.send(Message::Attach);
    assert!(effects.contains(&Effect::SetScrollTop(640)));
    assert!(!effects.contains(&Effect::SetScrollTop(0)));
    assert!(effects.contains(&Effect::LoadFavorites { epoch: 1 }));
    assert_eq!(h.stored(LogicalKey::ScrollOffset).as_deref(), Some("640"));

    h.send(Message::FavoritesLoaded { epoch: 1, result: Ok((1..20).map(image).collect()) });
    assert!(h.browser.favorites_only());
    assert_eq!(h.browser.items().len(), 12);
    assert_eq!(h.browser.status(), "Loaded 12 • 7 more");
}

#[test]
fn test_autofill_stops_within_budget_on_duplicate_pages() {
    let mut h = Harness::new();
    h.load_first_page(page(0..24, Some("c1")));

    let mut fetches = 0;
    for tick in 1..=30u64 {
        let effects = h.at(tick * 16, frame(ON_SCREEN, 0, 1000));
        if let Some(epoch) = fetch_epoch(&effects) {
            fetches += 1;
            let cursor = format!("c{}", tick + 1);
            h.at(tick * 16 + 1, Message::PageFetched { epoch, result: Ok(page(0..24, Some(&cursor))) });
        }
    }

    assert_eq!(fetches, 6);
    assert!(!h.browser.autofill_armed());
    assert!(h.browser.has_more());
    assert_eq!(h.browser.items().len(), 24);

    // A user scroll re-arms the loop
    h.at(600, Message::Scrolled(ScrollMetrics::new(0, 4000, 800)));
    assert!(h.browser.autofill_armed());
}

#[test]
fn test_scroll_near_bottom_loads_next_page() {
    let mut h = Harness::new();
    h.load_first_page(page(0..24, Some("c1")));

    let effects = h.at(20, Message::Scrolled(ScrollMetrics::new(2400, 4000, 800)));
    let request = effects
        .iter()
        .find_map(|effect| match effect {
            Effect::FetchPage { request, .. } => Some(request.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(request.cursor.as_deref(), Some("c1"));

    // Only one request in flight
    let effects = h.send(Message::LoadMore);
    assert_eq!(fetch_epoch(&effects), None);
}

#[test]
fn test_switching_modes_isolates_lists() {
    let mut h = Harness::new();
    h.load_first_page(page(0..24, Some("c1")));

    let effects = h.send(Message::SetFavoritesOnly(true));
    assert!(effects.contains(&Effect::ClearItems));
    assert!(effects.contains(&Effect::LoadFavorites { epoch: 2 }));
    assert!(h.browser.items().is_empty());

    let favorites = (100..105).map(image).collect();
    let effects = h.send(Message::FavoritesLoaded { epoch: 2, result: Ok(favorites) });
    assert_eq!(fetch_epoch(&effects), None);
    assert_eq!(keys(&h.browser), vec!["100", "101", "102", "103", "104"]);
    assert_eq!(h.browser.status(), "Loaded 5 • end reached");
    assert_eq!(
        h.browser.cursor(),
        &CursorState::Local { offset: 5, filtered_len: Some(5), failed: false }
    );
    assert!(!h.browser.has_more());

    h.send(Message::SetFavoritesOnly(false));
    assert!(h.browser.items().is_empty());
    assert!(h.browser.has_more());
    assert!(matches!(h.browser.cursor(), CursorState::Remote { token: None, .. }));
}

#[test]
fn test_local_pages_report_remaining() {
    let mut h = Harness::new();
    // Configured before attach, so neither reload fetches
    assert!(!loads_favorites(&h.send(Message::ApplyFilters(Filters { batch_size: 12, ..Filters::default() }))));
    assert!(!loads_favorites(&h.send(Message::SetFavoritesOnly(true))));

    let effects = h.send(Message::Attach);
    assert!(effects.contains(&Effect::LoadFavorites { epoch: 3 }));

    h.send(Message::FavoritesLoaded { epoch: 3, result: Ok((200..230).map(image).collect()) });
    assert_eq!(h.browser.items().len(), 12);
    assert_eq!(h.browser.status(), "Loaded 12 • 18 more");
}

#[test]
fn test_stale_page_never_moves_new_cursor() {
    let mut h = Harness::new();
    h.send(Message::Attach);
    let effects = h.send(Message::FavoritesLoaded { epoch: 1, result: Ok(Vec::new()) });
    assert_eq!(fetch_epoch(&effects), Some(1));

    // Reload while the first page is still in flight
    let effects = h.send(Message::SetFavoritesOnly(true));
    assert!(!loads_favorites(&effects));
    assert!(h.browser.is_fetching());

    let effects = h.send(Message::PageFetched { epoch: 1, result: Ok(page(0..3, Some("c1"))) });
    assert!(effects.contains(&Effect::LoadFavorites { epoch: 2 }));
    assert_eq!(h.browser.items().len(), 3);
    assert_eq!(
        h.browser.cursor(),
        &CursorState::Local { offset: 0, filtered_len: None, failed: false }
    );

    // The deferred reload continues normally, dedup still holds
    h.send(Message::FavoritesLoaded { epoch: 2, result: Ok(vec![image(1), image(50)]) });
    assert_eq!(keys(&h.browser), vec!["0", "1", "2", "50"]);
}

#[test]
fn test_favorite_toggle_updates_mark() {
    let mut h = Harness::new();
    h.load_first_page(page(0..24, Some("c1")));

    let effects = h.send(Message::ToggleFavorite(ItemKey::new("3")));
    assert_eq!(effects, vec![Effect::ToggleFavorite(image(3))]);

    let effects = h.send(Message::FavoriteToggled { item: image(3), result: Ok(ToggleOutcome::Added) });
    assert_eq!(effects, vec![Effect::SetFavoriteMark { key: ItemKey::new("3"), favorite: true }]);
    assert!(h.browser.is_favorite(&ItemKey::new("3")));

    let effects = h.send(Message::FavoriteToggled {
        item: image(3),
        result: Err(BrowserError::ToggleRejected("Invalid item data".into())),
    });
    assert!(effects.is_empty());
    assert!(h.browser.is_favorite(&ItemKey::new("3")));
}

#[test]
fn test_unfavorite_in_favorites_mode_reloads() {
    let mut h = Harness::new();
    h.load_first_page(page(0..24, Some("c1")));
    h.send(Message::SetFavoritesOnly(true));
    h.send(Message::FavoritesLoaded { epoch: 2, result: Ok(vec![image(7), image(8)]) });

    let effects = h.send(Message::FavoriteToggled { item: image(7), result: Ok(ToggleOutcome::Removed) });
    assert!(effects.contains(&Effect::SetFavoriteMark { key: ItemKey::new("7"), favorite: false }));
    assert!(effects.contains(&Effect::ClearItems));
    assert!(effects.contains(&Effect::LoadFavorites { epoch: 3 }));
    assert!(!h.browser.is_favorite(&ItemKey::new("7")));
}

#[test]
fn test_request_error_exhausts_and_reports() {
    let mut h = Harness::new();
    h.send(Message::Attach);
    h.send(Message::FavoritesLoaded { epoch: 1, result: Ok(Vec::new()) });

    let error = BrowserError::Status { status: "503 Service Unavailable".into(), body: String::new() };
    let effects = h.send(Message::PageFetched { epoch: 1, result: Err(error) });
    assert!(effects.contains(&Effect::SetStatus("Error: 503 Service Unavailable".into())));
    assert!(!h.browser.has_more());

    assert!(h.send(Message::LoadMore).is_empty());
    let effects = h.at(16, frame(ON_SCREEN, 0, 0));
    assert_eq!(fetch_epoch(&effects), None);
}

#[test]
fn test_favorites_failure_in_local_mode() {
    let mut h = Harness::new();
    h.load_first_page(page(0..24, Some("c1")));
    h.send(Message::SetFavoritesOnly(true));

    let error = BrowserError::Shape("favorites response is not an object".into());
    h.send(Message::FavoritesLoaded { epoch: 2, result: Err(error) });
    assert!(h.browser.status().starts_with("Error: "));
    assert!(!h.browser.has_more());
}

#[test]
fn test_render_toggle_releases_and_rewatches_media() {
    let mut h = Harness::new();
    let mixed = Page {
        items: vec![video(1), image(2)],
        continuation: None,
        pre_filtered: true,
        elapsed_ms: None,
    };
    let effects = h.load_first_page(mixed);
    let observe = Effect::Observe { key: ItemKey::new("1"), margin_px: 1200 };
    assert!(effects.contains(&observe));

    let effects = h.send(Message::SetRenderEnabled(false));
    assert!(effects.contains(&Effect::SetRenderIndicator(false)));
    assert!(effects.contains(&Effect::ReleaseObservers));
    assert!(effects.contains(&Effect::PauseMedia));
    assert_eq!(h.stored(LogicalKey::RenderEnabled).as_deref(), Some("0"));
    assert!(!h.browser.render_enabled());

    // Nothing is hydrated or fetched while disabled
    assert!(h.send(Message::MediaNearVisible(ItemKey::new("1"))).is_empty());
    assert!(h.send(Message::LoadMore).is_empty());

    let effects = h.send(Message::SetRenderEnabled(true));
    assert!(effects.contains(&observe));
    assert!(effects.contains(&Effect::SetScrollTop(0)));
    assert!(!effects.contains(&Effect::ClearItems));
    assert_eq!(h.stored(LogicalKey::RenderEnabled).as_deref(), Some("1"));
}

#[test]
fn test_disabled_surface_stays_idle_on_attach() {
    let store = Arc::new(MemoryStore::new());
    store.write(&StateScope::new("test", "node-1").key(LogicalKey::RenderEnabled), "0").unwrap();
    let mut h = Harness::with(store, SharedProperties::default());

    let effects = h.send(Message::Attach);
    assert!(effects.contains(&Effect::SetRenderIndicator(false)));
    assert!(!loads_favorites(&effects));
    assert!(!h.browser.render_enabled());
}

#[test]
fn test_video_hydration_through_controller() {
    let mut h = Harness::new();
    let videos = Page { items: vec![video(9)], continuation: None, pre_filtered: true, elapsed_ms: None };
    h.load_first_page(videos);

    let key = ItemKey::new("9");
    let effects = h.at(100, Message::MediaNearVisible(key.clone()));
    assert_eq!(
        effects,
        vec![Effect::Hydrate {
            key: key.clone(),
            step: HydrationStep::Load { src: "https://cdn/9.mp4".into(), preload: Preload::Metadata },
        }]
    );

    let effects = h.at(1300, frame(ON_SCREEN, 0, 6000));
    assert!(effects.contains(&Effect::Hydrate {
        key: key.clone(),
        step: HydrationStep::Load { src: "https://cdn/9.mp4".into(), preload: Preload::Auto },
    }));

    let effects = h.at(1310, Message::Media { key: key.clone(), event: MediaEvent::LoadedData });
    assert_eq!(effects, vec![Effect::Hydrate { key, step: HydrationStep::Freeze }]);
}

#[test]
fn test_reload_while_hidden_waits_for_visibility() {
    let mut h = Harness::new();
    h.load_first_page(page(0..24, Some("c1")));
    h.at(16, frame(OFF_SCREEN, 0, 6000));

    let effects = h.at(20, Message::Refresh);
    assert!(effects.contains(&Effect::ClearItems));
    assert!(!loads_favorites(&effects));

    let effects = h.at(32, frame(ON_SCREEN, 0, 0));
    assert!(effects.contains(&Effect::LoadFavorites { epoch: 2 }));
}

#[test]
fn test_selection_is_written_as_string() {
    let mut h = Harness::new();
    h.load_first_page(page(0..24, Some("c1")));

    let effects = h.send(Message::Select { key: ItemKey::new("5"), image_output_connected: true });
    assert_eq!(effects[0], Effect::MarkSelected(ItemKey::new("5")));
    let Effect::WriteSelection(slot) = &effects[1] else {
        panic!("expected selection write");
    };
    let decoded = decode_selection(slot);
    assert_eq!(decoded.positive_prompt, "p");
    assert_eq!(decoded.image_url, "https://cdn/5.jpeg");
    assert!(decoded.download_image);
    assert_eq!(h.properties.lock().selection_data.as_deref(), Some(slot.as_str()));
    assert_eq!(h.browser.selected(), Some(&ItemKey::new("5")));

    let effects = h.send(Message::SelectionEdited(Value::Null));
    assert_eq!(effects, vec![Effect::WriteSelection("{}".into())]);
    let effects = h.send(Message::SelectionEdited(json!({ "item": {} })));
    assert_eq!(effects, vec![Effect::WriteSelection("{\"item\":{}}".into())]);
}

#[test]
fn test_base_models_persist_in_properties() {
    let mut h = Harness::new();
    h.send(Message::Attach);
    let filters = Filters { base_models: vec!["Pony".into(), "Qwen".into()], ..Filters::default() };
    h.send(Message::ApplyFilters(filters));
    assert_eq!(h.properties.lock().base_models, vec!["Pony", "Qwen"]);
}

#[test]
fn test_teardown_saves_and_stops() {
    let mut h = Harness::new();
    h.load_first_page(page(0..24, Some("c1")));
    h.at(20, Message::Scrolled(ScrollMetrics::new(320, 6000, 800)));

    let effects = h.at(30, Message::Teardown);
    assert_eq!(effects, vec![Effect::ReleaseObservers, Effect::Stop]);
    assert_eq!(h.stored(LogicalKey::ScrollOffset).as_deref(), Some("320"));
    assert!(h.browser.is_torn_down());

    assert!(h.at(40, frame(OFF_SCREEN, 0, 0)).is_empty());
    assert!(h.send(Message::LoadMore).is_empty());
}
