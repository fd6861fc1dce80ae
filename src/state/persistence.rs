//! Two-tier surface state: an in-memory property bag shared with the host,
//! backed by a [`DurableStore`].
//!
//! Scroll offset writes reach the durable tier at most once per frame; the
//! render-enabled flag is written through immediately. Durable failures are
//! logged and otherwise ignored.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use super::durable::DurableStore;

pub const DEFAULT_SCROLL_OFFSET: u32 = 0;
pub const DEFAULT_RENDER_ENABLED: bool = true;

/// The values a surface persists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalKey {
    /// Pixel offset of the scroll container, default 0
    ScrollOffset,
    /// Whether the surface may fetch and load media, default true
    RenderEnabled,
    /// Set once the instance has completed its first load, default unset
    LoadedOnce,
}

impl LogicalKey {
    pub fn as_str(self) -> &'static str {
        match self {
            LogicalKey::ScrollOffset => "scroll_top",
            LogicalKey::RenderEnabled => "render_enabled",
            LogicalKey::LoadedOnce => "loaded_once",
        }
    }
}

/// Fully-qualified durable key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StateKey {
    pub namespace: String,
    pub instance: String,
    pub logical: LogicalKey,
}

/// `(namespace, instance)` pair that identifies one surface across recreation
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StateScope {
    pub namespace: String,
    pub instance: String,
}

impl StateScope {
    pub fn new(namespace: impl Into<String>, instance: impl Into<String>) -> Self {
        Self { namespace: namespace.into(), instance: instance.into() }
    }

    pub fn key(&self, logical: LogicalKey) -> StateKey {
        StateKey {
            namespace: self.namespace.clone(),
            instance: self.instance.clone(),
            logical,
        }
    }
}

/// Properties the host serializes with its own document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SurfaceProperties {
    pub scroll_top: Option<u32>,
    pub display_on: Option<bool>,
    pub has_loaded_once: bool,
    /// Last selection payload written to the output slot
    pub selection_data: Option<String>,
    pub base_models: Vec<String>,
}

/// Property bag shared between the host and the controller
pub type SharedProperties = Arc<Mutex<SurfaceProperties>>;

pub struct PersistedState {
    scope: StateScope,
    properties: SharedProperties,
    durable: Arc<dyn DurableStore>,
    pending_scroll: Option<u32>,
}

impl PersistedState {
    pub fn new(scope: StateScope, properties: SharedProperties, durable: Arc<dyn DurableStore>) -> Self {
        Self { scope, properties, durable, pending_scroll: None }
    }

    pub fn scope(&self) -> &StateScope {
        &self.scope
    }

    pub fn properties(&self) -> &SharedProperties {
        &self.properties
    }

    /// In-memory value, then durable, then 0
    pub fn scroll_offset(&self) -> u32 {
        if let Some(offset) = self.properties.lock().scroll_top {
            return offset;
        }

        self.read_durable(LogicalKey::ScrollOffset)
            .and_then(|raw| raw.trim().parse::<f64>().ok())
            .filter(|offset| offset.is_finite())
            .map(|offset| offset.max(0.0).round() as u32)
            .unwrap_or(DEFAULT_SCROLL_OFFSET)
    }

    /// Durable value, then the in-memory property, then true
    pub fn render_enabled(&self) -> bool {
        match self.read_durable(LogicalKey::RenderEnabled).as_deref() {
            Some("1") => return true,
            Some("0") => return false,
            _ => {}
        }

        self.properties.lock().display_on.unwrap_or(DEFAULT_RENDER_ENABLED)
    }

    /// Update memory now; the durable write waits for [`Self::flush_frame`]
    pub fn set_scroll_offset(&mut self, offset: u32) {
        self.properties.lock().scroll_top = Some(offset);
        self.pending_scroll = Some(offset);
    }

    /// Write the coalesced scroll offset, if any. Called once per frame.
    pub fn flush_frame(&mut self) {
        if let Some(offset) = self.pending_scroll.take() {
            self.write_durable(LogicalKey::ScrollOffset, &offset.to_string());
        }
    }

    /// Write through both tiers immediately, dropping any pending write
    pub fn save_scroll_offset_now(&mut self, offset: u32) {
        self.pending_scroll = None;
        self.properties.lock().scroll_top = Some(offset);
        self.write_durable(LogicalKey::ScrollOffset, &offset.to_string());
    }

    pub fn set_render_enabled(&mut self, enabled: bool) {
        self.properties.lock().display_on = Some(enabled);
        self.write_durable(LogicalKey::RenderEnabled, if enabled { "1" } else { "0" });
    }

    pub fn has_pending_write(&self) -> bool {
        self.pending_scroll.is_some()
    }

    pub fn cancel_pending(&mut self) {
        self.pending_scroll = None;
    }

    /// In-memory flag, then the durable marker
    pub fn has_loaded_once(&self) -> bool {
        if self.properties.lock().has_loaded_once {
            return true;
        }
        self.read_durable(LogicalKey::LoadedOnce).as_deref() == Some("1")
    }

    pub fn mark_loaded_once(&self) {
        self.properties.lock().has_loaded_once = true;
        self.write_durable(LogicalKey::LoadedOnce, "1");
    }

    pub fn selection(&self) -> Option<String> {
        self.properties.lock().selection_data.clone()
    }

    pub fn set_selection(&self, payload: String) {
        self.properties.lock().selection_data = Some(payload);
    }

    pub fn base_models(&self) -> Vec<String> {
        self.properties.lock().base_models.clone()
    }

    pub fn set_base_models(&self, models: Vec<String>) {
        self.properties.lock().base_models = models;
    }

    fn read_durable(&self, logical: LogicalKey) -> Option<String> {
        match self.durable.read(&self.scope.key(logical)) {
            Ok(value) => value,
            Err(err) => {
                debug!(key = logical.as_str(), error = %err, "durable read failed");
                None
            }
        }
    }

    fn write_durable(&self, logical: LogicalKey, value: &str) {
        if let Err(err) = self.durable.write(&self.scope.key(logical), value) {
            debug!(key = logical.as_str(), error = %err, "durable write failed");
        }
    }
}

impl fmt::Debug for PersistedState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistedState")
            .field("scope", &self.scope)
            .field("pending_scroll", &self.pending_scroll)
            .finish()
    }
}
