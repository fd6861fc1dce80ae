//! Browser configuration
//!
//! Loaded from a TOML file. Every field has a default, so an absent file or a
//! partial file is fine.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::BrowserError;

pub const ENV_BROWSER_CONFIG: &str = "DISCOVERY_BROWSER_CONFIG";

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8188";
const DEFAULT_LIST_PATH: &str = "/civitai_gallery/images_stream";
const DEFAULT_FAVORITES_PATH: &str = "/civitai_gallery/get_all_favorites_data";
const DEFAULT_TOGGLE_PATH: &str = "/civitai_gallery/toggle_favorite";
const DEFAULT_USER_AGENT: &str = "discovery-browser";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_NAMESPACE: &str = "discovery-hub";
const DEFAULT_PAGE_URL_BASE: &str = "https://civitai.com/images";
const DEFAULT_AUTOFILL_BUDGET: u32 = 6;

/// Top-level configuration for one browser surface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub endpoint: EndpointConfig,
    pub timing: TimingConfig,
    pub layout: LayoutConfig,
    /// Logical namespace for persisted surface state
    pub namespace: String,
    /// SQLite file for persisted surface state; defaults to the user data directory
    pub database_path: Option<PathBuf>,
    /// Pages the autofill loop may request per arming
    pub autofill_budget: u32,
    /// Requested page size before clamping
    pub default_batch_size: u32,
    /// Base for item page links when the payload carries none
    pub page_url_base: String,
}

/// Where the gallery collaborators live
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    pub base_url: String,
    pub list_path: String,
    pub favorites_path: String,
    pub toggle_path: String,
    pub user_agent: String,
    pub request_timeout_secs: u64,
}

/// Timer values, all in milliseconds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Visibility poll and frame tick
    pub frame_interval_ms: u64,
    /// Escalate a stalled metadata-only video load after this long
    pub hydration_fallback_ms: u64,
    /// Delay between a forced full load and the preview seek
    pub preview_kick_ms: u64,
    /// Re-apply a restored scroll offset after this long unless the user scrolled
    pub restore_settle_ms: u64,
    /// Server-side time budget hint sent in videos-only mode
    pub videos_time_budget_ms: u64,
}

/// Pixel margins used by the fill and hydration checks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// The list counts as under-filled while less than this remains below the viewport
    pub near_bottom_margin_px: u32,
    /// Video items within this distance of the viewport start hydrating
    pub hydration_margin_px: u32,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            endpoint: EndpointConfig::default(),
            timing: TimingConfig::default(),
            layout: LayoutConfig::default(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            database_path: None,
            autofill_budget: DEFAULT_AUTOFILL_BUDGET,
            default_batch_size: crate::state::filters::DEFAULT_BATCH_SIZE,
            page_url_base: DEFAULT_PAGE_URL_BASE.to_string(),
        }
    }
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            list_path: DEFAULT_LIST_PATH.to_string(),
            favorites_path: DEFAULT_FAVORITES_PATH.to_string(),
            toggle_path: DEFAULT_TOGGLE_PATH.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            frame_interval_ms: 16,
            hydration_fallback_ms: 1200,
            preview_kick_ms: 200,
            restore_settle_ms: 60,
            videos_time_budget_ms: 1200,
        }
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self { near_bottom_margin_px: 900, hydration_margin_px: 1200 }
    }
}

impl TimingConfig {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }

    pub fn hydration_fallback(&self) -> Duration {
        Duration::from_millis(self.hydration_fallback_ms)
    }

    pub fn preview_kick(&self) -> Duration {
        Duration::from_millis(self.preview_kick_ms)
    }

    pub fn restore_settle(&self) -> Duration {
        Duration::from_millis(self.restore_settle_ms)
    }
}

impl BrowserConfig {
    /// Load the configuration.
    ///
    /// Resolution order: `path`, then `$DISCOVERY_BROWSER_CONFIG`, then
    /// `<config dir>/discovery-browser/config.toml`. A missing file yields the
    /// defaults; an unreadable or invalid one is an error.
    pub fn load(path: Option<&Path>) -> Result<Self, BrowserError> {
        let path = match path {
            Some(path) => Some(path.to_path_buf()),
            None => Self::resolve_path(),
        };

        let Some(path) = path.filter(|candidate| candidate.exists()) else {
            debug!("no configuration file found, using defaults");
            return Ok(Self::default());
        };

        let raw = fs::read_to_string(&path)?;
        let config = Self::from_toml(&raw).map_err(|err| {
            BrowserError::config(format!("{}: {err}", path.display()))
        })?;

        debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Parse and validate a TOML document
    pub fn from_toml(raw: &str) -> Result<Self, BrowserError> {
        let config: Self = toml::from_str(raw).map_err(|err| BrowserError::config(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), BrowserError> {
        if self.timing.frame_interval_ms == 0 {
            return Err(BrowserError::config("timing.frame_interval_ms must be greater than zero"));
        }
        if self.autofill_budget == 0 {
            return Err(BrowserError::config("autofill_budget must be greater than zero"));
        }
        if self.endpoint.base_url.trim().is_empty() {
            return Err(BrowserError::config("endpoint.base_url must not be empty"));
        }
        Ok(())
    }

    fn resolve_path() -> Option<PathBuf> {
        if let Some(explicit) = std::env::var_os(ENV_BROWSER_CONFIG) {
            return Some(PathBuf::from(explicit));
        }

        let mut path = dirs::config_dir()?;
        path.push("discovery-browser");
        path.push("config.toml");
        Some(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = BrowserConfig::from_toml(
            r#"
            namespace = "graph-a"
            autofill_budget = 3

            [layout]
            near_bottom_margin_px = 400
            "#,
        )
        .unwrap();

        assert_eq!(config.namespace, "graph-a");
        assert_eq!(config.autofill_budget, 3);
        assert_eq!(config.layout.near_bottom_margin_px, 400);
        assert_eq!(config.layout.hydration_margin_px, 1200);
        assert_eq!(config.timing, TimingConfig::default());
        assert_eq!(config.endpoint, EndpointConfig::default());
    }

    #[test]
    fn test_zero_budget_is_rejected() {
        let err = BrowserConfig::from_toml("autofill_budget = 0").unwrap_err();
        assert!(matches!(err, BrowserError::Config(_)));
    }

    #[test]
    fn test_load_from_explicit_path() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("config.toml");
        fs::write(&path, "[endpoint]\nbase_url = \"http://gallery.local:9000\"\n").unwrap();

        let config = BrowserConfig::load(Some(&path)).unwrap();
        assert_eq!(config.endpoint.base_url, "http://gallery.local:9000");
        assert_eq!(config.endpoint.list_path, DEFAULT_LIST_PATH);
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let temp = tempfile::tempdir().unwrap();
        let config = BrowserConfig::load(Some(&temp.path().join("absent.toml"))).unwrap();
        assert_eq!(config, BrowserConfig::default());
    }
}
