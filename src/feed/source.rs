//! Collaborator traits for the list, favorites and toggle endpoints.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::BrowserError;
use crate::state::data::{Item, Page};
use crate::state::filters::Filters;

/// One remote page request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListRequest {
    pub filters: Filters,
    /// `None` for the first page
    pub cursor: Option<String>,
    /// Server-side time budget hint, sent only in videos-only mode
    pub time_budget_ms: Option<u64>,
}

impl ListRequest {
    pub fn new(filters: Filters, cursor: Option<String>, videos_time_budget_ms: u64) -> Self {
        let time_budget_ms = filters.videos_only.then_some(videos_time_budget_ms);
        Self { filters, cursor, time_budget_ms }
    }

    /// Query parameters in wire order; empty values are left out
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let filters = &self.filters;
        let flag = |on: bool| if on { "true" } else { "false" }.to_string();

        let pairs = [
            ("min_batch", filters.effective_batch_size().to_string()),
            ("cursor", self.cursor.clone().unwrap_or_default()),
            ("sort", filters.sort.as_str().to_string()),
            ("period", filters.period.as_str().to_string()),
            ("username", filters.username.trim().to_string()),
            ("nsfw", filters.rating.as_str().to_string()),
            ("include_videos", flag(filters.videos_only)),
            ("videos_only", flag(filters.videos_only)),
            ("hide_no_prompt", flag(filters.hide_no_prompt)),
            ("time_budget_ms", self.time_budget_ms.map(|ms| ms.to_string()).unwrap_or_default()),
            ("baseModels", filters.base_models.join(",")),
            ("tags", filters.tag.clone().unwrap_or_default()),
        ];

        pairs.into_iter().filter(|(_, value)| !value.is_empty()).collect()
    }
}

/// Remote paginated stream
#[async_trait]
pub trait GallerySource: Send + Sync {
    async fn list(&self, request: &ListRequest) -> Result<Page, BrowserError>;
}

/// Server-side favorites collection
#[async_trait]
pub trait FavoritesApi: Send + Sync {
    /// Every favorite, fetched in bulk
    async fn all_favorites(&self) -> Result<Vec<Item>, BrowserError>;

    /// Flip membership of `item`; the full payload is sent
    async fn toggle(&self, item: &Item) -> Result<ToggleOutcome, BrowserError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    Added,
    Removed,
}

impl ToggleOutcome {
    /// Parse `{status: "added" | "removed" | "error", message?}`
    pub fn from_value(value: &Value) -> Result<Self, BrowserError> {
        let status = value.get("status").and_then(Value::as_str).unwrap_or_default();
        match status {
            "added" => Ok(ToggleOutcome::Added),
            "removed" => Ok(ToggleOutcome::Removed),
            _ => {
                let message = value
                    .get("message")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("status {status:?}"));
                Err(BrowserError::ToggleRejected(message))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_first_page_query_omits_empty_values() {
        let request = ListRequest::new(Filters::default(), None, 1200);
        let keys: Vec<_> = request.query_pairs().into_iter().map(|(key, _)| key).collect();
        assert_eq!(
            keys,
            vec!["min_batch", "sort", "period", "nsfw", "include_videos", "videos_only", "hide_no_prompt"]
        );
    }

    #[test]
    fn test_videos_only_query() {
        let filters = Filters {
            videos_only: true,
            username: "  someone ".into(),
            base_models: vec!["SDXL 1.0".into(), "Pony".into()],
            tag: Some("5499".into()),
            batch_size: 3,
            ..Filters::default()
        };
        let pairs = ListRequest::new(filters, Some("c9".into()), 1200).query_pairs();
        let get = |key: &str| pairs.iter().find(|(k, _)| *k == key).map(|(_, v)| v.as_str());

        assert_eq!(get("min_batch"), Some("12"));
        assert_eq!(get("cursor"), Some("c9"));
        assert_eq!(get("username"), Some("someone"));
        assert_eq!(get("include_videos"), Some("true"));
        assert_eq!(get("time_budget_ms"), Some("1200"));
        assert_eq!(get("baseModels"), Some("SDXL 1.0,Pony"));
        assert_eq!(get("tags"), Some("5499"));
        assert_eq!(get("sort"), Some("Newest"));
    }

    #[test]
    fn test_toggle_outcome() {
        assert_eq!(ToggleOutcome::from_value(&json!({ "status": "added" })).unwrap(), ToggleOutcome::Added);
        assert_eq!(ToggleOutcome::from_value(&json!({ "status": "removed" })).unwrap(), ToggleOutcome::Removed);

        let err = ToggleOutcome::from_value(&json!({ "status": "error", "message": "disk full" })).unwrap_err();
        assert!(matches!(err, BrowserError::ToggleRejected(ref message) if message == "disk full"));
    }
}
